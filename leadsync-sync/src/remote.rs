//! Retryable access to remote datasets.

use std::sync::Arc;

use leadsync_core::{RawRow, Row, SheetRef, Sleeper, ThreadSleeper};

use crate::error::RemoteError;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// A tabular dataset endpoint: positional rows of strings.
pub trait SheetStore: Send + Sync {
    /// Every row in `sheet`, header included, in stored order.
    fn read(&self, sheet: &SheetRef) -> Result<Vec<RawRow>, RemoteError>;

    /// Append `rows` after the last row of `sheet`; returns rows written.
    fn append(&self, sheet: &SheetRef, rows: &[Row]) -> Result<usize, RemoteError>;
}

/// Wraps a [`SheetStore`] with the retry policy. Only
/// [`RemoteError::is_transient`] failures are retried.
pub struct RemoteAccessor {
    store: Arc<dyn SheetStore>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RemoteAccessor {
    pub fn new(store: Arc<dyn SheetStore>) -> Self {
        Self {
            store,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn read(&self, sheet: &SheetRef) -> Result<Vec<RawRow>, RemoteError> {
        tracing::info!(sheet = %sheet, "reading dataset");
        let rows = retry_with_backoff(
            &self.policy,
            "read",
            self.sleeper.as_ref(),
            RemoteError::is_transient,
            || self.store.read(sheet),
        )?;
        tracing::info!(sheet = %sheet, rows = rows.len(), "dataset read");
        Ok(rows)
    }

    /// Append `rows`; an empty slice makes no remote call and returns 0.
    pub fn append(&self, sheet: &SheetRef, rows: &[Row]) -> Result<usize, RemoteError> {
        if rows.is_empty() {
            tracing::info!(sheet = %sheet, "no rows to append");
            return Ok(0);
        }
        tracing::info!(sheet = %sheet, rows = rows.len(), "appending rows");
        let written = retry_with_backoff(
            &self.policy,
            "append",
            self.sleeper.as_ref(),
            RemoteError::is_transient,
            || self.store.append(sheet, rows),
        )?;
        tracing::info!(sheet = %sheet, rows = written, "rows appended");
        Ok(written)
    }
}

//! Synchronization orchestrator: one linear run from reads to append.

use std::sync::Arc;

use serde::Serialize;

use leadsync_core::{
    find_recent_start_index, today_in, Clock, RawRow, Row, SheetRef, SystemClock, WindowSettings,
};

use crate::dedup::{existing_phone_set, filter_new_rows, DedupStats};
use crate::error::SyncError;
use crate::remote::RemoteAccessor;

/// Outcome of one [`SyncEngine::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Rows transferred this run (or that would be, on a dry run), phone
    /// normalized, in source order.
    pub new_rows: Vec<Row>,
    /// Rows acknowledged by the destination; `0` on a dry run.
    pub appended: usize,
    pub source_rows: usize,
    pub destination_rows: usize,
    /// Offset into destination data rows where the dedup window begins.
    pub destination_window_start: usize,
    /// Offset into source data rows; `0` unless source windowing is on.
    pub source_window_start: usize,
    pub stats: DedupStats,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.new_rows.is_empty()
    }
}

pub struct SyncEngine {
    accessor: RemoteAccessor,
    source: SheetRef,
    destination: SheetRef,
    window: WindowSettings,
    clock: Arc<dyn Clock>,
}

impl SyncEngine {
    pub fn new(
        accessor: RemoteAccessor,
        source: SheetRef,
        destination: SheetRef,
        window: WindowSettings,
    ) -> Self {
        Self {
            accessor,
            source,
            destination,
            window,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn accessor(&self) -> &RemoteAccessor {
        &self.accessor
    }

    pub fn source(&self) -> &SheetRef {
        &self.source
    }

    pub fn destination(&self) -> &SheetRef {
        &self.destination
    }

    /// Run one synchronization pass.
    ///
    /// Reads both datasets, deduplicates source rows by normalized phone
    /// against the destination's recency window and appends the survivors.
    /// With `dry_run` the append is skipped and the report still lists the
    /// rows that would have been written.
    ///
    /// The destination window assumes rows are stored in non-decreasing date
    /// order; an older row after a newer one ends the backward scan.
    pub fn run(&self, dry_run: bool) -> Result<SyncReport, SyncError> {
        let source = self
            .accessor
            .read(&self.source)
            .map_err(|source| SyncError::Read {
                dataset: "source",
                source,
            })?;
        let source_data = data_rows(&source);
        if source_data.is_empty() {
            tracing::info!(sheet = %self.source, "source has no data rows");
            return Ok(SyncReport::default());
        }

        let destination = self
            .accessor
            .read(&self.destination)
            .map_err(|source| SyncError::Read {
                dataset: "destination",
                source,
            })?;
        let destination_data = data_rows(&destination);

        let today = today_in(self.window.timezone, self.clock.now());
        let destination_window_start =
            find_recent_start_index(destination_data, self.window.lookback_days, today);
        let existing = existing_phone_set(&destination_data[destination_window_start..]);
        tracing::debug!(
            window_start = destination_window_start,
            phones = existing.len(),
            "destination window computed"
        );

        let source_window_start = if self.window.optimize_source {
            find_recent_start_index(source_data, self.window.lookback_days, today)
        } else {
            0
        };

        let outcome = filter_new_rows(&source_data[source_window_start..], &existing);

        let appended = if dry_run {
            tracing::info!(rows = outcome.rows.len(), "dry run, skipping append");
            0
        } else {
            self.accessor
                .append(&self.destination, &outcome.rows)
                .map_err(|source| SyncError::Append {
                    rows: outcome.rows.len(),
                    source,
                })?
        };

        tracing::info!(
            new_rows = outcome.rows.len(),
            appended,
            dry_run,
            "sync run complete"
        );

        Ok(SyncReport {
            new_rows: outcome.rows,
            appended,
            source_rows: source_data.len(),
            destination_rows: destination_data.len(),
            destination_window_start,
            source_window_start,
            stats: outcome.stats,
        })
    }
}

/// Everything after the header row.
fn data_rows(rows: &[RawRow]) -> &[RawRow] {
    rows.get(1..).unwrap_or_default()
}

//! Error types for leadsync-sync.

use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to a remote dataset endpoint.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection refused, DNS failure, reset, etc.
    #[error("network error: {0}")]
    Network(String),

    /// The transport timed out.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status, with a truncated response body.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Token exchange or assertion signing failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Malformed request that will never succeed (bad URL, bad range).
    #[error("invalid request: {0}")]
    Request(String),

    /// The service-account key file could not be used.
    #[error("credentials error at {path}: {reason}")]
    Credentials { path: PathBuf, reason: String },
}

impl RemoteError {
    /// Whether retrying the same call can reasonably succeed: network
    /// failures, timeouts and transient service statuses (408, 429, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::Timeout(_) => true,
            RemoteError::Http { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            RemoteError::Auth(_)
            | RemoteError::Decode(_)
            | RemoteError::Request(_)
            | RemoteError::Credentials { .. } => false,
        }
    }
}

/// All errors that abort a synchronization run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to read {dataset} dataset: {source}")]
    Read {
        dataset: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("failed to append {rows} rows to destination: {source}")]
    Append {
        rows: usize,
        #[source]
        source: RemoteError,
    },
}

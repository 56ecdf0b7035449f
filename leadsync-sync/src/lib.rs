//! # leadsync-sync
//!
//! Incremental lead synchronization between two tabular datasets.
//!
//! Call [`SyncEngine::run`] once per cycle: it reads both datasets through a
//! retrying [`RemoteAccessor`], deduplicates source rows by normalized phone
//! against the destination's recency window, appends the survivors and
//! returns them in a [`SyncReport`].

pub mod dedup;
pub mod error;
pub mod pipeline;
pub mod remote;
pub mod retry;
pub mod sheets;

pub use dedup::{existing_phone_set, filter_new_rows, DedupOutcome, DedupStats};
pub use error::{RemoteError, SyncError};
pub use pipeline::{SyncEngine, SyncReport};
pub use remote::{RemoteAccessor, SheetStore};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use sheets::{GoogleSheetsClient, ServiceAccountKey};

//! Cycle runner and interval scheduler for leadsync.

mod cycle;
mod error;
mod runtime;

pub use cycle::{Cycle, CycleOptions, CycleSummary};
pub use error::DaemonError;
pub use runtime::{init_tracing, run, run_scheduler, start_blocking, LogFormat, SchedulerStats};

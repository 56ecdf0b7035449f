use thiserror::Error;

/// Error surface for cycle construction and the scheduler runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] leadsync_core::ConfigError),

    #[error("sheets client error: {0}")]
    Remote(#[from] leadsync_sync::RemoteError),

    #[error("sync error: {0}")]
    Sync(#[from] leadsync_sync::SyncError),

    #[error("notifier setup error: {0}")]
    Notify(#[from] leadsync_notify::NotifyError),

    #[error("CRM uploader setup error: {0}")]
    Crm(#[from] leadsync_notify::CrmError),

    #[error("failed to start tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("{task} task join failure: {reason}")]
    Join { task: &'static str, reason: String },

    #[error("signal handler failed: {0}")]
    Signal(String),
}

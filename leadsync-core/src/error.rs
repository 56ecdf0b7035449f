//! Error types for leadsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while building [`crate::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An explicitly requested settings file does not exist.
    #[error("settings file not found at {path}")]
    NotFound { path: PathBuf },

    /// YAML parse error with file path and line context from serde_yaml.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// One or more required settings are absent. Names are the environment
    /// variable names that can supply them.
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    /// A setting is present but cannot be interpreted.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The service-account key file does not exist.
    #[error("credentials file not found: {path}")]
    CredentialsNotFound { path: PathBuf },
}

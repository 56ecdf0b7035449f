//! Error types for leadsync-notify.

use thiserror::Error;

/// Template rendering failures.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// JSON serialization error (building tera context).
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures delivering one chat message.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The request never got an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The Bot API answered with an error.
    #[error("chat API error {status}: {description}")]
    Api { status: u16, description: String },
}

/// Failures creating one CRM lead.
#[derive(Debug, Error)]
pub enum CrmError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Webhook answered 200 with an `error` body.
    #[error("CRM API error {code}: {description}")]
    Api { code: String, description: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

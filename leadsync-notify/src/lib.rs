//! # leadsync-notify
//!
//! Downstream consumers of a sync run's new rows: a Telegram
//! [`Notifier`] and a CRM [`LeadUploader`]. Message bodies are rendered
//! from embedded Tera templates by [`Renderer`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use leadsync_core::{Row, TelegramSettings};
//! use leadsync_notify::Notifier;
//!
//! fn announce(settings: &TelegramSettings, rows: &[Row]) {
//!     if let Ok(notifier) = Notifier::telegram(settings) {
//!         let report = notifier.dispatch(rows);
//!         println!("sent {}, failed {}", report.sent, report.failed);
//!     }
//! }
//! ```

pub mod context;
pub mod crm;
pub mod engine;
pub mod error;
pub mod telegram;

pub use context::LeadContext;
pub use crm::{
    BitrixWebhook, LeadApi, LeadFields, LeadOutcome, LeadPayload, LeadUploader, PhoneEntry,
    UploadReport,
};
pub use engine::{escape_markdown_v2, Renderer, Template};
pub use error::{CrmError, NotifyError, RenderError};
pub use telegram::{DispatchReport, MessageSink, Notifier, TelegramBot};

//! Telegram notification dispatcher.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use leadsync_core::{Row, Sleeper, TelegramSettings, ThreadSleeper};

use crate::context::{LeadContext, PLACEHOLDER};
use crate::engine::{Renderer, Template};
use crate::error::NotifyError;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum spacing between two consecutive messages.
pub const SEND_INTERVAL: Duration = Duration::from_secs(1);

/// Something that delivers one pre-formatted MarkdownV2 message.
pub trait MessageSink: Send + Sync {
    fn send(&self, text: &str) -> Result<(), NotifyError>;
}

// ---------------------------------------------------------------------------
// Bot API sink
// ---------------------------------------------------------------------------

/// `sendMessage` against the Telegram Bot API.
pub struct TelegramBot {
    agent: ureq::Agent,
    endpoint: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramBot {
    pub fn new(settings: &TelegramSettings) -> Self {
        Self::with_base_url(settings, TELEGRAM_API_BASE)
    }

    pub fn with_base_url(settings: &TelegramSettings, base_url: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build(),
            endpoint: format!(
                "{}/bot{}/sendMessage",
                base_url.trim_end_matches('/'),
                settings.bot_token
            ),
            chat_id: settings.chat_id.clone(),
        }
    }
}

impl MessageSink for TelegramBot {
    fn send(&self, text: &str) -> Result<(), NotifyError> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
        });
        let reply: ApiReply = match self.agent.post(&self.endpoint).send_json(body) {
            Ok(response) => response
                .into_json()
                .map_err(|e| NotifyError::Transport(format!("unreadable reply: {e}")))?,
            Err(ureq::Error::Status(status, response)) => {
                let reply: Option<ApiReply> = response.into_json().ok();
                let description = reply
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| "no description".to_string());
                return Err(NotifyError::Api { status, description });
            }
            // The token is part of the URL; keep only the error kind.
            Err(ureq::Error::Transport(transport)) => {
                return Err(NotifyError::Transport(transport.kind().to_string()))
            }
        };
        if reply.ok {
            Ok(())
        } else {
            Err(NotifyError::Api {
                status: reply.error_code.unwrap_or(200),
                description: reply.description.unwrap_or_default(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Totals for one [`Notifier::dispatch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Formats and sends one message per new lead, paced at
/// [`SEND_INTERVAL`]. A failed message is logged and counted; the rest
/// are still sent.
pub struct Notifier {
    sink: Box<dyn MessageSink>,
    renderer: Renderer,
    sleeper: Arc<dyn Sleeper>,
    interval: Duration,
}

impl Notifier {
    pub fn new(sink: Box<dyn MessageSink>, renderer: Renderer) -> Self {
        Self {
            sink,
            renderer,
            sleeper: Arc::new(ThreadSleeper),
            interval: SEND_INTERVAL,
        }
    }

    /// A notifier posting to the Bot API with the embedded templates.
    pub fn telegram(settings: &TelegramSettings) -> Result<Self, NotifyError> {
        Ok(Self::new(Box::new(TelegramBot::new(settings)), Renderer::new()?))
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Render the chat message for one lead.
    pub fn format(&self, row: &Row) -> Result<String, NotifyError> {
        let lead = LeadContext::from_row(row).with_placeholder(PLACEHOLDER);
        Ok(self.renderer.render(Template::TelegramLead, &lead)?)
    }

    pub fn dispatch(&self, rows: &[Row]) -> DispatchReport {
        let mut report = DispatchReport::default();
        if rows.is_empty() {
            return report;
        }
        tracing::info!(leads = rows.len(), "sending lead notifications");

        for (index, row) in rows.iter().enumerate() {
            if index > 0 {
                self.sleeper.sleep(self.interval);
            }
            match self.format(row).and_then(|text| self.sink.send(&text)) {
                Ok(()) => {
                    report.sent += 1;
                    tracing::info!(
                        lead = index + 1,
                        total = rows.len(),
                        phone = row.phone(),
                        "notification sent"
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        lead = index + 1,
                        phone = row.phone(),
                        error = %err,
                        "notification failed"
                    );
                }
            }
        }

        tracing::info!(sent = report.sent, failed = report.failed, "notifications done");
        report
    }
}

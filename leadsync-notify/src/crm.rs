//! CRM lead uploader (Bitrix24 inbound webhook, `crm.lead.add`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use leadsync_core::{CrmSettings, Row};

use crate::context::LeadContext;
use crate::engine::{Renderer, Template};
use crate::error::CrmError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 500;
const UNNAMED: &str = "Без имени";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhoneEntry {
    #[serde(rename = "VALUE")]
    pub value: String,
    #[serde(rename = "VALUE_TYPE")]
    pub value_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LeadFields {
    pub title: String,
    pub name: String,
    pub phone: Vec<PhoneEntry>,
    pub assigned_by_id: u64,
    pub source_id: String,
    pub status_id: String,
    pub utm_source: String,
    pub comments: String,
}

/// Body of one `crm.lead.add` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadPayload {
    pub fields: LeadFields,
}

/// Creates leads; returns the new lead id.
pub trait LeadApi: Send + Sync {
    fn add_lead(&self, payload: &LeadPayload) -> Result<u64, CrmError>;
}

// ---------------------------------------------------------------------------
// Webhook client
// ---------------------------------------------------------------------------

pub struct BitrixWebhook {
    agent: ureq::Agent,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct WebhookReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl BitrixWebhook {
    /// `webhook_url` is the inbound webhook base, e.g.
    /// `https://example.bitrix24.ru/rest/1/secret`.
    pub fn new(webhook_url: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build(),
            endpoint: format!("{}/crm.lead.add.json", webhook_url.trim_end_matches('/')),
        }
    }
}

impl LeadApi for BitrixWebhook {
    fn add_lead(&self, payload: &LeadPayload) -> Result<u64, CrmError> {
        let reply: WebhookReply = match self.agent.post(&self.endpoint).send_json(payload) {
            Ok(response) => response
                .into_json()
                .map_err(|e| CrmError::Decode(e.to_string()))?,
            Err(ureq::Error::Status(status, response)) => {
                let mut body = response.into_string().unwrap_or_default();
                if let Some((cut, _)) = body.char_indices().nth(MAX_ERROR_BODY) {
                    body.truncate(cut);
                }
                return Err(CrmError::Http { status, body });
            }
            // The webhook secret is part of the URL; keep only the error kind.
            Err(ureq::Error::Transport(transport)) => {
                return Err(CrmError::Transport(transport.kind().to_string()))
            }
        };
        parse_reply(reply)
    }
}

fn parse_reply(reply: WebhookReply) -> Result<u64, CrmError> {
    if let Some(code) = reply.error {
        return Err(CrmError::Api {
            code,
            description: reply.error_description.unwrap_or_default(),
        });
    }
    match reply.result {
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| CrmError::Decode(format!("lead id {n} is not a positive integer"))),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| CrmError::Decode(format!("lead id {s:?} is not numeric"))),
        other => Err(CrmError::Decode(format!("no lead id in reply: {other:?}"))),
    }
}

// ---------------------------------------------------------------------------
// Uploader
// ---------------------------------------------------------------------------

/// Result of one lead creation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadOutcome {
    pub name: String,
    pub phone: String,
    pub lead_id: Option<u64>,
    pub error: Option<String>,
}

impl LeadOutcome {
    pub fn is_created(&self) -> bool {
        self.lead_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub created: usize,
    pub failed: usize,
    pub leads: Vec<LeadOutcome>,
}

/// Creates one CRM lead per row. Holds no counters; each
/// [`LeadUploader::upload`] returns its own [`UploadReport`].
pub struct LeadUploader {
    api: Box<dyn LeadApi>,
    renderer: Renderer,
    settings: CrmSettings,
}

impl LeadUploader {
    pub fn new(api: Box<dyn LeadApi>, renderer: Renderer, settings: CrmSettings) -> Self {
        Self {
            api,
            renderer,
            settings,
        }
    }

    /// An uploader posting to the configured Bitrix24 webhook.
    pub fn bitrix(settings: &CrmSettings) -> Result<Self, CrmError> {
        Ok(Self::new(
            Box::new(BitrixWebhook::new(&settings.webhook_url)),
            Renderer::new()?,
            settings.clone(),
        ))
    }

    pub fn payload(&self, row: &Row) -> Result<LeadPayload, CrmError> {
        let name = display_name(row);
        let phone = row.phone().trim().to_string();
        let comments = self
            .renderer
            .render(Template::CrmComments, &LeadContext::from_row(row))?;
        Ok(LeadPayload {
            fields: LeadFields {
                title: format!("{}_{}_{}", self.settings.title_prefix, phone, name),
                name: name.to_string(),
                phone: vec![PhoneEntry {
                    value: phone,
                    value_type: "WORK",
                }],
                assigned_by_id: self.settings.assignee_id,
                source_id: self.settings.source_id.clone(),
                status_id: self.settings.status_id.clone(),
                utm_source: self.settings.utm_source.clone(),
                comments,
            },
        })
    }

    fn upload_one(&self, row: &Row) -> LeadOutcome {
        let name = display_name(row).to_string();
        let phone = row.phone().trim().to_string();
        if phone.is_empty() {
            tracing::warn!(name = %name, "skipping lead without phone");
            return LeadOutcome {
                name,
                phone,
                lead_id: None,
                error: Some("missing phone".to_string()),
            };
        }

        match self.payload(row).and_then(|payload| self.api.add_lead(&payload)) {
            Ok(lead_id) => {
                tracing::info!(lead_id, name = %name, phone = %phone, "lead created");
                LeadOutcome {
                    name,
                    phone,
                    lead_id: Some(lead_id),
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!(name = %name, phone = %phone, error = %err, "lead creation failed");
                LeadOutcome {
                    name,
                    phone,
                    lead_id: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    pub fn upload(&self, rows: &[Row]) -> UploadReport {
        if rows.is_empty() {
            tracing::info!("no leads to upload");
            return UploadReport::default();
        }
        tracing::info!(leads = rows.len(), "uploading leads to CRM");

        let leads: Vec<LeadOutcome> = rows.iter().map(|row| self.upload_one(row)).collect();
        let created = leads.iter().filter(|lead| lead.is_created()).count();
        let report = UploadReport {
            created,
            failed: leads.len() - created,
            leads,
        };
        tracing::info!(created = report.created, failed = report.failed, "CRM upload done");
        report
    }
}

fn display_name(row: &Row) -> &str {
    match row.name().trim() {
        "" => UNNAMED,
        name => name,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct FakeCrm {
        payloads: Mutex<Vec<LeadPayload>>,
    }

    impl LeadApi for std::sync::Arc<FakeCrm> {
        fn add_lead(&self, payload: &LeadPayload) -> Result<u64, CrmError> {
            let mut payloads = self.payloads.lock().expect("lock");
            if payload.fields.name == "Broken" {
                return Err(CrmError::Api {
                    code: "ERROR_CORE".into(),
                    description: "internal".into(),
                });
            }
            payloads.push(payload.clone());
            Ok(100 + payloads.len() as u64)
        }
    }

    fn uploader() -> (LeadUploader, std::sync::Arc<FakeCrm>) {
        let fake = std::sync::Arc::new(FakeCrm::default());
        let uploader = LeadUploader::new(
            Box::new(fake.clone()),
            Renderer::new().expect("renderer"),
            CrmSettings::new("https://crm.example/rest/1/key"),
        );
        (uploader, fake)
    }

    #[test]
    fn payload_serializes_to_webhook_shape() {
        let (uploader, _) = uploader();
        let row = Row::from_cells(["2025-01-01", "5", "Ann", "79120000001", "hi", "", "x"]);
        let payload = serde_json::to_value(uploader.payload(&row).expect("payload")).expect("json");
        assert_eq!(
            payload,
            json!({
                "fields": {
                    "TITLE": "Лидгенбюро_79120000001_Ann",
                    "NAME": "Ann",
                    "PHONE": [{ "VALUE": "79120000001", "VALUE_TYPE": "WORK" }],
                    "ASSIGNED_BY_ID": 109,
                    "SOURCE_ID": "10",
                    "STATUS_ID": "NEW",
                    "UTM_SOURCE": "leadgenburo",
                    "COMMENTS": "Имя: Ann\nТелефон: 79120000001\nКомментарий: hi\nДоп. комментарий: \nСсылка на запись: x\nДата лида: 2025-01-01"
                }
            })
        );
    }

    #[test]
    fn report_counts_created_and_failed() {
        let (uploader, fake) = uploader();
        let report = uploader.upload(&[
            Row::from_cells(["d", "1", "Ann", "79120000001"]),
            Row::from_cells(["d", "2", "NoPhone", ""]),
            Row::from_cells(["d", "3", "Broken", "79120000003"]),
            Row::from_cells(["d", "4", "", "79120000004"]),
        ]);
        assert_eq!(report.created, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.leads[0].lead_id, Some(101));
        assert_eq!(report.leads[1].error.as_deref(), Some("missing phone"));
        assert!(report.leads[2].error.as_deref().unwrap_or_default().contains("ERROR_CORE"));
        assert_eq!(report.leads[3].name, UNNAMED);
        assert_eq!(fake.payloads.lock().unwrap().len(), 2);
    }

    #[test]
    fn reply_parsing() {
        let reply = |v: Value| serde_json::from_value::<WebhookReply>(v).expect("reply");
        assert_eq!(parse_reply(reply(json!({ "result": 42 }))).expect("id"), 42);
        assert_eq!(parse_reply(reply(json!({ "result": "43" }))).expect("id"), 43);
        assert!(matches!(
            parse_reply(reply(json!({ "error": "INVALID_CREDENTIALS", "error_description": "bad" }))),
            Err(CrmError::Api { .. })
        ));
        assert!(matches!(parse_reply(reply(json!({}))), Err(CrmError::Decode(_))));
    }

    #[test]
    fn endpoint_drops_trailing_slash() {
        let hook = BitrixWebhook::new("https://crm.example/rest/1/key/");
        assert_eq!(hook.endpoint, "https://crm.example/rest/1/key/crm.lead.add.json");
    }
}

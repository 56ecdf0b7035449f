//! Google Sheets v4 client authenticated as a service account.
//!
//! ## Token flow
//!
//! 1. Sign an RS256 JWT assertion with the key's private key.
//! 2. Exchange it at `token_uri` (JWT-bearer grant) for an access token.
//! 3. Cache the token until shortly before it expires.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use leadsync_core::{RawRow, Row, SheetRef};

use crate::error::RemoteError;
use crate::remote::SheetStore;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
const MAX_ERROR_BODY: usize = 500;

// ---------------------------------------------------------------------------
// Service-account key
// ---------------------------------------------------------------------------

/// The fields of a service-account JSON key that the token flow needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, RemoteError> {
        let credentials_err = |reason: String| RemoteError::Credentials {
            path: path.to_path_buf(),
            reason,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| credentials_err(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| credentials_err(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_after: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Blocking Sheets client. Safe to share across threads.
pub struct GoogleSheetsClient {
    agent: ureq::Agent,
    key: ServiceAccountKey,
    base_url: Url,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsClient {
    pub fn new(key: ServiceAccountKey) -> Result<Self, RemoteError> {
        let base_url =
            Url::parse(SHEETS_BASE_URL).map_err(|e| RemoteError::Request(e.to_string()))?;
        Ok(Self {
            agent: ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build(),
            key,
            base_url,
            token: Mutex::new(None),
        })
    }

    /// Load the service-account key at `path` and build a client.
    pub fn from_key_file(path: &Path) -> Result<Self, RemoteError> {
        tracing::info!(path = %path.display(), "loading service-account credentials");
        Self::new(ServiceAccountKey::from_file(path)?)
    }

    fn access_token(&self) -> Result<String, RemoteError> {
        let now = Utc::now();
        let mut cached = self
            .token
            .lock()
            .map_err(|_| RemoteError::Auth("token cache poisoned".to_string()))?;
        if let Some(token) = cached.as_ref() {
            if token.refresh_after > now {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.sign_assertion(now)?;
        let response: TokenResponse = self
            .agent
            .post(&self.key.token_uri)
            .send_form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .map_err(|err| match map_transport(err) {
                RemoteError::Http { status, body } if status == 400 || status == 401 => {
                    RemoteError::Auth(format!("token exchange rejected ({status}): {body}"))
                }
                other => other,
            })?
            .into_json()
            .map_err(|e| RemoteError::Decode(format!("token response: {e}")))?;

        let lifetime = response.expires_in.unwrap_or(TOKEN_LIFETIME_SECS);
        let refresh_after =
            now + chrono::Duration::seconds((lifetime - TOKEN_REFRESH_MARGIN_SECS).max(0));
        tracing::debug!(expires_in = lifetime, "obtained access token");
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            refresh_after,
        });
        Ok(response.access_token)
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, RemoteError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| RemoteError::Auth(format!("invalid private key: {e}")))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| RemoteError::Auth(format!("failed to sign assertion: {e}")))
    }

    /// `{base}/{spreadsheet_id}/values/{range}{suffix}` with every dynamic
    /// part percent-encoded as a single path segment.
    pub(crate) fn values_url(&self, sheet: &SheetRef, suffix: &str) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::Request("base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .push(&sheet.spreadsheet_id)
            .push("values")
            .push(&format!("{}{suffix}", sheet.range));
        Ok(url)
    }
}

impl SheetStore for GoogleSheetsClient {
    fn read(&self, sheet: &SheetRef) -> Result<Vec<RawRow>, RemoteError> {
        let token = self.access_token()?;
        let url = self.values_url(sheet, "")?;
        let body: Value = self
            .agent
            .get(url.as_str())
            .set("Authorization", &format!("Bearer {token}"))
            .call()
            .map_err(map_transport)?
            .into_json()
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        parse_values(&body)
    }

    fn append(&self, sheet: &SheetRef, rows: &[Row]) -> Result<usize, RemoteError> {
        let token = self.access_token()?;
        let mut url = self.values_url(sheet, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let values: Vec<&[String]> = rows.iter().map(Row::fields).collect();
        self.agent
            .post(url.as_str())
            .set("Authorization", &format!("Bearer {token}"))
            .send_json(json!({ "values": values }))
            .map_err(map_transport)?;
        Ok(rows.len())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract `values` from a `ValueRange` body. A missing key is an empty
/// sheet; non-string cells are stringified.
pub(crate) fn parse_values(body: &Value) -> Result<Vec<RawRow>, RemoteError> {
    let Some(values) = body.get("values") else {
        return Ok(Vec::new());
    };
    let rows = values
        .as_array()
        .ok_or_else(|| RemoteError::Decode("`values` is not an array".to_string()))?;
    rows.iter()
        .map(|row| {
            let cells = row
                .as_array()
                .ok_or_else(|| RemoteError::Decode("row is not an array".to_string()))?;
            Ok(cells.iter().map(cell_to_string).collect())
        })
        .collect()
}

fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn map_transport(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, response) => {
            let mut body = response.into_string().unwrap_or_default();
            if let Some((cut, _)) = body.char_indices().nth(MAX_ERROR_BODY) {
                body.truncate(cut);
            }
            RemoteError::Http { status, body }
        }
        ureq::Error::Transport(transport) => {
            let message = transport.to_string();
            match transport.kind() {
                ureq::ErrorKind::Io if message.contains("timed out") => {
                    RemoteError::Timeout(message)
                }
                ureq::ErrorKind::Io
                | ureq::ErrorKind::Dns
                | ureq::ErrorKind::ConnectionFailed
                | ureq::ErrorKind::ProxyConnect => RemoteError::Network(message),
                _ => RemoteError::Request(message),
            }
        }
    }
}

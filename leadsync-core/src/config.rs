//! Process configuration.
//!
//! # Sources
//!
//! 1. An optional YAML settings file.
//! 2. Environment overrides, looked up through a caller-supplied function so
//!    nothing here reads `std::env` directly.
//!
//! Environment wins over the file. Empty environment values count as unset.
//!
//! ```yaml
//! source:      { spreadsheet_id: "1Abc...", range: "Leads" }
//! destination: { spreadsheet_id: "1Xyz...", range: "Leads" }
//! credentials_file: credentials.json
//! window:
//!   lookback_days: 1
//!   optimize_source: false
//!   timezone: Europe/Moscow
//! schedule:
//!   interval_seconds: 600
//! telegram: { bot_token: "...", chat_id: "..." }
//! crm:
//!   webhook_url: https://example.bitrix24.ru/rest/1/token
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::SheetRef;

pub const ENV_SRC_ID: &str = "SRC_ID";
pub const ENV_SRC_SHEET: &str = "SRC_SHEET";
pub const ENV_DST_ID: &str = "DST_ID";
pub const ENV_DST_SHEET: &str = "DST_SHEET";
pub const ENV_CREDENTIALS: &str = "GOOGLE_CREDENTIALS_FILE";
pub const ENV_LOOKBACK_DAYS: &str = "ANALYSIS_DAYS_DEPTH";
pub const ENV_OPTIMIZE_SOURCE: &str = "OPTIMIZE_SOURCE";
pub const ENV_INTERVAL: &str = "SYNC_INTERVAL_SECONDS";
pub const ENV_TIMEZONE: &str = "LEADSYNC_TIMEZONE";
pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
/// Older deployments named the bot token after the assistant bot.
pub const ENV_TELEGRAM_TOKEN_LEGACY: &str = "TELEGRAM_BOT_TOKEN_ASSISTANT";
pub const ENV_TELEGRAM_CHAT: &str = "TELEGRAM_CHAT_ID";
pub const ENV_BITRIX_WEBHOOK: &str = "BITRIX_WEBHOOK_URL";

pub const DEFAULT_LOOKBACK_DAYS: u32 = 1;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Moscow;

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Immutable, validated configuration. Built once at startup and passed to
/// every constructor that needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source: SheetRef,
    pub destination: SheetRef,
    pub credentials_path: PathBuf,
    pub window: WindowSettings,
    pub interval: Duration,
    pub telegram: Option<TelegramSettings>,
    pub crm: Option<CrmSettings>,
}

/// Recency-window tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    pub lookback_days: u32,
    /// Window the source dataset too. Off by default: it is only safe when
    /// source rows are stored in date order.
    pub optimize_source: bool,
    /// Zone whose calendar day defines "today".
    pub timezone: Tz,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            optimize_source: false,
            timezone: DEFAULT_TIMEZONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

/// CRM webhook plus the fixed values stamped on every created lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmSettings {
    pub webhook_url: String,
    pub assignee_id: u64,
    pub source_id: String,
    pub status_id: String,
    pub utm_source: String,
    pub title_prefix: String,
}

impl CrmSettings {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            assignee_id: 109,
            source_id: "10".to_string(),
            status_id: "NEW".to_string(),
            utm_source: "leadgenburo".to_string(),
            title_prefix: "Лидгенбюро".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// File shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    #[serde(default)]
    source: SheetSection,
    #[serde(default)]
    destination: SheetSection,
    credentials_file: Option<PathBuf>,
    #[serde(default)]
    window: WindowSection,
    #[serde(default)]
    schedule: ScheduleSection,
    #[serde(default)]
    telegram: TelegramSection,
    #[serde(default)]
    crm: CrmSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SheetSection {
    spreadsheet_id: Option<String>,
    range: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WindowSection {
    lookback_days: Option<u32>,
    optimize_source: Option<bool>,
    timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScheduleSection {
    interval_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TelegramSection {
    bot_token: Option<String>,
    chat_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CrmSection {
    webhook_url: Option<String>,
    assignee_id: Option<u64>,
    source_id: Option<String>,
    status_id: Option<String>,
    utm_source: Option<String>,
    title_prefix: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Settings {
    /// Load settings from `path` (if given) overlaid with `env`.
    ///
    /// An explicit `path` must exist. With `None`, the environment alone must
    /// supply every required setting.
    pub fn load<E>(path: Option<&Path>, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let (file, base_dir) = match path {
            Some(path) => (read_file(path)?, path.parent().map(Path::to_path_buf)),
            None => (FileSettings::default(), None),
        };
        resolve(file, base_dir.as_deref(), &env)
    }

    /// Parse settings from YAML text. Relative credential paths resolve
    /// against `base_dir` when given.
    pub fn from_yaml_str<E>(
        yaml: &str,
        base_dir: Option<&Path>,
        env: E,
    ) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let file: FileSettings =
            serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        resolve(file, base_dir, &env)
    }
}

fn read_file(path: &Path) -> Result<FileSettings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(FileSettings::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve<E>(file: FileSettings, base_dir: Option<&Path>, env: &E) -> Result<Settings, ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let src_id = lookup(ENV_SRC_ID).or(file.source.spreadsheet_id);
    let src_range = lookup(ENV_SRC_SHEET).or(file.source.range);
    let dst_id = lookup(ENV_DST_ID).or(file.destination.spreadsheet_id);
    let dst_range = lookup(ENV_DST_SHEET).or(file.destination.range);
    let credentials = lookup(ENV_CREDENTIALS)
        .map(PathBuf::from)
        .or(file.credentials_file);

    let missing: Vec<&'static str> = [
        (ENV_CREDENTIALS, credentials.is_none()),
        (ENV_SRC_ID, src_id.is_none()),
        (ENV_DST_ID, dst_id.is_none()),
        (ENV_SRC_SHEET, src_range.is_none()),
        (ENV_DST_SHEET, dst_range.is_none()),
    ]
    .into_iter()
    .filter_map(|(key, absent)| absent.then_some(key))
    .collect();
    let (Some(src_id), Some(src_range), Some(dst_id), Some(dst_range), Some(credentials)) =
        (src_id, src_range, dst_id, dst_range, credentials)
    else {
        return Err(ConfigError::Missing(missing));
    };

    let credentials_path = match base_dir {
        Some(dir) if credentials.is_relative() => dir.join(credentials),
        _ => credentials,
    };
    if !credentials_path.exists() {
        return Err(ConfigError::CredentialsNotFound {
            path: credentials_path,
        });
    }

    let lookback_days = match lookup(ENV_LOOKBACK_DAYS) {
        Some(raw) => parse_number::<u32>(ENV_LOOKBACK_DAYS, &raw)?,
        None => file.window.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
    };
    let optimize_source = match lookup(ENV_OPTIMIZE_SOURCE) {
        Some(raw) => parse_flag(ENV_OPTIMIZE_SOURCE, &raw)?,
        None => file.window.optimize_source.unwrap_or(false),
    };
    let timezone = match lookup(ENV_TIMEZONE).or(file.window.timezone) {
        Some(raw) => raw
            .trim()
            .parse::<Tz>()
            .map_err(|reason| ConfigError::Invalid {
                key: ENV_TIMEZONE,
                value: raw.clone(),
                reason: reason.to_string(),
            })?,
        None => DEFAULT_TIMEZONE,
    };
    let interval = match lookup(ENV_INTERVAL) {
        Some(raw) => Duration::from_secs(parse_number::<u64>(ENV_INTERVAL, &raw)?),
        None => file
            .schedule
            .interval_seconds
            .map_or(DEFAULT_INTERVAL, Duration::from_secs),
    };
    if interval.is_zero() {
        return Err(ConfigError::Invalid {
            key: ENV_INTERVAL,
            value: "0".to_string(),
            reason: "interval must be positive".to_string(),
        });
    }

    let present = |v: &String| !v.trim().is_empty();
    let telegram = match (
        lookup(ENV_TELEGRAM_TOKEN)
            .or_else(|| lookup(ENV_TELEGRAM_TOKEN_LEGACY))
            .or(file.telegram.bot_token.filter(present)),
        lookup(ENV_TELEGRAM_CHAT).or(file.telegram.chat_id.filter(present)),
    ) {
        (Some(bot_token), Some(chat_id)) => Some(TelegramSettings { bot_token, chat_id }),
        _ => None,
    };

    let crm = lookup(ENV_BITRIX_WEBHOOK)
        .or(file.crm.webhook_url.filter(present))
        .map(|webhook_url| {
            let mut crm = CrmSettings::new(webhook_url.trim_end_matches('/'));
            if let Some(id) = file.crm.assignee_id {
                crm.assignee_id = id;
            }
            if let Some(source_id) = file.crm.source_id {
                crm.source_id = source_id;
            }
            if let Some(status_id) = file.crm.status_id {
                crm.status_id = status_id;
            }
            if let Some(utm_source) = file.crm.utm_source {
                crm.utm_source = utm_source;
            }
            if let Some(title_prefix) = file.crm.title_prefix {
                crm.title_prefix = title_prefix;
            }
            crm
        });

    Ok(Settings {
        source: SheetRef::new(src_id, src_range),
        destination: SheetRef::new(dst_id, dst_range),
        credentials_path,
        window: WindowSettings {
            lookback_days,
            optimize_source,
            timezone,
        },
        interval,
        telegram,
        crm,
    })
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

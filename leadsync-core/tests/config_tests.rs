//! Settings loading: file + environment overlay, fail-fast validation.

use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use leadsync_core::{ConfigError, Settings};
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn no_env() -> impl Fn(&str) -> Option<String> {
    |_| None
}

fn workspace_with_credentials() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("credentials.json"), "{}").expect("write credentials");
    dir
}

const FULL_YAML: &str = r#"
source:
  spreadsheet_id: src-sheet-id
  range: Входящие
destination:
  spreadsheet_id: dst-sheet-id
  range: Leads
credentials_file: credentials.json
window:
  lookback_days: 3
  optimize_source: true
  timezone: Asia/Yekaterinburg
schedule:
  interval_seconds: 300
telegram:
  bot_token: "123:abc"
  chat_id: "-100500"
crm:
  webhook_url: https://crm.example/rest/1/token/
  assignee_id: 7
"#;

#[test]
fn full_file_resolves_every_section() {
    let dir = workspace_with_credentials();
    let path = dir.path().join("leadsync.yaml");
    fs::write(&path, FULL_YAML).expect("write settings");

    let settings = Settings::load(Some(&path), no_env()).expect("load");
    assert_eq!(settings.source.spreadsheet_id, "src-sheet-id");
    assert_eq!(settings.source.range, "Входящие");
    assert_eq!(settings.destination.range, "Leads");
    assert_eq!(settings.credentials_path, dir.path().join("credentials.json"));
    assert_eq!(settings.window.lookback_days, 3);
    assert!(settings.window.optimize_source);
    assert_eq!(settings.window.timezone, chrono_tz::Asia::Yekaterinburg);
    assert_eq!(settings.interval, Duration::from_secs(300));

    let telegram = settings.telegram.expect("telegram section");
    assert_eq!(telegram.chat_id, "-100500");

    let crm = settings.crm.expect("crm section");
    assert_eq!(crm.webhook_url, "https://crm.example/rest/1/token");
    assert_eq!(crm.assignee_id, 7);
    assert_eq!(crm.status_id, "NEW", "unspecified CRM values keep defaults");
    assert_eq!(crm.utm_source, "leadgenburo");
}

#[test]
fn environment_alone_is_enough_and_defaults_apply() {
    let dir = workspace_with_credentials();
    let creds = dir.path().join("credentials.json");
    let settings = Settings::load(
        None,
        env(&[
            ("SRC_ID", "a"),
            ("SRC_SHEET", "Sheet1"),
            ("DST_ID", "b"),
            ("DST_SHEET", "Sheet1"),
            ("GOOGLE_CREDENTIALS_FILE", creds.to_str().expect("utf8 path")),
        ]),
    )
    .expect("load");

    assert_eq!(settings.window.lookback_days, 1);
    assert!(!settings.window.optimize_source, "source windowing defaults off");
    assert_eq!(settings.window.timezone, chrono_tz::Europe::Moscow);
    assert_eq!(settings.interval, Duration::from_secs(600));
    assert!(settings.telegram.is_none());
    assert!(settings.crm.is_none());
}

#[test]
fn environment_overrides_file_values() {
    let dir = workspace_with_credentials();
    let path = dir.path().join("leadsync.yaml");
    fs::write(&path, FULL_YAML).expect("write settings");

    let settings = Settings::load(
        Some(&path),
        env(&[
            ("DST_SHEET", "Archive"),
            ("ANALYSIS_DAYS_DEPTH", "5"),
            ("OPTIMIZE_SOURCE", "false"),
            ("SRC_ID", ""),
        ]),
    )
    .expect("load");

    assert_eq!(settings.destination.range, "Archive");
    assert_eq!(settings.window.lookback_days, 5);
    assert!(!settings.window.optimize_source);
    assert_eq!(
        settings.source.spreadsheet_id, "src-sheet-id",
        "empty env values must not override"
    );
}

#[test]
fn all_missing_required_settings_are_reported_together() {
    let err = Settings::load(None, env(&[("SRC_ID", "a")])).unwrap_err();
    match &err {
        ConfigError::Missing(names) => assert_eq!(
            names,
            &vec!["GOOGLE_CREDENTIALS_FILE", "DST_ID", "SRC_SHEET", "DST_SHEET"]
        ),
        other => panic!("expected Missing, got {other:?}"),
    }
    assert!(err.to_string().contains("DST_ID, SRC_SHEET"));
}

#[test]
fn missing_credentials_file_fails_fast() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("leadsync.yaml");
    fs::write(&path, FULL_YAML).expect("write settings");

    let err = Settings::load(Some(&path), no_env()).unwrap_err();
    assert!(
        matches!(err, ConfigError::CredentialsNotFound { .. }),
        "got: {err}"
    );
}

#[test]
fn explicit_missing_file_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let err = Settings::load(Some(&dir.path().join("nope.yaml")), no_env()).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
}

#[test]
fn unknown_keys_are_parse_errors_with_path() {
    let dir = workspace_with_credentials();
    let path = dir.path().join("leadsync.yaml");
    fs::write(&path, "sauce:\n  spreadsheet_id: x\n").expect("write settings");

    let err = Settings::load(Some(&path), no_env()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("leadsync.yaml"));
}

#[test]
fn invalid_values_name_the_setting() {
    let dir = workspace_with_credentials();
    let path = dir.path().join("leadsync.yaml");
    fs::write(&path, FULL_YAML).expect("write settings");

    for (key, value) in [
        ("ANALYSIS_DAYS_DEPTH", "abc"),
        ("OPTIMIZE_SOURCE", "maybe"),
        ("LEADSYNC_TIMEZONE", "Mars/Olympus"),
        ("SYNC_INTERVAL_SECONDS", "0"),
    ] {
        let err = Settings::load(Some(&path), env(&[(key, value)])).unwrap_err();
        match err {
            ConfigError::Invalid { key: reported, .. } => assert_eq!(reported, key),
            other => panic!("expected Invalid for {key}, got {other:?}"),
        }
    }
}

#[test]
fn inline_yaml_without_base_dir_keeps_absolute_credentials() {
    let dir = workspace_with_credentials();
    let creds = dir.path().join("credentials.json");
    let yaml = format!(
        "source: {{ spreadsheet_id: a, range: S }}\ndestination: {{ spreadsheet_id: b, range: D }}\ncredentials_file: {}\n",
        creds.display()
    );
    let settings = Settings::from_yaml_str(&yaml, None, no_env()).expect("parse");
    assert_eq!(settings.credentials_path, creds);
}

#[test]
fn blank_collaborator_values_in_file_leave_them_disabled() {
    let dir = workspace_with_credentials();
    let path = dir.path().join("leadsync.yaml");
    fs::write(
        &path,
        "source: { spreadsheet_id: s, range: A }\n\
         destination: { spreadsheet_id: d, range: B }\n\
         credentials_file: credentials.json\n\
         telegram: { bot_token: \"\", chat_id: \"\" }\n\
         crm: { webhook_url: \"  \" }\n",
    )
    .expect("write settings");

    let settings = Settings::load(Some(&path), no_env()).expect("load");
    assert!(settings.telegram.is_none());
    assert!(settings.crm.is_none());
}

#[test]
fn shipped_example_file_parses() {
    let dir = workspace_with_credentials();
    let path = dir.path().join("leadsync.yaml");
    fs::write(&path, include_str!("../../leadsync.example.yaml")).expect("write settings");

    let settings = Settings::load(Some(&path), no_env()).expect("load");
    assert_eq!(settings.interval, Duration::from_secs(600));
    assert!(settings.telegram.is_none());
}

#[test]
fn assistant_bot_token_variable_is_accepted() {
    let dir = workspace_with_credentials();
    let creds = dir.path().join("credentials.json");
    let base = [
        ("SRC_ID", "a"),
        ("SRC_SHEET", "Sheet1"),
        ("DST_ID", "b"),
        ("DST_SHEET", "Sheet1"),
        ("GOOGLE_CREDENTIALS_FILE", creds.to_str().expect("utf8 path")),
        ("TELEGRAM_CHAT_ID", "-100500"),
    ];

    let mut legacy_only = base.to_vec();
    legacy_only.push(("TELEGRAM_BOT_TOKEN_ASSISTANT", "assistant-token"));
    let settings = Settings::load(None, env(&legacy_only)).expect("load");
    let telegram = settings.telegram.expect("telegram enabled by assistant token");
    assert_eq!(telegram.bot_token, "assistant-token");

    let mut both = legacy_only.clone();
    both.push(("TELEGRAM_BOT_TOKEN", "primary-token"));
    let settings = Settings::load(None, env(&both)).expect("load");
    assert_eq!(settings.telegram.expect("telegram").bot_token, "primary-token");
}

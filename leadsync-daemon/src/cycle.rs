//! One scheduled unit of work: sync, then hand new rows downstream.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use leadsync_core::Settings;
use leadsync_notify::{DispatchReport, LeadUploader, Notifier, UploadReport};
use leadsync_sync::{GoogleSheetsClient, RemoteAccessor, SyncEngine, SyncError, SyncReport};

use crate::error::DaemonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOptions {
    pub dry_run: bool,
    pub notify: bool,
    pub crm: bool,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            notify: true,
            crm: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub sync: SyncReport,
    /// `None` when no notifier ran (disabled, unconfigured, nothing new).
    pub notifications: Option<DispatchReport>,
    pub crm: Option<UploadReport>,
    pub duration_ms: u128,
}

impl CycleSummary {
    pub fn rows_transferred(&self) -> usize {
        self.sync.new_rows.len()
    }
}

pub struct Cycle {
    engine: SyncEngine,
    notifier: Option<Notifier>,
    uploader: Option<LeadUploader>,
}

impl Cycle {
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            engine,
            notifier: None,
            uploader: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_uploader(mut self, uploader: LeadUploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Wire the Google Sheets client and every configured collaborator.
    pub fn from_settings(settings: &Settings) -> Result<Self, DaemonError> {
        let client = GoogleSheetsClient::from_key_file(&settings.credentials_path)?;
        let engine = SyncEngine::new(
            RemoteAccessor::new(Arc::new(client)),
            settings.source.clone(),
            settings.destination.clone(),
            settings.window,
        );
        let mut cycle = Cycle::new(engine);
        match &settings.telegram {
            Some(telegram) => cycle = cycle.with_notifier(Notifier::telegram(telegram)?),
            None => tracing::info!("telegram not configured, notifications disabled"),
        }
        match &settings.crm {
            Some(crm) => cycle = cycle.with_uploader(LeadUploader::bitrix(crm)?),
            None => tracing::info!("CRM webhook not configured, lead upload disabled"),
        }
        Ok(cycle)
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Run the engine and pass its new rows on. Only an engine failure is
    /// an error; downstream failures are counted in their reports. A dry
    /// run never reaches the collaborators.
    pub fn run(&self, options: CycleOptions) -> Result<CycleSummary, SyncError> {
        let started = Instant::now();
        let sync = self.engine.run(options.dry_run)?;

        let deliver = !options.dry_run && !sync.is_empty();
        let notifications = match &self.notifier {
            Some(notifier) if deliver && options.notify => Some(notifier.dispatch(&sync.new_rows)),
            _ => None,
        };
        let crm = match &self.uploader {
            Some(uploader) if deliver && options.crm => Some(uploader.upload(&sync.new_rows)),
            _ => None,
        };

        let summary = CycleSummary {
            sync,
            notifications,
            crm,
            duration_ms: started.elapsed().as_millis(),
        };
        tracing::info!(
            new_rows = summary.rows_transferred(),
            duration_ms = summary.duration_ms,
            "cycle finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use leadsync_core::{
        CrmSettings, FixedClock, RawRow, RecordingSleeper, Row, SheetRef, WindowSettings,
    };
    use leadsync_notify::{
        CrmError, LeadApi, LeadPayload, MessageSink, NotifyError, Renderer,
    };
    use leadsync_sync::{RemoteError, SheetStore};

    use super::*;

    struct Sheets {
        source: Vec<RawRow>,
        appended: Mutex<Vec<Row>>,
    }

    impl SheetStore for Sheets {
        fn read(&self, sheet: &SheetRef) -> Result<Vec<RawRow>, RemoteError> {
            match sheet.spreadsheet_id.as_str() {
                "src" => Ok(self.source.clone()),
                _ => Ok(vec![vec!["header".to_string()]]),
            }
        }

        fn append(&self, _sheet: &SheetRef, rows: &[Row]) -> Result<usize, RemoteError> {
            self.appended.lock().expect("lock").extend_from_slice(rows);
            Ok(rows.len())
        }
    }

    struct DeadChat;

    impl MessageSink for DeadChat {
        fn send(&self, _text: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Transport("connection refused".into()))
        }
    }

    struct CountingCrm(Arc<Mutex<usize>>);

    impl LeadApi for CountingCrm {
        fn add_lead(&self, _payload: &LeadPayload) -> Result<u64, CrmError> {
            let mut calls = self.0.lock().expect("lock");
            *calls += 1;
            Ok(*calls as u64)
        }
    }

    fn cycle(source: Vec<RawRow>, crm_calls: Arc<Mutex<usize>>) -> Cycle {
        let sheets = Arc::new(Sheets {
            source,
            appended: Mutex::new(Vec::new()),
        });
        let engine = SyncEngine::new(
            RemoteAccessor::new(sheets).with_sleeper(Arc::new(RecordingSleeper::new())),
            SheetRef::new("src", "Leads"),
            SheetRef::new("dst", "Leads"),
            WindowSettings::default(),
        )
        .with_clock(Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap())));
        Cycle::new(engine)
            .with_notifier(
                Notifier::new(Box::new(DeadChat), Renderer::new().expect("renderer"))
                    .with_sleeper(Arc::new(RecordingSleeper::new())),
            )
            .with_uploader(LeadUploader::new(
                Box::new(CountingCrm(crm_calls)),
                Renderer::new().expect("renderer"),
                CrmSettings::new("https://crm.example/rest/1/key"),
            ))
    }

    fn source() -> Vec<RawRow> {
        vec![
            vec!["header".to_string()],
            ["2025-01-01", "1", "Ann", "89120000001"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ]
    }

    #[test]
    fn downstream_failures_do_not_fail_the_cycle() {
        let calls = Arc::new(Mutex::new(0));
        let summary = cycle(source(), calls.clone())
            .run(CycleOptions::default())
            .expect("cycle");
        assert_eq!(summary.rows_transferred(), 1);
        assert_eq!(
            summary.notifications,
            Some(DispatchReport { sent: 0, failed: 1 })
        );
        assert_eq!(summary.crm.as_ref().map(|r| r.created), Some(1));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn dry_run_skips_collaborators() {
        let calls = Arc::new(Mutex::new(0));
        let summary = cycle(source(), calls.clone())
            .run(CycleOptions {
                dry_run: true,
                ..CycleOptions::default()
            })
            .expect("cycle");
        assert_eq!(summary.rows_transferred(), 1);
        assert!(summary.notifications.is_none());
        assert!(summary.crm.is_none());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn disabled_crm_is_not_called() {
        let calls = Arc::new(Mutex::new(0));
        let summary = cycle(source(), calls.clone())
            .run(CycleOptions {
                crm: false,
                ..CycleOptions::default()
            })
            .expect("cycle");
        assert!(summary.crm.is_none());
        assert!(summary.notifications.is_some());
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}

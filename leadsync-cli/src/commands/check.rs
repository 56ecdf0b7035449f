//! `leadsync check`: verify credentials and sheet access.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use leadsync_core::{Row, SheetRef};
use leadsync_sync::{GoogleSheetsClient, RemoteAccessor};

use super::ConfigArgs;

/// Header cells read from each sheet.
const HEADER_CELLS: &str = "A1:G1";
/// First data rows read from each sheet to show that lead rows parse.
const SAMPLE_CELLS: &str = "A2:G6";

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Tabled)]
struct CheckTableRow {
    #[tabled(rename = "sheet")]
    sheet: String,
    #[tabled(rename = "range")]
    range: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "header")]
    header: String,
    #[tabled(rename = "sample")]
    sample: String,
    #[tabled(skip)]
    ok: bool,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.config.load()?;
        let client = GoogleSheetsClient::from_key_file(&settings.credentials_path)
            .context("failed to load service-account credentials")?;
        let accessor = RemoteAccessor::new(Arc::new(client));

        let mut rows: Vec<CheckTableRow> = [
            ("source", &settings.source),
            ("destination", &settings.destination),
        ]
        .into_iter()
        .map(|(label, sheet)| check_sheet(&accessor, label, sheet))
        .collect();
        let failures = rows.iter().filter(|row| !row.ok).count();

        for row in &mut rows {
            row.status = if row.ok {
                row.status.green().to_string()
            } else {
                row.status.red().to_string()
            };
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");

        if failures > 0 {
            bail!("{failures} of 2 sheets are not reachable");
        }
        println!("{} both sheets are reachable", "✓".green());
        Ok(())
    }
}

fn check_sheet(accessor: &RemoteAccessor, label: &str, sheet: &SheetRef) -> CheckTableRow {
    let header_ref = sheet.cells(HEADER_CELLS);
    let header = accessor.read(&header_ref).map(|rows| match rows.into_iter().next() {
        Some(cells) => cells.join(" | "),
        None => "(empty)".to_string(),
    });
    let sample = accessor
        .read(&sheet.cells(SAMPLE_CELLS))
        .map(|rows| describe_sample(&rows));

    let (status, ok) = match (&header, &sample) {
        (Ok(_), Ok(_)) => ("ok", true),
        (Err(_), _) => ("header unreadable", false),
        (_, Err(_)) => ("sample unreadable", false),
    };
    CheckTableRow {
        sheet: format!("{label} {}", sheet.short_id()),
        range: header_ref.range,
        status: status.to_string(),
        header: header.unwrap_or_else(|err| err.to_string()),
        sample: sample.unwrap_or_else(|err| err.to_string()),
        ok,
    }
}

/// One line per sample row: its phone after shaping, or `no phone`.
fn describe_sample(rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "0 rows".to_string();
    }
    let mut lines = vec![format!("{} rows", rows.len())];
    lines.extend(rows.iter().map(|cells| {
        let row = Row::shape(cells);
        let phone = row.phone().trim();
        let phone = if phone.is_empty() { "no phone" } else { phone };
        format!("{phone} ({} cols)", cells.len())
    }));
    lines.join("\n")
}

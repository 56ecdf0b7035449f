//! `leadsync sync`: one cycle: transfer new leads, notify, upload to CRM.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use leadsync_daemon::{Cycle, CycleOptions, CycleSummary};

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Report what would be transferred without writing to the destination.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip chat notifications.
    #[arg(long)]
    pub no_notify: bool,

    /// Skip CRM lead creation.
    #[arg(long)]
    pub no_crm: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct LeadTableRow {
    #[tabled(rename = "date")]
    date: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "phone")]
    phone: String,
    #[tabled(rename = "comment")]
    comment: String,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.config.load()?;
        let cycle = Cycle::from_settings(&settings).context("failed to set up sync")?;
        let summary = cycle
            .run(CycleOptions {
                dry_run: self.dry_run,
                notify: !self.no_notify,
                crm: !self.no_crm,
            })
            .context("sync failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to serialize summary")?
            );
            return Ok(());
        }
        print_summary(&summary, self.dry_run);
        Ok(())
    }
}

fn print_summary(summary: &CycleSummary, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let report = &summary.sync;
    let stats = &report.stats;

    if report.is_empty() {
        println!(
            "{prefix}{} no new leads ({} source rows scanned)",
            "✓".green(),
            stats.scanned
        );
    } else {
        let verb = if dry_run { "would transfer" } else { "transferred" };
        println!(
            "{prefix}{} {verb} {} new leads in {} ms",
            "✓".green(),
            report.new_rows.len(),
            summary.duration_ms
        );
        let rows: Vec<LeadTableRow> = report
            .new_rows
            .iter()
            .map(|row| LeadTableRow {
                date: row.date().to_string(),
                name: row.name().to_string(),
                phone: row.phone().to_string(),
                comment: row.comment().to_string(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if stats.rejected() > 0 {
        println!(
            "  skipped: {} duplicate, {} without phone, {} invalid phone",
            stats.duplicate, stats.no_phone, stats.invalid_phone
        );
    }
    if let Some(sent) = &summary.notifications {
        println!("  telegram: {} sent, {} failed", sent.sent, sent.failed);
    }
    if let Some(crm) = &summary.crm {
        println!("  crm: {} created, {} failed", crm.created, crm.failed);
        for lead in crm.leads.iter().filter(|lead| !lead.is_created()) {
            let reason = lead.error.as_deref().unwrap_or("unknown error");
            println!("    {} {} ({}): {reason}", "✗".red(), lead.name, lead.phone);
        }
    }
}

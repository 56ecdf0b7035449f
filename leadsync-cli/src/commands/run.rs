//! `leadsync run`: foreground scheduler.

use anyhow::{Context, Result};
use clap::Args;

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.config.load()?;
        println!(
            "Syncing {} -> {} every {}s (ctrl-c or SIGTERM to stop)",
            settings.source,
            settings.destination,
            settings.interval.as_secs()
        );
        let stats = leadsync_daemon::start_blocking(settings).context("scheduler failed")?;
        println!(
            "Stopped after {} runs ({} failed), {} leads transferred",
            stats.runs, stats.failures, stats.rows_transferred
        );
        Ok(())
    }
}

//! Leadsync: move new leads between two Google Sheets and announce them.
//!
//! # Usage
//!
//! ```text
//! leadsync sync [--config FILE] [--dry-run] [--no-notify] [--no-crm] [--json]
//! leadsync run [--config FILE]
//! leadsync check [--config FILE]
//! leadsync normalize PHONE...
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, normalize::NormalizeArgs, run::RunArgs, sync::SyncArgs};
use leadsync_daemon::{init_tracing, LogFormat};

#[derive(Parser, Debug)]
#[command(
    name = "leadsync",
    version,
    about = "Incrementally sync leads between two Google Sheets",
    long_about = None,
)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one sync cycle and exit.
    Sync(SyncArgs),

    /// Run sync cycles on the configured interval until ctrl-c or SIGTERM.
    Run(RunArgs),

    /// Read the header and a few sample rows of both sheets to verify access.
    Check(CheckArgs),

    /// Print the canonical form of phone numbers.
    Normalize(NormalizeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    });
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Run(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::Normalize(args) => args.run(),
    }
}

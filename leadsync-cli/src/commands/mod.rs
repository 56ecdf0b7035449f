pub mod check;
pub mod normalize;
pub mod run;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use leadsync_core::Settings;

/// Settings file read when `--config` is not given. Optional.
pub const DEFAULT_CONFIG_FILE: &str = "leadsync.yaml";

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Settings file (YAML). Environment variables override its values.
    #[arg(long, short, env = "LEADSYNC_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<Settings> {
        let path = match &self.config {
            Some(path) => Some(path.clone()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };
        Settings::load(path.as_deref(), |key| std::env::var(key).ok())
            .context("failed to load settings")
    }
}

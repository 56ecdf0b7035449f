//! `leadsync normalize`: canonical form of phone numbers.

use anyhow::Result;
use clap::Args;

use leadsync_core::normalize_phone;

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Phone numbers in any common notation.
    #[arg(required = true)]
    pub phones: Vec<String>,
}

impl NormalizeArgs {
    pub fn run(self) -> Result<()> {
        for phone in &self.phones {
            match normalize_phone(phone) {
                Some(canonical) => println!("{phone}\t{canonical}"),
                None => println!("{phone}\tinvalid"),
            }
        }
        Ok(())
    }
}

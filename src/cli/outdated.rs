//! Report installed packages that have newer versions on the sources.
//!
//! ```bash
//! nupm outdated            # table
//! nupm outdated --check    # exit 1 when anything is outdated (CI)
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

use crate::cli::{CliConfig, open_engine};

/// Arguments of `nupm outdated`.
#[derive(Debug, Args)]
pub struct OutdatedCommand {
    /// Exit with code 1 when updates are available
    #[arg(long)]
    check: bool,
}

impl OutdatedCommand {
    /// Prints current and latest versions for each outdated package.
    pub fn execute(self, context: &Path, _config: &CliConfig) -> Result<()> {
        let engine = open_engine(context)?;
        let outdated = engine.outdated();
        engine.close();
        let outdated = outdated?;

        if outdated.is_empty() {
            println!("{}", "All packages are up to date!".green());
            return Ok(());
        }

        println!("{:<40} {:<16} {}", "Package".bold(), "Current".bold(), "Latest".bold());
        println!("{}", "─".repeat(72));
        for (current, latest) in &outdated {
            println!(
                "{:<40} {:<16} {}",
                current.id().yellow(),
                current.version(),
                latest.version().green()
            );
        }

        if self.check {
            std::process::exit(1);
        }
        Ok(())
    }
}

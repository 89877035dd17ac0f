//! List installed packages.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::{CliConfig, open_engine};

/// Arguments of `nupm list`.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    format: String,
}

#[derive(Debug, Serialize)]
struct ListedPackage {
    id: String,
    version: String,
    manual: bool,
}

impl ListCommand {
    /// Prints every installed package with whether it was installed manually.
    pub fn execute(self, context: &Path, _config: &CliConfig) -> Result<()> {
        let engine = open_engine(context)?;
        let listed: Vec<ListedPackage> = engine
            .installed()
            .packages()
            .into_iter()
            .map(|p| ListedPackage {
                id: p.id().to_string(),
                version: p.version().to_string(),
                manual: engine.manifest().get(p.id()).is_some_and(|e| e.manually_installed),
            })
            .collect();
        engine.close();

        if self.format == "json" {
            println!("{}", serde_json::to_string_pretty(&listed)?);
            return Ok(());
        }

        if listed.is_empty() {
            println!("No packages installed");
            return Ok(());
        }
        println!("{:<40} {:<16} {}", "Package".bold(), "Version".bold(), "Manual".bold());
        println!("{}", "─".repeat(64));
        for package in &listed {
            let manual = if package.manual { "yes" } else { "" };
            println!("{:<40} {:<16} {}", package.id.cyan(), package.version, manual);
        }
        Ok(())
    }
}

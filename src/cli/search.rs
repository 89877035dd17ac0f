//! Search the configured sources.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

use crate::cli::{CliConfig, open_engine};
use crate::source::SearchQuery;

/// Arguments of `nupm search`.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Text matched against package id, title and description
    term: String,

    /// Include prerelease versions
    #[arg(long)]
    prerelease: bool,

    /// Show every version instead of the latest per package
    #[arg(long)]
    all_versions: bool,

    /// Maximum number of results per source
    #[arg(long, default_value_t = 30)]
    take: usize,

    /// Number of results to skip per source
    #[arg(long, default_value_t = 0)]
    skip: usize,
}

impl SearchCommand {
    /// Prints matching packages, one per line.
    pub fn execute(self, context: &Path, _config: &CliConfig) -> Result<()> {
        let engine = open_engine(context)?;
        let query = SearchQuery {
            include_all_versions: self.all_versions,
            include_prerelease: self.prerelease,
            count: self.take,
            skip: self.skip,
            ..SearchQuery::new(&self.term)
        };
        let results = engine.search(&query);
        engine.close();
        let results = results?;

        if results.is_empty() {
            println!("No packages match '{}'", self.term);
            return Ok(());
        }
        for package in &results {
            let summary = package
                .summary
                .as_deref()
                .or(package.description.as_deref())
                .map(|s| s.lines().next().unwrap_or_default().to_string())
                .unwrap_or_default();
            println!("{} {}  {}", package.id().cyan(), package.version(), summary.dimmed());
        }
        Ok(())
    }
}

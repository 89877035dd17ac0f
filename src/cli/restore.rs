//! Restore every package the manifest lists.
//!
//! ```bash
//! nupm restore                 # current directory
//! nupm restore path/to/project # explicit context directory
//! ```
//!
//! Failures of individual packages do not stop the run. They are listed at the
//! end and the command exits non-zero.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::cli::{CliConfig, open_engine};
use crate::core::NupmError;
use crate::utils::{ProgressBar, ProjectLock};

/// Arguments of `nupm restore`.
#[derive(Debug, Args)]
pub struct RestoreCommand {
    /// Context directory (overrides `--context`)
    #[arg(value_name = "CONTEXT_PATH")]
    context_path: Option<PathBuf>,
}

impl RestoreCommand {
    /// Runs the restore for the positional path, or `context` when absent.
    pub fn execute(self, context: &Path, config: &CliConfig) -> Result<()> {
        let context = self.context_path.as_deref().unwrap_or(context);
        let _lock = ProjectLock::acquire(context, "restore")?;

        let mut engine = open_engine(context)?;
        let progress = ProgressBar::new(engine.manifest().len() as u64, config.progress_enabled());
        let report = engine.restore_with_progress(&progress);
        progress.finish_and_clear();
        engine.close();
        let report = report?;

        let quiet = config.log_level.is_none();
        if !quiet {
            for dir in &report.removed_orphans {
                println!("{} {}", "Removed".yellow(), dir.display());
            }
        }

        if report.is_success() {
            if !quiet {
                println!(
                    "{} {} package(s) restored",
                    "✓".green(),
                    report.installed.len()
                );
            }
            return Ok(());
        }

        eprintln!("{}", "Some packages failed to install:".red().bold());
        for failure in &report.failed {
            eprintln!("  {} {}: {}", "✗".red(), failure.identity, failure.reason);
        }
        Err(NupmError::Other {
            message: format!(
                "{} of {} package(s) failed to restore",
                report.failed.len(),
                report.failed.len() + report.installed.len()
            ),
        }
        .into())
    }
}

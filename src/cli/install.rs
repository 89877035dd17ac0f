//! Install a single package and record it in the manifest.
//!
//! ```bash
//! nupm install Newtonsoft.Json                     # latest stable
//! nupm install Newtonsoft.Json --version 12.0.3    # exact version
//! nupm install Newtonsoft.Json --version "[12.0,13.0)"
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

use crate::cli::{CliConfig, open_engine};
use crate::package::PackageIdentifier;
use crate::utils::{ProgressBar, ProjectLock};

/// Arguments of `nupm install`.
#[derive(Debug, Args)]
pub struct InstallCommand {
    /// Package id
    id: String,

    /// Version or version range; latest when omitted
    #[arg(long)]
    version: Option<String>,
}

impl InstallCommand {
    /// Installs the package as manually installed.
    pub fn execute(self, context: &Path, config: &CliConfig) -> Result<()> {
        let _lock = ProjectLock::acquire(context, "restore")?;
        let mut engine = open_engine(context)?;

        let request = PackageIdentifier::new(&self.id, self.version.unwrap_or_default());
        let spinner = ProgressBar::new_spinner(config.progress_enabled());
        spinner.set_message(format!("Installing {}", request.id));
        let result = engine.install(&request, true);
        spinner.finish_and_clear();
        engine.close();

        let package = result?;
        if config.log_level.is_some() {
            println!("{} Installed {} {}", "✓".green(), package.id().bold(), package.version());
        }
        Ok(())
    }
}

//! Remove a package from the project.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

use crate::cli::{CliConfig, open_engine};
use crate::core::NupmError;
use crate::utils::ProjectLock;

/// Arguments of `nupm uninstall`.
#[derive(Debug, Args)]
pub struct UninstallCommand {
    /// Package id
    id: String,

    /// Leave dependencies installed even when nothing else uses them
    #[arg(long)]
    keep_dependencies: bool,
}

impl UninstallCommand {
    /// Uninstalls the package, and its unused dependencies unless asked not to.
    pub fn execute(self, context: &Path, config: &CliConfig) -> Result<()> {
        let _lock = ProjectLock::acquire(context, "restore")?;
        let mut engine = open_engine(context)?;
        let removed = engine.uninstall(&self.id, !self.keep_dependencies);
        engine.close();

        if !removed? {
            return Err(NupmError::Other {
                message: format!("Package '{}' is not installed", self.id),
            }
            .into());
        }
        if config.log_level.is_some() {
            println!("{} Uninstalled {}", "✓".green(), self.id.bold());
        }
        Ok(())
    }
}

//! Command-line interface for nupm.
//!
//! Every command works on one *context directory*: the folder holding
//! `packages.config` and the optional `nupm.toml`. It defaults to the current
//! directory and can be changed with the global `-C/--context` option (or,
//! for `restore`, the positional path).
//!
//! # Commands
//!
//! - `restore [contextPath]` - install everything the manifest lists and remove
//!   orphaned package folders. Exits non-zero when any package failed.
//! - `install <id> [--version v]` - install one package and record it.
//! - `uninstall <id> [--keep-dependencies]` - remove a package.
//! - `list` - show installed packages.
//! - `search <term>` - query the configured sources.
//! - `outdated` - show installed packages with newer versions available.
//!
//! Commands that change the install directory hold a [`ProjectLock`] for their
//! whole run.
//!
//! # Configuration flow
//!
//! [`Cli::build_config`] turns the global flags into a [`CliConfig`], which
//! installs the logging subscriber and decides whether progress bars are drawn.
//! Tests can build their own [`CliConfig`] and call
//! [`Cli::execute_with_config`] directly.
//!
//! [`ProjectLock`]: crate::utils::ProjectLock

pub mod install;
pub mod list;
pub mod outdated;
pub mod restore;
pub mod search;
pub mod uninstall;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::ProjectConfig;
use crate::installer::InstallEngine;

/// Runtime settings derived from the global command-line flags.
///
/// # Examples
///
/// ```rust
/// use nupm_cli::cli::CliConfig;
///
/// let config = CliConfig::new();
/// assert_eq!(config.log_level, None);
/// assert!(!config.no_progress);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Default log filter (`debug`, `info`, ...). `None` disables logging
    /// unless `RUST_LOG` is set.
    pub log_level: Option<String>,

    /// Never draw progress bars.
    pub no_progress: bool,
}

impl CliConfig {
    /// A configuration with logging off and progress enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the global `tracing` subscriber, writing to stderr.
    ///
    /// `RUST_LOG` takes precedence over [`Self::log_level`]. Calling this more
    /// than once is harmless; only the first subscriber sticks.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(self.log_level.as_deref().unwrap_or("off"))
        });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Whether commands may draw progress bars.
    #[must_use]
    pub fn progress_enabled(&self) -> bool {
        !self.no_progress && self.log_level.is_some()
    }
}

/// NuGet package restore for project folders.
#[derive(Parser)]
#[command(
    name = "nupm",
    about = "NuGet package restore for project folders",
    version,
    long_about = "nupm resolves NuGet packages listed in packages.config, caches their archives, \
                  and extracts framework-appropriate content into the project's install directory."
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Show debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors and command results.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable progress bars.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Context directory holding `packages.config` (defaults to the current directory).
    #[arg(short = 'C', long = "context", global = true, value_name = "DIR")]
    context: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Install every package listed in the manifest and remove orphans.
    Restore(restore::RestoreCommand),

    /// Install a package and record it in the manifest.
    Install(install::InstallCommand),

    /// Remove a package from the manifest and the install directory.
    Uninstall(uninstall::UninstallCommand),

    /// List installed packages.
    List(list::ListCommand),

    /// Search the configured sources.
    Search(search::SearchCommand),

    /// Show installed packages that have newer versions.
    Outdated(outdated::OutdatedCommand),
}

impl Cli {
    /// Builds the configuration from the flags, installs logging and runs the command.
    pub fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config)
    }

    /// Translates the global flags into a [`CliConfig`].
    ///
    /// `--verbose` selects `debug`, `--quiet` turns logging off, anything else
    /// logs at `info`.
    ///
    /// ```rust
    /// use clap::Parser;
    /// use nupm_cli::cli::Cli;
    ///
    /// let cli = Cli::parse_from(["nupm", "--verbose", "restore"]);
    /// assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));
    /// ```
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
        }
    }

    /// Runs the command with an explicit configuration. Logging is not touched.
    pub fn execute_with_config(self, config: CliConfig) -> Result<()> {
        let context = self.context.unwrap_or_else(|| PathBuf::from("."));

        match self.command {
            Commands::Restore(cmd) => cmd.execute(&context, &config),
            Commands::Install(cmd) => cmd.execute(&context, &config),
            Commands::Uninstall(cmd) => cmd.execute(&context, &config),
            Commands::List(cmd) => cmd.execute(&context, &config),
            Commands::Search(cmd) => cmd.execute(&context, &config),
            Commands::Outdated(cmd) => cmd.execute(&context, &config),
        }
    }
}

/// Loads the project configuration for `context` and opens an engine on it.
pub(crate) fn open_engine(context: &std::path::Path) -> Result<InstallEngine> {
    let config = ProjectConfig::load(context)?;
    InstallEngine::open(config)
}

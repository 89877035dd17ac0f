//! nupm CLI entry point
//!
//! Parses the command line, runs the command and renders errors. Commands:
//! - `restore` - install everything `packages.config` lists
//! - `install` / `uninstall` - add or remove one package
//! - `list` - show installed packages
//! - `search` - query the configured sources
//! - `outdated` - show packages with newer versions

use anyhow::Result;
use clap::Parser;
use nupm_cli::cli;
use nupm_cli::core::error::user_friendly_error;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute() {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}

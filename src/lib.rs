//! nupm - NuGet package restore for project folders
//!
//! nupm reads the packages a project declares in `packages.config`, resolves
//! them against NuGet feeds or local folders, caches the archives, and
//! extracts each package into `{install_dir}/{Id}.{Version}/`, keeping only
//! the content that matches the project's target framework and architecture.
//!
//! # Architecture Overview
//!
//! - `packages.config` (the [`manifest`]) lists what the project wants. It is
//!   rewritten only when the set of packages actually changes.
//! - The install directory holds what the project has. It is scanned into an
//!   [`installer::InstalledIndex`] whenever an engine is opened.
//! - [`installer::InstallEngine`] reconciles the two: resolving, downloading,
//!   extracting and cleaning packages, and garbage-collecting folders the
//!   manifest no longer accounts for.
//!
//! Resolution is greedy. Each dependency edge is resolved on its own, picking
//! the highest version inside its range; there is no backtracking.
//!
//! # Core Modules
//!
//! - [`version`] - NuGet version parsing, ordering and interval ranges
//! - [`package`] - package identities, metadata and `.nuspec` descriptors
//! - [`source`] - local folder and remote OData feeds behind one trait
//! - [`cache`] - the machine-wide archive cache and feed credentials
//! - [`manifest`] - `packages.config` reading and writing
//! - [`installer`] - the install engine and its on-disk state
//! - [`cleaner`] - framework selection and content stripping after extraction
//!
//! ## Supporting Modules
//!
//! - [`config`] - per-project `nupm.toml`
//! - [`cli`] - command-line interface
//! - [`core`] - error types and user-facing error rendering
//! - [`constants`] - shared file names, defaults and limits
//! - [`utils`] - filesystem helpers, progress bars, the project lock
//!
//! # Example
//!
//! ```rust,no_run
//! use nupm_cli::config::ProjectConfig;
//! use nupm_cli::installer::InstallEngine;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = ProjectConfig::load(Path::new("path/to/project"))?;
//! let mut engine = InstallEngine::open(config)?;
//! let report = engine.restore()?;
//! for failure in &report.failed {
//!     eprintln!("{}: {}", failure.identity, failure.reason);
//! }
//! engine.close();
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod installer;
pub mod manifest;
pub mod package;
pub mod source;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

//! Test utilities for nupm
//!
//! Helpers shared by unit tests and the integration suite:
//! - [`NupkgBuilder`] writes real package archives with a descriptor
//! - [`TestEnvironment`] sets up a context directory, a local feed and a
//!   private archive cache inside one temporary directory
//! - [`init_test_logging`] routes `tracing` output to the test writer
//!
//! # Example
//!
//! ```rust,no_run
//! use nupm_cli::package::PackageIdentifier;
//! use nupm_cli::test_utils::{NupkgBuilder, TestEnvironment};
//!
//! # fn example() -> anyhow::Result<()> {
//! let env = TestEnvironment::new()?;
//! env.publish(NupkgBuilder::new("Foo", "1.0.0").file("lib/net45/Foo.dll", b"dll"))?;
//!
//! let mut engine = env.engine()?;
//! engine.install(&PackageIdentifier::new("Foo", "1.0.0"), true)?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod environment;

pub use builder::NupkgBuilder;
pub use environment::TestEnvironment;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=nupm_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

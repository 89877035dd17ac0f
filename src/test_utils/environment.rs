//! A throwaway project with its own feed and cache.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::NupkgBuilder;
use crate::config::ProjectConfig;
use crate::constants::{CONFIG_FILE_NAME, DEFAULT_INSTALL_DIR, MANIFEST_FILE_NAME};
use crate::installer::InstallEngine;

/// Layout inside the temporary directory:
///
/// ```text
/// project/   context directory (nupm.toml, packages.config, Packages/)
/// feed/      local source named "feed"
/// cache/     archive cache
/// ```
pub struct TestEnvironment {
    /// Owns the directory tree; dropped last
    pub temp_dir: TempDir,
    context_dir: PathBuf,
    feed_dir: PathBuf,
    cache_dir: PathBuf,
}

impl TestEnvironment {
    /// Creates the directories and a `nupm.toml` pointing at the local feed.
    pub fn new() -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        let context_dir = temp_dir.path().join("project");
        let feed_dir = temp_dir.path().join("feed");
        let cache_dir = temp_dir.path().join("cache");
        for dir in [&context_dir, &feed_dir, &cache_dir] {
            fs::create_dir_all(dir)?;
        }

        let env = Self {
            temp_dir,
            context_dir,
            feed_dir,
            cache_dir,
        };
        env.write_config("")?;
        Ok(env)
    }

    /// Rewrites `nupm.toml`. `extra` is inserted after the cache setting and
    /// before the feed's `[[sources]]` table, so it may hold top-level keys
    /// followed by tables.
    pub fn write_config(&self, extra: &str) -> Result<()> {
        let content = format!(
            "cache_dir = '{}'\n{extra}\n[[sources]]\nname = \"feed\"\npath = '{}'\n",
            self.cache_dir.display(),
            self.feed_dir.display()
        );
        fs::write(self.context_dir.join(CONFIG_FILE_NAME), content)
            .context("Failed to write test config")
    }

    /// Writes a manifest verbatim.
    pub fn write_manifest(&self, xml: &str) -> Result<()> {
        fs::write(self.manifest_path(), xml).context("Failed to write test manifest")
    }

    /// Puts a package archive into the feed.
    pub fn publish(&self, package: NupkgBuilder) -> Result<PathBuf> {
        package.write_to_dir(&self.feed_dir)
    }

    /// Opens an engine over the project.
    pub fn engine(&self) -> Result<InstallEngine> {
        InstallEngine::open(ProjectConfig::load(&self.context_dir)?)
    }

    /// The context directory.
    #[must_use]
    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    /// The local feed directory.
    #[must_use]
    pub fn feed_dir(&self) -> &Path {
        &self.feed_dir
    }

    /// The archive cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `{context}/Packages`.
    #[must_use]
    pub fn install_dir(&self) -> PathBuf {
        self.context_dir.join(DEFAULT_INSTALL_DIR)
    }

    /// `{context}/packages.config`.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.context_dir.join(MANIFEST_FILE_NAME)
    }
}

//! Local package archive cache.
//!
//! Every archive the engine installs passes through the cache directory as
//! `{Id}.{Version}.nupkg`. A second restore, or a second project on the same
//! machine, extracts from the cached copy instead of asking the source again.
//!
//! # Layout
//!
//! ```text
//! ~/.cache/nupm/packages/
//! ├── Newtonsoft.Json.13.0.1.nupkg
//! └── Foo.Bar.2.0.0-beta.nupkg
//! ```
//!
//! The default location comes from [`dirs::cache_dir`] and can be overridden
//! with `cache_dir` in `nupm.toml` or the `NUPM_CACHE_DIR` environment variable.
//!
//! # Writes
//!
//! Archives are written to a temporary file inside the cache directory and
//! persisted under their final name only once complete, so an interrupted
//! download never leaves a truncated archive that later looks like a cache hit.
//! Downloads are streamed to disk rather than buffered in memory.

pub mod credentials;

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::NupmError;
use crate::package::{Package, PackageIdentifier, PackageOrigin};
use crate::utils::fs::ensure_dir;
pub use credentials::{CredentialProvider, CredentialStore, Credentials};

/// Archive cache keyed by package identity.
#[derive(Debug)]
pub struct PackageCache {
    dir: PathBuf,
    client: reqwest::blocking::Client,
    credentials: Rc<CredentialStore>,
}

impl PackageCache {
    /// Opens (and creates) the cache at `dir`.
    ///
    /// `download_timeout` bounds each archive download; `None` means no timeout,
    /// which suits large archives on slow links.
    pub fn new(
        dir: impl Into<PathBuf>,
        download_timeout: Option<Duration>,
        credentials: Rc<CredentialStore>,
    ) -> Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir)
            .with_context(|| format!("Failed to create package cache: {}", dir.display()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(download_timeout)
            .user_agent(concat!("nupm/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for downloads")?;

        Ok(Self {
            dir,
            client,
            credentials,
        })
    }

    /// Cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the archive for `identity` lives (whether or not it exists).
    #[must_use]
    pub fn archive_path(&self, identity: &PackageIdentifier) -> PathBuf {
        self.dir.join(identity.archive_file_name())
    }

    /// The cached archive for `identity`, or `None` on a miss.
    #[must_use]
    pub fn get_cached_archive(&self, identity: &PackageIdentifier) -> Option<PathBuf> {
        let path = self.archive_path(identity);
        path.is_file().then_some(path)
    }

    /// Copies an archive from a local source into the cache, unmodified.
    pub fn store_from_local_source(
        &self,
        identity: &PackageIdentifier,
        source_path: &Path,
    ) -> Result<PathBuf> {
        let target = self.archive_path(identity);
        let mut source = File::open(source_path).map_err(|e| NupmError::ArchiveCorrupt {
            path: source_path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {}", self.dir.display()))?;
        std::io::copy(&mut source, &mut temp)
            .with_context(|| format!("Failed to copy {} into the cache", source_path.display()))?;
        temp.persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to store archive: {}", target.display()))?;

        debug!(id = %identity.id, version = %identity.version, path = %target.display(), "Cached archive from local source");
        Ok(target)
    }

    /// Downloads an archive into the cache.
    ///
    /// Sends Basic authentication when `credentials` is given. Otherwise the
    /// credential store is asked for `feed_uri` (the root of the feed the package
    /// came from, or the download URL itself when unknown), and the request goes
    /// out anonymously when no provider has credentials.
    ///
    /// # Errors
    ///
    /// Fails with [`NupmError::Network`] on connection errors, timeouts, and
    /// non-success status codes. Network errors are not retried here; the cached
    /// archive of a successful download makes the next restore skip it.
    pub fn store_from_download(
        &self,
        identity: &PackageIdentifier,
        url: &str,
        feed_uri: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> Result<PathBuf> {
        let operation = format!("downloading {identity}");
        let network = |reason: String| NupmError::Network {
            operation: operation.clone(),
            reason,
        };

        let looked_up;
        let credentials = match credentials {
            Some(c) => Some(c),
            None => {
                looked_up = self.credentials.lookup(feed_uri.unwrap_or(url));
                looked_up.as_ref()
            }
        };

        info!(id = %identity.id, version = %identity.version, "Downloading {url}");
        let mut request = self.client.get(url);
        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let mut response = request.send().map_err(|e| network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(network(format!("server answered {status}")).into());
        }

        let target = self.archive_path(identity);
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {}", self.dir.display()))?;
        let bytes = std::io::copy(&mut response, &mut temp).map_err(|e| network(e.to_string()))?;
        temp.persist(&target)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to store archive: {}", target.display()))?;

        debug!(id = %identity.id, version = %identity.version, bytes, "Download complete");
        Ok(target)
    }

    /// The archive for a resolved package: the cached copy on a hit, otherwise
    /// fetched from the package's origin and cached. `feed_uri` and
    /// `credentials` are passed on to [`Self::store_from_download`].
    pub fn fetch(
        &self,
        package: &Package,
        feed_uri: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> Result<PathBuf> {
        if let Some(path) = self.get_cached_archive(&package.identity) {
            debug!(id = %package.id(), version = %package.version(), "Archive cache hit");
            return Ok(path);
        }

        match &package.origin {
            Some(PackageOrigin::LocalFile { path, .. }) => {
                self.store_from_local_source(&package.identity, path)
            }
            Some(PackageOrigin::Remote { url, .. }) => {
                self.store_from_download(&package.identity, url, feed_uri, credentials)
            }
            None => Err(NupmError::PackageNotFound {
                id: package.id().to_string(),
                version: package.version().to_string(),
            }
            .into()),
        }
    }
}

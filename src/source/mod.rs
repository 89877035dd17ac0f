//! Package sources: where package metadata and archives come from.
//!
//! # Components
//!
//! - [`PackageSource`] - the query contract every feed implements
//! - [`local::LocalSource`] - a directory of `.nupkg` files
//! - [`remote::RemoteSource`] - a NuGet v2 (OData/Atom) HTTP feed
//! - [`PackageSourceConfig`] - one `[[sources]]` entry after expansion
//! - [`SourceManager`] - the enabled sources of a project, queried in order
//!
//! # Resolution
//!
//! A request is an id plus a version that is either a floor (`1.0`) or a range
//! (`[1.0,2.0)`). Each source answers with its best candidate: an exact version
//! match wins immediately, otherwise the highest version inside the range.
//! Prerelease candidates are only considered when the request itself is a
//! prerelease or prereleases were enabled in `nupm.toml`. Across sources the
//! first exact match wins, otherwise the strictly greatest candidate.

pub mod feed;
pub mod local;
pub mod remote;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{CredentialStore, Credentials};
use crate::package::{Package, PackageIdentifier};

/// A search query against one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text term matched against id, title and description
    pub term: String,
    /// Return every version instead of only the latest per id
    pub include_all_versions: bool,
    /// Include prerelease versions
    pub include_prerelease: bool,
    /// Page size
    pub count: usize,
    /// Number of results to skip
    pub skip: usize,
}

impl SearchQuery {
    /// A first-page query for `term` with a page size of 30.
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            include_all_versions: false,
            include_prerelease: false,
            count: 30,
            skip: 0,
        }
    }
}

/// Query contract of a package feed.
pub trait PackageSource {
    /// Source name from the configuration.
    fn name(&self) -> &str;

    /// Whether this source is a local directory.
    fn is_local(&self) -> bool;

    /// Every version of `request.id` inside `request.version`'s range.
    /// An empty version means all versions.
    fn find_packages_by_id(&self, request: &PackageIdentifier) -> Result<Vec<Package>>;

    /// The best package for `request`, or `None` when nothing satisfies it.
    fn get_specific_package(&self, request: &PackageIdentifier) -> Result<Option<Package>>;

    /// Packages matching a search term.
    fn search(&self, query: &SearchQuery) -> Result<Vec<Package>>;

    /// Newer versions of the `installed` packages, the newest per id unless
    /// `include_all_versions`.
    fn get_updates(
        &self,
        installed: &[PackageIdentifier],
        include_prerelease: bool,
        include_all_versions: bool,
    ) -> Result<Vec<Package>>;
}

/// A configured source after `~` and `$VAR` expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSourceConfig {
    /// Display name
    pub name: String,
    /// Expanded directory path or feed URL
    pub path: String,
    /// Static credentials, if configured
    pub credentials: Option<Credentials>,
    /// Whether `path` is a directory rather than an HTTP(S) URL
    pub is_local_path: bool,
    /// Disabled sources are never queried
    pub enabled: bool,
}

impl PackageSourceConfig {
    /// Expands `raw_path` once and derives [`Self::is_local_path`] from the result.
    pub fn new(
        name: impl Into<String>,
        raw_path: &str,
        credentials: Option<Credentials>,
        enabled: bool,
    ) -> Result<Self> {
        let path = shellexpand::full(raw_path)
            .map_err(|e| anyhow::anyhow!("Failed to expand source path '{raw_path}': {e}"))?
            .into_owned();
        let lower = path.to_ascii_lowercase();
        let is_local_path = !(lower.starts_with("http://") || lower.starts_with("https://"));

        Ok(Self {
            name: name.into(),
            path,
            credentials,
            is_local_path,
            enabled,
        })
    }

    /// The directory of a local source, resolved against `context_dir`.
    #[must_use]
    pub fn local_dir(&self, context_dir: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        if path.is_absolute() { path.to_path_buf() } else { context_dir.join(path) }
    }
}

/// The enabled sources of a project, in configuration order.
pub struct SourceManager {
    sources: Vec<Box<dyn PackageSource>>,
    configs: Vec<PackageSourceConfig>,
}

impl SourceManager {
    /// Builds a source for every enabled entry of `configs`.
    ///
    /// Local paths are resolved against `context_dir`; remote feeds use an HTTP
    /// transport with `metadata_timeout`.
    pub fn from_configs(
        configs: &[PackageSourceConfig],
        context_dir: &Path,
        include_prerelease: bool,
        metadata_timeout: Duration,
        credentials: &Rc<CredentialStore>,
    ) -> Result<Self> {
        let mut manager = Self::new();
        for config in configs.iter().filter(|c| c.enabled) {
            let source: Box<dyn PackageSource> = if config.is_local_path {
                Box::new(local::LocalSource::new(
                    &config.name,
                    config.local_dir(context_dir),
                    include_prerelease,
                ))
            } else {
                let transport = feed::HttpFeedTransport::new(metadata_timeout)?;
                Box::new(remote::RemoteSource::new(
                    config,
                    Box::new(transport),
                    Rc::clone(credentials),
                    include_prerelease,
                )?)
            };
            manager.add(config.clone(), source);
        }
        Ok(manager)
    }

    /// An empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            configs: Vec::new(),
        }
    }

    /// Appends a source; it is queried after the existing ones.
    pub fn add(&mut self, config: PackageSourceConfig, source: Box<dyn PackageSource>) {
        self.configs.push(config);
        self.sources.push(source);
    }

    /// The sources in query order.
    pub fn sources(&self) -> impl Iterator<Item = &dyn PackageSource> {
        self.sources.iter().map(|s| s.as_ref())
    }

    /// Whether no source is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Static credentials of the source called `name`.
    #[must_use]
    pub fn credentials_for(&self, name: &str) -> Option<&Credentials> {
        self.configs.iter().find(|c| c.name == name).and_then(|c| c.credentials.as_ref())
    }

    /// Root URL of the remote source called `name`, ending in `/`. Credential
    /// providers are asked for this URI when an archive is downloaded.
    #[must_use]
    pub fn feed_root(&self, name: &str) -> Option<String> {
        self.configs.iter().find(|c| c.name == name && !c.is_local_path).map(|c| {
            if c.path.ends_with('/') { c.path.clone() } else { format!("{}/", c.path) }
        })
    }

    /// Resolves `request` across all sources.
    ///
    /// The first exact match wins. Otherwise the candidate of a later source
    /// replaces the current best only when strictly greater. A source that fails
    /// is logged and skipped, so one unreachable feed does not hide the others.
    pub fn resolve(&self, request: &PackageIdentifier) -> Result<Option<Package>> {
        let mut best: Option<Package> = None;
        let mut last_error = None;

        for source in &self.sources {
            match source.get_specific_package(request) {
                Ok(Some(package)) => {
                    debug!(source = source.name(), id = %package.id(), version = %package.version(), "Source offered candidate");
                    if request.matches_exactly(package.version()) {
                        return Ok(Some(package));
                    }
                    best = Some(choose_greater(best, package));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(source = source.name(), id = %request.id, "Source query failed: {e:#}");
                    last_error = Some(e);
                }
            }
        }

        match (best, last_error) {
            (Some(package), _) => Ok(Some(package)),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }

    /// Searches every source and concatenates the results.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<Package>> {
        let mut results = Vec::new();
        for source in &self.sources {
            results.extend(source.search(query)?);
        }
        Ok(results)
    }

    /// Newest available version per installed id across all sources.
    pub fn get_updates(
        &self,
        installed: &[PackageIdentifier],
        include_prerelease: bool,
    ) -> Result<Vec<Package>> {
        let mut newest: Vec<Package> = Vec::new();
        for source in &self.sources {
            for candidate in source.get_updates(installed, include_prerelease, false)? {
                match newest.iter_mut().find(|p| p.identity.same_id(candidate.id())) {
                    Some(existing) => {
                        if candidate.identity.is_newer_than(&existing.identity) {
                            *existing = candidate;
                        }
                    }
                    None => newest.push(candidate),
                }
            }
        }
        newest.sort_by(|a, b| a.identity.compare(&b.identity));
        Ok(newest)
    }
}

impl Default for SourceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a candidate version may be offered for `request`.
pub(crate) fn accepts_prerelease(
    request: &PackageIdentifier,
    candidate: &Package,
    include_prerelease: bool,
) -> bool {
    include_prerelease || request.is_prerelease() || !candidate.identity.is_prerelease()
}

/// Keeps `best` unless `candidate` is strictly greater.
pub(crate) fn choose_greater(best: Option<Package>, candidate: Package) -> Package {
    match best {
        Some(best) if !candidate.identity.is_newer_than(&best.identity) => best,
        _ => candidate,
    }
}

/// Picks the best package for `request` from `candidates` in order: an exact
/// match returns immediately, otherwise the greatest in-range version.
pub(crate) fn select_best(
    request: &PackageIdentifier,
    candidates: impl IntoIterator<Item = Package>,
    include_prerelease: bool,
) -> Option<Package> {
    let mut best = None;
    for candidate in candidates {
        if !request.same_id(candidate.id())
            || !accepts_prerelease(request, &candidate, include_prerelease)
        {
            continue;
        }
        if request.matches_exactly(candidate.version()) {
            return Some(candidate);
        }
        if request.satisfies(candidate.version()) {
            best = Some(choose_greater(best, candidate));
        }
    }
    best
}

/// Newer versions of `current` among `candidates`: the newest one, or all of
/// them in ascending order when `include_all_versions`.
pub(crate) fn pick_updates(
    current: &PackageIdentifier,
    candidates: Vec<Package>,
    include_prerelease: bool,
    include_all_versions: bool,
) -> Vec<Package> {
    let mut newer: Vec<Package> = candidates
        .into_iter()
        .filter(|p| p.identity.is_newer_than(current))
        .filter(|p| include_prerelease || !p.identity.is_prerelease())
        .collect();
    newer.sort_by(|a, b| a.identity.compare_version(&b.identity));

    if include_all_versions {
        newer
    } else {
        newer.pop().into_iter().collect()
    }
}

/// The open-ended range `(version,)` used to ask for anything newer.
pub(crate) fn newer_than(identity: &PackageIdentifier) -> PackageIdentifier {
    PackageIdentifier::new(identity.id.clone(), format!("({},)", identity.version))
}

//! The install engine: resolution, download, extraction and cleanup.
//!
//! [`InstallEngine`] owns everything one restore needs: the manifest, the
//! in-memory [`InstalledIndex`], the enabled sources, the archive cache and the
//! content cleaner. It is opened for a context directory, used, and closed;
//! nothing it holds is process-global.
//!
//! # Install
//!
//! Each package moves through
//! `NotInstalled → ResolvingDependencies → Downloading → Extracting → Cleaning → Installed`,
//! or ends in `Failed`. Per request:
//!
//! 1. An installed package that satisfies the request is kept. One below the
//!    requested range is updated. One above it is kept unless the manifest pins
//!    a range that excludes it, which downgrades. An update or downgrade only
//!    touches the installed version once the replacement has been resolved.
//! 2. The package is resolved, and the dependency group for the configured
//!    framework is installed first, recursively. A failing dependency aborts the
//!    parent. Dependencies whose library the host already loads are skipped.
//! 3. The manifest is updated and saved *before* the archive is fetched, so an
//!    interrupted install is retried by the next restore.
//! 4. The archive comes from the cache or the package's source, is extracted
//!    into `{install_dir}/{Id}.{Version}/` and cleaned.
//!
//! Resolution is greedy: every dependency edge is resolved on its own against
//! the sources, with no global unification pass. A diamond can therefore end up
//! with whichever version the first edge to reach it picked, as long as later
//! edges are satisfied by it.
//!
//! # Restore
//!
//! [`InstallEngine::restore`] installs every manifest entry, keeps going after
//! failures, and then deletes install directories that no manifest entry
//! accounts for. Directories starting with `~unlinked.` are left alone.

pub mod extract;
pub mod index;

use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, error, info, warn};

use crate::cache::{CredentialStore, PackageCache};
use crate::cleaner::ContentCleaner;
use crate::config::ProjectConfig;
use crate::constants::{DESCRIPTOR_EXTENSION, UNLINKED_SOURCE_PREFIX};
use crate::core::NupmError;
use crate::manifest::Manifest;
use crate::package::{Package, PackageIdentifier, PackageOrigin, nuspec};
use crate::source::{SearchQuery, SourceManager};
use crate::version::NuGetVersion;
use crate::utils::ProgressBar;
use crate::utils::fs::{remove_dir_forced, remove_file_forced};

pub use extract::extract_package;
pub use index::{DirectoryScanner, InstalledIndex, InstalledPackageScanner};

/// Where a package is in its install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallState {
    /// Not on disk
    NotInstalled,
    /// Dependencies are being installed
    ResolvingDependencies,
    /// The archive is being fetched
    Downloading,
    /// The archive is being unpacked
    Extracting,
    /// The content cleaner is running
    Cleaning,
    /// On disk and in the index
    Installed,
    /// The last attempt failed
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotInstalled => "not installed",
            Self::ResolvingDependencies => "resolving dependencies",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Cleaning => "cleaning",
            Self::Installed => "installed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A manifest entry that could not be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedInstall {
    /// The manifest entry
    pub identity: PackageIdentifier,
    /// Rendered error chain
    pub reason: String,
}

/// Outcome of [`InstallEngine::restore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Packages that are installed after the restore
    pub installed: Vec<PackageIdentifier>,
    /// Entries that failed
    pub failed: Vec<FailedInstall>,
    /// Install directories that were garbage-collected
    pub removed_orphans: Vec<PathBuf>,
}

impl RestoreReport {
    /// Whether every manifest entry was installed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Installs, updates and removes the packages of one context directory.
pub struct InstallEngine {
    config: ProjectConfig,
    install_dir: PathBuf,
    manifest: Manifest,
    index: InstalledIndex,
    sources: SourceManager,
    cache: PackageCache,
    cleaner: ContentCleaner,
    credentials: Rc<CredentialStore>,
    states: HashMap<String, InstallState>,
    in_progress: Vec<String>,
}

impl InstallEngine {
    /// Opens the engine for `config`: loads the manifest, scans the install
    /// directory and builds the sources.
    pub fn open(config: ProjectConfig) -> Result<Self> {
        let credentials =
            Rc::new(CredentialStore::from_executables(&config.credential_provider_paths()));
        let sources = SourceManager::from_configs(
            &config.source_configs()?,
            config.context_dir(),
            config.include_prerelease,
            config.metadata_timeout(),
            &credentials,
        )?;
        let scanner = DirectoryScanner::new(config.install_path());
        Self::with_sources(config, sources, &scanner, credentials)
    }

    /// Opens the engine with explicit sources and installed-package scanner.
    pub fn with_sources(
        config: ProjectConfig,
        sources: SourceManager,
        scanner: &dyn InstalledPackageScanner,
        credentials: Rc<CredentialStore>,
    ) -> Result<Self> {
        let install_dir = config.install_path();
        let manifest = Manifest::load(&config.manifest_path())?;
        let index = InstalledIndex::from_scanner(scanner)?;
        let cache = PackageCache::new(
            config.cache_path(),
            config.download_timeout(),
            Rc::clone(&credentials),
        )?;
        let cleaner = ContentCleaner::new(
            config.framework.clone(),
            config.architecture.clone(),
            config.tools_path(),
            config.asset_mappings(),
        );

        debug!(
            context = %config.context_dir().display(),
            manifest_entries = manifest.len(),
            installed = index.len(),
            "Opened install engine"
        );

        Ok(Self {
            config,
            install_dir,
            manifest,
            index,
            sources,
            cache,
            cleaner,
            credentials,
            states: HashMap::new(),
            in_progress: Vec::new(),
        })
    }

    /// Ends the session, dropping cached credentials.
    pub fn close(self) {
        self.credentials.clear_cached_credentials();
        debug!(context = %self.config.context_dir().display(), "Closed install engine");
    }

    /// The manifest as currently held in memory (always saved).
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Packages on disk.
    #[must_use]
    pub fn installed(&self) -> &InstalledIndex {
        &self.index
    }

    /// Where packages are extracted.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// The archive cache.
    #[must_use]
    pub fn cache(&self) -> &PackageCache {
        &self.cache
    }

    /// Last state reached by `id` during this session.
    #[must_use]
    pub fn state(&self, id: &str) -> InstallState {
        self.states.get(&id.to_ascii_lowercase()).copied().unwrap_or_else(|| {
            if self.index.contains(id) { InstallState::Installed } else { InstallState::NotInstalled }
        })
    }

    fn set_state(&mut self, identity: &PackageIdentifier, state: InstallState) {
        debug!(id = %identity.id, version = %identity.version, %state, "Install state");
        self.states.insert(identity.id.to_ascii_lowercase(), state);
    }

    /// Installs `request` and its dependencies.
    ///
    /// `manual` marks a package the user asked for; dependencies are always
    /// recorded as non-manual.
    ///
    /// # Errors
    ///
    /// [`NupmError::PackageNotFound`] when no source satisfies the request,
    /// [`NupmError::DependencyFailed`] when a dependency could not be installed,
    /// and the underlying fetch, extraction or cleanup error otherwise.
    pub fn install(&mut self, request: &PackageIdentifier, manual: bool) -> Result<Package> {
        let key = request.id.to_ascii_lowercase();
        if self.in_progress.contains(&key) {
            debug!(id = %request.id, "Dependency cycle, already being installed");
            return Ok(Package::new(request.id.clone(), request.version.clone()));
        }

        if let Some(installed) = self.index.get(&request.id).cloned() {
            return self.install_over(request, installed, manual);
        }

        self.in_progress.push(key);
        let result = self.install_fresh(request, manual);
        self.in_progress.pop();
        result
    }

    fn install_over(
        &mut self,
        request: &PackageIdentifier,
        installed: Package,
        manual: bool,
    ) -> Result<Package> {
        if request.satisfies(installed.version()) {
            debug!(id = %request.id, installed = %installed.version(), "Already installed");
            self.record(&installed.identity, manual)?;
            self.set_state(&installed.identity, InstallState::Installed);
            return Ok(installed);
        }

        let pin = self
            .manifest
            .get(&request.id)
            .filter(|e| e.identity.has_version_range() && !e.identity.satisfies(installed.version()))
            .map(|e| e.identity.clone());

        let installed_version = NuGetVersion::parse(installed.version())?;
        if request.range()?.position_of(&installed_version) == Ordering::Less {
            info!(id = %request.id, from = %installed.version(), to = %request.version, "Updating");
            self.update(request, manual)
        } else if let Some(pin) = pin {
            info!(id = %request.id, from = %installed.version(), to = %pin.version, "Downgrading to pinned range");
            self.update(&pin, manual)
        } else {
            debug!(id = %request.id, installed = %installed.version(), requested = %request.version, "Newer version already installed");
            self.record(&installed.identity, manual)?;
            Ok(installed)
        }
    }

    fn install_fresh(&mut self, request: &PackageIdentifier, manual: bool) -> Result<Package> {
        let package = match self.resolve(request) {
            Ok(package) => package,
            Err(e) => {
                self.set_state(request, InstallState::Failed);
                error!(id = %request.id, version = %request.version, operation = "resolve", "{e:#}");
                return Err(e);
            }
        };
        self.install_resolved(package, manual)
    }

    /// Dependencies, manifest entry, then the package itself.
    fn install_resolved(&mut self, package: Package, manual: bool) -> Result<Package> {
        let identity = package.identity.clone();

        self.set_state(&identity, InstallState::ResolvingDependencies);
        if let Err(e) = self.install_dependencies(&package) {
            self.set_state(&identity, InstallState::Failed);
            return Err(e);
        }

        self.record(&identity, manual)?;

        match self.materialize(&package) {
            Ok(dir) => {
                let mut installed = package;
                installed.is_manually_installed = manual;
                self.index.insert(installed.clone());
                self.set_state(&identity, InstallState::Installed);
                info!(id = %identity.id, version = %identity.version, dir = %dir.display(), "Installed");
                Ok(installed)
            }
            Err(e) => {
                let state = self.state(&identity.id);
                error!(id = %identity.id, version = %identity.version, operation = %state, "{e:#}");
                self.set_state(&identity, InstallState::Failed);
                let partial = self.install_dir.join(identity.folder_name());
                if let Err(cleanup) = remove_dir_forced(&partial) {
                    warn!(dir = %partial.display(), "Could not remove partial install: {cleanup:#}");
                }
                Err(e)
            }
        }
    }

    /// Metadata for `request`: from the sources, or from a cached archive with
    /// exactly that version when no source has it.
    fn resolve(&self, request: &PackageIdentifier) -> Result<Package> {
        let resolved = match self.sources.resolve(request) {
            Ok(Some(package)) => return Ok(package),
            other => other,
        };

        if !request.has_version_range() {
            if let Some(archive) = self.cache.get_cached_archive(request) {
                debug!(id = %request.id, version = %request.version, "Resolved from the archive cache");
                let mut package = nuspec::read_from_archive(&archive)?;
                package.origin = Some(PackageOrigin::LocalFile {
                    source: "cache".to_string(),
                    path: archive,
                });
                return Ok(package);
            }
        }

        resolved?;
        Err(NupmError::PackageNotFound {
            id: request.id.clone(),
            version: request.version.clone(),
        }
        .into())
    }

    fn install_dependencies(&mut self, package: &Package) -> Result<()> {
        let Some(group) = self.cleaner.profile().select_dependency_group(&package.dependencies)
        else {
            return Ok(());
        };
        let dependencies = group.dependencies.clone();
        debug!(id = %package.id(), framework = %group.target_framework, count = dependencies.len(), "Installing dependencies");

        for dependency in &dependencies {
            let library = format!("{}.dll", dependency.id);
            if self.config.is_engine_library(&library) {
                debug!(id = %dependency.id, "Provided by the host, skipping");
                continue;
            }
            if let Err(e) = self.install(dependency, false) {
                return Err(e.context(NupmError::DependencyFailed {
                    id: package.identity.to_string(),
                    dependency: dependency.to_string(),
                }));
            }
        }
        Ok(())
    }

    /// Fetches, extracts and cleans an already-resolved package.
    fn materialize(&mut self, package: &Package) -> Result<PathBuf> {
        let identity = &package.identity;

        self.set_state(identity, InstallState::Downloading);
        let source = package.origin.as_ref().map(PackageOrigin::source_name);
        let credentials = source.and_then(|name| self.sources.credentials_for(name));
        let feed_root = source.and_then(|name| self.sources.feed_root(name));
        let archive = self.cache.fetch(package, feed_root.as_deref(), credentials)?;

        self.set_state(identity, InstallState::Extracting);
        let dir = extract_package(&archive, &self.install_dir, identity)?;

        self.set_state(identity, InstallState::Cleaning);
        self.cleaner.clean(&dir, identity)?;
        Ok(dir)
    }

    /// Adds `identity` to the manifest and saves it.
    ///
    /// A range entry that already admits the version is kept as written, so
    /// restoring a hand-written range does not rewrite it.
    fn record(&mut self, identity: &PackageIdentifier, manual: bool) -> Result<()> {
        let keep = self
            .manifest
            .get(&identity.id)
            .filter(|e| e.identity.has_version_range() && e.identity.satisfies(&identity.version))
            .map(|e| e.manually_installed);

        match keep {
            Some(true) => return Ok(()),
            Some(false) if !manual => return Ok(()),
            Some(false) => {
                self.manifest.set_manual(&identity.id, true);
            }
            None => {
                let before = self.manifest.get(&identity.id).cloned();
                self.manifest.add(identity.clone(), manual);
                if self.manifest.get(&identity.id) == before.as_ref() {
                    return Ok(());
                }
            }
        }
        self.manifest.save()
    }

    /// Replaces the installed version of `request.id` with one satisfying `request`.
    ///
    /// The replacement is resolved first; when nothing satisfies `request` the
    /// installed version, its files and its manifest entry stay untouched. The
    /// old version's files are removed before the new one is installed
    /// (dependencies stay). The manual flag carries over.
    pub fn update(&mut self, request: &PackageIdentifier, manual: bool) -> Result<Package> {
        let package = match self.resolve(request) {
            Ok(package) => package,
            Err(e) => {
                error!(id = %request.id, version = %request.version, operation = "update", "{e:#}");
                return Err(e);
            }
        };

        let was_manual = self.manifest.get(&request.id).is_some_and(|e| e.manually_installed);
        if let Some(old) = self.index.remove(&request.id) {
            self.remove_files(&old)?;
        }

        self.in_progress.push(request.id.to_ascii_lowercase());
        let result = self.install_resolved(package, manual || was_manual);
        self.in_progress.pop();
        result
    }

    /// Removes `id` from the manifest, the index and the disk.
    ///
    /// With `delete_dependencies`, dependencies that are neither manually
    /// installed nor used by another installed package are removed too,
    /// recursively. Returns `false` when `id` was neither listed nor installed.
    pub fn uninstall(&mut self, id: &str, delete_dependencies: bool) -> Result<bool> {
        let Some(package) = self.remove_package(id)? else {
            return Ok(false);
        };
        info!(id = %package.id(), version = %package.version(), "Uninstalled");

        if delete_dependencies {
            let mut seen = HashSet::new();
            for dependency in package.dependencies.iter().flat_map(|g| &g.dependencies) {
                if !seen.insert(dependency.id.to_ascii_lowercase()) || !self.index.contains(&dependency.id) {
                    continue;
                }
                let manual = self.manifest.get(&dependency.id).is_some_and(|e| e.manually_installed);
                if manual {
                    debug!(id = %dependency.id, "Keeping manually installed dependency");
                } else if self.index.is_referenced(&dependency.id, package.id()) {
                    debug!(id = %dependency.id, "Keeping dependency still used by another package");
                } else {
                    self.uninstall(&dependency.id, true)?;
                }
            }
        }
        Ok(true)
    }

    /// Drops one package from manifest, index and disk. `None` if unknown.
    fn remove_package(&mut self, id: &str) -> Result<Option<Package>> {
        let entry = self.manifest.remove(id);
        if entry.is_some() {
            self.manifest.save()?;
        }
        let installed = self.index.remove(id);

        let package = match (installed, entry) {
            (Some(package), _) => package,
            (None, Some(entry)) => Package {
                identity: entry.identity,
                ..Package::default()
            },
            (None, None) => return Ok(None),
        };

        self.remove_files(&package)?;
        Ok(Some(package))
    }

    /// Deletes the install directory, descriptor and relocated tools of `package`.
    fn remove_files(&mut self, package: &Package) -> Result<()> {
        let folder = package.identity.folder_name();
        remove_dir_forced(&self.install_dir.join(&folder))?;
        remove_file_forced(&self.install_dir.join(format!("{folder}.{DESCRIPTOR_EXTENSION}")))?;
        remove_dir_forced(&self.config.tools_path().join(&folder))?;

        self.set_state(&package.identity, InstallState::NotInstalled);
        Ok(())
    }

    /// Installs every manifest entry, then garbage-collects orphaned directories.
    pub fn restore(&mut self) -> Result<RestoreReport> {
        self.restore_with_progress(&ProgressBar::hidden())
    }

    /// [`Self::restore`], advancing `progress` once per manifest entry.
    pub fn restore_with_progress(&mut self, progress: &ProgressBar) -> Result<RestoreReport> {
        let mut report = RestoreReport::default();
        let entries = self.manifest.entries().to_vec();
        info!(entries = entries.len(), "Restoring packages");

        for entry in &entries {
            progress.set_message(format!("{}", entry.identity));
            match self.install(&entry.identity, entry.manually_installed) {
                Ok(package) => report.installed.push(package.identity),
                Err(e) => {
                    error!(id = %entry.identity.id, version = %entry.identity.version, "Restore failed: {e:#}");
                    report.failed.push(FailedInstall {
                        identity: entry.identity.clone(),
                        reason: format!("{e:#}"),
                    });
                }
            }
            progress.inc(1);
        }

        report.removed_orphans = self.collect_orphans()?;
        Ok(report)
    }

    /// Deletes install directories no manifest entry accounts for.
    fn collect_orphans(&mut self) -> Result<Vec<PathBuf>> {
        if !self.install_dir.exists() {
            return Ok(Vec::new());
        }

        let expected: HashSet<String> = self
            .manifest
            .entries()
            .iter()
            .filter_map(|e| self.index.get(&e.identity.id))
            .map(|p| p.identity.folder_name().to_ascii_lowercase())
            .collect();

        let mut removed = Vec::new();
        for entry in fs::read_dir(&self.install_dir).with_context(|| {
            format!("Failed to read install directory: {}", self.install_dir.display())
        })? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if name.starts_with(UNLINKED_SOURCE_PREFIX) || expected.contains(&name.to_ascii_lowercase())
            {
                continue;
            }

            info!(dir = %path.display(), "Removing orphaned package directory");
            remove_dir_forced(&path)?;
            removed.push(path);
        }

        let stale: Vec<String> = self
            .index
            .packages()
            .into_iter()
            .filter(|p| !self.manifest.contains(p.id()))
            .map(|p| p.id().to_string())
            .collect();
        for id in stale {
            self.index.remove(&id);
        }
        Ok(removed)
    }

    /// Searches all sources.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<Package>> {
        self.sources.search(query)
    }

    /// Newer versions of the installed packages.
    pub fn outdated(&self) -> Result<Vec<(Package, Package)>> {
        let installed: Vec<PackageIdentifier> =
            self.index.packages().into_iter().map(|p| p.identity.clone()).collect();
        let updates = self.sources.get_updates(&installed, self.config.include_prerelease)?;

        Ok(updates
            .into_iter()
            .filter_map(|update| self.index.get(update.id()).map(|current| (current.clone(), update)))
            .collect())
    }
}

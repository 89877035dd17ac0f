//! The in-memory record of what is actually on disk.
//!
//! The manifest says what a project wants; the [`InstalledIndex`] says what the
//! install directory holds. It is rebuilt at startup by an
//! [`InstalledPackageScanner`], which for real projects is a
//! [`DirectoryScanner`] looking for one marker per `{Id}.{Version}/` folder:
//! the package's own archive, or failing that a loose descriptor file.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{ARCHIVE_EXTENSION, DESCRIPTOR_EXTENSION, UNLINKED_SOURCE_PREFIX};
use crate::package::{Package, nuspec};

/// Reconstructs the installed packages of a project.
pub trait InstalledPackageScanner {
    /// Every package currently installed.
    fn scan(&self) -> Result<Vec<Package>>;
}

/// Scans `{install_dir}/*/` for archive or descriptor markers.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    install_dir: PathBuf,
}

impl DirectoryScanner {
    /// Creates a scanner over `install_dir`.
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    fn read_marker(&self, package_dir: &Path) -> Option<Package> {
        let files: Vec<PathBuf> = fs::read_dir(package_dir)
            .ok()?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        let with_extension = |ext: &str| {
            files.iter().find(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)))
        };

        let result = if let Some(archive) = with_extension(ARCHIVE_EXTENSION) {
            nuspec::read_from_archive(archive)
        } else if let Some(descriptor) = with_extension(DESCRIPTOR_EXTENSION) {
            nuspec::read_file(descriptor)
        } else {
            debug!(dir = %package_dir.display(), "No package marker, skipping");
            return None;
        };

        match result {
            Ok(package) => Some(package),
            Err(e) => {
                warn!(dir = %package_dir.display(), "Ignoring unreadable installed package: {e:#}");
                None
            }
        }
    }
}

impl InstalledPackageScanner for DirectoryScanner {
    fn scan(&self) -> Result<Vec<Package>> {
        if !self.install_dir.exists() {
            return Ok(Vec::new());
        }

        let mut packages = Vec::new();
        for entry in fs::read_dir(&self.install_dir).with_context(|| {
            format!("Failed to read install directory: {}", self.install_dir.display())
        })? {
            let path = entry?.path();
            let linked = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(UNLINKED_SOURCE_PREFIX));
            if !path.is_dir() || linked {
                continue;
            }
            if let Some(package) = self.read_marker(&path) {
                packages.push(package);
            }
        }
        Ok(packages)
    }
}

/// Installed packages keyed by case-insensitive id.
#[derive(Debug, Clone, Default)]
pub struct InstalledIndex {
    packages: HashMap<String, Package>,
}

impl InstalledIndex {
    /// An empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index from a scanner. A later duplicate id wins.
    pub fn from_scanner(scanner: &dyn InstalledPackageScanner) -> Result<Self> {
        let mut index = Self::new();
        for package in scanner.scan()? {
            if let Some(previous) = index.insert(package) {
                warn!(id = %previous.id(), version = %previous.version(), "Package installed twice; ignoring this copy");
            }
        }
        Ok(index)
    }

    /// The installed package with `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Package> {
        self.packages.get(&id.to_ascii_lowercase())
    }

    /// Whether `id` is installed.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Records `package`, returning the entry it replaced.
    pub fn insert(&mut self, package: Package) -> Option<Package> {
        self.packages.insert(package.id().to_ascii_lowercase(), package)
    }

    /// Forgets `id`.
    pub fn remove(&mut self, id: &str) -> Option<Package> {
        self.packages.remove(&id.to_ascii_lowercase())
    }

    /// Installed packages sorted by id then version.
    #[must_use]
    pub fn packages(&self) -> Vec<&Package> {
        let mut packages: Vec<&Package> = self.packages.values().collect();
        packages.sort_by(|a, b| a.identity.compare(&b.identity));
        packages
    }

    /// Number of installed packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether nothing is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Whether any installed package other than `except` lists `id` as a dependency.
    #[must_use]
    pub fn is_referenced(&self, id: &str, except: &str) -> bool {
        self.packages
            .values()
            .filter(|p| !p.identity.same_id(except) && !p.identity.same_id(id))
            .any(|p| p.depends_on(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{FrameworkGroup, PackageIdentifier};
    use crate::test_utils::NupkgBuilder;
    use tempfile::TempDir;

    struct FixedScanner(Vec<Package>);

    impl InstalledPackageScanner for FixedScanner {
        fn scan(&self) -> Result<Vec<Package>> {
            Ok(self.0.clone())
        }
    }

    fn with_deps(id: &str, deps: &[&str]) -> Package {
        let mut package = Package::new(id, "1.0.0");
        package.add_dependency_group(FrameworkGroup::new(
            "",
            deps.iter().map(|d| PackageIdentifier::new(*d, "1.0")).collect(),
        ));
        package
    }

    #[test]
    fn test_index_is_case_insensitive() {
        let index = InstalledIndex::from_scanner(&FixedScanner(vec![Package::new("Foo", "1.0.0")]))
            .unwrap();
        assert!(index.contains("foo"));
        assert_eq!(index.get("FOO").unwrap().version(), "1.0.0");
    }

    #[test]
    fn test_is_referenced() {
        let index = InstalledIndex::from_scanner(&FixedScanner(vec![
            with_deps("App", &["Shared", "Only"]),
            with_deps("Other", &["Shared"]),
            with_deps("Shared", &[]),
            with_deps("Only", &[]),
        ]))
        .unwrap();

        assert!(index.is_referenced("Shared", "App"));
        assert!(!index.is_referenced("Only", "App"));
        assert!(index.is_referenced("Only", "Other"));
    }

    #[test]
    fn test_directory_scanner_reads_markers() {
        let temp = TempDir::new().unwrap();
        let install = temp.path().join("Packages");

        let archived = install.join("Foo.1.0.0");
        fs::create_dir_all(&archived).unwrap();
        NupkgBuilder::new("Foo", "1.0.0").write_to_dir(&archived).unwrap();

        let loose = install.join("Bar.2.0.0");
        fs::create_dir_all(&loose).unwrap();
        fs::write(loose.join("Bar.nuspec"), NupkgBuilder::new("Bar", "2.0.0").nuspec_xml()).unwrap();

        fs::create_dir_all(install.join("Empty.1.0.0")).unwrap();
        let linked = install.join("~unlinked.Baz");
        fs::create_dir_all(&linked).unwrap();
        NupkgBuilder::new("Baz", "1.0.0").write_to_dir(&linked).unwrap();

        let mut ids: Vec<String> = DirectoryScanner::new(&install)
            .scan()
            .unwrap()
            .into_iter()
            .map(|p| p.identity.folder_name())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["Bar.2.0.0", "Foo.1.0.0"]);
    }

    #[test]
    fn test_missing_install_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(DirectoryScanner::new(temp.path().join("nope")).scan().unwrap().is_empty());
    }
}

//! Local directory feeds.
//!
//! A local source is a directory of package archives, either flat
//! (`feed/Foo.1.0.0.nupkg`) or hierarchical (`feed/Foo/1.0.0/Foo.1.0.0.nupkg`).
//! Metadata comes from the descriptor inside each archive. There is no paging:
//! the first page holds every result and any later page is empty.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{PackageSource, SearchQuery, newer_than, pick_updates, select_best};
use crate::constants::ARCHIVE_EXTENSION;
use crate::package::{Package, PackageIdentifier, PackageOrigin, nuspec};

/// A directory of `.nupkg` files.
#[derive(Debug, Clone)]
pub struct LocalSource {
    name: String,
    dir: PathBuf,
    include_prerelease: bool,
}

impl LocalSource {
    /// Creates a source over `dir`. The directory does not have to exist yet.
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, include_prerelease: bool) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            include_prerelease,
        }
    }

    /// Feed directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archive paths, optionally only those whose file name starts with `{id}.`.
    fn archives(&self, id: Option<&str>) -> Vec<PathBuf> {
        if !self.dir.is_dir() {
            debug!(source = %self.name, dir = %self.dir.display(), "Local source directory does not exist");
            return Vec::new();
        }

        let prefix = id.map(|id| format!("{}.", id.to_ascii_lowercase()));
        let mut paths: Vec<PathBuf> = WalkDir::new(&self.dir)
            .max_depth(3)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| {
                p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
            })
            .filter(|p| match (&prefix, p.file_name()) {
                (Some(prefix), Some(name)) => {
                    name.to_string_lossy().to_ascii_lowercase().starts_with(prefix.as_str())
                }
                (None, _) => true,
                _ => false,
            })
            .collect();
        paths.sort();
        paths
    }

    fn read_archive(&self, path: &Path) -> Option<Package> {
        match nuspec::read_from_archive(path) {
            Ok(mut package) => {
                package.origin = Some(PackageOrigin::LocalFile {
                    source: self.name.clone(),
                    path: path.to_path_buf(),
                });
                Some(package)
            }
            Err(e) => {
                warn!(source = %self.name, path = %path.display(), "Skipping unreadable archive: {e:#}");
                None
            }
        }
    }

    /// Every package in the feed, optionally restricted to one id.
    fn packages(&self, id: Option<&str>) -> Vec<Package> {
        self.archives(id)
            .iter()
            .filter_map(|path| self.read_archive(path))
            .filter(|p| id.is_none_or(|id| p.identity.same_id(id)))
            .collect()
    }

    /// The literal `{Id}.{Version}.nupkg` for an exact request, flat or hierarchical.
    fn literal_archive(&self, request: &PackageIdentifier) -> Option<PathBuf> {
        let file_name = request.archive_file_name();
        [
            self.dir.join(&file_name),
            self.dir.join(&request.id).join(&request.version).join(&file_name),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }
}

impl PackageSource for LocalSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        true
    }

    fn find_packages_by_id(&self, request: &PackageIdentifier) -> Result<Vec<Package>> {
        Ok(self
            .packages(Some(&request.id))
            .into_iter()
            .filter(|p| request.version.is_empty() || request.satisfies(p.version()))
            .collect())
    }

    fn get_specific_package(&self, request: &PackageIdentifier) -> Result<Option<Package>> {
        if !request.has_version_range() {
            if let Some(path) = self.literal_archive(request) {
                if let Some(package) = self.read_archive(&path) {
                    if request.same_id(package.id()) {
                        return Ok(Some(package));
                    }
                }
            }
        }

        Ok(select_best(request, self.packages(Some(&request.id)), self.include_prerelease))
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Package>> {
        if query.skip > 0 {
            return Ok(Vec::new());
        }

        let term = query.term.to_ascii_lowercase();
        let matches = |p: &Package| {
            term.is_empty()
                || [Some(p.id()), p.title.as_deref(), p.description.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_ascii_lowercase().contains(&term))
        };

        let mut results: Vec<Package> = Vec::new();
        for package in self.packages(None) {
            if !matches(&package) || (!query.include_prerelease && package.identity.is_prerelease())
            {
                continue;
            }
            if query.include_all_versions {
                results.push(package);
                continue;
            }
            match results.iter_mut().find(|p| p.identity.same_id(package.id())) {
                Some(existing) => {
                    if package.identity.is_newer_than(&existing.identity) {
                        *existing = package;
                    }
                }
                None => results.push(package),
            }
        }

        results.sort_by(|a, b| a.identity.compare(&b.identity));
        Ok(results)
    }

    fn get_updates(
        &self,
        installed: &[PackageIdentifier],
        include_prerelease: bool,
        include_all_versions: bool,
    ) -> Result<Vec<Package>> {
        let mut updates = Vec::new();
        for current in installed {
            let candidates = self.find_packages_by_id(&newer_than(current))?;
            updates.extend(pick_updates(current, candidates, include_prerelease, include_all_versions));
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::NupkgBuilder;
    use tempfile::TempDir;

    fn feed(versions: &[(&str, &str)]) -> (TempDir, LocalSource) {
        let temp = TempDir::new().unwrap();
        for (id, version) in versions {
            NupkgBuilder::new(*id, *version)
                .metadata("description", &format!("The {id} library"))
                .write_to_dir(temp.path())
                .unwrap();
        }
        let source = LocalSource::new("local", temp.path(), false);
        (temp, source)
    }

    fn versions(packages: &[Package]) -> Vec<&str> {
        packages.iter().map(Package::version).collect()
    }

    #[test]
    fn test_exact_request_uses_literal_file() {
        let (_temp, source) = feed(&[("Foo", "1.0.0"), ("Foo", "2.0.0")]);
        let package =
            source.get_specific_package(&PackageIdentifier::new("Foo", "1.0.0")).unwrap().unwrap();

        assert_eq!(package.version(), "1.0.0");
        assert!(matches!(package.origin, Some(PackageOrigin::LocalFile { ref source, .. }) if source == "local"));
    }

    #[test]
    fn test_range_request_picks_highest_in_range() {
        let (_temp, source) = feed(&[("Foo", "1.0.0"), ("Foo", "1.5.0"), ("Foo", "2.0.0"), ("Foo.Bar", "1.9.0")]);
        let request = PackageIdentifier::new("foo", "[1.0,2.0)");

        let package = source.get_specific_package(&request).unwrap().unwrap();
        assert_eq!(package.version(), "1.5.0");

        let mut all = source.find_packages_by_id(&request).unwrap();
        all.sort_by(|a, b| a.identity.compare_version(&b.identity));
        assert_eq!(versions(&all), vec!["1.0.0", "1.5.0"]);

        assert!(source.get_specific_package(&PackageIdentifier::new("Foo", "[3.0,)")).unwrap().is_none());
    }

    #[test]
    fn test_hierarchical_layout() {
        let temp = TempDir::new().unwrap();
        NupkgBuilder::new("Foo", "1.0.0").write_to_dir(&temp.path().join("Foo/1.0.0")).unwrap();
        let source = LocalSource::new("local", temp.path(), false);

        let package =
            source.get_specific_package(&PackageIdentifier::new("Foo", "1.0.0")).unwrap().unwrap();
        assert_eq!(package.id(), "Foo");
    }

    #[test]
    fn test_prerelease_only_when_enabled() {
        let (temp, source) = feed(&[("Foo", "1.0.0"), ("Foo", "1.1.0-beta")]);
        let request = PackageIdentifier::new("Foo", "1.0.1");

        assert!(source.get_specific_package(&request).unwrap().is_none());
        let with_prerelease = LocalSource::new("local", temp.path(), true);
        assert_eq!(with_prerelease.get_specific_package(&request).unwrap().unwrap().version(), "1.1.0-beta");
    }

    #[test]
    fn test_search_latest_per_id_and_no_paging() {
        let (_temp, source) = feed(&[("Foo", "1.0.0"), ("Foo", "2.0.0"), ("Bar", "1.0.0")]);

        let mut query = SearchQuery::new("");
        let results = source.search(&query).unwrap();
        let found: Vec<String> = results.iter().map(|p| p.identity.to_string()).collect();
        assert_eq!(found, vec!["Bar 1.0.0", "Foo 2.0.0"]);

        query.term = "nothing matches".to_string();
        assert!(source.search(&query).unwrap().is_empty());
        query.term = "FOO".to_string();
        query.include_all_versions = true;
        assert_eq!(source.search(&query).unwrap().len(), 2);

        query.skip = 30;
        assert!(source.search(&query).unwrap().is_empty());
    }

    #[test]
    fn test_get_updates() {
        let (_temp, source) = feed(&[("Foo", "1.0.0"), ("Foo", "1.5.0"), ("Foo", "2.0.0")]);
        let installed = [PackageIdentifier::new("Foo", "1.0.0")];

        assert_eq!(versions(&source.get_updates(&installed, false, false).unwrap()), vec!["2.0.0"]);
        assert_eq!(versions(&source.get_updates(&installed, false, true).unwrap()), vec!["1.5.0", "2.0.0"]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let source = LocalSource::new("local", temp.path().join("missing"), false);
        assert!(source.search(&SearchQuery::new("")).unwrap().is_empty());
        assert!(source.get_specific_package(&PackageIdentifier::new("Foo", "1.0")).unwrap().is_none());
    }
}

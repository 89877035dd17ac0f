//! Package identities and metadata.
//!
//! - [`PackageIdentifier`] - an `(Id, Version)` pair where the version may be a
//!   range (`[1.0,2.0)`) or a single version that acts as a floor
//! - [`Package`] - an identifier plus descriptive metadata, where it came from,
//!   and its dependencies partitioned by target framework
//! - [`FrameworkGroup`] - the dependency list for one target framework moniker
//!
//! Ids keep their original casing but compare case-insensitively wherever two
//! packages are matched up ([`PackageIdentifier::same_id`]). The total order used
//! for sorting ([`PackageIdentifier::compare`]) is ordinal on the id, then by version.

pub mod nuspec;

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use crate::version::{self, NuGetVersion, VersionParseError, VersionRange, range};

/// A package id with a version or version range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentifier {
    /// Package id, case preserved
    pub id: String,
    /// Version token or bracketed range, empty for any version
    pub version: String,
}

impl PackageIdentifier {
    /// Creates an identifier.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }

    /// Whether the version carries a prerelease tag.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.version.contains('-')
    }

    /// Whether the version uses bracket range syntax.
    #[must_use]
    pub fn has_version_range(&self) -> bool {
        range::is_range_syntax(&self.version)
    }

    /// Parses the version as a range (bare versions become floors).
    ///
    /// # Errors
    ///
    /// Returns [`VersionParseError`] when the version text is malformed.
    pub fn range(&self) -> Result<VersionRange, VersionParseError> {
        VersionRange::parse(&self.version)
    }

    /// Lower bound of the version range.
    #[must_use]
    pub fn minimum_version(&self) -> Option<NuGetVersion> {
        self.range().ok().and_then(|r| r.min().cloned())
    }

    /// Upper bound of the version range.
    #[must_use]
    pub fn maximum_version(&self) -> Option<NuGetVersion> {
        self.range().ok().and_then(|r| r.max().cloned())
    }

    /// Case-insensitive id comparison.
    #[must_use]
    pub fn same_id(&self, other: &str) -> bool {
        self.id.eq_ignore_ascii_case(other)
    }

    /// Whether a concrete `candidate_version` satisfies this identifier's version.
    #[must_use]
    pub fn satisfies(&self, candidate_version: &str) -> bool {
        version::range::in_range(&self.version, candidate_version)
    }

    /// Whether this identifier's version is exactly `candidate_version`
    /// (numerically equal for bare versions, or the single pinned version).
    #[must_use]
    pub fn matches_exactly(&self, candidate_version: &str) -> bool {
        match self.range() {
            Ok(range) if range.is_exact() || !self.has_version_range() => {
                match (range.min(), NuGetVersion::parse(candidate_version)) {
                    (Some(min), Ok(candidate)) => *min == candidate,
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Three-way comparison of the versions alone. Ranges compare by their
    /// lower bound (or upper bound when open below).
    #[must_use]
    pub fn compare_version(&self, other: &Self) -> Ordering {
        match (self.sort_version(), other.sort_version()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Total order: ordinal id, then version.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id).then_with(|| self.compare_version(other))
    }

    /// Same id and strictly newer version.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.same_id(&other.id) && self.compare_version(other) == Ordering::Greater
    }

    /// Same id and strictly older version.
    #[must_use]
    pub fn is_older_than(&self, other: &Self) -> bool {
        self.same_id(&other.id) && self.compare_version(other) == Ordering::Less
    }

    /// `{Id}.{Version}`, the name of the install directory and cached archive stem.
    #[must_use]
    pub fn folder_name(&self) -> String {
        format!("{}.{}", self.id, self.version)
    }

    /// `{Id}.{Version}.nupkg`.
    #[must_use]
    pub fn archive_file_name(&self) -> String {
        format!("{}.{}", self.folder_name(), crate::constants::ARCHIVE_EXTENSION)
    }

    fn sort_version(&self) -> Option<NuGetVersion> {
        match VersionRange::parse(&self.version) {
            Ok(range) => range.sort_key().cloned(),
            Err(err) => {
                tracing::warn!(id = %self.id, "{err}");
                None
            }
        }
    }
}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Dependencies declared for one target framework moniker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameworkGroup {
    /// Target framework moniker, empty for "any framework"
    pub target_framework: String,
    /// Dependencies of this group
    pub dependencies: Vec<PackageIdentifier>,
}

impl FrameworkGroup {
    /// Creates a group.
    pub fn new(target_framework: impl Into<String>, dependencies: Vec<PackageIdentifier>) -> Self {
        Self {
            target_framework: target_framework.into(),
            dependencies,
        }
    }
}

/// Where a resolved package's archive can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOrigin {
    /// An archive in a local directory feed
    LocalFile {
        /// Name of the source that offered it
        source: String,
        /// Archive path
        path: PathBuf,
    },
    /// An archive behind an HTTP download URL
    Remote {
        /// Name of the source that offered it
        source: String,
        /// Download URL
        url: String,
    },
}

impl PackageOrigin {
    /// Name of the source that offered the package.
    #[must_use]
    pub fn source_name(&self) -> &str {
        match self {
            Self::LocalFile { source, .. } | Self::Remote { source, .. } => source,
        }
    }
}

/// A package identity plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Package {
    /// Id and concrete version
    pub identity: PackageIdentifier,
    /// Display title
    pub title: Option<String>,
    /// Long description
    pub description: Option<String>,
    /// Short summary
    pub summary: Option<String>,
    /// Release notes
    pub release_notes: Option<String>,
    /// Comma separated authors
    pub authors: Option<String>,
    /// License URL
    pub license_url: Option<String>,
    /// Project URL
    pub project_url: Option<String>,
    /// Icon URL
    pub icon_url: Option<String>,
    /// Where the archive can be fetched from, when known
    pub origin: Option<PackageOrigin>,
    /// Dependencies by target framework, at most one group per moniker
    pub dependencies: Vec<FrameworkGroup>,
    /// Whether the user installed this package directly
    pub is_manually_installed: bool,
}

impl Default for PackageIdentifier {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl Package {
    /// Creates a package with no metadata.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            identity: PackageIdentifier::new(id, version),
            ..Self::default()
        }
    }

    /// Package id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    /// Package version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.identity.version
    }

    /// Adds dependencies for a framework, merging into an existing group with the
    /// same moniker (compared case-insensitively).
    pub fn add_dependency_group(&mut self, group: FrameworkGroup) {
        match self
            .dependencies
            .iter_mut()
            .find(|g| g.target_framework.eq_ignore_ascii_case(&group.target_framework))
        {
            Some(existing) => {
                for dependency in group.dependencies {
                    if !existing.dependencies.iter().any(|d| d.same_id(&dependency.id)) {
                        existing.dependencies.push(dependency);
                    }
                }
            }
            None => self.dependencies.push(group),
        }
    }

    /// Whether any framework group lists `id` as a dependency.
    #[must_use]
    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies.iter().flat_map(|g| &g.dependencies).any(|d| d.same_id(id))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.identity.fmt(f)
    }
}

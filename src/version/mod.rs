//! NuGet version parsing and comparison.
//!
//! NuGet versions are up to four numeric components followed by an optional
//! prerelease tag: `1.2.3`, `1.2.3.4`, `2.0.0-beta1`. Missing numeric components
//! default to `0`, so `1.2` and `1.2.0.0` compare equal. Build metadata after a
//! `+` is ignored.
//!
//! # Ordering
//!
//! Versions order lexicographically over `(major, minor, patch, build)`, then by
//! prerelease tag. A release (no tag) sorts after every prerelease of the same
//! numeric tuple, and two tags compare ordinally.
//!
//! ```rust,no_run
//! use nupm_cli::version::NuGetVersion;
//!
//! let release = NuGetVersion::parse("1.2.0").unwrap();
//! let beta = NuGetVersion::parse("1.2.0-beta").unwrap();
//! assert!(beta < release);
//! ```
//!
//! # Malformed input
//!
//! [`NuGetVersion::parse`] fails with [`VersionParseError`]. The string helpers
//! [`compare_versions`] and [`is_newer`] never fail: they log the parse error and
//! order the malformed side lower, so a bad version is never chosen over a good one.

pub mod range;

pub use range::VersionRange;

use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// A version string could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse '{input}' as a version: {reason}")]
pub struct VersionParseError {
    input: String,
    reason: String,
}

impl VersionParseError {
    pub(crate) fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// The text that failed to parse.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// A parsed NuGet version.
#[derive(Debug, Clone)]
pub struct NuGetVersion {
    major: u64,
    minor: u64,
    patch: u64,
    build: u64,
    prerelease: Option<String>,
    original: String,
}

impl NuGetVersion {
    /// Parses a version such as `1.0`, `1.2.3.4` or `1.0.0-rc.1+abc`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionParseError`] when the string is empty, has more than four
    /// numeric components, or a component is not a non-negative integer.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::new(input, "empty version"));
        }

        let without_metadata = trimmed.split_once('+').map_or(trimmed, |(v, _)| v);
        let (numbers, prerelease) = match without_metadata.split_once('-') {
            Some((numbers, tag)) if !tag.is_empty() => (numbers, Some(tag.to_string())),
            Some(_) => return Err(VersionParseError::new(input, "empty prerelease tag")),
            None => (without_metadata, None),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() > 4 {
            return Err(VersionParseError::new(input, "more than four numeric components"));
        }

        let mut components = [0u64; 4];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part.parse::<u64>().map_err(|_| {
                VersionParseError::new(input, format!("'{part}' is not a number"))
            })?;
        }

        Ok(Self {
            major: components[0],
            minor: components[1],
            patch: components[2],
            build: components[3],
            prerelease,
            original: trimmed.to_string(),
        })
    }

    /// The `(major, minor, patch, build)` tuple.
    #[must_use]
    pub const fn numbers(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.patch, self.build)
    }

    /// The prerelease tag, if any.
    #[must_use]
    pub fn prerelease(&self) -> Option<&str> {
        self.prerelease.as_deref()
    }

    /// Whether this version carries a prerelease tag.
    #[must_use]
    pub const fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// The text this version was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.original
    }
}

impl PartialEq for NuGetVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NuGetVersion {}

impl PartialOrd for NuGetVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NuGetVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numbers().cmp(&other.numbers()).then_with(|| {
            match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.as_str().cmp(b.as_str()),
            }
        })
    }
}

impl fmt::Display for NuGetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Three-way comparison of two version strings.
///
/// A string that fails to parse is logged and ordered lower than a valid one;
/// two malformed strings compare equal.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (NuGetVersion::parse(a), NuGetVersion::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Err(err), Ok(_)) => {
            warn!("{err}");
            Ordering::Less
        }
        (Ok(_), Err(err)) => {
            warn!("{err}");
            Ordering::Greater
        }
        (Err(err_a), Err(err_b)) => {
            warn!("{err_a}; {err_b}");
            Ordering::Equal
        }
    }
}

/// Whether `candidate` is strictly newer than `current`.
#[must_use]
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

/// Whether `candidate` is strictly older than `current`.
#[must_use]
pub fn is_older(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Less
}

//! NuGet version range notation.
//!
//! | Notation      | Meaning                   |
//! |---------------|---------------------------|
//! | (empty)       | any version               |
//! | `1.0`         | `x >= 1.0` (floor)        |
//! | `[1.0]`       | `x == 1.0` (exact pin)    |
//! | `[1.0,2.0)`   | `1.0 <= x < 2.0`          |
//! | `(1.0,)`      | `x > 1.0`                 |
//! | `(,2.0]`      | `x <= 2.0`                |
//!
//! A bare version on a dependency is a minimum, not a pin. Inclusivity is read
//! independently from the opening and closing bracket, and the bounds are split
//! on the first comma.

use std::cmp::Ordering;
use std::fmt;

use super::{NuGetVersion, VersionParseError};

/// A parsed version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    min: Option<NuGetVersion>,
    max: Option<NuGetVersion>,
    min_inclusive: bool,
    max_inclusive: bool,
    original: String,
}

impl VersionRange {
    /// Parses a bare version or a bracketed range.
    ///
    /// # Errors
    ///
    /// Returns [`VersionParseError`] for unbalanced brackets, an exact form that is
    /// not `[x]`, or bounds that are not valid versions.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let text = input.trim();
        if text.is_empty() {
            return Ok(Self::any());
        }
        if !is_range_syntax(text) {
            let floor = NuGetVersion::parse(text)?;
            return Ok(Self {
                min: Some(floor),
                max: None,
                min_inclusive: true,
                max_inclusive: false,
                original: text.to_string(),
            });
        }

        let min_inclusive = text.starts_with('[');
        let max_inclusive = if text.ends_with(']') {
            true
        } else if text.ends_with(')') {
            false
        } else {
            return Err(VersionParseError::new(input, "range is missing a closing bracket"));
        };
        if text.len() < 2 {
            return Err(VersionParseError::new(input, "empty range"));
        }
        let inner = &text[1..text.len() - 1];

        let (min, max) = match inner.split_once(',') {
            Some((min, max)) => (parse_bound(input, min)?, parse_bound(input, max)?),
            None => {
                if !(min_inclusive && max_inclusive) {
                    return Err(VersionParseError::new(
                        input,
                        "a single-version range must use the exact form [x]",
                    ));
                }
                let exact = NuGetVersion::parse(inner)?;
                (Some(exact.clone()), Some(exact))
            }
        };

        if min.is_none() && max.is_none() {
            return Err(VersionParseError::new(input, "range has no bounds"));
        }

        Ok(Self {
            min,
            max,
            min_inclusive,
            max_inclusive,
            original: text.to_string(),
        })
    }

    /// The unbounded range, admitting every version.
    #[must_use]
    pub fn any() -> Self {
        Self {
            min: None,
            max: None,
            min_inclusive: false,
            max_inclusive: false,
            original: String::new(),
        }
    }

    /// Lower bound, if any.
    #[must_use]
    pub fn min(&self) -> Option<&NuGetVersion> {
        self.min.as_ref()
    }

    /// Upper bound, if any.
    #[must_use]
    pub fn max(&self) -> Option<&NuGetVersion> {
        self.max.as_ref()
    }

    /// Whether the lower bound is inclusive.
    #[must_use]
    pub const fn is_min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    /// Whether the upper bound is inclusive.
    #[must_use]
    pub const fn is_max_inclusive(&self) -> bool {
        self.max_inclusive
    }

    /// Whether this range pins a single version (`[x]`).
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.min_inclusive && self.max_inclusive && self.min.is_some() && self.min == self.max
    }

    /// Where `candidate` lies relative to this range.
    ///
    /// `Less` means below the lower bound, `Greater` above the upper bound and
    /// `Equal` inside the range. Callers use it to pick the closest candidate
    /// when nothing matches exactly.
    #[must_use]
    pub fn position_of(&self, candidate: &NuGetVersion) -> Ordering {
        if let Some(min) = &self.min {
            match candidate.cmp(min) {
                Ordering::Less => return Ordering::Less,
                Ordering::Equal if !self.min_inclusive => return Ordering::Less,
                _ => {}
            }
        }
        if let Some(max) = &self.max {
            match candidate.cmp(max) {
                Ordering::Greater => return Ordering::Greater,
                Ordering::Equal if !self.max_inclusive => return Ordering::Greater,
                _ => {}
            }
        }
        Ordering::Equal
    }

    /// Whether `candidate` satisfies this range.
    #[must_use]
    pub fn contains(&self, candidate: &NuGetVersion) -> bool {
        self.position_of(candidate) == Ordering::Equal
    }

    /// A representative version used to sort ranges: the lower bound, else the
    /// upper bound.
    #[must_use]
    pub fn sort_key(&self) -> Option<&NuGetVersion> {
        self.min.as_ref().or(self.max.as_ref())
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Whether a version string uses bracket syntax.
#[must_use]
pub fn is_range_syntax(version: &str) -> bool {
    let version = version.trim_start();
    version.starts_with('[') || version.starts_with('(')
}

/// Checks `candidate` against `range`, treating a bare range as an inclusive floor.
///
/// Unparseable input is logged and reported as not in range.
#[must_use]
pub fn in_range(range: &str, candidate: &str) -> bool {
    let range = match VersionRange::parse(range) {
        Ok(range) => range,
        Err(err) => {
            tracing::warn!("{err}");
            return false;
        }
    };
    match NuGetVersion::parse(candidate) {
        Ok(candidate) => range.contains(&candidate),
        Err(err) => {
            tracing::warn!("{err}");
            false
        }
    }
}

fn parse_bound(input: &str, text: &str) -> Result<Option<NuGetVersion>, VersionParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    NuGetVersion::parse(text)
        .map(Some)
        .map_err(|err| VersionParseError::new(input, err.to_string()))
}

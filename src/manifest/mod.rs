//! The project manifest (`packages.config`).
//!
//! The manifest is the durable record of what a project depends on, both
//! packages the user asked for and the dependencies pulled in for them:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <packages>
//! 	<package id="Foo" version="1.0.0" />
//! 	<package id="Newtonsoft.Json" version="[13.0,14.0)" manual="true" />
//! </packages>
//! ```
//!
//! # Invariants
//!
//! - One entry per id (ids compare case-insensitively). Adding a package that is
//!   already listed keeps whichever version is greater.
//! - Entries are kept sorted by id (ordinal) then version, and serialized with
//!   tab indentation and LF line endings. Saving an unchanged manifest rewrites
//!   identical bytes, so version control sees no noise.
//! - `manual="true"` marks packages the user installed directly; dependency
//!   cleanup on uninstall never removes them.
//!
//! # Durability
//!
//! The install engine saves the manifest after every mutation, before any
//! archive is downloaded. A crash mid-install therefore leaves an entry that the
//! next restore retries.
//!
//! # Modules
//!
//! - `manifest_io` - load, parse, serialize, save
//! - `manifest_mutations` - add, remove, manual flag

mod manifest_io;
mod manifest_mutations;


use std::path::{Path, PathBuf};

use crate::package::PackageIdentifier;

/// One `<package>` line of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Declared id and version (or range)
    pub identity: PackageIdentifier,
    /// Installed directly by the user
    pub manually_installed: bool,
}

impl ManifestEntry {
    /// Creates an entry.
    #[must_use]
    pub const fn new(identity: PackageIdentifier, manually_installed: bool) -> Self {
        Self {
            identity,
            manually_installed,
        }
    }
}

/// What [`Manifest::add`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// No entry with this id existed
    Added,
    /// An older version was replaced
    Replaced {
        /// The version that was replaced
        previous: String,
    },
    /// A newer version is already listed and was kept
    KeptExisting {
        /// The version that stays
        existing: String,
    },
    /// The same version is already listed
    Unchanged,
}

/// The declared dependencies of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    path: PathBuf,
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// An empty manifest that will be saved to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// File this manifest is saved to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries in sorted order.
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// The entry for `id`, compared case-insensitively.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.identity.same_id(id))
    }

    /// Whether `id` is listed.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest lists nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sort(&mut self) {
        self.entries.sort_by(|a, b| a.identity.compare(&b.identity));
    }
}

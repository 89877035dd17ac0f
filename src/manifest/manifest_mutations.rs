//! Mutation operations for manifest data.
//!
//! Every mutation keeps the entries sorted. Nothing here touches the disk; the
//! install engine calls [`Manifest::save`] after each change.

use std::cmp::Ordering;
use tracing::{debug, warn};

use super::{AddOutcome, Manifest, ManifestEntry};
use crate::package::PackageIdentifier;

impl Manifest {
    /// Adds a package, keeping at most one entry per id.
    ///
    /// - no entry for the id: the package is added
    /// - the listed version is older: it is replaced
    /// - the listed version is newer: it is kept and a warning is logged
    /// - the same version: nothing changes, except that `manual` is sticky and
    ///   is set if either side has it
    pub fn add(&mut self, identity: PackageIdentifier, manual: bool) -> AddOutcome {
        let Some(existing) = self.entries.iter_mut().find(|e| e.identity.same_id(&identity.id))
        else {
            debug!(id = %identity.id, version = %identity.version, manual, "Adding manifest entry");
            self.entries.push(ManifestEntry::new(identity, manual));
            self.sort();
            return AddOutcome::Added;
        };

        match identity.compare_version(&existing.identity) {
            Ordering::Greater => {
                let previous = std::mem::replace(&mut existing.identity, identity);
                existing.manually_installed |= manual;
                debug!(id = %existing.identity.id, from = %previous.version, to = %existing.identity.version, "Replacing manifest entry");
                self.sort();
                AddOutcome::Replaced {
                    previous: previous.version,
                }
            }
            Ordering::Less => {
                warn!(
                    id = %identity.id,
                    "Manifest already lists {} which is newer than {}; keeping it",
                    existing.identity.version,
                    identity.version
                );
                existing.manually_installed |= manual;
                AddOutcome::KeptExisting {
                    existing: existing.identity.version.clone(),
                }
            }
            Ordering::Equal => {
                existing.manually_installed |= manual;
                AddOutcome::Unchanged
            }
        }
    }

    /// Removes the entry for `id` (case-insensitive) and returns it.
    pub fn remove(&mut self, id: &str) -> Option<ManifestEntry> {
        let index = self.entries.iter().position(|e| e.identity.same_id(id))?;
        let removed = self.entries.remove(index);
        debug!(id = %removed.identity.id, version = %removed.identity.version, "Removed manifest entry");
        Some(removed)
    }

    /// Sets the manual-install flag of `id`. Returns whether the entry exists.
    pub fn set_manual(&mut self, id: &str, manual: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.identity.same_id(id)) {
            Some(entry) => {
                entry.manually_installed = manual;
                true
            }
            None => false,
        }
    }
}

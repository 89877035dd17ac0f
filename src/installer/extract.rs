//! Archive extraction into the install directory.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cleaner::is_excluded_entry;
use crate::core::NupmError;
use crate::package::PackageIdentifier;
use crate::utils::fs::{ensure_dir, ensure_parent_dir, is_safe_path, remove_dir_forced};

/// Extracts `archive` into `{install_dir}/{Id}.{Version}/` and returns that directory.
///
/// Any previous content of the directory is removed first. Entries matched by
/// [`is_excluded_entry`] are not written, and entries whose path would land
/// outside the directory are skipped. A copy of the archive is kept inside the
/// directory as the installed-package marker.
///
/// # Errors
///
/// Fails with [`NupmError::ArchiveCorrupt`] when the archive or one of its
/// entries cannot be read.
pub fn extract_package(
    archive: &Path,
    install_dir: &Path,
    identity: &PackageIdentifier,
) -> Result<PathBuf> {
    let corrupt = |reason: String| NupmError::ArchiveCorrupt {
        path: archive.display().to_string(),
        reason,
    };

    let destination = install_dir.join(identity.folder_name());
    remove_dir_forced(&destination)?;
    ensure_dir(&destination)?;

    let file = File::open(archive).map_err(|e| corrupt(e.to_string()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    let mut written = 0usize;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| corrupt(e.to_string()))?;
        let name = decode_entry_name(entry.name());

        if is_excluded_entry(&name) {
            continue;
        }
        let relative = Path::new(&name);
        if entry.enclosed_name().is_none() || !is_safe_path(&destination, relative) {
            let skipped = NupmError::PathTraversal {
                entry: entry.name().to_string(),
            };
            debug!(id = %identity.id, "{skipped}; skipping");
            continue;
        }

        let target = destination.join(relative);
        if entry.is_dir() {
            ensure_dir(&target)?;
            continue;
        }

        ensure_parent_dir(&target)?;
        let mut out = File::create(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| corrupt(format!("failed to extract '{name}': {e}")))?;
        written += 1;
    }

    let marker = destination.join(identity.archive_file_name());
    fs::copy(archive, &marker)
        .with_context(|| format!("Failed to copy archive marker to {}", marker.display()))?;

    debug!(id = %identity.id, version = %identity.version, files = written, dir = %destination.display(), "Extracted package");
    Ok(destination)
}

/// Archive entry names are percent-encoded (`net35-unity%20full%20v3.5`).
fn decode_entry_name(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'%' && i + 2 < bytes.len())
            .then(|| std::str::from_utf8(&bytes[i + 1..i + 3]).ok())
            .flatten()
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        if let Some(byte) = escaped {
            decoded.push(byte);
            i += 3;
            continue;
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

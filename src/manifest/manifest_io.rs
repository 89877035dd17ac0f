//! I/O operations for manifest files.
//!
//! - Loading manifests from XML files (a missing file is an empty manifest)
//! - Serializing to the canonical, byte-stable form
//! - Saving atomically

use anyhow::{Context, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fmt::Write as _;
use std::path::Path;
use tracing::warn;

use super::{AddOutcome, Manifest, ManifestEntry};
use crate::core::NupmError;
use crate::package::PackageIdentifier;
use crate::package::nuspec::{attribute, local_name};
use crate::utils::fs::atomic_write;

impl Manifest {
    /// Loads the manifest at `path`, or returns an empty one if the file does not exist.
    ///
    /// # Errors
    ///
    /// Fails with [`NupmError::ManifestParse`] when the file is not a valid
    /// manifest, or when it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let mut manifest = Self::new(path);
        if !path.exists() {
            return Ok(manifest);
        }

        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        for entry in parse_entries(&xml, &path.display().to_string())? {
            let id = entry.identity.id.clone();
            if let AddOutcome::KeptExisting { existing } | AddOutcome::Replaced { previous: existing } =
                manifest.add(entry.identity, entry.manually_installed)
            {
                warn!(id = %id, "Manifest lists '{id}' more than once; keeping the greater of the versions (other: {existing})");
            }
        }
        Ok(manifest)
    }

    /// Canonical XML text of the manifest.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<packages>\n");
        for entry in &self.entries {
            let _ = write!(
                xml,
                "\t<package id=\"{}\" version=\"{}\"",
                escape(entry.identity.id.as_str()),
                escape(entry.identity.version.as_str())
            );
            if entry.manually_installed {
                xml.push_str(" manual=\"true\"");
            }
            xml.push_str(" />\n");
        }
        xml.push_str("</packages>\n");
        xml
    }

    /// Writes the manifest to [`Manifest::path`] atomically.
    pub fn save(&self) -> Result<()> {
        atomic_write(&self.path, self.to_xml().as_bytes())
            .with_context(|| format!("Failed to save manifest: {}", self.path.display()))
    }
}

/// Parses manifest XML into entries, in file order.
pub(crate) fn parse_entries(xml: &str, label: &str) -> Result<Vec<ManifestEntry>> {
    let parse_error = |reason: String| NupmError::ManifestParse {
        file: label.to_string(),
        reason,
    };

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        match reader.read_event().map_err(|e| parse_error(e.to_string()))? {
            Event::Start(e) => {
                if depth == 0 {
                    check_root(&e, &mut saw_root).map_err(&parse_error)?;
                } else if depth == 1 && local_name(&e) == "package" {
                    entries.push(read_entry(&e).map_err(&parse_error)?);
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    check_root(&e, &mut saw_root).map_err(&parse_error)?;
                } else if depth == 1 && local_name(&e) == "package" {
                    entries.push(read_entry(&e).map_err(&parse_error)?);
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(parse_error("missing <packages> root element".to_string()).into());
    }
    if depth != 0 {
        return Err(parse_error("unexpected end of document".to_string()).into());
    }
    Ok(entries)
}

fn check_root(e: &BytesStart<'_>, saw_root: &mut bool) -> Result<(), String> {
    let name = local_name(e);
    if name != "packages" {
        return Err(format!("root element is <{name}>, expected <packages>"));
    }
    *saw_root = true;
    Ok(())
}

fn read_entry(e: &BytesStart<'_>) -> Result<ManifestEntry, String> {
    let id = attribute(e, "id")?.filter(|s| !s.trim().is_empty()).ok_or("<package> without id")?;
    let version = attribute(e, "version")?
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| format!("<package id=\"{id}\"> without version"))?;
    let manual = attribute(e, "manual")?.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
    Ok(ManifestEntry::new(PackageIdentifier::new(id, version), manual))
}

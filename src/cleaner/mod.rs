//! Post-extraction cleanup of an installed package directory.
//!
//! A freshly extracted package carries far more than a project can use. The
//! cleaner reduces `{install_dir}/{Id}.{Version}/` to what the consumer loads:
//!
//! 1. Packaging metadata goes: the descriptor, `[Content_Types].xml`, `_rels/`,
//!    `package/` and the signature file.
//! 2. `build/`, `buildTransitive/`, `doc/`, `docs/`, `src/` and `ref/` go, as do
//!    `*.pdb` symbol files anywhere in the tree.
//! 3. `lib/` keeps the single best target framework folder for the configured
//!    [`FrameworkProfile`] (see [`frameworks`]).
//! 4. `runtimes/` keeps only folders for the primary CPU architecture. When one
//!    `os-arch` folder survives for an OS, it is renamed to plain `os`.
//! 5. `tools/` is relocated to `{tools_dir}/{Id}.{Version}`.
//! 6. Asset folders (for example `StreamingAssets`) are merged into their fixed
//!    destinations outside the package. Locked destination files are reported
//!    as warnings, never as failures.
//!
//! The package's own archive marker (`{Id}.{Version}.nupkg`) is left alone;
//! the installed index needs it to rebuild itself.

pub mod frameworks;

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::constants::DESCRIPTOR_EXTENSION;
use crate::package::PackageIdentifier;
use crate::utils::fs::{copy_dir_overwrite, move_dir, remove_dir_forced, remove_file_forced};

pub use frameworks::{Compatibility, FrameworkProfile};

/// Root-level folders removed from every package.
const STRIPPED_FOLDERS: &[&str] =
    &["_rels", "package", "build", "buildTransitive", "doc", "docs", "src", "ref"];

/// Root-level files removed from every package.
const STRIPPED_FILES: &[&str] = &["[Content_Types].xml", ".signature.p7s"];

const RUNTIME_PATTERN: &str =
    r"(?i)^(?P<os>.+?)-(?P<arch>x86|x64|arm|arm64|armel|armv6|s390x|ppc64le|loongarch64|wasm)$";

/// Whether an archive entry is dropped at extraction time.
///
/// Covers the packaging metadata, the build/doc/source folders and symbol
/// files. The cleaner removes the same things again in case they were put
/// in place by other means.
#[must_use]
pub fn is_excluded_entry(entry: &str) -> bool {
    let normalized = entry.replace('\\', "/");
    let mut parts = normalized.split('/').filter(|p| !p.is_empty());
    let Some(first) = parts.next() else {
        return true;
    };
    let is_root_file = parts.next().is_none() && !normalized.ends_with('/');

    if is_root_file {
        if STRIPPED_FILES.iter().any(|f| f.eq_ignore_ascii_case(first))
            || has_extension(first, DESCRIPTOR_EXTENSION)
        {
            return true;
        }
    } else if STRIPPED_FOLDERS.iter().any(|f| f.eq_ignore_ascii_case(first)) {
        return true;
    }

    normalized.rsplit('/').next().is_some_and(|name| has_extension(name, "pdb"))
}

/// A package-root folder that is moved to a fixed destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMapping {
    /// Folder name at the package root, matched case-insensitively
    pub folder: String,
    /// Directory the folder's contents are merged into
    pub destination: PathBuf,
}

impl AssetMapping {
    /// Creates a mapping.
    pub fn new(folder: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            destination: destination.into(),
        }
    }
}

/// What a cleaning pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// `lib/` framework folders that were kept
    pub kept_frameworks: Vec<String>,
    /// Files and folders that were deleted
    pub removed: Vec<PathBuf>,
    /// Where `tools/` ended up, if the package had one
    pub relocated_tools: Option<PathBuf>,
    /// Destinations that received asset folders
    pub moved_assets: Vec<PathBuf>,
    /// Destination files that could not be overwritten
    pub locked_files: Vec<PathBuf>,
}

/// Strips an extracted package down to what the consumer needs.
#[derive(Debug, Clone)]
pub struct ContentCleaner {
    profile: FrameworkProfile,
    architecture: String,
    tools_dir: PathBuf,
    assets: Vec<AssetMapping>,
}

impl ContentCleaner {
    /// Creates a cleaner.
    ///
    /// `architecture` is the primary CPU architecture kept under `runtimes/`
    /// (`x64`, `arm64`, ...). `tools_dir` receives relocated `tools/` folders.
    pub fn new(
        profile: FrameworkProfile,
        architecture: impl Into<String>,
        tools_dir: impl Into<PathBuf>,
        assets: Vec<AssetMapping>,
    ) -> Self {
        Self {
            profile,
            architecture: architecture.into(),
            tools_dir: tools_dir.into(),
            assets,
        }
    }

    /// The framework profile used for `lib/` selection.
    #[must_use]
    pub fn profile(&self) -> &FrameworkProfile {
        &self.profile
    }

    /// Cleans `package_dir`, the extracted directory of `identity`.
    pub fn clean(&self, package_dir: &Path, identity: &PackageIdentifier) -> Result<CleanReport> {
        let mut report = CleanReport::default();

        self.strip_metadata(package_dir, &mut report)?;
        self.strip_symbols(package_dir, &mut report)?;
        self.select_frameworks(package_dir, &mut report)?;
        self.filter_runtimes(package_dir, &mut report)?;
        self.relocate_tools(package_dir, identity, &mut report)?;
        self.move_assets(package_dir, identity, &mut report)?;

        debug!(
            id = %identity.id,
            version = %identity.version,
            removed = report.removed.len(),
            frameworks = ?report.kept_frameworks,
            "Cleaned package"
        );
        Ok(report)
    }

    fn strip_metadata(&self, package_dir: &Path, report: &mut CleanReport) -> Result<()> {
        for entry in read_children(package_dir)? {
            let name = file_name(&entry);
            let doomed = if entry.is_dir() {
                STRIPPED_FOLDERS.iter().any(|f| f.eq_ignore_ascii_case(&name))
            } else {
                STRIPPED_FILES.iter().any(|f| f.eq_ignore_ascii_case(&name))
                    || has_extension(&name, DESCRIPTOR_EXTENSION)
            };
            if doomed {
                remove_path(&entry, report)?;
            }
        }
        Ok(())
    }

    fn strip_symbols(&self, package_dir: &Path, report: &mut CleanReport) -> Result<()> {
        let symbols: Vec<PathBuf> = WalkDir::new(package_dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| has_extension(&e.file_name().to_string_lossy(), "pdb"))
            .map(walkdir::DirEntry::into_path)
            .collect();
        for path in symbols {
            remove_path(&path, report)?;
        }
        Ok(())
    }

    fn select_frameworks(&self, package_dir: &Path, report: &mut CleanReport) -> Result<()> {
        let Some(lib) = find_child_dir(package_dir, "lib")? else {
            return Ok(());
        };

        let folders: Vec<PathBuf> = read_children(&lib)?.into_iter().filter(|p| p.is_dir()).collect();
        if folders.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = folders.iter().map(|p| file_name(p)).collect();
        let kept = self.profile.select_folders(&names);
        if kept.is_empty() {
            warn!(
                package = %package_dir.display(),
                "No library folder in {names:?} is compatible with {:?}",
                self.profile.compatibility
            );
        }

        for (path, name) in folders.iter().zip(&names) {
            if !kept.contains(name) {
                remove_path(path, report)?;
            }
        }
        report.kept_frameworks = kept;
        Ok(())
    }

    fn filter_runtimes(&self, package_dir: &Path, report: &mut CleanReport) -> Result<()> {
        let Some(runtimes) = find_child_dir(package_dir, "runtimes")? else {
            return Ok(());
        };
        let pattern = Regex::new(RUNTIME_PATTERN)?;

        let mut kept: Vec<(String, PathBuf)> = Vec::new();
        let mut plain_os: Vec<String> = Vec::new();
        for folder in read_children(&runtimes)?.into_iter().filter(|p| p.is_dir()) {
            let name = file_name(&folder);
            match pattern.captures(&name) {
                Some(caps) if caps["arch"].eq_ignore_ascii_case(&self.architecture) => {
                    kept.push((caps["os"].to_string(), folder));
                }
                Some(_) => remove_path(&folder, report)?,
                None => plain_os.push(name.to_ascii_lowercase()),
            }
        }

        for (os, folder) in &kept {
            let siblings = kept.iter().filter(|(other, _)| other.eq_ignore_ascii_case(os)).count();
            if siblings == 1 && !plain_os.contains(&os.to_ascii_lowercase()) {
                let target = runtimes.join(os);
                fs::rename(folder, &target).with_context(|| {
                    format!("Failed to rename {} to {}", folder.display(), target.display())
                })?;
                debug!(from = %folder.display(), to = %target.display(), "Dropped architecture suffix");
            }
        }
        Ok(())
    }

    fn relocate_tools(
        &self,
        package_dir: &Path,
        identity: &PackageIdentifier,
        report: &mut CleanReport,
    ) -> Result<()> {
        let Some(tools) = find_child_dir(package_dir, "tools")? else {
            return Ok(());
        };
        let target = self.tools_dir.join(identity.folder_name());
        remove_dir_forced(&target)?;
        move_dir(&tools, &target)?;
        debug!(id = %identity.id, to = %target.display(), "Relocated tools");
        report.relocated_tools = Some(target);
        Ok(())
    }

    fn move_assets(
        &self,
        package_dir: &Path,
        identity: &PackageIdentifier,
        report: &mut CleanReport,
    ) -> Result<()> {
        for mapping in &self.assets {
            let Some(source) = find_child_dir(package_dir, &mapping.folder)? else {
                continue;
            };

            let locked = copy_dir_overwrite(&source, &mapping.destination)?;
            for file in &locked {
                warn!(
                    id = %identity.id,
                    "{} is in use and was not overwritten; restart the host to pick up the new copy",
                    file.display()
                );
            }
            remove_dir_forced(&source)?;
            report.locked_files.extend(locked);
            report.moved_assets.push(mapping.destination.clone());
        }
        Ok(())
    }
}

fn read_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        children.push(entry?.path());
    }
    children.sort();
    Ok(children)
}

fn find_child_dir(dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    Ok(read_children(dir)?
        .into_iter()
        .find(|p| p.is_dir() && file_name(p).eq_ignore_ascii_case(name)))
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn has_extension(name: &str, extension: &str) -> bool {
    Path::new(name).extension().is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn remove_path(path: &Path, report: &mut CleanReport) -> Result<()> {
    if path.is_dir() {
        remove_dir_forced(path)?;
    } else {
        remove_file_forced(path)?;
    }
    report.removed.push(path.to_path_buf());
    Ok(())
}

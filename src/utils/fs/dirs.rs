//! Directory operations for creating, moving, copying, and removing directories.
//!
//! Package archives routinely contain read-only files, so every removal here
//! clears the read-only attribute before deleting.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Ensures a directory exists, creating it and all parent directories if necessary.
///
/// # Errors
///
/// Fails if the path exists but is not a directory, or creation fails.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| {
            format!(
                "Failed to create directory: {}\n\nCheck directory permissions and path validity",
                path.display()
            )
        })?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Ensures that the parent directory of a file path exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    Ok(())
}

/// Clears the read-only attribute on `path` and everything below it.
///
/// Symbolic links are left alone.
pub fn clear_readonly(path: &Path) -> Result<()> {
    for entry in WalkDir::new(path).follow_links(false) {
        let entry =
            entry.with_context(|| format!("Failed to walk directory: {}", path.display()))?;
        make_writable(entry.path()).with_context(|| {
            format!("Failed to clear read-only attribute: {}", entry.path().display())
        })?;
    }
    Ok(())
}

/// Removes a directory tree, clearing read-only attributes first.
///
/// A missing directory is not an error.
///
/// # Examples
///
/// ```rust,no_run
/// use nupm_cli::utils::fs::remove_dir_forced;
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// remove_dir_forced(Path::new("Packages/Foo.1.0.0"))?;
/// # Ok(())
/// # }
/// ```
pub fn remove_dir_forced(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }
    clear_readonly(path)?;
    fs::remove_dir_all(path)
        .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    debug!(path = %path.display(), "Removed directory");
    Ok(())
}

/// Removes a single file, clearing its read-only attribute first.
///
/// A missing file is not an error.
pub fn remove_file_forced(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }
    make_writable(path)
        .with_context(|| format!("Failed to clear read-only attribute: {}", path.display()))?;
    fs::remove_file(path).with_context(|| format!("Failed to remove file: {}", path.display()))
}

/// Moves a directory to `dst`, replacing whatever is there.
///
/// Tries a rename first and falls back to copy-then-delete, which is needed
/// when `src` and `dst` live on different volumes.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    remove_dir_forced(dst)?;
    ensure_parent_dir(dst)?;

    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    debug!(from = %src.display(), to = %dst.display(), "Rename failed, copying instead");
    let locked = copy_dir_overwrite(src, dst)?;
    if let Some(first) = locked.first() {
        return Err(anyhow::anyhow!("Failed to move directory: {} is locked", first.display()));
    }
    remove_dir_forced(src)
}

/// Copies a directory tree onto `dst`, overwriting existing files.
///
/// Files that cannot be overwritten (typically because another process holds
/// them open) are skipped and returned so the caller can warn about them.
/// Failing to read `src` or to create a directory is still an error.
pub fn copy_dir_overwrite(src: &Path, dst: &Path) -> Result<Vec<PathBuf>> {
    let mut locked = Vec::new();
    copy_into(src, dst, &mut locked)?;
    Ok(locked)
}

fn copy_into(src: &Path, dst: &Path, locked: &mut Vec<PathBuf>) -> Result<()> {
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_into(&src_path, &dst_path, locked)?;
        } else if file_type.is_file() {
            if dst_path.exists() {
                let _ = make_writable(&dst_path);
            }
            if let Err(e) = fs::copy(&src_path, &dst_path) {
                debug!(path = %dst_path.display(), error = %e, "Could not overwrite file");
                locked.push(dst_path);
            }
        }
    }

    Ok(())
}

#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.file_type().is_symlink() {
        return Ok(());
    }
    let mut permissions = metadata.permissions();
    if !permissions.readonly() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        permissions.set_readonly(false);
    }

    fs::set_permissions(path, permissions)
}

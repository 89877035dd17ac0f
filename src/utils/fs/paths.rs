//! Path normalization and traversal checks.

use std::path::{Component, Path, PathBuf};

/// Normalizes a path by resolving `.` and `..` components.
///
/// This is purely lexical: the filesystem is not consulted and symbolic links
/// are not resolved. A `..` that would climb above the start of a relative path
/// is dropped.
///
/// # Examples
///
/// ```rust,no_run
/// use nupm_cli::utils::fs::normalize_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(normalize_path(Path::new("/foo/./bar/../baz")), PathBuf::from("/foo/baz"));
/// ```
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                components.pop();
            }
            c => components.push(c),
        }
    }

    components.iter().collect()
}

/// Checks that `path` stays within `base` once both are normalized.
///
/// Relative paths are joined onto `base` first. Archive extraction calls this
/// for every entry so that `../` or absolute entry names never reach the disk.
///
/// # Examples
///
/// ```rust,no_run
/// use nupm_cli::utils::fs::is_safe_path;
/// use std::path::Path;
///
/// let base = Path::new("/project/Packages/Foo.1.0.0");
/// assert!(is_safe_path(base, Path::new("lib/net45/Foo.dll")));
/// assert!(!is_safe_path(base, Path::new("../../../etc/passwd")));
/// assert!(!is_safe_path(base, Path::new("/etc/passwd")));
/// ```
#[must_use]
pub fn is_safe_path(base: &Path, path: &Path) -> bool {
    let normalized_base = normalize_path(base);

    // `lib/../../x` pops past the base before the join would notice it.
    let mut depth: usize = 0;
    if !path.is_absolute() {
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) => return false,
            }
        }
    }

    let normalized_path =
        if path.is_absolute() { normalize_path(path) } else { normalize_path(&base.join(path)) };

    normalized_path.starts_with(normalized_base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize_path(Path::new("/a/b/..")), PathBuf::from("/a"));
    }

    #[test]
    fn test_is_safe_path() {
        let base = Path::new("/install/Foo.1.0.0");
        assert!(is_safe_path(base, Path::new("lib/net45/Foo.dll")));
        assert!(is_safe_path(base, Path::new("./content/readme.txt")));
        assert!(is_safe_path(base, Path::new("lib/../tools/init.ps1")));
        assert!(!is_safe_path(base, Path::new("../Bar.1.0.0/evil.dll")));
        assert!(!is_safe_path(base, Path::new("lib/../../evil.dll")));
        assert!(!is_safe_path(base, Path::new("/etc/passwd")));
    }
}

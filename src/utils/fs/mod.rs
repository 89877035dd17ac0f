//! File system utilities used by the install engine and the content cleaner
//!
//! # Key Features
//!
//! - **Atomic writes**: the manifest is written to a temp file and renamed into place
//! - **Forced deletion**: read-only bits are cleared before a tree is removed, so
//!   packages that ship read-only files can still be uninstalled
//! - **Moves across volumes**: rename first, copy-then-delete when rename fails
//! - **Safety**: path normalization and traversal checks for archive extraction
//!
//! # Examples
//!
//! ```rust,no_run
//! use nupm_cli::utils::fs::{atomic_write, is_safe_path, remove_dir_forced};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! atomic_write(Path::new("packages.config"), b"<packages />\n")?;
//! assert!(!is_safe_path(Path::new("Packages/Foo.1.0.0"), Path::new("../../evil.dll")));
//! remove_dir_forced(Path::new("Packages/Foo.1.0.0"))?;
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod dirs;
pub mod paths;

pub use atomic::atomic_write;
pub use dirs::{
    clear_readonly, copy_dir_overwrite, ensure_dir, ensure_parent_dir, move_dir,
    remove_dir_forced, remove_file_forced,
};
pub use paths::{is_safe_path, normalize_path};

//! Cross-platform utilities and helpers
//!
//! # Modules
//!
//! - [`fs`] - File system operations: atomic writes, forced deletion, moves and
//!   traversal-safe path checks
//! - [`progress`] - Progress bars for long-running commands
//! - [`backoff`] - Retry delays shared by the project lock and credential providers
//! - [`project_lock`] - Cross-process exclusive lock on a context directory

pub mod backoff;
pub mod fs;
pub mod progress;
pub mod project_lock;

pub use fs::{atomic_write, ensure_dir, is_safe_path, normalize_path, remove_dir_forced};
pub use progress::ProgressBar;
pub use project_lock::ProjectLock;

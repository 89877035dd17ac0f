//! Core types shared by every nupm module.
//!
//! The core module currently hosts the error system:
//! - [`NupmError`] - Enumerated failure categories of the restore engine
//! - [`ErrorContext`] - User-facing wrapper with details and suggestions
//! - [`user_friendly_error`] - Convert any `anyhow::Error` for CLI display
//!
//! Library functions return `anyhow::Result` and wrap a [`NupmError`] when the
//! failure category matters to a caller, so batch operations can `downcast_ref`
//! and decide whether to continue:
//!
//! ```rust,no_run
//! use nupm_cli::core::NupmError;
//!
//! fn is_missing_package(err: &anyhow::Error) -> bool {
//!     matches!(err.downcast_ref::<NupmError>(), Some(NupmError::PackageNotFound { .. }))
//! }
//! ```

pub mod error;

pub use error::{ErrorContext, NupmError, user_friendly_error};

//! Error handling for nupm
//!
//! This module provides the error taxonomy of the restore engine and the
//! user-friendly rendering used by the CLI. The error system follows two rules:
//! 1. **Strongly-typed errors** so the engine can tell a missing package from a
//!    corrupt archive and keep a batch restore going
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Versions**: [`NupmError::VersionParse`]
//! - **Resolution**: [`NupmError::PackageNotFound`], [`NupmError::DependencyFailed`]
//! - **Network**: [`NupmError::Network`], [`NupmError::FeedParse`], [`NupmError::CredentialProvider`]
//! - **Archives**: [`NupmError::ArchiveCorrupt`], [`NupmError::PathTraversal`]
//! - **Files**: [`NupmError::ManifestParse`], [`NupmError::ConfigError`], [`NupmError::FileSystemError`]
//!
//! # Propagation
//!
//! Failures inside a single package install are caught at the engine boundary,
//! logged with the package id, version and operation, and reported as a failed
//! entry of the restore report. Only the CLI turns an aggregate failure into a
//! non-zero exit code, using [`user_friendly_error`] for display.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::version::VersionParseError;

/// The main error type for nupm operations
///
/// Each variant maps to one failure category of the engine. Variants carry the
/// package id, version, path or URL needed to report the failure without any
/// further context.
#[derive(Error, Debug, Clone)]
pub enum NupmError {
    /// A version string or version range could not be parsed.
    ///
    /// Comparisons treat this as non-fatal: the offending side orders lower.
    #[error("Invalid version '{version}': {reason}")]
    VersionParse {
        /// The text that failed to parse
        version: String,
        /// Why it failed
        reason: String,
    },

    /// No enabled source offers a version satisfying the request
    #[error("Package '{id}' with version '{version}' was not found in any enabled source")]
    PackageNotFound {
        /// Requested package id
        id: String,
        /// Requested version or range
        version: String,
    },

    /// A dependency could not be installed, so its parent was aborted
    #[error("Dependency '{dependency}' of '{id}' failed to install")]
    DependencyFailed {
        /// The package whose install was aborted
        id: String,
        /// The dependency that failed
        dependency: String,
    },

    /// Network failure talking to a feed or downloading an archive
    #[error("Network error while {operation}: {reason}")]
    Network {
        /// What was being done (e.g. "downloading Foo 1.0.0")
        operation: String,
        /// Underlying failure
        reason: String,
    },

    /// The remote endpoint does not implement the requested feed method
    #[error("Feed endpoint not supported: {url}")]
    FeedMethodNotSupported {
        /// The URL that answered 404
        url: String,
    },

    /// A feed response could not be parsed
    #[error("Invalid feed response from {url}: {reason}")]
    FeedParse {
        /// The page URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// A package archive is missing, unreadable, or lacks an expected entry
    #[error("Package archive '{path}' is corrupt: {reason}")]
    ArchiveCorrupt {
        /// Archive location
        path: String,
        /// What is wrong with it
        reason: String,
    },

    /// An archive entry tried to escape its destination directory
    #[error("Archive entry '{entry}' escapes the destination directory")]
    PathTraversal {
        /// The offending entry name
        entry: String,
    },

    /// The manifest file exists but is not valid
    #[error("Invalid manifest file {file}: {reason}")]
    ManifestParse {
        /// Manifest path
        file: String,
        /// Parser message
        reason: String,
    },

    /// A package descriptor (nuspec) is not valid
    #[error("Invalid package descriptor {file}: {reason}")]
    DescriptorParse {
        /// Descriptor location
        file: String,
        /// Parser message
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// A credential provider returned a failure
    #[error("Credential provider '{provider}' failed for {uri}: {reason}")]
    CredentialProvider {
        /// Provider executable or name
        provider: String,
        /// Feed URI the credentials were requested for
        uri: String,
        /// Failure description
        reason: String,
    },

    /// File system error
    #[error("File system error: {operation}")]
    FileSystemError {
        /// The file system operation that failed
        operation: String,
        /// Path where the file system error occurred
        path: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl From<VersionParseError> for NupmError {
    fn from(err: VersionParseError) -> Self {
        Self::VersionParse {
            version: err.input().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// Wraps a [`NupmError`] with an optional suggestion (printed in green) and
/// optional details (printed in yellow).
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: NupmError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details
    #[must_use]
    pub const fn new(error: NupmError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`NupmError`] anywhere in the chain, then common [`std::io::Error`]
/// kinds, and falls back to a generic message that includes the full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(nupm_error) = error.chain().find_map(|e| e.downcast_ref::<NupmError>()) {
        let mut ctx = create_error_context(nupm_error.clone());
        if ctx.details.is_none() {
            let outer = error.to_string();
            if outer != nupm_error.to_string() {
                ctx.details = Some(outer);
            }
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(NupmError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion(
                    "Check file ownership, or close the program that holds the file open",
                )
                .with_details("nupm does not have permission to read or write a file");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(NupmError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(NupmError::Other {
        message,
    })
}

fn create_error_context(error: NupmError) -> ErrorContext {
    match &error {
        NupmError::PackageNotFound { id, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Check the spelling of '{id}' and that a source in nupm.toml is enabled and reachable"
            )),
        NupmError::Network { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Check your internet connection and the feed URL, then run the restore again")
            .with_details("Downloaded archives are cached, so a second restore only fetches what is missing"),
        NupmError::ArchiveCorrupt { path, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Delete '{path}' from the cache and restore again")),
        NupmError::ManifestParse { file, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Check the XML in {file}: every entry must look like <package id=\"Id\" version=\"1.0.0\" />"
            )),
        NupmError::ConfigError { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Check the syntax and field names in nupm.toml"),
        NupmError::CredentialProvider { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Configure username/password for the source in nupm.toml, or fix the credential provider"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = NupmError::PackageNotFound {
            id: "Newtonsoft.Json".to_string(),
            version: "13.0.1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Package 'Newtonsoft.Json' with version '13.0.1' was not found in any enabled source"
        );

        let error = NupmError::PathTraversal {
            entry: "../evil.dll".to_string(),
        };
        assert_eq!(error.to_string(), "Archive entry '../evil.dll' escapes the destination directory");
    }

    #[test]
    fn test_error_context_display() {
        let ctx = ErrorContext::new(NupmError::ConfigError {
            message: "bad".to_string(),
        })
        .with_suggestion("fix it")
        .with_details("more");

        let display = format!("{ctx}");
        assert!(display.contains("Configuration error: bad"));
        assert!(display.contains("Details: more"));
        assert!(display.contains("Suggestion: fix it"));
    }

    #[test]
    fn test_user_friendly_error_finds_wrapped_error() {
        let err = anyhow::Error::new(NupmError::PackageNotFound {
            id: "Foo".to_string(),
            version: "1.0.0".to_string(),
        })
        .context("Failed to install Foo");

        let ctx = user_friendly_error(err);
        assert!(matches!(ctx.error, NupmError::PackageNotFound { .. }));
        assert!(ctx.suggestion.is_some());
        assert_eq!(ctx.details.as_deref(), Some("Failed to install Foo"));
    }

    #[test]
    fn test_user_friendly_error_generic_chain() {
        let err = anyhow::anyhow!("root cause").context("outer");
        let ctx = user_friendly_error(err);
        match ctx.error {
            NupmError::Other { message } => {
                assert!(message.starts_with("outer"));
                assert!(message.contains("1: root cause"));
            }
            other => panic!("Expected Other, got {other:?}"),
        }
    }

    #[test]
    fn test_from_version_parse_error() {
        let parse_err = crate::version::NuGetVersion::parse("1.x").unwrap_err();
        let err = NupmError::from(parse_err);
        assert!(matches!(err, NupmError::VersionParse { ref version, .. } if version == "1.x"));
    }
}

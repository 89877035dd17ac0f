//! Feed credentials and credential providers.
//!
//! A source can carry static credentials from `nupm.toml`. When it does not,
//! authenticated feeds are served by external credential providers: executables
//! invoked as
//!
//! ```text
//! provider -uri <truncated feed uri> -nonInteractive -outputFormat json
//! ```
//!
//! | exit code | meaning                                                         |
//! |-----------|-----------------------------------------------------------------|
//! | 0         | success, stdout holds `{"Username": "..", "Password": ".."}`    |
//! | 1         | not applicable, ask the next provider                           |
//! | other     | failure, retried a fixed number of times                        |
//!
//! Answers are cached per truncated URI in a [`CredentialStore`] for the
//! lifetime of the store, including "nobody had credentials", so a restore of
//! a hundred packages from one feed runs the providers once.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

use crate::constants::CREDENTIAL_PROVIDER_RETRIES;
use crate::core::NupmError;
use crate::utils::backoff::backoff_delay;

/// A username/password pair for Basic authentication.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// User name
    #[serde(rename = "Username")]
    pub username: String,
    /// Password or API token
    #[serde(rename = "Password")]
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// What a provider answered for one URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResponse {
    /// The provider supplied credentials
    Success(Credentials),
    /// The provider does not handle this URI
    NotApplicable,
}

/// Source of credentials for a feed URI.
pub trait CredentialProvider {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Asks for credentials for `uri`.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider fails; the store retries it.
    fn get_credentials(&self, uri: &str) -> Result<ProviderResponse>;
}

/// A credential provider executable following the exit-code contract above.
#[derive(Debug, Clone)]
pub struct ExecutableCredentialProvider {
    path: PathBuf,
    name: String,
}

impl ExecutableCredentialProvider {
    /// Wraps the executable at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self {
            path,
            name,
        }
    }

    /// Executable path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for ExecutableCredentialProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_credentials(&self, uri: &str) -> Result<ProviderResponse> {
        let failure = |reason: String| NupmError::CredentialProvider {
            provider: self.name.clone(),
            uri: uri.to_string(),
            reason,
        };

        let output = Command::new(&self.path)
            .args(["-uri", uri, "-nonInteractive", "-outputFormat", "json"])
            .output()
            .with_context(|| format!("Failed to run credential provider: {}", self.name))?;

        match output.status.code() {
            Some(0) => {
                let credentials: Credentials = serde_json::from_slice(&output.stdout)
                    .map_err(|e| failure(format!("invalid JSON on stdout: {e}")))?;
                Ok(ProviderResponse::Success(credentials))
            }
            Some(1) => Ok(ProviderResponse::NotApplicable),
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let reason = match code {
                    Some(code) if stderr.is_empty() => format!("exit code {code}"),
                    Some(code) => format!("exit code {code}: {stderr}"),
                    None => "terminated by a signal".to_string(),
                };
                Err(failure(reason).into())
            }
        }
    }
}

/// Credential providers plus a per-URI answer cache.
///
/// Owned by the install engine and shared with the package cache and remote
/// sources through an `Rc`; the cache lives as long as the engine.
pub struct CredentialStore {
    providers: Vec<Box<dyn CredentialProvider>>,
    cache: RefCell<HashMap<String, Option<Credentials>>>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("providers", &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("cached_uris", &self.cache.borrow().len())
            .finish()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl CredentialStore {
    /// Creates a store that asks `providers` in order.
    #[must_use]
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self {
            providers,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Creates a store from provider executable paths.
    #[must_use]
    pub fn from_executables(paths: &[PathBuf]) -> Self {
        Self::new(
            paths
                .iter()
                .map(|p| Box::new(ExecutableCredentialProvider::new(p)) as Box<dyn CredentialProvider>)
                .collect(),
        )
    }

    /// Credentials for the feed behind `uri`, asking providers on a cache miss.
    ///
    /// The cache key is [`truncate_uri`] of `uri`. Providers that keep failing
    /// after the retries are skipped with a warning; the lookup itself never fails.
    pub fn lookup(&self, uri: &str) -> Option<Credentials> {
        let key = truncate_uri(uri);
        if let Some(cached) = self.cache.borrow().get(&key) {
            return cached.clone();
        }

        let found = self.ask_providers(&key);
        self.cache.borrow_mut().insert(key, found.clone());
        found
    }

    /// Forgets every cached answer, so the next lookup asks the providers again.
    pub fn clear_cached_credentials(&self) {
        self.cache.borrow_mut().clear();
    }

    fn ask_providers(&self, uri: &str) -> Option<Credentials> {
        for provider in &self.providers {
            let mut attempt = 0;
            loop {
                match provider.get_credentials(uri) {
                    Ok(ProviderResponse::Success(credentials)) => {
                        debug!(provider = provider.name(), uri, "Credential provider supplied credentials");
                        return Some(credentials);
                    }
                    Ok(ProviderResponse::NotApplicable) => {
                        debug!(provider = provider.name(), uri, "Credential provider not applicable");
                        break;
                    }
                    Err(e) if attempt < CREDENTIAL_PROVIDER_RETRIES => {
                        debug!(provider = provider.name(), uri, attempt, error = %e, "Retrying credential provider");
                        std::thread::sleep(backoff_delay(attempt));
                        attempt += 1;
                    }
                    Err(e) => {
                        warn!(provider = provider.name(), uri, "Credential provider failed: {e:#}");
                        break;
                    }
                }
            }
        }
        None
    }
}

/// Reduces a feed URL to the key credentials are requested and cached under:
/// scheme, host and path with the query and the trailing method segment removed.
///
/// `https://feed.example.com/api/v2/FindPackagesById()?id='Foo'` becomes
/// `https://feed.example.com/api/v2/`.
#[must_use]
pub fn truncate_uri(uri: &str) -> String {
    match reqwest::Url::parse(uri) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            let text = url.as_str();
            match text.rfind('/') {
                Some(slash) if slash + 1 > url.origin().ascii_serialization().len() => {
                    text[..=slash].to_string()
                }
                _ => text.to_string(),
            }
        }
        Err(_) => uri.to_string(),
    }
}

//! Project configuration (`nupm.toml`).
//!
//! A project is a *context directory* holding the manifest (`packages.config`)
//! and, optionally, a `nupm.toml`. Every field has a default, so a missing file
//! is the same as an empty one: packages go to `Packages/`, archives are cached
//! in the platform cache directory, and nuget.org is the only feed.
//!
//! ```toml
//! install_dir = "Assets/Packages"
//! architecture = "x64"
//! include_prerelease = false
//! engine_libraries = ["Newtonsoft.Json.dll"]
//! metadata_timeout_secs = 10
//! credential_providers = ["~/.nuget/plugins/CredentialProvider.exe"]
//!
//! [framework]
//! compatibility = "netframework"
//! platform_version = "2021.3"
//!
//! [[sources]]
//! name = "company"
//! path = "https://nuget.example.com/api/v2/"
//! username = "ci"
//! password = "$NUGET_PASSWORD"
//!
//! [[sources]]
//! name = "local"
//! path = "~/packages"
//!
//! [assets]
//! StreamingAssets = "Assets/StreamingAssets"
//! Plugins = "Assets/Plugins/{arch}"
//! ```
//!
//! Relative paths are resolved against the context directory. Source paths and
//! passwords are expanded with `~` and `$VAR` rules once, at load time. The
//! `NUPM_CACHE_DIR` environment variable takes precedence over `cache_dir`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::Credentials;
use crate::cleaner::{AssetMapping, FrameworkProfile};
use crate::constants::{
    CACHE_DIR_ENV, CONFIG_FILE_NAME, DEFAULT_FEED_NAME, DEFAULT_FEED_URL, DEFAULT_INSTALL_DIR,
    DEFAULT_TOOLS_DIR, MANIFEST_FILE_NAME,
};
use crate::core::NupmError;
use crate::source::PackageSourceConfig;

/// Placeholder replaced by the primary architecture in asset destinations.
const ARCH_PLACEHOLDER: &str = "{arch}";

/// One `[[sources]]` table as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Display name
    pub name: String,
    /// Directory or feed URL, before expansion
    pub path: String,
    /// Disabled sources are never queried
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Basic auth user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Basic auth password, expanded like the path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

const fn default_true() -> bool {
    true
}

/// Settings of one context directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Where packages are extracted
    pub install_dir: PathBuf,
    /// Archive cache; platform cache directory when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Where `tools/` folders are relocated
    pub tools_dir: PathBuf,
    /// Consider prerelease versions during resolution
    pub include_prerelease: bool,
    /// Primary CPU architecture kept under `runtimes/`
    pub architecture: String,
    /// Library file names the host already loads; packages providing them are skipped
    pub engine_libraries: Vec<String>,
    /// Timeout of a single feed metadata query
    pub metadata_timeout_secs: u64,
    /// Timeout of a single archive download; unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_timeout_secs: Option<u64>,
    /// Target framework selection
    pub framework: FrameworkProfile,
    /// Package feeds, queried in order
    pub sources: Vec<SourceEntry>,
    /// Credential provider executables, asked in order
    pub credential_providers: Vec<String>,
    /// Asset folder name → destination
    pub assets: BTreeMap<String, String>,

    #[serde(skip)]
    context_dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        let mut assets = BTreeMap::new();
        assets.insert("StreamingAssets".to_string(), "StreamingAssets".to_string());
        assets.insert("Plugins".to_string(), format!("Plugins/{ARCH_PLACEHOLDER}"));

        Self {
            install_dir: PathBuf::from(DEFAULT_INSTALL_DIR),
            cache_dir: None,
            tools_dir: PathBuf::from(DEFAULT_TOOLS_DIR),
            include_prerelease: false,
            architecture: "x64".to_string(),
            engine_libraries: Vec::new(),
            metadata_timeout_secs: crate::constants::DEFAULT_METADATA_TIMEOUT.as_secs(),
            download_timeout_secs: None,
            framework: FrameworkProfile::default(),
            sources: Vec::new(),
            credential_providers: Vec::new(),
            assets,
            context_dir: PathBuf::from("."),
        }
    }
}

impl ProjectConfig {
    /// Loads `{context_dir}/nupm.toml`, or the defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed, or when a value is out of
    /// range ([`NupmError::ConfigError`]).
    pub fn load(context_dir: &Path) -> Result<Self> {
        let path = context_dir.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<Self>(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.context_dir = context_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Defaults for `context_dir`, ignoring any `nupm.toml`.
    #[must_use]
    pub fn for_context(context_dir: &Path) -> Self {
        Self {
            context_dir: context_dir.to_path_buf(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |message: String| -> Result<()> { Err(NupmError::ConfigError { message }.into()) };

        if self.architecture.trim().is_empty() {
            return invalid("architecture must not be empty".to_string());
        }
        if self.metadata_timeout_secs == 0 {
            return invalid("metadata_timeout_secs must be greater than zero".to_string());
        }
        for (i, source) in self.sources.iter().enumerate() {
            if source.name.trim().is_empty() || source.path.trim().is_empty() {
                return invalid(format!("sources[{i}] needs both a name and a path"));
            }
            if self.sources[..i].iter().any(|s| s.name == source.name) {
                return invalid(format!("source '{}' is defined twice", source.name));
            }
        }
        Ok(())
    }

    /// The context directory this configuration belongs to.
    #[must_use]
    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    /// `{context}/packages.config`.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.context_dir.join(MANIFEST_FILE_NAME)
    }

    /// Absolute install directory.
    #[must_use]
    pub fn install_path(&self) -> PathBuf {
        self.resolve(&self.install_dir)
    }

    /// Absolute tools directory.
    #[must_use]
    pub fn tools_path(&self) -> PathBuf {
        self.resolve(&self.tools_dir)
    }

    /// The archive cache: `NUPM_CACHE_DIR`, then `cache_dir`, then the
    /// platform cache directory, then `.nupm/cache` in the project.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.cache_path_with(std::env::var_os(CACHE_DIR_ENV))
    }

    fn cache_path_with(&self, env_override: Option<OsString>) -> PathBuf {
        if let Some(dir) = env_override.filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        if let Some(dir) = &self.cache_dir {
            return self.resolve(dir);
        }
        dirs::cache_dir().map_or_else(
            || self.context_dir.join(".nupm").join("cache"),
            |dir| dir.join("nupm").join("packages"),
        )
    }

    /// Metadata query timeout.
    #[must_use]
    pub const fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    /// Download timeout, `None` for unbounded.
    #[must_use]
    pub fn download_timeout(&self) -> Option<Duration> {
        self.download_timeout_secs.map(Duration::from_secs)
    }

    /// Configured sources after expansion, or the default feed when none are configured.
    pub fn source_configs(&self) -> Result<Vec<PackageSourceConfig>> {
        if self.sources.is_empty() {
            return Ok(vec![PackageSourceConfig::new(DEFAULT_FEED_NAME, DEFAULT_FEED_URL, None, true)?]);
        }

        self.sources
            .iter()
            .map(|entry| {
                let credentials = match (&entry.username, &entry.password) {
                    (Some(user), password) => {
                        let password = match password {
                            Some(p) => shellexpand::full(p)
                                .map_err(|e| NupmError::ConfigError {
                                    message: format!("source '{}': {e}", entry.name),
                                })?
                                .into_owned(),
                            None => String::new(),
                        };
                        Some(Credentials::new(user.clone(), password))
                    }
                    (None, _) => None,
                };
                PackageSourceConfig::new(&entry.name, &entry.path, credentials, entry.enabled)
            })
            .collect()
    }

    /// Credential provider executables after `~` expansion.
    #[must_use]
    pub fn credential_provider_paths(&self) -> Vec<PathBuf> {
        self.credential_providers
            .iter()
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
            .collect()
    }

    /// Asset folders with absolute destinations.
    #[must_use]
    pub fn asset_mappings(&self) -> Vec<AssetMapping> {
        self.assets
            .iter()
            .map(|(folder, destination)| {
                let destination = destination.replace(ARCH_PLACEHOLDER, &self.architecture);
                AssetMapping::new(folder, self.resolve(Path::new(&destination)))
            })
            .collect()
    }

    /// Whether `file_name` is a library the host already loads.
    #[must_use]
    pub fn is_engine_library(&self, file_name: &str) -> bool {
        self.engine_libraries.iter().any(|l| l.eq_ignore_ascii_case(file_name))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() { path.to_path_buf() } else { self.context_dir.join(path) }
    }
}

//! Global constants used throughout the nupm codebase.
//!
//! This module contains file names, timeouts, retry counts and other
//! values shared by several modules. Defining them centrally keeps the
//! magic numbers discoverable.

use std::time::Duration;

/// File name of the declared-dependencies manifest inside a context directory.
pub const MANIFEST_FILE_NAME: &str = "packages.config";

/// File name of the optional project configuration inside a context directory.
pub const CONFIG_FILE_NAME: &str = "nupm.toml";

/// Default install directory, relative to the context directory.
pub const DEFAULT_INSTALL_DIR: &str = "Packages";

/// Default relocation target for package `tools/` folders, relative to the context directory.
pub const DEFAULT_TOOLS_DIR: &str = ".nupm/tools";

/// Directory holding the project lock file, relative to the context directory.
pub const PROJECT_LOCK_DIR: &str = ".nupm";

/// Environment variable overriding the package cache location.
pub const CACHE_DIR_ENV: &str = "NUPM_CACHE_DIR";

/// Extension of package archives.
pub const ARCHIVE_EXTENSION: &str = "nupkg";

/// Extension of package descriptor files.
pub const DESCRIPTOR_EXTENSION: &str = "nuspec";

/// Install directories starting with this prefix belong to packages linked to a
/// source checkout. Restore never garbage-collects them.
pub const UNLINKED_SOURCE_PREFIX: &str = "~unlinked.";

/// Feed used when no `nupm.toml` declares any source.
pub const DEFAULT_FEED_NAME: &str = "nuget.org";

/// URL of the default feed.
pub const DEFAULT_FEED_URL: &str = "https://www.nuget.org/api/v2/";

/// Number of installed packages sent in a single remote update query.
///
/// Keeps the query string of `GetUpdates()` well below common URL length limits.
pub const UPDATE_BATCH_SIZE: usize = 10;

/// How many times a feed page is fetched again when its body cannot be parsed.
pub const FEED_PARSE_RETRIES: u32 = 3;

/// How many times a failing credential provider is asked again.
pub const CREDENTIAL_PROVIDER_RETRIES: u32 = 2;

/// Default timeout for metadata queries against remote feeds (10 seconds).
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Default lock acquisition timeout for the project lock (30 seconds).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum backoff delay while polling for the project lock (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay while polling for the project lock (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

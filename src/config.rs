//! Configuration types for social-dl
//!
//! The core consumes a single resolved [`Config`]. Loading and merging config files,
//! and parsing command lines, happen before the core runs; the core only validates.

use crate::error::{Error, Result};
use crate::naming;
use crate::types::{Mode, Platform};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What to acquire
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Link to a profile (listing modes) or a single post (`one` mode)
    #[serde(default)]
    pub url: String,

    /// Acquisition mode (default: post)
    #[serde(default)]
    pub mode: Mode,
}

/// Where and how files are written
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output root (default: "Download")
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Group items into per-author subfolders (default: true)
    #[serde(default = "default_true")]
    pub folderize: bool,

    /// File naming template (default: "{create}_{desc}")
    #[serde(default = "default_naming")]
    pub naming: String,

    /// Write a `{name}_desc.txt` sidecar with the post text (default: false)
    #[serde(default)]
    pub write_desc: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            folderize: true,
            naming: default_naming(),
            write_desc: false,
        }
    }
}

/// HTTP proxy pair applied to every request of a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy for plain HTTP requests
    pub http: String,
    /// Proxy for HTTPS requests (usually also an `http://` proxy URL)
    pub https: String,
}

/// Request header overrides
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HeaderConfig {
    /// User agent (platform default when unset)
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Referer (platform default when unset)
    #[serde(default)]
    pub referer: Option<String>,
}

/// Retry backoff configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Network behavior (credentials, timeouts, concurrency, proxies)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Cookie string sent with every API request
    #[serde(default)]
    pub cookie: Option<String>,

    /// Per-request timeout (default: 10 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Retries for transient failures (default: 5)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Ceiling on concurrent HTTP exchanges (default: 5)
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Ceiling on concurrent item pipelines (default: 10)
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,

    /// Proxy pair, applied uniformly when present
    #[serde(default)]
    pub proxies: Option<ProxyConfig>,

    /// Header overrides
    #[serde(default)]
    pub headers: HeaderConfig,

    /// Alternative API origin (mirrors, test servers); platform default when unset
    #[serde(default)]
    pub api_base: Option<String>,

    /// Backoff shape for retries
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cookie: None,
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            max_connections: default_max_connections(),
            max_tasks: default_max_tasks(),
            proxies: None,
            headers: HeaderConfig::default(),
            api_base: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Listing traversal limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Maximum items to process, 0 = unlimited (default: 0)
    #[serde(default)]
    pub max_counts: u64,

    /// Requested page size, clamped to the platform maximum (default: 20)
    #[serde(default = "default_page_counts")]
    pub page_counts: u32,

    /// Continue from the cursor persisted by an interrupted run (default: false)
    #[serde(default)]
    pub resume: bool,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            max_counts: 0,
            page_counts: default_page_counts(),
            resume: false,
        }
    }
}

/// Secret material for request signing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Client device id
    #[serde(default)]
    pub device_id: Option<String>,

    /// Salt mixed into digest-based signatures (built-in default when unset)
    #[serde(default)]
    pub salt: Option<String>,

    /// Signature algorithm version (default: 1)
    #[serde(default = "default_algorithm_version")]
    pub algorithm_version: u32,

    /// Live room id for room-bound signatures
    #[serde(default)]
    pub room_id: Option<String>,

    /// Client-generated unique id for room-bound signatures
    #[serde(default)]
    pub user_unique_id: Option<String>,

    /// Bearer token for platforms that require one (built-in web token when unset)
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            salt: None,
            algorithm_version: default_algorithm_version(),
            room_id: None,
            user_unique_id: None,
            bearer_token: None,
        }
    }
}

/// Local persistence
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Directory holding `{platform}_users.db` (default: the output root)
    #[serde(default)]
    pub database_dir: Option<PathBuf>,
}

/// Resolved configuration for one acquisition run
///
/// Fields are organized into logical sub-configs; most are flattened so the serialized
/// form stays a flat key/value table:
/// - [`target`](TargetConfig): url, mode
/// - [`output`](OutputConfig): path, folderize, naming
/// - [`network`](NetworkConfig): cookie, timeout, retries, concurrency, proxies
/// - [`listing`](ListingConfig): max_counts, page_counts, resume
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Platform to acquire from
    pub platform: Platform,

    /// What to acquire
    #[serde(flatten)]
    pub target: TargetConfig,

    /// Where files go
    #[serde(flatten)]
    pub output: OutputConfig,

    /// Network behavior
    #[serde(flatten)]
    pub network: NetworkConfig,

    /// Listing limits
    #[serde(flatten)]
    pub listing: ListingConfig,

    /// Signing material
    #[serde(default)]
    pub signing: SigningConfig,

    /// Local persistence
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Check the configuration before any network call
    ///
    /// Every problem found here is a caller defect and aborts the run.
    pub fn validate(&self) -> Result<()> {
        if self.target.url.trim().is_empty() {
            return Err(Error::config("url", "a target url is required"));
        }
        url::Url::parse(self.target.url.trim())
            .map_err(|e| Error::config("url", format!("invalid url: {e}")))?;

        if !self.platform.supported_modes().contains(&self.target.mode) {
            return Err(Error::config(
                "mode",
                format!(
                    "mode `{}` is not supported on {}",
                    self.target.mode, self.platform
                ),
            ));
        }

        if self.network.max_tasks == 0 {
            return Err(Error::config("max_tasks", "must be greater than zero"));
        }
        if self.network.max_connections == 0 {
            return Err(Error::config("max_connections", "must be greater than zero"));
        }
        if self.network.timeout.is_zero() {
            return Err(Error::config("timeout", "must be greater than zero"));
        }
        if self.listing.page_counts == 0 {
            return Err(Error::config("page_counts", "must be greater than zero"));
        }
        if self.network.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "must be at least 1.0",
            ));
        }

        let invalid = naming::invalid_segments(&self.output.naming, self.platform);
        if !invalid.is_empty() {
            return Err(Error::config(
                "naming",
                format!(
                    "`{}` in `{}` does not match the naming pattern",
                    invalid.join(""),
                    self.output.naming
                ),
            ));
        }

        if let Some(proxies) = &self.network.proxies {
            for (key, value) in [("proxies.http", &proxies.http), ("proxies.https", &proxies.https)]
            {
                if !value.starts_with("http://") {
                    return Err(Error::config(
                        key,
                        "proxy urls must start with http:// (https proxies usually use the http scheme)",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Effective user agent
    pub fn user_agent(&self) -> &str {
        self.network
            .headers
            .user_agent
            .as_deref()
            .unwrap_or_else(|| self.platform.default_user_agent())
    }

    /// Effective referer
    pub fn referer(&self) -> &str {
        self.network
            .headers
            .referer
            .as_deref()
            .unwrap_or_else(|| self.platform.default_referer())
    }

    /// Flat destination for this platform and mode: `{path}/{platform}/{mode}`
    pub fn output_dir(&self) -> PathBuf {
        self.output
            .path
            .join(self.platform.as_str())
            .join(self.target.mode.as_str())
    }

    /// Location of the per-platform user database
    pub fn database_path(&self) -> PathBuf {
        self.persistence
            .database_dir
            .as_ref()
            .unwrap_or(&self.output.path)
            .join(format!("{}_users.db", self.platform.as_str()))
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("Download")
}

fn default_naming() -> String {
    "{create}_{desc}".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_connections() -> usize {
    5
}

fn default_max_tasks() -> usize {
    10
}

fn default_page_counts() -> u32 {
    20
}

fn default_algorithm_version() -> u32 {
    1
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

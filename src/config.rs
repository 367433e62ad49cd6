use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub display: DisplayDefaults,
    pub data: DataConfig,
}

/// Where the REST API and its schema document live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL prepended to every operation path.
    pub base_url: String,
    /// Location of the OpenAPI schema document.
    pub schema_url: String,
    /// Optional per-request timeout in seconds. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
}

/// Expiry of persisted slices, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub api_ttl_secs: u64,
    pub worlds_ttl_secs: u64,
    /// Shared by items, colors, emojis, metals, skills, skill groups,
    /// recipe groups and recipes.
    pub catalog_ttl_secs: u64,
    /// How often a running context resets expired slices. `0` disables
    /// the sweep.
    pub sweep_interval_secs: u64,
}

/// Defaults handed to every display controller and precondition loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayDefaults {
    pub page_size: usize,
    pub search_debounce_ms: u64,
    pub retry_backoff_ms: u64,
}

/// Data directory configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Override the default data directory.
    pub data_dir: Option<PathBuf>,
}

pub const DEFAULT_API_BASE_URL: &str = "https://api.boundlexx.app";
pub const DEFAULT_SCHEMA_URL: &str =
    "https://api.boundlexx.app/api/v1/schema/?format=openapi-json";
pub const DEFAULT_PAGE_SIZE: usize = 200;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            schema_url: DEFAULT_SCHEMA_URL.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            api_ttl_secs: 12 * HOUR,
            worlds_ttl_secs: HOUR,
            catalog_ttl_secs: 7 * DAY,
            sweep_interval_secs: 5 * 60,
        }
    }
}

impl Default for DisplayDefaults {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce_ms: 500,
            retry_backoff_ms: 3000,
        }
    }
}

impl DisplayDefaults {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl AppConfig {
    /// Load configuration: defaults, then `~/.config/boundlexx/config.toml`,
    /// then `BOUNDLEXX_*` environment variables (`__` separates sections,
    /// e.g. `BOUNDLEXX_API__BASE_URL`).
    ///
    /// Returns `Default` if the merged sources cannot be extracted.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match Self::figment(&config_path).extract() {
            Ok(config) => {
                log::info!("Loaded config (file: {})", config_path.display());
                config
            }
            Err(e) => {
                log::warn!(
                    "Failed to load config from {}: {e} - using defaults",
                    config_path.display()
                );
                Self::default()
            }
        }
    }

    /// The layered provider chain used by [`AppConfig::load`].
    pub fn figment(config_path: &std::path::Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("BOUNDLEXX_").split("__"))
    }

    /// Resolved data directory (override or XDG default).
    pub fn data_dir(&self) -> PathBuf {
        self.data.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("boundlexx"))
                .unwrap_or_else(|| PathBuf::from("data"))
        })
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("boundlexx").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}

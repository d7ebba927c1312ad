use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "tempmail-proxy";

/// Browser user agent the provider's bot heuristics accept
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

/// Top-level configuration for the proxy daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub sessions: SessionConfig,
    pub retry: RetryConfig,
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
            sessions: SessionConfig::default(),
            retry: RetryConfig::default(),
            log_level: Some("info".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Upstream provider endpoints and the header set sent with every request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub homepage_path: String,
    pub inbox_path: String,
    pub lang: String,
    /// Per-request timeout. Unset means the transport default.
    pub timeout_secs: Option<u64>,
    pub headers: BTreeMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tempmail.so".to_string(),
            homepage_path: "/".to_string(),
            inbox_path: "/us/api/inbox".to_string(),
            lang: "us".to_string(),
            timeout_secs: None,
            headers: default_headers(),
        }
    }
}

impl ProviderConfig {
    pub fn homepage_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.homepage_path)
    }

    pub fn inbox_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.inbox_path)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// The exact header set the provider expects from a same-origin fetch.
pub fn default_headers() -> BTreeMap<String, String> {
    [
        ("authority", "tempmail.so"),
        ("accept", "application/json"),
        ("accept-language", "en-US,en;q=0.9"),
        ("content-type", "application/json"),
        ("dnt", "1"),
        ("referer", "https://tempmail.so/"),
        ("sec-fetch-dest", "empty"),
        ("sec-fetch-mode", "cors"),
        ("sec-fetch-site", "same-origin"),
        ("user-agent", DEFAULT_USER_AGENT),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a fetched address is served from cache
    pub window_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { window_secs: 600 }
    }
}

impl CacheConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts for address acquisition, including the first one.
    /// Values outside `1..=2` are clamped.
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_ms: 0,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Loads `~/.config/tempmail-proxy/config.toml`, falling back to defaults
    pub fn load_from_default() -> Result<Self, ConfigError> {
        Self::load_from_file(&get_default_config_file()?)
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir() -> Result<PathBuf, ConfigError> {
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home_dir.join(".config").join(APP_NAME))
}

/// Helper function to get default config file path
pub fn get_default_config_file() -> Result<PathBuf, ConfigError> {
    Ok(get_default_config_dir()?.join("config.toml"))
}

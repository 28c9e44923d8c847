use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::models::{SourceSettings, UserConfig};
use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub regex: RegexConfig,
    #[serde(default)]
    pub proxy_runtime: ProxyRuntimeConfig,
    /// Upstream sources in priority order
    #[serde(default)]
    pub sources: Vec<SourceSettings>,
    /// The validated user pipeline configuration
    #[serde(default)]
    pub profile: UserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public address of this service, used in the manifest
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_addon_id")]
    pub addon_id: String,
    #[serde(default = "default_addon_name")]
    pub addon_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout", with = "duration_serde::duration")]
    pub connect_timeout: Duration,
    /// Per-source timeout when a source does not set its own
    #[serde(default = "default_source_timeout", with = "duration_serde::duration")]
    pub source_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity of each cache before least recently used entries are evicted
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_regex_ttl", with = "duration_serde::duration")]
    pub regex_ttl: Duration,
    #[serde(default = "default_public_ip_ttl", with = "duration_serde::duration")]
    pub public_ip_ttl: Duration,
    #[serde(default = "default_manifest_ttl", with = "duration_serde::duration")]
    pub manifest_ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexConfig {
    /// Evaluation budget per pattern and field
    #[serde(default = "default_regex_timeout", with = "duration_serde::duration")]
    pub timeout: Duration,
    #[serde(default = "default_regex_max_pattern_length")]
    pub max_pattern_length: usize,
    /// Compiled program size limit in bytes
    #[serde(default = "default_regex_size_limit")]
    pub size_limit: usize,
    /// Inputs longer than this are treated as a timeout
    #[serde(default = "default_regex_max_input_length")]
    pub max_input_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRuntimeConfig {
    #[serde(default = "default_public_ip_attempts")]
    pub public_ip_attempts: u32,
    /// Bound on a single discovery call, distinct from the retry loop
    #[serde(default = "default_public_ip_timeout", with = "duration_serde::duration")]
    pub public_ip_timeout: Duration,
    #[serde(default = "default_public_ip_retry_delay", with = "duration_serde::duration")]
    pub retry_delay: Duration,
    #[serde(default = "default_url_generation_timeout", with = "duration_serde::duration")]
    pub generation_timeout: Duration,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_addon_id() -> String {
    DEFAULT_ADDON_ID.to_string()
}

fn default_addon_name() -> String {
    DEFAULT_ADDON_NAME.to_string()
}

// HTTP defaults
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

fn default_source_timeout() -> Duration {
    Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS)
}

// Cache defaults
fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_regex_ttl() -> Duration {
    Duration::from_secs(DEFAULT_REGEX_TTL_SECS)
}

fn default_public_ip_ttl() -> Duration {
    Duration::from_secs(DEFAULT_PUBLIC_IP_TTL_SECS)
}

fn default_manifest_ttl() -> Duration {
    Duration::from_secs(DEFAULT_MANIFEST_TTL_SECS)
}

// Regex defaults
fn default_regex_timeout() -> Duration {
    Duration::from_millis(DEFAULT_REGEX_TIMEOUT_MS)
}

fn default_regex_max_pattern_length() -> usize {
    DEFAULT_REGEX_MAX_PATTERN_LENGTH
}

fn default_regex_size_limit() -> usize {
    DEFAULT_REGEX_SIZE_LIMIT
}

fn default_regex_max_input_length() -> usize {
    DEFAULT_REGEX_MAX_INPUT_LENGTH
}

// Proxy runtime defaults
fn default_public_ip_attempts() -> u32 {
    DEFAULT_PUBLIC_IP_ATTEMPTS
}

fn default_public_ip_timeout() -> Duration {
    Duration::from_secs(DEFAULT_PUBLIC_IP_TIMEOUT_SECS)
}

fn default_public_ip_retry_delay() -> Duration {
    Duration::from_millis(DEFAULT_PUBLIC_IP_RETRY_DELAY_MS)
}

fn default_url_generation_timeout() -> Duration {
    Duration::from_secs(DEFAULT_URL_GENERATION_TIMEOUT_SECS)
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
            addon_id: default_addon_id(),
            addon_name: default_addon_name(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
            source_timeout: default_source_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            regex_ttl: default_regex_ttl(),
            public_ip_ttl: default_public_ip_ttl(),
            manifest_ttl: default_manifest_ttl(),
        }
    }
}

impl Default for RegexConfig {
    fn default() -> Self {
        Self {
            timeout: default_regex_timeout(),
            max_pattern_length: default_regex_max_pattern_length(),
            size_limit: default_regex_size_limit(),
            max_input_length: default_regex_max_input_length(),
        }
    }
}

impl Default for ProxyRuntimeConfig {
    fn default() -> Self {
        Self {
            public_ip_attempts: default_public_ip_attempts(),
            public_ip_timeout: default_public_ip_timeout(),
            retry_delay: default_public_ip_retry_delay(),
            generation_timeout: default_url_generation_timeout(),
        }
    }
}

impl Config {
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.proxy_runtime.public_ip_attempts == 0 {
            anyhow::bail!("proxy_runtime.public_ip_attempts must be at least 1");
        }
        if self.profile.proxy.enabled && self.profile.proxy.url.trim().is_empty() {
            anyhow::bail!("profile.proxy.url is required when the proxy is enabled");
        }
        for source in &self.sources {
            if url::Url::parse(&source.url).is_err() {
                anyhow::bail!("source '{}' has an invalid url: {}", source.name, source.url);
            }
        }
        Ok(())
    }
}

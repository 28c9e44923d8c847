/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 7000;
pub const DEFAULT_BASE_URL: &str = "http://localhost:7000";
pub const DEFAULT_ADDON_ID: &str = "org.stream-aggregator";
pub const DEFAULT_ADDON_NAME: &str = "Stream Aggregator";

// Upstream HTTP defaults
pub const DEFAULT_USER_AGENT: &str = concat!("stream-aggregator/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 15;

// Cache defaults
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;
pub const DEFAULT_REGEX_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_PUBLIC_IP_TTL_SECS: u64 = 15 * 60;
pub const DEFAULT_MANIFEST_TTL_SECS: u64 = 3 * 60 * 60;

// User pattern defaults
pub const DEFAULT_REGEX_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_REGEX_MAX_PATTERN_LENGTH: usize = 1000;
pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 1024 * 1024; // 1MB compiled program
pub const DEFAULT_REGEX_MAX_INPUT_LENGTH: usize = 4096;

// Proxy runtime defaults
pub const DEFAULT_PUBLIC_IP_ATTEMPTS: u32 = 3;
pub const DEFAULT_PUBLIC_IP_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_PUBLIC_IP_RETRY_DELAY_MS: u64 = 250;
pub const DEFAULT_URL_GENERATION_TIMEOUT_SECS: u64 = 10;

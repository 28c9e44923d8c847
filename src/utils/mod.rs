//! Utility modules for the stream aggregator
//!
//! This module contains reusable utilities that can be used
//! across different parts of the system.

pub mod http_client;
pub mod human_format;
pub mod regex_filter;
pub mod retry;
pub mod url;

// Re-export commonly used types for convenience
pub use http_client::StandardHttpClient;
pub use regex_filter::RegexFilterEngine;
pub use url::UrlUtils;

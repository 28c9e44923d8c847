//! Error type definitions for the stream aggregator
//!
//! This module defines all error types used throughout the crate. Only
//! `ProxyError::PublicIpUnavailable` is allowed to fail a whole request; every
//! other error is recovered close to where it happens.

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can surface from the
/// library. It uses `thiserror` to provide automatic error trait
/// implementations and proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Raw stream normalization errors
    #[error("Normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    /// Egress proxy errors
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    /// User supplied pattern errors
    #[error("Regex error: {0}")]
    Regex(#[from] RegexError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors talking to a single upstream source
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The source did not answer within its configured timeout
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Non-2xx response from the source
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Transport level failure (DNS, TLS, connection reset)
    #[error("Network error: {message}")]
    Network { message: String },

    /// The response did not match the expected schema
    #[error("Invalid response from {source_name}: {message}")]
    InvalidResponse { source_name: String, message: String },

    /// Invalid source configuration
    #[error("Invalid configuration: {field} - {message}")]
    InvalidConfig { field: String, message: String },
}

/// Errors mapping one raw upstream entry into a canonical record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    /// No url, info hash, external url or video id was present
    #[error("Stream from {source_name} has no deliverable locator")]
    NoDeliverableLocator { source_name: String },

    /// The entry was structurally invalid
    #[error("Malformed stream from {source_name}: {message}")]
    Malformed { source_name: String, message: String },
}

/// Errors from the egress proxy subsystem
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    /// The public IP could not be resolved after every attempt
    #[error("Unable to resolve public IP of {backend} proxy after {attempts} attempts")]
    PublicIpUnavailable { backend: String, attempts: u32 },

    /// Batch URL generation failed
    #[error("Proxy URL generation failed: {message}")]
    Generation { message: String },

    /// The backend answered with an error or an unexpected payload
    #[error("Proxy backend {backend} error: {message}")]
    Backend { backend: String, message: String },

    /// Invalid proxy settings
    #[error("Invalid proxy configuration: {message}")]
    InvalidConfig { message: String },
}

/// Errors compiling or evaluating user supplied patterns
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    /// Pattern failed to compile or exceeded the compiled size limit
    #[error("Invalid pattern '{pattern}': {message}")]
    Invalid { pattern: String, message: String },

    /// Pattern rejected before compilation
    #[error("Pattern rejected: {message}")]
    Rejected { message: String },

    /// Evaluation exceeded its time budget or input bound
    #[error("Pattern '{pattern}' timed out")]
    Timeout { pattern: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole request
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Proxy(ProxyError::PublicIpUnavailable { .. }))
    }
}

impl SourceError {
    /// Create a timeout error
    pub fn timeout<U: Into<String>>(url: U) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Create an invalid response error
    pub fn invalid_response<S: Into<String>, M: Into<String>>(source_name: S, message: M) -> Self {
        Self::InvalidResponse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ProxyError {
    /// Create a backend error
    pub fn backend<B: Into<String>, M: Into<String>>(backend: B, message: M) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| crate::utils::url::UrlUtils::obfuscate_credentials(u.as_str()))
            .unwrap_or_default();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            }
        } else {
            Self::Network {
                message: crate::utils::url::UrlUtils::obfuscate_credentials(&err.to_string()),
            }
        }
    }
}

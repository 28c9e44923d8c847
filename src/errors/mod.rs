//! Centralized error handling for the stream aggregator
//!
//! # Error Categories
//!
//! - **Source Errors**: one upstream source failed (recovered, reported per source)
//! - **Normalization Errors**: one raw entry could not be mapped (entry dropped)
//! - **Proxy Errors**: public IP discovery (fatal) or URL generation (recovered)
//! - **Regex Errors**: user patterns (timeouts recovered as non-matches)
//!
//! # Usage
//!
//! ```rust
//! use stream_aggregator::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;

/// Convenience type alias for Proxy Results
pub type ProxyResult<T> = Result<T, ProxyError>;

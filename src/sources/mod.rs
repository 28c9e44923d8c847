//! Upstream sources
//!
//! This module fetches stream lists from upstream addons and turns each raw
//! entry into a `CanonicalStream` through a per-source-type strategy:
//!
//! - [`AddonClient`] performs the HTTP calls (manifest and resources)
//! - [`StreamParser`] is the normalisation strategy, selected from [`SourceRegistry`]
//! - [`Aggregator`] fans out over all sources and collects failures

pub mod aggregator;
pub mod client;
pub mod factory;
pub mod normalize;
pub mod strategies;
pub mod traits;

pub use aggregator::{AggregateResult, Aggregator, SourceFailure};
pub use client::AddonClient;
pub use factory::SourceRegistry;
pub use traits::StreamParser;

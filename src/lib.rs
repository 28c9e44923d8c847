//! Federated stream aggregation
//!
//! Fans a stream request out to every configured addon source, normalises
//! the heterogeneous answers into one record shape, applies the user's
//! filter, deduplication, sort and limit policy, optionally routes URLs
//! through an egress proxy and returns the result in the addon wire format.

pub mod cache;
pub mod config;
pub mod errors;
pub mod formatter;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod proxy;
pub mod sources;
pub mod utils;
pub mod web;

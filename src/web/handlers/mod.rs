//! HTTP handlers, grouped by surface

pub mod addon;
pub mod health;

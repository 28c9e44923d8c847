//! Data model shared by every pipeline stage

pub mod addon;
pub mod source;
pub mod stream;
pub mod user_config;

pub use addon::*;
pub use source::*;
pub use stream::*;
pub use user_config::*;

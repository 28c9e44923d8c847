//! Release-name metadata extraction
//!
//! `FileParser` runs the ordered tag tables in `patterns` over a filename and
//! delegates title/year/season/episode to a `TitleParser`.

pub mod file;
pub mod patterns;
pub mod title;

pub use file::FileParser;
pub use title::{DefaultTitleParser, TitleInfo, TitleParser};

/// Collapse whitespace runs to a single space and trim the ends
pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

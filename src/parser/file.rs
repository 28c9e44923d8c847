//! Filename metadata extraction

use std::sync::Arc;

use super::normalize_whitespace;
use super::patterns::{self, AUDIO_CHANNELS, AUDIO_TAGS, ENCODES, LANGUAGES, QUALITIES, RESOLUTIONS, VISUAL_TAGS};
use super::title::{DefaultTitleParser, TitleParser};
use crate::models::ParsedTags;

/// Turns a release filename or description line into structured tags.
/// Never fails: a category without a match is simply left empty.
#[derive(Clone)]
pub struct FileParser {
    title_parser: Arc<dyn TitleParser>,
}

impl FileParser {
    pub fn new(title_parser: Arc<dyn TitleParser>) -> Self {
        Self { title_parser }
    }

    pub fn parse(&self, filename: &str) -> ParsedTags {
        let text = normalize_whitespace(filename);
        let info = self.title_parser.parse(&text);

        ParsedTags {
            resolution: patterns::first_label(&RESOLUTIONS, &text),
            quality: patterns::first_label(&QUALITIES, &text),
            encode: patterns::first_label(&ENCODES, &text),
            visual_tags: patterns::all_labels(&VISUAL_TAGS, &text),
            audio_tags: patterns::all_labels(&AUDIO_TAGS, &text),
            audio_channels: patterns::all_labels(&AUDIO_CHANNELS, &text),
            languages: patterns::all_labels(&LANGUAGES, &text),
            release_group: patterns::release_group(&text),
            title: info.title,
            year: info.year,
            season: info.seasons.first().copied(),
            seasons: info.seasons,
            episode: info.episodes.first().copied(),
        }
    }
}

impl Default for FileParser {
    fn default() -> Self {
        Self::new(Arc::new(DefaultTitleParser))
    }
}

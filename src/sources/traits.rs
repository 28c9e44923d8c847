//! Stream parser strategy trait
//!
//! Each source type is described by a small capability set (which regexes it
//! declares, which unit base its sizes use). The mapping from a raw upstream
//! entry to a `CanonicalStream` is shared and lives in the default
//! `normalize` method, so strategies only override what differs.

use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

use super::normalize::{
    USENET_SERVICE, capture, detect_service, flag_languages, info_hash_from_url, parse_duration,
    parse_size, strip_emoji,
};
use crate::errors::NormalizationError;
use crate::models::{CanonicalStream, Locator, ParsedTags, RawStream, SourceConfig, StreamKind};
use crate::parser::FileParser;

static DEFAULT_SIZE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(KiB|MiB|GiB|TiB|KB|MB|GB|TB)(?:[^a-z]|$)").ok()
});

static DEFAULT_SEEDERS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"👤\s*(\d+)").ok());

static DEFAULT_ACCOUNT_ERRORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)invalid\s+(?:api\s*key|token|credentials)",
        r"(?i)(?:account|subscription)\s+(?:has\s+)?(?:expired|is\s+not\s+premium|required)",
        r"(?i)(?:debrid|premium)\s+(?:key|account)\s+(?:is\s+)?(?:invalid|expired|missing)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// How many description lines the filename heuristic inspects
const HEURISTIC_LINES: usize = 5;

pub trait StreamParser: Send + Sync {
    /// Strategy id, matching `SourceConfig::source_type`
    fn source_type(&self) -> &'static str;

    fn filename_regex(&self) -> Option<&Regex> {
        None
    }

    fn folder_regex(&self) -> Option<&Regex> {
        None
    }

    fn size_regex(&self) -> Option<&Regex> {
        DEFAULT_SIZE.as_ref()
    }

    /// 1024 for binary units, 1000 for decimal
    fn size_base(&self) -> u64 {
        1024
    }

    fn seeders_regex(&self) -> Option<&Regex> {
        DEFAULT_SEEDERS.as_ref()
    }

    fn age_regex(&self) -> Option<&Regex> {
        None
    }

    fn indexer_regex(&self) -> Option<&Regex> {
        None
    }

    /// Marks streams already in the user's library
    fn library_regex(&self) -> Option<&Regex> {
        None
    }

    fn account_error_patterns(&self) -> &[Regex] {
        DEFAULT_ACCOUNT_ERRORS.as_slice()
    }

    fn normalize(
        &self,
        raw: &RawStream,
        source: &SourceConfig,
        extractor: &FileParser,
    ) -> Result<CanonicalStream, NormalizationError> {
        let description = raw.description_text();
        let name = raw.display_name();
        let combined = format!("{name}\n{description}");

        if let Some(message) = self
            .account_error_patterns()
            .iter()
            .find_map(|re| re.find(&combined))
        {
            trace!(source = %source.name, "account error reported by source");
            return Ok(CanonicalStream::error(
                &source.instance_id,
                &source.name,
                &source.source_type,
                format!("[❌] {}", source.name),
                message.as_str(),
            ));
        }

        let hints = raw.hints();

        let filename = hints
            .and_then(|h| h.filename.clone())
            .filter(|f| !f.trim().is_empty())
            .or_else(|| self.filename_regex().and_then(|re| capture(re, description)))
            .or_else(|| heuristic_filename(description, extractor))
            .map(|f| strip_emoji(&f))
            .filter(|f| !f.is_empty());

        let folder_name = self
            .folder_regex()
            .and_then(|re| capture(re, description))
            .map(|f| strip_emoji(&f))
            .filter(|f| !f.is_empty());

        let size = hints
            .and_then(|h| h.video_size)
            .or(raw.size)
            .or_else(|| {
                let re = self.size_regex()?;
                let remainder = match &filename {
                    Some(f) => description.replace(f.as_str(), ""),
                    None => description.to_string(),
                };
                parse_size(re, &remainder, self.size_base())
                    .or_else(|| parse_size(re, name, self.size_base()))
            });

        let service = detect_service(name);
        let (kind, locator) = determine_locator(raw, service.as_ref().map(|s| s.id.as_str()))
            .ok_or_else(|| NormalizationError::NoDeliverableLocator {
                source_name: source.name.clone(),
            })?;

        let mut stream = CanonicalStream::new(
            &source.instance_id,
            &source.name,
            &source.source_type,
            kind,
            locator,
        );

        if kind != StreamKind::P2p {
            stream.service = service;
            stream.torrent_hash = raw
                .url
                .as_deref()
                .and_then(info_hash_from_url);
        }

        stream.tags = extract_tags(extractor, filename.as_deref(), folder_name.as_deref());
        for language in flag_languages(&combined) {
            if !stream.tags.languages.contains(&language) {
                stream.tags.languages.push(language);
            }
        }

        stream.filename = filename;
        stream.folder_name = folder_name;
        stream.size = size;
        stream.folder_size = hints.and_then(|h| h.folder_size);
        stream.duration = parse_duration(description);
        stream.seeders = self
            .seeders_regex()
            .and_then(|re| capture(re, description))
            .and_then(|s| s.parse().ok());
        stream.age = self.age_regex().and_then(|re| capture(re, description));
        stream.indexer = self
            .indexer_regex()
            .and_then(|re| capture(re, description))
            .map(|i| strip_emoji(&i))
            .filter(|i| !i.is_empty());
        stream.in_library = self
            .library_regex()
            .is_some_and(|re| re.is_match(&combined));

        stream.subtitles = raw.subtitles.clone().unwrap_or_default();
        stream.proxy_headers = hints.and_then(|h| h.proxy_headers.clone());
        stream.not_web_ready = hints.and_then(|h| h.not_web_ready).unwrap_or(false);
        stream.video_hash = hints.and_then(|h| h.video_hash.clone());

        Ok(stream)
    }
}

/// Kind and locator in fixed priority order: info hash, HLS playlist,
/// usenet service, other service, plain URL, external URL, video id.
fn determine_locator(raw: &RawStream, service_id: Option<&str>) -> Option<(StreamKind, Locator)> {
    let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

    if let Some(info_hash) = non_empty(&raw.info_hash) {
        return Some((
            StreamKind::P2p,
            Locator::Torrent {
                info_hash: info_hash.to_lowercase(),
                file_idx: raw.file_idx,
                sources: raw.sources.clone().unwrap_or_default(),
            },
        ));
    }

    if let Some(url) = non_empty(&raw.url) {
        let kind = if is_hls(&url) {
            StreamKind::Live
        } else {
            match service_id {
                Some(USENET_SERVICE) => StreamKind::Usenet,
                Some(_) => StreamKind::Debrid,
                None => StreamKind::Http,
            }
        };
        return Some((kind, Locator::Url(url)));
    }

    if let Some(external) = non_empty(&raw.external_url) {
        return Some((StreamKind::External, Locator::External(external)));
    }

    non_empty(&raw.yt_id).map(|id| (StreamKind::Youtube, Locator::YouTube(id)))
}

fn is_hls(url: &str) -> bool {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase(),
    };
    path.ends_with(".m3u8")
}

/// First of the leading description lines that looks like a release name
fn heuristic_filename(description: &str, extractor: &FileParser) -> Option<String> {
    let lines: Vec<&str> = description
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(HEURISTIC_LINES)
        .collect();

    lines
        .iter()
        .find(|line| {
            let tags = extractor.parse(&strip_emoji(line));
            tags.year.is_some() || tags.episode.is_some()
        })
        .or(lines.first())
        .map(|line| line.to_string())
}

/// Tags from the filename, with gaps filled from the folder name
fn extract_tags(extractor: &FileParser, filename: Option<&str>, folder: Option<&str>) -> ParsedTags {
    let mut tags = filename.map(|f| extractor.parse(f)).unwrap_or_default();
    let Some(folder) = folder else {
        return tags;
    };

    let folder_tags = extractor.parse(folder);
    tags.resolution = tags.resolution.or(folder_tags.resolution);
    tags.quality = tags.quality.or(folder_tags.quality);
    tags.encode = tags.encode.or(folder_tags.encode);
    tags.release_group = tags.release_group.or(folder_tags.release_group);
    tags.year = tags.year.or(folder_tags.year);
    if tags.visual_tags.is_empty() {
        tags.visual_tags = folder_tags.visual_tags;
    }
    if tags.audio_tags.is_empty() {
        tags.audio_tags = folder_tags.audio_tags;
    }
    if tags.audio_channels.is_empty() {
        tags.audio_channels = folder_tags.audio_channels;
    }
    if tags.languages.is_empty() {
        tags.languages = folder_tags.languages;
    }
    if tags.seasons.is_empty() {
        tags.seasons = folder_tags.seasons;
        tags.season = folder_tags.season;
    }
    if tags.title.is_none() {
        tags.title = folder_tags.title;
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawBehaviorHints, SourceSettings};
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct Plain;

    impl StreamParser for Plain {
        fn source_type(&self) -> &'static str {
            "generic"
        }
    }

    fn source() -> SourceConfig {
        SourceConfig::from_settings(
            &SourceSettings {
                source_type: "generic".into(),
                name: "Example".into(),
                url: "https://addon.example".into(),
                timeout: None,
                headers: BTreeMap::new(),
                resources: None,
                types: None,
                id_prefixes: None,
                enabled: true,
            },
            Duration::from_secs(5),
        )
    }

    fn normalize(raw: RawStream) -> Result<CanonicalStream, NormalizationError> {
        Plain.normalize(&raw, &source(), &FileParser::default())
    }

    #[test]
    fn test_kind_priority() {
        let p2p = normalize(RawStream {
            info_hash: Some("ABCDEF0123456789ABCDEF0123456789ABCDEF01".into()),
            url: Some("https://x/video.mkv".into()),
            name: Some("[RD+] Example".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(p2p.kind, StreamKind::P2p);
        assert_eq!(p2p.info_hash(), Some("abcdef0123456789abcdef0123456789abcdef01"));
        assert!(p2p.service.is_none());

        let live = normalize(RawStream {
            url: Some("https://x/live/index.m3u8?token=1".into()),
            name: Some("[RD+] Example".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(live.kind, StreamKind::Live);

        let usenet = normalize(RawStream {
            url: Some("https://x/nzb/file.mkv".into()),
            name: Some("[EN] Example".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(usenet.kind, StreamKind::Usenet);

        let debrid = normalize(RawStream {
            url: Some("https://x/file.mkv".into()),
            name: Some("[TB⚡] Example".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(debrid.kind, StreamKind::Debrid);
        assert_eq!(debrid.is_cached(), Some(true));

        let http = normalize(RawStream {
            url: Some("https://x/file.mkv".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(http.kind, StreamKind::Http);

        let external = normalize(RawStream {
            external_url: Some("https://x/watch".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(external.kind, StreamKind::External);

        let youtube = normalize(RawStream {
            yt_id: Some("dQw4w9WgXcQ".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(youtube.kind, StreamKind::Youtube);

        for stream in [p2p, live, usenet, debrid, http, external, youtube] {
            assert!(stream.is_consistent());
        }
    }

    #[test]
    fn test_entry_without_locator_is_rejected() {
        let result = normalize(RawStream {
            name: Some("Example".into()),
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(NormalizationError::NoDeliverableLocator { .. })
        ));
    }

    #[test]
    fn test_account_error_short_circuits() {
        let stream = normalize(RawStream {
            url: Some("https://x/error.mp4".into()),
            description: Some("Invalid API key, check your configuration".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(stream.is_error());
        assert!(stream.is_consistent());
    }

    #[test]
    fn test_filename_hint_wins_and_size_falls_back_to_description() {
        let stream = normalize(RawStream {
            url: Some("https://x/file.mkv".into()),
            description: Some("Movie 2023\n💾 2.5 GB 👤 14".into()),
            behavior_hints: Some(RawBehaviorHints {
                filename: Some("Movie.2023.1080p.BluRay.x264-GRP.mkv".into()),
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(stream.filename.as_deref(), Some("Movie.2023.1080p.BluRay.x264-GRP.mkv"));
        assert_eq!(stream.size, Some(2_684_354_560));
        assert_eq!(stream.seeders, Some(14));
        assert_eq!(stream.tags.resolution.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_heuristic_filename_prefers_release_like_line() {
        let stream = normalize(RawStream {
            url: Some("https://x/file.mkv".into()),
            description: Some("Some Pack Title\n📄 Show.S01E02.720p.WEB.mkv\n💾 700 MB".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(stream.filename.as_deref(), Some("Show.S01E02.720p.WEB.mkv"));
        assert_eq!(stream.tags.episode, Some(2));
    }

    #[test]
    fn test_flag_languages_are_merged() {
        let stream = normalize(RawStream {
            url: Some("https://x/file.mkv".into()),
            description: Some("Movie.2023.1080p.ENG.mkv\n🇬🇧 / 🇫🇷".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(stream.tags.languages, vec!["English", "French"]);
    }

    #[test]
    fn test_torrent_hash_is_kept_for_debrid_urls() {
        let stream = normalize(RawStream {
            url: Some(
                "https://x/resolve/realdebrid/key/0123456789abcdef0123456789abcdef01234567/0".into(),
            ),
            name: Some("[RD+] Example".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(stream.kind, StreamKind::Debrid);
        assert_eq!(
            stream.info_hash(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
    }
}

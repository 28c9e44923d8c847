//! The canonical stream record and its parts

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::addon::{ProxyHeaders, Subtitle};

/// Sentinel used wherever an absent value takes part in a filter or a sort
pub const UNKNOWN: &str = "Unknown";

/// How a stream is delivered
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StreamKind {
    P2p,
    Usenet,
    Debrid,
    Http,
    Live,
    External,
    Youtube,
    Error,
}

/// Where the client fetches the stream from. Exactly one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Locator {
    Url(String),
    Torrent {
        info_hash: String,
        file_idx: Option<u32>,
        sources: Vec<String>,
    },
    External(String),
    YouTube(String),
}

impl Locator {
    /// Whether this locator variant is the one `kind` requires
    pub fn matches_kind(&self, kind: StreamKind) -> bool {
        match self {
            Locator::Url(_) => matches!(
                kind,
                StreamKind::Usenet | StreamKind::Debrid | StreamKind::Http | StreamKind::Live
            ),
            Locator::Torrent { .. } => kind == StreamKind::P2p,
            Locator::External(_) => kind == StreamKind::External,
            Locator::YouTube(_) => kind == StreamKind::Youtube,
        }
    }
}

/// The debrid or usenet account backing a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: String,
    pub cached: bool,
}

/// Structured tags extracted from a filename
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTags {
    pub resolution: Option<String>,
    pub quality: Option<String>,
    pub encode: Option<String>,
    pub visual_tags: Vec<String>,
    pub audio_tags: Vec<String>,
    pub audio_channels: Vec<String>,
    pub languages: Vec<String>,
    pub release_group: Option<String>,
    pub title: Option<String>,
    pub year: Option<u32>,
    pub season: Option<u32>,
    pub seasons: Vec<u32>,
    pub episode: Option<u32>,
}

impl ParsedTags {
    /// Padded season/episode labels for display, e.g. `["S08-S10", "E04"]`
    pub fn season_episode_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        match (self.seasons.first(), self.seasons.last()) {
            (Some(first), Some(last)) if first != last => {
                labels.push(format!("S{first:02}-S{last:02}"));
            }
            (Some(only), _) => labels.push(format!("S{only:02}")),
            _ => {
                if let Some(season) = self.season {
                    labels.push(format!("S{season:02}"));
                }
            }
        }
        if let Some(episode) = self.episode {
            labels.push(format!("E{episode:02}"));
        }
        labels
    }

    /// Languages with the empty set mapped to the `Unknown` sentinel
    pub fn languages_or_unknown(&self) -> Vec<&str> {
        if self.languages.is_empty() {
            vec![UNKNOWN]
        } else {
            self.languages.iter().map(String::as_str).collect()
        }
    }
}

/// Which user ranking pattern matched a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankMatch {
    pub name: String,
    pub pattern_index: usize,
}

/// Payload of an error record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamErrorInfo {
    pub title: String,
    pub description: String,
}

/// The central record, created once per upstream result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalStream {
    /// Instance id of the originating source (type id plus option digest)
    pub source_id: String,
    pub source_name: String,
    /// Strategy id of the originating source, e.g. `torrentio`
    pub source_type: String,
    pub kind: StreamKind,
    pub locator: Option<Locator>,
    pub service: Option<ServiceInfo>,
    /// Torrent hash known from provenance even when the locator is a URL
    pub torrent_hash: Option<String>,
    pub filename: Option<String>,
    pub folder_name: Option<String>,
    pub size: Option<u64>,
    pub folder_size: Option<u64>,
    pub seeders: Option<u32>,
    pub age: Option<String>,
    pub indexer: Option<String>,
    /// Milliseconds, zero when unknown
    pub duration: u64,
    pub in_library: bool,
    pub personal: bool,
    pub tags: ParsedTags,
    pub rank_match: Option<RankMatch>,
    pub proxied: bool,
    pub error: Option<StreamErrorInfo>,
    pub subtitles: Vec<Subtitle>,
    pub proxy_headers: Option<ProxyHeaders>,
    pub not_web_ready: bool,
    pub video_hash: Option<String>,
}

impl CanonicalStream {
    /// Build a delivery record with every optional field unset
    pub fn new(
        source_id: impl Into<String>,
        source_name: impl Into<String>,
        source_type: impl Into<String>,
        kind: StreamKind,
        locator: Locator,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_name: source_name.into(),
            source_type: source_type.into(),
            kind,
            locator: Some(locator),
            service: None,
            torrent_hash: None,
            filename: None,
            folder_name: None,
            size: None,
            folder_size: None,
            seeders: None,
            age: None,
            indexer: None,
            duration: 0,
            in_library: false,
            personal: false,
            tags: ParsedTags::default(),
            rank_match: None,
            proxied: false,
            error: None,
            subtitles: Vec::new(),
            proxy_headers: None,
            not_web_ready: false,
            video_hash: None,
        }
    }

    /// Build an error record; it carries no locator and no delivery fields
    pub fn error(
        source_id: impl Into<String>,
        source_name: impl Into<String>,
        source_type: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let mut stream = Self::new(
            source_id,
            source_name,
            source_type,
            StreamKind::Error,
            Locator::Url(String::new()),
        );
        stream.locator = None;
        stream.error = Some(StreamErrorInfo {
            title: title.into(),
            description: description.into(),
        });
        stream
    }

    pub fn is_error(&self) -> bool {
        self.kind == StreamKind::Error
    }

    /// Direct URL for URL-backed kinds
    pub fn url(&self) -> Option<&str> {
        match &self.locator {
            Some(Locator::Url(url)) => Some(url),
            _ => None,
        }
    }

    /// Torrent hash from the locator, or from provenance for URL streams
    pub fn info_hash(&self) -> Option<&str> {
        match &self.locator {
            Some(Locator::Torrent { info_hash, .. }) => Some(info_hash),
            _ => self.torrent_hash.as_deref(),
        }
    }

    pub fn is_cached(&self) -> Option<bool> {
        self.service.as_ref().map(|service| service.cached)
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service.as_ref().map(|service| service.id.as_str())
    }

    /// Kind/locator invariant: error records have no locator, others have
    /// exactly the variant their kind calls for.
    pub fn is_consistent(&self) -> bool {
        match (&self.locator, self.kind) {
            (None, StreamKind::Error) => self.error.is_some(),
            (Some(locator), kind) => kind != StreamKind::Error && locator.matches_kind(kind),
            (None, _) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_episode_labels() {
        let tags = ParsedTags {
            seasons: vec![8, 9, 10],
            season: Some(8),
            episode: Some(4),
            ..Default::default()
        };
        assert_eq!(tags.season_episode_labels(), vec!["S08-S10", "E04"]);

        let single = ParsedTags {
            seasons: vec![8],
            season: Some(8),
            ..Default::default()
        };
        assert_eq!(single.season_episode_labels(), vec!["S08"]);

        let episode_only = ParsedTags {
            episode: Some(12),
            ..Default::default()
        };
        assert_eq!(episode_only.season_episode_labels(), vec!["E12"]);
    }

    #[test]
    fn test_empty_languages_map_to_unknown() {
        let tags = ParsedTags::default();
        assert_eq!(tags.languages_or_unknown(), vec![UNKNOWN]);
    }

    #[test]
    fn test_error_record_is_consistent() {
        let stream = CanonicalStream::error("src", "Source", "generic", "Failed", "timeout");
        assert!(stream.is_error());
        assert!(stream.locator.is_none());
        assert!(stream.is_consistent());
    }

    #[test]
    fn test_locator_must_match_kind() {
        let stream = CanonicalStream::new(
            "src",
            "Source",
            "generic",
            StreamKind::P2p,
            Locator::Url("http://x".into()),
        );
        assert!(!stream.is_consistent());
    }

    #[test]
    fn test_kind_string_round_trip() {
        assert_eq!(StreamKind::Debrid.to_string(), "debrid");
        assert_eq!("usenet".parse::<StreamKind>().ok(), Some(StreamKind::Usenet));
    }
}

//! User pipeline configuration
//!
//! Filters are explicit allow/deny sets per category, sorting is an ordered
//! list of `(criterion, direction)` pairs, and every priority list is ordered
//! best first. Validation of these values happens before they reach the
//! pipeline; the engines only fall back to neutral behaviour on odd input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumString};

use super::addon::ResourceRequest;
use super::stream::StreamKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Service ids in priority order, best first
    pub services: Vec<String>,
    pub preferences: PreferenceLists,
    pub filters: FilterConfig,
    pub sort: SortConfig,
    /// Named patterns for the `regex_sort` criterion, best first
    pub ranked_patterns: Vec<NamedPattern>,
    pub deduplication: DedupConfig,
    pub limits: ResultLimits,
    pub proxy: ProxySettings,
    /// Render per-source failures as error streams
    pub show_errors: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            services: vec![
                "realdebrid".to_string(),
                "torbox".to_string(),
                "alldebrid".to_string(),
                "premiumize".to_string(),
                "debridlink".to_string(),
                "easydebrid".to_string(),
                "offcloud".to_string(),
                "putio".to_string(),
                "pikpak".to_string(),
                "seedr".to_string(),
                "easynews".to_string(),
            ],
            preferences: PreferenceLists::default(),
            filters: FilterConfig::default(),
            sort: SortConfig::default(),
            ranked_patterns: Vec::new(),
            deduplication: DedupConfig::default(),
            limits: ResultLimits::default(),
            proxy: ProxySettings::default(),
            show_errors: true,
        }
    }
}

/// Priority lists consulted by the sort engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceLists {
    pub resolutions: Vec<String>,
    pub qualities: Vec<String>,
    pub encodes: Vec<String>,
    pub visual_tags: Vec<String>,
    pub audio_tags: Vec<String>,
    pub stream_types: Vec<StreamKind>,
    /// Prioritised languages, best first
    pub languages: Vec<String>,
    /// A single language that outranks everything else when set
    pub prioritised_language: Option<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for PreferenceLists {
    fn default() -> Self {
        Self {
            resolutions: strings(&[
                "2160p", "1440p", "1080p", "720p", "576p", "480p", "360p", "240p", "144p",
                "Unknown",
            ]),
            qualities: strings(&[
                "BluRay REMUX",
                "BluRay",
                "WEB-DL",
                "WEBRip",
                "HDRip",
                "HC HD-Rip",
                "DVDRip",
                "HDTV",
                "CAM",
                "TS",
                "TC",
                "SCR",
                "Unknown",
            ]),
            encodes: strings(&["AV1", "HEVC", "AVC", "XviD", "DivX", "H-OU", "H-SBS", "Unknown"]),
            visual_tags: strings(&[
                "HDR+DV", "HDR10+", "DV", "HDR10", "HDR", "10bit", "3D", "IMAX", "AI", "SDR",
                "Unknown",
            ]),
            audio_tags: strings(&[
                "Atmos", "DD+", "DD", "DTS:X", "DTS-HD MA", "DTS-HD", "DTS-ES", "DTS", "TrueHD",
                "OPUS", "FLAC", "AAC", "Unknown",
            ]),
            stream_types: vec![
                StreamKind::Usenet,
                StreamKind::Debrid,
                StreamKind::Live,
                StreamKind::P2p,
                StreamKind::Http,
                StreamKind::External,
                StreamKind::Youtube,
            ],
            languages: Vec::new(),
            prioritised_language: None,
        }
    }
}

/// Deny and allow sets for a single-valued category. A record's absent value
/// is checked as the `Unknown` sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryFilter {
    pub excluded: Vec<String>,
    /// When non-empty, only these values pass
    pub required: Vec<String>,
}

impl CategoryFilter {
    pub fn is_active(&self) -> bool {
        !self.excluded.is_empty() || !self.required.is_empty()
    }

    pub fn permits(&self, value: &str) -> bool {
        if self.excluded.iter().any(|v| v == value) {
            return false;
        }
        self.required.is_empty() || self.required.iter().any(|v| v == value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl SizeRange {
    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn contains(&self, size: u64) -> bool {
        self.min.is_none_or(|min| size >= min) && self.max.is_none_or(|max| size <= max)
    }
}

/// Global size bounds with optional per content-type overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeFilter {
    pub global: SizeRange,
    pub movies: Option<SizeRange>,
    pub series: Option<SizeRange>,
}

impl SizeFilter {
    pub fn range_for(&self, request: &ResourceRequest) -> SizeRange {
        let specific = if request.is_series() {
            self.series
        } else if request.is_movie() {
            self.movies
        } else {
            None
        };
        specific.unwrap_or(self.global)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub resolutions: CategoryFilter,
    pub qualities: CategoryFilter,
    pub encodes: CategoryFilter,
    pub stream_types: CategoryFilter,
    /// Visual tag states. HDR variants, `DV` and the `HDR+DV` pair pass only
    /// when explicitly `true`; every other tag fails only when `false`.
    pub visual_tags: BTreeMap<String, bool>,
    /// Audio tag states; a tag fails only when explicitly `false`
    pub audio_tags: BTreeMap<String, bool>,
    pub excluded_languages: Vec<String>,
    pub size: SizeFilter,
    pub exclude_cached: bool,
    pub exclude_uncached: bool,
    /// A record matching any of these on filename, folder or indexer is dropped
    pub exclude_patterns: Vec<String>,
    /// When set, a record must match at least one of these on some field
    pub require_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let visual_tags = ["HDR+DV", "HDR10+", "HDR10", "HDR", "DV"]
            .iter()
            .map(|tag| (tag.to_string(), true))
            .collect();
        Self {
            resolutions: CategoryFilter::default(),
            qualities: CategoryFilter::default(),
            encodes: CategoryFilter::default(),
            stream_types: CategoryFilter::default(),
            visual_tags,
            audio_tags: BTreeMap::new(),
            excluded_languages: Vec::new(),
            size: SizeFilter::default(),
            exclude_cached: false,
            exclude_uncached: false,
            exclude_patterns: Vec::new(),
            require_patterns: Vec::new(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortCriterion {
    Resolution,
    Quality,
    Encode,
    StreamType,
    Source,
    Service,
    VisualTag,
    AudioTag,
    Language,
    Cached,
    Size,
    Seeders,
    Library,
    Personal,
    RegexSort,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Asc,
    /// Preferred or larger values first
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub criterion: SortCriterion,
    #[serde(default)]
    pub direction: Direction,
}

impl SortSpec {
    pub fn new(criterion: SortCriterion, direction: Direction) -> Self {
        Self {
            criterion,
            direction,
        }
    }
}

/// Global sort order with optional per content-type overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    pub global: Vec<SortSpec>,
    pub movies: Option<Vec<SortSpec>>,
    pub series: Option<Vec<SortSpec>>,
}

impl Default for SortConfig {
    fn default() -> Self {
        use SortCriterion::*;
        Self {
            global: [
                Cached, Resolution, Quality, VisualTag, AudioTag, Language, Size, Seeders,
            ]
            .into_iter()
            .map(|criterion| SortSpec::new(criterion, Direction::Desc))
            .collect(),
            movies: None,
            series: None,
        }
    }
}

impl SortConfig {
    pub fn criteria_for(&self, request: &ResourceRequest) -> &[SortSpec] {
        let specific = if request.is_series() {
            self.series.as_deref()
        } else if request.is_movie() {
            self.movies.as_deref()
        } else {
            None
        };
        specific.unwrap_or(&self.global)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPattern {
    pub name: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DedupMode {
    /// Best no-provider record, best cached record, best uncached record per service
    #[default]
    Union,
    SingleResult,
    PerService,
    PerAddon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DedupKey {
    Filename,
    InfoHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub enabled: bool,
    pub mode: DedupMode,
    /// Passes run in this order, each over the previous pass's survivors
    pub keys: Vec<DedupKey>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: DedupMode::Union,
            keys: vec![DedupKey::Filename, DedupKey::InfoHash],
        }
    }
}

/// Caps applied after sorting, in sorted order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultLimits {
    pub global: Option<usize>,
    pub per_resolution: Option<usize>,
    pub per_service: Option<usize>,
    pub per_source: Option<usize>,
    pub per_indexer: Option<usize>,
}

impl ResultLimits {
    pub fn is_active(&self) -> bool {
        self.global.is_some()
            || self.per_resolution.is_some()
            || self.per_service.is_some()
            || self.per_source.is_some()
            || self.per_indexer.is_some()
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProxyBackendKind {
    #[default]
    Mediaflow,
    Stremthru,
}

/// How backend credentials travel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    #[default]
    Header,
    Query,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub enabled: bool,
    pub backend: ProxyBackendKind,
    /// Base URL of the proxy service
    pub url: String,
    pub credentials: Option<String>,
    pub credential_mode: CredentialMode,
    /// Skip discovery and use this egress IP
    pub public_ip: Option<String>,
    /// Source ids or source types to proxy; `None` proxies every source
    pub proxied_sources: Option<Vec<String>>,
    /// Service ids to proxy (`none` for no-provider records); `None` proxies all
    pub proxied_services: Option<Vec<String>>,
    /// Rewrite scheme/host/port of generated URLs, e.g. `https://public.example:443`
    pub public_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_filter_semantics() {
        let filter = CategoryFilter {
            excluded: vec!["CAM".into()],
            required: vec![],
        };
        assert!(!filter.permits("CAM"));
        assert!(filter.permits("BluRay"));

        let required = CategoryFilter {
            excluded: vec![],
            required: vec!["2160p".into(), "1080p".into()],
        };
        assert!(required.permits("1080p"));
        assert!(!required.permits("720p"));
    }

    #[test]
    fn test_size_range_bounds_are_inclusive() {
        let range = SizeRange {
            min: Some(10),
            max: Some(20),
        };
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(21));
        assert!(SizeRange::default().contains(u64::MAX));
    }

    #[test]
    fn test_content_type_overrides() {
        let sort = SortConfig {
            series: Some(vec![SortSpec::new(SortCriterion::Size, Direction::Asc)]),
            ..Default::default()
        };
        let series = ResourceRequest::stream("series", "tt1:1:1");
        let movie = ResourceRequest::stream("movie", "tt1");
        assert_eq!(sort.criteria_for(&series).len(), 1);
        assert_eq!(sort.criteria_for(&movie), sort.global.as_slice());

        let size = SizeFilter {
            global: SizeRange { min: Some(1), max: None },
            movies: Some(SizeRange { min: Some(5), max: None }),
            series: None,
        };
        assert_eq!(size.range_for(&movie).min, Some(5));
        assert_eq!(size.range_for(&series).min, Some(1));
    }

    #[test]
    fn test_sort_spec_deserializes_with_default_direction() {
        let spec: SortSpec = toml::from_str(r#"criterion = "visual_tag""#).unwrap();
        assert_eq!(spec.criterion, SortCriterion::VisualTag);
        assert_eq!(spec.direction, Direction::Desc);
    }
}

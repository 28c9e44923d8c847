//! Record filtering
//!
//! A record survives only if every enabled predicate accepts it. Predicates
//! only select; records are never modified here. Each rejection is counted
//! under the name of the predicate that caused it.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::models::{
    CanonicalStream, CategoryFilter, FilterConfig, ResourceRequest, SizeRange, UNKNOWN,
};
use crate::utils::RegexFilterEngine;

/// Label of the combined HDR and Dolby Vision state in the visual tag map
pub const HDR_DV: &str = "HDR+DV";
const DV: &str = "DV";

pub(crate) fn is_hdr(tag: &str) -> bool {
    tag.starts_with("HDR")
}

/// Rejections per predicate for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub examined: usize,
    pub rejected: BTreeMap<&'static str, usize>,
}

impl FilterStats {
    fn reject(&mut self, reason: &'static str) {
        *self.rejected.entry(reason).or_insert(0) += 1;
    }

    pub fn rejected_by(&self, reason: &str) -> usize {
        self.rejected.get(reason).copied().unwrap_or(0)
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.values().sum()
    }
}

pub struct FilterEngine<'a> {
    config: &'a FilterConfig,
    regex: &'a RegexFilterEngine,
    size_range: SizeRange,
}

impl<'a> FilterEngine<'a> {
    pub fn new(
        config: &'a FilterConfig,
        regex: &'a RegexFilterEngine,
        request: &ResourceRequest,
    ) -> Self {
        Self {
            config,
            regex,
            size_range: config.size.range_for(request),
        }
    }

    /// Keep the records every predicate accepts, in their original order.
    /// Error records are informational and always pass.
    pub fn apply(&self, records: Vec<CanonicalStream>) -> (Vec<CanonicalStream>, FilterStats) {
        let mut stats = FilterStats {
            examined: records.len(),
            ..Default::default()
        };

        let kept: Vec<CanonicalStream> = records
            .into_iter()
            .filter(|record| match self.rejection(record) {
                Some(reason) => {
                    debug!(
                        source = %record.source_name,
                        filename = record.filename.as_deref().unwrap_or(UNKNOWN),
                        "Filtered out by {}", reason
                    );
                    stats.reject(reason);
                    false
                }
                None => true,
            })
            .collect();

        info!(
            examined = stats.examined,
            kept = kept.len(),
            rejected = ?stats.rejected,
            "Filter stage complete"
        );
        (kept, stats)
    }

    /// Name of the first predicate that rejects `record`, if any
    pub fn rejection(&self, record: &CanonicalStream) -> Option<&'static str> {
        if record.is_error() {
            return None;
        }

        let tags = &record.tags;
        if !category_permits(&self.config.resolutions, tags.resolution.as_deref()) {
            return Some("resolution");
        }
        if !category_permits(&self.config.qualities, tags.quality.as_deref()) {
            return Some("quality");
        }
        if !category_permits(&self.config.encodes, tags.encode.as_deref()) {
            return Some("encode");
        }
        if !category_permits(&self.config.stream_types, Some(record.kind.as_ref())) {
            return Some("stream_type");
        }
        if !self.visual_tags_permitted(&tags.visual_tags) {
            return Some("visual_tag");
        }
        if tags
            .audio_tags
            .iter()
            .any(|tag| self.config.audio_tags.get(tag) == Some(&false))
        {
            return Some("audio_tag");
        }
        if !self.languages_permitted(record) {
            return Some("language");
        }
        if self.size_range.is_active()
            && record.size.is_some_and(|size| !self.size_range.contains(size))
        {
            return Some("size");
        }
        match record.is_cached() {
            Some(true) if self.config.exclude_cached => return Some("cached"),
            Some(false) if self.config.exclude_uncached => return Some("uncached"),
            _ => {}
        }

        let fields: Vec<&str> = [
            record.filename.as_deref(),
            record.folder_name.as_deref(),
            record.indexer.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if !self.config.exclude_patterns.is_empty()
            && self.regex.any_match(&self.config.exclude_patterns, &fields)
        {
            return Some("exclude_pattern");
        }
        if !self.config.require_patterns.is_empty()
            && !self.regex.any_match(&self.config.require_patterns, &fields)
        {
            return Some("require_pattern");
        }

        None
    }

    /// HDR variants together with DV need the combined state. Otherwise HDR
    /// variants and DV need an explicit allow, and other tags fail only on an
    /// explicit deny.
    fn visual_tags_permitted(&self, tags: &[String]) -> bool {
        let states = &self.config.visual_tags;
        if tags.is_empty() {
            return states.get(UNKNOWN) != Some(&false);
        }

        let has_dv = tags.iter().any(|tag| tag == DV);
        let has_hdr = tags.iter().any(|tag| is_hdr(tag));
        if has_dv && has_hdr {
            return states.get(HDR_DV) == Some(&true);
        }

        tags.iter().all(|tag| {
            if tag == DV || is_hdr(tag) {
                states.get(tag) == Some(&true)
            } else {
                states.get(tag) != Some(&false)
            }
        })
    }

    /// Rejected only when every language is excluded; no languages reads as `Unknown`
    fn languages_permitted(&self, record: &CanonicalStream) -> bool {
        let excluded = &self.config.excluded_languages;
        if excluded.is_empty() {
            return true;
        }
        !record
            .tags
            .languages_or_unknown()
            .iter()
            .all(|language| excluded.iter().any(|e| e == language))
    }
}

fn category_permits(filter: &CategoryFilter, value: Option<&str>) -> bool {
    !filter.is_active() || filter.permits(value.unwrap_or(UNKNOWN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::config::RegexConfig;
    use crate::models::{Locator, ServiceInfo, SizeFilter, StreamKind};
    use std::sync::Arc;
    use std::time::Duration;

    fn regex_engine() -> RegexFilterEngine {
        RegexFilterEngine::new(
            Arc::new(TtlCache::new("regex", 64, Duration::from_secs(60))),
            RegexConfig::default(),
        )
    }

    fn record(filename: &str) -> CanonicalStream {
        let mut stream = CanonicalStream::new(
            "src-1",
            "Source",
            "generic",
            StreamKind::Http,
            Locator::Url(format!("https://cdn.example/{filename}")),
        );
        stream.filename = Some(filename.to_string());
        stream
    }

    fn with_languages(languages: &[&str]) -> CanonicalStream {
        let mut stream = record("Movie.2023.mkv");
        stream.tags.languages = languages.iter().map(|l| l.to_string()).collect();
        stream
    }

    fn with_visual(tags: &[&str]) -> CanonicalStream {
        let mut stream = record("Movie.2023.mkv");
        stream.tags.visual_tags = tags.iter().map(|t| t.to_string()).collect();
        stream
    }

    fn filter(config: &FilterConfig, records: Vec<CanonicalStream>) -> Vec<CanonicalStream> {
        let regex = regex_engine();
        let engine = FilterEngine::new(config, &regex, &ResourceRequest::stream("movie", "tt1"));
        engine.apply(records).0
    }

    #[test]
    fn test_unknown_language_exclusion() {
        let config = FilterConfig {
            excluded_languages: vec![UNKNOWN.to_string()],
            ..Default::default()
        };
        assert!(filter(&config, vec![with_languages(&[])]).is_empty());
        assert_eq!(filter(&config, vec![with_languages(&["English"])]).len(), 1);

        let other = FilterConfig {
            excluded_languages: vec!["French".to_string()],
            ..Default::default()
        };
        assert_eq!(filter(&other, vec![with_languages(&[])]).len(), 1);
    }

    #[test]
    fn test_language_rejected_only_when_all_excluded() {
        let config = FilterConfig {
            excluded_languages: vec!["French".to_string(), "German".to_string()],
            ..Default::default()
        };
        assert!(filter(&config, vec![with_languages(&["French", "German"])]).is_empty());
        assert_eq!(filter(&config, vec![with_languages(&["French", "English"])]).len(), 1);
    }

    #[test]
    fn test_hdr_dv_combination_needs_combined_state() {
        let mut config = FilterConfig::default();
        assert_eq!(filter(&config, vec![with_visual(&["HDR10", "DV"])]).len(), 1);

        config.visual_tags.insert(HDR_DV.to_string(), false);
        assert!(filter(&config, vec![with_visual(&["HDR10", "DV"])]).is_empty());
        // Individual tags are still judged on their own
        assert_eq!(filter(&config, vec![with_visual(&["HDR10"])]).len(), 1);
        assert_eq!(filter(&config, vec![with_visual(&["DV"])]).len(), 1);
    }

    #[test]
    fn test_hdr_variants_need_explicit_allow_others_explicit_deny() {
        let mut config = FilterConfig::default();
        config.visual_tags.clear();
        assert!(filter(&config, vec![with_visual(&["HDR10"])]).is_empty());
        assert!(filter(&config, vec![with_visual(&["DV"])]).is_empty());
        assert_eq!(filter(&config, vec![with_visual(&["10bit"])]).len(), 1);

        config.visual_tags.insert("3D".to_string(), false);
        assert!(filter(&config, vec![with_visual(&["3D"])]).is_empty());
    }

    #[test]
    fn test_category_filters_use_unknown_for_missing_values() {
        let config = FilterConfig {
            resolutions: CategoryFilter {
                excluded: vec![UNKNOWN.to_string()],
                required: vec![],
            },
            ..Default::default()
        };
        let mut known = record("a.mkv");
        known.tags.resolution = Some("1080p".into());
        let unknown = record("b.mkv");

        let kept = filter(&config, vec![known, unknown]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].filename.as_deref(), Some("a.mkv"));
    }

    #[test]
    fn test_size_and_cache_predicates() {
        let config = FilterConfig {
            size: SizeFilter {
                global: SizeRange {
                    min: Some(1_000),
                    max: None,
                },
                movies: Some(SizeRange {
                    min: None,
                    max: Some(10_000),
                }),
                series: None,
            },
            exclude_uncached: true,
            ..Default::default()
        };

        let mut large = record("large.mkv");
        large.size = Some(20_000);
        let mut small = record("small.mkv");
        small.size = Some(500);
        let mut uncached = record("uncached.mkv");
        uncached.service = Some(ServiceInfo {
            id: "realdebrid".into(),
            cached: false,
        });

        // Movie range overrides the global one, so the small file passes
        let kept = filter(&config, vec![large, small, uncached]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].filename.as_deref(), Some("small.mkv"));
    }

    #[test]
    fn test_exclude_and_require_patterns() {
        let config = FilterConfig {
            exclude_patterns: vec![r"\bCAM\b".to_string()],
            require_patterns: vec!["GRP".to_string(), "(a+)+".to_string()],
            ..Default::default()
        };

        let mut indexed = record("Movie.2023.1080p.mkv");
        indexed.indexer = Some("GRP-tracker".into());

        let kept = filter(
            &config,
            vec![
                record("Movie.2023.CAM-GRP.mkv"),
                record("Movie.2023.1080p-GRP.mkv"),
                record("Movie.2023.1080p-OTHER.mkv"),
                indexed,
            ],
        );
        let names: Vec<_> = kept.iter().filter_map(|r| r.filename.as_deref()).collect();
        assert_eq!(names, vec!["Movie.2023.1080p-GRP.mkv", "Movie.2023.1080p.mkv"]);
    }

    #[test]
    fn test_stats_count_each_reason() {
        let config = FilterConfig {
            excluded_languages: vec![UNKNOWN.to_string()],
            exclude_cached: true,
            ..Default::default()
        };
        let mut cached = with_languages(&["English"]);
        cached.service = Some(ServiceInfo {
            id: "torbox".into(),
            cached: true,
        });
        let regex = regex_engine();
        let engine = FilterEngine::new(&config, &regex, &ResourceRequest::stream("movie", "tt1"));
        let (kept, stats) = engine.apply(vec![with_languages(&[]), cached, with_languages(&["English"])]);

        assert_eq!(kept.len(), 1);
        assert_eq!(stats.examined, 3);
        assert_eq!(stats.rejected_by("language"), 1);
        assert_eq!(stats.rejected_by("cached"), 1);
        assert_eq!(stats.total_rejected(), 2);
    }

    #[test]
    fn test_error_records_always_pass() {
        let config = FilterConfig {
            excluded_languages: vec![UNKNOWN.to_string()],
            ..Default::default()
        };
        let error = CanonicalStream::error("src", "Source", "generic", "x", "y");
        assert_eq!(filter(&config, vec![error]).len(), 1);
    }
}

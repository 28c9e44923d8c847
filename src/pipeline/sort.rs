//! Multi-criteria sorting
//!
//! Phase one orders records by filename so the result never depends on the
//! order sources answered in. Records without a filename follow the named
//! ones and keep their input order. Phase two is a stable sort over the user's
//! `(criterion, direction)` list: the first criterion that distinguishes two
//! records decides, and full ties keep the phase one order.

use std::cmp::Ordering;

use crate::models::{
    CanonicalStream, Direction, NamedPattern, PreferenceLists, SortCriterion, SortSpec, UNKNOWN,
};
use crate::pipeline::filter::{HDR_DV, is_hdr};
use crate::utils::RegexFilterEngine;

/// Priority lists the comparators index into
#[derive(Debug, Clone, Copy)]
pub struct SortContext<'a> {
    pub preferences: &'a PreferenceLists,
    /// Service ids, best first
    pub services: &'a [String],
    /// Source instance ids, best first
    pub sources: &'a [String],
}

/// Record which named pattern matches each record, for `regex_sort`.
/// This runs before sorting; the comparators only read the result.
pub fn assign_rank_matches(
    records: &mut [CanonicalStream],
    patterns: &[NamedPattern],
    regex: &RegexFilterEngine,
) {
    if patterns.is_empty() {
        return;
    }
    for record in records.iter_mut() {
        let fields: Vec<&str> = [record.filename.as_deref(), record.folder_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        record.rank_match = regex.first_named_match(patterns, &fields);
    }
}

pub struct SortEngine<'a> {
    criteria: &'a [SortSpec],
    context: SortContext<'a>,
}

impl<'a> SortEngine<'a> {
    pub fn new(criteria: &'a [SortSpec], context: SortContext<'a>) -> Self {
        Self { criteria, context }
    }

    pub fn sort(&self, mut records: Vec<CanonicalStream>) -> Vec<CanonicalStream> {
        records.sort_by(|a, b| match (&a.filename, &b.filename) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        records.sort_by(|a, b| self.compare(a, b));
        records
    }

    pub fn compare(&self, a: &CanonicalStream, b: &CanonicalStream) -> Ordering {
        self.criteria
            .iter()
            .map(|spec| self.compare_by(spec, a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    fn compare_by(&self, spec: &SortSpec, a: &CanonicalStream, b: &CanonicalStream) -> Ordering {
        let prefs = self.context.preferences;
        let direction = spec.direction;
        match spec.criterion {
            SortCriterion::Resolution => directed(
                label_index(&prefs.resolutions, a.tags.resolution.as_deref())
                    .cmp(&label_index(&prefs.resolutions, b.tags.resolution.as_deref())),
                direction,
            ),
            SortCriterion::Quality => directed(
                label_index(&prefs.qualities, a.tags.quality.as_deref())
                    .cmp(&label_index(&prefs.qualities, b.tags.quality.as_deref())),
                direction,
            ),
            SortCriterion::Encode => directed(
                label_index(&prefs.encodes, a.tags.encode.as_deref())
                    .cmp(&label_index(&prefs.encodes, b.tags.encode.as_deref())),
                direction,
            ),
            SortCriterion::StreamType => {
                let index = |record: &CanonicalStream| {
                    position(&prefs.stream_types, |kind| *kind == record.kind)
                };
                directed(index(a).cmp(&index(b)), direction)
            }
            SortCriterion::Source => {
                let index =
                    |record: &CanonicalStream| position(self.context.sources, |s| *s == record.source_id);
                directed(index(a).cmp(&index(b)), direction)
            }
            SortCriterion::Service => {
                let index = |record: &CanonicalStream| match record.service_id() {
                    Some(id) => position(self.context.services, |s| s == id),
                    None => self.context.services.len(),
                };
                directed(index(a).cmp(&index(b)), direction)
            }
            SortCriterion::VisualTag => directed(
                visual_index(&prefs.visual_tags, &a.tags.visual_tags)
                    .cmp(&visual_index(&prefs.visual_tags, &b.tags.visual_tags)),
                direction,
            ),
            SortCriterion::AudioTag => directed(
                min_index(&prefs.audio_tags, &a.tags.audio_tags)
                    .cmp(&min_index(&prefs.audio_tags, &b.tags.audio_tags)),
                direction,
            ),
            SortCriterion::Language => self.compare_language(a, b, direction),
            SortCriterion::Cached => compare_cached(a.is_cached(), b.is_cached(), direction),
            SortCriterion::Size => directed(
                b.size.unwrap_or(0).cmp(&a.size.unwrap_or(0)),
                direction,
            ),
            SortCriterion::Seeders => match (a.seeders, b.seeders) {
                (Some(x), Some(y)) => directed(y.cmp(&x), direction),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortCriterion::Library => directed(b.in_library.cmp(&a.in_library), direction),
            SortCriterion::Personal => directed(b.personal.cmp(&a.personal), direction),
            SortCriterion::RegexSort => {
                let index = |record: &CanonicalStream| {
                    record.rank_match.as_ref().map(|m| m.pattern_index)
                };
                match (index(a), index(b)) {
                    (Some(x), Some(y)) => directed(x.cmp(&y), direction),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            }
        }
    }

    fn compare_language(
        &self,
        a: &CanonicalStream,
        b: &CanonicalStream,
        direction: Direction,
    ) -> Ordering {
        let prefs = self.context.preferences;
        if let Some(language) = &prefs.prioritised_language {
            let has = |record: &CanonicalStream| record.tags.languages.contains(language);
            return directed(has(b).cmp(&has(a)), direction);
        }

        let index = |record: &CanonicalStream| {
            record
                .tags
                .languages_or_unknown()
                .into_iter()
                .map(|language| position(&prefs.languages, |l| l == language))
                .min()
                .unwrap_or(prefs.languages.len())
        };
        directed(index(a).cmp(&index(b)), direction)
    }
}

/// Comparators yield preferred-first order; ascending reverses it
fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Desc => ordering,
        Direction::Asc => ordering.reverse(),
    }
}

/// Index of the first matching entry, or the list length when absent
fn position<T, F>(list: &[T], predicate: F) -> usize
where
    F: Fn(&T) -> bool,
{
    list.iter().position(predicate).unwrap_or(list.len())
}

/// A missing value is looked up as `Unknown`
fn label_index(list: &[String], value: Option<&str>) -> usize {
    let value = value.unwrap_or(UNKNOWN);
    position(list, |entry| entry == value)
}

fn min_index(list: &[String], tags: &[String]) -> usize {
    if tags.is_empty() {
        return label_index(list, None);
    }
    tags.iter()
        .map(|tag| label_index(list, Some(tag)))
        .min()
        .unwrap_or(list.len())
}

/// HDR with DV ranks as the combined entry when listed; otherwise the best
/// HDR variant ranks, then the best of all tags.
fn visual_index(list: &[String], tags: &[String]) -> usize {
    let has_dv = tags.iter().any(|tag| tag == "DV");
    let hdr: Vec<&String> = tags.iter().filter(|tag| is_hdr(tag)).collect();

    let combined = (has_dv && !hdr.is_empty())
        .then(|| list.iter().position(|entry| entry == HDR_DV))
        .flatten();
    if let Some(index) = combined {
        return index;
    }
    if let Some(index) = hdr
        .iter()
        .filter_map(|tag| list.iter().position(|entry| entry == *tag))
        .min()
    {
        return index;
    }
    min_index(list, tags)
}

/// Cached against uncached follows the direction. A record without a service
/// ranks after a cached one in descending order and before it in ascending
/// order, and always after an uncached one.
fn compare_cached(a: Option<bool>, b: Option<bool>, direction: Direction) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => directed(y.cmp(&x), direction),
        (Some(true), None) => directed(Ordering::Less, direction),
        (None, Some(true)) => directed(Ordering::Greater, direction),
        (Some(false), None) => Ordering::Less,
        (None, Some(false)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::config::RegexConfig;
    use crate::models::{Locator, RankMatch, ServiceInfo, StreamKind};
    use std::sync::Arc;
    use std::time::Duration;

    const GB: u64 = 1024 * 1024 * 1024;

    fn record(filename: &str) -> CanonicalStream {
        let mut stream = CanonicalStream::new(
            "src",
            "Source",
            "generic",
            StreamKind::Http,
            Locator::Url(format!("https://cdn.example/{filename}")),
        );
        stream.filename = Some(filename.to_string());
        stream
    }

    fn with_service(filename: &str, cached: bool, size: u64) -> CanonicalStream {
        let mut stream = record(filename);
        stream.kind = StreamKind::Debrid;
        stream.service = Some(ServiceInfo {
            id: "realdebrid".into(),
            cached,
        });
        stream.size = Some(size);
        stream
    }

    fn sort_with(
        criteria: &[SortSpec],
        preferences: &PreferenceLists,
        records: Vec<CanonicalStream>,
    ) -> Vec<String> {
        let context = SortContext {
            preferences,
            services: &[],
            sources: &[],
        };
        SortEngine::new(criteria, context)
            .sort(records)
            .into_iter()
            .filter_map(|r| r.filename)
            .collect()
    }

    fn sort(criteria: &[SortSpec], records: Vec<CanonicalStream>) -> Vec<String> {
        sort_with(criteria, &PreferenceLists::default(), records)
    }

    #[test]
    fn test_cache_status_dominates_size() {
        let mut p2p = CanonicalStream::new(
            "src",
            "Source",
            "generic",
            StreamKind::P2p,
            Locator::Torrent {
                info_hash: "abc".into(),
                file_idx: None,
                sources: vec![],
            },
        );
        p2p.filename = Some("p2p-1gb".into());
        p2p.size = Some(GB);

        let records = vec![
            p2p,
            with_service("uncached-10gb", false, 10 * GB),
            with_service("cached-2gb", true, 2 * GB),
            with_service("cached-5gb", true, 5 * GB),
        ];
        let criteria = [
            SortSpec::new(SortCriterion::Cached, Direction::Desc),
            SortSpec::new(SortCriterion::Size, Direction::Desc),
        ];
        assert_eq!(
            sort(&criteria, records),
            vec!["cached-5gb", "cached-2gb", "uncached-10gb", "p2p-1gb"]
        );
    }

    #[test]
    fn test_cached_ascending_keeps_uncached_before_no_service() {
        assert_eq!(compare_cached(Some(false), None, Direction::Asc), Ordering::Less);
        assert_eq!(compare_cached(Some(false), None, Direction::Desc), Ordering::Less);
        assert_eq!(compare_cached(Some(true), None, Direction::Asc), Ordering::Greater);
        assert_eq!(compare_cached(Some(true), Some(false), Direction::Asc), Ordering::Greater);
    }

    #[test]
    fn test_unsorted_field_keeps_filename_order() {
        let mut a = record("b-movie");
        a.seeders = Some(1);
        let mut b = record("a-movie");
        b.seeders = Some(100);
        let criteria = [SortSpec::new(SortCriterion::Resolution, Direction::Desc)];
        assert_eq!(sort(&criteria, vec![a, b]), vec!["a-movie", "b-movie"]);
    }

    #[test]
    fn test_unnamed_records_follow_named_ones_in_input_order() {
        let unnamed = |url: &str| {
            let mut stream = record("");
            stream.filename = None;
            stream.locator = Some(Locator::Url(url.to_string()));
            stream
        };
        let records = vec![
            unnamed("https://cdn.example/second"),
            record("b-movie"),
            unnamed("https://cdn.example/first"),
            record("a-movie"),
        ];
        let preferences = PreferenceLists::default();
        let context = SortContext {
            preferences: &preferences,
            services: &[],
            sources: &[],
        };
        let order: Vec<String> = SortEngine::new(&[], context)
            .sort(records)
            .into_iter()
            .map(|r| match (r.filename, r.locator) {
                (Some(name), _) => name,
                (None, Some(Locator::Url(url))) => url,
                (None, other) => format!("{other:?}"),
            })
            .collect();
        assert_eq!(
            order,
            vec![
                "a-movie",
                "b-movie",
                "https://cdn.example/second",
                "https://cdn.example/first",
            ]
        );
    }

    #[test]
    fn test_missing_seeders_sort_last_in_both_directions() {
        let mut few = record("few");
        few.seeders = Some(3);
        let mut many = record("many");
        many.seeders = Some(30);
        let none = record("a-none");

        let desc = [SortSpec::new(SortCriterion::Seeders, Direction::Desc)];
        assert_eq!(
            sort(&desc, vec![few.clone(), none.clone(), many.clone()]),
            vec!["many", "few", "a-none"]
        );
        let asc = [SortSpec::new(SortCriterion::Seeders, Direction::Asc)];
        assert_eq!(sort(&asc, vec![many, none, few]), vec!["few", "many", "a-none"]);
    }

    #[test]
    fn test_list_indexed_values_outside_the_list_sort_last() {
        let mut uhd = record("uhd");
        uhd.tags.resolution = Some("2160p".into());
        let mut odd = record("odd");
        odd.tags.resolution = Some("999p".into());
        let mut hd = record("hd");
        hd.tags.resolution = Some("1080p".into());

        let desc = [SortSpec::new(SortCriterion::Resolution, Direction::Desc)];
        assert_eq!(
            sort(&desc, vec![odd.clone(), hd.clone(), uhd.clone()]),
            vec!["uhd", "hd", "odd"]
        );
        let asc = [SortSpec::new(SortCriterion::Resolution, Direction::Asc)];
        assert_eq!(sort(&asc, vec![odd, hd, uhd]), vec!["odd", "hd", "uhd"]);
    }

    #[test]
    fn test_visual_tag_uses_combined_hdr_dv_entry() {
        let mut combined = record("combined");
        combined.tags.visual_tags = vec!["HDR10".into(), "DV".into()];
        let mut hdr10_plus = record("hdr10plus");
        hdr10_plus.tags.visual_tags = vec!["HDR10+".into(), "10bit".into()];
        let mut plain = record("a-plain");
        plain.tags.visual_tags = vec!["10bit".into()];

        let criteria = [SortSpec::new(SortCriterion::VisualTag, Direction::Desc)];
        assert_eq!(
            sort(&criteria, vec![plain, hdr10_plus, combined]),
            vec!["combined", "hdr10plus", "a-plain"]
        );
    }

    #[test]
    fn test_prioritised_language_is_binary() {
        let preferences = PreferenceLists {
            prioritised_language: Some("Italian".into()),
            ..Default::default()
        };
        let mut italian = record("z-italian");
        italian.tags.languages = vec!["English".into(), "Italian".into()];
        let english = {
            let mut r = record("a-english");
            r.tags.languages = vec!["English".into()];
            r
        };
        let criteria = [SortSpec::new(SortCriterion::Language, Direction::Desc)];
        assert_eq!(
            sort_with(&criteria, &preferences, vec![english, italian]),
            vec!["z-italian", "a-english"]
        );
    }

    #[test]
    fn test_language_list_maps_empty_to_unknown() {
        let preferences = PreferenceLists {
            languages: vec!["French".into(), UNKNOWN.into(), "English".into()],
            ..Default::default()
        };
        let mut english = record("a-english");
        english.tags.languages = vec!["English".into()];
        let unknown = record("b-unknown");
        let mut french = record("c-french");
        french.tags.languages = vec!["French".into()];

        let criteria = [SortSpec::new(SortCriterion::Language, Direction::Desc)];
        assert_eq!(
            sort_with(&criteria, &preferences, vec![english, unknown, french]),
            vec!["c-french", "b-unknown", "a-english"]
        );
    }

    #[test]
    fn test_regex_sort_unmatched_last_in_both_directions() {
        let mut first = record("first");
        first.rank_match = Some(RankMatch {
            name: "remux".into(),
            pattern_index: 0,
        });
        let mut second = record("second");
        second.rank_match = Some(RankMatch {
            name: "web".into(),
            pattern_index: 1,
        });
        let unmatched = record("a-unmatched");

        let desc = [SortSpec::new(SortCriterion::RegexSort, Direction::Desc)];
        assert_eq!(
            sort(&desc, vec![unmatched.clone(), second.clone(), first.clone()]),
            vec!["first", "second", "a-unmatched"]
        );
        let asc = [SortSpec::new(SortCriterion::RegexSort, Direction::Asc)];
        assert_eq!(
            sort(&asc, vec![unmatched, first, second]),
            vec!["second", "first", "a-unmatched"]
        );
    }

    #[test]
    fn test_assign_rank_matches_checks_filename_then_folder() {
        let regex = RegexFilterEngine::new(
            Arc::new(TtlCache::new("regex", 16, Duration::from_secs(60))),
            RegexConfig::default(),
        );
        let patterns = vec![
            NamedPattern {
                name: "remux".into(),
                pattern: "remux".into(),
            },
            NamedPattern {
                name: "pack".into(),
                pattern: "complete".into(),
            },
        ];
        let mut in_folder = record("Show.S01E01.mkv");
        in_folder.folder_name = Some("Show.S01.COMPLETE".into());
        let mut records = vec![record("Movie.REMUX.mkv"), in_folder, record("Other.mkv")];

        assign_rank_matches(&mut records, &patterns, &regex);
        let indices: Vec<_> = records
            .iter()
            .map(|r| r.rank_match.as_ref().map(|m| m.pattern_index))
            .collect();
        assert_eq!(indices, vec![Some(0), Some(1), None]);
    }

    #[test]
    fn test_empty_lists_are_neutral() {
        let preferences = PreferenceLists {
            resolutions: vec![],
            ..Default::default()
        };
        let mut a = record("b");
        a.tags.resolution = Some("2160p".into());
        let b = record("a");
        let criteria = [SortSpec::new(SortCriterion::Resolution, Direction::Desc)];
        assert_eq!(sort_with(&criteria, &preferences, vec![a, b]), vec!["a", "b"]);
    }
}

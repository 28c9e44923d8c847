//! Result caps, applied to sorted records so the best ones are kept

use std::collections::HashMap;
use tracing::debug;

use crate::models::{CanonicalStream, ResultLimits, UNKNOWN};

pub struct ResultLimiter<'a> {
    limits: &'a ResultLimits,
}

#[derive(Default)]
struct Counts<'r> {
    resolution: HashMap<&'r str, usize>,
    service: HashMap<&'r str, usize>,
    source: HashMap<&'r str, usize>,
    indexer: HashMap<&'r str, usize>,
}

fn within(counts: &HashMap<&str, usize>, key: &str, cap: Option<usize>) -> bool {
    cap.is_none_or(|cap| counts.get(key).copied().unwrap_or(0) < cap)
}

impl<'a> ResultLimiter<'a> {
    pub fn new(limits: &'a ResultLimits) -> Self {
        Self { limits }
    }

    /// Walk records in order, keeping each one only while every cap it
    /// counts against still has room
    pub fn apply(&self, records: Vec<CanonicalStream>) -> Vec<CanonicalStream> {
        if !self.limits.is_active() {
            return records;
        }
        let before = records.len();

        let mut keep = Vec::with_capacity(records.len());
        {
            let mut counts = Counts::default();
            let mut kept = 0usize;
            for record in &records {
                let resolution = record.tags.resolution.as_deref().unwrap_or(UNKNOWN);
                let service = record.service_id().unwrap_or("none");
                let source = record.source_id.as_str();
                let indexer = record.indexer.as_deref().unwrap_or(UNKNOWN);

                let admitted = self.limits.global.is_none_or(|cap| kept < cap)
                    && within(&counts.resolution, resolution, self.limits.per_resolution)
                    && within(&counts.service, service, self.limits.per_service)
                    && within(&counts.source, source, self.limits.per_source)
                    && within(&counts.indexer, indexer, self.limits.per_indexer);

                if admitted {
                    kept += 1;
                    *counts.resolution.entry(resolution).or_insert(0) += 1;
                    *counts.service.entry(service).or_insert(0) += 1;
                    *counts.source.entry(source).or_insert(0) += 1;
                    *counts.indexer.entry(indexer).or_insert(0) += 1;
                }
                keep.push(admitted);
            }
        }

        let limited: Vec<CanonicalStream> = records
            .into_iter()
            .zip(keep)
            .filter_map(|(record, admitted)| admitted.then_some(record))
            .collect();
        debug!("Result limits kept {} of {} records", limited.len(), before);
        limited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Locator, StreamKind};

    fn record(source: &str, resolution: &str) -> CanonicalStream {
        let mut stream = CanonicalStream::new(
            source,
            source,
            "generic",
            StreamKind::Http,
            Locator::Url("https://cdn.example/v.mkv".into()),
        );
        stream.tags.resolution = Some(resolution.to_string());
        stream
    }

    #[test]
    fn test_inactive_limits_are_identity() {
        let limits = ResultLimits::default();
        let records = vec![record("a", "1080p"), record("a", "1080p")];
        assert_eq!(ResultLimiter::new(&limits).apply(records).len(), 2);
    }

    #[test]
    fn test_per_resolution_and_global_caps() {
        let limits = ResultLimits {
            global: Some(3),
            per_resolution: Some(1),
            ..Default::default()
        };
        let records = vec![
            record("a", "2160p"),
            record("b", "2160p"),
            record("a", "1080p"),
            record("b", "720p"),
            record("c", "480p"),
        ];
        let kept = ResultLimiter::new(&limits).apply(records);
        let resolutions: Vec<_> = kept
            .iter()
            .filter_map(|r| r.tags.resolution.as_deref())
            .collect();
        assert_eq!(resolutions, vec!["2160p", "1080p", "720p"]);
    }

    #[test]
    fn test_per_source_cap_keeps_earliest() {
        let limits = ResultLimits {
            per_source: Some(2),
            ..Default::default()
        };
        let records = vec![
            record("a", "2160p"),
            record("a", "1080p"),
            record("a", "720p"),
            record("b", "720p"),
        ];
        let kept = ResultLimiter::new(&limits).apply(records);
        let sources: Vec<_> = kept.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(sources, vec!["a", "a", "b"]);
    }
}

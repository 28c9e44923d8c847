//! Duplicate reduction
//!
//! Records are grouped by a key (normalised filename, then info hash by
//! default). Each pass runs over the previous pass's survivors. Within a
//! group the survivors depend on the mode; survivors are never modified and
//! keep their relative order.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::{CanonicalStream, DedupConfig, DedupKey, DedupMode};

/// Pseudo service id grouping records without a service
const NO_SERVICE: &str = "p2p";

static CONTAINER_EXTENSION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(?:mkv|mp4|avi|m4v|mov|wmv|ts|m2ts|webm|flv|iso|mpg|mpeg)$").ok()
});

/// Filename key: container extension removed, only letters and digits kept, lowercased
pub fn normalize_filename(filename: &str) -> String {
    let stem = match CONTAINER_EXTENSION.as_ref() {
        Some(re) => re.replace(filename.trim(), "").to_string(),
        None => filename.trim().to_string(),
    };
    stem.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bucket {
    Cached,
    Uncached,
    NoProvider,
}

fn bucket(record: &CanonicalStream) -> Bucket {
    match record.is_cached() {
        Some(true) => Bucket::Cached,
        Some(false) => Bucket::Uncached,
        None => Bucket::NoProvider,
    }
}

fn in_bucket<'r>(
    records: &'r [CanonicalStream],
    members: &'r [usize],
    wanted: Bucket,
) -> impl Iterator<Item = usize> + 'r {
    members
        .iter()
        .copied()
        .filter(move |&i| bucket(&records[i]) == wanted)
}

pub struct DeduplicationEngine<'a> {
    config: &'a DedupConfig,
    /// Service ids, best first
    services: &'a [String],
    /// Source instance ids, best first
    sources: &'a [String],
}

impl<'a> DeduplicationEngine<'a> {
    pub fn new(config: &'a DedupConfig, services: &'a [String], sources: &'a [String]) -> Self {
        Self {
            config,
            services,
            sources,
        }
    }

    pub fn apply(&self, records: Vec<CanonicalStream>) -> Vec<CanonicalStream> {
        if !self.config.enabled {
            return records;
        }
        let before = records.len();
        let survivors = self
            .config
            .keys
            .iter()
            .fold(records, |records, key| self.pass(records, *key));
        debug!(
            mode = %self.config.mode,
            "Deduplicated {} records down to {}",
            before,
            survivors.len()
        );
        survivors
    }

    fn pass(&self, records: Vec<CanonicalStream>, key: DedupKey) -> Vec<CanonicalStream> {
        let mut keep = vec![false; records.len()];
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for (index, record) in records.iter().enumerate() {
            match group_key(record, key) {
                Some(group) => {
                    let members = groups.entry(group.clone()).or_default();
                    if members.is_empty() {
                        order.push(group);
                    }
                    members.push(index);
                }
                None => keep[index] = true,
            }
        }

        for group in &order {
            if let Some(members) = groups.get(group) {
                for index in self.select(&records, members) {
                    keep[index] = true;
                }
            }
        }

        records
            .into_iter()
            .zip(keep)
            .filter_map(|(record, kept)| kept.then_some(record))
            .collect()
    }

    /// Indices of the survivors of one duplicate group
    fn select(&self, records: &[CanonicalStream], members: &[usize]) -> Vec<usize> {
        if members.len() < 2 {
            return members.to_vec();
        }

        match self.config.mode {
            DedupMode::Union => self.union(records, members),
            DedupMode::SingleResult => self
                .union(records, members)
                .into_iter()
                .min_by_key(|&i| self.overall_rank(&records[i]))
                .into_iter()
                .collect(),
            DedupMode::PerService => self.best_per(records, members, |record| {
                record.service_id().unwrap_or(NO_SERVICE).to_string()
            }),
            DedupMode::PerAddon => {
                self.best_per(records, members, |record| record.source_id.clone())
            }
        }
    }

    /// Best no-provider record, best cached record, and the best uncached
    /// record of every service
    fn union(&self, records: &[CanonicalStream], members: &[usize]) -> Vec<usize> {
        let mut selected = Vec::new();
        selected.extend(
            in_bucket(records, members, Bucket::NoProvider)
                .min_by_key(|&i| self.source_rank(&records[i])),
        );
        selected.extend(in_bucket(records, members, Bucket::Cached).min_by_key(|&i| {
            let record = &records[i];
            (self.service_rank(record), self.source_rank(record))
        }));

        let mut per_service: Vec<(&str, usize)> = Vec::new();
        for index in in_bucket(records, members, Bucket::Uncached) {
            let record = &records[index];
            let service = record.service_id().unwrap_or(NO_SERVICE);
            match per_service.iter_mut().find(|(id, _)| *id == service) {
                Some((_, best)) => {
                    if self.source_rank(record) < self.source_rank(&records[*best]) {
                        *best = index;
                    }
                }
                None => per_service.push((service, index)),
            }
        }
        selected.extend(per_service.into_iter().map(|(_, index)| index));
        selected
    }

    fn best_per<F>(&self, records: &[CanonicalStream], members: &[usize], key: F) -> Vec<usize>
    where
        F: Fn(&CanonicalStream) -> String,
    {
        let mut best: Vec<(String, usize)> = Vec::new();
        for &index in members {
            let group = key(&records[index]);
            match best.iter_mut().find(|(id, _)| *id == group) {
                Some((_, current)) => {
                    if self.overall_rank(&records[index]) < self.overall_rank(&records[*current]) {
                        *current = index;
                    }
                }
                None => best.push((group, index)),
            }
        }
        best.into_iter().map(|(_, index)| index).collect()
    }

    /// Cached, then uncached, then no-provider; then service, source and seeders
    fn overall_rank(&self, record: &CanonicalStream) -> (Bucket, usize, (usize, bool)) {
        (
            bucket(record),
            self.service_rank(record),
            self.source_rank(record),
        )
    }

    fn service_rank(&self, record: &CanonicalStream) -> usize {
        record
            .service_id()
            .and_then(|id| self.services.iter().position(|s| s == id))
            .unwrap_or(self.services.len())
    }

    /// Source position, with a record carrying seeders winning a tie
    fn source_rank(&self, record: &CanonicalStream) -> (usize, bool) {
        let position = self
            .sources
            .iter()
            .position(|s| *s == record.source_id)
            .unwrap_or(self.sources.len());
        let without_seeders = record.seeders.is_none_or(|s| s == 0);
        (position, without_seeders)
    }
}

fn group_key(record: &CanonicalStream, key: DedupKey) -> Option<String> {
    if record.is_error() {
        return None;
    }
    match key {
        DedupKey::Filename => record
            .filename
            .as_deref()
            .map(normalize_filename)
            .filter(|k| !k.is_empty()),
        DedupKey::InfoHash => record.info_hash().map(str::to_lowercase),
    }
}

//! Concurrent fan-out over every configured source
//!
//! Each source is fetched and normalised in its own future, bounded by its
//! own timeout. Failures are collected next to the records and never cancel
//! sibling sources.

use futures::future::join_all;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::client::AddonClient;
use super::factory::SourceRegistry;
use crate::errors::SourceError;
use crate::models::{CanonicalStream, ResourceRequest, SourceConfig, SourceSettings};
use crate::parser::FileParser;
use crate::utils::UrlUtils;

/// A source that failed during one aggregate call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source_id: String,
    pub source_name: String,
    pub message: String,
}

impl SourceFailure {
    pub fn new(source_id: &str, source_name: &str, error: &SourceError) -> Self {
        Self {
            source_id: source_id.to_string(),
            source_name: source_name.to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    pub records: Vec<CanonicalStream>,
    pub failures: Vec<SourceFailure>,
}

pub struct Aggregator {
    client: AddonClient,
    registry: SourceRegistry,
    extractor: FileParser,
}

impl Aggregator {
    pub fn new(client: AddonClient, registry: SourceRegistry, extractor: FileParser) -> Self {
        Self {
            client,
            registry,
            extractor,
        }
    }

    /// Build the runtime config for one source, consulting the upstream
    /// manifest for any capability the settings leave undeclared. A base URL
    /// that is not http(s) or a manifest that cannot be fetched is reported as
    /// a failure of that source.
    pub async fn resolve_source(
        &self,
        settings: &SourceSettings,
        default_timeout: Duration,
    ) -> Result<SourceConfig, SourceFailure> {
        let config = SourceConfig::from_settings(settings, default_timeout);
        let outcome = match check_base_url(&config.base_url) {
            Err(e) => Err(e),
            Ok(()) if settings.resources.is_some() && settings.types.is_some() => {
                return Ok(config);
            }
            Ok(()) => self
                .client
                .fetch_manifest(&config)
                .await
                .map(|manifest| SourceConfig::from_manifest(settings, &manifest, default_timeout)),
        };

        outcome.map_err(|e| {
            warn!(source = %config.name, "Failed to resolve source: {}", e);
            SourceFailure::new(&config.instance_id, &config.name, &e)
        })
    }

    /// Query every source that supports `request` and merge the results in
    /// source order. Sources that do not declare the resource are skipped.
    pub async fn aggregate(
        &self,
        sources: &[SourceConfig],
        request: &ResourceRequest,
    ) -> AggregateResult {
        let started = Instant::now();
        let eligible: Vec<&SourceConfig> = sources
            .iter()
            .filter(|source| {
                let supported = source.supports(request);
                if !supported {
                    debug!(
                        source = %source.name,
                        "Skipping source without support for {}/{}",
                        request.resource, request.content_type
                    );
                }
                supported
            })
            .collect();

        let outcomes = join_all(
            eligible
                .iter()
                .map(|source| self.fetch_source(source, request)),
        )
        .await;

        let mut result = AggregateResult::default();
        for (source, outcome) in eligible.iter().zip(outcomes) {
            match outcome {
                Ok(records) => result.records.extend(records),
                Err(e) => {
                    warn!(source = %source.name, "Source failed: {}", e);
                    result
                        .failures
                        .push(SourceFailure::new(&source.instance_id, &source.name, &e));
                }
            }
        }

        info!(
            "Aggregated {} streams from {} sources ({} failed) in {:?}",
            result.records.len(),
            eligible.len(),
            result.failures.len(),
            started.elapsed()
        );
        result
    }

    async fn fetch_source(
        &self,
        source: &SourceConfig,
        request: &ResourceRequest,
    ) -> Result<Vec<CanonicalStream>, SourceError> {
        let started = Instant::now();
        let raw_streams =
            match tokio::time::timeout(source.timeout, self.client.fetch_streams(source, request))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(SourceError::timeout(UrlUtils::obfuscate_credentials(
                        &source.resource_url(request),
                    )));
                }
            };

        let parser = self.registry.parser_for(&source.source_type);
        let total = raw_streams.len();
        let mut records = Vec::with_capacity(total);
        for (index, raw) in raw_streams.into_iter().enumerate() {
            let normalized = raw.and_then(|raw| parser.normalize(&raw, source, &self.extractor));
            match normalized {
                Ok(record) => records.push(record),
                Err(e) => warn!(source = %source.name, index, "Dropping stream entry: {}", e),
            }
        }

        debug!(
            source = %source.name,
            "Normalized {} of {} streams in {:?}",
            records.len(),
            total,
            started.elapsed()
        );
        Ok(records)
    }
}

fn check_base_url(base_url: &str) -> Result<(), SourceError> {
    match Url::parse(base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        Ok(url) => Err(SourceError::invalid_config(
            "url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => Err(SourceError::invalid_config("url", e.to_string())),
    }
}

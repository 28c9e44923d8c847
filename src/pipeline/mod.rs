//! Request pipeline
//!
//! [`StreamService`] runs one resource request end to end:
//!
//! 1. take the resolved sources, resolving any that are still missing
//! 2. discover the proxy's public IP and hand it to proxied sources
//! 3. aggregate every source concurrently
//! 4. filter, deduplicate, sort and limit the delivery records
//! 5. rewrite eligible URLs through the proxy
//! 6. append error records and map everything to the wire shape
//!
//! Only public IP discovery can fail the request as a whole.

pub mod dedup;
pub mod filter;
pub mod limit;
pub mod sort;
pub mod wire;

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::CacheRegistry;
use crate::config::Config;
use crate::errors::AppResult;
use crate::formatter::{DefaultFormatter, StreamFormatter};
use crate::models::{
    CanonicalStream, ResourceRequest, SortCriterion, SourceConfig, SourceSettings, UserConfig,
    WireStreamResponse,
};
use crate::parser::FileParser;
use crate::proxy::{ProxyResolver, create_backend};
use crate::sources::{AddonClient, Aggregator, SourceFailure, SourceRegistry};
use crate::utils::{RegexFilterEngine, StandardHttpClient};

pub use dedup::DeduplicationEngine;
pub use filter::{FilterEngine, FilterStats};
pub use limit::ResultLimiter;
pub use sort::{SortContext, SortEngine, assign_rank_matches};
pub use wire::{WireMapper, failure_record};

/// Ordered records produced for one request, before wire mapping
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub records: Vec<CanonicalStream>,
    pub failures: Vec<SourceFailure>,
    pub filter_stats: FilterStats,
}

pub struct StreamService {
    /// Enabled sources in priority order
    sources: Vec<SourceSettings>,
    /// Runtime configs by position in `sources`. Built once and reused; a
    /// slot stays empty while its source cannot be resolved and is retried
    /// on the next request.
    resolved: RwLock<Vec<Option<SourceConfig>>>,
    profile: UserConfig,
    default_timeout: Duration,
    aggregator: Aggregator,
    regex: RegexFilterEngine,
    proxy: Option<ProxyResolver>,
    formatter: Arc<dyn StreamFormatter>,
}

impl StreamService {
    pub fn new(config: &Config, caches: &CacheRegistry) -> AppResult<Self> {
        let http = StandardHttpClient::from_config(&config.http)?;
        let client = AddonClient::new(http.clone(), caches.manifests.clone());
        let aggregator = Aggregator::new(client, SourceRegistry::default(), FileParser::default());

        let proxy = if config.profile.proxy.enabled {
            let backend = create_backend(&config.profile.proxy, http.inner_client().clone())?;
            Some(ProxyResolver::new(
                config.profile.proxy.clone(),
                backend,
                caches.public_ip.clone(),
                config.proxy_runtime.clone(),
            ))
        } else {
            None
        };

        let sources: Vec<SourceSettings> = config
            .sources
            .iter()
            .filter(|source| source.enabled)
            .cloned()
            .collect();
        let resolved = RwLock::new(sources.iter().map(|_| None).collect());

        Ok(Self {
            sources,
            resolved,
            profile: config.profile.clone(),
            default_timeout: config.http.source_timeout,
            aggregator,
            regex: RegexFilterEngine::new(caches.regex.clone(), config.regex.clone()),
            proxy,
            formatter: Arc::new(DefaultFormatter::new(config.web.addon_name.clone())),
        })
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn StreamFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Run the pipeline and map the result to the outbound shape
    pub async fn streams(&self, request: &ResourceRequest) -> AppResult<WireStreamResponse> {
        let output = self.run(request).await?;
        let marker = self.proxy.as_ref().map(ProxyResolver::marker);
        let mapper = WireMapper::new(self.formatter.as_ref(), marker);
        Ok(WireStreamResponse {
            streams: mapper.map_all(&output.records),
        })
    }

    pub async fn run(&self, request: &ResourceRequest) -> AppResult<PipelineOutput> {
        let started = Instant::now();

        let (sources, mut failures) = self.source_configs().await;
        let sources = self.assign_public_ip(sources).await?;

        let aggregate = self.aggregator.aggregate(&sources, request).await;
        failures.extend(aggregate.failures);

        let (errors, records): (Vec<_>, Vec<_>) = aggregate
            .records
            .into_iter()
            .partition(CanonicalStream::is_error);

        let profile = &self.profile;
        let (records, filter_stats) =
            FilterEngine::new(&profile.filters, &self.regex, request).apply(records);

        let source_order: Vec<String> = sources.iter().map(|s| s.instance_id.clone()).collect();
        let records =
            DeduplicationEngine::new(&profile.deduplication, &profile.services, &source_order)
                .apply(records);

        let criteria = profile.sort.criteria_for(request);
        let mut records = records;
        if criteria
            .iter()
            .any(|spec| spec.criterion == SortCriterion::RegexSort)
        {
            assign_rank_matches(&mut records, &profile.ranked_patterns, &self.regex);
        }
        let context = SortContext {
            preferences: &profile.preferences,
            services: &profile.services,
            sources: &source_order,
        };
        let records = SortEngine::new(criteria, context).sort(records);
        let records = ResultLimiter::new(&profile.limits).apply(records);

        let mut records = match &self.proxy {
            Some(proxy) => proxy.apply(records).await,
            None => records,
        };

        if profile.show_errors {
            records.extend(errors);
            records.extend(failures.iter().map(failure_record));
        }

        info!(
            "Served {} streams for {}/{} from {} sources ({} failed) in {:?}",
            records.len(),
            request.content_type,
            request.id,
            sources.len(),
            failures.len(),
            started.elapsed()
        );
        Ok(PipelineOutput {
            records,
            failures,
            filter_stats,
        })
    }

    /// Resolved source configs in priority order, plus a failure for every
    /// source that still could not be resolved
    async fn source_configs(&self) -> (Vec<SourceConfig>, Vec<SourceFailure>) {
        let pending: Vec<usize> = {
            let resolved = self.resolved.read().await;
            (0..resolved.len())
                .filter(|&index| resolved[index].is_none())
                .collect()
        };

        let mut failures = Vec::new();
        if !pending.is_empty() {
            let outcomes = join_all(pending.iter().map(|&index| {
                self.aggregator
                    .resolve_source(&self.sources[index], self.default_timeout)
            }))
            .await;

            let mut resolved = self.resolved.write().await;
            for (index, outcome) in pending.into_iter().zip(outcomes) {
                match outcome {
                    Ok(config) => resolved[index] = Some(config),
                    Err(failure) => failures.push(failure),
                }
            }
        }

        let sources = self.resolved.read().await.iter().flatten().cloned().collect();
        (sources, failures)
    }

    /// Discover the egress IP once per request and attach it to every
    /// source that is dispatched through the proxy
    async fn assign_public_ip(&self, sources: Vec<SourceConfig>) -> AppResult<Vec<SourceConfig>> {
        let Some(proxy) = &self.proxy else {
            return Ok(sources);
        };
        if !sources.iter().any(|source| proxy.proxies_source(source)) {
            return Ok(sources);
        }

        let ip = proxy.resolve_public_ip().await?;
        debug!("Forwarding public IP {} to proxied sources", ip);
        Ok(sources
            .into_iter()
            .map(|source| {
                if proxy.proxies_source(&source) {
                    source.with_ip(Some(ip.clone()))
                } else {
                    source
                }
            })
            .collect())
    }
}

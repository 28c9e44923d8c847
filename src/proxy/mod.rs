//! Egress proxy support
//!
//! A [`ProxyResolver`] wraps one [`ProxyBackend`] and owns the two decisions
//! the pipeline needs from it: which public IP upstream sources should see,
//! and which records get their URL rewritten through the proxy.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::config::ProxyRuntimeConfig;
use crate::errors::{ProxyError, ProxyResult};
use crate::models::{
    CanonicalStream, Locator, ProxyBackendKind, ProxySettings, SourceConfig,
};
use crate::utils::UrlUtils;
use crate::utils::retry::{RetryConfig, retry_until_some};

pub mod mediaflow;
pub mod stremthru;

pub use mediaflow::MediaFlowBackend;
pub use stremthru::StremThruBackend;

/// Service id used in `proxied_services` for records without a provider
pub const NO_SERVICE: &str = "none";

/// One URL to rewrite through the proxy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProxyRequest {
    pub destination: String,
    pub filename: Option<String>,
    pub request_headers: BTreeMap<String, String>,
    pub response_headers: BTreeMap<String, String>,
}

impl ProxyRequest {
    fn from_record(url: &str, record: &CanonicalStream) -> Self {
        let headers = record.proxy_headers.as_ref();
        Self {
            destination: url.to_string(),
            filename: record.filename.clone(),
            request_headers: headers
                .and_then(|h| h.request.clone())
                .unwrap_or_default(),
            response_headers: headers
                .and_then(|h| h.response.clone())
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
pub trait ProxyBackend: Send + Sync {
    fn kind(&self) -> ProxyBackendKind;

    /// Egress IP as reported by the proxy itself
    async fn fetch_public_ip(&self, timeout: Duration) -> ProxyResult<String>;

    /// Rewrite a batch of URLs in one call, in request order. Any failure
    /// fails the whole batch.
    async fn generate_urls(
        &self,
        requests: &[ProxyRequest],
        timeout: Duration,
    ) -> ProxyResult<Vec<String>>;
}

/// Build the backend selected by `settings`
pub fn create_backend(settings: &ProxySettings, client: Client) -> ProxyResult<Arc<dyn ProxyBackend>> {
    if url::Url::parse(&settings.url).is_err() {
        return Err(ProxyError::InvalidConfig {
            message: format!("invalid proxy url: {}", settings.url),
        });
    }
    let backend: Arc<dyn ProxyBackend> = match settings.backend {
        ProxyBackendKind::Mediaflow => Arc::new(MediaFlowBackend::new(client, settings)),
        ProxyBackendKind::Stremthru => Arc::new(StremThruBackend::new(client, settings)),
    };
    Ok(backend)
}

pub(crate) fn request_error(kind: ProxyBackendKind, err: reqwest::Error) -> ProxyError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        UrlUtils::obfuscate_credentials(&err.to_string())
    };
    ProxyError::backend(kind.as_ref(), message)
}

pub(crate) fn base_url(settings: &ProxySettings) -> String {
    settings.url.trim().trim_end_matches('/').to_string()
}

pub struct ProxyResolver {
    settings: ProxySettings,
    backend: Arc<dyn ProxyBackend>,
    public_ips: Arc<TtlCache<String, String>>,
    runtime: ProxyRuntimeConfig,
}

impl ProxyResolver {
    pub fn new(
        settings: ProxySettings,
        backend: Arc<dyn ProxyBackend>,
        public_ips: Arc<TtlCache<String, String>>,
        runtime: ProxyRuntimeConfig,
    ) -> Self {
        Self {
            settings,
            backend,
            public_ips,
            runtime,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Prefix carried by binge groups of proxied records
    pub fn marker(&self) -> &'static str {
        match self.backend.kind() {
            ProxyBackendKind::Mediaflow => "mediaflow",
            ProxyBackendKind::Stremthru => "stremthru",
        }
    }

    fn cache_key(&self) -> String {
        let host = UrlUtils::extract_host(&self.settings.url).unwrap_or_default();
        let credential = self.settings.credentials.as_deref().unwrap_or_default();
        format!(
            "{}:{}:{}",
            self.backend.kind(),
            host,
            hex::encode(Sha256::digest(credential.as_bytes()))
        )
    }

    /// One discovery attempt. Private hosts are never asked, since they
    /// cannot see the address remote upstreams see.
    pub async fn get_public_ip(&self) -> Option<String> {
        if UrlUtils::is_private_host(&self.settings.url) {
            debug!(
                "Proxy host {} is private, skipping public IP discovery",
                UrlUtils::obfuscate_credentials(&self.settings.url)
            );
            return None;
        }

        let key = self.cache_key();
        if let Some(ip) = self.public_ips.get(&key) {
            return Some(ip);
        }

        match self
            .backend
            .fetch_public_ip(self.runtime.public_ip_timeout)
            .await
        {
            Ok(ip) => {
                debug!("Proxy {} reports public IP {}", self.backend.kind(), ip);
                self.public_ips.insert(key, ip.clone());
                Some(ip)
            }
            Err(e) => {
                warn!("Public IP discovery failed: {}", e);
                None
            }
        }
    }

    /// Public IP for this request: the configured override, or discovery
    /// retried `public_ip_attempts` times. Exhaustion is fatal.
    pub async fn resolve_public_ip(&self) -> ProxyResult<String> {
        if let Some(ip) = self.settings.public_ip.as_ref().filter(|ip| !ip.is_empty()) {
            return Ok(ip.clone());
        }

        let retry = RetryConfig {
            max_attempts: self.runtime.public_ip_attempts,
            delay: self.runtime.retry_delay,
            jitter: true,
        };
        retry_until_some(&retry, || self.get_public_ip(), "public_ip_discovery")
            .await
            .ok_or_else(|| ProxyError::PublicIpUnavailable {
                backend: self.backend.kind().to_string(),
                attempts: self.runtime.public_ip_attempts,
            })
    }

    fn source_allowed(&self, instance_id: &str, source_type: &str) -> bool {
        match &self.settings.proxied_sources {
            Some(allowed) => allowed
                .iter()
                .any(|s| s == instance_id || s == source_type),
            None => true,
        }
    }

    /// Whether requests to this source should carry the proxy's IP
    pub fn proxies_source(&self, source: &SourceConfig) -> bool {
        self.settings.enabled && self.source_allowed(&source.instance_id, &source.source_type)
    }

    /// Enabled, source allowed and service allowed. Only URL locators can
    /// be rewritten.
    pub fn is_eligible(&self, record: &CanonicalStream) -> bool {
        if !self.settings.enabled || !matches!(record.locator, Some(Locator::Url(_))) {
            return false;
        }
        if !self.source_allowed(&record.source_id, &record.source_type) {
            return false;
        }
        match &self.settings.proxied_services {
            Some(allowed) => {
                let service = record.service_id().unwrap_or(NO_SERVICE);
                allowed.iter().any(|s| s == service)
            }
            None => true,
        }
    }

    /// Rewrite a batch, or `None` when the backend failed for any of it
    pub async fn generate_urls(&self, requests: &[ProxyRequest]) -> Option<Vec<String>> {
        if requests.is_empty() {
            return Some(Vec::new());
        }
        let urls = match self
            .backend
            .generate_urls(requests, self.runtime.generation_timeout)
            .await
        {
            Ok(urls) if urls.len() == requests.len() => urls,
            Ok(urls) => {
                warn!(
                    "Proxy returned {} urls for {} requests",
                    urls.len(),
                    requests.len()
                );
                return None;
            }
            Err(e) => {
                warn!("Proxy URL generation failed: {}", e);
                return None;
            }
        };

        Some(match &self.settings.public_url {
            Some(public_url) => urls
                .iter()
                .map(|url| UrlUtils::apply_public_override(url, public_url))
                .collect(),
            None => urls,
        })
    }

    /// Route every eligible record through the proxy. When generation fails
    /// the eligible records are dropped and the rest pass through untouched.
    pub async fn apply(&self, records: Vec<CanonicalStream>) -> Vec<CanonicalStream> {
        let mut eligible = Vec::new();
        let mut requests = Vec::new();
        for (index, record) in records.iter().enumerate() {
            if let (true, Some(Locator::Url(url))) = (self.is_eligible(record), &record.locator) {
                eligible.push(index);
                requests.push(ProxyRequest::from_record(url, record));
            }
        }
        if eligible.is_empty() {
            return records;
        }

        match self.generate_urls(&requests).await {
            Some(urls) => {
                let mut records = records;
                for (index, url) in eligible.into_iter().zip(urls) {
                    let record = &mut records[index];
                    record.locator = Some(Locator::Url(url));
                    record.proxied = true;
                    record.proxy_headers = None;
                }
                info!("Proxied {} of {} records", requests.len(), records.len());
                records
            }
            None => {
                warn!("Dropping {} records that required the proxy", eligible.len());
                records
                    .into_iter()
                    .enumerate()
                    .filter(|(index, _)| eligible.binary_search(index).is_err())
                    .map(|(_, record)| record)
                    .collect()
            }
        }
    }
}

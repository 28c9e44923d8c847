//! HTTP client for upstream addons

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::cache::TtlCache;
use crate::errors::{NormalizationError, SourceError, SourceResult};
use crate::models::{Manifest, RawStream, ResourceRequest, SourceConfig};
use crate::utils::StandardHttpClient;

/// Headers used to pass the egress IP upstream
const FORWARDED_FOR: &str = "X-Forwarded-For";
const CLIENT_IP: &str = "X-Client-IP";

/// Stream list envelope. Entries stay loosely typed here so one malformed
/// entry can be skipped without failing the whole response.
#[derive(Debug, Deserialize)]
struct StreamsEnvelope {
    streams: Vec<serde_json::Value>,
}

/// Fetches manifests and resources from one upstream addon at a time
#[derive(Clone)]
pub struct AddonClient {
    http: StandardHttpClient,
    manifests: Arc<TtlCache<String, Manifest>>,
}

impl AddonClient {
    pub fn new(http: StandardHttpClient, manifests: Arc<TtlCache<String, Manifest>>) -> Self {
        Self { http, manifests }
    }

    /// Fetch and validate `{base}/manifest.json`, cached per manifest URL
    pub async fn fetch_manifest(&self, source: &SourceConfig) -> SourceResult<Manifest> {
        let url = source.manifest_url();
        if let Some(manifest) = self.manifests.get(&url) {
            debug!(source = %source.name, "Manifest served from cache");
            return Ok(manifest);
        }

        let manifest: Manifest = self
            .http
            .get_json(&url, &Self::headers(source), source.timeout, &source.name)
            .await?;
        manifest
            .validate()
            .map_err(|message| SourceError::invalid_response(&source.name, message))?;

        self.manifests.insert(url, manifest.clone());
        Ok(manifest)
    }

    /// Fetch the raw stream list for `request`. Each entry is decoded on its
    /// own, so an undecodable one comes back as `Malformed` in its slot while
    /// a missing `streams` array fails the source.
    pub async fn fetch_streams(
        &self,
        source: &SourceConfig,
        request: &ResourceRequest,
    ) -> SourceResult<Vec<Result<RawStream, NormalizationError>>> {
        let url = source.resource_url(request);
        let envelope: StreamsEnvelope = self
            .http
            .get_json(&url, &Self::headers(source), source.timeout, &source.name)
            .await?;

        let streams: Vec<_> = envelope
            .streams
            .into_iter()
            .map(|value| {
                serde_json::from_value::<RawStream>(value).map_err(|e| {
                    NormalizationError::Malformed {
                        source_name: source.name.clone(),
                        message: e.to_string(),
                    }
                })
            })
            .collect();

        debug!(source = %source.name, "Received {} stream entries", streams.len());
        Ok(streams)
    }

    fn headers(source: &SourceConfig) -> BTreeMap<String, String> {
        let mut headers = source.headers.clone();
        if let Some(ip) = &source.ip {
            headers.insert(FORWARDED_FOR.to_string(), ip.clone());
            headers.insert(CLIENT_IP.to_string(), ip.clone());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::models::SourceSettings;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> AddonClient {
        AddonClient::new(
            StandardHttpClient::from_config(&HttpConfig::default()).unwrap(),
            Arc::new(TtlCache::new("manifests", 16, Duration::from_secs(60))),
        )
    }

    fn source(url: &str) -> SourceConfig {
        SourceConfig::from_settings(
            &SourceSettings {
                source_type: "generic".into(),
                name: "Mock".into(),
                url: url.into(),
                timeout: None,
                headers: BTreeMap::new(),
                resources: None,
                types: None,
                id_prefixes: None,
                enabled: true,
            },
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_manifest_is_validated_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "org.mock",
                "name": "Mock",
                "version": "1.0.0",
                "types": ["movie"],
                "resources": ["stream"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client();
        let source = source(&server.uri());
        let first = client.fetch_manifest(&source).await.unwrap();
        let second = client.fetch_manifest(&source).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.resource_names(), vec!["stream"]);
    }

    #[tokio::test]
    async fn test_invalid_manifest_is_a_source_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "org.mock",
                "name": "Mock",
                "version": "1.0.0",
                "resources": []
            })))
            .mount(&server)
            .await;

        let result = client().fetch_manifest(&source(&server.uri())).await;
        assert!(matches!(result, Err(SourceError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_malformed_entries_are_reported_in_place() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stream/movie/tt0111161.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "streams": [
                    { "url": "https://cdn.example/a.mkv", "name": "A" },
                    { "url": 42 },
                    { "infoHash": "0123456789abcdef0123456789abcdef01234567" }
                ]
            })))
            .mount(&server)
            .await;

        let streams = client()
            .fetch_streams(
                &source(&server.uri()),
                &ResourceRequest::stream("movie", "tt0111161"),
            )
            .await
            .unwrap();
        assert_eq!(streams.len(), 3);
        assert_eq!(streams[0].as_ref().unwrap().display_name(), "A");
        assert!(matches!(
            &streams[1],
            Err(NormalizationError::Malformed { source_name, .. }) if source_name == "Mock"
        ));
        assert!(streams[2].is_ok());
    }

    #[tokio::test]
    async fn test_missing_streams_array_fails_the_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "nope" })))
            .mount(&server)
            .await;

        let result = client()
            .fetch_streams(
                &source(&server.uri()),
                &ResourceRequest::stream("movie", "tt0111161"),
            )
            .await;
        assert!(matches!(result, Err(SourceError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_egress_ip_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("x-forwarded-for", "203.0.113.7"))
            .and(header("x-client-ip", "203.0.113.7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "streams": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let source = source(&server.uri()).with_ip(Some("203.0.113.7".into()));
        let streams = client()
            .fetch_streams(&source, &ResourceRequest::stream("movie", "tt1"))
            .await
            .unwrap();
        assert!(streams.is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let result = client()
            .fetch_streams(
                &source(&server.uri()),
                &ResourceRequest::stream("movie", "tt1"),
            )
            .await;
        assert!(matches!(result, Err(SourceError::Http { status: 502, .. })));
    }
}

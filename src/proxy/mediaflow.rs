//! MediaFlow proxy backend
//!
//! IP discovery is `GET /proxy/ip`, batch generation is
//! `POST /generate_urls`. The API password travels either as an
//! `api_password` header or query parameter, and is always embedded in the
//! generation payload so the proxy can sign the URLs it returns.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{ProxyBackend, ProxyRequest, base_url, request_error};
use crate::errors::{ProxyError, ProxyResult};
use crate::models::{CredentialMode, ProxyBackendKind, ProxySettings};

const STREAM_ENDPOINT: &str = "/proxy/stream";
const HLS_ENDPOINT: &str = "/proxy/hls/manifest.m3u8";

pub struct MediaFlowBackend {
    client: Client,
    base_url: String,
    api_password: Option<String>,
    credential_mode: CredentialMode,
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    mediaflow_proxy_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_password: Option<&'a str>,
    urls: Vec<GenerateItem<'a>>,
}

#[derive(Debug, Serialize)]
struct GenerateItem<'a> {
    endpoint: &'static str,
    destination_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
    #[serde(skip_serializing_if = "no_headers")]
    request_headers: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "no_headers")]
    response_headers: &'a BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    urls: Option<Vec<String>>,
    error: Option<String>,
}

fn no_headers(headers: &&BTreeMap<String, String>) -> bool {
    headers.is_empty()
}

fn endpoint_for(destination: &str) -> &'static str {
    let is_playlist = url::Url::parse(destination)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".m3u8"))
        .unwrap_or(false);
    if is_playlist {
        HLS_ENDPOINT
    } else {
        STREAM_ENDPOINT
    }
}

impl MediaFlowBackend {
    pub fn new(client: Client, settings: &ProxySettings) -> Self {
        Self {
            client,
            base_url: base_url(settings),
            api_password: settings.credentials.clone().filter(|p| !p.is_empty()),
            credential_mode: settings.credential_mode,
        }
    }

    fn authorized_url(&self, path: &str) -> String {
        let url = format!("{}{}", self.base_url, path);
        match (&self.api_password, self.credential_mode) {
            (Some(password), CredentialMode::Query) => {
                format!("{url}?api_password={}", urlencoding::encode(password))
            }
            _ => url,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.api_password, self.credential_mode) {
            (Some(password), CredentialMode::Header) => request.header("api_password", password),
            _ => request,
        }
    }

    fn error(message: impl Into<String>) -> ProxyError {
        ProxyError::backend(ProxyBackendKind::Mediaflow.as_ref(), message)
    }
}

#[async_trait]
impl ProxyBackend for MediaFlowBackend {
    fn kind(&self) -> ProxyBackendKind {
        ProxyBackendKind::Mediaflow
    }

    async fn fetch_public_ip(&self, timeout: Duration) -> ProxyResult<String> {
        let request = self
            .client
            .get(self.authorized_url("/proxy/ip"))
            .timeout(timeout);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| request_error(self.kind(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error(format!("ip endpoint returned {status}")));
        }
        let body: IpResponse = response
            .json()
            .await
            .map_err(|e| request_error(self.kind(), e))?;

        match (body.ip, body.error) {
            (Some(ip), _) if !ip.is_empty() => Ok(ip),
            (_, Some(error)) => Err(Self::error(error)),
            _ => Err(Self::error("ip endpoint returned no ip")),
        }
    }

    async fn generate_urls(
        &self,
        requests: &[ProxyRequest],
        timeout: Duration,
    ) -> ProxyResult<Vec<String>> {
        let body = GenerateBody {
            mediaflow_proxy_url: &self.base_url,
            api_password: self.api_password.as_deref(),
            urls: requests
                .iter()
                .map(|request| GenerateItem {
                    endpoint: endpoint_for(&request.destination),
                    destination_url: &request.destination,
                    filename: request.filename.as_deref(),
                    request_headers: &request.request_headers,
                    response_headers: &request.response_headers,
                })
                .collect(),
        };

        let request = self
            .client
            .post(self.authorized_url("/generate_urls"))
            .timeout(timeout)
            .json(&body);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| request_error(self.kind(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Generation {
                message: format!("mediaflow returned {status}"),
            });
        }
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| request_error(self.kind(), e))?;

        match (body.urls, body.error) {
            (_, Some(error)) => Err(ProxyError::Generation { message: error }),
            (Some(urls), None) => Ok(urls),
            (None, None) => Err(ProxyError::Generation {
                message: "mediaflow returned no urls".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer, mode: CredentialMode) -> MediaFlowBackend {
        MediaFlowBackend::new(
            Client::new(),
            &ProxySettings {
                url: format!("{}/", server.uri()),
                credentials: Some("pw".into()),
                credential_mode: mode,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_playlists_use_the_hls_endpoint() {
        assert_eq!(endpoint_for("https://cdn.example/live/index.m3u8?t=1"), HLS_ENDPOINT);
        assert_eq!(endpoint_for("https://cdn.example/movie.mkv"), STREAM_ENDPOINT);
    }

    #[tokio::test]
    async fn test_ip_with_header_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxy/ip"))
            .and(header("api_password", "pw"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ip": "203.0.113.9"})))
            .mount(&server)
            .await;

        let ip = backend(&server, CredentialMode::Header)
            .fetch_public_ip(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(ip, "203.0.113.9");
    }

    #[tokio::test]
    async fn test_ip_with_query_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxy/ip"))
            .and(query_param("api_password", "pw"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ip": "203.0.113.9"})))
            .mount(&server)
            .await;

        let ip = backend(&server, CredentialMode::Query)
            .fetch_public_ip(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(ip, "203.0.113.9");
    }

    #[tokio::test]
    async fn test_generate_sends_one_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate_urls"))
            .and(body_partial_json(json!({
                "api_password": "pw",
                "urls": [
                    {"endpoint": "/proxy/stream", "destination_url": "https://cdn.example/a.mkv", "filename": "a.mkv"},
                    {"endpoint": "/proxy/stream", "destination_url": "https://cdn.example/b.mkv"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "urls": ["https://mfp.example/1", "https://mfp.example/2"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let requests = [
            ProxyRequest {
                destination: "https://cdn.example/a.mkv".into(),
                filename: Some("a.mkv".into()),
                ..Default::default()
            },
            ProxyRequest {
                destination: "https://cdn.example/b.mkv".into(),
                ..Default::default()
            },
        ];
        let urls = backend(&server, CredentialMode::Header)
            .generate_urls(&requests, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(urls, vec!["https://mfp.example/1", "https://mfp.example/2"]);
    }

    #[tokio::test]
    async fn test_error_field_fails_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "forbidden"})))
            .mount(&server)
            .await;

        let result = backend(&server, CredentialMode::Header)
            .generate_urls(&[ProxyRequest::default()], Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(ProxyError::Generation { .. })));
    }
}

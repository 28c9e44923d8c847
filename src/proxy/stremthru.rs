//! StremThru proxy backend
//!
//! IP discovery reads the exposed address from `GET /v0/health/__debug__`;
//! batch generation is `POST /v0/proxy`. Credentials are `user:password`
//! sent Base64 encoded in `X-StremThru-Authorization`, or as a `token`
//! query parameter.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::{ProxyBackend, ProxyRequest, base_url, request_error};
use crate::errors::{ProxyError, ProxyResult};
use crate::models::{CredentialMode, ProxyBackendKind, ProxySettings};

const AUTH_HEADER: &str = "X-StremThru-Authorization";

pub struct StremThruBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
    credential_mode: CredentialMode,
}

#[derive(Debug, Serialize)]
struct ProxyBody {
    url: Vec<String>,
    filename: Vec<String>,
    req_headers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProxyData {
    items: Vec<ProxyItem>,
}

#[derive(Debug, Deserialize)]
struct ProxyItem {
    url: String,
}

/// Base64 token for `user:password`; anything else is taken as already encoded
fn encode_token(credentials: &str) -> String {
    if credentials.contains(':') {
        STANDARD.encode(credentials)
    } else {
        credentials.to_string()
    }
}

/// Header lines in the `Name: value` form the proxy expects
fn header_lines(request: &ProxyRequest) -> String {
    request
        .request_headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl StremThruBackend {
    pub fn new(client: Client, settings: &ProxySettings) -> Self {
        Self {
            client,
            base_url: base_url(settings),
            token: settings
                .credentials
                .as_deref()
                .filter(|c| !c.is_empty())
                .map(encode_token),
            credential_mode: settings.credential_mode,
        }
    }

    fn authorized_url(&self, path: &str) -> String {
        let url = format!("{}{}", self.base_url, path);
        match (&self.token, self.credential_mode) {
            (Some(token), CredentialMode::Query) => {
                format!("{url}?token={}", urlencoding::encode(token))
            }
            _ => url,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.token, self.credential_mode) {
            (Some(token), CredentialMode::Header) => {
                request.header(AUTH_HEADER, format!("Basic {token}"))
            }
            _ => request,
        }
    }

    fn error(message: impl Into<String>) -> ProxyError {
        ProxyError::backend(ProxyBackendKind::Stremthru.as_ref(), message)
    }
}

#[async_trait]
impl ProxyBackend for StremThruBackend {
    fn kind(&self) -> ProxyBackendKind {
        ProxyBackendKind::Stremthru
    }

    async fn fetch_public_ip(&self, timeout: Duration) -> ProxyResult<String> {
        let request = self
            .client
            .get(self.authorized_url("/v0/health/__debug__"))
            .timeout(timeout);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| request_error(self.kind(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error(format!("debug endpoint returned {status}")));
        }
        let body: Envelope<Value> = response
            .json()
            .await
            .map_err(|e| request_error(self.kind(), e))?;
        if let Some(error) = body.error {
            return Err(Self::error(error.message));
        }

        let ip = body.data.as_ref().and_then(|data| {
            data.pointer("/ip/exposed/*")
                .or_else(|| data.pointer("/ip/machine"))
                .and_then(Value::as_str)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
        });
        ip.ok_or_else(|| Self::error("debug endpoint returned no ip"))
    }

    async fn generate_urls(
        &self,
        requests: &[ProxyRequest],
        timeout: Duration,
    ) -> ProxyResult<Vec<String>> {
        let body = ProxyBody {
            url: requests.iter().map(|r| r.destination.clone()).collect(),
            filename: requests
                .iter()
                .map(|r| r.filename.clone().unwrap_or_default())
                .collect(),
            req_headers: requests.iter().map(header_lines).collect(),
        };

        let request = self
            .client
            .post(self.authorized_url("/v0/proxy"))
            .timeout(timeout)
            .json(&body);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| request_error(self.kind(), e))?;

        let status = response.status();
        let envelope: Envelope<ProxyData> = response
            .json()
            .await
            .map_err(|e| ProxyError::Generation {
                message: format!("stremthru returned {status}: {e}"),
            })?;

        match (envelope.data, envelope.error) {
            (_, Some(error)) => Err(ProxyError::Generation {
                message: error.message,
            }),
            (Some(data), None) => Ok(data.items.into_iter().map(|item| item.url).collect()),
            (None, None) => Err(ProxyError::Generation {
                message: format!("stremthru returned {status} without data"),
            }),
        }
    }
}

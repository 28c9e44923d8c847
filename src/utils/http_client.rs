use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::config::HttpConfig;
use crate::errors::{AppError, AppResult, SourceError, SourceResult};
use crate::utils::url::UrlUtils;

/// Upstream responses larger than this are rejected before parsing
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared reqwest client with the configured user agent and connect timeout.
/// Total request time is bounded per call, since every source has its own.
#[derive(Debug, Clone)]
pub struct StandardHttpClient {
    client: Client,
}

impl StandardHttpClient {
    pub fn from_config(config: &HttpConfig) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// GET `url` and deserialize a JSON body. Non-2xx responses, transport
    /// errors and undecodable bodies all become a `SourceError`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        timeout: Duration,
        source_name: &str,
    ) -> SourceResult<T> {
        debug!("Fetching JSON from: {}", UrlUtils::obfuscate_credentials(url));

        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(SourceError::from)?;
        let bytes = Self::checked_body(response, source_name).await?;

        serde_json::from_slice(&bytes).map_err(|e| {
            SourceError::invalid_response(source_name, format!("Failed to parse JSON: {e}"))
        })
    }

    async fn checked_body(response: Response, source_name: &str) -> SourceResult<Vec<u8>> {
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(SourceError::from)?;
        if bytes.len() > MAX_BODY_BYTES {
            return Err(SourceError::invalid_response(
                source_name,
                format!("response of {} bytes exceeds limit", bytes.len()),
            ));
        }
        debug!("Fetched {} bytes from {}", bytes.len(), source_name);
        Ok(bytes.to_vec())
    }

    /// Underlying reqwest client for callers that build their own requests
    pub fn inner_client(&self) -> &Client {
        &self.client
    }
}

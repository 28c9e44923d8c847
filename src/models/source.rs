//! Configured upstream sources

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

use super::addon::{Manifest, ResourceRequest};
use crate::config::duration_serde;

/// A source as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Strategy id selecting the normalizer, e.g. `torrentio`
    #[serde(rename = "type")]
    pub source_type: String,
    pub name: String,
    /// Addon base URL, with or without a trailing `/manifest.json`
    pub url: String,
    #[serde(default, with = "duration_serde::option_duration")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: Option<Vec<String>>,
    #[serde(default)]
    pub types: Option<Vec<String>>,
    #[serde(default)]
    pub id_prefixes: Option<Vec<String>>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Runtime view of a source, built once per user configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub instance_id: String,
    pub source_type: String,
    pub name: String,
    pub base_url: String,
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
    /// Egress IP forwarded upstream, refreshed per request
    pub ip: Option<String>,
    pub resources: Vec<String>,
    pub types: Vec<String>,
    pub id_prefixes: Option<Vec<String>>,
}

impl SourceConfig {
    pub fn from_settings(settings: &SourceSettings, default_timeout: Duration) -> Self {
        let base_url = normalize_base_url(&settings.url);
        Self {
            instance_id: instance_id(&settings.source_type, &base_url, &settings.headers),
            source_type: settings.source_type.clone(),
            name: settings.name.clone(),
            base_url,
            timeout: settings.timeout.unwrap_or(default_timeout),
            headers: settings.headers.clone(),
            ip: None,
            resources: settings
                .resources
                .clone()
                .unwrap_or_else(|| vec!["stream".to_string()]),
            types: settings.types.clone().unwrap_or_default(),
            id_prefixes: settings.id_prefixes.clone(),
        }
    }

    /// Fill undeclared capabilities from the upstream manifest. Explicit
    /// settings win over what the manifest says.
    pub fn from_manifest(
        settings: &SourceSettings,
        manifest: &Manifest,
        default_timeout: Duration,
    ) -> Self {
        let mut config = Self::from_settings(settings, default_timeout);
        if settings.resources.is_none() {
            config.resources = manifest.resource_names();
        }
        if settings.types.is_none() {
            config.types = manifest.types_for("stream");
        }
        if settings.id_prefixes.is_none() {
            config.id_prefixes = manifest.id_prefixes_for("stream");
        }
        config
    }

    /// Whether this source declares support for the request. Empty type lists
    /// mean "any type".
    pub fn supports(&self, request: &ResourceRequest) -> bool {
        if !self.resources.iter().any(|r| r == &request.resource) {
            return false;
        }
        if !self.types.is_empty() && !self.types.iter().any(|t| t == &request.content_type) {
            return false;
        }
        match &self.id_prefixes {
            Some(prefixes) if !prefixes.is_empty() => {
                prefixes.iter().any(|prefix| request.id.starts_with(prefix))
            }
            _ => true,
        }
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip = ip;
        self
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/manifest.json", self.base_url)
    }

    /// `{base}/{resource}/{type}/{id}[/{extras}].json` with the id URL-encoded
    pub fn resource_url(&self, request: &ResourceRequest) -> String {
        let id = urlencoding::encode(&request.id);
        match &request.extras {
            Some(extras) if !extras.is_empty() => format!(
                "{}/{}/{}/{}/{}.json",
                self.base_url, request.resource, request.content_type, id, extras
            ),
            _ => format!(
                "{}/{}/{}/{}.json",
                self.base_url, request.resource, request.content_type, id
            ),
        }
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/manifest.json")
        .unwrap_or(trimmed)
        .to_string()
}

/// Type id plus a short digest of the resolved options, so two differently
/// configured instances of one source type never collide.
fn instance_id(source_type: &str, base_url: &str, headers: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base_url.as_bytes());
    for (name, value) in headers {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b";");
    }
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}", source_type, &digest[..8])
}

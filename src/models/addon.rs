//! Addon wire protocol types
//!
//! Upstream manifests and stream lists are deserialised into these structs and
//! checked with explicit `validate` functions; the outbound `WireStream` is
//! what the aggregator itself serves.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One resource request, e.g. `stream/movie/tt0111161`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub resource: String,
    pub content_type: String,
    pub id: String,
    pub extras: Option<String>,
}

impl ResourceRequest {
    pub fn stream(content_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource: "stream".to_string(),
            content_type: content_type.into(),
            id: id.into(),
            extras: None,
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self.content_type.as_str(), "series" | "anime")
    }

    pub fn is_movie(&self) -> bool {
        self.content_type == "movie"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    pub id: Option<String>,
    pub url: String,
    pub lang: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyHeaders {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<BTreeMap<String, String>>,
}

/// `behaviorHints` as sent by upstream addons
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBehaviorHints {
    pub filename: Option<String>,
    pub video_size: Option<u64>,
    pub folder_size: Option<u64>,
    pub binge_group: Option<String>,
    pub proxy_headers: Option<ProxyHeaders>,
    pub not_web_ready: Option<bool>,
    pub video_hash: Option<String>,
}

/// One stream entry as sent by an upstream addon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStream {
    pub url: Option<String>,
    pub yt_id: Option<String>,
    pub info_hash: Option<String>,
    pub file_idx: Option<u32>,
    pub external_url: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub size: Option<u64>,
    pub subtitles: Option<Vec<Subtitle>>,
    pub sources: Option<Vec<String>>,
    pub behavior_hints: Option<RawBehaviorHints>,
}

impl RawStream {
    /// `description` is the modern field, `title` the legacy one
    pub fn description_text(&self) -> &str {
        self.description
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or_default()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn hints(&self) -> Option<&RawBehaviorHints> {
        self.behavior_hints.as_ref()
    }
}

/// A manifest resource is either a bare name or a detailed object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestResource {
    Name(String),
    Detailed {
        name: String,
        types: Option<Vec<String>>,
        #[serde(rename = "idPrefixes")]
        id_prefixes: Option<Vec<String>>,
    },
}

impl ManifestResource {
    pub fn name(&self) -> &str {
        match self {
            ManifestResource::Name(name) => name,
            ManifestResource::Detailed { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub resources: Vec<ManifestResource>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub id_prefixes: Option<Vec<String>>,
    #[serde(default)]
    pub catalogs: Vec<serde_json::Value>,
}

impl Manifest {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("manifest id is empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("manifest name is empty".to_string());
        }
        if self.resources.is_empty() {
            return Err("manifest declares no resources".to_string());
        }
        Ok(())
    }

    pub fn resource_names(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.name().to_string()).collect()
    }

    /// Types for a resource: its own list when detailed, else the manifest's
    pub fn types_for(&self, resource: &str) -> Vec<String> {
        self.resources
            .iter()
            .find(|r| r.name() == resource)
            .and_then(|r| match r {
                ManifestResource::Detailed { types, .. } => types.clone(),
                ManifestResource::Name(_) => None,
            })
            .unwrap_or_else(|| self.types.clone())
    }

    pub fn id_prefixes_for(&self, resource: &str) -> Option<Vec<String>> {
        self.resources
            .iter()
            .find(|r| r.name() == resource)
            .and_then(|r| match r {
                ManifestResource::Detailed { id_prefixes, .. } => id_prefixes.clone(),
                ManifestResource::Name(_) => None,
            })
            .or_else(|| self.id_prefixes.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBehaviorHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binge_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_headers: Option<ProxyHeaders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_web_ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_hash: Option<String>,
}

/// Outbound stream, one per canonical record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStream {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_idx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yt_id: Option<String>,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub subtitles: Vec<Subtitle>,
    pub behavior_hints: WireBehaviorHints,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireStreamResponse {
    pub streams: Vec<WireStream>,
}

//! Addon protocol handlers
//!
//! `GET /manifest.json` describes this service; `GET /stream/{type}/{id}.json`
//! runs the pipeline for one title.

use axum::{
    Json,
    extract::{Path, State},
};
use std::collections::BTreeSet;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::models::{Manifest, ManifestResource, ResourceRequest, WireStreamResponse};
use crate::web::AppState;

const DEFAULT_TYPES: [&str; 2] = ["movie", "series"];

fn strip_json(segment: &str) -> &str {
    segment.strip_suffix(".json").unwrap_or(segment)
}

/// Our own manifest: the stream resource over every type a source declares
pub fn build_manifest(state: &AppState) -> Manifest {
    let web = &state.config.web;
    let declared: BTreeSet<String> = state
        .config
        .sources
        .iter()
        .filter(|source| source.enabled)
        .filter_map(|source| source.types.clone())
        .flatten()
        .collect();
    let types = if declared.is_empty() {
        DEFAULT_TYPES.iter().map(|t| t.to_string()).collect()
    } else {
        declared.into_iter().collect()
    };

    Manifest {
        id: web.addon_id.clone(),
        name: web.addon_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: Some(format!(
            "Aggregated streams from {} sources",
            state.config.sources.len()
        )),
        resources: vec![ManifestResource::Name("stream".to_string())],
        types,
        id_prefixes: None,
        catalogs: Vec::new(),
    }
}

pub async fn manifest(State(state): State<AppState>) -> Json<Manifest> {
    Json(build_manifest(&state))
}

pub async fn streams(
    State(state): State<AppState>,
    Path((content_type, id)): Path<(String, String)>,
) -> AppResult<Json<WireStreamResponse>> {
    run(&state, ResourceRequest::stream(content_type, strip_json(&id))).await
}

pub async fn streams_with_extras(
    State(state): State<AppState>,
    Path((content_type, id, extras)): Path<(String, String, String)>,
) -> AppResult<Json<WireStreamResponse>> {
    let mut request = ResourceRequest::stream(content_type, id);
    request.extras = Some(strip_json(&extras).to_string());
    run(&state, request).await
}

async fn run(state: &AppState, request: ResourceRequest) -> AppResult<Json<WireStreamResponse>> {
    if request.id.trim().is_empty() {
        return Err(AppError::validation("content id is empty"));
    }
    debug!("Stream request {}/{}", request.content_type, request.id);
    let response = state.service.streams(&request).await?;
    Ok(Json(response))
}

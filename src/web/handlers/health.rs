use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::web::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let enabled = state.config.sources.iter().filter(|s| s.enabled).count();
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sources": enabled,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

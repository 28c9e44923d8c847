//! Error responses
//!
//! Pipeline errors become a single JSON body `{"error": ..., "fatal": ...}`
//! with a status code chosen by error category.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::errors::{AppError, ProxyError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub fatal: bool,
}

pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::Proxy(ProxyError::PublicIpUnavailable { .. }) => StatusCode::BAD_GATEWAY,
        AppError::Validation { .. } => StatusCode::BAD_REQUEST,
        AppError::Source(_) | AppError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
            fatal: self.is_fatal(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let fatal = AppError::from(ProxyError::PublicIpUnavailable {
            backend: "mediaflow".into(),
            attempts: 3,
        });
        assert_eq!(status_for(&fatal), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&AppError::validation("bad id")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AppError::internal("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let upstream = AppError::from(crate::errors::SourceError::Timeout {
            url: "https://addon.example".into(),
        });
        assert_eq!(status_for(&upstream), StatusCode::BAD_GATEWAY);
    }
}

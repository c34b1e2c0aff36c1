use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("tracker rejected request with status {status}")]
    Upstream { status: u16, detail: String },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MissingTitle => AppError::Validation("epic_title is required".into()),
            PipelineError::EpicRejected { status, detail } => AppError::Upstream { status, detail },
            PipelineError::EpicTransport(msg) => {
                AppError::Internal(anyhow::anyhow!("epic creation transport failure: {}", msg))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "error": "unauthorized",
                    "message": "missing, invalid or expired credential",
                }),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                json!({ "error": "request body too large" }),
            ),
            AppError::Upstream { status, detail } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": format!("failed to create epic: tracker returned {}", status),
                    "details": detail,
                }),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };

        let mut response = (status, Json(body)).into_response();

        if matches!(self, AppError::Unauthorized) {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}

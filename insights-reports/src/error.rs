//! HTTP error mapping for insights-reports

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::pipeline::PipelineError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Stage run failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// insights-common error
    #[error(transparent)]
    Common(#[from] insights_common::Error),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Pipeline(err) => match err {
                PipelineError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
                PipelineError::MissingDependency(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "MISSING_DEPENDENCY")
                }
                PipelineError::PromptMissing(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "PROMPT_MISSING")
                }
                PipelineError::Generation(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "GENERATION_FAILED")
                }
                PipelineError::UnexpectedOutput { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "UNEXPECTED_OUTPUT")
                }
                PipelineError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            },
            ApiError::Common(err) => match err {
                insights_common::Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                insights_common::Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        let message = self.to_string();

        if status.is_server_error() {
            error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

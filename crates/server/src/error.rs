use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use dealscope_core::errors::{EvaluationError, IngestionError, InputError};

/// HTTP-facing error shape. LLM and cache/log failures never reach here;
/// agents fold those into degraded payloads.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    UpstreamUnreachable(String),
    TooManyRequests,
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::BadRequest(message)
            | Self::NotFound(message)
            | Self::UpstreamUnreachable(message)
            | Self::Internal(message) => message.clone(),
            Self::TooManyRequests => "rate limit exceeded, retry later".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<InputError> for ApiError {
    fn from(error: InputError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl From<IngestionError> for ApiError {
    fn from(error: IngestionError) -> Self {
        match &error {
            IngestionError::UnreachableUrl { .. } => Self::UpstreamUnreachable(error.to_string()),
            _ => Self::BadRequest(error.to_string()),
        }
    }
}

impl From<EvaluationError> for ApiError {
    fn from(error: EvaluationError) -> Self {
        match error {
            EvaluationError::Input(input) => input.into(),
            EvaluationError::Ingestion(ingestion) => ingestion.into(),
            EvaluationError::ReportStore(message) => Self::Internal(message),
        }
    }
}

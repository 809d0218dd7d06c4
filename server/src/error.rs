use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use avatar_core::AvatarError;
use tts_core::DispatchError;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Rate limit exceeded. Try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    SynthesisFailed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Avatar service unavailable: {0}")]
    AvatarUnavailable(String),

    #[error("Avatar service error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::SynthesisFailed(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AvatarUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::SynthesisFailed(msg) => tracing::error!("Synthesis failed: {}", msg),
            ApiError::InternalError(msg) => tracing::error!("Internal error: {}", msg),
            ApiError::Upstream(msg) => tracing::warn!("Avatar upstream error: {}", msg),
            _ => {}
        }

        let retry_after = match &self {
            ApiError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let body = Json(ErrorResponse {
            status: "error",
            message: self.to_string(),
            code: status.as_u16(),
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::InvalidRequest(msg) => ApiError::InvalidInput(msg),
            failed @ DispatchError::SynthesisFailed(_) => ApiError::SynthesisFailed(failed.to_string()),
        }
    }
}

impl From<AvatarError> for ApiError {
    fn from(err: AvatarError) -> Self {
        if matches!(err, AvatarError::MissingApiKey) {
            ApiError::AvatarUnavailable(err.to_string())
        } else {
            ApiError::Upstream(err.to_string())
        }
    }
}

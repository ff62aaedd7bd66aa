use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tasbridge_core::{BridgeError, ValidationError};

/// Failure returned to an HTTP caller.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid API key")]
    Unauthorized,

    #[error("{context}: {source}")]
    Validation {
        context: &'static str,
        source: ValidationError,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("bridge unavailable: {0}")]
    Unavailable(#[from] BridgeError),
}

impl ApiError {
    pub fn validation(context: &'static str) -> impl FnOnce(ValidationError) -> Self {
        move |source| Self::Validation { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Validation { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

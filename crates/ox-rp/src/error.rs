//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use ox_core::Error;

/// Wrapper turning core errors into HTTP responses.
#[derive(Debug)]
pub struct RpError(pub Error);

impl From<Error> for RpError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable error code.
    pub error: String,
    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

const fn error_code(err: &Error) -> &'static str {
    match err {
        Error::NotFound(_) => "not_found",
        Error::Forbidden(_) => "forbidden",
        Error::Validation(_) => "invalid_request",
        Error::Upstream(_) => "upstream_error",
        Error::Transport(_) => "server_error",
    }
}

impl IntoResponse for RpError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: error_code(&self.0).to_string(),
            error_description: Some(self.0.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for HTTP handlers.
pub type HandlerResult<T> = std::result::Result<T, RpError>;

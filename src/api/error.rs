use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::SharplineError;

/// Handler error: a status code plus a `{"error": ...}` body
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<SharplineError> for ApiError {
    fn from(err: SharplineError) -> Self {
        let status = match &err {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            SharplineError::NotFound(_) => StatusCode::NOT_FOUND,
            SharplineError::Upstream { .. } | SharplineError::Http(_) => StatusCode::BAD_GATEWAY,
            SharplineError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %err, status = status.as_u16(), "request failed");
        } else {
            warn!(error = %err, status = status.as_u16(), "request rejected");
        }

        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                SharplineError::invalid_filter("era", "bad"),
                StatusCode::BAD_REQUEST,
            ),
            (
                SharplineError::Validation("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (SharplineError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                SharplineError::Upstream {
                    status: 429,
                    message: "quota".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                SharplineError::Config(config::ConfigError::NotFound("odds.api_key".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                SharplineError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn test_upstream_message_keeps_status() {
        let err = ApiError::from(SharplineError::Upstream {
            status: 404,
            message: "Polymarket: missing".into(),
        });
        assert!(err.message.contains("404"));
    }
}

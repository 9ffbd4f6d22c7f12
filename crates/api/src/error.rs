//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use selection::SelectionError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Trip selection error.
    Selection(SelectionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, retryable, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", false, msg),
            ApiError::Selection(err) => selection_error_to_response(err),
        };

        let body = serde_json::json!({
            "error": message,
            "code": code,
            "retryable": retryable,
        });
        (status, axum::Json(body)).into_response()
    }
}

fn selection_error_to_response(err: SelectionError) -> (StatusCode, &'static str, bool, String) {
    let status = match &err {
        SelectionError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
        SelectionError::DuplicateInFlight { .. } => StatusCode::TOO_MANY_REQUESTS,
        SelectionError::UpstreamCartInvalid { .. } => StatusCode::CONFLICT,
        SelectionError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
    };
    let message = match &err {
        SelectionError::UpstreamCartInvalid { .. } => {
            tracing::warn!(error = %err, "cart invalidated, caller must restart selection");
            format!("{err}. Please restart your selection.")
        }
        SelectionError::UpstreamUnavailable(_) => {
            tracing::error!(error = %err, "trip selection failed upstream");
            err.to_string()
        }
        _ => err.to_string(),
    };
    (status, err.code(), err.is_retryable(), message)
}

impl From<SelectionError> for ApiError {
    fn from(err: SelectionError) -> Self {
        ApiError::Selection(err)
    }
}

//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request body or a submit-path failure before background
    /// work starts
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("the requested resource could not be found")]
    NotFound,

    /// Per-field validation failures
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            Self::Validation(fields) => json!({ "error": fields }),
            other => json!({ "error": other.to_string() }),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

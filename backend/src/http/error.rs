//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;
use crate::error::BridgeError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Repository(RepositoryError),
    Bridge(BridgeError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Repository(e @ RepositoryError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", e.to_string()))
            }
            AppError::Repository(e) => {
                let error = ApiError::new("REPOSITORY_ERROR", e.to_string());
                let error = match &e.context().path {
                    Some(path) => error.with_details(format!("file: {}", path.display())),
                    None => error,
                };
                (StatusCode::INTERNAL_SERVER_ERROR, error)
            }
            AppError::Bridge(e @ BridgeError::MissingLocation) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::new("LOCATION_UNAVAILABLE", e.to_string()),
            ),
            AppError::Bridge(e) => (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", e.to_string())),
        };

        (status, Json(error)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<BridgeError> for AppError {
    fn from(err: BridgeError) -> Self {
        AppError::Bridge(err)
    }
}

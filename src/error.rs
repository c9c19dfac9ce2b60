//! Error types for handlers.
//!
//! Every fallible handler returns `AppError`, which renders as a JSON body
//! `{ "error": "..." }` with the matching status code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AppError {
    /// Unknown resource or identity provider (404)
    #[error("Resource not found")]
    NotFound,

    /// No valid session (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Malformed or forged request, e.g. an OAuth state mismatch (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The identity provider refused or failed the exchange (502)
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session token could not be issued (500)
    #[error("Session error: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),

    /// The session expiry does not fit a timestamp (500)
    #[error("Session lifetime of {0}s is out of range")]
    SessionLifetime(i64),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Provider(err.to_string())
    }
}

/// ErrorBody
///
/// JSON body returned for every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Session(_) | AppError::SessionLifetime(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server-side failures are logged in full but not echoed to the client.
        let message = if status == StatusCode::BAD_GATEWAY {
            tracing::warn!(error = %self, "identity provider failure");
            "Identity provider unavailable".to_string()
        } else if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

//! services/api/src/error.rs
//!
//! Defines the error types of the API service: `ApiError` for startup
//! failures and `HttpError` for failures of a single request.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relevamiento_core::ports::PortError;
use relevamiento_core::validation::ValidationError;
use serde_json::json;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration could not be applied at startup.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// Per-request errors
//=========================================================================================

/// Error returned by a handler.
///
/// Client mistakes answer `{message}`; datastore failures answer
/// `{message, error}` where `message` names the operation that failed.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{message}: {source}")]
    Datastore {
        message: &'static str,
        #[source]
        source: PortError,
    },
}

pub type HttpResult<T> = Result<T, HttpError>;

impl HttpError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::BadRequest(message.into())
    }

    /// Maps a port failure of the operation described by `message`.
    ///
    /// Invalid input and missing rows keep their meaning; everything else is
    /// a datastore failure.
    pub fn from_port(message: &'static str, err: PortError) -> Self {
        match err {
            PortError::Invalid(reason) => HttpError::BadRequest(reason),
            PortError::NotFound(what) => HttpError::NotFound(what),
            source => HttpError::Datastore { message, source },
        }
    }
}

impl From<ValidationError> for HttpError {
    fn from(err: ValidationError) -> Self {
        HttpError::BadRequest(err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            HttpError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "message": message }))
            }
            HttpError::NotFound(message) => {
                (StatusCode::NOT_FOUND, json!({ "message": message }))
            }
            HttpError::Datastore { message, source } => {
                tracing::error!(error = %source, "{}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": message, "error": source.to_string() }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

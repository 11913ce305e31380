//! Application error types

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::services::CollaboratorError;

/// Application-wide error type
///
/// Handlers normally convert `Validation` and `Collaborator` variants into
/// a flash message plus redirect before they reach the response layer;
/// anything that falls through here is rendered as an error page.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid user input (missing field, bad extension, empty comment)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// External classification or summary service failed
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Database(ref e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                )
            }
            AppError::Io(ref e) => {
                tracing::error!("io error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                )
            }
            AppError::Collaborator(ref e) => {
                tracing::error!("collaborator error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error processing the image".to_string(),
                )
            }
            AppError::Internal(ref msg) => {
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                )
            }
        };

        let body = Html(format!(
            "<!DOCTYPE html><html><head><title>wildsnap</title></head>\
             <body><h1>{}</h1><p><a href=\"/\">Home</a></p></body></html>",
            crate::api::pages::escape_html(&message)
        ));

        (status, body).into_response()
    }
}

/// Result type for application operations
pub type AppResult<T> = Result<T, AppError>;

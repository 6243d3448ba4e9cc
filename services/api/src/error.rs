//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and its
//! mapping onto HTTP statuses. Every user-visible failure is a structured
//! JSON body with a success flag and a message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::ConfigError;
use rag_chat_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// An error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// A malformed multipart body.
    #[error("Multipart Error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    /// The per-client chat submission cap was hit.
    #[error("Too many requests")]
    RateLimited,

    /// A standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    /// The status each failure class surfaces as. Unknown accounts and
    /// duplicate registrations both report 401 so signin and signup
    /// redirect flows can key off one status.
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Port(port) => match port {
                PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                PortError::Unauthenticated => StatusCode::UNAUTHORIZED,
                PortError::Forbidden => StatusCode::FORBIDDEN,
                PortError::NotFound(_) | PortError::Conflict(_) => StatusCode::UNAUTHORIZED,
                PortError::Retrieval(_) | PortError::Generation(_) | PortError::Unexpected(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the client is told. Internal failures stay generic; input,
    /// auth and rate-limit failures can safely say what went wrong.
    fn public_message(&self) -> String {
        match self {
            ApiError::Port(PortError::InvalidInput(msg)) => msg.clone(),
            ApiError::Port(PortError::Unauthenticated) => {
                "Invalid or missing token. Please sign in.".to_string()
            }
            ApiError::Port(PortError::Forbidden) => {
                "Access denied. Admin privileges required.".to_string()
            }
            ApiError::Port(PortError::NotFound(_)) => {
                "Account does not exist. Please sign up first.".to_string()
            }
            ApiError::Port(PortError::Conflict(_)) => {
                "Account already registered. Please sign in.".to_string()
            }
            ApiError::Multipart(e) => format!("Malformed upload: {e}"),
            ApiError::RateLimited => "Too many chat requests. Please slow down.".to_string(),
            _ => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "success": false,
            "message": self.public_message(),
        }));
        (status, body).into_response()
    }
}

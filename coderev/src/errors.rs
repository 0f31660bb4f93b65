use crate::provider::ProviderError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Missing, empty, too-short, or non-code-looking input
    #[error("{message}")]
    Validation { message: String },

    /// Caller exceeded the request quota for the current window
    #[error("Too many requests. Please try again later.")]
    RateLimited,

    /// The AI provider call failed or returned an unusable shape
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::Provider(ProviderError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Error::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking provider detail
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message } => message.clone(),
            Error::RateLimited => "Too many requests. Please try again later.".to_string(),
            Error::Provider(ProviderError::Timeout { .. }) => "The review timed out. Please try again.".to_string(),
            Error::Provider(_) => "Failed to get AI review".to_string(),
            Error::Other(_) => "Internal Server Error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Provider(_) | Error::Other(_) => {
                tracing::error!("Review service error: {:#}", self);
            }
            Error::RateLimited => {
                tracing::info!("Rate limited: {}", self);
            }
            Error::Validation { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({
            "success": false,
            "error": self.user_message(),
        });

        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for entra-rp
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for plain-text HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Every variant is terminal for the request that produced it;
/// nothing is retried.
#[derive(Debug, Error)]
pub enum AppError {
    /// Callback state did not match the pending login (400)
    #[error("invalid state")]
    InvalidState,

    /// Provider redirected back with an `error` parameter (400)
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Authorization code exchange failed (500)
    #[error("token exchange failed: {0}")]
    Exchange(String),

    /// Token response carried no `id_token` (500)
    #[error("missing id_token")]
    MissingIdToken,

    /// ID token signature or claims rejected (500)
    #[error("token verification failed: {0}")]
    Verification(String),

    /// ID token claims could not be mapped to an identity (500)
    #[error("failed to parse claims: {0}")]
    ClaimParse(String),

    /// No valid session (401)
    #[error("unauthorized")]
    Unauthorized,

    /// Provider discovery or key fetch failed
    #[error("provider discovery failed: {0}")]
    Discovery(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Status code and metric label for this error
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidState => (StatusCode::BAD_REQUEST, "invalid_state"),
            AppError::AuthorizationDenied(_) => (StatusCode::BAD_REQUEST, "authorization_denied"),
            AppError::Exchange(_) => (StatusCode::INTERNAL_SERVER_ERROR, "exchange"),
            AppError::MissingIdToken => (StatusCode::INTERNAL_SERVER_ERROR, "missing_id_token"),
            AppError::Verification(_) => (StatusCode::INTERNAL_SERVER_ERROR, "verification"),
            AppError::ClaimParse(_) => (StatusCode::INTERNAL_SERVER_ERROR, "claim_parse"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Discovery(_) => (StatusCode::BAD_GATEWAY, "discovery"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to a plain-text HTTP response
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();

        let message = match &self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        } else {
            tracing::debug!(error = %self, error_type, "Request rejected");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        (status, message).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::domain::store::StoreError;

/// Auth service error variants mapped to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    BadInput(&'static str),
    #[error("invalid code")]
    InvalidCode,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("invalid device")]
    DeviceMismatch,
    #[error("team is full")]
    TeamFull,
    #[error("too many requests")]
    RateLimited,
    #[error("too many attempts")]
    Locked,
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            // Flows that can recover from a lost insert race handle this
            // variant before converting; reaching here means nothing did.
            StoreError::UniqueViolation => {
                Self::Internal(anyhow::anyhow!("unhandled unique constraint violation"))
            }
            StoreError::Other(e) => Self::Internal(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCode | Self::InvalidRefreshToken | Self::DeviceMismatch => {
                StatusCode::UNAUTHORIZED
            }
            Self::TeamFull => StatusCode::CONFLICT,
            Self::RateLimited | Self::Locked => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Log 500s only — the trace layer already records method/uri/status
        // for every request, and 4xx are expected client outcomes.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, "internal error");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

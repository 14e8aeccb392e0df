//! Shared error taxonomy for the engine.
//!
//! Every component returns [`EngineError`] for user-initiated operations.
//! Background loops never propagate it outward: they log and continue.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::risk::LimitKind;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream auth failure: {0}")]
    AuthFailure(String),

    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("rate limited, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("risk rejected: {kind:?} (observed {observed}, limit {limit})")]
    RiskRejected {
        kind: LimitKind,
        observed: Decimal,
        limit: Decimal,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            EngineError::UpstreamFailure(err.to_string())
        } else if err.status().map(|s| s.as_u16()) == Some(429) {
            EngineError::RateLimited {
                retry_after_secs: None,
            }
        } else {
            EngineError::UpstreamFailure(err.to_string())
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Internal(format!("store error: {err}"))
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::BadInput(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            EngineError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            EngineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            EngineError::RiskRejected { .. } => StatusCode::BAD_REQUEST,
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: format!("{self:?}")
                .split(['(', ' '])
                .next()
                .unwrap_or("Internal")
                .to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

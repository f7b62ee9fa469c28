//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Map proxy failures to HTTP status codes
//! - Render every failure as `{"error": "<reason>"}`
//! - Classify request outcomes for logs and metrics
//!
//! # Design Decisions
//! - Upstream timeouts result in 504 Gateway Timeout
//! - Other transport failures result in 502 Bad Gateway
//! - Internal error details are logged, never sent to the client

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::RouteError;

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// Build a JSON error response.
pub fn error_response(status: StatusCode, reason: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: reason.to_string(),
        }),
    )
        .into_response()
}

/// Failures after admission.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Target could not be resolved from the request.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Upstream did not produce response headers in time.
    #[error("upstream did not respond within {0} ms")]
    Timeout(u64),

    /// Upstream unreachable, refused, or reset.
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// Anything not classified above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Route(e) => e.status(),
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Transport(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    pub fn public_message(&self) -> String {
        match self {
            ProxyError::Route(e) => e.to_string(),
            ProxyError::Timeout(_) => "Upstream request timed out".to_string(),
            ProxyError::Transport(_) => "Upstream request failed".to_string(),
            ProxyError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Metric / log label.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Route(_) => "route",
            ProxyError::Timeout(_) => "timeout",
            ProxyError::Transport(_) => "transport",
            ProxyError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        error_response(self.status(), &self.public_message())
    }
}

/// Final classification of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyOutcome {
    Forwarded,
    Rejected,
    Failed,
}

impl ProxyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyOutcome::Forwarded => "forwarded",
            ProxyOutcome::Rejected => "rejected",
            ProxyOutcome::Failed => "failed",
        }
    }
}

//! Shared-secret API key check.

use axum::http::{HeaderName, StatusCode};
use futures_util::future::BoxFuture;

use crate::security::gate::{Gate, InboundRequest, Rejection, RejectionKind, Verdict};

/// Header the client presents its key in.
pub const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

pub struct ApiKeyGate {
    expected: String,
}

impl ApiKeyGate {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

/// Constant-time byte comparison. Runs over the longer input so the
/// timing does not reveal where (or whether) lengths differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len_eq = a.len() == b.len();
    let max_len = a.len().max(b.len());
    let mut diff = 0u8;

    for i in 0..max_len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= x ^ y;
    }

    len_eq && diff == 0
}

impl Gate for ApiKeyGate {
    fn name(&self) -> &'static str {
        "api_key"
    }

    fn check<'a>(&'a self, request: &'a mut InboundRequest) -> BoxFuture<'a, Verdict> {
        let presented = request
            .parts
            .headers
            .get(X_API_KEY)
            .map(|v| v.as_bytes())
            .unwrap_or_default();

        let verdict = if constant_time_eq(presented, self.expected.as_bytes()) {
            Verdict::Admit
        } else {
            Verdict::Reject(Rejection::new(
                RejectionKind::Unauthorized,
                StatusCode::UNAUTHORIZED,
                "Invalid or missing API key",
            ))
        };
        Box::pin(async move { verdict })
    }
}

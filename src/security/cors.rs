//! Origin / CORS policy.
//!
//! The gate answers preflight requests itself; every other request passes
//! through. The `Access-Control-*` headers on ordinary responses are set by
//! the response-header layers built from the same policy in `http::server`.

use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use futures_util::future::BoxFuture;

use crate::config::SecurityConfig;
use crate::security::gate::{Gate, InboundRequest, Rejection, RejectionKind, Verdict};

/// Methods advertised on preflight responses.
pub const ALLOWED_METHODS: &str = "GET, HEAD, PUT, PATCH, POST, DELETE, OPTIONS";

/// Request headers the browser may send.
pub const ALLOWED_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept, X-API-Key";

/// Headers attached to every response.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_origin: String,
}

impl CorsPolicy {
    pub fn new(allow_origin: impl Into<String>) -> Self {
        Self {
            allow_origin: allow_origin.into(),
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.allowed_origin.clone())
    }

    /// (name, value) pairs to set on responses that lack them.
    pub fn response_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let mut headers = vec![(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        )];
        // Validated at startup; an invalid origin simply isn't advertised.
        if let Ok(origin) = HeaderValue::from_str(&self.allow_origin) {
            headers.push((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin));
        }
        headers
    }
}

/// Short-circuits CORS preflight requests with 204. Never rejects on the
/// origin value itself.
pub struct CorsGate;

/// An OPTIONS request announcing the method it intends to use.
pub fn is_preflight(request: &InboundRequest) -> bool {
    request.parts.method == Method::OPTIONS
        && request
            .parts
            .headers
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

impl Gate for CorsGate {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn check<'a>(&'a self, request: &'a mut InboundRequest) -> BoxFuture<'a, Verdict> {
        let verdict = if is_preflight(request) {
            Verdict::Reject(Rejection::new(
                RejectionKind::Preflight,
                StatusCode::NO_CONTENT,
                "CORS preflight",
            ))
        } else {
            Verdict::Admit
        };
        Box::pin(async move { verdict })
    }
}

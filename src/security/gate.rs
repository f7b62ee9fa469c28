//! Admission gates and the chain that runs them.
//!
//! # Responsibilities
//! - Define the `Gate` capability: inspect a request, admit or reject it
//! - Run gates in a fixed order, stopping at the first rejection
//! - Log every rejection with its reason and the client IP
//!
//! # Design Decisions
//! - Gates are independent objects; the chain is a plain ordered list
//! - A rejection carries everything needed to build the client response
//! - Later gates never observe a request an earlier gate rejected

use std::net::IpAddr;

use axum::{
    body::Body,
    http::{request::Parts, HeaderValue, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;

use crate::config::ProxyConfig;
use crate::http::response::error_response;
use crate::observability::metrics;
use crate::security::api_key::ApiKeyGate;
use crate::security::cors::CorsGate;
use crate::security::headers::resolve_client_ip;
use crate::security::ip_allowlist::IpAllowlistGate;
use crate::security::limits::PayloadSizeGate;
use crate::security::rate_limit::{RateLimitGate, RateLimiter};

/// A request as seen by the admission pipeline.
///
/// Everything except `body` is read-only for gates; the payload gate may
/// swap the body for its buffered copy.
#[derive(Debug)]
pub struct InboundRequest {
    pub parts: Parts,
    pub body: Body,
    /// Client address (socket peer or trusted forwarded-for entry).
    pub client_ip: IpAddr,
}

impl InboundRequest {
    pub fn new(request: Request<Body>, peer: IpAddr, trust_proxy_headers: bool) -> Self {
        let (parts, body) = request.into_parts();
        let client_ip = resolve_client_ip(&parts.headers, peer, trust_proxy_headers);
        Self {
            parts,
            body,
            client_ip,
        }
    }
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// CORS preflight answered by the proxy itself.
    Preflight,
    PayloadTooLarge,
    RateLimited,
    Unauthorized,
    Forbidden,
    /// Body could not be read from the client while the size gate was
    /// buffering it. Answered 400 rather than 413.
    BadRequest,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::Preflight => "preflight",
            RejectionKind::PayloadTooLarge => "payload_too_large",
            RejectionKind::RateLimited => "rate_limited",
            RejectionKind::Unauthorized => "unauthorized",
            RejectionKind::Forbidden => "forbidden",
            RejectionKind::BadRequest => "bad_request",
        }
    }
}

/// Short-circuit produced by a gate.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub status: StatusCode,
    pub reason: String,
    /// Seconds until the client may retry (429 only).
    pub retry_after: Option<u64>,
}

impl Rejection {
    pub fn new(kind: RejectionKind, status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            reason: reason.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        if self.kind == RejectionKind::Preflight {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = self.status;
            response.headers_mut().insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(crate::security::cors::ALLOWED_METHODS),
            );
            return response;
        }

        let mut response = error_response(self.status, &self.reason);
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Outcome of one gate.
#[derive(Debug)]
pub enum Verdict {
    Admit,
    Reject(Rejection),
}

/// A single admission check.
pub trait Gate: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn check<'a>(&'a self, request: &'a mut InboundRequest) -> BoxFuture<'a, Verdict>;
}

/// Ordered list of gates evaluated fail-fast.
pub struct GateChain {
    gates: Vec<Box<dyn Gate>>,
}

impl GateChain {
    pub fn new(gates: Vec<Box<dyn Gate>>) -> Self {
        Self { gates }
    }

    /// Standard chain: origin, payload size, rate limit, API key, IP allowlist.
    /// The last two are only present when configured.
    pub fn from_config(config: &ProxyConfig) -> Self {
        let security = &config.security;
        let mut gates: Vec<Box<dyn Gate>> = vec![
            Box::new(CorsGate),
            Box::new(PayloadSizeGate::new(security.max_body_size)),
            Box::new(RateLimitGate::new(RateLimiter::new(
                config.rate_limit.window(),
                config.rate_limit.max_requests,
            ))),
        ];

        if let Some(key) = &security.api_key {
            gates.push(Box::new(ApiKeyGate::new(key.clone())));
        }
        if let Some(allowed) = &security.ip_allowlist {
            gates.push(Box::new(IpAllowlistGate::new(allowed.iter().copied())));
        }

        Self::new(gates)
    }

    /// Names of the active gates, in evaluation order.
    pub fn gate_names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Run every gate until one rejects.
    pub async fn run(&self, request: &mut InboundRequest) -> Verdict {
        for gate in &self.gates {
            if let Verdict::Reject(rejection) = gate.check(request).await {
                if rejection.kind == RejectionKind::Preflight {
                    tracing::debug!(
                        client_ip = %request.client_ip,
                        path = %request.parts.uri.path(),
                        "Answered CORS preflight"
                    );
                } else {
                    tracing::warn!(
                        gate = gate.name(),
                        client_ip = %request.client_ip,
                        status = rejection.status.as_u16(),
                        reason = %rejection.reason,
                        "Request rejected"
                    );
                }
                metrics::record_rejection(rejection.kind.as_str());
                return Verdict::Reject(rejection);
            }
        }
        Verdict::Admit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed {
        name: &'static str,
        verdict: fn() -> Verdict,
        calls: Arc<AtomicUsize>,
    }

    impl Gate for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn check<'a>(&'a self, _request: &'a mut InboundRequest) -> BoxFuture<'a, Verdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { (self.verdict)() })
        }
    }

    fn inbound() -> InboundRequest {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        InboundRequest::new(request, "127.0.0.1".parse().unwrap(), false)
    }

    #[tokio::test]
    async fn first_rejection_stops_the_chain() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));

        let chain = GateChain::new(vec![
            Box::new(Fixed { name: "a", verdict: || Verdict::Admit, calls: first.clone() }),
            Box::new(Fixed {
                name: "b",
                verdict: || {
                    Verdict::Reject(Rejection::new(
                        RejectionKind::Forbidden,
                        StatusCode::FORBIDDEN,
                        "no",
                    ))
                },
                calls: second.clone(),
            }),
            Box::new(Fixed { name: "c", verdict: || Verdict::Admit, calls: third.clone() }),
        ]);

        let verdict = chain.run(&mut inbound()).await;
        assert!(matches!(verdict, Verdict::Reject(r) if r.status == StatusCode::FORBIDDEN));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_chain_admits() {
        let chain = GateChain::new(Vec::new());
        assert!(matches!(chain.run(&mut inbound()).await, Verdict::Admit));
    }

    #[test]
    fn optional_gates_follow_config() {
        let mut config = ProxyConfig::default();
        assert_eq!(
            GateChain::from_config(&config).gate_names(),
            vec!["cors", "payload_size", "rate_limit"]
        );

        config.security.api_key = Some("secret".into());
        config.security.ip_allowlist = Some(vec!["10.0.0.1".parse().unwrap()]);
        assert_eq!(
            GateChain::from_config(&config).gate_names(),
            vec!["cors", "payload_size", "rate_limit", "api_key", "ip_allowlist"]
        );
    }

    #[test]
    fn rate_limited_rejection_sets_retry_after() {
        let response = Rejection::new(
            RejectionKind::RateLimited,
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests",
        )
        .with_retry_after(12)
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");
    }
}

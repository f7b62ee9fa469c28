//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite an admitted request for its resolved target
//! - Stream request and response bodies without buffering
//! - Enforce the forward timeout on connect + response headers
//! - Classify transport failures (504 timeout, 502 everything else)
//! - Hand protocol upgrades to the WebSocket relay
//!
//! # Design Decisions
//! - No retries: a failed attempt is reported as-is
//! - The attempt future is dropped on timeout, which closes the upstream
//!   connection on every exit path
//! - Upstream requests always use HTTP/1.1 framing

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Extensions, HeaderValue, Request, StatusCode, Uri, Version},
    response::Response,
};
use hyper::upgrade::OnUpgrade;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::response::ProxyError;
use crate::http::websocket;
use crate::security::api_key::X_API_KEY;
use crate::security::gate::InboundRequest;
use crate::security::headers::{add_forwarding_headers, is_upgrade_request, strip_hop_by_hop};

pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Sends admitted requests to their resolved target.
pub struct Forwarder {
    client: UpstreamClient,
    timeout: Duration,
}

impl Forwarder {
    /// Build a forwarder whose connect + response-header budget is `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, rustls::Error> {
        // Connect time is bounded by the outer timeout in `forward`, so a
        // stalled connect is reported as a timeout.
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);

        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new()).build(https);
        Ok(Self { client, timeout })
    }

    /// Forward `inbound` to `target` and relay the upstream response.
    pub async fn forward(&self, inbound: InboundRequest, target: Uri) -> Result<Response, ProxyError> {
        let InboundRequest {
            mut parts,
            body,
            client_ip,
        } = inbound;

        let upgrade = is_upgrade_request(&parts.headers);
        let client_upgrade = if upgrade {
            parts.extensions.remove::<OnUpgrade>()
        } else {
            None
        };

        strip_hop_by_hop(&mut parts.headers, upgrade);
        parts.headers.remove(X_API_KEY);
        add_forwarding_headers(&mut parts.headers, client_ip);
        if let Some(host) = target
            .authority()
            .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        {
            parts.headers.insert(header::HOST, host);
        }

        parts.uri = target.clone();
        parts.version = Version::HTTP_11;
        parts.extensions = Extensions::new();
        let request = Request::from_parts(parts, body);

        let mut response = match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Err(_) => return Err(ProxyError::Timeout(self.timeout.as_millis() as u64)),
            Ok(Err(e)) if is_timeout(&e) => {
                return Err(ProxyError::Timeout(self.timeout.as_millis() as u64))
            }
            Ok(Err(e)) => return Err(ProxyError::Transport(describe_error(&e))),
            Ok(Ok(response)) => response,
        };

        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
            match client_upgrade {
                Some(client_upgrade) => {
                    let upstream_upgrade = hyper::upgrade::on(&mut response);
                    tokio::spawn(websocket::relay(client_upgrade, upstream_upgrade, target));
                }
                None => {
                    return Err(ProxyError::Internal(
                        "upstream switched protocols without a client upgrade".to_string(),
                    ));
                }
            }
            let (parts, _) = response.into_parts();
            return Ok(Response::from_parts(parts, Body::empty()));
        }

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers, false);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// True when the OS reported a timeout anywhere in the error chain.
fn is_timeout(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(error);
    while let Some(cause) = source {
        if cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::TimedOut)
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Flatten an error and its sources into one line.
fn describe_error(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

//! Request body size limit.
//!
//! # Responsibilities
//! - Enforce maximum request body size
//! - Return 413 Payload Too Large without contacting the upstream
//!
//! # Design Decisions
//! - A declared Content-Length over the limit is rejected before any body
//!   byte is read; a declared length within the limit streams through
//!   untouched (hyper enforces the declared length)
//! - Bodies without a declared length are buffered up to the limit, so the
//!   cap holds before the forwarder ever sees them
//! - A client body that fails mid-read while buffering is answered 400
//!   (`RejectionKind::BadRequest`); it is a client fault, not a size
//!   verdict

use axum::{
    body::Body,
    http::{header, StatusCode},
};
use futures_util::future::BoxFuture;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body as HttpBody;

use crate::security::gate::{Gate, InboundRequest, Rejection, RejectionKind, Verdict};

pub struct PayloadSizeGate {
    max_bytes: u64,
}

impl PayloadSizeGate {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    fn too_large(&self) -> Verdict {
        Verdict::Reject(Rejection::new(
            RejectionKind::PayloadTooLarge,
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Request body exceeds the {} byte limit", self.max_bytes),
        ))
    }
}

fn declared_length(request: &InboundRequest) -> Option<u64> {
    request
        .parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

impl Gate for PayloadSizeGate {
    fn name(&self) -> &'static str {
        "payload_size"
    }

    fn check<'a>(&'a self, request: &'a mut InboundRequest) -> BoxFuture<'a, Verdict> {
        Box::pin(async move {
            if let Some(length) = declared_length(request) {
                return if length > self.max_bytes {
                    self.too_large()
                } else {
                    Verdict::Admit
                };
            }

            let hint = request.body.size_hint();
            if request.body.is_end_stream() || hint.upper() == Some(0) {
                return Verdict::Admit;
            }
            if hint.lower() > self.max_bytes {
                return self.too_large();
            }

            // Unknown length: read up to the limit before admitting.
            let body = std::mem::take(&mut request.body);
            let limit = usize::try_from(self.max_bytes).unwrap_or(usize::MAX);
            match Limited::new(body, limit).collect().await {
                Ok(collected) => {
                    request.body = Body::from(collected.to_bytes());
                    Verdict::Admit
                }
                Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => self.too_large(),
                Err(e) => {
                    tracing::debug!(error = %e, "Failed to read request body");
                    Verdict::Reject(Rejection::new(
                        RejectionKind::BadRequest,
                        StatusCode::BAD_REQUEST,
                        "Failed to read request body",
                    ))
                }
            }
        })
    }
}

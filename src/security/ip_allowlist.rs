//! Client IP allowlist.

use std::collections::HashSet;
use std::net::IpAddr;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;

use crate::security::gate::{Gate, InboundRequest, Rejection, RejectionKind, Verdict};

pub struct IpAllowlistGate {
    allowed: HashSet<IpAddr>,
}

impl IpAllowlistGate {
    pub fn new(allowed: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|ip| ip.to_canonical()).collect(),
        }
    }

    pub fn allows(&self, ip: IpAddr) -> bool {
        self.allowed.contains(&ip.to_canonical())
    }
}

impl Gate for IpAllowlistGate {
    fn name(&self) -> &'static str {
        "ip_allowlist"
    }

    fn check<'a>(&'a self, request: &'a mut InboundRequest) -> BoxFuture<'a, Verdict> {
        let verdict = if self.allows(request.client_ip) {
            Verdict::Admit
        } else {
            Verdict::Reject(Rejection::new(
                RejectionKind::Forbidden,
                StatusCode::FORBIDDEN,
                "Access denied",
            ))
        };
        Box::pin(async move { verdict })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn membership() {
        let gate = IpAllowlistGate::new([ip("10.0.0.1"), ip("::1")]);
        assert!(gate.allows(ip("10.0.0.1")));
        assert!(gate.allows(ip("::1")));
        assert!(gate.allows(ip("::ffff:10.0.0.1")));
        assert!(!gate.allows(ip("10.0.0.2")));
    }

    #[tokio::test]
    async fn rejects_unknown_client_with_403() {
        let gate = IpAllowlistGate::new([ip("10.0.0.1")]);
        let mut request = InboundRequest::new(
            axum::http::Request::builder()
                .uri("/")
                .body(axum::body::Body::empty())
                .unwrap(),
            ip("10.0.0.9"),
            false,
        );
        match gate.check(&mut request).await {
            Verdict::Reject(r) => assert_eq!(r.status, StatusCode::FORBIDDEN),
            Verdict::Admit => panic!("unlisted client must be rejected"),
        }
    }
}

//! Header manipulation for proxied traffic.
//!
//! # Responsibilities
//! - Resolve the client IP (socket peer or trusted X-Forwarded-For)
//! - Add X-Forwarded-For / X-Forwarded-Host to upstream requests
//! - Strip hop-by-hop headers in both directions
//!
//! # Design Decisions
//! - Existing X-Forwarded-For is only trusted when configured
//! - Upgrade headers survive when a protocol switch is requested

use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Header carrying the original client chain.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
/// Header carrying the Host the client asked for.
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::PROXY_AUTHORIZATION,
    header::PROXY_AUTHENTICATE,
];

/// Resolve the address a request should be attributed to.
///
/// With `trust_proxy_headers`, the left-most parseable entry of
/// `x-forwarded-for` wins; otherwise (or when absent) the socket peer.
pub fn resolve_client_ip(headers: &HeaderMap, peer: IpAddr, trust_proxy_headers: bool) -> IpAddr {
    let forwarded = trust_proxy_headers
        .then(|| headers.get(X_FORWARDED_FOR))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|chain| {
            chain
                .split(',')
                .map(str::trim)
                .find_map(|entry| entry.parse::<IpAddr>().ok())
        });

    forwarded.unwrap_or(peer).to_canonical()
}

/// True when the client asked to switch protocols (e.g., WebSocket).
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    connection_upgrade && headers.contains_key(header::UPGRADE)
}

/// Remove connection-scoped headers. `keep_upgrade` preserves the
/// `Connection`/`Upgrade` pair for protocol switches.
pub fn strip_hop_by_hop(headers: &mut HeaderMap, keep_upgrade: bool) {
    // Headers named in Connection are hop-by-hop as well.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .filter(|name| !(keep_upgrade && name == header::UPGRADE))
        .collect();
    for name in named {
        headers.remove(name);
    }

    for name in HOP_BY_HOP.iter() {
        if keep_upgrade && name == header::CONNECTION {
            continue;
        }
        headers.remove(name);
    }

    if keep_upgrade {
        headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    } else {
        headers.remove(header::UPGRADE);
    }
}

/// Append `client_ip` to X-Forwarded-For and record the original Host.
pub fn add_forwarding_headers(headers: &mut HeaderMap, client_ip: IpAddr) {
    let chain = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{}, {}", existing, client_ip),
        _ => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }

    if let Some(host) = headers.get(header::HOST).cloned() {
        headers.insert(X_FORWARDED_HOST, host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> IpAddr {
        "10.1.1.1".parse().unwrap()
    }

    #[test]
    fn ignores_forwarded_for_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"));

        assert_eq!(resolve_client_ip(&headers, peer(), false), peer());
        assert_eq!(
            resolve_client_ip(&headers, peer(), true),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn takes_leftmost_valid_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static("garbage, 198.51.100.4, 10.0.0.2"),
        );
        assert_eq!(
            resolve_client_ip(&headers, peer(), true),
            "198.51.100.4".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn canonicalises_mapped_ipv4() {
        let mapped: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        assert_eq!(
            resolve_client_ip(&HeaderMap::new(), mapped, false),
            "127.0.0.1".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn appends_to_existing_chain() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("198.51.100.4"));
        headers.insert(header::HOST, HeaderValue::from_static("proxy.local"));

        add_forwarding_headers(&mut headers, peer());

        assert_eq!(headers[X_FORWARDED_FOR], "198.51.100.4, 10.1.1.1");
        assert_eq!(headers[X_FORWARDED_HOST], "proxy.local");
    }

    #[test]
    fn strips_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        strip_hop_by_hop(&mut headers, false);

        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get("x-trace").is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(headers[header::ACCEPT], "*/*");
    }

    #[test]
    fn keeps_upgrade_pair_for_websocket() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));

        assert!(is_upgrade_request(&headers));
        strip_hop_by_hop(&mut headers, true);

        assert_eq!(headers[header::CONNECTION], "upgrade");
        assert_eq!(headers[header::UPGRADE], "websocket");
    }
}

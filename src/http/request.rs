//! Request inspection helpers.
//!
//! # Responsibilities
//! - Resolve the client IP used as the rate-limit key
//! - Strip hop-by-hop headers before forwarding
//!
//! # Design Decisions
//! - The peer address comes from `ConnectInfo<SocketAddr>`, inserted by the server
//! - `X-Forwarded-For` is only honoured when the operator opts in

use axum::extract::ConnectInfo;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::request::Parts;
use std::net::{IpAddr, SocketAddr};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Key used when neither a peer address nor a forwarded header is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Headers meaningful only for a single transport-level connection.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("proxy-connection"),
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

pub fn peer_addr(parts: &Parts) -> Option<SocketAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Resolve the client IP for `parts`.
///
/// With `trust_forwarded_for`, the first `X-Forwarded-For` entry wins over the
/// peer address. Parsable addresses are canonicalized so that exempt-list
/// lookups match regardless of notation.
pub fn client_ip(parts: &Parts, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = parts
            .headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return canonical_ip(ip);
        }
    }

    peer_addr(parts)
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn canonical_ip(ip: &str) -> String {
    ip.parse::<IpAddr>()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| ip.to_string())
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
///
/// `Upgrade` is removed as well; WebSocket upgrades never reach this path.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::try_from(name.trim()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove(header::UPGRADE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn parts_from(peer: Option<&str>, forwarded: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(forwarded) = forwarded {
            builder = builder.header(X_FORWARDED_FOR, forwarded);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        if let Some(peer) = peer {
            parts
                .extensions
                .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        }
        parts
    }

    #[test]
    fn test_peer_address() {
        let parts = parts_from(Some("10.1.2.3:5555"), Some("8.8.8.8"));
        assert_eq!(client_ip(&parts, false), "10.1.2.3");
    }

    #[test]
    fn test_forwarded_when_trusted() {
        let parts = parts_from(Some("10.1.2.3:5555"), Some(" 8.8.8.8 , 10.0.0.1"));
        assert_eq!(client_ip(&parts, true), "8.8.8.8");

        let parts = parts_from(Some("[::1]:80"), Some("0:0:0:0:0:0:0:1"));
        assert_eq!(client_ip(&parts, true), "::1");

        let parts = parts_from(Some("10.1.2.3:5555"), Some("not-an-ip"));
        assert_eq!(client_ip(&parts, true), "not-an-ip");
    }

    #[test]
    fn test_trusted_without_header_uses_peer() {
        let parts = parts_from(Some("[2001:db8::1]:443"), None);
        assert_eq!(client_ip(&parts, true), "2001:db8::1");
    }

    #[test]
    fn test_unknown_client() {
        assert_eq!(client_ip(&parts_from(None, None), false), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-secret"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-secret", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }
}

//! HTTP reverse proxy to the upstream JSON-RPC origin.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream origin
//! - Strip hop-by-hop headers, set `Host`, append `X-Forwarded-For`
//! - Hand the request to the transport and stream its response back
//! - Map upstream failures to 502 / 504

use axum::body::Body;
use axum::http::header::{self, HeaderValue};
use axum::http::{Request, Response, StatusCode, Uri, Version};
use std::sync::Arc;
use url::Url;

use crate::http::request::{peer_addr, strip_hop_by_hop, X_FORWARDED_FOR};
use crate::http::response::error_response;
use crate::http::transport::{Transport, UpstreamError};

/// Forwards every request to a single upstream origin.
pub struct ReverseProxy {
    upstream: Url,
    authority: String,
    transport: Arc<dyn Transport>,
}

impl ReverseProxy {
    pub fn new(upstream: Url, transport: Arc<dyn Transport>) -> Self {
        let authority = authority_of(&upstream);
        Self {
            upstream,
            authority,
            transport,
        }
    }

    pub async fn forward(&self, request: Request<Body>) -> Response<Body> {
        let (mut parts, body) = request.into_parts();

        parts.uri = match self.target_uri(&parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(uri = %parts.uri, error = %e, "Cannot build upstream URI");
                return error_response(StatusCode::BAD_REQUEST, "invalid request URI");
            }
        };
        parts.version = Version::HTTP_11;

        strip_hop_by_hop(&mut parts.headers);
        if let Ok(host) = HeaderValue::from_str(&self.authority) {
            parts.headers.insert(header::HOST, host);
        }
        if let Some(peer) = peer_addr(&parts) {
            let forwarded = match parts.headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
                Some(prior) => format!("{prior}, {}", peer.ip()),
                None => peer.ip().to_string(),
            };
            if let Ok(value) = HeaderValue::from_str(&forwarded) {
                parts.headers.insert(X_FORWARDED_FOR, value);
            }
        }

        match self.transport.round_trip(Request::from_parts(parts, body)).await {
            Ok(mut response) => {
                strip_hop_by_hop(response.headers_mut());
                response
            }
            Err(UpstreamError::Timeout(after)) => {
                tracing::warn!(timeout = ?after, "Upstream timed out");
                error_response(StatusCode::GATEWAY_TIMEOUT, "upstream timed out")
            }
            Err(e @ UpstreamError::Request(_)) => {
                tracing::warn!(error = %e, "Upstream unavailable");
                error_response(StatusCode::BAD_GATEWAY, "upstream unavailable")
            }
        }
    }

    /// Join the request path onto the upstream path and merge the queries.
    fn target_uri(&self, uri: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
        let base = self.upstream.path();
        let path = uri.path();
        let joined = match (base.ends_with('/'), path.starts_with('/')) {
            (true, true) => format!("{base}{}", &path[1..]),
            (false, false) => format!("{base}/{path}"),
            _ => format!("{base}{path}"),
        };

        let query = match (self.upstream.query(), uri.query()) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => format!("?{a}&{b}"),
            (Some(q), _) | (_, Some(q)) if !q.is_empty() => format!("?{q}"),
            _ => String::new(),
        };

        format!(
            "{}://{}{joined}{query}",
            self.upstream.scheme(),
            self.authority
        )
        .parse()
    }
}

pub(crate) fn authority_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

//! Request/response exchange with the upstream node.
//!
//! # Data Flow
//! ```text
//! ReverseProxy / WebSocketBridge
//!     → PolicyTransport (rate limit, parse, allow-list, validators)
//!         → rejection synthesized here, or
//!         → UpstreamTransport (hyper client, timeout)
//!             → upstream node
//! ```
//!
//! # Design Decisions
//! - Policy rejections are ordinary `200 OK` JSON-RPC responses, not errors
//! - A rejected request never reaches the inner transport
//! - Rate limiting runs before the body is read

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::PolicyConfig;
use crate::http::request::client_ip;
use crate::http::response::rejection_response;
use crate::http::tls::https_connector;
use crate::observability::metrics::{self, Outcome};
use crate::rpc::{Call, Entry, Rejection, RejectionReason, RequestPayload};
use crate::security::{CallValidators, MethodMatcher, RateLimiterRegistry};

/// Failure to obtain a response from upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
}

/// One request/response exchange with something that answers JSON-RPC.
pub trait Transport: Send + Sync + 'static {
    fn round_trip(
        &self,
        request: Request<Body>,
    ) -> BoxFuture<'_, Result<Response<Body>, UpstreamError>>;

    /// Decide whether a long-lived connection (a WebSocket upgrade) may be
    /// opened. No body is available at this point.
    fn admit(&self, _parts: &Parts) -> Result<(), Rejection> {
        Ok(())
    }
}

/// HTTP(S) transport to the upstream node.
#[derive(Clone)]
pub struct UpstreamTransport {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    timeout: Duration,
}

impl UpstreamTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(https_connector());
        Self { client, timeout }
    }
}

impl Transport for UpstreamTransport {
    fn round_trip(
        &self,
        request: Request<Body>,
    ) -> BoxFuture<'_, Result<Response<Body>, UpstreamError>> {
        Box::pin(async move {
            let start = Instant::now();
            let response = tokio::time::timeout(self.timeout, self.client.request(request))
                .await
                .map_err(|_| UpstreamError::Timeout(self.timeout))??;
            metrics::record_upstream_latency(start.elapsed());
            Ok(response.map(Body::new))
        })
    }
}

/// Transport enforcing the proxy's policy in front of an inner transport.
pub struct PolicyTransport {
    inner: Arc<dyn Transport>,
    registry: Arc<RateLimiterRegistry>,
    matcher: MethodMatcher,
    validators: CallValidators,
    requests_per_minute: u32,
    max_body_bytes: usize,
    trust_forwarded_for: bool,
}

impl PolicyTransport {
    pub fn new(
        policy: &PolicyConfig,
        registry: Arc<RateLimiterRegistry>,
        inner: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner,
            registry,
            matcher: policy.matcher.clone(),
            validators: CallValidators::new(policy.min_gas_price, policy.max_block_range),
            requests_per_minute: policy.requests_per_minute,
            max_body_bytes: policy.max_body_bytes,
            trust_forwarded_for: policy.trust_forwarded_for,
        }
    }

    fn check_rate(&self, client: &str) -> Result<(), Rejection> {
        let (allowed, created) = self.registry.allow(client, self.requests_per_minute);
        if created {
            tracing::debug!(client, "Tracking new client");
        }
        if allowed {
            Ok(())
        } else {
            Err(Rejection::without_id(RejectionReason::RateLimited))
        }
    }

    fn check_call(&self, call: &Call) -> Option<RejectionReason> {
        if !self.matcher.is_allowed(&call.method) {
            return Some(RejectionReason::MethodNotAllowed);
        }
        self.validators.validate(call).err()
    }

    async fn inspect(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        let (parts, body) = request.into_parts();
        let client = client_ip(&parts, self.trust_forwarded_for);

        if let Err(rejection) = self.check_rate(&client) {
            return Ok(self.reject(&client, None, &rejection));
        }

        let bytes = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(client = %client, error = %e, "Failed to read request body");
                let rejection = Rejection::without_id(RejectionReason::MalformedRequest);
                return Ok(self.reject(&client, None, &rejection));
            }
        };

        let payload = match RequestPayload::parse(&bytes) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(client = %client, error = %e, "Unparsable JSON-RPC body");
                let rejection = Rejection::without_id(RejectionReason::MalformedRequest);
                return Ok(self.reject(&client, None, &rejection));
            }
        };

        let verdicts: Vec<Option<RejectionReason>> = payload
            .entries()
            .iter()
            .map(|entry| match entry {
                Entry::Call(call) => self.check_call(call),
                Entry::Malformed { .. } => Some(RejectionReason::MalformedRequest),
            })
            .collect();
        if let Some(rejection) = Rejection::for_payload(&payload, &verdicts) {
            let method = payload
                .entries()
                .iter()
                .zip(&verdicts)
                .find_map(|(entry, verdict)| {
                    verdict.and(entry.call()).map(|call| call.method.as_str())
                });
            return Ok(self.reject(&client, method, &rejection));
        }

        let result = self
            .inner
            .round_trip(Request::from_parts(parts, Body::from(bytes)))
            .await;
        match &result {
            Ok(_) => metrics::record_request(Outcome::Forwarded),
            Err(e) => {
                tracing::warn!(client = %client, error = %e, "Upstream request failed");
                metrics::record_request(Outcome::UpstreamError);
            }
        }
        result
    }

    fn reject(&self, client: &str, method: Option<&str>, rejection: &Rejection) -> Response<Body> {
        let reason = rejection.reason();
        tracing::info!(client, method, %reason, "Request rejected");
        metrics::record_request(Outcome::Rejected);
        metrics::record_rejection(reason);
        rejection_response(rejection, StatusCode::OK)
    }
}

impl Transport for PolicyTransport {
    fn round_trip(
        &self,
        request: Request<Body>,
    ) -> BoxFuture<'_, Result<Response<Body>, UpstreamError>> {
        Box::pin(self.inspect(request))
    }

    fn admit(&self, parts: &Parts) -> Result<(), Rejection> {
        let client = client_ip(parts, self.trust_forwarded_for);
        self.check_rate(&client).inspect_err(|rejection| {
            tracing::info!(client = %client, reason = %rejection.reason(), "Connection rejected");
            metrics::record_rejection(rejection.reason());
        })
    }
}

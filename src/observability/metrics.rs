//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rpc_proxy_requests_total` (counter): requests by outcome
//! - `rpc_proxy_rejections_total` (counter): policy rejections by reason
//! - `rpc_proxy_upstream_duration_seconds` (histogram): upstream round-trip latency
//! - `rpc_proxy_rate_limit_buckets` (gauge): tracked client buckets
//! - `rpc_proxy_ws_connections` (gauge): open WebSocket bridges
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; with no exporter installed
//!   every call is a no-op
//! - The Prometheus exporter serves its own HTTP listener, separate from the proxy port

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

use crate::rpc::RejectionReason;

/// How a proxied HTTP request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Forwarded,
    Rejected,
    UpstreamError,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forwarded => "forwarded",
            Self::Rejected => "rejected",
            Self::UpstreamError => "upstream_error",
        }
    }
}

/// Install the Prometheus recorder and start its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(outcome: Outcome) {
    counter!("rpc_proxy_requests_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_rejection(reason: RejectionReason) {
    counter!("rpc_proxy_rejections_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_upstream_latency(elapsed: Duration) {
    histogram!("rpc_proxy_upstream_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_bucket_count(count: usize) {
    gauge!("rpc_proxy_rate_limit_buckets").set(count as f64);
}

/// Track an open WebSocket bridge; pass `false` when it closes.
pub fn record_ws_connection(open: bool) {
    let gauge = gauge!("rpc_proxy_ws_connections");
    if open {
        gauge.increment(1.0);
    } else {
        gauge.decrement(1.0);
    }
}

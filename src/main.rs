//! rpc-proxy
//!
//! A policy-enforcing reverse proxy for a blockchain node's JSON-RPC and
//! WebSocket endpoints.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ server (axum router, CORS, request id, trace)
//!                  │
//!                  ├─ GET/HEAD /  → empty 200
//!                  ├─ /ws         → WebSocketBridge ──┐
//!                  └─ anything    → ReverseProxy ─────┤
//!                                                     ▼
//!                                   PolicyTransport (rate limit, allow-list,
//!                                                    gas floor, block range)
//!                                                     │
//!                                                     ▼
//!                                   UpstreamTransport ──▶ node
//! ```

use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use rpc_proxy::config::{self, Cli};
use rpc_proxy::lifecycle::{wait_for_signal, Shutdown};
use rpc_proxy::observability::{init_logging, init_metrics};
use rpc_proxy::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = config::load(&cli)?;

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rpc-proxy starting");

    if let Some(address) = &config.observability.metrics_address {
        let addr: SocketAddr = address.parse()?;
        init_metrics(addr)?;
    }

    let server = Server::new(&config)?;

    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port))).await?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

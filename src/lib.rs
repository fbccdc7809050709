//! Policy-enforcing reverse proxy for web3 JSON-RPC endpoints.

pub mod blockchain;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rpc;
pub mod security;

pub use config::{PolicyConfig, ProxyConfig};
pub use http::Server;
pub use lifecycle::Shutdown;

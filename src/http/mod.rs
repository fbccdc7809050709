//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, middleware, routes)
//!     → proxy.rs (URI rewrite, forwarding headers)   or   websocket.rs (admission, relay)
//!     → transport.rs (PolicyTransport → UpstreamTransport, TLS via tls.rs)
//!     → response.rs (rejections and gateway errors)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod tls;
pub mod transport;
pub mod websocket;

pub use proxy::ReverseProxy;
pub use server::Server;
pub use transport::{PolicyTransport, Transport, UpstreamError, UpstreamTransport};
pub use websocket::WebSocketBridge;

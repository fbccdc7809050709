//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the policy transport, reverse proxy and WebSocket bridge from config
//! - Create the Axum router and wire up middleware
//! - Run the idle-bucket sweeper alongside the server
//! - Serve until shutdown, draining in-flight requests

use axum::body::Body;
use axum::extract::{FromRequestParts, State, WebSocketUpgrade};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigError, PolicyConfig, ProxyConfig};
use crate::http::proxy::ReverseProxy;
use crate::http::response::{PROXY_HEADER, PROXY_HEADER_VALUE};
use crate::http::transport::{PolicyTransport, Transport, UpstreamTransport};
use crate::http::websocket::WebSocketBridge;
use crate::lifecycle::Shutdown;
use crate::security::RateLimiterRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
struct AppState {
    proxy: Arc<ReverseProxy>,
    bridge: Arc<WebSocketBridge>,
}

/// The proxy server: policy, shared limiter state and the router built on them.
pub struct Server {
    policy: Arc<PolicyConfig>,
    registry: Arc<RateLimiterRegistry>,
    router: Router,
}

impl Server {
    /// Validate `config` and build the server.
    pub fn new(config: &ProxyConfig) -> Result<Self, ConfigError> {
        Ok(Self::from_policy(PolicyConfig::from_proxy_config(config)?))
    }

    pub fn from_policy(policy: PolicyConfig) -> Self {
        let policy = Arc::new(policy);
        let registry = Arc::new(RateLimiterRegistry::new(policy.exempt.clone()));

        let upstream: Arc<dyn Transport> = Arc::new(UpstreamTransport::new(policy.request_timeout));
        let transport: Arc<dyn Transport> = Arc::new(PolicyTransport::new(
            &policy,
            Arc::clone(&registry),
            upstream,
        ));

        let state = AppState {
            proxy: Arc::new(ReverseProxy::new(
                policy.upstream_url.clone(),
                Arc::clone(&transport),
            )),
            bridge: Arc::new(WebSocketBridge::new(
                policy.upstream_ws_url.clone(),
                transport,
            )),
        };

        Self {
            router: build_router(state),
            policy,
            registry,
        }
    }

    /// Router with all middleware; serve it with `ConnectInfo<SocketAddr>`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.policy.upstream_url,
            ws_upstream = %self.policy.upstream_ws_url,
            allow = ?self.policy.allow,
            rpm = self.policy.requests_per_minute,
            exempt = self.policy.exempt.len(),
            min_gas_price = self.policy.min_gas_price,
            block_range_limit = self.policy.max_block_range,
            "Proxy listening"
        );

        let sweeper = spawn_sweeper(
            Arc::clone(&self.registry),
            self.policy.limiter_idle_ttl,
            &shutdown,
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await;

        shutdown.trigger();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.await;
        }

        tracing::info!("Proxy stopped");
        result
    }
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([
            Method::HEAD,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .max_age(Duration::from_secs(3600));

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id
        )
    });

    // `get` also answers HEAD, with the body stripped.
    Router::new()
        .route("/", get(homepage).fallback(proxy_handler))
        .route("/ws", any(ws_handler))
        .fallback(proxy_handler)
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(trace)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetResponseHeaderLayer::overriding(
            PROXY_HEADER,
            PROXY_HEADER_VALUE,
        ))
}

/// Periodically drop rate-limit buckets of clients that went quiet.
fn spawn_sweeper(
    registry: Arc<RateLimiterRegistry>,
    idle_ttl: Duration,
    shutdown: &Shutdown,
) -> Option<JoinHandle<()>> {
    if idle_ttl.is_zero() {
        return None;
    }

    let stop = shutdown.wait();
    Some(tokio::spawn(async move {
        tokio::pin!(stop);
        let mut ticker = tokio::time::interval(idle_ttl);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = registry.evict_idle(idle_ttl);
                    if removed > 0 {
                        tracing::debug!(removed, remaining = registry.len(), "Evicted idle clients");
                    }
                }
                _ = &mut stop => break,
            }
        }
    }))
}

async fn homepage() -> StatusCode {
    StatusCode::OK
}

async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.proxy.forward(request).await
}

async fn ws_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (mut parts, _) = request.into_parts();
    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    state.bridge.upgrade(&parts, ws).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use tower::ServiceExt;

    fn server() -> Server {
        Server::new(&ProxyConfig {
            url: "http://127.0.0.1:9".into(),
            ..ProxyConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_homepage() {
        let response = server()
            .router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&PROXY_HEADER], "rpc-proxy");
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_head_homepage() {
        let response = server()
            .router()
            .oneshot(Request::head("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let response = server()
            .router()
            .oneshot(
                Request::options("/")
                    .header(header::ORIGIN, "https://dapp.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "3600");
        assert_eq!(response.headers()[&PROXY_HEADER], "rpc-proxy");
    }

    #[tokio::test]
    async fn test_disallowed_method_through_router() {
        let server = Server::new(&ProxyConfig {
            url: "http://127.0.0.1:9".into(),
            allow: vec!["eth_blockNumber".into()],
            ..ProxyConfig::default()
        })
        .unwrap();

        let response = server
            .router()
            .oneshot(
                Request::post("/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"jsonrpc":"2.0","id":3,"method":"eth_getBalance","params":[]}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&PROXY_HEADER], "rpc-proxy");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let response = server()
            .router()
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ProxyConfig {
            allow: vec!["*eth".into()],
            ..ProxyConfig::default()
        };
        assert!(matches!(Server::new(&config), Err(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let shutdown = Shutdown::new();
        let registry = Arc::new(RateLimiterRegistry::default());
        let sweeper = spawn_sweeper(registry, Duration::from_millis(10), &shutdown).unwrap();

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .unwrap()
            .unwrap();

        assert!(spawn_sweeper(Arc::default(), Duration::ZERO, &shutdown).is_none());
    }
}

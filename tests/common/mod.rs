//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{any, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use rpc_proxy::config::ProxyConfig;
use rpc_proxy::{Server, Shutdown};

/// What the mock node has seen.
#[derive(Default)]
pub struct MockUpstream {
    hits: AtomicUsize,
    last_body: Mutex<Option<String>>,
    last_forwarded_for: Mutex<Option<String>>,
}

impl MockUpstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_body(&self) -> Option<String> {
        self.last_body.lock().unwrap().clone()
    }

    pub fn last_forwarded_for(&self) -> Option<String> {
        self.last_forwarded_for.lock().unwrap().clone()
    }
}

async fn answer(State(mock): State<Arc<MockUpstream>>, headers: HeaderMap, body: Bytes) -> String {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    *mock.last_body.lock().unwrap() = Some(String::from_utf8_lossy(&body).into_owned());
    *mock.last_forwarded_for.lock().unwrap() = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    r#"{"jsonrpc":"2.0","id":1,"result":"0x1"}"#.to_string()
}

/// Start a JSON-RPC node stand-in answering every POST with a fixed result.
pub async fn start_mock_upstream() -> (SocketAddr, Arc<MockUpstream>) {
    let mock = Arc::new(MockUpstream::default());
    let app = Router::new()
        .route("/", post(answer))
        .with_state(Arc::clone(&mock));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, mock)
}

/// Start a WebSocket endpoint echoing every data frame back.
pub async fn start_ws_echo() -> SocketAddr {
    let app = Router::new().route(
        "/",
        any(|ws: WebSocketUpgrade| async move {
            ws.on_upgrade(|mut socket| async move {
                while let Some(Ok(message)) = socket.recv().await {
                    if matches!(message, Message::Close(_)) {
                        break;
                    }
                    if socket.send(message).await.is_err() {
                        break;
                    }
                }
            })
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A running proxy.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl TestProxy {
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let server = Server::new(&config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(listener, shutdown.clone()));
    TestProxy {
        addr,
        shutdown,
        task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

//! WebSocket bridge to the upstream node.
//!
//! # Responsibilities
//! - Admit the connection through the transport (rate limit / exemption)
//! - Dial the upstream WebSocket origin (`ws` or `wss`) before accepting the upgrade
//! - Relay frames verbatim in both directions
//!
//! # Design Decisions
//! - Admission is per connection; frames after the upgrade are not inspected
//! - Either side closing or failing tears down both

use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as UpstreamMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::http::request::{peer_addr, X_FORWARDED_FOR};
use crate::http::response::{error_response, rejection_response};
use crate::http::tls::install_crypto_provider;
use crate::http::transport::Transport;
use crate::observability::metrics;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bridges client WebSocket connections to one upstream endpoint.
pub struct WebSocketBridge {
    upstream: Url,
    transport: Arc<dyn Transport>,
}

impl WebSocketBridge {
    pub fn new(upstream: Url, transport: Arc<dyn Transport>) -> Self {
        // `wss` dials pick up the process-wide rustls provider.
        install_crypto_provider();
        Self {
            upstream,
            transport,
        }
    }

    /// Admit, dial upstream, then complete the client upgrade.
    pub async fn upgrade(&self, parts: &Parts, ws: WebSocketUpgrade) -> Response {
        if let Err(rejection) = self.transport.admit(parts) {
            return rejection_response(&rejection, StatusCode::TOO_MANY_REQUESTS);
        }

        let upstream = match self.dial(parts).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!(
                    upstream = %self.upstream,
                    error = %e,
                    "Upstream WebSocket dial failed"
                );
                return error_response(StatusCode::BAD_GATEWAY, "upstream unavailable");
            }
        };

        ws.on_upgrade(move |client| relay(client, upstream))
    }

    async fn dial(&self, parts: &Parts) -> Result<UpstreamSocket, WsError> {
        let target = self.target_url(parts.uri.query());
        let mut request = target.as_str().into_client_request()?;
        if let Some(peer) = peer_addr(parts) {
            if let Ok(value) = HeaderValue::from_str(&peer.ip().to_string()) {
                request.headers_mut().insert(X_FORWARDED_FOR, value);
            }
        }
        let (socket, _) = tokio_tungstenite::connect_async(request).await?;
        Ok(socket)
    }

    /// Upstream URL with the client's query string appended.
    fn target_url(&self, query: Option<&str>) -> Url {
        let mut url = self.upstream.clone();
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            let merged = match url.query().filter(|q| !q.is_empty()) {
                Some(own) => format!("{own}&{query}"),
                None => query.to_string(),
            };
            url.set_query(Some(&merged));
        }
        url
    }
}

async fn relay(client: WebSocket, upstream: UpstreamSocket) {
    metrics::record_ws_connection(true);
    tracing::debug!("WebSocket bridge opened");

    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(Ok(message)) = client_rx.next().await {
            let closing = matches!(message, ws::Message::Close(_));
            if upstream_tx.send(to_upstream(message)).await.is_err() || closing {
                break;
            }
        }
    };

    let upstream_to_client = async {
        while let Some(Ok(message)) = upstream_rx.next().await {
            let Some(message) = to_client(message) else {
                continue;
            };
            let closing = matches!(message, ws::Message::Close(_));
            if client_tx.send(message).await.is_err() || closing {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => {}
        _ = upstream_to_client => {}
    }

    metrics::record_ws_connection(false);
    tracing::debug!("WebSocket bridge closed");
}

fn to_upstream(message: ws::Message) -> UpstreamMessage {
    match message {
        ws::Message::Text(text) => UpstreamMessage::Text(text.as_str().to_owned().into()),
        ws::Message::Binary(data) => UpstreamMessage::Binary(data),
        ws::Message::Ping(data) => UpstreamMessage::Ping(data),
        ws::Message::Pong(data) => UpstreamMessage::Pong(data),
        ws::Message::Close(frame) => UpstreamMessage::Close(frame.map(|f| CloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
    }
}

/// Raw frames never come out of a reader and are dropped.
fn to_client(message: UpstreamMessage) -> Option<ws::Message> {
    let message = match message {
        UpstreamMessage::Text(text) => ws::Message::Text(text.as_str().to_owned().into()),
        UpstreamMessage::Binary(data) => ws::Message::Binary(data),
        UpstreamMessage::Ping(data) => ws::Message::Ping(data),
        UpstreamMessage::Pong(data) => ws::Message::Pong(data),
        UpstreamMessage::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
        UpstreamMessage::Frame(_) => return None,
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Response as HttpResponse;
    use axum::http::Request;
    use futures_util::future::BoxFuture;

    use crate::http::transport::UpstreamError;

    struct Unused;

    impl Transport for Unused {
        fn round_trip(
            &self,
            _request: Request<Body>,
        ) -> BoxFuture<'_, Result<HttpResponse<Body>, UpstreamError>> {
            Box::pin(async { Ok(HttpResponse::new(Body::empty())) })
        }
    }

    fn bridge(upstream: &str) -> WebSocketBridge {
        WebSocketBridge::new(Url::parse(upstream).unwrap(), Arc::new(Unused))
    }

    #[test]
    fn test_target_url_carries_query() {
        let b = bridge("ws://127.0.0.1:8041");
        assert_eq!(b.target_url(None).as_str(), "ws://127.0.0.1:8041/");
        assert_eq!(b.target_url(Some("token=1")).as_str(), "ws://127.0.0.1:8041/?token=1");

        let b = bridge("ws://node/ws?key=a");
        assert_eq!(b.target_url(Some("x=2")).as_str(), "ws://node/ws?key=a&x=2");
        assert_eq!(b.target_url(Some("")).as_str(), "ws://node/ws?key=a");
    }

    #[tokio::test]
    async fn test_dial_supports_wss() {
        // Accepts and hangs up, so the dial gets as far as the TLS handshake.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        });

        let b = bridge(&format!("wss://{addr}/ws"));
        let (parts, _) = Request::get("/ws").body(Body::empty()).unwrap().into_parts();

        match b.dial(&parts).await {
            Err(WsError::Url(e)) => panic!("wss not supported: {e}"),
            Err(_) => {}
            Ok(_) => panic!("handshake unexpectedly succeeded"),
        }
    }

    #[test]
    fn test_message_conversion() {
        let text = to_upstream(ws::Message::Text("hello".to_owned().into()));
        assert_eq!(text, UpstreamMessage::Text("hello".to_owned().into()));

        let close = to_client(UpstreamMessage::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".to_owned().into(),
        })));
        match close {
            Some(ws::Message::Close(Some(frame))) => {
                assert_eq!(frame.code, 1000);
                assert_eq!(frame.reason.as_str(), "bye");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

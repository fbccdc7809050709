//! TLS for upstream connections.
//!
//! Both the HTTP client and the WebSocket dialer use rustls with the ring
//! provider and the bundled webpki roots.

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use std::sync::Once;

/// Install ring as the process-wide rustls provider.
///
/// Safe to call repeatedly. A provider installed earlier by someone else is kept.
pub fn install_crypto_provider() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("rustls crypto provider already installed");
        }
    });
}

/// Connector that speaks `http` as-is and `https` over rustls.
pub fn https_connector() -> HttpsConnector<HttpConnector> {
    install_crypto_provider();

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);

    HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http)
}

//! Responses the proxy produces itself.
//!
//! Upstream responses are streamed back untouched; only rejections and
//! gateway errors are built here.

use axum::body::Body;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{Response, StatusCode};

use crate::rpc::Rejection;

/// Header identifying the proxy on every response.
pub const PROXY_HEADER: HeaderName = HeaderName::from_static("x-rpc-proxy");
pub const PROXY_HEADER_VALUE: HeaderValue = HeaderValue::from_static("rpc-proxy");

/// JSON-RPC error body for a rejected request.
pub fn rejection_response(rejection: &Rejection, status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::from(rejection.to_json()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Plain-text gateway error.
pub fn error_response(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

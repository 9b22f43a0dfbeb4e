//! Response builders
//!
//! Every handler answers with `Response<Full<Bytes>>`. Failures use the
//! `{"success": false, "reason": ...}` shape.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{Response, StatusCode};
use serde_json::{json, Value};

/// Response body type used throughout the crate
pub type Body = Full<Bytes>;

/// JSON response with the given status
pub fn json(status: StatusCode, value: &Value) -> Response<Body> {
    let mut response = Response::new(Full::new(Bytes::from(value.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    response
}

/// Plain-text response with the given status
pub fn text(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// `{"success": false, "reason": reason}`
pub fn failure(status: StatusCode, reason: &str) -> Response<Body> {
    json(status, &json!({ "success": false, "reason": reason }))
}

/// 401 with a Basic challenge
pub fn unauthorized() -> Response<Body> {
    let mut response = failure(StatusCode::UNAUTHORIZED, "Authentication required");
    response.headers_mut().insert(
        WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"msgate\""),
    );
    response
}

/// 404 for unknown routes
pub fn not_found() -> Response<Body> {
    text(StatusCode::NOT_FOUND, "Not Found")
}

//! Outbound responses.
//!
//! # Responsibilities
//! - Carry status, content type and body produced by an exchange
//! - Provide the fixed replies the connector itself sends (liveness, errors)
//! - Convert into an axum response for the wire

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// A complete HTTP response ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// `200 text/plain "1"`, the liveness acknowledgment.
    pub fn ready() -> Self {
        Self::new(StatusCode::OK, "text/plain", "1")
    }

    /// `204` with an empty body.
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, "", Bytes::new())
    }

    /// JSON body with the given status.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status, "application/json", value.to_string())
    }

    /// JSON error reply: `{"error": message}`.
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, &json!({ "error": message }))
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("<binary>")
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if !self.content_type.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.content_type) {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
        }
        response
    }
}

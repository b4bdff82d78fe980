//! Inbound request metadata.
//!
//! # Responsibilities
//! - Capture verb, resource, query and headers of one request
//! - Give exchanges cheap, read-only access to them while the request is
//!   being handled
//!
//! # Design Decisions
//! - The body is not part of the header; it is passed separately as bytes
//! - Header lookups are case-insensitive (delegated to `HeaderMap`)

use axum::http::{request::Parts, HeaderMap, Method};

/// Header name carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Metadata of a single HTTP request.
#[derive(Debug, Clone)]
pub struct HttpHeader {
    pub verb: Method,
    pub resource: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

impl HttpHeader {
    pub fn new(verb: Method, resource: impl Into<String>) -> Self {
        Self {
            verb,
            resource: resource.into(),
            query: None,
            headers: HeaderMap::new(),
        }
    }

    /// Build from the parts of an `http` request.
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            verb: parts.method.clone(),
            resource: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
        }
    }

    /// Add a header, mostly useful when building headers by hand in tests.
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get("content-type")
    }

    pub fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID).unwrap_or("unknown")
    }

    /// Value of a query string parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then_some(v)
        })
    }

    /// True when verb and resource match the given expectations.
    ///
    /// The verb comparison ignores ASCII case so that configured verbs like
    /// `post` still match.
    pub fn matches(&self, verb: &str, resource: &str) -> bool {
        self.resource == resource && self.verb.as_str().eq_ignore_ascii_case(verb)
    }
}

impl Default for HttpHeader {
    fn default() -> Self {
        Self::new(Method::GET, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn from_parts_splits_path_and_query() {
        let (parts, _) = Request::builder()
            .method("POST")
            .uri("http://exchange.example/bid?debug=1&x=y")
            .header("Content-Type", "application/json")
            .body(())
            .unwrap()
            .into_parts();

        let header = HttpHeader::from_parts(&parts);
        assert_eq!(header.verb, Method::POST);
        assert_eq!(header.resource, "/bid");
        assert_eq!(header.query_param("debug"), Some("1"));
        assert_eq!(header.query_param("x"), Some("y"));
        assert_eq!(header.query_param("missing"), None);
        assert_eq!(header.content_type(), Some("application/json"));
        assert_eq!(header.request_id(), "unknown");
    }

    #[test]
    fn verb_match_ignores_case() {
        let header = HttpHeader::new(Method::POST, "/bid");
        assert!(header.matches("post", "/bid"));
        assert!(!header.matches("GET", "/bid"));
        assert!(!header.matches("POST", "/bid/"));
    }
}

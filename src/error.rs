//! Error taxonomy.
//!
//! Two families:
//! - [`ConnectorError`]: contract violations and startup failures, returned to
//!   the caller as hard failures.
//! - [`RequestError`]: problems with one inbound request, turned into an HTTP
//!   error reply and never allowed to take down the connection.

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;
use crate::http::HttpResponse;

/// Fatal errors for the triggering call.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// A required policy was missing or the connector is in the wrong state.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The handler factory did not produce a handler.
    #[error("Failed to create handler: {0}")]
    Construction(String),

    /// The transport could not acquire the requested address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Options could not be parsed or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Per-request errors, surfaced to the exchange as an error response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// Malformed or unrecognized bid request.
    #[error("{0}")]
    Parse(String),

    /// Right resource, wrong verb.
    #[error("expected {expected} {resource}, got {actual}")]
    Protocol {
        expected: String,
        resource: String,
        actual: String,
    },

    /// Resource outside the auction and liveness paths.
    #[error("unknown resource {0}")]
    UnknownResource(String),
}

impl RequestError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Parse(_) => StatusCode::BAD_REQUEST,
            RequestError::Protocol { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RequestError::UnknownResource(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Parse(_) => "parse_error",
            RequestError::Protocol { .. } => "protocol_error",
            RequestError::UnknownResource(_) => "unknown_resource",
        }
    }

    pub fn to_response(&self) -> HttpResponse {
        HttpResponse::error(self.status(), &self.to_string())
    }
}

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (net::transport)
//!     → server.rs (Axum router, request ID, tracing, body collection)
//!     → request.rs (verb, resource, query, headers)
//!     → dispatch.rs (auction flow through the exchange and pipeline)
//!     → response.rs (status, content type, body)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod request;
pub mod response;
pub mod server;

pub use request::{HttpHeader, X_REQUEST_ID};
pub use response::HttpResponse;
pub use server::build_router;

//! HTTP service setup for auction connections.
//!
//! # Responsibilities
//! - Create the Axum Router every connection is served with
//! - Wire up middleware (request ID, tracing)
//! - Collect each request's header and body and hand them to dispatch
//!
//! # Design Decisions
//! - One catch-all route: resource matching belongs to dispatch, which
//!   also answers liveness and unknown resources
//! - The connection's handler reaches the route as a request extension,
//!   inserted by the transport when the connection is accepted

use axum::{
    body::Body,
    extract::{Extension, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::handler::AuctionHandler;
use crate::http::dispatch::handle_request;
use crate::http::request::X_REQUEST_ID;
use crate::http::{HttpHeader, HttpResponse};
use crate::lifecycle::connector::ConnectorCore;

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the Axum router with all middleware layers.
pub fn build_router(core: Arc<ConnectorCore>) -> Router {
    let request_id = axum::http::HeaderName::from_static(X_REQUEST_ID);
    Router::new()
        .fallback(auction_endpoint)
        .with_state(core)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// Entry point for every request on an auction connection.
async fn auction_endpoint(
    State(core): State<Arc<ConnectorCore>>,
    Extension(handler): Extension<Arc<AuctionHandler>>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let header = HttpHeader::from_parts(&parts);

    let payload = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                connection_id = %handler.id(),
                resource = %header.resource,
                error = %e,
                "Failed to read request body"
            );
            return HttpResponse::error(StatusCode::PAYLOAD_TOO_LARGE, "request body too large or unreadable")
                .into_response();
        }
    };

    handle_request(&core, &handler, header, payload).await.into_response()
}

//! Per-request auction flow.
//!
//! # Data Flow
//! ```text
//! Request on a connection
//!     → liveness check (/ready → 200 "1", never reaches the exchange)
//!     → resource check (anything else → handle_unknown_request)
//!     → verb check (mismatch → 405, connection stays open)
//!     → parse_bid_request (failure → 400)
//!     → sampling (acceptAuctionProbability → dropped response)
//!     → get_time_available_ms
//!     → pipeline.submit
//!     → get_response / get_dropped_auction_response / get_error_response
//!     → request log, metrics
//! ```
//!
//! # Design Decisions
//! - Every failure becomes a response; a bad request never closes the
//!   connection from here
//! - The handler's current header is set before any exchange hook runs
//! - Every request counts as in flight while it is handled, whatever its
//!   resource

use axum::body::Bytes;
use rand::Rng;
use std::time::Instant;

use crate::auction::{Auction, AuctionOutcome};
use crate::error::RequestError;
use crate::exchange::{ExchangeConnector, LIVENESS_RESOURCE};
use crate::handler::AuctionHandler;
use crate::http::{HttpHeader, HttpResponse};
use crate::lifecycle::connector::{ConnectorCore, ConnectorSettings};
use crate::observability::metrics;

/// Outcome label for requests that were not auctions.
const UNKNOWN_REQUEST: &str = "unknown_request";

/// Outcome label for liveness checks.
const LIVENESS: &str = "liveness";

/// Handle one request on `handler`'s connection.
pub async fn handle_request(
    core: &ConnectorCore,
    handler: &AuctionHandler,
    header: HttpHeader,
    payload: Bytes,
) -> HttpResponse {
    let start = Instant::now();
    let _serving = core.serving();
    let exchange = core.exchange().as_ref();
    let settings = core.settings();

    handler.set_header(header.clone());
    let sequence = handler.record_request();

    let (response, outcome) = if header.resource == LIVENESS_RESOURCE {
        (HttpResponse::ready(), LIVENESS)
    } else if header.resource != settings.options.auction_resource {
        (
            exchange.handle_unknown_request(handler, &header, &payload),
            UNKNOWN_REQUEST,
        )
    } else {
        run_auction(core, &settings, handler, &header, &payload).await
    };

    handler.log_exchange(&header, &payload, &response);
    metrics::record_auction_request(exchange.exchange_name(), outcome, start);

    tracing::debug!(
        connection_id = %handler.id(),
        request_id = %header.request_id(),
        sequence,
        verb = %header.verb,
        resource = %header.resource,
        status = response.status.as_u16(),
        outcome,
        elapsed_us = start.elapsed().as_micros() as u64,
        "Request handled"
    );
    response
}

async fn run_auction(
    core: &ConnectorCore,
    settings: &ConnectorSettings,
    handler: &AuctionHandler,
    header: &HttpHeader,
    payload: &[u8],
) -> (HttpResponse, &'static str) {
    let exchange = core.exchange().as_ref();
    let options = &settings.options;

    if !header.matches(&options.auction_verb, &options.auction_resource) {
        let err = RequestError::Protocol {
            expected: options.auction_verb.clone(),
            resource: options.auction_resource.clone(),
            actual: header.verb.to_string(),
        };
        tracing::warn!(connection_id = %handler.id(), error = %err, "Auction request with wrong verb");
        return (err.to_response(), err.kind());
    }

    let request = match exchange.parse_bid_request(handler, header, payload) {
        Ok(request) => request,
        Err(err) => return reject(handler, err),
    };

    if !accept_sample(options.accept_auction_probability) {
        let auction = Auction::with_outcome(request, AuctionOutcome::Dropped("sampled out".to_string()));
        return (
            exchange.get_dropped_auction_response(handler, &auction, "sampled out"),
            auction.outcome.label(),
        );
    }

    let time_available_ms = match exchange.get_time_available_ms(handler, header, payload) {
        Ok(ms) => ms,
        Err(err) => return reject(handler, err),
    };
    metrics::record_time_available(exchange.exchange_name(), time_available_ms);

    let mut auction = Auction::new(request, time_available_ms);
    auction.outcome = core.pipeline().submit(&auction).await;
    tracing::trace!(
        auction_id = %auction.id,
        time_available_ms,
        elapsed_ms = auction.elapsed_ms(),
        outcome = auction.outcome.label(),
        "Auction finished"
    );

    (respond(exchange, handler, header, &auction), auction.outcome.label())
}

fn respond(
    exchange: &dyn ExchangeConnector,
    handler: &AuctionHandler,
    header: &HttpHeader,
    auction: &Auction,
) -> HttpResponse {
    match &auction.outcome {
        AuctionOutcome::Bid(_) | AuctionOutcome::NoBid => exchange.get_response(handler, header, auction),
        AuctionOutcome::Dropped(reason) => exchange.get_dropped_auction_response(handler, auction, reason),
        AuctionOutcome::Error(message) => {
            tracing::warn!(auction_id = %auction.id, error = %message, "Auction failed");
            exchange.get_error_response(handler, auction, message)
        }
        AuctionOutcome::Pending => {
            tracing::error!(auction_id = %auction.id, "Pipeline returned an unfinished auction");
            exchange.get_error_response(handler, auction, "auction did not complete")
        }
    }
}

fn reject(handler: &AuctionHandler, err: RequestError) -> (HttpResponse, &'static str) {
    tracing::info!(connection_id = %handler.id(), peer = %handler.peer_name(), error = %err, "Rejected auction request");
    (err.to_response(), err.kind())
}

fn accept_sample(probability: f64) -> bool {
    probability >= 1.0 || rand::thread_rng().gen::<f64>() < probability
}

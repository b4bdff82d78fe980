//! The contract an exchange implementation fulfils.
//!
//! Request flow for the configured auction resource and verb:
//! ```text
//! Received → parse_bid_request → Parsed
//!          → get_time_available_ms → TimeEstimated
//!          → pipeline → Auctioned
//!          → get_response / get_dropped_auction_response / get_error_response → Responded
//! ```
//! The liveness resource is answered by dispatch before any hook runs. Any
//! other resource goes to `handle_unknown_request`.
//!
//! Parsing, timing and response formatting have no default: an exchange
//! cannot be built without them. Everything else has a documented default.

use crate::auction::{Auction, BidRequest};
use crate::error::RequestError;
use crate::exchange::compatibility::{
    generic_campaign_compatibility, generic_creative_compatibility, AgentConfig, Creative,
    ExchangeCompatibility,
};
use crate::handler::AuctionHandler;
use crate::http::{HttpHeader, HttpResponse};

/// Resource answered with a liveness acknowledgment by the connector itself.
pub const LIVENESS_RESOURCE: &str = "/ready";

/// Exchange-specific behavior plugged into the HTTP connector.
pub trait ExchangeConnector: Send + Sync {
    /// Name used in logs, metrics and exchange filters.
    fn exchange_name(&self) -> &str;

    /// Turn a request body into a normalized bid request.
    fn parse_bid_request(
        &self,
        handler: &AuctionHandler,
        header: &HttpHeader,
        payload: &[u8],
    ) -> Result<BidRequest, RequestError>;

    /// Milliseconds left for bidders, usually the exchange deadline minus the
    /// round trip (see [`get_round_trip_time_ms`](Self::get_round_trip_time_ms))
    /// minus processing overhead.
    fn get_time_available_ms(
        &self,
        handler: &AuctionHandler,
        header: &HttpHeader,
        payload: &[u8],
    ) -> Result<f64, RequestError>;

    /// Serialize a finished auction into the exchange's wire format.
    fn get_response(&self, handler: &AuctionHandler, header: &HttpHeader, auction: &Auction) -> HttpResponse;

    /// Estimated round trip to the peer; defaults to the configured ping table.
    fn get_round_trip_time_ms(&self, handler: &AuctionHandler, _header: &HttpHeader) -> f64 {
        handler.estimated_round_trip_ms()
    }

    /// Response for an auction dropped before completion.
    ///
    /// Defaults to the regular response, so a drop looks like a no-bid.
    fn get_dropped_auction_response(&self, handler: &AuctionHandler, auction: &Auction, _reason: &str) -> HttpResponse {
        self.get_response(handler, &handler.header(), auction)
    }

    /// Response for an auction that failed internally.
    ///
    /// Defaults to the regular response, so no error detail reaches the
    /// exchange.
    fn get_error_response(&self, handler: &AuctionHandler, auction: &Auction, _message: &str) -> HttpResponse {
        self.get_response(handler, &handler.header(), auction)
    }

    /// Reply for a resource other than the auction and liveness resources.
    fn handle_unknown_request(&self, _handler: &AuctionHandler, header: &HttpHeader, _payload: &[u8]) -> HttpResponse {
        unknown_request_response(header)
    }

    fn get_campaign_compatibility(&self, config: &AgentConfig, include_reasons: bool) -> ExchangeCompatibility {
        generic_campaign_compatibility(self.exchange_name(), config, include_reasons)
    }

    fn get_creative_compatibility(&self, creative: &Creative, include_reasons: bool) -> ExchangeCompatibility {
        generic_creative_compatibility(creative, include_reasons)
    }
}

/// Unknown-resource error naming the requested path.
pub fn unknown_request_response(header: &HttpHeader) -> HttpResponse {
    RequestError::UnknownResource(header.resource.clone()).to_response()
}

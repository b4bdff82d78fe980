//! Auction model and pipeline boundary.
//!
//! # Data Flow
//! ```text
//! exchange parse step
//!     → bid_request.rs (normalized BidRequest)
//!     → Auction (request + time budget)
//!     → pipeline.rs (AuctionPipeline::submit, asynchronous)
//!     → AuctionOutcome
//!     → exchange response step
//! ```
//!
//! # Design Decisions
//! - The matching/bidding algorithm lives behind `AuctionPipeline`
//! - An `Auction` is owned by the request task; the pipeline only borrows it

pub mod bid_request;
pub mod pipeline;

pub use bid_request::{AdFormat, AdSpot, BidRequest};
pub use pipeline::{AuctionPipeline, FixedPricePipeline, NoBidPipeline};

use std::time::Instant;

use uuid::Uuid;

/// A bid placed on one ad spot.
#[derive(Debug, Clone, PartialEq)]
pub struct Bid {
    /// Ad spot the bid is for.
    pub spot_id: String,
    /// Bidding agent that won the spot.
    pub agent: String,
    /// Price in CPM of the request currency.
    pub price_cpm: f64,
    pub creative_id: String,
    /// Optional ad markup returned inline.
    pub markup: Option<String>,
}

/// Result of running an auction through the pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuctionOutcome {
    /// Not finished yet.
    #[default]
    Pending,
    Bid(Vec<Bid>),
    NoBid,
    /// Dropped before completion (sampling, load shedding, expired budget).
    Dropped(String),
    /// Internal failure in the pipeline.
    Error(String),
}

impl AuctionOutcome {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            AuctionOutcome::Pending => "pending",
            AuctionOutcome::Bid(_) => "bid",
            AuctionOutcome::NoBid => "no_bid",
            AuctionOutcome::Dropped(_) => "dropped",
            AuctionOutcome::Error(_) => "error",
        }
    }
}

/// One auction opportunity and its time budget.
#[derive(Debug, Clone)]
pub struct Auction {
    pub id: Uuid,
    pub request: BidRequest,
    /// Time downstream bidders have, in milliseconds.
    pub time_available_ms: f64,
    pub received_at: Instant,
    pub outcome: AuctionOutcome,
}

impl Auction {
    pub fn new(request: BidRequest, time_available_ms: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            time_available_ms,
            received_at: Instant::now(),
            outcome: AuctionOutcome::Pending,
        }
    }

    /// Auction carrying an outcome decided without running the pipeline.
    pub fn with_outcome(request: BidRequest, outcome: AuctionOutcome) -> Self {
        Self {
            outcome,
            ..Self::new(request, 0.0)
        }
    }

    /// Winning bids, empty unless the outcome is `Bid`.
    pub fn bids(&self) -> &[Bid] {
        match &self.outcome {
            AuctionOutcome::Bid(bids) => bids,
            _ => &[],
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.received_at.elapsed().as_secs_f64() * 1000.0
    }
}

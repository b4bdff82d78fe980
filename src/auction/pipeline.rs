//! Auction pipeline boundary.
//!
//! The pipeline receives an auction with its time budget and resolves it to an
//! outcome. The connector awaits the result; it never imposes a deadline of its
//! own beyond the budget it forwards.

use async_trait::async_trait;

use crate::auction::{Auction, AuctionOutcome, Bid};

/// Resolves auctions to outcomes.
#[async_trait]
pub trait AuctionPipeline: Send + Sync {
    async fn submit(&self, auction: &Auction) -> AuctionOutcome;
}

/// Never bids.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBidPipeline;

#[async_trait]
impl AuctionPipeline for NoBidPipeline {
    async fn submit(&self, _auction: &Auction) -> AuctionOutcome {
        AuctionOutcome::NoBid
    }
}

/// Bids a fixed CPM on every spot whose reserve price it clears.
#[derive(Debug, Clone)]
pub struct FixedPricePipeline {
    agent: String,
    price_cpm: f64,
    creative_id: String,
}

impl FixedPricePipeline {
    pub fn new(agent: impl Into<String>, price_cpm: f64) -> Self {
        Self {
            agent: agent.into(),
            price_cpm,
            creative_id: "default".to_string(),
        }
    }

    pub fn with_creative(mut self, creative_id: impl Into<String>) -> Self {
        self.creative_id = creative_id.into();
        self
    }
}

#[async_trait]
impl AuctionPipeline for FixedPricePipeline {
    async fn submit(&self, auction: &Auction) -> AuctionOutcome {
        if auction.time_available_ms <= 0.0 {
            return AuctionOutcome::Dropped("no time available".to_string());
        }

        let bids: Vec<Bid> = auction
            .request
            .spots
            .iter()
            .filter(|spot| spot.reserve_price <= self.price_cpm)
            .map(|spot| Bid {
                spot_id: spot.id.clone(),
                agent: self.agent.clone(),
                price_cpm: self.price_cpm,
                creative_id: self.creative_id.clone(),
                markup: None,
            })
            .collect();

        if bids.is_empty() {
            AuctionOutcome::NoBid
        } else {
            AuctionOutcome::Bid(bids)
        }
    }
}

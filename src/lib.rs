//! HTTP exchange connector for real-time bidding.
//!
//! Accepts auction requests from an ad exchange over HTTP, hands them to an
//! exchange implementation for parsing and timing, runs them through an
//! auction pipeline and writes the exchange-formatted reply.
//!
//! # Architecture Overview
//!
//! ```text
//!   Exchange ──▶ net (listener, transport, connection tracking)
//!                  │
//!                  ▼
//!               handler (registry: one AuctionHandler per connection)
//!                  │
//!                  ▼
//!               http (router, dispatch)
//!                  │        ├──▶ exchange (ExchangeConnector: parse, time, respond)
//!                  │        └──▶ auction (AuctionPipeline: bid / no-bid / drop)
//!                  ▼
//!   Exchange ◀── HttpResponse
//!
//!   Cross-cutting: config, lifecycle, observability, admin
//! ```

pub mod admin;
pub mod auction;
pub mod config;
pub mod error;
pub mod exchange;
pub mod exchanges;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use auction::{Auction, AuctionOutcome, AuctionPipeline, Bid, BidRequest};
pub use config::{ConnectorOptions, ServiceConfig};
pub use error::{ConnectorError, ConnectorResult, RequestError};
pub use exchange::{ExchangeConnector, PingTimeTable};
pub use handler::{AuctionHandler, HandlerRegistry};
pub use http::{HttpHeader, HttpResponse};
pub use lifecycle::{HttpExchangeConnector, ServiceStatus, Shutdown};

//! Exchange connector contract.
//!
//! # Data Flow
//! ```text
//! http::dispatch
//!     → connector.rs (ExchangeConnector: parse, time, respond)
//!     → ping.rs (round-trip estimate used by the timing step)
//!     → compatibility.rs (campaign / creative admission)
//! ```
//!
//! # Design Decisions
//! - Exchange-specific steps are required trait methods, so an incomplete
//!   exchange does not compile
//! - Drop and error replies default to the regular response (no-bid)
//! - The liveness reply is exchange-agnostic

pub mod compatibility;
pub mod connector;
pub mod ping;

pub use compatibility::{AgentConfig, Creative, ExchangeCompatibility, ExchangeFilter};
pub use connector::{unknown_request_response, ExchangeConnector, LIVENESS_RESOURCE};
pub use ping::PingTimeTable;

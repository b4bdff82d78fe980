//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (first free port of the range, backlog, reverse DNS)
//!     → transport.rs (accept loop, one task per connection)
//!     → connection.rs (identity, per-host counts, open/close listeners)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Each connection tracked for status reporting and graceful shutdown
//! - Close listeners fire from a guard, so every exit path reports

pub mod connection;
pub mod listener;
pub mod transport;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionInfo, ConnectionTracker, TransportEvents};
pub use listener::Listener;

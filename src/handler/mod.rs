//! Connection handlers.
//!
//! # Data Flow
//! ```text
//! Transport accepts a connection
//!     → registry.rs (factory builds handler, logger bound, handler registered)
//!     → handler.rs (per-connection state while requests are served)
//!     → registry.rs (released when the connection closes)
//! ```

#[allow(clippy::module_inception)]
pub mod handler;
pub mod registry;

pub use handler::{AuctionHandler, HandlerContext};
pub use registry::{default_handler_factory, HandlerFactory, HandlerRegistry};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Connector, transport and dispatch produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → request_log.rs (raw request/response pairs, opt-in)
//!
//! Consumers:
//!     → stdout log aggregation
//!     → Prometheus scrape endpoint
//!     → Rotating request log files
//! ```

pub mod logging;
pub mod metrics;
pub mod request_log;

pub use logging::init_logging;
pub use metrics::init_metrics;
pub use request_log::{RequestLogEntry, RequestLogger};

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Configure (connector.rs):
//!     JSON parameters → ConnectorOptions (until start)
//!
//! Start (connector.rs):
//!     Build worker pool (runtime.rs) → bind first free port on it → spawn accept loop
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     Signal received → Stop accepting → Drain connections → Close request log
//!         → Stop worker pool
//! ```
//!
//! # Design Decisions
//! - Options are frozen once the connector starts
//! - Shutdown is idempotent and bounded by a drain timeout

pub mod connector;
pub mod runtime;
pub mod shutdown;
pub mod signals;
pub mod status;

pub use connector::{ConnectorCore, ConnectorSettings, HttpExchangeConnector};
pub use runtime::{build_worker_runtime, WorkerPool};
pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use status::ServiceStatus;

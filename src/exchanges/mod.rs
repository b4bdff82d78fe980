//! Exchange implementations.
//!
//! Each exchange implements [`crate::exchange::ExchangeConnector`] and is
//! built from the `exchange` section of the service configuration.

pub mod mock;

pub use mock::{MockExchangeConfig, MockExchangeConnector, MOCK_EXCHANGE_NAME};

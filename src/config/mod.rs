//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig
//!     → connector section applied with ConnectorOptions::apply
//!     → fixed once the connector starts
//! ```
//!
//! # Design Decisions
//! - Option documents are applied incrementally: unknown keys are ignored,
//!   missing keys keep their previous value
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, ConnectorOptions, ObservabilityConfig, PipelineConfig, PortRange,
    RequestLogConfig, ServiceConfig,
};

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (threads > 0, ports ordered, probabilities in [0, 1])
//! - Check that the auction route can actually be matched
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the parsed configuration
//! - Runs before config is accepted into the system

use std::fmt;

use axum::http::Method;

use crate::config::schema::{ConnectorOptions, ServiceConfig};
use crate::exchange::LIVENESS_RESOURCE;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a whole service configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut options = ConnectorOptions::default();
    match options.apply(&config.connector) {
        Ok(()) => errors.extend(check_options(&options)),
        Err(e) => errors.push(ValidationError::new("connector", e.to_string())),
    }

    if let Some(log) = &config.request_log {
        if log.path.trim().is_empty() {
            errors.push(ValidationError::new("requestLog.path", "must not be empty"));
        }
        if log.rotation_count == 0 {
            errors.push(ValidationError::new("requestLog.rotationCount", "must be greater than 0"));
        }
    }

    if let Some(cpm) = config.pipeline.fixed_bid_cpm {
        if !(cpm.is_finite() && cpm > 0.0) {
            errors.push(ValidationError::new("pipeline.fixedBidCpm", "must be a positive number"));
        }
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::new("admin.apiKey", "required when the admin API is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate connector options on their own.
pub fn validate_options(options: &ConnectorOptions) -> Result<(), Vec<ValidationError>> {
    let errors = check_options(options);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_options(options: &ConnectorOptions) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if options.num_threads == 0 {
        errors.push(ValidationError::new("numThreads", "must be greater than 0"));
    }
    if options.listen_port.first > options.listen_port.last {
        errors.push(ValidationError::new(
            "listenPort",
            format!("range {} is reversed", options.listen_port),
        ));
    }
    if options.backlog == 0 {
        errors.push(ValidationError::new("connectionBacklog", "must be greater than 0"));
    }
    if !options.auction_resource.starts_with('/') {
        errors.push(ValidationError::new("auctionResource", "must start with '/'"));
    }
    if options.auction_resource == LIVENESS_RESOURCE {
        errors.push(ValidationError::new(
            "auctionResource",
            format!("'{}' is reserved for liveness checks", LIVENESS_RESOURCE),
        ));
    }
    if Method::from_bytes(options.auction_verb.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "auctionVerb",
            format!("'{}' is not an HTTP method", options.auction_verb),
        ));
    }
    if !is_non_negative(options.ping_time_unknown_hosts_ms) {
        errors.push(ValidationError::new("pingTimeUnknownHostsMs", "must be >= 0"));
    }
    for (host, ms) in &options.ping_times_by_host_ms {
        if !is_non_negative(*ms) {
            errors.push(ValidationError::new(
                "pingTimesByHostMs",
                format!("negative ping time for {}", host),
            ));
        }
    }
    if !(0.0..=1.0).contains(&options.accept_auction_probability) {
        errors.push(ValidationError::new("acceptAuctionProbability", "must be within [0, 1]"));
    }

    errors
}

fn is_non_negative(value: f64) -> bool {
    value >= 0.0
}

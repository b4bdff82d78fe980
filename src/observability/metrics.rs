//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define connector metrics (connection events, auctions, latency)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `exchange_connector_events_total` (counter): connection events by `event`
//! - `exchange_auction_requests_total` (counter): requests by exchange, outcome
//! - `exchange_request_duration_seconds` (histogram): handling latency
//! - `exchange_time_available_ms` (histogram): bidder budget per auction
//! - `exchange_active_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op, so tests and
//!   embedders never need to initialize anything
//! - Histogram buckets tuned for sub-100ms auction deadlines

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Event recorded when a connection is accepted.
pub const EVENT_NEW_CONNECTION: &str = "auction_new_connection";

/// Event recorded when a connection closes.
pub const EVENT_CLOSED_CONNECTION: &str = "auction_closed_connection";

const REQUEST_SECONDS_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

const TIME_AVAILABLE_MS_BUCKETS: &[f64] = &[0.0, 5.0, 10.0, 20.0, 40.0, 60.0, 80.0, 100.0, 150.0, 250.0];

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("exchange_request_duration_seconds".to_string()),
            REQUEST_SECONDS_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full("exchange_time_available_ms".to_string()),
            TIME_AVAILABLE_MS_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Count a named connector event.
pub fn record_hit(event: &'static str) {
    metrics::counter!("exchange_connector_events_total", "event" => event).increment(1);
}

/// Record one handled request and its latency.
pub fn record_auction_request(exchange: &str, outcome: &'static str, start: Instant) {
    let exchange = exchange.to_string();
    metrics::counter!(
        "exchange_auction_requests_total",
        "exchange" => exchange.clone(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("exchange_request_duration_seconds", "exchange" => exchange)
        .record(start.elapsed().as_secs_f64());
}

/// Record the time left for bidders on an accepted auction.
pub fn record_time_available(exchange: &str, time_available_ms: f64) {
    metrics::histogram!("exchange_time_available_ms", "exchange" => exchange.to_string())
        .record(time_available_ms);
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("exchange_active_connections").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_exporter_is_noop() {
        record_hit(EVENT_NEW_CONNECTION);
        record_auction_request("mock", "bid", Instant::now());
        record_time_available("mock", 42.0);
        set_active_connections(3);
    }
}

//! Configuration schema definitions.
//!
//! This module defines the connector options and the service-level
//! configuration file structure. All types derive Serde traits; keys are
//! camelCase to match the options exchanges are usually configured with.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::config::loader::ConfigError;

/// Default accept queue depth.
pub const DEFAULT_BACKLOG: u32 = 128;

/// Default round trip assumed for peers missing from `pingTimesByHostMs`.
pub const DEFAULT_PING_TIME_UNKNOWN_HOSTS_MS: f64 = 20.0;

/// Root configuration for the connector service binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Raw connector options, applied through `HttpExchangeConnector::configure`.
    pub connector: Value,

    /// Exchange-specific options handed to the exchange implementation.
    pub exchange: Value,

    /// Auction pipeline settings.
    pub pipeline: PipelineConfig,

    /// Optional raw request logging enabled at startup.
    pub request_log: Option<RequestLogConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            connector: Value::Object(Default::default()),
            exchange: Value::Object(Default::default()),
            pipeline: PipelineConfig::default(),
            request_log: None,
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// HTTP connector options.
///
/// Applied incrementally: every recognized key overwrites the current value,
/// every missing key keeps it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectorOptions {
    /// Worker threads serving connections.
    pub num_threads: usize,

    /// OS real-time priority for workers; negative keeps the default scheduler.
    pub real_time_priority: i32,

    /// Port or port range to listen on; the first free port wins.
    pub listen_port: PortRange,

    /// Bind address, `*` for all interfaces.
    pub bind_host: String,

    /// Resolve peer names with reverse DNS on accept.
    pub perform_name_lookup: bool,

    /// Accept queue depth.
    #[serde(rename = "connectionBacklog")]
    pub backlog: u32,

    /// Resource path auction requests arrive on.
    pub auction_resource: String,

    /// HTTP verb auction requests use.
    pub auction_verb: String,

    /// Estimated round trip per peer, in milliseconds.
    pub ping_times_by_host_ms: HashMap<String, f64>,

    /// Round trip assumed for peers without an entry.
    pub ping_time_unknown_hosts_ms: f64,

    /// Fraction of auction requests accepted; the rest are answered as dropped.
    pub accept_auction_probability: f64,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            num_threads: 8,
            real_time_priority: -1,
            listen_port: PortRange::single(10001),
            bind_host: "*".to_string(),
            perform_name_lookup: true,
            backlog: DEFAULT_BACKLOG,
            auction_resource: "/auctions".to_string(),
            auction_verb: "POST".to_string(),
            ping_times_by_host_ms: HashMap::new(),
            ping_time_unknown_hosts_ms: DEFAULT_PING_TIME_UNKNOWN_HOSTS_MS,
            accept_auction_probability: 1.0,
        }
    }
}

impl ConnectorOptions {
    /// Apply a JSON parameter document on top of the current values.
    ///
    /// Unknown keys are ignored and `null` counts as absent. A recognized key
    /// holding a value of the wrong type is rejected and leaves `self` untouched.
    pub fn apply(&mut self, params: &Value) -> Result<(), ConfigError> {
        if !params.is_object() {
            return Err(ConfigError::InvalidParameter {
                name: "<root>".to_string(),
                reason: "connector options must be an object".to_string(),
            });
        }

        let mut next = self.clone();
        get_param(params, &mut next.num_threads, "numThreads")?;
        get_param(params, &mut next.real_time_priority, "realTimePriority")?;
        get_param(params, &mut next.listen_port, "listenPort")?;
        get_param(params, &mut next.bind_host, "bindHost")?;
        get_param(params, &mut next.perform_name_lookup, "performNameLookup")?;
        get_param(params, &mut next.backlog, "connectionBacklog")?;
        get_param(params, &mut next.auction_resource, "auctionResource")?;
        get_param(params, &mut next.auction_verb, "auctionVerb")?;
        get_param(params, &mut next.ping_times_by_host_ms, "pingTimesByHostMs")?;
        get_param(params, &mut next.ping_time_unknown_hosts_ms, "pingTimeUnknownHostsMs")?;
        get_param(params, &mut next.accept_auction_probability, "acceptAuctionProbability")?;

        *self = next;
        Ok(())
    }

    /// Host to bind, with `*` mapped to the IPv4 wildcard.
    pub fn bind_ip(&self) -> &str {
        match self.bind_host.as_str() {
            "*" | "" => "0.0.0.0",
            host => host,
        }
    }
}

fn get_param<T: DeserializeOwned>(params: &Value, target: &mut T, name: &str) -> Result<(), ConfigError> {
    if let Some(value) = params.get(name).filter(|v| !v.is_null()) {
        *target = T::deserialize(value).map_err(|e| ConfigError::InvalidParameter {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Inclusive range of TCP ports.
///
/// Deserializes from a number (`10001`), a string (`"10001"` or
/// `"10001-10010"`) or an object (`{"first": 10001, "last": 10010}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortRange {
    pub first: u16,
    pub last: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self { first: port, last: port }
    }

    pub fn new(first: u16, last: u16) -> Self {
        Self { first, last }
    }

    pub fn ports(&self) -> RangeInclusive<u16> {
        self.first..=self.last
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

impl FromStr for PortRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |p: &str| {
            p.trim()
                .parse::<u16>()
                .map_err(|e| format!("invalid port '{}': {}", p.trim(), e))
        };
        match s.split_once('-') {
            Some((first, last)) => Ok(Self::new(parse(first)?, parse(last)?)),
            None => Ok(Self::single(parse(s)?)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRangeRepr {
    Single(u16),
    Text(String),
    Range { first: u16, last: u16 },
}

impl<'de> Deserialize<'de> for PortRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match PortRangeRepr::deserialize(deserializer)? {
            PortRangeRepr::Single(port) => Ok(Self::single(port)),
            PortRangeRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            PortRangeRepr::Range { first, last } => Ok(Self::new(first, last)),
        }
    }
}

/// Auction pipeline settings for the service binary.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Bid this CPM on every ad spot; no-bid everything when unset.
    pub fixed_bid_cpm: Option<f64>,
}

/// Raw request logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogConfig {
    /// Log file path; rotated files get a numeric suffix.
    pub path: String,

    /// Entries per file before rotating.
    #[serde(default = "default_rotation_count")]
    pub rotation_count: usize,
}

fn default_rotation_count() -> usize {
    10_000
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_overwrites_known_keys_only() {
        let mut options = ConnectorOptions::default();
        options
            .apply(&json!({
                "numThreads": 2,
                "auctionResource": "/bid",
                "auctionVerb": "POST",
                "pingTimesByHostMs": { "10.0.0.1": 7.5 },
                "somethingElse": true
            }))
            .unwrap();

        assert_eq!(options.num_threads, 2);
        assert_eq!(options.auction_resource, "/bid");
        assert_eq!(options.ping_times_by_host_ms.get("10.0.0.1"), Some(&7.5));
        // untouched
        assert_eq!(options.backlog, DEFAULT_BACKLOG);
        assert_eq!(options.ping_time_unknown_hosts_ms, DEFAULT_PING_TIME_UNKNOWN_HOSTS_MS);
    }

    #[test]
    fn apply_rejects_wrong_type_without_partial_update() {
        let mut options = ConnectorOptions::default();
        let err = options
            .apply(&json!({ "numThreads": 4, "connectionBacklog": "lots" }))
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidParameter { ref name, .. } if name == "connectionBacklog"));
        assert_eq!(options, ConnectorOptions::default());
    }

    #[test]
    fn port_range_formats() {
        let single: PortRange = serde_json::from_value(json!(9000)).unwrap();
        assert_eq!(single, PortRange::single(9000));

        let text: PortRange = serde_json::from_value(json!("9000-9005")).unwrap();
        assert_eq!(text, PortRange::new(9000, 9005));

        let object: PortRange = serde_json::from_value(json!({ "first": 1, "last": 2 })).unwrap();
        assert_eq!(object, PortRange::new(1, 2));

        assert!(serde_json::from_value::<PortRange>(json!("nope")).is_err());
        assert_eq!(PortRange::new(9000, 9005).to_string(), "9000-9005");
    }

    #[test]
    fn wildcard_bind_host() {
        let mut options = ConnectorOptions::default();
        assert_eq!(options.bind_ip(), "0.0.0.0");
        options.bind_host = "127.0.0.1".into();
        assert_eq!(options.bind_ip(), "127.0.0.1");
    }
}

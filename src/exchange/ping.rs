//! Per-peer round-trip estimates.

use std::collections::HashMap;

use crate::config::ConnectorOptions;

/// Estimated network round trip to each known peer, with a fallback for the
/// rest. Populated from configuration only; lookups never mutate it.
#[derive(Debug, Clone, PartialEq)]
pub struct PingTimeTable {
    by_host_ms: HashMap<String, f64>,
    unknown_host_ms: f64,
}

impl PingTimeTable {
    pub fn new(by_host_ms: HashMap<String, f64>, unknown_host_ms: f64) -> Self {
        Self {
            by_host_ms,
            unknown_host_ms,
        }
    }

    pub fn from_options(options: &ConnectorOptions) -> Self {
        Self::new(
            options.ping_times_by_host_ms.clone(),
            options.ping_time_unknown_hosts_ms,
        )
    }

    /// Round trip to `peer` in milliseconds: the configured value for an exact
    /// match, otherwise the unknown-peer default.
    pub fn estimate(&self, peer: &str) -> f64 {
        self.by_host_ms
            .get(peer)
            .copied()
            .unwrap_or(self.unknown_host_ms)
    }

    pub fn unknown_host_ms(&self) -> f64 {
        self.unknown_host_ms
    }

    pub fn len(&self) -> usize {
        self.by_host_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host_ms.is_empty()
    }
}

impl Default for PingTimeTable {
    fn default() -> Self {
        Self::from_options(&ConnectorOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_peers_get_configured_value() {
        let table = PingTimeTable::new(
            HashMap::from([
                ("10.0.0.1".to_string(), 3.5),
                ("adx.example".to_string(), 12.0),
            ]),
            40.0,
        );

        assert_eq!(table.estimate("10.0.0.1"), 3.5);
        assert_eq!(table.estimate("adx.example"), 12.0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn unknown_peers_get_default() {
        let table = PingTimeTable::new(HashMap::from([("10.0.0.1".to_string(), 3.5)]), 40.0);

        assert_eq!(table.estimate("10.0.0.2"), 40.0);
        // exact match only
        assert_eq!(table.estimate("10.0.0.1 "), 40.0);
        assert_eq!(table.estimate(""), 40.0);
    }

    #[test]
    fn default_table_uses_default_options() {
        let table = PingTimeTable::default();
        assert!(table.is_empty());
        assert_eq!(table.estimate("anyone"), 20.0);
    }
}

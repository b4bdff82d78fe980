//! Connection statistics reported by the connector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::net::connection::ConnectionTracker;

/// Snapshot of the connector's connection load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    /// Open connections.
    pub num_connections: u64,
    /// Connections with a request being served right now, whatever its
    /// resource.
    pub active_connections: u64,
    /// `active_connections / num_connections`, 0 with no connections.
    pub connection_load_factor: f64,
    /// Open connections per peer.
    pub host_connections: BTreeMap<String, u64>,
}

impl ServiceStatus {
    pub fn collect(tracker: &ConnectionTracker, serving: u64) -> Self {
        let num_connections = tracker.active_count();
        // Serving is counted outside the tracker; never report more than open.
        let active_connections = serving.min(num_connections);
        Self {
            num_connections,
            active_connections,
            connection_load_factor: load_factor(active_connections, num_connections),
            host_connections: tracker
                .connections_by_host()
                .into_iter()
                .map(|(host, count)| (host, count as u64))
                .collect(),
        }
    }
}

pub fn load_factor(active: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        active as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::ConnectionInfo;

    #[test]
    fn empty_tracker_reports_zero_load() {
        let status = ServiceStatus::collect(&ConnectionTracker::new(), 0);
        assert_eq!(status, ServiceStatus::default());
        assert_eq!(status.connection_load_factor, 0.0);
    }

    #[test]
    fn load_factor_from_serving_count() {
        let tracker = ConnectionTracker::new();
        let _a = tracker.track(ConnectionInfo::new("10.0.0.1:1".parse().unwrap(), None));
        let _b = tracker.track(ConnectionInfo::new("10.0.0.1:2".parse().unwrap(), None));
        let _c = tracker.track(ConnectionInfo::new("10.0.0.2:1".parse().unwrap(), None));
        let _d = tracker.track(ConnectionInfo::new("10.0.0.3:1".parse().unwrap(), None));

        let status = ServiceStatus::collect(&tracker, 1);
        assert_eq!(status.num_connections, 4);
        assert_eq!(status.active_connections, 1);
        assert_eq!(status.connection_load_factor, 0.25);
        assert_eq!(status.host_connections.get("10.0.0.1"), Some(&2));
        assert_eq!(status.host_connections.len(), 3);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(ServiceStatus::default()).unwrap();
        assert!(json.get("numConnections").is_some());
        assert!(json.get("connectionLoadFactor").is_some());
        assert!(json.get("hostConnections").is_some());
    }
}

//! Normalized bid request.

use serde::{Deserialize, Serialize};

/// Creative format (width x height) an ad spot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdFormat {
    pub width: u32,
    pub height: u32,
}

impl AdFormat {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for AdFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One impression opportunity within a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdSpot {
    pub id: String,
    pub formats: Vec<AdFormat>,
    /// Floor price in CPM.
    #[serde(default)]
    pub reserve_price: f64,
}

/// Exchange-independent representation of an auction opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    /// Exchange-assigned auction id.
    pub id: String,
    /// Exchange the request came from.
    pub exchange: String,
    /// Unix time the request was received, in milliseconds.
    pub timestamp_ms: u64,
    pub spots: Vec<AdSpot>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    /// Deadline the exchange declared, in milliseconds.
    #[serde(default)]
    pub tmax_ms: Option<f64>,
    /// Exchange-specific fields the model does not cover.
    #[serde(default)]
    pub ext: serde_json::Value,
}

impl BidRequest {
    pub fn new(id: impl Into<String>, exchange: impl Into<String>) -> Self {
        let timestamp_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            id: id.into(),
            exchange: exchange.into(),
            timestamp_ms,
            spots: Vec::new(),
            url: None,
            user_agent: None,
            ip: None,
            tmax_ms: None,
            ext: serde_json::Value::Null,
        }
    }

    pub fn spot(&self, id: &str) -> Option<&AdSpot> {
        self.spots.iter().find(|s| s.id == id)
    }
}

//! Campaign and creative compatibility.
//!
//! Exchanges decide whether a campaign (agent configuration) or a creative may
//! take part in their auctions. The generic decisions here apply no
//! exchange-specific targeting; exchanges layer their own rules on top.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::auction::AdFormat;

/// Include/exclude list of exchange names. An empty include list admits all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ExchangeFilter {
    pub fn is_included(&self, exchange: &str) -> bool {
        (self.include.is_empty() || self.include.iter().any(|e| e == exchange))
            && !self.exclude.iter().any(|e| e == exchange)
    }
}

/// A creative an agent can serve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creative {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub format: AdFormat,
    /// Per-exchange creative attributes, keyed by exchange name.
    #[serde(default)]
    pub provider_config: HashMap<String, Value>,
}

/// The parts of a bidding agent's configuration exchanges look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    pub account: Vec<String>,
    pub exchange_filter: ExchangeFilter,
    pub creatives: Vec<Creative>,
    /// Per-exchange campaign attributes, keyed by exchange name.
    pub provider_config: HashMap<String, Value>,
}

/// Whether something may participate in an exchange's auctions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeCompatibility {
    pub is_compatible: bool,
    /// Why it is not compatible; only filled when reasons were requested.
    pub reasons: Vec<String>,
    /// Exchange-specific data cached for use at bid time.
    pub info: Option<Value>,
}

impl ExchangeCompatibility {
    pub fn compatible() -> Self {
        Self {
            is_compatible: true,
            reasons: Vec::new(),
            info: None,
        }
    }

    pub fn incompatible(reason: impl Into<String>, include_reasons: bool) -> Self {
        let mut result = Self::compatible();
        result.set_incompatible(reason, include_reasons);
        result
    }

    /// Mark incompatible, recording `reason` when reasons are requested.
    pub fn set_incompatible(&mut self, reason: impl Into<String>, include_reasons: bool) {
        self.is_compatible = false;
        if include_reasons {
            self.reasons.push(reason.into());
        }
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }
}

/// Exchange-agnostic campaign decision: only the agent's exchange filter is
/// consulted.
pub fn generic_campaign_compatibility(
    exchange: &str,
    config: &AgentConfig,
    include_reasons: bool,
) -> ExchangeCompatibility {
    if config.exchange_filter.is_included(exchange) {
        ExchangeCompatibility::compatible()
    } else {
        ExchangeCompatibility::incompatible(
            format!("exchange {} excluded by exchange filter", exchange),
            include_reasons,
        )
    }
}

/// Exchange-agnostic creative decision: the creative needs a usable format.
pub fn generic_creative_compatibility(creative: &Creative, include_reasons: bool) -> ExchangeCompatibility {
    if creative.format.is_valid() {
        ExchangeCompatibility::compatible()
    } else {
        ExchangeCompatibility::incompatible(
            format!("creative {} has invalid format {}", creative.id, creative.format),
            include_reasons,
        )
    }
}

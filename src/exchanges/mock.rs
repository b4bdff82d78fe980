//! OpenRTB-flavoured JSON exchange.
//!
//! Requests look like
//! ```json
//! {"id": "a1", "tmax": 80, "imp": [{"id": "1", "w": 300, "h": 250, "bidfloor": 0.5}],
//!  "site": {"page": "https://..."}, "device": {"ua": "...", "ip": "..."}}
//! ```
//! Bids are answered `200 application/json` with a `seatbid` array, one seat
//! per bidding agent; everything else is a `204`.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::auction::{AdFormat, AdSpot, Auction, BidRequest};
use crate::config::ConfigError;
use crate::error::RequestError;
use crate::exchange::compatibility::{AgentConfig, Creative, ExchangeCompatibility};
use crate::exchange::ExchangeConnector;
use crate::handler::AuctionHandler;
use crate::http::{HttpHeader, HttpResponse};

pub const MOCK_EXCHANGE_NAME: &str = "mock";

/// IAB standard display sizes accepted with `strictSizes`.
const STANDARD_SIZES: &[(u32, u32)] = &[
    (300, 250),
    (728, 90),
    (160, 600),
    (300, 600),
    (320, 50),
    (320, 100),
    (336, 280),
    (468, 60),
    (970, 90),
    (970, 250),
];

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockExchangeConfig {
    /// Exchange name used in logs, metrics and exchange filters.
    pub name: String,
    /// Deadline assumed when a request carries no `tmax`.
    pub default_tmax_ms: f64,
    /// Time reserved for our own processing.
    pub processing_overhead_ms: f64,
    /// Only admit creatives with IAB standard sizes.
    pub strict_sizes: bool,
}

impl Default for MockExchangeConfig {
    fn default() -> Self {
        Self {
            name: MOCK_EXCHANGE_NAME.to_string(),
            default_tmax_ms: 100.0,
            processing_overhead_ms: 5.0,
            strict_sizes: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MockRequest {
    id: String,
    #[serde(default)]
    tmax: Option<f64>,
    #[serde(default)]
    imp: Vec<MockImp>,
    #[serde(default)]
    site: Option<MockSite>,
    #[serde(default)]
    device: Option<MockDevice>,
    #[serde(default)]
    ext: Value,
}

#[derive(Debug, Deserialize)]
struct MockImp {
    id: String,
    w: u32,
    h: u32,
    #[serde(default)]
    bidfloor: f64,
}

#[derive(Debug, Deserialize)]
struct MockSite {
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MockDevice {
    ua: Option<String>,
    ip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Deadline {
    #[serde(default)]
    tmax: Option<f64>,
}

/// Exchange speaking the mock JSON protocol.
#[derive(Debug, Clone, Default)]
pub struct MockExchangeConnector {
    config: MockExchangeConfig,
}

impl MockExchangeConnector {
    pub fn new(config: MockExchangeConfig) -> Self {
        Self { config }
    }

    /// Build from the `exchange` section of the service configuration.
    /// `null` gives the defaults.
    pub fn from_config(value: &Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config = MockExchangeConfig::deserialize(value).map_err(|e| ConfigError::InvalidParameter {
            name: "exchange".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &MockExchangeConfig {
        &self.config
    }
}

fn parse_json<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T, RequestError> {
    serde_json::from_slice(payload).map_err(|e| RequestError::parse(format!("invalid bid request: {}", e)))
}

impl ExchangeConnector for MockExchangeConnector {
    fn exchange_name(&self) -> &str {
        &self.config.name
    }

    fn parse_bid_request(
        &self,
        _handler: &AuctionHandler,
        header: &HttpHeader,
        payload: &[u8],
    ) -> Result<BidRequest, RequestError> {
        if let Some(content_type) = header.content_type() {
            if !content_type.starts_with("application/json") {
                return Err(RequestError::parse(format!("unsupported content type {}", content_type)));
            }
        }

        let raw: MockRequest = parse_json(payload)?;
        if raw.imp.is_empty() {
            return Err(RequestError::parse(format!("bid request {} has no impressions", raw.id)));
        }

        let mut request = BidRequest::new(raw.id, self.exchange_name());
        request.tmax_ms = raw.tmax;
        request.spots = raw
            .imp
            .into_iter()
            .map(|imp| AdSpot {
                id: imp.id,
                formats: vec![AdFormat::new(imp.w, imp.h)],
                reserve_price: imp.bidfloor,
            })
            .collect();
        request.url = raw.site.and_then(|site| site.page);
        if let Some(device) = raw.device {
            request.user_agent = device.ua;
            request.ip = device.ip;
        }
        request.ext = raw.ext;
        Ok(request)
    }

    fn get_time_available_ms(
        &self,
        handler: &AuctionHandler,
        header: &HttpHeader,
        payload: &[u8],
    ) -> Result<f64, RequestError> {
        let deadline: Deadline = parse_json(payload)?;
        let tmax = deadline.tmax.unwrap_or(self.config.default_tmax_ms);
        let available = tmax - self.get_round_trip_time_ms(handler, header) - self.config.processing_overhead_ms;
        Ok(available.max(0.0))
    }

    fn get_response(&self, _handler: &AuctionHandler, _header: &HttpHeader, auction: &Auction) -> HttpResponse {
        let bids = auction.bids();
        if bids.is_empty() {
            return HttpResponse::no_content();
        }

        let mut seats: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
        for bid in bids {
            let mut entry = json!({
                "id": format!("{}-{}", auction.id, bid.spot_id),
                "impid": bid.spot_id,
                "price": bid.price_cpm,
                "crid": bid.creative_id,
            });
            if let Some(markup) = &bid.markup {
                entry["adm"] = Value::String(markup.clone());
            }
            seats.entry(bid.agent.as_str()).or_default().push(entry);
        }

        let seatbid: Vec<Value> = seats
            .into_iter()
            .map(|(seat, bid)| json!({ "seat": seat, "bid": bid }))
            .collect();
        HttpResponse::json(
            StatusCode::OK,
            &json!({ "id": auction.request.id, "seatbid": seatbid }),
        )
    }

    fn get_campaign_compatibility(&self, config: &AgentConfig, include_reasons: bool) -> ExchangeCompatibility {
        let mut result = crate::exchange::compatibility::generic_campaign_compatibility(
            self.exchange_name(),
            config,
            include_reasons,
        );

        let seat = config
            .provider_config
            .get(self.exchange_name())
            .and_then(|provider| provider.get("seat"))
            .and_then(Value::as_str);
        match seat {
            Some(seat) if result.is_compatible => result.with_info(json!({ "seat": seat })),
            Some(_) => result,
            None => {
                result.set_incompatible(
                    format!("providerConfig.{}.seat is required", self.exchange_name()),
                    include_reasons,
                );
                result
            }
        }
    }

    fn get_creative_compatibility(&self, creative: &Creative, include_reasons: bool) -> ExchangeCompatibility {
        let mut result = crate::exchange::compatibility::generic_creative_compatibility(creative, include_reasons);
        let size = (creative.format.width, creative.format.height);
        if self.config.strict_sizes && !STANDARD_SIZES.contains(&size) {
            result.set_incompatible(
                format!("creative {} size {} is not a standard size", creative.id, creative.format),
                include_reasons,
            );
        }
        result
    }
}

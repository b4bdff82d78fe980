//! Shared utilities for integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_exchange_connector::auction::{AuctionPipeline, FixedPricePipeline, NoBidPipeline};
use http_exchange_connector::exchanges::MockExchangeConnector;
use http_exchange_connector::{ExchangeConnector, HttpExchangeConnector};

pub const AUCTION_RESOURCE: &str = "/auctions";

/// Options for a connector on an ephemeral loopback port.
pub fn local_params() -> Value {
    json!({
        "listenPort": 0,
        "bindHost": "127.0.0.1",
        "performNameLookup": false,
        "auctionResource": AUCTION_RESOURCE,
        "auctionVerb": "POST"
    })
}

/// Start a mock-exchange connector with `pipeline` and extra `params`.
pub async fn start_connector(
    pipeline: Arc<dyn AuctionPipeline>,
    params: Value,
) -> (Arc<HttpExchangeConnector>, SocketAddr) {
    start_with_exchange(Arc::new(MockExchangeConnector::default()), pipeline, params).await
}

/// Start a connector for `exchange` on a loopback port.
pub async fn start_with_exchange(
    exchange: Arc<dyn ExchangeConnector>,
    pipeline: Arc<dyn AuctionPipeline>,
    params: Value,
) -> (Arc<HttpExchangeConnector>, SocketAddr) {
    let connector = HttpExchangeConnector::new("it", exchange, pipeline).with_drain_timeout(Duration::from_secs(2));
    connector.configure(&local_params()).unwrap();
    connector.configure(&params).unwrap();
    let addr = connector.start().await.unwrap();
    (Arc::new(connector), addr)
}

pub async fn start_bidding(price: f64) -> (Arc<HttpExchangeConnector>, SocketAddr) {
    start_connector(Arc::new(FixedPricePipeline::new("agent-1", price)), json!({})).await
}

pub async fn start_no_bid() -> (Arc<HttpExchangeConnector>, SocketAddr) {
    start_connector(Arc::new(NoBidPipeline), json!({})).await
}

/// Client keeping at most one idle connection, so sequential requests share it.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(1)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

/// A two-impression request; the second impression has a 2.0 floor.
pub fn bid_request(id: &str, tmax: u32) -> Value {
    json!({
        "id": id,
        "tmax": tmax,
        "imp": [
            { "id": "1", "w": 300, "h": 250 },
            { "id": "2", "w": 728, "h": 90, "bidfloor": 2.0 }
        ],
        "device": { "ua": "integration-test", "ip": "192.0.2.1" }
    })
}

pub async fn post_auction(client: &reqwest::Client, addr: SocketAddr, body: &Value) -> reqwest::Response {
    client
        .post(url(addr, AUCTION_RESOURCE))
        .json(body)
        .send()
        .await
        .expect("connector unreachable")
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

//! End-to-end request handling through the mock exchange.

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

use http_exchange_connector::auction::{Auction, AuctionOutcome, AuctionPipeline, BidRequest, NoBidPipeline};
use http_exchange_connector::exchanges::MockExchangeConnector;
use http_exchange_connector::{AuctionHandler, ConnectorError, ExchangeConnector, HttpExchangeConnector, HttpHeader, HttpResponse, RequestError};

mod common;

#[tokio::test]
async fn bid_is_returned_as_seatbid() {
    let (connector, addr) = common::start_bidding(1.0).await;
    let client = common::client();

    let res = common::post_auction(&client, addr, &common::bid_request("a-1", 100)).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], "a-1");
    let bids = body["seatbid"][0]["bid"].as_array().unwrap();
    // Floor of impression 2 is above the fixed price.
    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0]["impid"], "1");
    assert_eq!(body["seatbid"][0]["seat"], "agent-1");

    connector.shutdown().await;
}

#[tokio::test]
async fn no_bid_is_no_content() {
    let (connector, addr) = common::start_no_bid().await;
    let res = common::post_auction(&common::client(), addr, &common::bid_request("a-2", 100)).await;
    assert_eq!(res.status(), 204);
    assert!(res.bytes().await.unwrap().is_empty());
    connector.shutdown().await;
}

#[tokio::test]
async fn liveness_on_any_verb() {
    let (connector, addr) = common::start_no_bid().await;
    let client = common::client();

    for res in [
        client.get(common::url(addr, "/ready")).send().await.unwrap(),
        client.post(common::url(addr, "/ready")).body("x").send().await.unwrap(),
    ] {
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["content-type"], "text/plain");
        assert_eq!(res.text().await.unwrap(), "1");
    }
    connector.shutdown().await;
}

/// Mock exchange that answers every unknown resource itself, reporting how
/// many requests the connector is serving at that moment.
struct CatchAllExchange(MockExchangeConnector);

impl ExchangeConnector for CatchAllExchange {
    fn exchange_name(&self) -> &str {
        self.0.exchange_name()
    }

    fn parse_bid_request(&self, handler: &AuctionHandler, header: &HttpHeader, payload: &[u8]) -> Result<BidRequest, RequestError> {
        self.0.parse_bid_request(handler, header, payload)
    }

    fn get_time_available_ms(&self, handler: &AuctionHandler, header: &HttpHeader, payload: &[u8]) -> Result<f64, RequestError> {
        self.0.get_time_available_ms(handler, header, payload)
    }

    fn get_response(&self, handler: &AuctionHandler, header: &HttpHeader, auction: &Auction) -> HttpResponse {
        self.0.get_response(handler, header, auction)
    }

    fn handle_unknown_request(&self, handler: &AuctionHandler, _header: &HttpHeader, _payload: &[u8]) -> HttpResponse {
        let serving = handler.connector().map(|core| core.num_serving()).unwrap_or(0);
        HttpResponse::new(StatusCode::NOT_FOUND, "text/plain", format!("serving={}", serving))
    }
}

#[tokio::test]
async fn liveness_survives_exchange_override() {
    let exchange = Arc::new(CatchAllExchange(MockExchangeConnector::default()));
    let (connector, addr) = common::start_with_exchange(exchange, Arc::new(NoBidPipeline), json!({})).await;
    let client = common::client();

    let res = client.get(common::url(addr, "/ready")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "1");

    // Unknown resources still reach the override, and count as in flight.
    let res = client.get(common::url(addr, "/elsewhere")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "serving=1");
    assert_eq!(connector.num_serving_request(), 0);

    connector.shutdown().await;
}

#[test]
fn liveness_path_cannot_be_the_auction_resource() {
    let connector = HttpExchangeConnector::new(
        "it",
        Arc::new(MockExchangeConnector::default()),
        Arc::new(NoBidPipeline),
    );
    let err = connector.configure(&json!({ "auctionResource": "/ready" })).unwrap_err();
    assert!(matches!(err, ConnectorError::Config(_)));
    assert_eq!(connector.options().auction_resource, "/auctions");
}

#[tokio::test]
async fn unknown_resource_names_path() {
    let (connector, addr) = common::start_no_bid().await;
    let res = common::client()
        .get(common::url(addr, "/favicon.ico"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("/favicon.ico"));
    connector.shutdown().await;
}

#[tokio::test]
async fn wrong_verb_keeps_connection_open() {
    let (connector, addr) = common::start_no_bid().await;
    let client = common::client();

    let res = client.get(common::url(addr, common::AUCTION_RESOURCE)).send().await.unwrap();
    assert_eq!(res.status(), 405);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("POST"));

    let res = common::post_auction(&client, addr, &common::bid_request("a-3", 100)).await;
    assert_eq!(res.status(), 204);

    let status = connector.get_service_status();
    assert_eq!(status.num_connections, 1);
    let handlers = connector.core().registry().handlers();
    assert_eq!(handlers.len(), 1);
    assert_eq!(handlers[0].requests_handled(), 2);

    connector.shutdown().await;
}

#[tokio::test]
async fn malformed_request_is_bad_request() {
    let (connector, addr) = common::start_bidding(1.0).await;
    let client = common::client();

    let res = client
        .post(common::url(addr, common::AUCTION_RESOURCE))
        .header("content-type", "application/json")
        .body("{\"id\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid bid request"));

    // Same connection still serves auctions.
    let res = common::post_auction(&client, addr, &common::bid_request("a-4", 100)).await;
    assert_eq!(res.status(), 200);
    connector.shutdown().await;
}

#[tokio::test]
async fn sampled_out_auctions_are_dropped() {
    let (connector, addr) = common::start_connector(
        Arc::new(http_exchange_connector::auction::FixedPricePipeline::new("agent-1", 1.0)),
        json!({ "acceptAuctionProbability": 0.0 }),
    )
    .await;

    let client = common::client();
    let res = common::post_auction(&client, addr, &common::bid_request("a-5", 100)).await;
    assert_eq!(res.status(), 204);

    // Parsing precedes sampling: a malformed request is still rejected.
    let res = common::post_auction(&client, addr, &json!({ "id": "a-6", "imp": [] })).await;
    assert_eq!(res.status(), 400);
    connector.shutdown().await;
}

#[tokio::test]
async fn ping_table_shrinks_time_available() {
    let params = json!({ "pingTimesByHostMs": { "127.0.0.1": 30.0 } });
    let (connector, addr) = common::start_connector(
        Arc::new(http_exchange_connector::auction::FixedPricePipeline::new("agent-1", 1.0)),
        params,
    )
    .await;
    let client = common::client();

    // 40 - 30 round trip - 5 overhead leaves time to bid.
    let res = common::post_auction(&client, addr, &common::bid_request("a-6", 40)).await;
    assert_eq!(res.status(), 200);

    // 30 - 30 - 5 leaves none; the pipeline drops the auction.
    let res = common::post_auction(&client, addr, &common::bid_request("a-7", 30)).await;
    assert_eq!(res.status(), 204);
    connector.shutdown().await;
}

struct FailingPipeline;

#[async_trait]
impl AuctionPipeline for FailingPipeline {
    async fn submit(&self, _auction: &Auction) -> AuctionOutcome {
        AuctionOutcome::Error("router unavailable".to_string())
    }
}

#[tokio::test]
async fn pipeline_error_reads_as_no_bid() {
    let (connector, addr) = common::start_connector(Arc::new(FailingPipeline), json!({})).await;
    let res = common::post_auction(&common::client(), addr, &common::bid_request("a-8", 100)).await;
    assert_eq!(res.status(), 204);
    connector.shutdown().await;
}

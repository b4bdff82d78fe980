//! Connection tracking, request logging and shutdown.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;
use std::sync::{Arc, Mutex};

use http_exchange_connector::auction::{Auction, AuctionOutcome, AuctionPipeline};
use http_exchange_connector::handler::{AuctionHandler, HandlerContext};
use http_exchange_connector::ConnectorError;

mod common;

#[tokio::test]
async fn status_counts_connections_per_host() {
    let (connector, addr) = common::start_no_bid().await;
    let first = common::client();
    let second = common::client();

    for client in [&first, &second] {
        let res = client.get(common::url(addr, "/ready")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    let status = connector.get_service_status();
    assert_eq!(status.num_connections, 2);
    assert_eq!(status.active_connections, 0);
    assert_eq!(status.connection_load_factor, 0.0);
    assert_eq!(status.host_connections.get("127.0.0.1"), Some(&2));

    drop(first);
    drop(second);
    assert!(common::eventually(|| connector.get_service_status().num_connections == 0).await);
    assert!(connector.core().registry().is_empty());
    connector.shutdown().await;
}

#[tokio::test]
async fn request_log_records_each_exchange() {
    let (connector, addr) = common::start_no_bid().await;
    let path = std::env::temp_dir()
        .join(format!("exchange-connector-it-{}", std::process::id()))
        .join("requests.log");
    let _ = fs::remove_file(&path);
    connector.start_request_logging(&path, 100).unwrap();

    let client = common::client();
    common::post_auction(&client, addr, &common::bid_request("log-1", 100)).await;
    client.get(common::url(addr, "/ready")).send().await.unwrap();
    client.get(common::url(addr, "/missing")).send().await.unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let entries: Vec<Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["resource"], "/auctions");
    assert_eq!(entries[0]["status"], 204);
    assert!(entries[0]["request"].as_str().unwrap().contains("log-1"));
    assert_eq!(entries[2]["status"], 404);

    assert!(connector.stop_request_logging());
    connector.shutdown().await;
}

#[tokio::test]
async fn refused_handler_closes_connection() {
    let (connector, addr) = common::start_no_bid().await;
    connector.set_handler_factory(Arc::new(|_: HandlerContext| None::<AuctionHandler>));

    let res = common::client().get(common::url(addr, "/ready")).send().await;
    assert!(res.is_err());
    assert!(common::eventually(|| connector.get_service_status().num_connections == 0).await);

    connector.clear_handler_factory();
    let res = common::client().get(common::url(addr, "/ready")).send().await;
    assert!(res.is_err());
    connector.shutdown().await;
}

#[tokio::test]
async fn shutdown_drains_and_stops_accepting() {
    let (connector, addr) = common::start_no_bid().await;
    let client = common::client();
    let res = client.get(common::url(addr, "/ready")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(connector.get_service_status().num_connections, 1);

    connector.shutdown().await;
    assert_eq!(connector.get_service_status().num_connections, 0);
    assert!(connector.core().registry().is_empty());
    assert!(!connector.is_running());

    let res = common::client().get(common::url(addr, "/ready")).send().await;
    assert!(res.is_err());
}

#[tokio::test]
async fn configure_after_start_is_rejected() {
    let (connector, _addr) = common::start_no_bid().await;
    let err = connector
        .configure(&serde_json::json!({ "auctionResource": "/other" }))
        .unwrap_err();
    assert!(matches!(err, ConnectorError::Configuration(_)));
    connector.shutdown().await;
}

/// Pipeline that records which thread ran each auction.
#[derive(Default)]
struct ThreadRecorder {
    threads: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl AuctionPipeline for ThreadRecorder {
    async fn submit(&self, _auction: &Auction) -> AuctionOutcome {
        let name = std::thread::current().name().map(str::to_string);
        self.threads.lock().unwrap().push(name);
        AuctionOutcome::NoBid
    }
}

#[tokio::test]
async fn auctions_run_on_connector_worker_pool() {
    let recorder = Arc::new(ThreadRecorder::default());
    let (connector, addr) = common::start_connector(
        recorder.clone(),
        json!({ "numThreads": 2, "realTimePriority": -1 }),
    )
    .await;

    let client = common::client();
    for id in ["w-1", "w-2"] {
        let res = common::post_auction(&client, addr, &common::bid_request(id, 100)).await;
        assert_eq!(res.status(), 204);
    }

    let threads = recorder.threads.lock().unwrap().clone();
    assert_eq!(threads.len(), 2);
    assert!(threads.iter().all(|name| name.as_deref() == Some("exchange-worker")));

    connector.shutdown().await;
}

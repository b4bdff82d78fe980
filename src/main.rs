//! HTTP exchange connector service.
//!
//! Serves the mock JSON exchange in front of a fixed-price or no-bid
//! pipeline, with optional admin API, metrics endpoint and request log.
//!
//! ```text
//! http-exchange-connector --config connector.toml
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use http_exchange_connector::admin::{setup_admin_router, AdminState};
use http_exchange_connector::auction::{AuctionPipeline, FixedPricePipeline, NoBidPipeline};
use http_exchange_connector::config::{load_config, ServiceConfig};
use http_exchange_connector::exchanges::MockExchangeConnector;
use http_exchange_connector::lifecycle::{wait_for_signal, HttpExchangeConnector, Shutdown};
use http_exchange_connector::observability::{init_logging, init_metrics};

#[derive(Parser)]
#[command(name = "http-exchange-connector")]
#[command(about = "HTTP connector for real-time bidding exchanges", long_about = None)]
struct Cli {
    /// Service configuration file (TOML, or JSON with a .json extension).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connector name used in logs and the admin API.
    #[arg(short, long, default_value = "http-exchange-connector")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    init_logging(&config.observability.log_level)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "http-exchange-connector starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let exchange = Arc::new(MockExchangeConnector::from_config(&config.exchange)?);
    let pipeline: Arc<dyn AuctionPipeline> = match config.pipeline.fixed_bid_cpm {
        Some(cpm) => Arc::new(FixedPricePipeline::new("fixed-price", cpm)),
        None => Arc::new(NoBidPipeline),
    };

    // Auctions are served on the connector's own worker pool; this runtime
    // only drives the admin API and signal handling.
    let connector = Arc::new(HttpExchangeConnector::new(cli.name, exchange, pipeline));
    connector.configure(&config.connector)?;
    if let Some(log) = &config.request_log {
        connector.start_request_logging(&log.path, log.rotation_count)?;
    }

    let address = connector.start().await?;
    tracing::info!(address = %address, "Listening for auctions");

    let admin_shutdown = Shutdown::new();
    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let router = setup_admin_router(AdminState::new(Arc::clone(&connector), &config.admin.api_key));
        let mut stop = admin_shutdown.subscribe();
        tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            });
            if let Err(e) = server.await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    wait_for_signal().await;

    admin_shutdown.trigger();
    connector.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

//! The HTTP exchange connector.
//!
//! # Responsibilities
//! - Hold connector options and the ping table, mutable until start
//! - Own the handler registry and connection tracker
//! - Bind, serve and drain the auction endpoint
//! - Report connection statistics
//!
//! # Design Decisions
//! - Shared state lives in [`ConnectorCore`] behind an `Arc`; handlers keep
//!   a `Weak` to it so a dropped connector never lingers through them
//! - Settings are swapped atomically (`ArcSwap`): requests read a
//!   consistent snapshot without locking
//! - Exchange behavior and auction processing are trait objects supplied at
//!   construction

use arc_swap::ArcSwap;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::auction::AuctionPipeline;
use crate::config::validation::validate_options;
use crate::config::{ConfigError, ConnectorOptions};
use crate::error::{ConnectorError, ConnectorResult};
use crate::exchange::compatibility::{AgentConfig, Creative, ExchangeCompatibility};
use crate::exchange::{ExchangeConnector, PingTimeTable};
use crate::handler::{HandlerFactory, HandlerRegistry};
use crate::http::server::build_router;
use crate::lifecycle::runtime::WorkerPool;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::status::ServiceStatus;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::Listener;
use crate::net::transport;
use crate::observability::metrics::{self, EVENT_CLOSED_CONNECTION, EVENT_NEW_CONNECTION};
use crate::observability::RequestLogger;

/// How long shutdown waits for open connections to finish.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Options plus everything derived from them.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub options: ConnectorOptions,
    pub ping_times: PingTimeTable,
}

impl ConnectorSettings {
    pub fn new(options: ConnectorOptions) -> Self {
        Self {
            ping_times: PingTimeTable::from_options(&options),
            options,
        }
    }
}

/// State shared by the connector, its transport and its handlers.
pub struct ConnectorCore {
    name: String,
    settings: ArcSwap<ConnectorSettings>,
    exchange: Arc<dyn ExchangeConnector>,
    pipeline: Arc<dyn AuctionPipeline>,
    registry: HandlerRegistry,
    connections: ConnectionTracker,
    serving: AtomicU64,
    started: AtomicBool,
}

impl ConnectorCore {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Arc<ConnectorSettings> {
        self.settings.load_full()
    }

    pub fn exchange(&self) -> &Arc<dyn ExchangeConnector> {
        &self.exchange
    }

    pub fn pipeline(&self) -> &Arc<dyn AuctionPipeline> {
        &self.pipeline
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn connections(&self) -> &ConnectionTracker {
        &self.connections
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Requests being served right now.
    pub fn num_serving(&self) -> u64 {
        self.serving.load(Ordering::SeqCst)
    }

    /// Mark a request as in flight until the guard drops.
    pub fn serving(&self) -> ServingGuard<'_> {
        self.serving.fetch_add(1, Ordering::SeqCst);
        ServingGuard { core: self }
    }

    pub fn service_status(&self) -> ServiceStatus {
        ServiceStatus::collect(&self.connections, self.num_serving())
    }
}

impl std::fmt::Debug for ConnectorCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorCore")
            .field("name", &self.name)
            .field("exchange", &self.exchange.exchange_name())
            .field("settings", &self.settings.load_full())
            .field("connections", &self.connections.active_count())
            .field("started", &self.is_started())
            .finish()
    }
}

/// In-flight request marker returned by [`ConnectorCore::serving`].
pub struct ServingGuard<'a> {
    core: &'a ConnectorCore,
}

impl Drop for ServingGuard<'_> {
    fn drop(&mut self) {
        self.core.serving.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Running {
    shutdown: Arc<Shutdown>,
    accept_task: JoinHandle<()>,
    pool: WorkerPool,
}

/// Accepts auction requests over HTTP and runs them through an exchange
/// implementation and an auction pipeline.
///
/// ```text
/// new → configure* → start → (serving) → shutdown
/// ```
pub struct HttpExchangeConnector {
    core: Arc<ConnectorCore>,
    running: AsyncMutex<Option<Running>>,
    local_addr: OnceLock<SocketAddr>,
    drain_timeout: Duration,
}

impl HttpExchangeConnector {
    /// Build a connector with default options and the default handler factory.
    pub fn new(
        name: impl Into<String>,
        exchange: Arc<dyn ExchangeConnector>,
        pipeline: Arc<dyn AuctionPipeline>,
    ) -> Self {
        let core = Arc::new(ConnectorCore {
            name: name.into(),
            settings: ArcSwap::from_pointee(ConnectorSettings::new(ConnectorOptions::default())),
            exchange,
            pipeline,
            registry: HandlerRegistry::with_default_factory(),
            connections: ConnectionTracker::new(),
            serving: AtomicU64::new(0),
            started: AtomicBool::new(false),
        });

        core.connections
            .events()
            .on_open(Arc::new(|_| metrics::record_hit(EVENT_NEW_CONNECTION)));
        core.connections
            .events()
            .on_close(Arc::new(|_| metrics::record_hit(EVENT_CLOSED_CONNECTION)));

        Self {
            core,
            running: AsyncMutex::new(None),
            local_addr: OnceLock::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn core(&self) -> &Arc<ConnectorCore> {
        &self.core
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn exchange_name(&self) -> &str {
        self.core.exchange.exchange_name()
    }

    /// Current options.
    pub fn options(&self) -> ConnectorOptions {
        self.core.settings().options.clone()
    }

    /// Apply a JSON parameter document on top of the current options.
    ///
    /// Only allowed before [`start`](Self::start). Either every recognized
    /// key is applied or, on error, none is.
    pub fn configure(&self, params: &Value) -> ConnectorResult<()> {
        let mut options = self.options();
        options.apply(params)?;
        self.set_options(options)
    }

    /// Replace all options at once.
    pub fn set_options(&self, options: ConnectorOptions) -> ConnectorResult<()> {
        self.ensure_not_started("configure")?;
        validate_options(&options).map_err(ConfigError::Validation)?;

        tracing::debug!(
            connector = %self.core.name,
            listen_port = %options.listen_port,
            auction_resource = %options.auction_resource,
            auction_verb = %options.auction_verb,
            "Connector configured"
        );
        self.core.settings.store(Arc::new(ConnectorSettings::new(options)));
        Ok(())
    }

    /// Set the transport-level options and keep the rest.
    #[allow(clippy::too_many_arguments)]
    pub fn configure_http(
        &self,
        num_threads: usize,
        listen_port: crate::config::PortRange,
        bind_host: &str,
        perform_name_lookup: bool,
        backlog: u32,
        auction_resource: &str,
        auction_verb: &str,
        real_time_priority: i32,
    ) -> ConnectorResult<()> {
        let options = ConnectorOptions {
            num_threads,
            listen_port,
            bind_host: bind_host.to_string(),
            perform_name_lookup,
            backlog,
            auction_resource: auction_resource.to_string(),
            auction_verb: auction_verb.to_string(),
            real_time_priority,
            ..self.options()
        };
        self.set_options(options)
    }

    /// Replace the handler factory. Takes effect for new connections.
    pub fn set_handler_factory(&self, factory: HandlerFactory) {
        self.core.registry.set_factory(factory);
    }

    /// Remove the handler factory; new connections are refused until one is set.
    pub fn clear_handler_factory(&self) {
        self.core.registry.clear_factory();
    }

    /// Bind the first free port of `listenPort` and start serving.
    ///
    /// Builds the connector's worker pool from `numThreads` and
    /// `realTimePriority`; the listener and every connection run on it.
    /// Returns the bound address.
    pub async fn start(&self) -> ConnectorResult<SocketAddr> {
        let mut running = self.running.lock().await;
        self.ensure_not_started("start")?;

        let settings = self.core.settings();
        let options = &settings.options;
        let pool = WorkerPool::new(options)?;

        let host = options.bind_ip().to_string();
        let (ports, backlog, lookup) = (options.listen_port, options.backlog, options.perform_name_lookup);
        let listener = pool
            .spawn(async move { Listener::bind(&host, ports, backlog, lookup).await })?
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
        let local_addr = listener.local_addr()?;

        let shutdown = Arc::new(Shutdown::new());
        let router = build_router(Arc::clone(&self.core));
        let accept_task = pool.spawn(transport::accept_loop(
            listener,
            Arc::clone(&self.core),
            router,
            Arc::clone(&shutdown),
        ))?;

        self.core.started.store(true, Ordering::SeqCst);
        let _ = self.local_addr.set(local_addr);
        *running = Some(Running {
            shutdown,
            accept_task,
            pool,
        });

        tracing::info!(
            connector = %self.core.name,
            exchange = %self.exchange_name(),
            address = %local_addr,
            resource = %options.auction_resource,
            verb = %options.auction_verb,
            threads = options.num_threads,
            real_time_priority = options.real_time_priority,
            "Exchange connector started"
        );
        Ok(local_addr)
    }

    /// Stop accepting, drain open connections, close the request log and stop
    /// the worker pool.
    ///
    /// Safe to call more than once and before `start`.
    pub async fn shutdown(&self) {
        let Some(Running {
            shutdown,
            accept_task,
            mut pool,
        }) = self.running.lock().await.take()
        else {
            self.stop_request_logging();
            return;
        };

        tracing::info!(connector = %self.core.name, "Exchange connector shutting down");
        shutdown.trigger();
        if let Err(e) = accept_task.await {
            tracing::warn!(error = %e, "Accept loop ended abnormally");
        }

        let connections = self.core.connections.clone();
        if tokio::time::timeout(self.drain_timeout, connections.wait_for_shutdown())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = connections.active_count(),
                timeout = ?self.drain_timeout,
                "Drain timeout reached with connections still open"
            );
        }

        self.stop_request_logging();
        pool.stop();
        tracing::info!(connector = %self.core.name, "Exchange connector stopped");
    }

    pub fn is_running(&self) -> bool {
        self.core.is_started()
            && self
                .running
                .try_lock()
                .map(|running| running.is_some())
                .unwrap_or(true)
    }

    /// Address the connector is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    pub fn get_service_status(&self) -> ServiceStatus {
        self.core.service_status()
    }

    /// Requests being served right now.
    pub fn num_serving_request(&self) -> u64 {
        self.core.num_serving()
    }

    /// Start logging raw requests to `path`, replacing any current log.
    pub fn start_request_logging(
        &self,
        path: impl AsRef<Path>,
        rotation_count: usize,
    ) -> ConnectorResult<Arc<RequestLogger>> {
        self.core.registry.install_logger(path.as_ref(), rotation_count)
    }

    /// Stop raw request logging. Returns whether a log was active.
    pub fn stop_request_logging(&self) -> bool {
        self.core.registry.clear_logger()
    }

    pub fn get_campaign_compatibility(&self, config: &AgentConfig, include_reasons: bool) -> ExchangeCompatibility {
        self.core.exchange.get_campaign_compatibility(config, include_reasons)
    }

    pub fn get_creative_compatibility(&self, creative: &Creative, include_reasons: bool) -> ExchangeCompatibility {
        self.core.exchange.get_creative_compatibility(creative, include_reasons)
    }

    fn ensure_not_started(&self, operation: &str) -> ConnectorResult<()> {
        if self.core.is_started() {
            return Err(ConnectorError::Configuration(format!(
                "cannot {} connector '{}' after it has started",
                operation, self.core.name
            )));
        }
        Ok(())
    }
}

impl Drop for HttpExchangeConnector {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.shutdown.trigger();
            tracing::debug!(connector = %self.core.name, "Connector dropped while running");
            // Dropping `running` stops the worker pool and its connections.
        }
    }
}

impl std::fmt::Debug for HttpExchangeConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExchangeConnector")
            .field("core", &self.core)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

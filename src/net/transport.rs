//! Accept loop and per-connection serving.
//!
//! # Responsibilities
//! - Accept connections until shutdown
//! - Resolve peer names, track the connection and create its handler
//! - Serve HTTP/1.1 and HTTP/2 on the connection with the shared router
//! - Release the handler and fire close listeners when the connection ends
//!
//! # Design Decisions
//! - One task per connection; requests on a connection are sequential
//! - Peer lookup runs in the connection task so slow DNS never stalls accept
//! - On shutdown, connections finish their in-flight request and close

use axum::{Extension, Router};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use trust_dns_resolver::TokioAsyncResolver;

use crate::handler::HandlerContext;
use crate::lifecycle::connector::ConnectorCore;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::connection::ConnectionInfo;
use crate::net::listener::{lookup_peer_name, Listener};
use crate::observability::metrics;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Accept connections on `listener` until `shutdown` triggers.
///
/// Subscribes to `shutdown` before returning, so a trigger issued right
/// after spawning the returned future is never missed.
pub fn accept_loop(
    listener: Listener,
    core: Arc<ConnectorCore>,
    router: Router,
    shutdown: Arc<Shutdown>,
) -> impl Future<Output = ()> + Send {
    let mut shutdown_rx = shutdown.subscribe();
    async move {
        let resolver = listener.resolver();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        tokio::spawn(serve_connection(
                            stream,
                            peer_addr,
                            resolver.clone(),
                            Arc::clone(&core),
                            router.clone(),
                            Arc::clone(&shutdown),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
                _ = shutdown_rx.recv() => break,
            }
        }
        tracing::info!(connector = %core.name(), "Stopped accepting connections");
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    resolver: Option<TokioAsyncResolver>,
    core: Arc<ConnectorCore>,
    router: Router,
    shutdown: Arc<Shutdown>,
) {
    let mut shutdown_rx = shutdown.subscribe();
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(peer_addr = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
    }

    let peer_name = match &resolver {
        Some(resolver) => lookup_peer_name(resolver, peer_addr.ip()).await,
        None => None,
    };
    let info = ConnectionInfo::new(peer_addr, peer_name);
    let guard = core.connections().track(info.clone());
    metrics::set_active_connections(core.connections().active_count());

    let context = HandlerContext::new(info, Arc::downgrade(&core));
    let handler = match core.registry().create_handler(context) {
        Ok(handler) => handler,
        Err(e) => {
            tracing::error!(connection_id = %guard.id(), peer = %guard.info().peer_name, error = %e, "Refusing connection");
            drop(guard);
            metrics::set_active_connections(core.connections().active_count());
            return;
        }
    };

    let service = TowerToHyperService::new(router.layer(Extension(Arc::clone(&handler))));
    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut draining = shutdown.is_triggered();
    if draining {
        conn.as_mut().graceful_shutdown();
    }
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %handler.id(), error = %e, "Connection ended with error");
                }
                break;
            }
            _ = shutdown_rx.recv(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    tracing::debug!(
        connection_id = %handler.id(),
        peer = %handler.peer_name(),
        requests = handler.requests_handled(),
        "Connection finished"
    );
    core.registry().release(&handler);
    drop(guard);
    metrics::set_active_connections(core.connections().active_count());
}

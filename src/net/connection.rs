//! Connection identity, counting and lifecycle events.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live connections, overall and per peer
//! - Invoke registered open/close listeners
//! - Release everything through a guard when the connection task ends

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Who is on the other end of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    /// Reverse-resolved host name, or the IP address when lookup is off or fails.
    pub peer_name: String,
}

impl ConnectionInfo {
    pub fn new(peer_addr: SocketAddr, peer_name: Option<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            peer_addr,
            peer_name: peer_name.unwrap_or_else(|| peer_addr.ip().to_string()),
        }
    }
}

/// Listener invoked on connection open or close.
pub type ConnectionListener = Arc<dyn Fn(&ConnectionInfo) + Send + Sync>;

/// Registered open/close listeners.
#[derive(Default)]
pub struct TransportEvents {
    on_open: RwLock<Vec<ConnectionListener>>,
    on_close: RwLock<Vec<ConnectionListener>>,
}

impl TransportEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener called after a connection is accepted.
    pub fn on_open(&self, listener: ConnectionListener) {
        self.on_open
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Register a listener called after a connection is closed.
    pub fn on_close(&self, listener: ConnectionListener) {
        self.on_close
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn fire(listeners: &RwLock<Vec<ConnectionListener>>, info: &ConnectionInfo) {
        let listeners = listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
        for listener in listeners {
            listener(info);
        }
    }
}

impl std::fmt::Debug for TransportEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = |l: &RwLock<Vec<ConnectionListener>>| {
            l.read().unwrap_or_else(PoisonError::into_inner).len()
        };
        f.debug_struct("TransportEvents")
            .field("on_open", &count(&self.on_open))
            .field("on_close", &count(&self.on_close))
            .finish()
    }
}

/// Tracks live connections for status reporting and graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    /// Current count of live connections.
    active_count: AtomicU64,
    /// Live connections per peer name.
    by_host: DashMap<String, usize>,
    events: TransportEvents,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Listeners fired by this tracker.
    pub fn events(&self) -> &TransportEvents {
        &self.inner.events
    }

    /// Record a new connection and fire open listeners.
    /// Returns a guard that undoes the bookkeeping and fires close listeners on drop.
    pub fn track(&self, info: ConnectionInfo) -> ConnectionGuard {
        self.inner.active_count.fetch_add(1, Ordering::SeqCst);
        *self.inner.by_host.entry(info.peer_name.clone()).or_insert(0) += 1;
        TransportEvents::fire(&self.inner.events.on_open, &info);

        tracing::trace!(connection_id = %info.id, peer = %info.peer_name, "Connection opened");
        ConnectionGuard {
            inner: Arc::clone(&self.inner),
            info,
        }
    }

    /// Get current live connection count.
    pub fn active_count(&self) -> u64 {
        self.inner.active_count.load(Ordering::SeqCst)
    }

    /// Snapshot of live connections per peer.
    pub fn connections_by_host(&self) -> Vec<(String, usize)> {
        self.inner
            .by_host
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Wait until all connections are closed.
    pub async fn wait_for_shutdown(&self) {
        while self.active_count() > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    inner: Arc<TrackerInner>,
    info: ConnectionInfo,
}

impl ConnectionGuard {
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.info.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.inner.active_count.fetch_sub(1, Ordering::SeqCst);
        self.inner
            .by_host
            .remove_if_mut(&self.info.peer_name, |_, count| {
                *count = count.saturating_sub(1);
                *count == 0
            });
        TransportEvents::fire(&self.inner.events.on_close, &self.info);
        tracing::trace!(connection_id = %self.info.id, "Connection closed");
    }
}

//! Per-connection auction handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Instant;

use crate::config::schema::DEFAULT_PING_TIME_UNKNOWN_HOSTS_MS;
use crate::http::{HttpHeader, HttpResponse};
use crate::lifecycle::connector::ConnectorCore;
use crate::net::connection::{ConnectionId, ConnectionInfo};
use crate::observability::request_log::{RequestLogEntry, RequestLogger};

/// Everything a handler factory gets to build a handler.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub connection: ConnectionInfo,
    /// Connector the handler serves. Dangling in standalone tests.
    pub connector: Weak<ConnectorCore>,
}

impl HandlerContext {
    pub fn new(connection: ConnectionInfo, connector: Weak<ConnectorCore>) -> Self {
        Self { connection, connector }
    }

    /// Context with no connector behind it.
    pub fn detached(connection: ConnectionInfo) -> Self {
        Self::new(connection, Weak::new())
    }
}

/// State for one client connection's request/response cycle.
///
/// Owned by the handler registry from accept until close. Requests on a
/// connection are handled one at a time, so the current header is only ever
/// written by the task serving that connection.
#[derive(Debug)]
pub struct AuctionHandler {
    connection: ConnectionInfo,
    connector: Weak<ConnectorCore>,
    logger: OnceLock<Arc<RequestLogger>>,
    header: Mutex<HttpHeader>,
    requests_handled: AtomicU64,
    created_at: Instant,
}

impl AuctionHandler {
    pub fn new(context: HandlerContext) -> Self {
        Self {
            connection: context.connection,
            connector: context.connector,
            logger: OnceLock::new(),
            header: Mutex::new(HttpHeader::default()),
            requests_handled: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id
    }

    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    /// Peer identity used for ping-time lookups.
    pub fn peer_name(&self) -> &str {
        &self.connection.peer_name
    }

    /// The connector serving this handler, if it is still alive.
    pub fn connector(&self) -> Option<Arc<ConnectorCore>> {
        self.connector.upgrade()
    }

    /// Bind a request logger. Only the first binding takes effect.
    pub(crate) fn bind_logger(&self, logger: Arc<RequestLogger>) {
        let _ = self.logger.set(logger);
    }

    pub fn logger(&self) -> Option<&Arc<RequestLogger>> {
        self.logger.get()
    }

    /// Header of the request currently (or most recently) being handled.
    pub fn header(&self) -> HttpHeader {
        self.header.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_header(&self, header: HttpHeader) {
        *self.header.lock().unwrap_or_else(PoisonError::into_inner) = header;
    }

    /// Round trip to this handler's peer from the connector's ping table.
    pub fn estimated_round_trip_ms(&self) -> f64 {
        self.connector()
            .map(|core| core.settings().ping_times.estimate(self.peer_name()))
            .unwrap_or(DEFAULT_PING_TIME_UNKNOWN_HOSTS_MS)
    }

    pub fn requests_handled(&self) -> u64 {
        self.requests_handled.load(Ordering::Relaxed)
    }

    pub(crate) fn record_request(&self) -> u64 {
        self.requests_handled.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Write a request/response pair to the bound logger, if any.
    ///
    /// Returns whether an entry was written.
    pub fn log_exchange(&self, header: &HttpHeader, payload: &[u8], response: &HttpResponse) -> bool {
        let Some(logger) = self.logger() else {
            return false;
        };
        let entry = RequestLogEntry::now(
            self.id().as_u64(),
            self.peer_name(),
            header.verb.as_str(),
            &header.resource,
            payload,
            response.status.as_u16(),
            &response.body,
        );
        match logger.log(&entry) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.id(),
                    path = %logger.path().display(),
                    error = %e,
                    "Failed to write request log entry"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::test_handler;
    use crate::observability::request_log::tests::scratch_path;
    use axum::http::Method;

    #[test]
    fn header_round_trip() {
        let handler = test_handler();
        assert_eq!(handler.header().resource, "/");

        handler.set_header(HttpHeader::new(Method::POST, "/bid"));
        assert_eq!(handler.header().resource, "/bid");
        assert_eq!(handler.header().verb, Method::POST);
    }

    #[test]
    fn logger_binds_once() {
        let handler = test_handler();
        let first = Arc::new(RequestLogger::new(scratch_path("bind-a"), 10).unwrap());
        let second = Arc::new(RequestLogger::new(scratch_path("bind-b"), 10).unwrap());

        handler.bind_logger(first.clone());
        handler.bind_logger(second);
        assert!(Arc::ptr_eq(handler.logger().unwrap(), &first));
    }

    #[test]
    fn log_exchange_without_logger_is_noop() {
        let handler = test_handler();
        let header = HttpHeader::new(Method::POST, "/bid");
        assert!(!handler.log_exchange(&header, b"{}", &HttpResponse::no_content()));
    }

    #[test]
    fn counts_requests() {
        let handler = test_handler();
        assert_eq!(handler.record_request(), 1);
        assert_eq!(handler.record_request(), 2);
        assert_eq!(handler.requests_handled(), 2);
    }
}

//! Live handler set and shared request logger.
//!
//! # Concurrency
//! One mutex guards the handler set, the factory slot and the logger slot.
//! Critical sections only touch those fields: handler construction, logger
//! construction and logger close all run outside the lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{ConnectorError, ConnectorResult};
use crate::handler::handler::{AuctionHandler, HandlerContext};
use crate::net::connection::ConnectionId;
use crate::observability::request_log::RequestLogger;

/// Builds a handler for a newly accepted connection. Returning `None` is a
/// construction failure.
pub type HandlerFactory = Arc<dyn Fn(HandlerContext) -> Option<AuctionHandler> + Send + Sync>;

/// The factory installed by default.
pub fn default_handler_factory() -> HandlerFactory {
    Arc::new(|context| Some(AuctionHandler::new(context)))
}

#[derive(Default)]
struct RegistryState {
    handlers: HashMap<ConnectionId, Arc<AuctionHandler>>,
    factory: Option<HandlerFactory>,
    logger: Option<Arc<RequestLogger>>,
}

/// Thread-safe set of live handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    state: Mutex<RegistryState>,
}

impl HandlerRegistry {
    /// Registry with no factory installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the default factory installed.
    pub fn with_default_factory() -> Self {
        let registry = Self::new();
        registry.set_factory(default_handler_factory());
        registry
    }

    pub fn set_factory(&self, factory: HandlerFactory) {
        self.lock().factory = Some(factory);
    }

    pub fn clear_factory(&self) {
        self.lock().factory = None;
    }

    /// Build, register and return a handler for a new connection.
    ///
    /// The current logger, if any, is bound to the handler in the same
    /// critical section that registers it.
    pub fn create_handler(&self, context: HandlerContext) -> ConnectorResult<Arc<AuctionHandler>> {
        let factory = self.lock().factory.clone().ok_or_else(|| {
            ConnectorError::Configuration("need to initialize handler factory".to_string())
        })?;

        let connection_id = context.connection.id;
        let handler = factory(context).map(Arc::new).ok_or_else(|| {
            ConnectorError::Construction(format!("factory returned no handler for {}", connection_id))
        })?;

        let mut state = self.lock();
        if let Some(logger) = &state.logger {
            handler.bind_logger(Arc::clone(logger));
        }
        state.handlers.insert(handler.id(), Arc::clone(&handler));
        drop(state);

        tracing::trace!(connection_id = %handler.id(), peer = %handler.peer_name(), "Handler registered");
        Ok(handler)
    }

    /// Forget a handler. Returns whether it was registered.
    pub fn release(&self, handler: &AuctionHandler) -> bool {
        let removed = self.lock().handlers.remove(&handler.id()).is_some();
        if removed {
            tracing::trace!(
                connection_id = %handler.id(),
                requests = handler.requests_handled(),
                "Handler released"
            );
        }
        removed
    }

    /// Start logging requests of handlers created from now on to `path`.
    ///
    /// Handlers that already hold a logger keep it.
    pub fn install_logger(&self, path: impl Into<PathBuf>, rotation_count: usize) -> ConnectorResult<Arc<RequestLogger>> {
        let logger = Arc::new(RequestLogger::new(path, rotation_count)?);
        self.lock().logger = Some(Arc::clone(&logger));
        Ok(logger)
    }

    /// Stop logging for future handlers and close the current log file.
    ///
    /// Handlers bound to the logger keep it alive and can still write; the file
    /// is reopened on their next entry. Returns whether a logger was installed.
    pub fn clear_logger(&self) -> bool {
        let logger = self.lock().logger.take();
        match logger {
            Some(logger) => {
                logger.close();
                true
            }
            None => false,
        }
    }

    pub fn logger(&self) -> Option<Arc<RequestLogger>> {
        self.lock().logger.clone()
    }

    pub fn has_logger(&self) -> bool {
        self.lock().logger.is_some()
    }

    /// Number of live handlers.
    pub fn len(&self) -> usize {
        self.lock().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of live handlers.
    pub fn handlers(&self) -> Vec<Arc<AuctionHandler>> {
        self.lock().handlers.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &state.handlers.len())
            .field("factory", &state.factory.is_some())
            .field("logger", &state.logger.as_ref().map(|l| l.path().to_path_buf()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::test_context;
    use crate::http::{HttpHeader, HttpResponse};
    use crate::observability::request_log::tests::scratch_path;
    use axum::http::Method;

    #[test]
    fn create_requires_factory() {
        let registry = HandlerRegistry::new();
        let err = registry.create_handler(test_context()).unwrap_err();
        assert!(matches!(err, ConnectorError::Configuration(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn factory_returning_none_is_construction_error() {
        let registry = HandlerRegistry::new();
        registry.set_factory(Arc::new(|_| None));
        let err = registry.create_handler(test_context()).unwrap_err();
        assert!(matches!(err, ConnectorError::Construction(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn live_count_tracks_creates_and_releases() {
        let registry = HandlerRegistry::with_default_factory();
        let handlers: Vec<_> = (0..5)
            .map(|_| registry.create_handler(test_context()).unwrap())
            .collect();
        assert_eq!(registry.len(), 5);

        assert!(registry.release(&handlers[0]));
        assert!(registry.release(&handlers[1]));
        assert_eq!(registry.len(), 3);

        // releasing twice, or something never registered, is a no-op
        assert!(!registry.release(&handlers[0]));
        let stranger = AuctionHandler::new(test_context());
        assert!(!registry.release(&stranger));
        assert_eq!(registry.len(), 3);

        for handler in &handlers[2..] {
            registry.release(handler);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_create_and_release() {
        let registry = Arc::new(HandlerRegistry::with_default_factory());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let handler = registry.create_handler(test_context()).unwrap();
                        assert!(registry.release(&handler));
                    }
                    registry.create_handler(test_context()).unwrap()
                })
            })
            .collect();

        let kept: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(registry.len(), kept.len());
    }

    #[test]
    fn logger_binds_new_handlers_only() {
        let registry = HandlerRegistry::with_default_factory();
        let before = registry.create_handler(test_context()).unwrap();

        let logger = registry.install_logger(scratch_path("registry"), 100).unwrap();
        let after = registry.create_handler(test_context()).unwrap();

        assert!(before.logger().is_none());
        assert!(Arc::ptr_eq(after.logger().unwrap(), &logger));
    }

    #[test]
    fn cleared_logger_still_usable_by_bound_handlers() {
        let registry = HandlerRegistry::with_default_factory();
        let logger = registry.install_logger(scratch_path("clear"), 100).unwrap();
        let bound = registry.create_handler(test_context()).unwrap();

        assert!(registry.clear_logger());
        assert!(!registry.has_logger());
        assert!(!registry.clear_logger());

        let header = HttpHeader::new(Method::POST, "/bid");
        assert!(bound.log_exchange(&header, b"{}", &HttpResponse::no_content()));
        assert_eq!(logger.entries_written(), 1);

        let unbound = registry.create_handler(test_context()).unwrap();
        assert!(unbound.logger().is_none());
    }

    #[test]
    fn swapped_logger_keeps_old_binding() {
        let registry = HandlerRegistry::with_default_factory();
        let first = registry.install_logger(scratch_path("swap-a"), 100).unwrap();
        let early = registry.create_handler(test_context()).unwrap();
        let second = registry.install_logger(scratch_path("swap-b"), 100).unwrap();
        let late = registry.create_handler(test_context()).unwrap();

        assert!(Arc::ptr_eq(early.logger().unwrap(), &first));
        assert!(Arc::ptr_eq(late.logger().unwrap(), &second));
    }
}

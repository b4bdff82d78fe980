//! Authenticated admin API.
//!
//! - `GET /admin/status`: connector identity and connection statistics
//! - `GET /admin/handlers`: live handlers and request log state
//! - `POST /admin/request-log`: start raw request logging (`{path, count}`)
//! - `DELETE /admin/request-log`: stop raw request logging

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::lifecycle::HttpExchangeConnector;

#[derive(Clone)]
pub struct AdminState {
    pub connector: Arc<HttpExchangeConnector>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(connector: Arc<HttpExchangeConnector>, api_key: &str) -> Self {
        Self {
            connector,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/handlers", get(get_handlers))
        .route("/admin/request-log", post(start_request_log).delete(stop_request_log))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;

use crate::admin::AdminState;
use crate::lifecycle::ServiceStatus;
use crate::observability::RequestLogger;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: String,
    pub connector: String,
    pub exchange: String,
    pub running: bool,
    pub address: Option<SocketAddr>,
    pub service: ServiceStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerSummary {
    pub connection_id: u64,
    pub peer: String,
    pub requests: u64,
    pub age_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggerStatus {
    pub path: String,
    pub rotation_count: usize,
    pub entries_written: u64,
}

impl LoggerStatus {
    fn of(logger: &RequestLogger) -> Self {
        Self {
            path: logger.path().display().to_string(),
            rotation_count: logger.rotation_count(),
            entries_written: logger.entries_written(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlersReport {
    pub count: usize,
    pub logger: Option<LoggerStatus>,
    pub handlers: Vec<HandlerSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartLogRequest {
    pub path: String,
    #[serde(default = "default_rotation")]
    pub count: usize,
}

fn default_rotation() -> usize {
    10_000
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let connector = &state.connector;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        connector: connector.name().to_string(),
        exchange: connector.exchange_name().to_string(),
        running: connector.is_running(),
        address: connector.local_addr(),
        service: connector.get_service_status(),
    })
}

pub async fn get_handlers(State(state): State<AdminState>) -> Json<HandlersReport> {
    let registry = state.connector.core().registry();
    let mut handlers: Vec<HandlerSummary> = registry
        .handlers()
        .iter()
        .map(|h| HandlerSummary {
            connection_id: h.id().as_u64(),
            peer: h.peer_name().to_string(),
            requests: h.requests_handled(),
            age_ms: h.age().as_millis() as u64,
        })
        .collect();
    handlers.sort_by_key(|h| h.connection_id);

    Json(HandlersReport {
        count: handlers.len(),
        logger: registry.logger().as_deref().map(LoggerStatus::of),
        handlers,
    })
}

pub async fn start_request_log(
    State(state): State<AdminState>,
    Json(request): Json<StartLogRequest>,
) -> Result<Json<LoggerStatus>, (StatusCode, Json<Value>)> {
    if request.path.trim().is_empty() || request.count == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "path must be set and count greater than 0" })),
        ));
    }

    match state.connector.start_request_logging(&request.path, request.count) {
        Ok(logger) => Ok(Json(LoggerStatus::of(&logger))),
        Err(e) => {
            tracing::error!(path = %request.path, error = %e, "Failed to start request logging");
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))
        }
    }
}

pub async fn stop_request_log(State(state): State<AdminState>) -> Json<Value> {
    let stopped = state.connector.stop_request_logging();
    Json(json!({ "stopped": stopped }))
}

use super::state::epoch_now;
use super::ServerState;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

const DEFAULT_EVENT_LIMIT: usize = 20;
const MAX_EVENT_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let snapshot = state.monitor.snapshot();
    let health_info = json!({
        "status": "healthy",
        "camera_running": snapshot.camera_running,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "confirmed_events": snapshot.confirmed_events,
        "last_error": snapshot.last_error,
        "server_info": {
            "subscribers": state.event_bus.subscriber_count(),
        }
    });

    (StatusCode::OK, Json(health_info))
}

/// Live monitoring snapshot
pub async fn status_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let snapshot = state.monitor.snapshot();
    let body = json!({
        "type": "realtime_monitoring",
        "camera_running": snapshot.camera_running,
        "data": snapshot.latest_status,
    });
    (StatusCode::OK, Json(body))
}

pub async fn camera_status_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let snapshot = state.monitor.snapshot();
    Json(json!({
        "type": "camera_status",
        "running": snapshot.camera_running,
        "timestamp": epoch_now(),
    }))
}

/// Most recent realtime alert, or `null`
pub async fn alert_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(json!({ "alert": state.monitor.snapshot().latest_alert }))
}

/// Tail of the confirmed event log
pub async fn events_handler(
    State(state): State<ServerState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .min(MAX_EVENT_LIMIT);

    match state.event_log.recent(limit).await {
        Ok(events) => {
            debug!("Serving {} logged events", events.len());
            (
                StatusCode::OK,
                Json(json!({ "count": events.len(), "events": events })),
            )
        }
        Err(e) => {
            error!("Failed to read event log: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

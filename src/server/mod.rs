mod handlers;
mod state;
#[cfg(test)]
mod tests;

pub use state::{AlertRecord, MonitorSnapshot, MonitorState};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::events::EventBus;
use crate::storage::JsonlEventLog;

use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use handlers::{
    alert_handler, camera_status_handler, events_handler, health_handler, status_handler,
};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) monitor: MonitorState,
    pub(crate) event_log: Arc<JsonlEventLog>,
    pub(crate) event_bus: Arc<EventBus>,
    pub(crate) started_at: Instant,
}

impl ServerState {
    pub fn new(monitor: MonitorState, event_log: Arc<JsonlEventLog>, event_bus: Arc<EventBus>) -> Self {
        Self {
            monitor,
            event_log,
            event_bus,
            started_at: Instant::now(),
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/camera/status", get(camera_status_handler))
        .route("/alert", get(alert_handler))
        .route("/events", get(events_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Read-only HTTP view of detector status and logged events
pub struct StatusServer {
    config: ServerConfig,
    state: ServerState,
}

impl StatusServer {
    pub fn new(config: ServerConfig, state: ServerState) -> Self {
        Self { config, state }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    /// Serve until `cancel` fires
    pub async fn start(self, cancel: CancellationToken) -> Result<(), ServerError> {
        let addr = self.address();
        let app = router(self.state);

        info!("Starting status server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;

        info!("Status server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .map_err(|e| ServerError::Runtime {
                details: format!("Server error: {}", e),
            })?;

        info!("Status server stopped");
        Ok(())
    }
}

use crate::emitter::{AlertSeverity, StatusSnapshot};
use crate::events::{EventBus, SeizowatchEvent};

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Most recent alert, as served by `/alert`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub severity: AlertSeverity,
    pub message: String,
    pub event_id: String,
    pub epoch_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorSnapshot {
    pub camera_running: bool,
    pub latest_status: Option<StatusSnapshot>,
    pub latest_alert: Option<AlertRecord>,
    pub confirmed_events: u64,
    pub last_error: Option<String>,
}

/// Latest-value cache of bus traffic for the HTTP handlers
#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    inner: Arc<RwLock<MonitorSnapshot>>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.inner.read().clone()
    }

    pub fn apply(&self, event: &SeizowatchEvent) {
        let mut inner = self.inner.write();
        match event {
            SeizowatchEvent::StatusUpdate(status) => {
                inner.latest_status = Some(status.clone());
            }
            SeizowatchEvent::SeizureConfirmed(_) => {
                inner.confirmed_events += 1;
            }
            SeizowatchEvent::AlertRaised {
                severity,
                message,
                event_id,
                timestamp,
            } => {
                inner.latest_alert = Some(AlertRecord {
                    kind: "seizure_detected",
                    severity: *severity,
                    message: message.clone(),
                    event_id: event_id.clone(),
                    epoch_seconds: timestamp
                        .duration_since(UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_secs(),
                });
            }
            SeizowatchEvent::CameraStatusChanged { running, .. } => {
                inner.camera_running = *running;
            }
            SeizowatchEvent::SystemError { component, error } => {
                inner.last_error = Some(format!("{}: {}", component, error));
            }
            SeizowatchEvent::ShutdownRequested { .. } => {}
        }
    }

    /// Keep the cache current until `cancel` fires or the bus closes
    pub fn spawn_updater(&self, event_bus: &EventBus, cancel: CancellationToken) -> JoinHandle<()> {
        let state = self.clone();
        let mut receiver = event_bus.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(event) => state.apply(&event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Monitor state lagged behind the event bus by {} events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Monitor state updater stopped");
        })
    }
}

pub(crate) fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

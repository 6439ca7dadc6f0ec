use crate::emitter::{AlertSeverity, ConfirmedEvent, StatusSnapshot};
use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn, Level};

/// Events that can occur in the seizowatch system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SeizowatchEvent {
    /// Throttled live-monitoring snapshot
    StatusUpdate(StatusSnapshot),
    /// A candidate passed verification and was handed to the event log
    SeizureConfirmed(ConfirmedEvent),
    /// Realtime alert raised for a confirmed event
    AlertRaised {
        severity: AlertSeverity,
        message: String,
        event_id: String,
        timestamp: SystemTime,
    },
    /// Detection loop started or stopped
    CameraStatusChanged {
        running: bool,
        timestamp: SystemTime,
    },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl SeizowatchEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SeizowatchEvent::StatusUpdate(snapshot) => format!(
                "Status: motion {:.0}, frequency {}, rhythmic {}",
                snapshot.motion_value, snapshot.dominant_frequency, snapshot.rhythmic_motion
            ),
            SeizowatchEvent::SeizureConfirmed(event) => format!(
                "Seizure confirmed: {} (score {:.2})",
                event.event_id, event.onnx_score
            ),
            SeizowatchEvent::AlertRaised {
                severity, event_id, ..
            } => format!("Alert {:?} raised for {}", severity, event_id),
            SeizowatchEvent::CameraStatusChanged { running, .. } => {
                format!("Camera {}", if *running { "running" } else { "stopped" })
            }
            SeizowatchEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            SeizowatchEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Level at which the bus logs this event. Errors are reported where they
    /// happen, so the bus only traces them.
    pub fn log_level(&self) -> Level {
        match self {
            SeizowatchEvent::SeizureConfirmed(_) | SeizowatchEvent::ShutdownRequested { .. } => {
                Level::INFO
            }
            SeizowatchEvent::CameraStatusChanged { running, .. } => {
                if *running {
                    Level::INFO
                } else {
                    Level::WARN
                }
            }
            SeizowatchEvent::StatusUpdate(_)
            | SeizowatchEvent::AlertRaised { .. }
            | SeizowatchEvent::SystemError { .. } => Level::DEBUG,
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SeizowatchEvent::StatusUpdate(_) => "status_update",
            SeizowatchEvent::SeizureConfirmed(_) => "seizure_confirmed",
            SeizowatchEvent::AlertRaised { .. } => "alert_raised",
            SeizowatchEvent::CameraStatusChanged { .. } => "camera_status_changed",
            SeizowatchEvent::SystemError { .. } => "system_error",
            SeizowatchEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SeizowatchEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SeizowatchEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SeizowatchEvent) -> Result<usize, EventBusError> {
        let level = event.log_level();
        if level == Level::WARN {
            warn!("{}", event.description());
        } else if level == Level::INFO {
            info!("{}", event.description());
        } else {
            debug!("Event: {}", event.description());
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish only when someone is listening; a bus without receivers is not an error
    pub fn publish_if_subscribed(&self, event: SeizowatchEvent) -> Result<usize, EventBusError> {
        if !self.has_subscribers() {
            return Ok(0);
        }
        self.publish(event)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        let delivered = bus
            .publish(SeizowatchEvent::CameraStatusChanged {
                running: true,
                timestamp: SystemTime::now(),
            })
            .unwrap();
        assert_eq!(delivered, 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "camera_status_changed");
        assert_eq!(event.description(), "Camera running");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(10);
        let event = SeizowatchEvent::SystemError {
            component: "test".to_string(),
            error: "boom".to_string(),
        };
        assert!(bus.publish(event.clone()).is_err());
        assert_eq!(bus.publish_if_subscribed(event).unwrap(), 0);
    }

    #[test]
    fn test_errors_not_relogged_by_bus() {
        let error = SeizowatchEvent::SystemError {
            component: "pipeline".to_string(),
            error: "dimension mismatch".to_string(),
        };
        assert_eq!(error.log_level(), Level::DEBUG);

        let stopped = SeizowatchEvent::CameraStatusChanged {
            running: false,
            timestamp: SystemTime::now(),
        };
        assert_eq!(stopped.log_level(), Level::WARN);

        let shutdown = SeizowatchEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "EndOfStream".to_string(),
        };
        assert_eq!(shutdown.log_level(), Level::INFO);
    }

    #[tokio::test]
    async fn test_clone_shares_channel() {
        let bus = EventBus::new(10);
        let clone = bus.clone();
        let mut receiver = bus.subscribe();
        assert_eq!(clone.subscriber_count(), 1);

        clone
            .publish(SeizowatchEvent::ShutdownRequested {
                timestamp: SystemTime::now(),
                reason: "test".to_string(),
            })
            .unwrap();
        assert_eq!(receiver.recv().await.unwrap().event_type(), "shutdown_requested");
    }
}

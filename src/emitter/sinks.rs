use super::types::{AlertSeverity, ConfirmedEvent, StatusSnapshot};
use crate::error::{NotifyError, SinkError};
use crate::events::{EventBus, SeizowatchEvent};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Durable, append-only record of confirmed events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: &ConfirmedEvent) -> Result<(), SinkError>;
}

/// Consumer of the throttled live-monitoring snapshot
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, snapshot: &StatusSnapshot) -> Result<(), SinkError>;
}

/// Best-effort alert delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_alert(&self, event: &ConfirmedEvent) -> Result<(), NotifyError>;
}

/// Status snapshots onto the event bus
pub struct BusStatusSink {
    event_bus: Arc<EventBus>,
}

impl BusStatusSink {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self { event_bus }
    }
}

#[async_trait]
impl StatusSink for BusStatusSink {
    async fn publish(&self, snapshot: &StatusSnapshot) -> Result<(), SinkError> {
        self.event_bus
            .publish_if_subscribed(SeizowatchEvent::StatusUpdate(snapshot.clone()))
            .map(|_| ())
            .map_err(|e| SinkError::StatusFailed {
                details: e.to_string(),
            })
    }
}

/// Realtime alert onto the event bus, alongside the confirmed event itself
pub struct BusNotifier {
    event_bus: Arc<EventBus>,
}

impl BusNotifier {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self { event_bus }
    }
}

#[async_trait]
impl Notifier for BusNotifier {
    async fn send_alert(&self, event: &ConfirmedEvent) -> Result<(), NotifyError> {
        self.event_bus
            .publish_if_subscribed(SeizowatchEvent::SeizureConfirmed(event.clone()))
            .and_then(|_| {
                self.event_bus
                    .publish_if_subscribed(SeizowatchEvent::AlertRaised {
                        severity: AlertSeverity::High,
                        message: event.alert_message(),
                        event_id: event.event_id.clone(),
                        timestamp: SystemTime::now(),
                    })
            })
            .map(|delivered| debug!("Alert for {} delivered to {} subscribers", event.event_id, delivered))
            .map_err(|e| NotifyError::DeliveryFailed {
                details: e.to_string(),
            })
    }
}

/// Writes the alert text to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_alert(&self, event: &ConfirmedEvent) -> Result<(), NotifyError> {
        warn!("{}", event.alert_message());
        Ok(())
    }
}

/// Delivers to every notifier; fails if any of them failed
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn send_alert(&self, event: &ConfirmedEvent) -> Result<(), NotifyError> {
        let mut failures = Vec::new();
        for notifier in &self.notifiers {
            if let Err(e) = notifier.send_alert(event).await {
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::DeliveryFailed {
                details: failures.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::CandidateEvent;
    use chrono::Utc;

    fn confirmed() -> ConfirmedEvent {
        let candidate = CandidateEvent {
            streak_id: 1,
            avg_motion: 2_000_000.0,
            max_motion: 3_000_000.0,
            dominant_frequency: 6.0,
            duration_seconds: 2.0,
        };
        ConfirmedEvent::from_candidate(&candidate, 0.9, Utc::now(), chrono_tz::UTC)
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn send_alert(&self, _event: &ConfirmedEvent) -> Result<(), NotifyError> {
            Err(NotifyError::DeliveryFailed {
                details: "gateway down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_bus_notifier_publishes_event_and_alert() {
        let bus = Arc::new(EventBus::new(10));
        let mut receiver = bus.subscribe();
        let notifier = BusNotifier::new(Arc::clone(&bus));

        let event = confirmed();
        notifier.send_alert(&event).await.unwrap();

        match receiver.recv().await.unwrap() {
            SeizowatchEvent::SeizureConfirmed(received) => assert_eq!(received, event),
            other => panic!("unexpected event {:?}", other),
        }
        match receiver.recv().await.unwrap() {
            SeizowatchEvent::AlertRaised {
                severity, event_id, ..
            } => {
                assert_eq!(severity, AlertSeverity::High);
                assert_eq!(event_id, event.event_id);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bus_sinks_without_subscribers_succeed() {
        let bus = Arc::new(EventBus::new(10));
        let status = BusStatusSink::new(Arc::clone(&bus));
        let snapshot = StatusSnapshot {
            motion_value: 0.0,
            dominant_frequency: 0.0,
            rhythmic_motion: false,
            avg_motion: 0.0,
            max_motion: 0.0,
            timestamp: "2024-01-01 00:00:00".to_string(),
        };
        assert!(status.publish(&snapshot).await.is_ok());
        assert!(BusNotifier::new(bus).send_alert(&confirmed()).await.is_ok());
    }

    #[tokio::test]
    async fn test_fanout_reports_partial_failure() {
        let fanout = FanoutNotifier::new(vec![Arc::new(LogNotifier), Arc::new(Failing)]);
        let err = fanout.send_alert(&confirmed()).await.unwrap_err();
        assert!(err.to_string().contains("gateway down"));
    }
}

mod sinks;
mod types;

pub use sinks::{BusNotifier, BusStatusSink, EventSink, FanoutNotifier, LogNotifier, Notifier, StatusSink};
pub use types::{format_timestamp, AlertSeverity, ConfirmedEvent, StatusSnapshot, TIMESTAMP_FORMAT};

use crate::detector::CandidateEvent;

use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Counters for emitted events and failures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitterStats {
    pub events_recorded: u64,
    pub sink_failures: u64,
    pub alerts_sent: u64,
    pub alert_failures: u64,
    pub status_updates: u64,
}

/// What happened to one confirmed event
#[derive(Debug, Clone)]
pub struct EmitOutcome {
    pub event: ConfirmedEvent,
    pub recorded: bool,
    pub alerted: bool,
}

/// Forwards confirmed events to the durable sink and the notifier, and
/// throttles status snapshots to one per `status_interval`.
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
    status_sink: Arc<dyn StatusSink>,
    notifier: Arc<dyn Notifier>,
    timezone: Tz,
    status_interval: Duration,
    last_status: Option<Instant>,
    stats: EmitterStats,
}

impl EventEmitter {
    pub fn new(
        sink: Arc<dyn EventSink>,
        status_sink: Arc<dyn StatusSink>,
        notifier: Arc<dyn Notifier>,
        timezone: Tz,
        status_interval: Duration,
    ) -> Self {
        Self {
            sink,
            status_sink,
            notifier,
            timezone,
            status_interval,
            last_status: None,
            stats: EmitterStats::default(),
        }
    }

    /// Build, record and announce a confirmed event.
    ///
    /// The durable write and the alert are independent: a failed write is
    /// logged and counted but the alert is still attempted, and a failed alert
    /// never affects the record.
    pub async fn emit_confirmed(&mut self, candidate: &CandidateEvent, score: f32) -> EmitOutcome {
        let event = ConfirmedEvent::from_candidate(candidate, score, Utc::now(), self.timezone);
        info!(
            "Confirmed seizure event {} at {} ({:.1}s, score {:.2})",
            event.event_id, event.timestamp, event.duration_seconds, event.onnx_score
        );

        let recorded = match self.sink.record(&event).await {
            Ok(()) => {
                self.stats.events_recorded += 1;
                true
            }
            Err(e) => {
                self.stats.sink_failures += 1;
                error!(
                    "FAILED TO RECORD CONFIRMED EVENT {}: {} ({:?})",
                    event.event_id, e, event
                );
                false
            }
        };

        let alerted = match self.notifier.send_alert(&event).await {
            Ok(()) => {
                self.stats.alerts_sent += 1;
                true
            }
            Err(e) => {
                self.stats.alert_failures += 1;
                warn!("Alert for event {} was not delivered: {}", event.event_id, e);
                false
            }
        };

        EmitOutcome {
            event,
            recorded,
            alerted,
        }
    }

    /// Whether a status snapshot is due at `now`
    pub fn status_due(&self, now: Instant) -> bool {
        match self.last_status {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.status_interval,
        }
    }

    /// Publish a snapshot if one is due; returns whether it was attempted
    pub async fn maybe_publish_status(
        &mut self,
        now: Instant,
        build: impl FnOnce(&str) -> StatusSnapshot,
    ) -> bool {
        if !self.status_due(now) {
            return false;
        }

        self.last_status = Some(now);
        let timestamp = format_timestamp(Utc::now(), self.timezone);
        let snapshot = build(&timestamp);

        match self.status_sink.publish(&snapshot).await {
            Ok(()) => {
                self.stats.status_updates += 1;
                debug!("Published status snapshot: {:?}", snapshot);
            }
            Err(e) => warn!("Failed to publish status snapshot: {}", e),
        }
        true
    }

    pub fn stats(&self) -> &EmitterStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotifyError, SinkError};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MemorySink {
        events: Mutex<Vec<ConfirmedEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl EventSink for MemorySink {
        async fn record(&self, event: &ConfirmedEvent) -> std::result::Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::WriteFailed {
                    event_id: event.event_id.clone(),
                    details: "read-only filesystem".to_string(),
                });
            }
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryStatus {
        snapshots: Mutex<Vec<StatusSnapshot>>,
    }

    #[async_trait]
    impl StatusSink for MemoryStatus {
        async fn publish(&self, snapshot: &StatusSnapshot) -> std::result::Result<(), SinkError> {
            self.snapshots.lock().push(snapshot.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        attempts: Mutex<u32>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn send_alert(&self, _event: &ConfirmedEvent) -> std::result::Result<(), NotifyError> {
            *self.attempts.lock() += 1;
            if self.fail {
                Err(NotifyError::DeliveryFailed {
                    details: "no route".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn candidate() -> CandidateEvent {
        CandidateEvent {
            streak_id: 1,
            avg_motion: 2_000_000.0,
            max_motion: 3_000_000.0,
            dominant_frequency: 6.0,
            duration_seconds: 2.0,
        }
    }

    fn snapshot(timestamp: &str) -> StatusSnapshot {
        StatusSnapshot {
            motion_value: 1.0,
            dominant_frequency: 0.0,
            rhythmic_motion: false,
            avg_motion: 1.0,
            max_motion: 1.0,
            timestamp: timestamp.to_string(),
        }
    }

    fn emitter(
        sink: Arc<MemorySink>,
        status: Arc<MemoryStatus>,
        notifier: Arc<CountingNotifier>,
    ) -> EventEmitter {
        EventEmitter::new(sink, status, notifier, chrono_tz::UTC, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_emit_records_and_alerts() {
        let sink = Arc::new(MemorySink::default());
        let notifier = Arc::new(CountingNotifier::default());
        let mut emitter = emitter(
            Arc::clone(&sink),
            Arc::new(MemoryStatus::default()),
            Arc::clone(&notifier),
        );

        let outcome = emitter.emit_confirmed(&candidate(), 0.92).await;
        assert!(outcome.recorded);
        assert!(outcome.alerted);
        assert_eq!(sink.events.lock().len(), 1);
        assert_eq!(*notifier.attempts.lock(), 1);
        assert_eq!(emitter.stats().events_recorded, 1);
    }

    #[tokio::test]
    async fn test_alert_failure_keeps_record() {
        let sink = Arc::new(MemorySink::default());
        let notifier = Arc::new(CountingNotifier {
            fail: true,
            ..Default::default()
        });
        let mut emitter = emitter(
            Arc::clone(&sink),
            Arc::new(MemoryStatus::default()),
            Arc::clone(&notifier),
        );

        let outcome = emitter.emit_confirmed(&candidate(), 0.8).await;
        assert!(outcome.recorded);
        assert!(!outcome.alerted);
        assert_eq!(sink.events.lock().len(), 1);
        assert_eq!(emitter.stats().alert_failures, 1);
    }

    #[tokio::test]
    async fn test_sink_failure_still_alerts() {
        let sink = Arc::new(MemorySink {
            fail: true,
            ..Default::default()
        });
        let notifier = Arc::new(CountingNotifier::default());
        let mut emitter = emitter(sink, Arc::new(MemoryStatus::default()), Arc::clone(&notifier));

        let outcome = emitter.emit_confirmed(&candidate(), 0.8).await;
        assert!(!outcome.recorded);
        assert!(outcome.alerted);
        assert_eq!(emitter.stats().sink_failures, 1);
        assert_eq!(*notifier.attempts.lock(), 1);
    }

    #[tokio::test]
    async fn test_status_throttled_by_interval() {
        let status = Arc::new(MemoryStatus::default());
        let mut emitter = emitter(
            Arc::new(MemorySink::default()),
            Arc::clone(&status),
            Arc::new(CountingNotifier::default()),
        );

        let start = Instant::now();
        assert!(emitter.maybe_publish_status(start, snapshot).await);
        assert!(
            !emitter
                .maybe_publish_status(start + Duration::from_millis(500), snapshot)
                .await
        );
        assert!(
            !emitter
                .maybe_publish_status(start + Duration::from_millis(999), snapshot)
                .await
        );
        assert!(
            emitter
                .maybe_publish_status(start + Duration::from_millis(1000), snapshot)
                .await
        );
        assert_eq!(status.snapshots.lock().len(), 2);
        assert_eq!(emitter.stats().status_updates, 2);
    }
}

use super::*;
use crate::detector::CandidateEvent;
use crate::emitter::{AlertSeverity, ConfirmedEvent, EventSink, StatusSnapshot};
use crate::events::SeizowatchEvent;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tower::ServiceExt;

fn test_state(dir: &TempDir) -> ServerState {
    ServerState::new(
        MonitorState::new(),
        Arc::new(JsonlEventLog::new(dir.path().join("events.jsonl"))),
        Arc::new(EventBus::new(16)),
    )
}

async fn get_json(state: ServerState, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn confirmed(streak_id: u64) -> ConfirmedEvent {
    let candidate = CandidateEvent {
        streak_id,
        avg_motion: 1_200_000.0,
        max_motion: 1_500_000.0,
        dominant_frequency: 9.0,
        duration_seconds: 0.13,
    };
    ConfirmedEvent::from_candidate(&candidate, 0.87, Utc::now(), chrono_tz::UTC)
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get_json(test_state(&dir), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["camera_running"], false);
}

#[tokio::test]
async fn test_status_reflects_bus_events() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    state.monitor.apply(&SeizowatchEvent::CameraStatusChanged {
        running: true,
        timestamp: SystemTime::now(),
    });
    state.monitor.apply(&SeizowatchEvent::StatusUpdate(StatusSnapshot {
        motion_value: 1_234.0,
        dominant_frequency: 9.0,
        rhythmic_motion: true,
        avg_motion: 1_000.0,
        max_motion: 2_000.0,
        timestamp: "2024-03-01 12:00:00".to_string(),
    }));

    let (_, body) = get_json(state.clone(), "/status").await;
    assert_eq!(body["type"], "realtime_monitoring");
    assert_eq!(body["data"]["rhythmic_motion"], true);
    assert_eq!(body["data"]["motion_value"], 1_234.0);

    let (_, body) = get_json(state, "/camera/status").await;
    assert_eq!(body["running"], true);
}

#[tokio::test]
async fn test_alert_endpoint() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let (_, body) = get_json(state.clone(), "/alert").await;
    assert!(body["alert"].is_null());

    state.monitor.apply(&SeizowatchEvent::AlertRaised {
        severity: AlertSeverity::High,
        message: "SEIZURE ALERT".to_string(),
        event_id: "evt-1".to_string(),
        timestamp: SystemTime::now(),
    });

    let (_, body) = get_json(state, "/alert").await;
    assert_eq!(body["alert"]["severity"], "HIGH");
    assert_eq!(body["alert"]["type"], "seizure_detected");
    assert_eq!(body["alert"]["event_id"], "evt-1");
}

#[tokio::test]
async fn test_events_endpoint_tails_log() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);
    for streak in 1..=3 {
        state.event_log.record(&confirmed(streak)).await.unwrap();
    }

    let (status, body) = get_json(state, "/events?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["events"][0]["streak_id"], 2);
    assert_eq!(body["events"][1]["streak_id"], 3);
}

#[tokio::test]
async fn test_updater_follows_bus() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);
    let cancel = CancellationToken::new();
    let updater = state.monitor.spawn_updater(&state.event_bus, cancel.clone());

    state
        .event_bus
        .publish(SeizowatchEvent::SeizureConfirmed(confirmed(1)))
        .unwrap();

    let monitor = state.monitor.clone();
    tokio::time::timeout(Duration::from_secs(2), async move {
        while monitor.snapshot().confirmed_events == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    updater.await.unwrap();
}

use crate::detector::CandidateEvent;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Timestamp layout used in event records and alerts
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(at: DateTime<Utc>, timezone: Tz) -> String {
    at.with_timezone(&timezone).format(TIMESTAMP_FORMAT).to_string()
}

/// Widens through the shortest decimal form so 0.92f32 is logged as 0.92
fn widen_score(score: f32) -> f64 {
    score.to_string().parse().unwrap_or(score as f64)
}

/// A verified seizure-like event as recorded in the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedEvent {
    pub event_id: String,
    pub streak_id: u64,
    /// Local wall-clock time, second precision
    pub timestamp: String,
    pub epoch_seconds: i64,
    pub duration_seconds: f64,
    pub avg_motion: f64,
    pub max_motion: f64,
    pub dominant_frequency: f64,
    pub rule_based: bool,
    pub dl_verified: bool,
    pub onnx_score: f64,
}

impl ConfirmedEvent {
    pub fn from_candidate(
        candidate: &CandidateEvent,
        score: f32,
        at: DateTime<Utc>,
        timezone: Tz,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            streak_id: candidate.streak_id,
            timestamp: format_timestamp(at, timezone),
            epoch_seconds: at.timestamp(),
            duration_seconds: candidate.duration_seconds,
            avg_motion: candidate.avg_motion,
            max_motion: candidate.max_motion,
            dominant_frequency: candidate.dominant_frequency,
            rule_based: true,
            dl_verified: true,
            onnx_score: widen_score(score),
        }
    }

    /// Confidence as a whole percentage
    pub fn confidence_percent(&self) -> f64 {
        (self.onnx_score * 100.0).round()
    }

    /// Free-text alert body
    pub fn alert_message(&self) -> String {
        format!(
            "SEIZURE ALERT - SeizoWatch\n\n\
             Time: {}\n\
             Duration: {:.1} seconds\n\
             Confidence: {:.0}%\n\
             Status: DL Verified\n\n\
             Immediate attention required!",
            self.timestamp,
            self.duration_seconds,
            self.confidence_percent()
        )
    }
}

/// Live monitoring snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub motion_value: f64,
    pub dominant_frequency: f64,
    pub rhythmic_motion: bool,
    pub avg_motion: f64,
    pub max_motion: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    High,
}

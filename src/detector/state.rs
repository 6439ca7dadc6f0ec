use crate::analyzer::{SignalWindow, SpectralResult};
use crate::config::DetectorConfig;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// Per-stream gating state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionState {
    pub consecutive_qualifying_frames: u32,
    pub event_already_logged: bool,
    /// A verification outcome (confirm or reject) was recorded for this streak
    pub verification_attempted: bool,
    /// Generation of the current streak, bumped when a new streak opens
    pub streak_id: u64,
}

/// Aggregate statistics handed to the verifier when the gate fires
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub streak_id: u64,
    pub avg_motion: f64,
    pub max_motion: f64,
    pub dominant_frequency: f64,
    pub duration_seconds: f64,
}

impl CandidateEvent {
    /// Classifier input in model order
    pub fn features(&self) -> [f32; 4] {
        [
            self.avg_motion as f32,
            self.max_motion as f32,
            self.dominant_frequency as f32,
            self.duration_seconds as f32,
        ]
    }
}

/// Result of feeding one frame through the gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateStep {
    pub qualifying: bool,
    pub candidate: Option<CandidateEvent>,
}

/// Rule-based gate: rhythmic motion above the intensity threshold for enough
/// consecutive frames produces one candidate per streak.
///
/// Outcome policy within a streak:
/// - confirmed: no further candidates until the streak breaks
/// - rejected: no retry until the streak breaks and restarts
/// - verifier unavailable: the next qualifying frame of the same streak retries
#[derive(Debug)]
pub struct SeizureStateMachine {
    config: DetectorConfig,
    state: DetectionState,
}

impl SeizureStateMachine {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: DetectionState::default(),
        }
    }

    /// Advance by one frame
    pub fn step(
        &mut self,
        motion_value: f64,
        spectral: SpectralResult,
        window: &SignalWindow,
    ) -> GateStep {
        let qualifying = spectral.is_rhythmic && motion_value > self.config.motion_threshold;

        if !qualifying {
            if self.state.consecutive_qualifying_frames > 0 {
                debug!(
                    "Streak {} ended after {} qualifying frames",
                    self.state.streak_id, self.state.consecutive_qualifying_frames
                );
            }
            self.state.consecutive_qualifying_frames = 0;
            self.state.event_already_logged = false;
            self.state.verification_attempted = false;
            return GateStep {
                qualifying,
                candidate: None,
            };
        }

        if self.state.consecutive_qualifying_frames == 0 {
            self.state.streak_id += 1;
            debug!("Streak {} started", self.state.streak_id);
        }
        self.state.consecutive_qualifying_frames =
            self.state.consecutive_qualifying_frames.saturating_add(1);

        trace!(
            "Qualifying frame {} of streak {} (motion {:.0}, frequency {})",
            self.state.consecutive_qualifying_frames,
            self.state.streak_id,
            motion_value,
            spectral.dominant_frequency_index
        );

        let candidate = if self.should_fire() {
            let candidate = self.build_candidate(spectral, window);
            info!(
                "Candidate seizure event in streak {}: avg {:.0}, max {:.0}, frequency {}, {:.2}s",
                candidate.streak_id,
                candidate.avg_motion,
                candidate.max_motion,
                candidate.dominant_frequency,
                candidate.duration_seconds
            );
            Some(candidate)
        } else {
            None
        };

        GateStep {
            qualifying,
            candidate,
        }
    }

    fn should_fire(&self) -> bool {
        self.state.consecutive_qualifying_frames >= self.config.frame_threshold
            && !self.state.event_already_logged
            && !self.state.verification_attempted
    }

    fn build_candidate(&self, spectral: SpectralResult, window: &SignalWindow) -> CandidateEvent {
        CandidateEvent {
            streak_id: self.state.streak_id,
            avg_motion: window.mean().unwrap_or(0.0),
            max_motion: window.max().unwrap_or(0.0),
            dominant_frequency: spectral.dominant_frequency_index as f64,
            duration_seconds: self
                .config
                .frames_to_seconds(self.state.consecutive_qualifying_frames),
        }
    }

    /// The candidate of `streak_id` was confirmed and logged
    pub fn record_confirmed(&mut self, streak_id: u64) -> bool {
        if !self.is_current_streak(streak_id) {
            return false;
        }
        self.state.event_already_logged = true;
        self.state.verification_attempted = true;
        true
    }

    /// The candidate of `streak_id` scored below the cutoff
    pub fn record_rejected(&mut self, streak_id: u64) -> bool {
        if !self.is_current_streak(streak_id) {
            return false;
        }
        self.state.verification_attempted = true;
        true
    }

    /// The verifier could not score the candidate; leave the streak eligible
    pub fn record_unavailable(&mut self, streak_id: u64) -> bool {
        self.is_current_streak(streak_id)
    }

    fn is_current_streak(&self, streak_id: u64) -> bool {
        let current = self.state.consecutive_qualifying_frames > 0
            && self.state.streak_id == streak_id;
        if !current {
            debug!(
                "Discarding outcome for stale streak {} (current {})",
                streak_id, self.state.streak_id
            );
        }
        current
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rhythmic() -> SpectralResult {
        SpectralResult {
            dominant_frequency_index: 9,
            is_rhythmic: true,
        }
    }

    fn window_with(values: &[f64]) -> SignalWindow {
        let mut window = SignalWindow::new(values.len());
        for &v in values {
            window.push(v);
        }
        window
    }

    fn machine() -> SeizureStateMachine {
        SeizureStateMachine::new(DetectorConfig::default())
    }

    #[test]
    fn test_candidate_fires_at_threshold() {
        let mut gate = machine();
        let window = window_with(&[1_000_000.0, 3_000_000.0]);

        let step = gate.step(2_000_000.0, rhythmic(), &window);
        assert!(step.qualifying);
        assert!(step.candidate.is_none());

        let step = gate.step(2_000_000.0, rhythmic(), &window);
        let candidate = step.candidate.expect("candidate at threshold");
        assert_eq!(candidate.avg_motion, 2_000_000.0);
        assert_eq!(candidate.max_motion, 3_000_000.0);
        assert_eq!(candidate.dominant_frequency, 9.0);
        assert!((candidate.duration_seconds - 2.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_requires_rhythm_and_intensity() {
        let mut gate = machine();
        let window = window_with(&[0.0]);

        let not_rhythmic = SpectralResult {
            dominant_frequency_index: 9,
            is_rhythmic: false,
        };
        for _ in 0..5 {
            assert!(!gate.step(5_000_000.0, not_rhythmic, &window).qualifying);
            assert!(!gate.step(900_000.0, rhythmic(), &window).qualifying);
        }
        assert_eq!(gate.state().consecutive_qualifying_frames, 0);
    }

    #[test]
    fn test_confirmed_streak_fires_once() {
        let mut gate = machine();
        let window = window_with(&[2_000_000.0]);

        gate.step(2_000_000.0, rhythmic(), &window);
        let candidate = gate.step(2_000_000.0, rhythmic(), &window).candidate.unwrap();
        assert!(gate.record_confirmed(candidate.streak_id));
        assert!(gate.state().event_already_logged);

        for _ in 0..20 {
            assert!(gate.step(2_000_000.0, rhythmic(), &window).candidate.is_none());
            assert!(gate.state().event_already_logged);
        }

        gate.step(0.0, rhythmic(), &window);
        let state = gate.state();
        assert_eq!(state.consecutive_qualifying_frames, 0);
        assert!(!state.event_already_logged);
    }

    #[test]
    fn test_rejected_streak_is_not_retried() {
        let mut gate = machine();
        let window = window_with(&[2_000_000.0]);

        gate.step(2_000_000.0, rhythmic(), &window);
        let candidate = gate.step(2_000_000.0, rhythmic(), &window).candidate.unwrap();
        assert!(gate.record_rejected(candidate.streak_id));
        assert!(!gate.state().event_already_logged);

        for _ in 0..10 {
            assert!(gate.step(2_000_000.0, rhythmic(), &window).candidate.is_none());
        }
        assert_eq!(gate.state().consecutive_qualifying_frames, 12);

        // Break and restart the streak
        gate.step(0.0, rhythmic(), &window);
        gate.step(2_000_000.0, rhythmic(), &window);
        let retry = gate.step(2_000_000.0, rhythmic(), &window).candidate.unwrap();
        assert_eq!(retry.streak_id, candidate.streak_id + 1);
    }

    #[test]
    fn test_unavailable_verifier_retries_next_frame() {
        let mut gate = machine();
        let window = window_with(&[2_000_000.0]);

        gate.step(2_000_000.0, rhythmic(), &window);
        let candidate = gate.step(2_000_000.0, rhythmic(), &window).candidate.unwrap();
        assert!(gate.record_unavailable(candidate.streak_id));

        let retry = gate.step(2_000_000.0, rhythmic(), &window).candidate.unwrap();
        assert_eq!(retry.streak_id, candidate.streak_id);
        assert!((retry.duration_seconds - 3.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_stale_outcome_is_ignored() {
        let mut gate = machine();
        let window = window_with(&[2_000_000.0]);

        gate.step(2_000_000.0, rhythmic(), &window);
        let candidate = gate.step(2_000_000.0, rhythmic(), &window).candidate.unwrap();
        gate.step(0.0, rhythmic(), &window);

        assert!(!gate.record_confirmed(candidate.streak_id));
        assert!(!gate.state().event_already_logged);

        gate.step(2_000_000.0, rhythmic(), &window);
        assert!(!gate.record_confirmed(candidate.streak_id));
        assert!(!gate.state().event_already_logged);
    }

    #[test]
    fn test_logged_flag_implies_threshold_reached() {
        let mut gate = machine();
        let window = window_with(&[2_000_000.0]);
        let pattern = [true, true, true, false, true, false, true, true, true, true];

        for qualifies in pattern.iter().cycle().take(100) {
            let motion = if *qualifies { 2_000_000.0 } else { 0.0 };
            if let Some(candidate) = gate.step(motion, rhythmic(), &window).candidate {
                gate.record_confirmed(candidate.streak_id);
            }
            let state = gate.state();
            if state.event_already_logged {
                assert!(state.consecutive_qualifying_frames >= gate.config().frame_threshold);
            }
            if state.consecutive_qualifying_frames == 0 {
                assert!(!state.event_already_logged);
            }
        }
    }
}

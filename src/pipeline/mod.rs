
use crate::analyzer::{MotionExtractor, RhythmAnalyzer, SignalWindow, SpectralResult};
use crate::config::DetectorConfig;
use crate::detector::{CandidateEvent, DetectionState, SeizureStateMachine, Verifier};
use crate::emitter::{EmitterStats, EventEmitter, StatusSnapshot};
use crate::error::{FrameError, SeizowatchError};
use crate::events::{EventBus, SeizowatchEvent};
use crate::frame::GrayFrame;
use crate::source::FrameSource;

use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How one verification attempt ended
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Confirmed {
        score: f32,
        event_id: String,
        recorded: bool,
        alerted: bool,
    },
    Rejected {
        score: f32,
    },
    Unavailable {
        reason: String,
    },
}

/// What the pipeline did with one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_id: u64,
    /// None for the frame that primes the extractor
    pub motion_value: Option<f64>,
    pub spectral: SpectralResult,
    pub qualifying: bool,
    pub candidate: Option<CandidateEvent>,
    pub outcome: Option<VerificationOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub qualifying_frames: u64,
    pub candidates: u64,
    pub confirmed: u64,
    pub rejected: u64,
    pub unavailable: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub stop_reason: StopReason,
    pub stats: PipelineStats,
}

/// Single-stream detection loop: motion extraction, spectral analysis,
/// rule gate, verification and event emission, one frame at a time.
pub struct DetectionPipeline {
    extractor: MotionExtractor,
    window: SignalWindow,
    analyzer: RhythmAnalyzer,
    gate: SeizureStateMachine,
    verifier: Verifier,
    emitter: EventEmitter,
    event_bus: Option<Arc<EventBus>>,
    stats: PipelineStats,
}

impl DetectionPipeline {
    pub fn new(config: DetectorConfig, verifier: Verifier, emitter: EventEmitter) -> Self {
        Self {
            extractor: MotionExtractor::new(),
            window: SignalWindow::new(config.window_capacity),
            analyzer: RhythmAnalyzer::new(
                config.window_capacity,
                config.rhythm_threshold,
                config.max_bin,
            ),
            gate: SeizureStateMachine::new(config),
            verifier,
            emitter,
            event_bus: None,
            stats: PipelineStats::default(),
        }
    }

    /// Publish camera status and fatal errors on `event_bus`
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Run until end of stream, cancellation, or a fatal frame error.
    ///
    /// The source is closed on every exit path.
    pub async fn run(
        &mut self,
        source: &mut dyn FrameSource,
        cancel: CancellationToken,
    ) -> Result<PipelineSummary, SeizowatchError> {
        info!("Starting detection on {}", source.describe());

        if let Err(e) = source.open().await {
            error!("Failed to open {}: {}", source.describe(), e);
            source.close().await;
            self.publish_error(&e);
            return Err(e.into());
        }
        self.publish_camera_status(true);

        let result = self.run_loop(source, &cancel).await;

        source.close().await;
        self.publish_camera_status(false);

        match result {
            Ok(stop_reason) => {
                info!(
                    "Detection stopped ({:?}) after {} frames: {} candidates, {} confirmed",
                    stop_reason,
                    self.stats.frames_processed,
                    self.stats.candidates,
                    self.stats.confirmed
                );
                Ok(PipelineSummary {
                    stop_reason,
                    stats: self.stats.clone(),
                })
            }
            Err(e) => {
                self.publish_error(&e);
                Err(e.into())
            }
        }
    }

    async fn run_loop(
        &mut self,
        source: &mut dyn FrameSource,
        cancel: &CancellationToken,
    ) -> Result<StopReason, FrameError> {
        let mut last_frame_id: Option<u64> = None;

        loop {
            if cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(StopReason::Cancelled),
                next = source.next_frame() => next,
            };

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(StopReason::EndOfStream),
                Err(e) => {
                    error!(
                        "Frame acquisition failed after frame {:?}: {}",
                        last_frame_id, e
                    );
                    return Err(e);
                }
            };

            let frame_id = frame.id;
            let timestamp = frame.timestamp;
            if let Err(e) = self.process_frame(frame).await {
                error!(
                    "Detection stopped at frame {} ({:?}): {}",
                    frame_id, timestamp, e
                );
                return Err(e);
            }
            last_frame_id = Some(frame_id);
        }
    }

    /// Feed one frame through every stage
    pub async fn process_frame(&mut self, frame: GrayFrame) -> Result<FrameReport, FrameError> {
        let frame_id = frame.id;
        let Some(sample) = self.extractor.extract(frame)? else {
            return Ok(FrameReport {
                frame_id,
                motion_value: None,
                spectral: SpectralResult::absent(),
                qualifying: false,
                candidate: None,
                outcome: None,
            });
        };
        self.stats.frames_processed += 1;

        let motion_value = sample.value();
        self.window.push(motion_value);

        let spectral = self
            .analyzer
            .analyze(&self.window)
            .unwrap_or_else(SpectralResult::absent);

        let step = self.gate.step(motion_value, spectral, &self.window);
        if step.qualifying {
            self.stats.qualifying_frames += 1;
        }

        let outcome = match step.candidate {
            Some(candidate) => Some(self.verify_candidate(&candidate).await),
            None => None,
        };

        self.publish_status(motion_value, spectral).await;

        Ok(FrameReport {
            frame_id,
            motion_value: Some(motion_value),
            spectral,
            qualifying: step.qualifying,
            candidate: step.candidate,
            outcome,
        })
    }

    async fn verify_candidate(&mut self, candidate: &CandidateEvent) -> VerificationOutcome {
        self.stats.candidates += 1;

        match self.verifier.verify(candidate) {
            Ok(verification) if verification.confirmed => {
                // Mark the streak before emitting so a slow sink cannot re-trigger it
                self.gate.record_confirmed(candidate.streak_id);
                self.stats.confirmed += 1;

                let emitted = self.emitter.emit_confirmed(candidate, verification.score).await;
                VerificationOutcome::Confirmed {
                    score: verification.score,
                    event_id: emitted.event.event_id,
                    recorded: emitted.recorded,
                    alerted: emitted.alerted,
                }
            }
            Ok(verification) => {
                self.gate.record_rejected(candidate.streak_id);
                self.stats.rejected += 1;
                info!(
                    "Candidate in streak {} rejected (score {:.2} <= {:.2})",
                    candidate.streak_id,
                    verification.score,
                    self.verifier.cutoff()
                );
                VerificationOutcome::Rejected {
                    score: verification.score,
                }
            }
            Err(e) => {
                self.gate.record_unavailable(candidate.streak_id);
                self.stats.unavailable += 1;
                warn!(
                    "Verification unavailable for streak {}; will retry while the streak lasts: {}",
                    candidate.streak_id, e
                );
                VerificationOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn publish_status(&mut self, motion_value: f64, spectral: SpectralResult) {
        let now = Instant::now();
        if !self.emitter.status_due(now) {
            return;
        }

        let avg_motion = self.window.mean().unwrap_or(0.0);
        let max_motion = self.window.max().unwrap_or(0.0);
        self.emitter
            .maybe_publish_status(now, |timestamp| StatusSnapshot {
                motion_value,
                dominant_frequency: spectral.dominant_frequency_index as f64,
                rhythmic_motion: spectral.is_rhythmic,
                avg_motion,
                max_motion,
                timestamp: timestamp.to_string(),
            })
            .await;
    }

    fn publish_camera_status(&self, running: bool) {
        if let Some(bus) = &self.event_bus {
            let event = SeizowatchEvent::CameraStatusChanged {
                running,
                timestamp: SystemTime::now(),
            };
            if let Err(e) = bus.publish_if_subscribed(event) {
                debug!("Camera status not published: {}", e);
            }
        }
    }

    fn publish_error(&self, error: &FrameError) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.publish_if_subscribed(SeizowatchEvent::SystemError {
                component: "detection_pipeline".to_string(),
                error: error.to_string(),
            });
        }
    }

    pub fn detection_state(&self) -> DetectionState {
        self.gate.state()
    }

    pub fn window(&self) -> &SignalWindow {
        &self.window
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn emitter_stats(&self) -> &EmitterStats {
        self.emitter.stats()
    }
}

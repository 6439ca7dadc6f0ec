pub mod analyzer;
pub mod app;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod emitter;
pub mod error;
pub mod events;
pub mod frame;
pub mod pipeline;
pub mod source;
pub mod storage;

#[cfg(feature = "http")]
pub mod server;

pub use analyzer::{MotionExtractor, MotionSample, RhythmAnalyzer, SignalWindow, SpectralResult};
pub use app::{Component, ComponentState, SeizowatchOrchestrator, ShutdownReason};
pub use classifier::{Classifier, MlpClassifier, MlpModel};
pub use config::SeizowatchConfig;
pub use detector::{CandidateEvent, DetectionState, SeizureStateMachine, Verification, Verifier};
pub use emitter::{
    AlertSeverity, ConfirmedEvent, EventEmitter, EventSink, Notifier, StatusSink, StatusSnapshot,
};
pub use error::{Result, SeizowatchError};
pub use events::{EventBus, SeizowatchEvent};
pub use frame::GrayFrame;
pub use pipeline::{DetectionPipeline, FrameReport, PipelineSummary, StopReason, VerificationOutcome};
pub use source::{FrameSource, RawVideoSource, SourceKind};
pub use storage::JsonlEventLog;

#[cfg(feature = "http")]
pub use server::{StatusServer, ServerState};

use super::types::{Component, ComponentState, ShutdownReason};
use crate::classifier::{Classifier, MlpClassifier};
use crate::config::SeizowatchConfig;
use crate::detector::Verifier;
use crate::emitter::{BusNotifier, BusStatusSink, EventEmitter, FanoutNotifier, LogNotifier};
use crate::error::Result;
use crate::events::EventBus;
use crate::pipeline::{DetectionPipeline, PipelineSummary};
use crate::source::{build_source, FrameSource, SourceKind};
use crate::storage::JsonlEventLog;

#[cfg(feature = "http")]
use crate::server::MonitorState;

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wires the detection pipeline to its source, the event log, the event bus
/// and the optional status server, and owns their lifecycle.
pub struct SeizowatchOrchestrator {
    pub(super) config: SeizowatchConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) event_log: Arc<JsonlEventLog>,

    // Components
    pub(super) pipeline: Option<DetectionPipeline>,
    pub(super) source: Option<Box<dyn FrameSource>>,
    pub(super) source_description: String,
    pub(super) pipeline_task: Option<JoinHandle<Result<PipelineSummary>>>,
    pub(super) pipeline_outcome: Option<std::result::Result<PipelineSummary, String>>,
    #[cfg(feature = "http")]
    pub(super) monitor: MonitorState,
    pub(super) background_tasks: Vec<(Component, JoinHandle<()>)>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<BTreeMap<Component, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl SeizowatchOrchestrator {
    /// Create an orchestrator that loads the classifier from the configured
    /// model file and reads frames from `source_kind`
    pub async fn new(config: SeizowatchConfig, source_kind: &SourceKind) -> Result<Self> {
        if matches!(source_kind, SourceKind::Camera) {
            config.check_camera_timing()?;
        }
        let classifier = Arc::new(MlpClassifier::load(&config.verifier.model_path)?);
        let source = build_source(source_kind, &config.camera)?;
        Self::with_components(config, source, classifier)
    }

    /// Create an orchestrator around an already constructed source and classifier
    pub fn with_components(
        config: SeizowatchConfig,
        source: Box<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self> {
        let timezone = config.events.parsed_timezone()?;
        let event_bus = Arc::new(EventBus::new(config.events.event_bus_capacity));
        let event_log = Arc::new(JsonlEventLog::new(&config.events.log_path));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let notifier = FanoutNotifier::new(vec![
            Arc::new(LogNotifier),
            Arc::new(BusNotifier::new(Arc::clone(&event_bus))),
        ]);
        let emitter = EventEmitter::new(
            event_log.clone(),
            Arc::new(BusStatusSink::new(Arc::clone(&event_bus))),
            Arc::new(notifier),
            timezone,
            config.events.status_interval(),
        );

        let verifier = Verifier::new(classifier, config.verifier.cutoff);
        let pipeline = DetectionPipeline::new(config.detector.clone(), verifier, emitter)
            .with_event_bus(Arc::clone(&event_bus));

        let source_description = source.describe();
        info!(
            "Detector configured: source {}, window {}, motion threshold {}, rhythm threshold {}, frame threshold {}",
            source_description,
            config.detector.window_capacity,
            config.detector.motion_threshold,
            config.detector.rhythm_threshold,
            config.detector.frame_threshold
        );

        Ok(Self {
            config,
            event_bus,
            event_log,
            pipeline: Some(pipeline),
            source: Some(source),
            source_description,
            pipeline_task: None,
            pipeline_outcome: None,
            #[cfg(feature = "http")]
            monitor: MonitorState::new(),
            background_tasks: Vec::new(),
            component_states: Arc::new(Mutex::new(BTreeMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn event_log(&self) -> Arc<JsonlEventLog> {
        Arc::clone(&self.event_log)
    }

    /// Result of the detection loop once it has finished
    pub fn pipeline_outcome(&self) -> Option<&std::result::Result<PipelineSummary, String>> {
        self.pipeline_outcome.as_ref()
    }
}

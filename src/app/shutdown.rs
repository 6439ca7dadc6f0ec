use super::{Component, ComponentState, SeizowatchOrchestrator, ShutdownReason};
use crate::error::Result;
use crate::events::SeizowatchEvent;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

const PIPELINE_STOP_TIMEOUT: Duration = Duration::from_secs(10);
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl SeizowatchOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self, reason: &ShutdownReason) -> Result<i32> {
        info!("Beginning graceful shutdown");

        let _ = self
            .event_bus
            .publish_if_subscribed(SeizowatchEvent::ShutdownRequested {
                timestamp: SystemTime::now(),
                reason: format!("{:?}", reason),
            });

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        // Failures were logged where they occurred
        if let Err(message) = self.stop_pipeline().await {
            debug!("Pipeline ended with failure: {}", message);
            exit_code = 1;
        }

        let tasks: Vec<_> = self.background_tasks.drain(..).collect();
        for (name, task) in tasks {
            self.set_component_state(name, ComponentState::Stopping)
                .await;
            match timeout(TASK_STOP_TIMEOUT, task).await {
                Ok(Ok(())) => {
                    self.set_component_state(name, ComponentState::Stopped)
                        .await;
                    info!("{} component stopped", name);
                }
                Ok(Err(e)) => {
                    self.set_component_state(name, ComponentState::Failed)
                        .await;
                    error!("{} task failed: {}", name, e);
                }
                Err(_) => {
                    self.set_component_state(name, ComponentState::Failed)
                        .await;
                    warn!("{} component stop timeout", name);
                }
            }
        }

        self.set_component_state(Component::EventLog, ComponentState::Stopped)
            .await;

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Wait for the detection loop to observe cancellation and release its source
    async fn stop_pipeline(&mut self) -> std::result::Result<(), String> {
        self.set_component_state(Component::Pipeline, ComponentState::Stopping)
            .await;

        if let Some(task) = self.pipeline_task.take() {
            match timeout(PIPELINE_STOP_TIMEOUT, task).await {
                Ok(joined) => self.record_pipeline_result(joined),
                Err(_) => {
                    error!(
                        "Detection pipeline did not stop within {:?}",
                        PIPELINE_STOP_TIMEOUT
                    );
                    self.set_component_state(Component::Pipeline, ComponentState::Failed)
                        .await;
                    return Err("pipeline stop timeout".to_string());
                }
            }
        }

        match &self.pipeline_outcome {
            Some(Ok(summary)) => {
                info!(
                    "Detection finished ({:?}): {} frames, {} candidates, {} confirmed",
                    summary.stop_reason,
                    summary.stats.frames_processed,
                    summary.stats.candidates,
                    summary.stats.confirmed
                );
                self.set_component_state(Component::Pipeline, ComponentState::Stopped)
                    .await;
                Ok(())
            }
            Some(Err(message)) => {
                let message = message.clone();
                self.set_component_state(Component::Pipeline, ComponentState::Failed)
                    .await;
                Err(message)
            }
            None => {
                self.set_component_state(Component::Pipeline, ComponentState::Stopped)
                    .await;
                Ok(())
            }
        }
    }
}

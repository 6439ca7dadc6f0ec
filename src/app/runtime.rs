use super::{SeizowatchOrchestrator, ShutdownReason};
use crate::error::{Result, SeizowatchError};
use crate::pipeline::PipelineSummary;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinError;
use tracing::{error, info};

impl SeizowatchOrchestrator {
    /// Run until a signal arrives or the detection loop ends, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("SeizoWatch is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| SeizowatchError::system("Shutdown sender already taken"))?;

        let mut shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| SeizowatchError::system("Shutdown receiver already taken"))?;

        let mut pipeline_task = self
            .pipeline_task
            .take()
            .ok_or_else(|| SeizowatchError::system("Detection pipeline was not started"))?;

        self.setup_signal_handlers(shutdown_sender).await;

        let (shutdown_reason, finished) = tokio::select! {
            received = &mut shutdown_receiver => {
                let reason = received.map_err(|_| {
                    SeizowatchError::system("Shutdown channel closed unexpectedly")
                })?;
                (reason, None)
            }
            joined = &mut pipeline_task => (Self::reason_for(&joined), Some(joined)),
        };

        match finished {
            Some(joined) => self.record_pipeline_result(joined),
            None => self.pipeline_task = Some(pipeline_task),
        }

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown(&shutdown_reason).await?;

        info!("SeizoWatch shutdown complete");
        Ok(exit_code)
    }

    fn reason_for(joined: &std::result::Result<Result<PipelineSummary>, JoinError>) -> ShutdownReason {
        match joined {
            Ok(Ok(_)) => ShutdownReason::EndOfStream,
            Ok(Err(e)) => ShutdownReason::Error(e.to_string()),
            Err(e) => ShutdownReason::Error(format!("Detection task failed: {}", e)),
        }
    }

    pub(super) fn record_pipeline_result(
        &mut self,
        joined: std::result::Result<Result<PipelineSummary>, JoinError>,
    ) {
        self.pipeline_outcome = Some(match joined {
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("Detection task failed: {}", e)),
        });
    }

    /// Set up signal handlers for graceful shutdown
    async fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}

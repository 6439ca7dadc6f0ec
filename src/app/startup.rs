use super::{Component, ComponentState, SeizowatchOrchestrator};
use crate::error::{Result, SeizowatchError};
use tracing::{error, info};

#[cfg(feature = "http")]
use crate::server::{ServerState, StatusServer};
#[cfg(feature = "http")]
use std::sync::Arc;

impl SeizowatchOrchestrator {
    /// Initialize all system components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing SeizoWatch components");

        self.event_log.initialize().await.map_err(|e| {
            error!("Failed to initialize event log: {}", e);
            e
        })?;

        let mut states = self.component_states.lock().await;
        states.insert(Component::EventLog, ComponentState::Running);
        states.insert(Component::Pipeline, ComponentState::Stopped);
        if self.config.server.enabled {
            states.insert(Component::Server, ComponentState::Stopped);
        }
        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the status server (if enabled) and the detection loop
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting SeizoWatch");

        // The server subscribes before the pipeline publishes camera status
        if self.config.server.enabled {
            self.start_server().await;
        }

        self.set_component_state(Component::Pipeline, ComponentState::Starting)
            .await;

        let mut pipeline = self
            .pipeline
            .take()
            .ok_or_else(|| SeizowatchError::system("Detection pipeline already started"))?;
        let mut source = self
            .source
            .take()
            .ok_or_else(|| SeizowatchError::system("Frame source already taken"))?;
        let cancel = self.cancellation_token.child_token();

        self.pipeline_task = Some(tokio::spawn(async move {
            pipeline.run(source.as_mut(), cancel).await
        }));

        self.set_component_state(Component::Pipeline, ComponentState::Running)
            .await;
        info!("Detection started on {}", self.source_description);
        Ok(())
    }

    #[cfg(feature = "http")]
    async fn start_server(&mut self) {
        self.set_component_state(Component::Server, ComponentState::Starting)
            .await;

        let updater = self
            .monitor
            .spawn_updater(&self.event_bus, self.cancellation_token.child_token());
        self.background_tasks
            .push((Component::Monitor, updater));

        let server = StatusServer::new(
            self.config.server.clone(),
            ServerState::new(
                self.monitor.clone(),
                Arc::clone(&self.event_log),
                Arc::clone(&self.event_bus),
            ),
        );
        let address = server.address();
        let cancel = self.cancellation_token.child_token();
        let event_bus = Arc::clone(&self.event_bus);

        let task = tokio::spawn(async move {
            if let Err(e) = server.start(cancel).await {
                error!("Status server error: {}", e);
                let _ = event_bus.publish_if_subscribed(crate::events::SeizowatchEvent::SystemError {
                    component: Component::Server.to_string(),
                    error: e.to_string(),
                });
            }
        });
        self.background_tasks.push((Component::Server, task));

        self.set_component_state(Component::Server, ComponentState::Running)
            .await;
        info!("Status server started on {}", address);
    }

    #[cfg(not(feature = "http"))]
    async fn start_server(&mut self) {
        tracing::warn!("Status server requested but the 'http' feature is disabled");
        self.set_component_state(Component::Server, ComponentState::Failed)
            .await;
    }
}

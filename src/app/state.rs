use super::{Component, ComponentState, SeizowatchOrchestrator};
use tracing::debug;

impl SeizowatchOrchestrator {
    pub async fn set_component_state(&self, component: Component, state: ComponentState) {
        let previous = self.component_states.lock().await.insert(component, state);
        if previous != Some(state) {
            debug!("{}: {:?} -> {:?}", component, previous, state);
        }
    }

    pub async fn get_component_state(&self, component: Component) -> Option<ComponentState> {
        self.component_states.lock().await.get(&component).copied()
    }

    /// Tracked components in a stable order
    pub async fn component_states(&self) -> Vec<(Component, ComponentState)> {
        self.component_states
            .lock()
            .await
            .iter()
            .map(|(component, state)| (*component, *state))
            .collect()
    }

    /// True when any tracked component has failed
    pub async fn has_failed_component(&self) -> bool {
        self.component_states
            .lock()
            .await
            .values()
            .any(|state| *state == ComponentState::Failed)
    }
}

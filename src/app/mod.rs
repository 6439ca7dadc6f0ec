mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::SeizowatchOrchestrator;
pub use types::{Component, ComponentState, ShutdownReason};

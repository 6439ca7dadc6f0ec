mod state;
mod verifier;

pub use state::{CandidateEvent, DetectionState, GateStep, SeizureStateMachine};
pub use verifier::{Verification, Verifier};

use crate::classifier::Classifier;
use crate::detector::state::CandidateEvent;
use crate::error::VerifierError;

use std::sync::Arc;
use tracing::{debug, info};

/// Verifier decision for one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verification {
    pub confirmed: bool,
    pub score: f32,
}

/// Threshold decision over an injected classifier
#[derive(Clone)]
pub struct Verifier {
    classifier: Arc<dyn Classifier>,
    cutoff: f32,
}

impl Verifier {
    pub fn new(classifier: Arc<dyn Classifier>, cutoff: f32) -> Self {
        Self { classifier, cutoff }
    }

    /// Score a candidate. `confirmed = score > cutoff`.
    ///
    /// Scores outside [0, 1] are treated as malformed classifier output.
    pub fn verify(&self, candidate: &CandidateEvent) -> Result<Verification, VerifierError> {
        let features = candidate.features();
        debug!(
            "Verifying candidate from streak {} with {} ({:?})",
            candidate.streak_id,
            self.classifier.name(),
            features
        );

        let score = self.classifier.infer(features)?;
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(VerifierError::Unavailable {
                details: format!("classifier returned out-of-range score {}", score),
            });
        }

        let verification = Verification {
            confirmed: score > self.cutoff,
            score,
        };
        info!(
            "Verifier score {:.3} (cutoff {:.2}): {}",
            score,
            self.cutoff,
            if verification.confirmed {
                "confirmed"
            } else {
                "rejected"
            }
        );
        Ok(verification)
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }
}

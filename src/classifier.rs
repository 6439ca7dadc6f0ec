//! Secondary classifier used to verify rule-based candidates.
//!
//! The shipped model is a standardizing scaler followed by a single hidden
//! ReLU layer and a logistic output unit, stored as JSON.

use crate::error::VerifierError;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Number of input features: avg_motion, max_motion, dominant_frequency, duration_seconds
pub const FEATURE_COUNT: usize = 4;

/// Binary classifier returning the probability of the positive class
pub trait Classifier: Send + Sync {
    fn infer(&self, features: [f32; FEATURE_COUNT]) -> Result<f32, VerifierError>;

    fn name(&self) -> &str {
        "classifier"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: [f32; FEATURE_COUNT],
    pub scale: [f32; FEATURE_COUNT],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    /// One row of input weights per hidden unit
    pub weights: Vec<[f32; FEATURE_COUNT]>,
    pub bias: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputUnit {
    pub weights: Vec<f32>,
    pub bias: f32,
}

/// Serialized MLP parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpModel {
    pub scaler: ScalerParams,
    pub hidden: DenseLayer,
    pub output: OutputUnit,
}

impl MlpModel {
    fn validate(&self) -> Result<(), String> {
        let units = self.hidden.weights.len();
        if units == 0 {
            return Err("hidden layer has no units".to_string());
        }
        if self.hidden.bias.len() != units {
            return Err(format!(
                "hidden bias has {} entries, expected {}",
                self.hidden.bias.len(),
                units
            ));
        }
        if self.output.weights.len() != units {
            return Err(format!(
                "output weights have {} entries, expected {}",
                self.output.weights.len(),
                units
            ));
        }
        if self.scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err("scaler scale must be finite and non-zero".to_string());
        }
        Ok(())
    }
}

/// Natively evaluated scaler + MLP classifier
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    model: MlpModel,
}

impl MlpClassifier {
    pub fn new(model: MlpModel) -> Result<Self, VerifierError> {
        model.validate().map_err(|details| VerifierError::ModelLoad {
            path: "<memory>".to_string(),
            details,
        })?;
        Ok(Self { model })
    }

    /// Load model parameters from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, VerifierError> {
        let path_str = path.as_ref().display().to_string();
        debug!("Loading classifier model from {}", path_str);

        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            VerifierError::ModelLoad {
                path: path_str.clone(),
                details: e.to_string(),
            }
        })?;

        let model: MlpModel =
            serde_json::from_str(&contents).map_err(|e| VerifierError::ModelLoad {
                path: path_str.clone(),
                details: e.to_string(),
            })?;

        model.validate().map_err(|details| VerifierError::ModelLoad {
            path: path_str.clone(),
            details,
        })?;

        info!(
            "Loaded classifier model from {} ({} hidden units)",
            path_str,
            model.hidden.weights.len()
        );
        Ok(Self { model })
    }

    pub fn model(&self) -> &MlpModel {
        &self.model
    }
}

impl Classifier for MlpClassifier {
    fn infer(&self, features: [f32; FEATURE_COUNT]) -> Result<f32, VerifierError> {
        if features.iter().any(|f| !f.is_finite()) {
            return Err(VerifierError::Unavailable {
                details: format!("non-finite input features {:?}", features),
            });
        }

        let scaler = &self.model.scaler;
        let mut scaled = [0f32; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            scaled[i] = (features[i] - scaler.mean[i]) / scaler.scale[i];
        }

        let logit = self
            .model
            .hidden
            .weights
            .iter()
            .zip(self.model.hidden.bias.iter())
            .zip(self.model.output.weights.iter())
            .map(|((row, bias), out_weight)| {
                let activation: f32 =
                    row.iter().zip(scaled.iter()).map(|(w, x)| w * x).sum::<f32>() + bias;
                activation.max(0.0) * out_weight
            })
            .sum::<f32>()
            + self.model.output.bias;

        Ok(1.0 / (1.0 + (-logit).exp()))
    }

    fn name(&self) -> &str {
        "mlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn identity_model(output_bias: f32) -> MlpModel {
        MlpModel {
            scaler: ScalerParams {
                mean: [0.0; 4],
                scale: [1.0; 4],
            },
            hidden: DenseLayer {
                weights: vec![[1.0, 0.0, 0.0, 0.0]],
                bias: vec![0.0],
            },
            output: OutputUnit {
                weights: vec![1.0],
                bias: output_bias,
            },
        }
    }

    #[test]
    fn test_zero_logit_is_half() {
        let classifier = MlpClassifier::new(identity_model(0.0)).unwrap();
        let p = classifier.infer([0.0, 5.0, 5.0, 5.0]).unwrap();
        assert!((p - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_relu_clamps_negative_activations() {
        let classifier = MlpClassifier::new(identity_model(0.0)).unwrap();
        let negative = classifier.infer([-10.0, 0.0, 0.0, 0.0]).unwrap();
        assert!((negative - 0.5).abs() < 1e-6);

        let positive = classifier.infer([3.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(positive > 0.95);
    }

    #[test]
    fn test_scaler_applied_before_hidden_layer() {
        let mut model = identity_model(0.0);
        model.scaler.mean = [1_000_000.0, 0.0, 0.0, 0.0];
        model.scaler.scale = [500_000.0, 1.0, 1.0, 1.0];
        let classifier = MlpClassifier::new(model).unwrap();

        // (2e6 - 1e6) / 5e5 = 2 -> sigmoid(2)
        let p = classifier.infer([2_000_000.0, 0.0, 0.0, 0.0]).unwrap();
        assert!((p - 0.880_797).abs() < 1e-4);
    }

    #[test]
    fn test_inconsistent_model_rejected() {
        let mut model = identity_model(0.0);
        model.output.weights = vec![1.0, 2.0];
        assert!(matches!(
            MlpClassifier::new(model),
            Err(VerifierError::ModelLoad { .. })
        ));

        let mut model = identity_model(0.0);
        model.scaler.scale[2] = 0.0;
        assert!(MlpClassifier::new(model).is_err());
    }

    #[test]
    fn test_non_finite_features_unavailable() {
        let classifier = MlpClassifier::new(identity_model(0.0)).unwrap();
        assert!(matches!(
            classifier.infer([f32::NAN, 0.0, 0.0, 0.0]),
            Err(VerifierError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_load_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&identity_model(-1.0)).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let classifier = MlpClassifier::load(file.path()).unwrap();
        assert_eq!(classifier.model().hidden.weights.len(), 1);
        let p = classifier.infer([1.0, 0.0, 0.0, 0.0]).unwrap();
        assert!((p - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_shipped_model_separates_strong_and_weak_motion() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/models/seizure_verifier.json");
        let classifier = MlpClassifier::load(path).unwrap();
        let duration = 2.0 / 15.0;

        let strong = classifier
            .infer([1_200_000.0, 1_500_000.0, 9.0, duration])
            .unwrap();
        let weak = classifier
            .infer([910_000.0, 920_000.0, 5.0, duration])
            .unwrap();

        assert!(strong > 0.5, "strong rhythmic motion scored {}", strong);
        assert!(weak < 0.5, "weak motion scored {}", weak);
        assert!((strong - 0.787).abs() < 1e-3);
        assert!((weak - 0.151).abs() < 1e-3);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MlpClassifier::load("/nonexistent/model.json").unwrap_err();
        assert!(matches!(err, VerifierError::ModelLoad { .. }));
    }
}

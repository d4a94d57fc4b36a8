//! Standard-scaler + logistic-regression classifier.
//!
//! The artifact is a JSON document holding the fitted scaler statistics and
//! the regression weights:
//!
//! ```json
//! {
//!   "feature_names": ["Pclass", "Sex", "Age", "SibSp", "Parch", "Fare"],
//!   "scaler": { "mean": [..6..], "scale": [..6..] },
//!   "classifier": { "coefficients": [..6..], "intercept": 0.11, "classes": [0, 1] }
//! }
//! ```
//!
//! Every shape and finiteness check happens in [`LogisticPipeline::from_artifact`],
//! so [`Classifier::predict`] cannot fail once a pipeline exists.

use std::path::Path;

use predserve_core::{
    ClassScores, Classifier, FeatureVector, PredServeError, Result, FEATURE_COUNT, FEATURE_NAMES,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Artifact schema
// ---------------------------------------------------------------------------

/// On-disk representation of a trained pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Feature names in training order. Informational; must match the
    /// serving schema when present.
    #[serde(default)]
    pub feature_names: Vec<String>,
    /// Fitted standard-scaler statistics.
    pub scaler: ScalerParams,
    /// Fitted logistic-regression weights.
    pub classifier: ClassifierParams,
}

/// Per-feature mean and standard deviation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Training-set mean of each feature.
    pub mean: Vec<f64>,
    /// Training-set standard deviation of each feature. Must be non-zero.
    pub scale: Vec<f64>,
}

/// Binary logistic-regression weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// One weight per scaled feature.
    pub coefficients: Vec<f64>,
    /// Bias term of the decision function.
    pub intercept: f64,
    /// Class labels in probability-column order.
    #[serde(default = "default_classes")]
    pub classes: Vec<i32>,
}

fn default_classes() -> Vec<i32> {
    vec![0, 1]
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A validated, immutable scaler + logistic-regression model.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticPipeline {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
    coefficients: [f64; FEATURE_COUNT],
    intercept: f64,
}

impl LogisticPipeline {
    /// Read and validate an artifact from disk.
    ///
    /// # Errors
    ///
    /// * [`PredServeError::ArtifactNotFound`] if `path` does not exist.
    /// * [`PredServeError::Io`] if it cannot be read.
    /// * [`PredServeError::Serialization`] if it is not valid artifact JSON.
    /// * [`PredServeError::InvalidArtifact`] if the weights are unusable.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PredServeError::ArtifactNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                PredServeError::Io(e)
            }
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate an artifact from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let artifact: ModelArtifact = serde_json::from_str(json)?;
        Self::from_artifact(artifact)
    }

    /// Validate an in-memory artifact.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        if !artifact.feature_names.is_empty() && artifact.feature_names != FEATURE_NAMES {
            return Err(PredServeError::InvalidArtifact(format!(
                "feature names {:?} do not match serving schema {:?}",
                artifact.feature_names, FEATURE_NAMES
            )));
        }

        let mean = fixed_len("scaler.mean", &artifact.scaler.mean)?;
        let scale = fixed_len("scaler.scale", &artifact.scaler.scale)?;
        let coefficients = fixed_len("classifier.coefficients", &artifact.classifier.coefficients)?;

        if let Some(i) = scale.iter().position(|s| *s == 0.0) {
            return Err(PredServeError::InvalidArtifact(format!(
                "scaler.scale[{i}] is zero"
            )));
        }
        if !artifact.classifier.intercept.is_finite() {
            return Err(PredServeError::InvalidArtifact(
                "classifier.intercept is not finite".to_string(),
            ));
        }
        if artifact.classifier.classes != [0, 1] {
            return Err(PredServeError::InvalidArtifact(format!(
                "classifier.classes must be [0, 1], got {:?}",
                artifact.classifier.classes
            )));
        }

        Ok(Self {
            mean,
            scale,
            coefficients,
            intercept: artifact.classifier.intercept,
        })
    }

    /// Linear decision score for a vector (log-odds of class 1).
    pub fn decision_function(&self, features: &FeatureVector) -> f64 {
        features
            .values()
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .zip(&self.coefficients)
            .fold(self.intercept, |acc, ((x, (mu, sigma)), w)| {
                acc + w * (x - mu) / sigma
            })
    }
}

impl Classifier for LogisticPipeline {
    fn predict(&self, features: &FeatureVector) -> ClassScores {
        let p1 = sigmoid(self.decision_function(features));
        // Non-finite inputs can push the score to NaN; report an undecided
        // model rather than a probability outside [0, 1].
        let p1 = if p1.is_nan() { 0.5 } else { p1 };
        ClassScores {
            label: i32::from(p1 > 0.5),
            probabilities: [1.0 - p1, p1],
        }
    }

    fn describe(&self) -> String {
        format!(
            "StandardScaler + LogisticRegression ({FEATURE_COUNT} features, intercept {:.4})",
            self.intercept
        )
    }
}

/// Numerically stable logistic function.
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn fixed_len(field: &str, values: &[f64]) -> Result<[f64; FEATURE_COUNT]> {
    let arr: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| {
        PredServeError::InvalidArtifact(format!(
            "{field} has {} values, expected {FEATURE_COUNT}",
            values.len()
        ))
    })?;
    if let Some(i) = arr.iter().position(|v| !v.is_finite()) {
        return Err(PredServeError::InvalidArtifact(format!(
            "{field}[{i}] is not finite"
        )));
    }
    Ok(arr)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Core types, traits, and errors for predserve
//!
//! This crate contains the foundational types shared across all predserve
//! components: the fixed feature schema and its validator, prediction and
//! health data structures, the [`Classifier`] capability implemented by model
//! backends, and the server configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Feature schema
// ---------------------------------------------------------------------------

/// Number of features every prediction request must carry.
pub const FEATURE_COUNT: usize = 6;

/// Positional names of the features. Position is the wire contract.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = ["Pclass", "Sex", "Age", "SibSp", "Parch", "Fare"];

/// A validated input vector of exactly [`FEATURE_COUNT`] values.
///
/// Values are positional:
/// `[Pclass (1|2|3), Sex (0=female, 1=male), Age, SibSp, Parch, Fare]`.
/// Only the arity is checked; values are passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Build a vector directly from a fixed-size array.
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// Validate a raw sequence of numbers from the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when `raw.len() != FEATURE_COUNT`.
    pub fn validate(raw: &[f64]) -> std::result::Result<Self, ValidationError> {
        let values: [f64; FEATURE_COUNT] =
            raw.try_into().map_err(|_| ValidationError::new(raw.len()))?;
        Ok(Self(values))
    }

    /// The feature values in schema order.
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }
}

impl TryFrom<&[f32]> for FeatureVector {
    type Error = ValidationError;

    fn try_from(raw: &[f32]) -> std::result::Result<Self, Self::Error> {
        let widened: Vec<f64> = raw.iter().map(|&v| f64::from(v)).collect();
        Self::validate(&widened)
    }
}

/// Wrong feature count on an inbound request.
///
/// This is the only validation rule; it is caller-caused and never counts as
/// a server fault.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error(
    "Expected {expected} features [Pclass, Sex, Age, SibSp, Parch, Fare], got {actual}"
)]
pub struct ValidationError {
    /// Required number of features (always [`FEATURE_COUNT`]).
    pub expected: usize,
    /// Number of features actually received.
    pub actual: usize,
}

impl ValidationError {
    /// Create an error for a vector of `actual` elements.
    pub fn new(actual: usize) -> Self {
        Self {
            expected: FEATURE_COUNT,
            actual,
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction types
// ---------------------------------------------------------------------------

/// Raw output of a [`Classifier`]: the class label and per-class
/// probabilities, indexed by class label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    /// Predicted class label.
    pub label: i32,
    /// Probability of each class (`[P(0), P(1)]`).
    pub probabilities: [f64; 2],
}

impl ClassScores {
    /// The maximum class probability.
    pub fn max_probability(&self) -> f64 {
        self.probabilities[0].max(self.probabilities[1])
    }
}

/// A predictor's answer for one vector, before the version label is attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class, `0` or `1`.
    pub predicted_class: i32,
    /// Maximum class probability in `[0, 1]`. Not necessarily calibrated.
    pub confidence: f64,
}

impl Prediction {
    /// Attach the serving model version to produce the final result.
    pub fn with_version(self, model_version: impl Into<String>) -> PredictionResult {
        PredictionResult {
            predicted_class: self.predicted_class,
            confidence: self.confidence,
            model_version: model_version.into(),
        }
    }
}

/// A complete prediction as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted class, `0` or `1`.
    pub predicted_class: i32,
    /// Maximum class probability in `[0, 1]`.
    pub confidence: f64,
    /// Opaque version label supplied by configuration.
    pub model_version: String,
}

// ---------------------------------------------------------------------------
// Health types
// ---------------------------------------------------------------------------

/// Serving status reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServingStatus {
    /// A model artifact is loaded and answering predictions.
    Ok,
    /// No artifact is loaded; predictions come from the fallback.
    Degraded,
}

impl ServingStatus {
    /// Wire representation (`"ok"` or `"degraded"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
        }
    }
}

impl std::fmt::Display for ServingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health report: serving status plus the configured model version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `Ok` when a model is loaded, `Degraded` otherwise.
    pub status: ServingStatus,
    /// Opaque version label supplied by configuration.
    pub model_version: String,
}

// ---------------------------------------------------------------------------
// Classifier capability
// ---------------------------------------------------------------------------

/// A loaded binary classification model.
///
/// Implementations must be immutable after construction so a single instance
/// can be shared read-only across concurrent requests. Scoring is infallible:
/// anything that could make scoring fail has to be rejected when the model is
/// constructed.
pub trait Classifier: Send + Sync {
    /// Classify a vector, returning the label and per-class probabilities.
    fn predict(&self, features: &FeatureVector) -> ClassScores;

    /// Short human-readable model description for logs.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// Configuration for the prediction server.
///
/// # Example (YAML)
///
/// ```yaml
/// artifact_path: "models/model.json"
/// model_version: "v1.0.0"
/// port: 50051
/// shutdown:
///   timeout_seconds: 30
/// logging:
///   level: "info"
///   format: "text"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Path to the serialized model artifact.
    pub artifact_path: PathBuf,
    /// Free-form version label reported with every response.
    pub model_version: String,
    /// TCP port to bind on all interfaces.
    pub port: u16,
    /// Maximum concurrent requests per connection (`None` = unbounded).
    pub concurrency_limit_per_connection: Option<usize>,
    /// Graceful shutdown configuration.
    pub shutdown: ShutdownConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("models/model.json"),
            model_version: "v1.0.0".to_string(),
            port: 50051,
            concurrency_limit_per_connection: None,
            shutdown: ShutdownConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Maximum seconds to wait for in-flight calls to complete after a
    /// shutdown signal is received.
    #[serde(default = "default_shutdown_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_shutdown_timeout_seconds() -> u64 {
    30
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_shutdown_timeout_seconds(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: `text` (human-readable) or `json` (structured).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while loading a model artifact.
///
/// Request validation failures are reported separately as
/// [`ValidationError`], since they are caller-caused.
#[derive(thiserror::Error, Debug)]
pub enum PredServeError {
    /// The model artifact does not exist.
    #[error("Model artifact not found at {}", path.display())]
    ArtifactNotFound {
        /// The configured artifact path.
        path: PathBuf,
    },

    /// The artifact parsed but is not a usable model.
    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    /// I/O error while reading an artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization / deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for `std::result::Result<T, PredServeError>`.
pub type Result<T> = std::result::Result<T, PredServeError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

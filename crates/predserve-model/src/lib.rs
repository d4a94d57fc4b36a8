//! Model backends for predserve.
//!
//! Provides the [`LogisticPipeline`] classifier (standard scaling followed by
//! logistic regression, loaded from a JSON artifact), the
//! [`FallbackPredictor`] used when no artifact is available, and the
//! [`Predictor`] tagged union that the server selects exactly once at
//! startup.

pub mod fallback;
pub mod pipeline;
pub mod predictor;

pub use fallback::{FallbackPredictor, FALLBACK_CONFIDENCE_RANGE};
pub use pipeline::{ClassifierParams, LogisticPipeline, ModelArtifact, ScalerParams};
pub use predictor::{LoadedModel, Predictor, PredictorKind};

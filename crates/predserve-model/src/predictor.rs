//! Predictor selection.
//!
//! A [`Predictor`] is chosen exactly once, when the server starts: either the
//! artifact loads and we wrap it in a [`LoadedModel`], or loading fails and we
//! serve from the [`FallbackPredictor`]. There is no reload path; the choice
//! holds for the life of the process.

use std::path::Path;

use predserve_core::{Classifier, FeatureVector, PredServeError, Prediction, ServingStatus};

use crate::fallback::FallbackPredictor;
use crate::pipeline::LogisticPipeline;

/// Which variant a [`Predictor`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictorKind {
    /// A real model artifact is loaded.
    Model,
    /// No artifact; answers are random.
    Fallback,
}

/// A loaded, immutable classifier.
pub struct LoadedModel {
    classifier: Box<dyn Classifier>,
}

impl LoadedModel {
    /// Wrap a classifier for shared, read-only use.
    pub fn new(classifier: impl Classifier + 'static) -> Self {
        Self {
            classifier: Box::new(classifier),
        }
    }

    /// Classify a vector; confidence is the maximum class probability.
    pub fn infer(&self, features: &FeatureVector) -> Prediction {
        let scores = self.classifier.predict(features);
        Prediction {
            predicted_class: scores.label,
            confidence: scores.max_probability(),
        }
    }

    /// Description of the wrapped classifier.
    pub fn describe(&self) -> String {
        self.classifier.describe()
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("classifier", &self.classifier.describe())
            .finish()
    }
}

/// The model-invocation capability used by the prediction service.
#[derive(Debug)]
pub enum Predictor {
    /// Backed by a loaded model artifact.
    Loaded(LoadedModel),
    /// Backed by the random fallback.
    Fallback(FallbackPredictor),
}

impl Predictor {
    /// Load the artifact at `path`, falling back on any failure.
    ///
    /// Never fails: a missing artifact is logged as a warning, any other load
    /// failure as an error, and both produce [`Predictor::Fallback`].
    pub fn load_or_fallback(path: &Path) -> Self {
        match LogisticPipeline::load(path) {
            Ok(pipeline) => {
                tracing::info!(
                    path = %path.display(),
                    model = %pipeline.describe(),
                    "Model loaded successfully"
                );
                Self::Loaded(LoadedModel::new(pipeline))
            }
            Err(e @ PredServeError::ArtifactNotFound { .. }) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Model file not found, using fallback predictor (random predictions)"
                );
                Self::fallback()
            }
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load model, using fallback predictor (random predictions)"
                );
                Self::fallback()
            }
        }
    }

    /// Wrap an already-constructed classifier.
    pub fn from_classifier(classifier: impl Classifier + 'static) -> Self {
        Self::Loaded(LoadedModel::new(classifier))
    }

    /// A predictor in fallback mode.
    pub fn fallback() -> Self {
        Self::Fallback(FallbackPredictor::new())
    }

    /// Produce a prediction for a validated vector.
    pub fn infer(&self, features: &FeatureVector) -> Prediction {
        match self {
            Self::Loaded(model) => model.infer(features),
            Self::Fallback(fallback) => fallback.infer(),
        }
    }

    /// Which variant this predictor is.
    pub fn kind(&self) -> PredictorKind {
        match self {
            Self::Loaded(_) => PredictorKind::Model,
            Self::Fallback(_) => PredictorKind::Fallback,
        }
    }

    /// `true` when serving from the fallback.
    pub fn is_degraded(&self) -> bool {
        self.kind() == PredictorKind::Fallback
    }

    /// Health status implied by the variant.
    pub fn serving_status(&self) -> ServingStatus {
        match self.kind() {
            PredictorKind::Model => ServingStatus::Ok,
            PredictorKind::Fallback => ServingStatus::Degraded,
        }
    }
}

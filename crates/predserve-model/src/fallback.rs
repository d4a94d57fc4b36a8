//! Stand-in predictor used when no model artifact could be loaded.
//!
//! Answers are syntactically valid but carry no information. The service
//! keeps answering `Predict` and reports the degradation through `Health`.

use std::ops::Range;

use predserve_core::Prediction;
use rand::Rng;

/// Range the fallback confidence is drawn from.
///
/// Non-normative: the bounds carry over from the reference deployment and
/// have no statistical meaning.
pub const FALLBACK_CONFIDENCE_RANGE: Range<f64> = 0.5..0.9;

/// Stateless random predictor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPredictor;

impl FallbackPredictor {
    /// Create a fallback predictor.
    pub fn new() -> Self {
        Self
    }

    /// Draw a prediction from the thread-local RNG.
    pub fn infer(&self) -> Prediction {
        self.infer_with(&mut rand::thread_rng())
    }

    /// Draw a prediction from the supplied RNG.
    pub fn infer_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Prediction {
        Prediction {
            predicted_class: rng.gen_range(0..=1),
            confidence: rng.gen_range(FALLBACK_CONFIDENCE_RANGE),
        }
    }
}

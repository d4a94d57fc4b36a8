//! gRPC prediction service.
//!
//! Implements the `PredictionService` defined in `proto/prediction.proto`
//! using `tonic`.
//!
//! ## Request pipeline
//!
//! `PredictRequest.features` → [`FeatureVector::try_from`] (arity check) →
//! [`Predictor::infer`] → [`PredictionResult`] with the configured model
//! version → `PredictResponse`.
//!
//! Only the arity check can fail a call; it maps to `INVALID_ARGUMENT` and
//! the predictor is not touched.

use std::sync::Arc;

use predserve_core::{FeatureVector, HealthStatus, PredictionResult, ValidationError};
use predserve_model::Predictor;
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::shutdown::ShutdownCoordinator;

// ---------------------------------------------------------------------------
// Generated protobuf types
// ---------------------------------------------------------------------------

/// Generated protobuf module from `proto/prediction.proto`.
pub mod pb {
    tonic::include_proto!("prediction.v1");

    /// Encoded descriptor set advertised through server reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("prediction_descriptor");
}

use pb::prediction_service_server::{PredictionService, PredictionServiceServer};
use pb::{HealthRequest, HealthResponse, PredictRequest, PredictResponse};

/// Fully-qualified protobuf name of the prediction service.
pub const SERVICE_NAME: &str = "prediction.v1.PredictionService";

// ---------------------------------------------------------------------------
// Core → proto conversion
// ---------------------------------------------------------------------------

impl From<PredictionResult> for PredictResponse {
    fn from(result: PredictionResult) -> Self {
        Self {
            prediction: result.predicted_class,
            confidence: result.confidence as f32,
            model_version: result.model_version,
        }
    }
}

impl From<HealthStatus> for HealthResponse {
    fn from(health: HealthStatus) -> Self {
        Self {
            status: health.status.as_str().to_string(),
            model_version: health.model_version,
        }
    }
}

/// Map a validation failure onto the wire error.
fn invalid_argument(err: &ValidationError) -> Status {
    Status::invalid_argument(err.to_string())
}

// ---------------------------------------------------------------------------
// gRPC service implementation
// ---------------------------------------------------------------------------

/// The prediction service, backed by a single shared [`Predictor`].
#[derive(Clone)]
pub struct GrpcPredictionService {
    predictor: Arc<Predictor>,
    model_version: Arc<str>,
    shutdown: ShutdownCoordinator,
}

impl GrpcPredictionService {
    /// Create a service around an already-selected predictor.
    pub fn new(
        predictor: Arc<Predictor>,
        model_version: impl Into<Arc<str>>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        Self {
            predictor,
            model_version: model_version.into(),
            shutdown,
        }
    }

    /// Current health. Never fails.
    pub fn health_status(&self) -> HealthStatus {
        HealthStatus {
            status: self.predictor.serving_status(),
            model_version: self.model_version.to_string(),
        }
    }

    /// Validate `features` and run the predictor.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the feature count is wrong.
    pub fn predict_features(&self, features: &[f32]) -> Result<PredictionResult, ValidationError> {
        let vector = FeatureVector::try_from(features)?;
        let prediction = self.predictor.infer(&vector);
        Ok(prediction.with_version(self.model_version.as_ref()))
    }
}

#[tonic::async_trait]
impl PredictionService for GrpcPredictionService {
    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        let _guard = self.shutdown.track_call();
        Ok(Response::new(self.health_status().into()))
    }

    async fn predict(
        &self,
        request: Request<PredictRequest>,
    ) -> Result<Response<PredictResponse>, Status> {
        let _guard = self.shutdown.track_call();
        let req = request.into_inner();

        match self.predict_features(&req.features) {
            Ok(result) => {
                debug!(
                    prediction = result.predicted_class,
                    confidence = result.confidence,
                    degraded = self.predictor.is_degraded(),
                    "Prediction served"
                );
                Ok(Response::new(result.into()))
            }
            Err(e) => {
                debug!(actual = e.actual, "Rejected prediction request with wrong feature count");
                Err(invalid_argument(&e))
            }
        }
    }
}

/// Wrap the service in its generated `tonic` server.
pub fn build_grpc_server(
    service: GrpcPredictionService,
) -> PredictionServiceServer<GrpcPredictionService> {
    PredictionServiceServer::new(service)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

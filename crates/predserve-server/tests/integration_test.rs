//! End-to-end tests for the predserve gRPC server.
//!
//! Each test starts a [`ServiceHost`] on an ephemeral port, talks to it over
//! a real tonic channel, and shuts it down through the coordinator token.

use std::path::PathBuf;
use std::time::Duration;

use predserve_core::{ClassScores, Classifier, FeatureVector, ServerConfig};
use predserve_model::{LogisticPipeline, Predictor, PredictorKind, FALLBACK_CONFIDENCE_RANGE};
use predserve_server::pb::prediction_service_client::PredictionServiceClient;
use predserve_server::pb::{HealthRequest, PredictRequest};
use predserve_server::{HostState, ServiceHost, ShutdownCoordinator, SERVICE_NAME};
use tokio::task::JoinHandle;
use tonic::transport::Channel;
use tonic::Code;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn shipped_artifact() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models/model.json")
}

fn config_with_artifact(path: PathBuf) -> ServerConfig {
    ServerConfig {
        artifact_path: path,
        model_version: "v1.0.0-test".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

struct RunningServer {
    url: String,
    shutdown: ShutdownCoordinator,
    states: tokio::sync::watch::Receiver<HostState>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl RunningServer {
    async fn client(&self) -> PredictionServiceClient<Channel> {
        PredictionServiceClient::connect(self.url.clone())
            .await
            .unwrap()
    }

    async fn stop(self) -> HostState {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
        let state = *self.states.borrow();
        state
    }
}

async fn start(host: ServiceHost, shutdown: ShutdownCoordinator) -> RunningServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut states = host.subscribe();
    let handle = tokio::spawn(host.serve_with_listener(listener));

    states
        .wait_for(|s| *s == HostState::Serving)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    RunningServer {
        url: format!("http://{addr}"),
        shutdown,
        states,
        handle,
    }
}

async fn start_with_artifact(path: PathBuf) -> RunningServer {
    let shutdown = ShutdownCoordinator::new(5);
    let host = ServiceHost::new(config_with_artifact(path), shutdown.clone());
    start(host, shutdown).await
}

async fn predict(
    client: &mut PredictionServiceClient<Channel>,
    features: Vec<f32>,
) -> Result<predserve_server::pb::PredictResponse, tonic::Status> {
    client
        .predict(PredictRequest { features })
        .await
        .map(|r| r.into_inner())
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_first_class_woman_predicted_to_survive() {
    let server = start_with_artifact(shipped_artifact()).await;
    let mut client = server.client().await;

    let resp = predict(&mut client, vec![1.0, 0.0, 29.0, 0.0, 0.0, 211.34])
        .await
        .unwrap();
    assert_eq!(resp.prediction, 1);
    assert!(resp.confidence > 0.5);
    assert_eq!(resp.model_version, "v1.0.0-test");

    assert_eq!(server.stop().await, HostState::Stopped);
}

#[tokio::test]
async fn test_third_class_man_predicted_to_die() {
    let server = start_with_artifact(shipped_artifact()).await;
    let mut client = server.client().await;

    let resp = predict(&mut client, vec![3.0, 1.0, 25.0, 0.0, 0.0, 7.25])
        .await
        .unwrap();
    assert_eq!(resp.prediction, 0);
    assert!(resp.confidence > 0.5 && resp.confidence <= 1.0);

    server.stop().await;
}

#[tokio::test]
async fn test_short_vector_is_invalid_argument() {
    let server = start_with_artifact(shipped_artifact()).await;
    let mut client = server.client().await;

    let status = predict(&mut client, vec![1.0, 2.0, 3.0]).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(
        status.message(),
        "Expected 6 features [Pclass, Sex, Age, SibSp, Parch, Fare], got 3"
    );

    let status = predict(&mut client, vec![0.0; 7]).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("got 7"));

    let status = predict(&mut client, vec![]).await.unwrap_err();
    assert!(status.message().contains("got 0"));

    server.stop().await;
}

#[tokio::test]
async fn test_missing_artifact_degrades_but_serves() {
    let server = start_with_artifact(PathBuf::from("/nonexistent/model.json")).await;
    let mut client = server.client().await;

    let health = client.health(HealthRequest {}).await.unwrap().into_inner();
    assert_eq!(health.status, "degraded");
    assert_eq!(health.model_version, "v1.0.0-test");

    for _ in 0..20 {
        let resp = predict(&mut client, vec![2.0, 1.0, 35.0, 1.0, 0.0, 26.0])
            .await
            .unwrap();
        assert!(resp.prediction == 0 || resp.prediction == 1);
        assert!(FALLBACK_CONFIDENCE_RANGE.contains(&f64::from(resp.confidence)));
    }

    let health_after = client.health(HealthRequest {}).await.unwrap().into_inner();
    assert_eq!(health_after, health);

    server.stop().await;
}

#[tokio::test]
async fn test_corrupt_artifact_degrades() {
    let f = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(f.path(), b"not a model").unwrap();

    let server = start_with_artifact(f.path().to_path_buf()).await;
    let mut client = server.client().await;

    let health = client.health(HealthRequest {}).await.unwrap().into_inner();
    assert_eq!(health.status, "degraded");

    server.stop().await;
}

#[tokio::test]
async fn test_health_unchanged_by_predict() {
    let server = start_with_artifact(shipped_artifact()).await;
    let mut client = server.client().await;

    let before = client.health(HealthRequest {}).await.unwrap().into_inner();
    assert_eq!(before.status, "ok");

    predict(&mut client, vec![1.0, 1.0, 4.0, 1.0, 2.0, 120.0])
        .await
        .unwrap();

    let after = client.health(HealthRequest {}).await.unwrap().into_inner();
    assert_eq!(before, after);

    server.stop().await;
}

#[tokio::test]
async fn test_loaded_model_is_deterministic() {
    let server = start_with_artifact(shipped_artifact()).await;
    let mut client = server.client().await;

    let features = vec![3.0, 0.0, 55.0, 0.0, 0.0, 7.79];
    let first = predict(&mut client, features.clone()).await.unwrap();
    for _ in 0..10 {
        assert_eq!(predict(&mut client, features.clone()).await.unwrap(), first);
    }

    server.stop().await;
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_predictions_match_sequential() {
    let server = start_with_artifact(shipped_artifact()).await;
    let client = server.client().await;
    let pipeline = LogisticPipeline::load(&shipped_artifact()).unwrap();

    let vectors: Vec<Vec<f32>> = (0..64)
        .map(|i| {
            let i = i as f32;
            vec![
                1.0 + (i % 3.0),
                i % 2.0,
                5.0 + i,
                i % 4.0,
                i % 3.0,
                7.0 + i * 3.5,
            ]
        })
        .collect();

    let handles: Vec<_> = vectors
        .iter()
        .cloned()
        .map(|features| {
            let mut client = client.clone();
            tokio::spawn(async move { predict(&mut client, features).await.unwrap() })
        })
        .collect();

    for (features, handle) in vectors.iter().zip(handles) {
        let resp = handle.await.unwrap();
        let expected = pipeline.predict(&FeatureVector::try_from(&features[..]).unwrap());
        assert_eq!(resp.prediction, expected.label);
        assert_eq!(resp.confidence, expected.max_probability() as f32);
    }

    server.stop().await;
}

// ---------------------------------------------------------------------------
// Reflection
// ---------------------------------------------------------------------------

async fn channel(url: &str) -> Channel {
    Channel::from_shared(url.to_string())
        .unwrap()
        .connect()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_reflection_lists_prediction_service() {
    use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
    use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
    use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
    use tonic_reflection::pb::v1::ServerReflectionRequest;

    let server = start_with_artifact(shipped_artifact()).await;
    let mut client = ServerReflectionClient::new(channel(&server.url).await);

    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(MessageRequest::ListServices(String::new())),
    };
    let mut responses = client
        .server_reflection_info(tokio_stream::iter(vec![request]))
        .await
        .unwrap()
        .into_inner();

    let response = responses.message().await.unwrap().expect("one response");
    let names: Vec<String> = match response.message_response {
        Some(MessageResponse::ListServicesResponse(list)) => {
            list.service.into_iter().map(|s| s.name).collect()
        }
        other => panic!("unexpected reflection response: {other:?}"),
    };
    assert!(names.iter().any(|n| n == SERVICE_NAME), "got {names:?}");

    drop(responses);
    server.stop().await;
}

#[tokio::test]
async fn test_v1alpha_reflection_lists_prediction_service() {
    use tonic_reflection::pb::v1alpha::server_reflection_client::ServerReflectionClient;
    use tonic_reflection::pb::v1alpha::server_reflection_request::MessageRequest;
    use tonic_reflection::pb::v1alpha::server_reflection_response::MessageResponse;
    use tonic_reflection::pb::v1alpha::ServerReflectionRequest;

    let server = start_with_artifact(shipped_artifact()).await;
    let mut client = ServerReflectionClient::new(channel(&server.url).await);

    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(MessageRequest::ListServices(String::new())),
    };
    let mut responses = client
        .server_reflection_info(tokio_stream::iter(vec![request]))
        .await
        .unwrap()
        .into_inner();

    let response = responses.message().await.unwrap().expect("one response");
    let names: Vec<String> = match response.message_response {
        Some(MessageResponse::ListServicesResponse(list)) => {
            list.service.into_iter().map(|s| s.name).collect()
        }
        other => panic!("unexpected reflection response: {other:?}"),
    };
    assert!(names.iter().any(|n| n == SERVICE_NAME), "got {names:?}");

    drop(responses);
    server.stop().await;
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Classifier that blocks long enough for a shutdown to land mid-call.
struct SlowClassifier;

impl Classifier for SlowClassifier {
    fn predict(&self, _features: &FeatureVector) -> ClassScores {
        std::thread::sleep(Duration::from_millis(300));
        ClassScores {
            label: 1,
            probabilities: [0.25, 0.75],
        }
    }

    fn describe(&self) -> String {
        "slow".to_string()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_drains_in_flight_call() {
    let shutdown = ShutdownCoordinator::new(5);
    let host = ServiceHost::with_predictor(
        config_with_artifact(shipped_artifact()),
        Predictor::from_classifier(SlowClassifier),
        shutdown.clone(),
    );
    assert_eq!(host.predictor_kind(), PredictorKind::Model);

    let server = start(host, shutdown.clone()).await;
    let mut client = server.client().await;

    let call = tokio::spawn(async move {
        predict(&mut client, vec![1.0, 0.0, 29.0, 0.0, 0.0, 211.34]).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(shutdown.in_flight_count(), 1);

    let final_state = server.stop().await;
    let resp = call.await.unwrap().expect("in-flight call completes");
    assert_eq!(resp.prediction, 1);
    assert_eq!(resp.confidence, 0.75);
    assert_eq!(final_state, HostState::Stopped);
    assert_eq!(shutdown.in_flight_count(), 0);
}

#[tokio::test]
async fn test_listener_released_after_stop() {
    let server = start_with_artifact(shipped_artifact()).await;
    let url = server.url.clone();
    server.stop().await;

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        PredictionServiceClient::connect(url),
    )
    .await;
    assert!(!matches!(result, Ok(Ok(_))), "server should no longer accept");
}

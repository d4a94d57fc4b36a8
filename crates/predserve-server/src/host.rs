//! Service host: binds the listener, registers the prediction and reflection
//! services, and owns the server lifecycle.
//!
//! ```text
//! Uninitialized → Loading → Ready(Model | Fallback) → Serving → ShuttingDown → Stopped
//! ```
//!
//! `Loading → Ready` never fails: a bad artifact selects the fallback
//! predictor. `Serving → ShuttingDown` happens only when the
//! [`ShutdownCoordinator`] token is cancelled.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use predserve_core::{HealthStatus, ServerConfig};
use predserve_model::{Predictor, PredictorKind};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{debug, info};

use crate::grpc::{build_grpc_server, pb, GrpcPredictionService, SERVICE_NAME};
use crate::shutdown::ShutdownCoordinator;

/// Lifecycle state of a [`ServiceHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Host constructed, artifact not yet read.
    Uninitialized,
    /// Reading the model artifact.
    Loading,
    /// Predictor selected; not yet accepting calls.
    Ready(PredictorKind),
    /// Listener bound and accepting calls.
    Serving,
    /// Listener closed, draining in-flight calls.
    ShuttingDown,
    /// Drain finished; no further calls are accepted.
    Stopped,
}

/// Owns the prediction service and its network lifecycle.
pub struct ServiceHost {
    config: ServerConfig,
    service: GrpcPredictionService,
    predictor_kind: PredictorKind,
    shutdown: ShutdownCoordinator,
    state: Arc<watch::Sender<HostState>>,
}

impl ServiceHost {
    /// Load the configured artifact (or fall back) and build the service.
    ///
    /// The load is synchronous and completes before this returns.
    pub fn new(config: ServerConfig, shutdown: ShutdownCoordinator) -> Self {
        let (state, _) = watch::channel(HostState::Uninitialized);
        state.send_replace(HostState::Loading);
        debug!(path = %config.artifact_path.display(), "Loading model artifact");

        let predictor = Predictor::load_or_fallback(&config.artifact_path);
        Self::assemble(config, predictor, shutdown, state)
    }

    /// Build a host around an already-selected predictor.
    pub fn with_predictor(
        config: ServerConfig,
        predictor: Predictor,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        let (state, _) = watch::channel(HostState::Loading);
        Self::assemble(config, predictor, shutdown, state)
    }

    fn assemble(
        config: ServerConfig,
        predictor: Predictor,
        shutdown: ShutdownCoordinator,
        state: watch::Sender<HostState>,
    ) -> Self {
        let predictor_kind = predictor.kind();
        let service = GrpcPredictionService::new(
            Arc::new(predictor),
            config.model_version.as_str(),
            shutdown.clone(),
        );
        state.send_replace(HostState::Ready(predictor_kind));

        info!(
            model_version = %config.model_version,
            model_path = %config.artifact_path.display(),
            features = ?predserve_core::FEATURE_NAMES,
            status = %service.health_status().status,
            "Model service initialized"
        );

        Self {
            config,
            service,
            predictor_kind,
            shutdown,
            state: Arc::new(state),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HostState {
        *self.state.borrow()
    }

    /// Subscribe to lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<HostState> {
        self.state.subscribe()
    }

    /// Which predictor variant was selected at startup.
    pub fn predictor_kind(&self) -> PredictorKind {
        self.predictor_kind
    }

    /// Current health, as the `Health` RPC would report it.
    pub fn health(&self) -> HealthStatus {
        self.service.health_status()
    }

    /// Bind `0.0.0.0:<port>` and serve until shutdown.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind gRPC listener on {addr}: {e}"))?;
        self.serve_with_listener(listener).await
    }

    /// Serve on an already-bound listener until the shutdown token is
    /// cancelled, then drain in-flight calls.
    pub async fn serve_with_listener(self, listener: TcpListener) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;

        let reflection_v1 = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(pb::FILE_DESCRIPTOR_SET)
            .build_v1()?;
        let reflection_v1alpha = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(pb::FILE_DESCRIPTOR_SET)
            .build_v1alpha()?;

        let mut builder = tonic::transport::Server::builder();
        if let Some(limit) = self.config.concurrency_limit_per_connection {
            builder = builder.concurrency_limit_per_connection(limit);
        }

        let token = self.shutdown.token();
        let state = Arc::clone(&self.state);

        self.state.send_replace(HostState::Serving);
        info!(%addr, service = SERVICE_NAME, "gRPC server started");
        info!("Reflection enabled for grpcurl");

        let result = builder
            .add_service(reflection_v1)
            .add_service(reflection_v1alpha)
            .add_service(build_grpc_server(self.service.clone()))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                token.cancelled().await;
                state.send_replace(HostState::ShuttingDown);
                info!("gRPC server shutting down gracefully");
            })
            .await;

        // A transport error ends serving without a signal; still drain.
        self.state.send_replace(HostState::ShuttingDown);
        self.shutdown.wait_for_calls().await;
        self.state.send_replace(HostState::Stopped);
        info!("gRPC server stopped");

        result.map_err(Into::into)
    }
}

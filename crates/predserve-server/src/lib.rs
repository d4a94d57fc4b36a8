//! Library interface of the predserve gRPC server.
//!
//! Re-exports the service, host, and shutdown types so that the binaries and
//! integration tests can construct a server programmatically.

pub mod config;
pub mod grpc;
pub mod host;
pub mod shutdown;

pub use grpc::{build_grpc_server, pb, GrpcPredictionService, SERVICE_NAME};
pub use host::{HostState, ServiceHost};
pub use shutdown::{shutdown_signal, ShutdownCoordinator};

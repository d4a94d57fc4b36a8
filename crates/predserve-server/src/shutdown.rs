//! Graceful shutdown coordination.
//!
//! Provides a [`ShutdownCoordinator`] that listens for OS signals (SIGTERM,
//! SIGINT) and propagates a cancellation to the gRPC server, plus an
//! in-flight call counter the host drains before reporting `Stopped`.
//!
//! ## Design
//!
//! * A single [`tokio_util::sync::CancellationToken`] acts as the shutdown
//!   broadcast channel.
//! * Each RPC holds a [`CallGuard`] for its duration. When the last guard
//!   drops, waiters in [`ShutdownCoordinator::wait_for_calls`] are woken.
//! * After the listener stops we wait up to `shutdown.timeout_seconds`
//!   (default 30 s) for calls still running.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// Shutdown coordinator
// ---------------------------------------------------------------------------

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    drained: Notify,
}

/// Coordinates graceful shutdown between the signal handler, the gRPC
/// server, and running calls.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    in_flight: Arc<InFlight>,
    /// Maximum time to wait for in-flight calls after the signal.
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a new coordinator with the given drain timeout.
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            token: CancellationToken::new(),
            in_flight: Arc::new(InFlight::default()),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Returns `true` if a shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Register a call as in flight until the returned guard drops.
    pub fn track_call(&self) -> CallGuard {
        self.in_flight.count.fetch_add(1, Ordering::SeqCst);
        CallGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Current number of in-flight calls.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Wait for in-flight calls to complete, up to the configured timeout.
    ///
    /// Returns `true` if every call finished within the timeout.
    pub async fn wait_for_calls(&self) -> bool {
        let drained = async {
            loop {
                // Registered before the count check so a guard dropping in
                // between still wakes us.
                let notified = self.in_flight.drained.notified();
                if self.in_flight_count() == 0 {
                    return;
                }
                info!(
                    remaining_calls = self.in_flight_count(),
                    "Waiting for in-flight calls to complete"
                );
                notified.await;
            }
        };

        match tokio::time::timeout(self.timeout, drained).await {
            Ok(()) => {
                info!("All in-flight calls completed");
                true
            }
            Err(_) => {
                warn!(
                    remaining_calls = self.in_flight_count(),
                    timeout_seconds = self.timeout.as_secs(),
                    "Shutdown timeout expired with in-flight calls still pending"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Call guard (RAII counter)
// ---------------------------------------------------------------------------

/// RAII guard that decrements the in-flight call counter on drop.
pub struct CallGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.in_flight.drained.notify_waiters();
        }
    }
}

// ---------------------------------------------------------------------------
// Signal handling
// ---------------------------------------------------------------------------

/// Resolves when a shutdown signal is received, then cancels the
/// coordinator's token.
///
/// On Unix this listens for both SIGTERM and SIGINT; elsewhere for Ctrl-C.
/// Programmatic cancellation of the token also ends the wait.
pub async fn shutdown_signal(coordinator: ShutdownCoordinator) {
    let token = coordinator.token();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Shutdown signal received (SIGTERM)"),
                    _ = sigint.recv() => info!("Shutdown signal received (SIGINT)"),
                    _ = token.cancelled() => info!("Shutdown signal received (token cancelled)"),
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "Failed to install signal handlers; waiting for programmatic shutdown only");
                token.cancelled().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Shutdown signal received (Ctrl-C)"),
                Err(e) => {
                    error!(error = %e, "Failed to listen for Ctrl-C; waiting for programmatic shutdown only");
                    token.cancelled().await;
                }
            },
            _ = token.cancelled() => info!("Shutdown signal received (token cancelled)"),
        }
    }

    coordinator.trigger();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

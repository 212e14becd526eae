//! Active backend connection monitoring.
//!
//! # Responsibilities
//! - Periodically probe the backend over the live channel
//! - Rebuild the channel and swap the shared client when a probe fails
//!
//! # Design Decisions
//! - The probe is a real RPC (`CheckHealth`), not a TCP dial, so it proves
//!   the whole path: connection, TLS handshake, and service dispatch.
//! - Probes run on a fixed interval with a hard timeout. A hung probe must
//!   never stall the loop past one tick.
//! - The monitor is the only writer of the client slot. Handlers only read,
//!   so the swap needs no coordination beyond the atomic pointer.
//! - Probe failures bypass the circuit breaker: the monitor is diagnostic,
//!   and its traffic must not open the breaker or consume retry budget.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;
use tonic::Status;

use crate::config::MonitorConfig;
use crate::net::{ChannelFactory, ClientSlot};
use crate::observability::metrics;
use crate::pb;

/// Why a probe was counted as failed.
#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("probe timed out")]
    TimedOut,
    #[error("transport error: {}", .0.code())]
    Transport(Status),
    #[error("backend reports not serving")]
    NotServing,
}

/// Periodically probes the backend and refreshes the shared client on failure.
pub struct ConnectionMonitor {
    clients: Arc<ClientSlot>,
    factory: Arc<ChannelFactory>,
    interval: Duration,
    probe_timeout: Duration,
}

impl ConnectionMonitor {
    pub fn new(clients: Arc<ClientSlot>, factory: Arc<ChannelFactory>, config: &MonitorConfig) -> Self {
        Self {
            clients,
            factory,
            interval: Duration::from_secs(config.interval_secs),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        }
    }

    /// Probe on a fixed cadence until shutdown. The first tick fires
    /// immediately, so a dead backend is noticed at startup rather than one
    /// interval later.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            probe_timeout_secs = self.probe_timeout.as_secs(),
            "connection monitor starting"
        );

        let mut ticker = time::interval(self.interval);
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.probe().await {
                        Ok(()) => {
                            if consecutive_failures > 0 {
                                tracing::info!(
                                    generation = self.clients.generation(),
                                    "backend probe recovered"
                                );
                            }
                            consecutive_failures = 0;
                        }
                        Err(reason) => {
                            consecutive_failures += 1;
                            metrics::record_probe_failure();
                            tracing::warn!(
                                %reason,
                                consecutive_failures,
                                "backend probe failed, rebuilding channel"
                            );
                            self.rebuild();
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("connection monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One bounded probe against whatever client is currently live.
    async fn probe(&self) -> Result<(), ProbeError> {
        let mut client = self.clients.current().items.clone();
        let response = time::timeout(self.probe_timeout, client.check_health(pb::HealthCheckRequest {}))
            .await
            .map_err(|_| ProbeError::TimedOut)?
            .map_err(ProbeError::Transport)?;

        if response.into_inner().status == pb::ServingStatus::Serving as i32 {
            Ok(())
        } else {
            Err(ProbeError::NotServing)
        }
    }

    /// Build a replacement channel and publish it. Readers holding the old
    /// client finish their in-flight calls on it undisturbed.
    fn rebuild(&self) {
        let replacement = self.factory.build();
        let generation = replacement.generation;
        let mode = replacement.mode;
        self.clients.replace(replacement);
        metrics::record_channel_rebuild();
        tracing::info!(generation, %mode, "backend client replaced");
    }
}

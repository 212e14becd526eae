//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Read call (GET /items, GET /items/{id}):
//!     retries.rs (attempt budget, backoff.rs delays)
//!         → circuit_breaker.rs (admission, failure accounting)
//!             → backend RPC with endpoint-level deadline
//!
//! Write call (POST /items):
//!     circuit_breaker.rs only (creates are not idempotent)
//! ```
//!
//! # Design Decisions
//! - Retry wraps the breaker so every attempt is admission-checked
//! - Deadlines are non-negotiable; every backend call carries one
//! - Application statuses are never retried and never count as failures

use tonic::Status;

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;

pub use circuit_breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use retries::RetryPolicy;

/// Error from a guarded backend call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Rejected locally; the backend was never contacted.
    #[error("circuit breaker is open")]
    BreakerOpen,

    /// The backend (or the transport to it) answered with a status.
    #[error("backend call failed: {0}")]
    Rpc(#[from] Status),
}

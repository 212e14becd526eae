//! Structured logging.
//!
//! # Design Decisions
//! - tracing everywhere; fields over format strings
//! - RUST_LOG wins, each binary supplies its own fallback directive
//! - Plain fmt output; aggregation happens outside the process

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber. Call once per process.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (log aggregation)
//!     → Prometheus scrape of the exporter address
//! ```
//!
//! # Design Decisions
//! - Request IDs flow through tower-http layers, no custom span plumbing
//! - Metric updates are cheap and safe to call from hot paths

pub mod logging;
pub mod metrics;

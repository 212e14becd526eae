//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, defaults when absent)
//!     → environment overrides (deployment surface)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig / BackendConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow running with no config file
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::AuthConfig;
pub use schema::BackendConfig;
pub use schema::BackendTargetConfig;
pub use schema::BreakerConfig;
pub use schema::ChannelTlsConfig;
pub use schema::GatewayConfig;
pub use schema::ListenerConfig;
pub use schema::ListenerTlsConfig;
pub use schema::MonitorConfig;
pub use schema::ObservabilityConfig;
pub use schema::RetryConfig;

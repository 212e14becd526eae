//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway
//! and the backend server. All types derive Serde traits for deserialization
//! from config files, and every knob has a working default so both binaries
//! start with no config file at all.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Backend gRPC target and channel credentials.
    pub backend: BackendTargetConfig,

    /// Token issuing and validation settings.
    pub auth: AuthConfig,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Retry settings for read-style backend calls.
    pub retries: RetryConfig,

    /// Connection monitor settings.
    pub monitor: MonitorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Total request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Backend gRPC target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendTargetConfig {
    /// Backend host name or address.
    pub host: String,

    /// Backend port.
    pub port: u16,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Per-call deadline in seconds, applied to every data RPC.
    pub rpc_timeout_secs: u64,

    /// Channel credentials; missing files downgrade to plaintext.
    pub tls: ChannelTlsConfig,
}

impl Default for BackendTargetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50051,
            connect_timeout_secs: 3,
            rpc_timeout_secs: 3,
            tls: ChannelTlsConfig::default(),
        }
    }
}

/// Client-side channel credentials.
///
/// All three files must exist and parse for the channel to use mutual TLS;
/// otherwise the factory falls back to plaintext and logs the reason.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelTlsConfig {
    /// Path to the CA bundle (PEM).
    pub ca_path: String,

    /// Path to the gateway's client certificate (PEM).
    pub cert_path: String,

    /// Path to the gateway's client private key (PEM).
    pub key_path: String,

    /// Expected server name, overriding the dialed host for certificate
    /// verification.
    pub server_name: String,
}

impl Default for ChannelTlsConfig {
    fn default() -> Self {
        Self {
            ca_path: "ca.crt".to_string(),
            cert_path: "gateway.crt".to_string(),
            key_path: "gateway.key".to_string(),
            server_name: "item-backend".to_string(),
        }
    }
}

/// Token issuing and validation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity provider JWKS document URL, fetched once at startup.
    pub jwks_url: String,

    /// Expected token issuer.
    pub issuer: String,

    /// Expected token audience.
    pub audience: String,

    /// Secret for self-issued HS256 tokens.
    pub token_secret: String,

    /// Key id the gateway signs with; registered in the key set so
    /// self-issued tokens resolve like provider-issued ones.
    pub signing_kid: String,

    /// Lifetime of self-issued tokens in seconds.
    pub token_ttl_secs: u64,

    /// Credential pair accepted by the login endpoint.
    pub login_username: String,

    /// WARNING: demo default, override in any real deployment.
    pub login_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwks_url: "http://127.0.0.1:8080/realms/items/protocol/openid-connect/certs"
                .to_string(),
            issuer: "http://127.0.0.1:8080/realms/items".to_string(),
            audience: "item-gateway".to_string(),
            token_secret: "dev-signing-secret".to_string(),
            signing_kid: "gateway-local".to_string(),
            token_ttl_secs: 3600,
            login_username: "admin".to_string(),
            login_password: "secret".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive counted failures that open the breaker.
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before admitting a half-open trial.
    pub reset_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_secs: 30,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first call included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Connection monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Probe interval in seconds. Fixed cadence, no backoff.
    pub interval_secs: u64,

    /// Probe timeout in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            probe_timeout_secs: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Root configuration for the backend server process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BackendConfig {
    /// gRPC listener configuration.
    pub listener: BackendListenerConfig,
}

/// Backend gRPC listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendListenerConfig {
    /// Bind address (e.g., "0.0.0.0:50051").
    pub bind_address: String,

    /// Listener credentials; missing files downgrade to plaintext.
    pub tls: ListenerTlsConfig,
}

impl Default for BackendListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:50051".to_string(),
            tls: ListenerTlsConfig::default(),
        }
    }
}

/// Server-side listener credentials.
///
/// With all three files present and parseable the listener serves mutual TLS
/// and requires client certificates; otherwise it serves plaintext.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerTlsConfig {
    /// Path to the CA bundle used to verify client certificates (PEM).
    pub ca_path: String,

    /// Path to the server certificate (PEM).
    pub cert_path: String,

    /// Path to the server private key (PEM).
    pub key_path: String,
}

impl Default for ListenerTlsConfig {
    fn default() -> Self {
        Self {
            ca_path: "ca.crt".to_string(),
            cert_path: "backend.crt".to_string(),
            key_path: "backend.key".to_string(),
        }
    }
}

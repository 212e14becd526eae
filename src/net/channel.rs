//! Channel factory for the gateway→backend gRPC leg.
//!
//! # Responsibilities
//! - Build the backend channel, mutual-TLS when the credential trio loads,
//!   plaintext otherwise
//! - Apply connect and per-call deadlines at the endpoint level
//! - Stamp every build with a monotonically increasing generation
//!
//! # Design Decisions
//! - Channels are built lazily: construction always succeeds and transport
//!   errors surface per call, so a down backend never blocks startup
//! - Credential problems downgrade to plaintext with a logged reason rather
//!   than failing the build
//! - The server name override pins certificate verification to the backend's
//!   certified identity regardless of the dialed address

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tonic::transport::{Certificate, ClientTlsConfig, Endpoint, Identity, Uri};

use crate::config::schema::BackendTargetConfig;
use crate::net::client::{BackendHandle, ChannelMode};
use crate::net::credentials::{load_credentials, CredentialError};
use crate::pb::item_service_client::ItemServiceClient;

/// Error raised while assembling the secure endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("invalid backend target {target}: {message}")]
    InvalidTarget { target: String, message: String },

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] tonic::transport::Error),
}

/// Builds backend channels on demand.
///
/// Used once at startup and again by the connection monitor every time a
/// probe fails.
#[derive(Debug)]
pub struct ChannelFactory {
    config: BackendTargetConfig,
    plain_uri: Uri,
    secure_uri: Uri,
    builds: AtomicU64,
}

impl ChannelFactory {
    pub fn new(config: BackendTargetConfig) -> Result<Self, ChannelError> {
        let plain_uri = parse_target("http", &config.host, config.port)?;
        let secure_uri = parse_target("https", &config.host, config.port)?;
        Ok(Self {
            config,
            plain_uri,
            secure_uri,
            builds: AtomicU64::new(0),
        })
    }

    /// Build a fresh backend handle.
    ///
    /// Never fails: when the secure path is unavailable the factory
    /// downgrades to plaintext and logs why.
    pub fn build(&self) -> BackendHandle {
        let generation = self.builds.fetch_add(1, Ordering::Relaxed) + 1;
        let (channel, mode) = match self.secure_endpoint() {
            Ok(endpoint) => (endpoint.connect_lazy(), ChannelMode::MutualTls),
            Err(reason) => {
                tracing::warn!(%reason, "mutual TLS unavailable, falling back to plaintext");
                (self.plain_endpoint().connect_lazy(), ChannelMode::Plaintext)
            }
        };
        tracing::info!(
            target_host = %self.config.host,
            target_port = self.config.port,
            mode = mode.as_str(),
            generation,
            "backend channel built"
        );
        BackendHandle {
            items: ItemServiceClient::new(channel),
            mode,
            generation,
        }
    }

    fn plain_endpoint(&self) -> Endpoint {
        self.apply_deadlines(Endpoint::from(self.plain_uri.clone()))
    }

    fn secure_endpoint(&self) -> Result<Endpoint, ChannelError> {
        let tls = &self.config.tls;
        let creds = load_credentials(
            Path::new(&tls.ca_path),
            Path::new(&tls.cert_path),
            Path::new(&tls.key_path),
        )?;
        let tls_config = ClientTlsConfig::new()
            .domain_name(tls.server_name.clone())
            .ca_certificate(Certificate::from_pem(creds.ca_pem))
            .identity(Identity::from_pem(creds.cert_pem, creds.key_pem));
        let endpoint = self
            .apply_deadlines(Endpoint::from(self.secure_uri.clone()))
            .tls_config(tls_config)?;
        Ok(endpoint)
    }

    fn apply_deadlines(&self, endpoint: Endpoint) -> Endpoint {
        endpoint
            .connect_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .timeout(Duration::from_secs(self.config.rpc_timeout_secs))
    }
}

fn parse_target(scheme: &str, host: &str, port: u16) -> Result<Uri, ChannelError> {
    let target = format!("{scheme}://{host}:{port}");
    target.parse().map_err(|e| ChannelError::InvalidTarget {
        target,
        message: format!("{e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendTargetConfig;

    fn target_config(dir: &tempfile::TempDir) -> BackendTargetConfig {
        let mut config = BackendTargetConfig::default();
        config.tls.ca_path = dir.path().join("ca.crt").to_string_lossy().into_owned();
        config.tls.cert_path = dir.path().join("gw.crt").to_string_lossy().into_owned();
        config.tls.key_path = dir.path().join("gw.key").to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn missing_credentials_fall_back_to_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ChannelFactory::new(target_config(&dir)).unwrap();

        let handle = factory.build();
        assert_eq!(handle.mode, ChannelMode::Plaintext);
        assert_eq!(handle.generation, 1);
    }

    #[tokio::test]
    async fn complete_credentials_select_mutual_tls() {
        let testdata = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata");
        let mut config = BackendTargetConfig::default();
        config.tls.ca_path = format!("{testdata}/ca.crt");
        config.tls.cert_path = format!("{testdata}/gateway.crt");
        config.tls.key_path = format!("{testdata}/gateway.key");

        let factory = ChannelFactory::new(config).unwrap();
        let handle = factory.build();
        assert_eq!(handle.mode, ChannelMode::MutualTls);
    }

    #[tokio::test]
    async fn generations_increase_per_build() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ChannelFactory::new(target_config(&dir)).unwrap();

        assert_eq!(factory.build().generation, 1);
        assert_eq!(factory.build().generation, 2);
        assert_eq!(factory.build().generation, 3);
    }

    #[test]
    fn hostile_target_is_rejected_up_front() {
        let mut config = BackendTargetConfig::default();
        config.host = "not a host".to_string();

        assert!(matches!(
            ChannelFactory::new(config),
            Err(ChannelError::InvalidTarget { .. })
        ));
    }
}

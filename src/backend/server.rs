//! Backend gRPC server assembly.
//!
//! # Responsibilities
//! - Bind the listener and serve the item service until shutdown
//! - Require client certificates when credentials are present, plaintext
//!   otherwise, mirroring the gateway's channel-side fallback

use std::path::Path;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Server;
use tonic::transport::{Certificate, Identity, ServerTlsConfig};

use crate::config::{BackendConfig, ListenerTlsConfig};
use crate::net::{load_credentials, CredentialError};
use crate::pb::item_service_server::ItemServiceServer;

use super::service::ItemsService;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("listener bind failed: {0}")]
    Bind(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// Bind the configured address and serve until the shutdown signal.
pub async fn serve(
    config: BackendConfig,
    service: ItemsService,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), ServeError> {
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let tls = match listener_tls(&config.listener.tls) {
        Ok(tls) => Some(tls),
        Err(reason) => {
            tracing::warn!(%reason, "mutual TLS credentials unavailable, serving plaintext");
            None
        }
    };
    serve_on(listener, tls, service, shutdown).await
}

/// Serve on an already-bound listener. The config-driven `serve` goes
/// through here; so do tests that bind an ephemeral port first.
pub async fn serve_on(
    listener: TcpListener,
    tls: Option<ServerTlsConfig>,
    service: ItemsService,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ServeError> {
    let addr = listener.local_addr()?;
    let mode = if tls.is_some() { "mutual_tls" } else { "plaintext" };
    tracing::info!(address = %addr, mode, "item backend listening");

    let mut builder = Server::builder();
    if let Some(tls) = tls {
        builder = builder.tls_config(tls)?;
    }

    builder
        .add_service(ItemServiceServer::new(service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            let _ = shutdown.recv().await;
            tracing::info!("backend shutdown signal received");
        })
        .await?;

    tracing::info!("item backend stopped");
    Ok(())
}

/// Mutual-TLS listener config from the credential paths: our identity plus
/// the CA that client certificates must chain to.
fn listener_tls(paths: &ListenerTlsConfig) -> Result<ServerTlsConfig, CredentialError> {
    let credentials = load_credentials(
        Path::new(&paths.ca_path),
        Path::new(&paths.cert_path),
        Path::new(&paths.key_path),
    )?;

    Ok(ServerTlsConfig::new()
        .identity(Identity::from_pem(&credentials.cert_pem, &credentials.key_pem))
        .client_ca_root(Certificate::from_pem(&credentials.ca_pem)))
}

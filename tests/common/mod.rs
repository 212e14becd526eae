//! Shared fixtures for gateway integration tests.
//!
//! Each test assembles its own little system on ephemeral ports: a real
//! item backend, a stub identity provider serving a JWKS document, and the
//! gateway under test pointed at both.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use item_gateway::backend::{serve_on, ItemsService, MemoryStore};
use item_gateway::config::GatewayConfig;
use item_gateway::http::HttpServer;
use item_gateway::lifecycle::Shutdown;

/// Secret the stub identity provider publishes under `PROVIDER_KID`.
pub const PROVIDER_SECRET: &[u8] = b"integration-provider-secret";
pub const PROVIDER_KID: &str = "stub-provider";

/// A live item backend on an ephemeral port. `service` is a clone of the
/// served instance, so flipping its serving flag changes what probes see.
pub struct BackendFixture {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    pub service: ItemsService,
    shutdown: Shutdown,
}

impl BackendFixture {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop serving. The port stays closed afterwards, so gateway calls
    /// start failing with connection errors.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

/// Start a real backend (plaintext) on an ephemeral port.
pub async fn spawn_backend() -> BackendFixture {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let store = Arc::new(MemoryStore::new());
    let service = ItemsService::with_store(Arc::clone(&store));
    let shutdown = Shutdown::new();

    let receiver = shutdown.subscribe();
    let served = service.clone();
    tokio::spawn(async move {
        serve_on(listener, None, served, receiver).await.unwrap();
    });

    BackendFixture { addr, store, service, shutdown }
}

/// Start a stub identity provider that serves one oct key in a JWKS
/// document, the way the gateway expects to fetch it at startup.
pub async fn spawn_jwks() -> String {
    let document = json!({
        "keys": [{
            "kty": "oct",
            "kid": PROVIDER_KID,
            "alg": "HS256",
            "k": URL_SAFE_NO_PAD.encode(PROVIDER_SECRET),
        }]
    });

    let app = Router::new().route(
        "/realms/items/certs",
        get(move || {
            let document = document.clone();
            async move { Json(document) }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/realms/items/certs", addr)
}

/// Gateway test configuration: fast timings, plaintext channel, pointed at
/// the given backend port and JWKS URL.
pub fn test_config(backend_port: u16, jwks_url: String) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backend.host = "127.0.0.1".to_string();
    config.backend.port = backend_port;
    config.backend.connect_timeout_secs = 1;
    config.backend.rpc_timeout_secs = 1;
    // Credential paths that do not exist: the factory falls back to
    // plaintext, matching the plaintext test backend.
    config.backend.tls.ca_path = "/nonexistent/ca.crt".to_string();
    config.backend.tls.cert_path = "/nonexistent/gateway.crt".to_string();
    config.backend.tls.key_path = "/nonexistent/gateway.key".to_string();
    config.auth.jwks_url = jwks_url;
    config.retries.base_delay_ms = 20;
    config.retries.max_delay_ms = 100;
    config.monitor.interval_secs = 1;
    config.monitor.probe_timeout_secs = 1;
    config
}

/// The gateway under test.
pub struct GatewayFixture {
    pub base_url: String,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl GatewayFixture {
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log in with the default demo credentials and return the token.
    pub async fn login(&self) -> String {
        let response = self
            .client
            .post(self.url("/auth"))
            .json(&json!({ "username": "admin", "password": "secret" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }
}

/// Boot a gateway on an ephemeral port with the given config. Fetches the
/// JWKS document during startup, exactly like the production binary.
pub async fn spawn_gateway(config: GatewayConfig) -> GatewayFixture {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).await.unwrap();
    let shutdown = Shutdown::new();
    let run_shutdown = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, &run_shutdown).await.unwrap();
    });

    // One round-trip makes sure the listener is accepting before the test
    // starts firing requests.
    let client = reqwest::Client::new();
    let base_url = format!("http://{}", addr);
    wait_until_up(&client, &base_url).await;

    GatewayFixture { base_url, client, shutdown }
}

async fn wait_until_up(client: &reqwest::Client, base_url: &str) {
    for _ in 0..50 {
        if client.get(format!("{}/health", base_url)).send().await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway did not come up");
}

/// Full stack: backend + stub provider + gateway wired together.
pub async fn spawn_stack() -> (BackendFixture, GatewayFixture) {
    let backend = spawn_backend().await;
    let jwks_url = spawn_jwks().await;
    let gateway = spawn_gateway(test_config(backend.port(), jwks_url)).await;
    (backend, gateway)
}

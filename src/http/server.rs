//! HTTP server assembly.
//!
//! # Responsibilities
//! - Build the Axum router: public, protected, and operational routes
//! - Wire middleware (request id, tracing, timeout, body limit, auth)
//! - Construct shared state: client slot, breaker, retry policy, tokens
//! - Spawn the connection monitor alongside the listener
//!
//! # Data Flow
//! ```text
//! request → request-id → trace → timeout/body-limit
//!         → [bearer auth on protected routes]
//!         → handler → retry/breaker → gRPC client (current slot)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::require_bearer;
use crate::auth::{KeySet, KeySetError, TokenAuthority};
use crate::config::GatewayConfig;
use crate::health::ConnectionMonitor;
use crate::lifecycle::Shutdown;
use crate::net::{ChannelError, ChannelFactory, ClientSlot};
use crate::observability::metrics;
use crate::resilience::{CircuitBreaker, RetryPolicy};

use super::handlers;

/// Why the gateway could not be assembled. Either way the process should
/// exit: a gateway without keys or a parseable backend target is useless.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Keys(#[from] KeySetError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub clients: Arc<ClientSlot>,
    pub breaker: Arc<CircuitBreaker>,
    pub retry: RetryPolicy,
    pub tokens: Arc<TokenAuthority>,
}

/// The gateway's HTTP server.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
    clients: Arc<ClientSlot>,
    factory: Arc<ChannelFactory>,
}

impl HttpServer {
    /// Fetch the identity provider's key set and assemble the gateway.
    /// A failed fetch fails startup.
    pub async fn new(config: GatewayConfig) -> Result<Self, InitError> {
        let keys = KeySet::fetch(&config.auth.jwks_url).await?;
        Self::with_key_set(config, keys)
    }

    /// Assemble with an already-loaded key set. Split out so the one
    /// network fetch stays separate from pure construction.
    pub fn with_key_set(config: GatewayConfig, keys: KeySet) -> Result<Self, InitError> {
        let config = Arc::new(config);
        let factory = Arc::new(ChannelFactory::new(config.backend.clone())?);
        let clients = Arc::new(ClientSlot::new(factory.build()));
        let tokens = Arc::new(TokenAuthority::new(&config.auth, keys));
        let breaker = Arc::new(CircuitBreaker::new(&config.breaker));
        let retry = RetryPolicy::new(&config.retries);

        tracing::info!(
            keys = tokens.key_count(),
            channel = %clients.mode(),
            "gateway assembled"
        );

        let state = AppState {
            config: Arc::clone(&config),
            clients: Arc::clone(&clients),
            breaker,
            retry,
            tokens,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config, clients, factory })
    }

    /// Build the router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let protected = Router::new()
            .route("/items", get(handlers::list_items).post(handlers::create_item))
            .route("/items/{id}", get(handlers::get_item))
            .route("/reset-breaker", post(handlers::reset_breaker))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

        Router::new()
            .route("/auth", post(handlers::login))
            .route("/health", get(handlers::health))
            .merge(protected)
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server on the given listener until shutdown triggers.
    /// Spawns the connection monitor on the same shutdown signal.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gateway listening");

        let monitor = ConnectionMonitor::new(
            Arc::clone(&self.clients),
            Arc::clone(&self.factory),
            &self.config.monitor,
        );
        let monitor_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            monitor.run(monitor_shutdown).await;
        });

        let mut serve_shutdown = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = serve_shutdown.recv().await;
                tracing::info!("shutdown signal received");
            })
            .await?;

        tracing::info!("gateway stopped");
        Ok(())
    }
}

/// Record latency and status for every matched route.
async fn track_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    metrics::record_request(method.as_str(), &route, response.status().as_u16(), started);
    response
}

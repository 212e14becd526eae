//! Gateway request handlers.
//!
//! # Responsibilities
//! - Login: credential check, token issue
//! - Item reads and creates, forwarded over gRPC
//! - Health and breaker-reset operational endpoints
//!
//! # Design Decisions
//! - Reads run under retry-wrapping-breaker. Creates run under the breaker
//!   alone: AddItem assigns ids, so a blind client retry after an ambiguous
//!   failure could insert twice.
//! - Every attempt re-reads the client slot, so a retry lands on a freshly
//!   swapped channel instead of the one that just failed.
//! - List streams are drained fully before the response is built. The
//!   gateway answers with a JSON array, never a partial stream.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::AuthenticatedUser;
use crate::pb;

use super::error::ApiError;
use super::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Item as the gateway presents it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemBody {
    pub id: i64,
    pub name: String,
}

impl From<pb::ItemResponse> for ItemBody {
    fn from(item: pb::ItemResponse) -> Self {
        Self { id: item.id, name: item.name }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateItem {
    /// Explicit id; omit (or send 0) to let the backend assign one.
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: BackendReport,
    pub breaker: BreakerReport,
}

#[derive(Debug, Serialize)]
pub struct BackendReport {
    pub target: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub channel: &'static str,
    pub generation: u64,
}

#[derive(Debug, Serialize)]
pub struct BreakerReport {
    pub state: &'static str,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_for_secs: Option<u64>,
}

/// POST /auth. Checks the configured credential pair and issues a token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let auth = &state.config.auth;
    if body.username != auth.login_username || body.password != auth.login_password {
        tracing::warn!(username = %body.username, "login rejected");
        return Err(ApiError::LoginRejected);
    }

    let token = state
        .tokens
        .issue(&body.username, vec!["admin".to_string()])
        .map_err(|error| {
            tracing::error!(%error, "token encoding failed");
            ApiError::Internal
        })?;

    tracing::info!(username = %body.username, "login accepted");
    Ok(Json(TokenResponse { token }))
}

/// GET /items. Drains the backend's list stream into a JSON array.
pub async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<ItemBody>>, ApiError> {
    let items = state
        .retry
        .run("list_items", || {
            let breaker = Arc::clone(&state.breaker);
            let clients = Arc::clone(&state.clients);
            async move {
                let mut client = clients.current().items.clone();
                breaker
                    .call("list_items", async move {
                        let mut stream = client.list_all_items(pb::Empty {}).await?.into_inner();
                        let mut items = Vec::new();
                        while let Some(item) = stream.message().await? {
                            items.push(item);
                        }
                        Ok(items)
                    })
                    .await
            }
        })
        .await?;

    Ok(Json(items.into_iter().map(ItemBody::from).collect()))
}

/// GET /items/{id}.
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ItemBody>, ApiError> {
    let item = state
        .retry
        .run("get_item", || {
            let breaker = Arc::clone(&state.breaker);
            let clients = Arc::clone(&state.clients);
            async move {
                let mut client = clients.current().items.clone();
                breaker
                    .call("get_item", async move {
                        let response = client
                            .get_item_by_id(pb::ItemRequest { id, name: String::new() })
                            .await?;
                        Ok(response.into_inner())
                    })
                    .await
            }
        })
        .await?;

    Ok(Json(item.into()))
}

/// POST /items. Breaker-guarded but never retried.
pub async fn create_item(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateItem>,
) -> Result<(StatusCode, Json<ItemBody>), ApiError> {
    let request = pb::ItemRequest {
        id: body.id.unwrap_or(0),
        name: body.name,
    };

    let clients = Arc::clone(&state.clients);
    let created = state
        .breaker
        .call("add_item", async move {
            let mut client = clients.current().items.clone();
            Ok(client.add_item(request).await?.into_inner())
        })
        .await?;

    tracing::info!(id = created.id, user = %user.username, "item created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /health. Unauthenticated; probes the backend with a bounded call and
/// reports channel and breaker state alongside.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let handle = state.clients.current();
    let mut client = handle.items.clone();
    let probe_timeout = Duration::from_secs(state.config.monitor.probe_timeout_secs);

    let probe = tokio::time::timeout(probe_timeout, client.check_health(pb::HealthCheckRequest {})).await;
    let (connected, detail) = match probe {
        Ok(Ok(response)) => {
            if response.into_inner().status == pb::ServingStatus::Serving as i32 {
                (true, None)
            } else {
                (false, Some("backend reports not serving".to_string()))
            }
        }
        Ok(Err(status)) => (false, Some(format!("probe failed: {}", status.code()))),
        Err(_) => (false, Some("probe timed out".to_string())),
    };

    let snapshot = state.breaker.snapshot();
    Json(HealthResponse {
        status: "healthy",
        backend: BackendReport {
            target: format!("{}:{}", state.config.backend.host, state.config.backend.port),
            connected,
            detail,
            channel: handle.mode.as_str(),
            generation: handle.generation,
        },
        breaker: BreakerReport {
            state: snapshot.state.as_str(),
            consecutive_failures: snapshot.consecutive_failures,
            open_for_secs: snapshot.open_for.map(|d| d.as_secs()),
        },
    })
}

/// POST /reset-breaker. Operational override back to closed.
pub async fn reset_breaker(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<serde_json::Value> {
    state.breaker.reset();
    let snapshot = state.breaker.snapshot();
    tracing::info!(user = %user.username, "circuit breaker reset by operator");

    Json(json!({
        "status": "success",
        "breaker_state": snapshot.state.as_str(),
        "consecutive_failures": snapshot.consecutive_failures,
    }))
}

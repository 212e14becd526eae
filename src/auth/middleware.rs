//! Bearer-token authentication middleware.
//!
//! # Responsibilities
//! - Extract the bearer token from the Authorization header
//! - Validate it through the token authority
//! - Attach the authenticated identity to the request for handlers

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::http::error::ApiError;
use crate::http::server::AppState;

use super::token::{AuthError, Claims};

/// Identity of the caller, inserted into request extensions after a token
/// passes validation.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
    pub claims: Claims,
}

/// Reject the request with 401 unless it carries a valid bearer token.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;
    let claims = state.tokens.validate(token)?;

    let user = AuthenticatedUser {
        username: claims.identity().to_string(),
        claims,
    };
    tracing::debug!(user = %user.username, "request authenticated");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    let token = value.strip_prefix("Bearer ").ok_or(AuthError::MalformedHeader)?;

    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

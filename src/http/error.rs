//! HTTP error responses.
//!
//! # Responsibilities
//! - Map auth and backend-call failures onto HTTP status codes
//! - Keep response bodies uniform: `{"error": "..."}`
//! - Log at a level matching severity
//!
//! # Design Decisions
//! - gRPC codes translate per class: NotFound 404, AlreadyExists 409,
//!   InvalidArgument 400, transport trouble 503, anything else 500.
//! - An open breaker is 503. Callers cannot tell it from a transport
//!   failure by status alone, but the body says which it was.
//! - 4xx bodies carry the backend's message; 5xx bodies never do.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tonic::Code;

use crate::auth::AuthError;
use crate::resilience::CallError;

/// Anything a handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("invalid credentials")]
    LoginRejected,

    #[error(transparent)]
    Backend(#[from] CallError),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::LoginRejected => StatusCode::UNAUTHORIZED,
            ApiError::Backend(CallError::BreakerOpen) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Backend(CallError::Rpc(status)) => match status.code() {
                Code::NotFound => StatusCode::NOT_FOUND,
                Code::AlreadyExists => StatusCode::CONFLICT,
                Code::InvalidArgument => StatusCode::BAD_REQUEST,
                Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message for the response body. Backend messages surface only for
    /// client errors; server-side trouble stays generic.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized(reason) => reason.to_string(),
            ApiError::LoginRejected => "invalid credentials".to_string(),
            ApiError::Backend(CallError::BreakerOpen) => {
                "backend unavailable (circuit open)".to_string()
            }
            ApiError::Backend(CallError::Rpc(status)) => match status.code() {
                Code::NotFound | Code::AlreadyExists | Code::InvalidArgument => {
                    status.message().to_string()
                }
                Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => {
                    "backend unavailable".to_string()
                }
                _ => "backend error".to_string(),
            },
            ApiError::Internal => "internal error".to_string(),
        }
    }

    fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(error = %self, "request rejected");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request refused");
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        let body = json!({ "error": self.user_message() });
        (status, Json(body)).into_response()
    }
}

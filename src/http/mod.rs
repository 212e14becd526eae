//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (router, middleware stack, shared state)
//!     → handlers.rs (login, items, health, breaker reset)
//!     → error.rs (failure → status code + JSON body)
//! ```

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, HttpServer, InitError};

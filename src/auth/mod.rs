//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!   KeySet::fetch (JWKS, fatal on failure) → TokenAuthority::new
//!     (+ local signing secret under signing_kid)
//!
//! Per request:
//!   require_bearer → bearer extraction → kid lookup → validate
//!     → AuthenticatedUser in request extensions
//!
//! Login:
//!   POST /auth → TokenAuthority::issue (HS256, signing_kid)
//! ```

pub mod keys;
pub mod middleware;
pub mod token;

pub use keys::{KeySet, KeySetError};
pub use middleware::AuthenticatedUser;
pub use token::{AuthError, Claims, TokenAuthority};

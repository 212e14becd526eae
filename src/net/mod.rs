//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → credentials.rs (load + pre-parse PEM trio)
//!     → channel.rs (mTLS endpoint, or plaintext fallback)
//!     → client.rs (handle published in the swappable slot)
//!
//! Probe failure (health::monitor)
//!     → channel.rs (fresh build, next generation)
//!     → client.rs (atomic swap; readers never block)
//! ```
//!
//! # Design Decisions
//! - Secure transport is best-effort: a broken credential set downgrades to
//!   plaintext with a logged reason instead of refusing to start
//! - Lazy connections keep the gateway reachable while the backend is down
//! - One writer (the monitor), many readers (the handlers)

pub mod channel;
pub mod client;
pub mod credentials;

pub use channel::{ChannelError, ChannelFactory};
pub use client::{BackendHandle, ChannelMode, ClientSlot};
pub use credentials::{load_credentials, CredentialError, Credentials};

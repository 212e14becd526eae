//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Fetch key set → Build channel →
//!     Spawn monitor → Serve
//!
//! Shutdown (shutdown.rs):
//!     ctrl-c → broadcast → monitor stops, servers drain, process exits
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then mandatory fetches, then listeners
//! - One broadcast channel fans the signal out to every task

pub mod shutdown;

pub use shutdown::Shutdown;

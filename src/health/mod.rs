//! Backend health subsystem.
//!
//! # Data Flow
//! ```text
//! Connection monitor (monitor.rs):
//!   tick → CheckHealth probe (bounded) → ok: nothing
//!                                      → fail: factory.build() → slot.replace()
//! ```
//!
//! The monitor runs outside the request path. Handlers never wait on it;
//! they always use whichever client the slot currently holds.

pub mod monitor;

pub use monitor::ConnectionMonitor;

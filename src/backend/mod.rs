//! Item backend: the gRPC service the gateway fronts.
//!
//! # Data Flow
//! ```text
//! gRPC request
//!     → server.rs (listener, optional mutual TLS)
//!     → service.rs (RPC handlers, store error → gRPC code)
//!     → store.rs (locked BTreeMap, sequential id assignment)
//! ```

pub mod server;
pub mod service;
pub mod store;

pub use server::{serve, serve_on, ServeError};
pub use service::ItemsService;
pub use store::{MemoryStore, StoreError, StoredItem};

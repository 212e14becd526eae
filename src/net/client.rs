//! Shared backend client slot.
//!
//! The gateway holds exactly one backend handle at a time. Handlers load it
//! at call time; the connection monitor is the only writer and replaces it
//! when probes fail. Replacement is an atomic pointer swap: in-flight calls
//! keep the handle they loaded, new calls see the fresh one.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tonic::transport::Channel;

use crate::pb::item_service_client::ItemServiceClient;

/// Transport security mode selected by the channel factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    MutualTls,
    Plaintext,
}

impl ChannelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelMode::MutualTls => "mutual_tls",
            ChannelMode::Plaintext => "plaintext",
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation of backend clients over a single channel.
#[derive(Debug, Clone)]
pub struct BackendHandle {
    pub items: ItemServiceClient<Channel>,
    pub mode: ChannelMode,
    pub generation: u64,
}

/// Atomically replaceable cell holding the current [`BackendHandle`].
#[derive(Debug)]
pub struct ClientSlot {
    inner: ArcSwap<BackendHandle>,
}

impl ClientSlot {
    pub fn new(initial: BackendHandle) -> Self {
        Self {
            inner: ArcSwap::from_pointee(initial),
        }
    }

    /// Load the current handle. Callers do this per attempt, never caching
    /// a handle across retries.
    pub fn current(&self) -> Arc<BackendHandle> {
        self.inner.load_full()
    }

    /// Swap in a replacement handle.
    pub fn replace(&self, next: BackendHandle) {
        self.inner.store(Arc::new(next));
    }

    pub fn generation(&self) -> u64 {
        self.inner.load().generation
    }

    pub fn mode(&self) -> ChannelMode {
        self.inner.load().mode
    }
}

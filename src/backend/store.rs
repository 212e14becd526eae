//! In-memory item store.
//!
//! # Responsibilities
//! - Hold items behind a single lock, ordered by id
//! - Assign sequential ids when callers do not pick one
//!
//! # Design Decisions
//! - A BTreeMap keeps listing ordered without a sort on every call.
//! - Id assignment and insertion happen under one write guard, so two
//!   concurrent auto-id inserts can never pick the same id.

use std::collections::BTreeMap;
use std::sync::RwLock;

/// Item as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub id: i64,
    pub name: String,
}

/// Why a store operation was refused.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("item id must be positive, got {0}")]
    InvalidId(i64),

    #[error("item name must not be empty")]
    EmptyName,

    #[error("item {0} already exists")]
    Duplicate(i64),

    #[error("item {0} not found")]
    NotFound(i64),
}

/// Thread-safe in-memory store with sequential id assignment.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<i64, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Result<StoredItem, StoreError> {
        if id <= 0 {
            return Err(StoreError::InvalidId(id));
        }
        let items = self.read();
        items
            .get(&id)
            .map(|name| StoredItem { id, name: name.clone() })
            .ok_or(StoreError::NotFound(id))
    }

    /// All items in ascending id order.
    pub fn list(&self) -> Vec<StoredItem> {
        self.read()
            .iter()
            .map(|(id, name)| StoredItem { id: *id, name: name.clone() })
            .collect()
    }

    /// Insert with the given id, or assign highest-plus-one when `id` is 0.
    /// The first auto-assigned id in an empty store is 1.
    pub fn insert(&self, id: i64, name: &str) -> Result<StoredItem, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::EmptyName);
        }
        if id < 0 {
            return Err(StoreError::InvalidId(id));
        }

        let mut items = self.write();
        let id = if id > 0 {
            if items.contains_key(&id) {
                return Err(StoreError::Duplicate(id));
            }
            id
        } else {
            items.last_key_value().map(|(highest, _)| highest + 1).unwrap_or(1)
        };

        items.insert(id, name.to_string());
        Ok(StoredItem { id, name: name.to_string() })
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<i64, String>> {
        // A poisoned lock still holds a coherent map; keep serving.
        self.items.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<i64, String>> {
        self.items.write().unwrap_or_else(|e| e.into_inner())
    }
}

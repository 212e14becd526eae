//! Item service implementation.
//!
//! # Responsibilities
//! - Serve GetItemById, ListAllItems, AddItem over gRPC
//! - Answer CheckHealth probes with the current serving flag
//!
//! # Design Decisions
//! - Store errors map onto gRPC codes here and nowhere else: invalid input
//!   is InvalidArgument, duplicates are AlreadyExists, misses are NotFound.
//! - Listing streams through a small channel. The send loop stops as soon
//!   as the client goes away, so an abandoned stream costs nothing.
//! - The serving flag exists for drain and fault scenarios: the transport
//!   keeps answering while CheckHealth reports NOT_SERVING.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use crate::pb;
use crate::pb::item_service_server::ItemService;

use super::store::{MemoryStore, StoreError, StoredItem};

impl From<StoredItem> for pb::ItemResponse {
    fn from(item: StoredItem) -> Self {
        Self { id: item.id, name: item.name }
    }
}

fn status_from(error: StoreError) -> Status {
    match error {
        StoreError::InvalidId(_) | StoreError::EmptyName => {
            Status::invalid_argument(error.to_string())
        }
        StoreError::Duplicate(_) => Status::already_exists(error.to_string()),
        StoreError::NotFound(_) => Status::not_found(error.to_string()),
    }
}

/// gRPC item service backed by the in-memory store. Clones share both the
/// store and the serving flag.
#[derive(Debug, Clone)]
pub struct ItemsService {
    store: Arc<MemoryStore>,
    serving: Arc<AtomicBool>,
}

impl ItemsService {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        Self { store, serving: Arc::new(AtomicBool::new(true)) }
    }

    /// Flip what CheckHealth reports without touching the transport.
    pub fn set_serving(&self, serving: bool) {
        self.serving.store(serving, Ordering::Relaxed);
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

impl Default for ItemsService {
    fn default() -> Self {
        Self::new()
    }
}

#[tonic::async_trait]
impl ItemService for ItemsService {
    async fn get_item_by_id(
        &self,
        request: Request<pb::ItemRequest>,
    ) -> Result<Response<pb::ItemResponse>, Status> {
        let id = request.into_inner().id;
        let item = self.store.get(id).map_err(status_from)?;
        tracing::debug!(id, "item fetched");
        Ok(Response::new(item.into()))
    }

    type ListAllItemsStream = ReceiverStream<Result<pb::ItemResponse, Status>>;

    async fn list_all_items(
        &self,
        _request: Request<pb::Empty>,
    ) -> Result<Response<Self::ListAllItemsStream>, Status> {
        let items = self.store.list();
        tracing::debug!(count = items.len(), "streaming items");

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for item in items {
                if tx.send(Ok(item.into())).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn add_item(
        &self,
        request: Request<pb::ItemRequest>,
    ) -> Result<Response<pb::ItemResponse>, Status> {
        let request = request.into_inner();
        let item = self.store.insert(request.id, &request.name).map_err(status_from)?;
        tracing::info!(id = item.id, "item stored");
        Ok(Response::new(item.into()))
    }

    async fn check_health(
        &self,
        _request: Request<pb::HealthCheckRequest>,
    ) -> Result<Response<pb::HealthCheckResponse>, Status> {
        let status = if self.serving.load(Ordering::Relaxed) {
            pb::ServingStatus::Serving
        } else {
            pb::ServingStatus::NotServing
        };
        Ok(Response::new(pb::HealthCheckResponse { status: status as i32 }))
    }
}

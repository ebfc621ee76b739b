//! Incremental pagination over `skip`/`count` endpoints.

use async_trait::async_trait;

use crate::api::{ApiClient, Environment, Room};
use crate::error::Result;

pub mod loader;

pub use loader::PaginatedCollectionLoader;

/// One fetch's worth of items
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub requested_count: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, requested_count: usize) -> Self {
        Self {
            items,
            requested_count,
        }
    }

    /// A full page suggests more items exist; the last page may be full too
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.requested_count
    }
}

/// State of one paginated collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<T> {
    /// Append-only across `load_more`, replaced on `refresh`
    pub items: Vec<T>,
    /// Offset of the next page
    pub cursor: usize,
    pub has_more: bool,
    pub is_refreshing: bool,
    pub is_loading_more: bool,
}

impl<T> CollectionState<T> {
    pub fn is_idle(&self) -> bool {
        !self.is_refreshing && !self.is_loading_more
    }
}

impl<T> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
            has_more: true,
            is_refreshing: false,
            is_loading_more: false,
        }
    }
}

/// A remote paged collection
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    /// Fetch up to `count` items starting at offset `skip`
    async fn fetch_page(&self, skip: usize, count: usize) -> Result<Vec<T>>;
}

/// `GET /env`
pub struct EnvironmentPages {
    api: ApiClient,
}

impl EnvironmentPages {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource<Environment> for EnvironmentPages {
    async fn fetch_page(&self, skip: usize, count: usize) -> Result<Vec<Environment>> {
        self.api.environments(skip, count).await
    }
}

/// `GET /env/{id}/room`
pub struct RoomPages {
    api: ApiClient,
    environment_id: i64,
}

impl RoomPages {
    pub fn new(api: ApiClient, environment_id: i64) -> Self {
        Self {
            api,
            environment_id,
        }
    }
}

#[async_trait]
impl PageSource<Room> for RoomPages {
    async fn fetch_page(&self, skip: usize, count: usize) -> Result<Vec<Room>> {
        self.api.rooms(self.environment_id, skip, count).await
    }
}

//! Storage traits and implementations for models and connections.
//!
//! - [`ModelStore`] - keyed by model id
//! - [`ConnectionStore`] - keyed by [`ConnectionId`], assigned on insert
//!
//! [`MemoryStore`] keeps everything in ordered maps. [`FileStore`] wraps it
//! and writes a versioned JSON document after every mutation.

pub mod codec;
mod error;
mod file;
mod memory;

pub use error::{Result, StoreError};
pub use file::FileStore;
pub use memory::{MemoryStore, StoreState};

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::providers::{ConnectionId, ProviderConnection};
use crate::types::ModelRecord;

/// Persistence for [`ModelRecord`]s.
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Get a model by id.
    async fn get_model(&self, id: &str) -> Result<Option<ModelRecord>>;

    /// List all models, ordered by id.
    async fn list_models(&self) -> Result<Vec<ModelRecord>>;

    /// Insert a new model. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn insert_model(&self, model: ModelRecord) -> Result<ModelRecord>;

    /// Replace an existing model. Fails with [`StoreError::Missing`] if absent.
    async fn update_model(&self, model: ModelRecord) -> Result<ModelRecord>;

    /// Insert or replace by id. An existing record keeps its `created_at`.
    async fn upsert_model(&self, model: ModelRecord) -> Result<ModelRecord>;

    /// Delete a model. Returns whether it existed.
    async fn delete_model(&self, id: &str) -> Result<bool>;

    /// Delete every model. Returns the number removed.
    async fn delete_all_models(&self) -> Result<usize>;

    /// Delete every model whose id is not in `keep`. Returns the number removed.
    async fn retain_models(&self, keep: &BTreeSet<String>) -> Result<usize>;
}

/// Persistence for [`ProviderConnection`]s.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Get a connection by id.
    async fn get_connection(&self, id: ConnectionId) -> Result<Option<ProviderConnection>>;

    /// List all connections ordered by id.
    ///
    /// The position in this list is the connection's origin index.
    async fn list_connections(&self) -> Result<Vec<ProviderConnection>>;

    /// Insert a connection under a freshly assigned id.
    ///
    /// The incoming `id` is ignored; the stored record is returned.
    async fn insert_connection(&self, connection: ProviderConnection)
    -> Result<ProviderConnection>;

    /// Replace an existing connection. Fails with [`StoreError::Missing`] if absent.
    async fn update_connection(&self, connection: ProviderConnection)
    -> Result<ProviderConnection>;

    /// Delete a connection. Returns whether it existed.
    async fn delete_connection(&self, id: ConnectionId) -> Result<bool>;
}

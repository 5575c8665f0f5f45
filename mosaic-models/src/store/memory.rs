//! In-memory store backed by ordered maps.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{ConnectionStore, ModelStore, Result, StoreError};
use crate::providers::{ConnectionId, ProviderConnection};
use crate::types::ModelRecord;

/// Everything a store holds.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreState {
    pub models: BTreeMap<String, ModelRecord>,
    pub connections: BTreeMap<ConnectionId, ProviderConnection>,
    /// Id handed to the next inserted connection.
    pub next_connection_id: u64,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            models: BTreeMap::new(),
            connections: BTreeMap::new(),
            next_connection_id: 1,
        }
    }
}

/// Volatile store. Cloning the contents is cheap enough for tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously loaded contents.
    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }

    /// Swap in new contents wholesale.
    pub async fn replace(&self, state: StoreState) {
        *self.state.write().await = state;
    }

    pub fn into_state(self) -> StoreState {
        self.state.into_inner()
    }
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn get_model(&self, id: &str) -> Result<Option<ModelRecord>> {
        Ok(self.state.read().await.models.get(id).cloned())
    }

    async fn list_models(&self) -> Result<Vec<ModelRecord>> {
        Ok(self.state.read().await.models.values().cloned().collect())
    }

    #[instrument(skip(self, model), fields(id = %model.id), level = "debug")]
    async fn insert_model(&self, model: ModelRecord) -> Result<ModelRecord> {
        let mut state = self.state.write().await;
        if state.models.contains_key(&model.id) {
            return Err(StoreError::Duplicate(model.id));
        }
        state.models.insert(model.id.clone(), model.clone());
        Ok(model)
    }

    #[instrument(skip(self, model), fields(id = %model.id), level = "debug")]
    async fn update_model(&self, model: ModelRecord) -> Result<ModelRecord> {
        let mut state = self.state.write().await;
        match state.models.get_mut(&model.id) {
            Some(slot) => {
                *slot = model.clone();
                Ok(model)
            }
            None => Err(StoreError::Missing(model.id)),
        }
    }

    #[instrument(skip(self, model), fields(id = %model.id), level = "debug")]
    async fn upsert_model(&self, mut model: ModelRecord) -> Result<ModelRecord> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.models.get(&model.id) {
            model.created_at = existing.created_at;
        }
        state.models.insert(model.id.clone(), model.clone());
        Ok(model)
    }

    async fn delete_model(&self, id: &str) -> Result<bool> {
        Ok(self.state.write().await.models.remove(id).is_some())
    }

    async fn delete_all_models(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        let count = state.models.len();
        state.models.clear();
        debug!(count, "deleted all models");
        Ok(count)
    }

    async fn retain_models(&self, keep: &BTreeSet<String>) -> Result<usize> {
        let mut state = self.state.write().await;
        let before = state.models.len();
        state.models.retain(|id, _| keep.contains(id));
        Ok(before - state.models.len())
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn get_connection(&self, id: ConnectionId) -> Result<Option<ProviderConnection>> {
        Ok(self.state.read().await.connections.get(&id).cloned())
    }

    async fn list_connections(&self) -> Result<Vec<ProviderConnection>> {
        Ok(self.state.read().await.connections.values().cloned().collect())
    }

    #[instrument(skip(self, connection), level = "debug")]
    async fn insert_connection(
        &self,
        mut connection: ProviderConnection,
    ) -> Result<ProviderConnection> {
        let mut state = self.state.write().await;
        let id = ConnectionId(state.next_connection_id.max(1));
        state.next_connection_id = id.0 + 1;
        connection.id = id;
        state.connections.insert(id, connection.clone());
        debug!(%id, "inserted connection");
        Ok(connection)
    }

    #[instrument(skip(self, connection), fields(id = %connection.id), level = "debug")]
    async fn update_connection(&self, connection: ProviderConnection) -> Result<ProviderConnection> {
        let mut state = self.state.write().await;
        match state.connections.get_mut(&connection.id) {
            Some(slot) => {
                *slot = connection.clone();
                Ok(connection)
            }
            None => Err(StoreError::Missing(connection.id.to_string())),
        }
    }

    async fn delete_connection(&self, id: ConnectionId) -> Result<bool> {
        Ok(self.state.write().await.connections.remove(&id).is_some())
    }
}

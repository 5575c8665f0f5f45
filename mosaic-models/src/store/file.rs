//! JSON-file store.
//!
//! Holds everything in a [`MemoryStore`] and rewrites the whole document
//! on each mutation. A mutation is applied to a staged copy, written to a
//! sibling temp file that is renamed over the target, and only then made
//! visible to readers.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::{codec, ConnectionStore, MemoryStore, ModelStore, Result};
use crate::providers::{ConnectionId, ProviderConnection};
use crate::types::ModelRecord;

/// Store persisted to a single JSON document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open the document at `path`, starting empty if it does not exist yet.
    #[instrument(level = "debug")]
    pub async fn open(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => codec::decode(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "store document missing, starting empty");
                Default::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            inner: MemoryStore::from_state(state),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current contents to mutate. Callers hold `write_lock`.
    async fn stage(&self) -> MemoryStore {
        MemoryStore::from_state(self.inner.snapshot().await)
    }

    /// Write `staged` to disk, then make it the live state.
    ///
    /// On a failed write the live state is left untouched.
    async fn commit(&self, staged: MemoryStore) -> Result<()> {
        let state = staged.into_state();
        let bytes = codec::encode(&state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        self.inner.replace(state).await;
        debug!(path = %self.path.display(), bytes = bytes.len(), "store persisted");
        Ok(())
    }
}

#[async_trait]
impl ModelStore for FileStore {
    async fn get_model(&self, id: &str) -> Result<Option<ModelRecord>> {
        self.inner.get_model(id).await
    }

    async fn list_models(&self) -> Result<Vec<ModelRecord>> {
        self.inner.list_models().await
    }

    async fn insert_model(&self, model: ModelRecord) -> Result<ModelRecord> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        let model = staged.insert_model(model).await?;
        self.commit(staged).await?;
        Ok(model)
    }

    async fn update_model(&self, model: ModelRecord) -> Result<ModelRecord> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        let model = staged.update_model(model).await?;
        self.commit(staged).await?;
        Ok(model)
    }

    async fn upsert_model(&self, model: ModelRecord) -> Result<ModelRecord> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        let model = staged.upsert_model(model).await?;
        self.commit(staged).await?;
        Ok(model)
    }

    async fn delete_model(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        let removed = staged.delete_model(id).await?;
        if removed {
            self.commit(staged).await?;
        }
        Ok(removed)
    }

    async fn delete_all_models(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        let count = staged.delete_all_models().await?;
        self.commit(staged).await?;
        Ok(count)
    }

    async fn retain_models(&self, keep: &BTreeSet<String>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        let count = staged.retain_models(keep).await?;
        if count > 0 {
            self.commit(staged).await?;
        }
        Ok(count)
    }
}

#[async_trait]
impl ConnectionStore for FileStore {
    async fn get_connection(&self, id: ConnectionId) -> Result<Option<ProviderConnection>> {
        self.inner.get_connection(id).await
    }

    async fn list_connections(&self) -> Result<Vec<ProviderConnection>> {
        self.inner.list_connections().await
    }

    async fn insert_connection(&self, connection: ProviderConnection) -> Result<ProviderConnection> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        let connection = staged.insert_connection(connection).await?;
        self.commit(staged).await?;
        Ok(connection)
    }

    async fn update_connection(&self, connection: ProviderConnection) -> Result<ProviderConnection> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        let connection = staged.update_connection(connection).await?;
        self.commit(staged).await?;
        Ok(connection)
    }

    async fn delete_connection(&self, id: ConnectionId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let staged = self.stage().await;
        let removed = staged.delete_connection(id).await?;
        if removed {
            self.commit(staged).await?;
        }
        Ok(removed)
    }
}

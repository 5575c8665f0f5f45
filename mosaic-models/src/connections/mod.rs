//! Provider connection registry.
//!
//! Connections are operator configuration: every caller sees all of them,
//! so nothing here takes a [`Caller`](crate::auth::Caller).

use std::sync::Arc;

use tracing::{info, instrument};

use crate::providers::{ConnectionForm, ConnectionId, ConnectionPatch, ProviderConnection};
use crate::store::{ConnectionStore, StoreError};
use crate::{Error, Result, unix_now};

/// CRUD over [`ProviderConnection`]s.
#[derive(Clone)]
pub struct ConnectionRegistry {
    store: Arc<dyn ConnectionStore>,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self { store }
    }

    /// Validate and store a new connection. The store assigns its id.
    #[instrument(skip(self, form), fields(name = %form.name))]
    pub async fn create(&self, form: ConnectionForm) -> Result<ProviderConnection> {
        let connection = ProviderConnection::from_form(ConnectionId(0), form, unix_now())?;
        let connection = self.store.insert_connection(connection).await?;
        info!(id = %connection.id, kind = %connection.kind, "connection created");
        Ok(connection)
    }

    /// All connections, ordered by id. Position is the origin index.
    pub async fn list(&self) -> Result<Vec<ProviderConnection>> {
        Ok(self.store.list_connections().await?)
    }

    pub async fn get(&self, id: ConnectionId) -> Result<ProviderConnection> {
        self.store
            .get_connection(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("connection {id}")))
    }

    /// Look up a connection together with its position in [`list`](Self::list).
    pub async fn get_indexed(&self, id: ConnectionId) -> Result<(usize, ProviderConnection)> {
        self.list()
            .await?
            .into_iter()
            .enumerate()
            .find(|(_, c)| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("connection {id}")))
    }

    /// Merge `patch` onto the stored connection.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: ConnectionId, patch: ConnectionPatch) -> Result<ProviderConnection> {
        let mut connection = self.get(id).await?;
        connection.apply_patch(patch, unix_now())?;

        match self.store.update_connection(connection).await {
            Ok(updated) => {
                info!(%id, "connection updated");
                Ok(updated)
            }
            Err(StoreError::Missing(_)) => Err(Error::NotFound(format!("connection {id}"))),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: ConnectionId) -> Result<()> {
        if !self.store.delete_connection(id).await? {
            return Err(Error::NotFound(format!("connection {id}")));
        }
        info!(%id, "connection deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderKind;
    use crate::store::MemoryStore;

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn create_rejects_missing_type() {
        let registry = registry();
        let form = ConnectionForm {
            name: "untyped".to_string(),
            base_url: "http://localhost:11434".to_string(),
            ..Default::default()
        };

        let err = registry.create(form).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_assigns_ids_in_order() {
        let registry = registry();
        let a = registry
            .create(ConnectionForm::new(ProviderKind::OpenAi, "a", "https://api.openai.com/v1"))
            .await
            .unwrap();
        let b = registry
            .create(ConnectionForm::new(ProviderKind::Ollama, "b", "http://localhost:11434"))
            .await
            .unwrap();

        assert!(a.id < b.id);
        assert_eq!(registry.get_indexed(b.id).await.unwrap().0, 1);
    }

    #[tokio::test]
    async fn update_merges_and_preserves_identity() {
        let registry = registry();
        let created = registry
            .create(ConnectionForm::new(ProviderKind::Ollama, "local", "http://localhost:11434"))
            .await
            .unwrap();

        let patch = ConnectionPatch {
            prefix_id: Some("home".to_string()),
            ..Default::default()
        };
        let updated = registry.update(created.id, patch).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "local");
        assert_eq!(updated.prefix_id.as_deref(), Some("home"));
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let registry = registry();
        let ghost = ConnectionId(42);

        assert!(matches!(registry.get(ghost).await, Err(Error::NotFound(_))));
        assert!(matches!(
            registry.update(ghost, ConnectionPatch::default()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(registry.delete(ghost).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_shifts_later_indices() {
        let registry = registry();
        let a = registry
            .create(ConnectionForm::new(ProviderKind::Ollama, "a", "http://a:11434"))
            .await
            .unwrap();
        let b = registry
            .create(ConnectionForm::new(ProviderKind::Ollama, "b", "http://b:11434"))
            .await
            .unwrap();

        registry.delete(a.id).await.unwrap();
        assert_eq!(registry.get_indexed(b.id).await.unwrap().0, 0);
    }
}

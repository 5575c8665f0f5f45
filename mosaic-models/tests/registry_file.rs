//! Registry integration tests over the JSON file store
//!
//! Validates that registry and connection mutations are visible after the
//! store is reopened from disk.

use std::sync::Arc;

use mosaic_models::auth::Caller;
use mosaic_models::providers::{ConnectionForm, ConnectionPatch, ProviderKind};
use mosaic_models::registry::ModelFilter;
use mosaic_models::store::FileStore;
use mosaic_models::{ConnectionRegistry, ModelForm, ModelRegistry};
use tempfile::TempDir;

#[tokio::test]
async fn sync_then_reopen_lists_exactly_the_synced_models() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mosaic.json");
    let caller = Caller::user("alice");

    {
        let store = Arc::new(FileStore::open(&path).await.unwrap());
        let registry = ModelRegistry::new(store);
        registry
            .create(&caller, ModelForm::new("stale", "Stale").base("llama3"))
            .await
            .unwrap();
        registry
            .sync_replace(
                &caller,
                vec![
                    ModelForm::new("coder", "Coder").base("llama3"),
                    ModelForm::new("writer", "Writer").base("mistral"),
                ],
            )
            .await
            .unwrap();
    }

    let registry = ModelRegistry::new(Arc::new(FileStore::open(&path).await.unwrap()));
    let page = registry.list(&caller, &ModelFilter::default()).await.unwrap();
    let mut ids: Vec<_> = page.items.iter().map(|m| m.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["coder", "writer"]);
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn connection_updates_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mosaic.json");

    let id = {
        let connections = ConnectionRegistry::new(Arc::new(FileStore::open(&path).await.unwrap()));
        let created = connections
            .create(
                ConnectionForm::new(ProviderKind::OpenAi, "oai", "https://api.openai.com/v1")
                    .api_key("sk-test"),
            )
            .await
            .unwrap();
        connections
            .update(
                created.id,
                ConnectionPatch {
                    enable: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        created.id
    };

    let connections = ConnectionRegistry::new(Arc::new(FileStore::open(&path).await.unwrap()));
    let stored = connections.get(id).await.unwrap();
    assert!(!stored.enable);
    assert_eq!(stored.api_key, "sk-test");
    assert_eq!(stored.kind, ProviderKind::OpenAi);
}

//! Ollama provider adapter.
//!
//! Verification hits `/api/version`; listing reads `/api/tags`.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::http::HttpClient;
use super::{CatalogEntry, Origin, ProviderAdapter, ProviderConnection, ProviderKind, VerifyStatus};
use crate::Result;

// ────────────────────────────────────────────────────────────────────────────
// Endpoints
// ────────────────────────────────────────────────────────────────────────────

pub fn version_url(connection: &ProviderConnection) -> String {
    connection.url("api/version")
}

pub fn tags_url(connection: &ProviderConnection) -> String {
    connection.url("api/tags")
}

/// Turn an `/api/tags` payload into catalog entries tagged with `origin`.
///
/// A non-empty allow-list keeps only exact `model` matches.
pub fn normalize(connection: &ProviderConnection, origin: usize, payload: &Value) -> Vec<CatalogEntry> {
    let Some(models) = payload.get("models").and_then(Value::as_array) else {
        warn!(connection = %connection.id, "tags response has no models array");
        return Vec::new();
    };

    let connection_type = connection.connection_type_label();

    models
        .iter()
        .filter_map(|raw| {
            let model = raw
                .get("model")
                .or_else(|| raw.get("name"))
                .and_then(Value::as_str)?;
            if !connection.model_ids.is_empty() && !connection.model_ids.iter().any(|m| m == model) {
                return None;
            }

            let id = connection.prefixed(model);
            Some(CatalogEntry {
                name: id.clone(),
                id,
                owned_by: ProviderKind::Ollama,
                connection_type: connection_type.clone(),
                origin: Origin::single(origin),
                tags: connection.tags.clone(),
                raw: raw.clone(),
            })
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// OllamaAdapter
// ────────────────────────────────────────────────────────────────────────────

/// Adapter for Ollama instances.
#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    http: HttpClient,
}

impl OllamaAdapter {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    #[instrument(skip(self, connection), fields(connection = %connection.id))]
    async fn verify(&self, connection: &ProviderConnection) -> Result<VerifyStatus> {
        self.http.probe(connection, &version_url(connection)).await
    }

    #[instrument(skip(self, connection), fields(connection = %connection.id))]
    async fn list_models(
        &self,
        connection: &ProviderConnection,
        origin: usize,
    ) -> Result<Vec<CatalogEntry>> {
        let payload = self.http.fetch_json(connection, &tags_url(connection)).await?;
        let entries = normalize(connection, origin, &payload);
        debug!(count = entries.len(), "listed models");
        Ok(entries)
    }
}

//! OpenAI-compatible provider adapter.
//!
//! Works against the public OpenAI API, Azure OpenAI deployments and the
//! many proxies that speak the same `/models` protocol.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::http::HttpClient;
use super::{CatalogEntry, Origin, ProviderAdapter, ProviderConnection, ProviderKind, VerifyStatus};
use crate::Result;

/// `api-version` sent to Azure when the connection does not set one.
pub const DEFAULT_AZURE_API_VERSION: &str = "2023-03-15-preview";

/// Host whose listings get the non-chat exclusion filter.
const PUBLIC_OPENAI_HOST: &str = "api.openai.com";

/// Substrings marking non-chat model families on the public API.
const EXCLUDED_MODEL_PATTERNS: &[&str] =
    &["babbage", "dall-e", "davinci", "embedding", "tts", "whisper"];

/// Adapter for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    http: HttpClient,
}

impl OpenAiAdapter {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

/// URL of the model listing for `connection`.
pub fn models_url(connection: &ProviderConnection) -> String {
    if connection.azure {
        let version = connection
            .api_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_AZURE_API_VERSION);
        format!("{}/openai/models?api-version={version}", connection.base())
    } else {
        connection.url("models")
    }
}

fn is_public_openai(connection: &ProviderConnection) -> bool {
    connection.base_url.contains(PUBLIC_OPENAI_HOST)
}

fn is_excluded(id: &str) -> bool {
    EXCLUDED_MODEL_PATTERNS.iter().any(|p| id.contains(p))
}

/// Turn a `/models` payload into catalog entries tagged with `origin`.
///
/// Accepts `{ "data": [...] }` or a bare array. When the provider lists
/// nothing and the connection carries an allow-list, one entry per
/// allow-listed id is synthesized.
pub fn normalize(connection: &ProviderConnection, origin: usize, payload: &Value) -> Vec<CatalogEntry> {
    let items = payload
        .get("data")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array())
        .cloned()
        .unwrap_or_default();

    let items = if items.is_empty() && !connection.model_ids.is_empty() {
        connection
            .model_ids
            .iter()
            .map(|id| serde_json::json!({ "id": id, "name": id }))
            .collect()
    } else {
        items
    };

    let filter_public = is_public_openai(connection);
    let connection_type = connection.connection_type_label();

    items
        .into_iter()
        .filter_map(|raw| {
            let Some(id) = raw.get("id").and_then(Value::as_str).map(str::to_owned) else {
                warn!(connection = %connection.id, "skipping model without id");
                return None;
            };
            if filter_public && is_excluded(&id) {
                debug!(model = %id, "excluding non-chat model");
                return None;
            }

            let name = raw
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .unwrap_or(&id)
                .to_string();

            Some(CatalogEntry {
                id: connection.prefixed(&id),
                name,
                owned_by: ProviderKind::OpenAi,
                connection_type: connection_type.clone(),
                origin: Origin::single(origin),
                tags: connection.tags.clone(),
                raw,
            })
        })
        .collect()
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    #[instrument(skip(self, connection), fields(connection = %connection.id))]
    async fn verify(&self, connection: &ProviderConnection) -> Result<VerifyStatus> {
        self.http.probe(connection, &models_url(connection)).await
    }

    #[instrument(skip(self, connection), fields(connection = %connection.id))]
    async fn list_models(
        &self,
        connection: &ProviderConnection,
        origin: usize,
    ) -> Result<Vec<CatalogEntry>> {
        let payload = self.http.fetch_json(connection, &models_url(connection)).await?;
        let entries = normalize(connection, origin, &payload);
        debug!(count = entries.len(), "listed models");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ConnectionForm, ConnectionId};
    use serde_json::json;

    fn connection(form: ConnectionForm) -> ProviderConnection {
        ProviderConnection::from_form(ConnectionId(1), form, 0).unwrap()
    }

    fn ids(entries: &[CatalogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn models_url_plain_and_azure() {
        let plain = connection(ConnectionForm::new(
            ProviderKind::OpenAi,
            "oai",
            "https://api.openai.com/v1/",
        ));
        assert_eq!(models_url(&plain), "https://api.openai.com/v1/models");

        let mut azure = connection(ConnectionForm::new(
            ProviderKind::OpenAi,
            "az",
            "https://corp.openai.azure.com",
        ));
        azure.azure = true;
        assert_eq!(
            models_url(&azure),
            "https://corp.openai.azure.com/openai/models?api-version=2023-03-15-preview"
        );

        azure.api_version = Some("2024-02-01".to_string());
        assert_eq!(
            models_url(&azure),
            "https://corp.openai.azure.com/openai/models?api-version=2024-02-01"
        );
    }

    #[test]
    fn public_endpoint_drops_non_chat_models() {
        let conn = connection(ConnectionForm::new(
            ProviderKind::OpenAi,
            "oai",
            "https://api.openai.com/v1",
        ));
        let payload = json!({"data": [
            {"id": "gpt-4o"},
            {"id": "text-embedding-ada-002"},
            {"id": "whisper-1"},
            {"id": "dall-e-3"},
        ]});

        assert_eq!(ids(&normalize(&conn, 0, &payload)), vec!["gpt-4o"]);
    }

    #[test]
    fn other_endpoints_keep_everything() {
        let conn = connection(ConnectionForm::new(
            ProviderKind::OpenAi,
            "proxy",
            "http://localhost:4000/v1",
        ));
        let payload = json!({"data": [{"id": "gpt-4o"}, {"id": "text-embedding-ada-002"}]});

        assert_eq!(
            ids(&normalize(&conn, 0, &payload)),
            vec!["gpt-4o", "text-embedding-ada-002"]
        );
    }

    #[test]
    fn prefix_and_origin_are_applied() {
        let conn = connection(
            ConnectionForm::new(ProviderKind::OpenAi, "work", "http://proxy.local/v1")
                .prefix("work"),
        );
        let payload = json!({"data": [{"id": "gpt-4", "owned_by": "system"}]});

        let entries = normalize(&conn, 3, &payload);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "work.gpt-4");
        assert_eq!(entries[0].name, "gpt-4");
        assert_eq!(entries[0].origin, Origin::single(3));
        assert_eq!(entries[0].owned_by, ProviderKind::OpenAi);
        assert_eq!(entries[0].connection_type, "external");
        assert_eq!(entries[0].raw["owned_by"], "system");
    }

    #[test]
    fn empty_listing_synthesizes_allow_list() {
        let conn = connection(
            ConnectionForm::new(ProviderKind::OpenAi, "az", "https://corp.example.com")
                .allow(["deployment-a", "deployment-b"]),
        );

        let entries = normalize(&conn, 0, &json!({"data": []}));
        assert_eq!(ids(&entries), vec!["deployment-a", "deployment-b"]);
        assert_eq!(entries[1].name, "deployment-b");
    }

    #[test]
    fn items_without_id_are_skipped_and_order_kept() {
        let conn = connection(ConnectionForm::new(
            ProviderKind::OpenAi,
            "proxy",
            "http://localhost:4000/v1",
        ));
        let payload = json!([{"id": "z"}, {"name": "anonymous"}, {"id": "a", "name": "Alpha"}]);

        let entries = normalize(&conn, 0, &payload);
        assert_eq!(ids(&entries), vec!["z", "a"]);
        assert_eq!(entries[1].name, "Alpha");
    }
}

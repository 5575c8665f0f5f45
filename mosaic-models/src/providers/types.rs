//! Connection descriptors and catalog entries for remote providers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Extensions;
use crate::{Error, Result};

/// Surrogate key of a [`ProviderConnection`], assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Wire protocol spoken by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "ollama")]
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Default `connection_type` label for connections of this kind.
    pub fn default_connection_type(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "external",
            ProviderKind::Ollama => "local",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(Error::Validation(format!("unsupported provider type: {other}"))),
        }
    }
}

/// How the API key is presented to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthType {
    #[default]
    #[serde(rename = "bearer")]
    Bearer,
    /// Send no `Authorization` header.
    #[serde(rename = "none")]
    Disabled,
}

/// A registered remote endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConnection {
    pub id: ConnectionId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub connection_type: Option<String>,
    /// Namespace prefix applied as `"{prefix}.{id}"` to surfaced models.
    #[serde(default)]
    pub prefix_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Allow-list of remote model ids. Empty means no restriction.
    #[serde(default)]
    pub model_ids: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub azure: bool,
    #[serde(default)]
    pub meta: Extensions,
    pub created_at: i64,
    pub updated_at: i64,
}

fn default_true() -> bool {
    true
}

// api_key stays out of logs and panic messages.
impl fmt::Debug for ProviderConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConnection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "[REDACTED]" })
            .field("enable", &self.enable)
            .field("connection_type", &self.connection_type)
            .field("prefix_id", &self.prefix_id)
            .field("tags", &self.tags)
            .field("model_ids", &self.model_ids)
            .field("auth_type", &self.auth_type)
            .field("azure", &self.azure)
            .finish_non_exhaustive()
    }
}

impl ProviderConnection {
    /// Build a connection from a validated form.
    pub fn from_form(id: ConnectionId, form: ConnectionForm, now: i64) -> Result<Self> {
        let kind = form
            .kind
            .ok_or_else(|| Error::Validation("connection type is required".to_string()))?;
        validate_base_url(&form.base_url)?;

        Ok(Self {
            id,
            name: form.name,
            kind,
            base_url: form.base_url,
            api_key: form.api_key,
            enable: form.enable,
            connection_type: form.connection_type,
            prefix_id: form.prefix_id,
            tags: form.tags,
            model_ids: form.model_ids,
            headers: form.headers,
            auth_type: form.auth_type,
            api_version: form.api_version,
            azure: form.azure,
            meta: form.meta,
            created_at: now,
            updated_at: now,
        })
    }

    /// Base URL with any trailing slashes removed.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Join `path` onto the trimmed base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base(), path.trim_start_matches('/'))
    }

    /// Token to send as `Authorization: Bearer`, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        match self.auth_type {
            AuthType::Disabled => None,
            AuthType::Bearer if self.api_key.is_empty() => None,
            AuthType::Bearer => Some(&self.api_key),
        }
    }

    /// Label used on catalog entries, falling back to the kind's default.
    pub fn connection_type_label(&self) -> String {
        self.connection_type
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.kind.default_connection_type().to_string())
    }

    /// Apply the configured prefix to a remote model id.
    pub fn prefixed(&self, id: &str) -> String {
        match self.prefix_id.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}.{id}"),
            _ => id.to_string(),
        }
    }

    /// Merge a patch onto this connection, keeping `id` and `created_at`.
    pub fn apply_patch(&mut self, patch: ConnectionPatch, now: i64) -> Result<()> {
        if let Some(base_url) = &patch.base_url {
            validate_base_url(base_url)?;
        }

        let ConnectionPatch {
            name,
            kind,
            base_url,
            api_key,
            enable,
            connection_type,
            prefix_id,
            tags,
            model_ids,
            headers,
            auth_type,
            api_version,
            azure,
            meta,
        } = patch;

        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = kind {
            self.kind = v;
        }
        if let Some(v) = base_url {
            self.base_url = v;
        }
        if let Some(v) = api_key {
            self.api_key = v;
        }
        if let Some(v) = enable {
            self.enable = v;
        }
        if let Some(v) = connection_type {
            self.connection_type = Some(v);
        }
        if let Some(v) = prefix_id {
            self.prefix_id = Some(v);
        }
        if let Some(v) = tags {
            self.tags = v;
        }
        if let Some(v) = model_ids {
            self.model_ids = v;
        }
        if let Some(v) = headers {
            self.headers = v;
        }
        if let Some(v) = auth_type {
            self.auth_type = v;
        }
        if let Some(v) = api_version {
            self.api_version = Some(v);
        }
        if let Some(v) = azure {
            self.azure = v;
        }
        if let Some(v) = meta {
            self.meta = v;
        }
        self.updated_at = now;
        Ok(())
    }
}

fn validate_base_url(base_url: &str) -> Result<()> {
    if base_url.trim().is_empty() {
        return Err(Error::Validation("base_url is required".to_string()));
    }
    reqwest::Url::parse(base_url)
        .map_err(|e| Error::Validation(format!("invalid base_url {base_url:?}: {e}")))?;
    Ok(())
}

/// Create payload for a connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionForm {
    #[serde(default)]
    pub name: String,
    /// Required; `None` is rejected on create.
    #[serde(rename = "type", default)]
    pub kind: Option<ProviderKind>,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub connection_type: Option<String>,
    #[serde(default)]
    pub prefix_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub model_ids: Vec<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub azure: bool,
    #[serde(default)]
    pub meta: Extensions,
}

impl ConnectionForm {
    pub fn new(kind: ProviderKind, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
            base_url: base_url.into(),
            enable: true,
            ..Default::default()
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix_id = Some(prefix.into());
        self
    }

    pub fn allow<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.model_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enable = false;
        self
    }
}

/// Partial update for a connection. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Extensions>,
}

// ────────────────────────────────────────────────────────────────────────────
// Catalog entries
// ────────────────────────────────────────────────────────────────────────────

/// Which connections, by position in the connection list, expose an entry.
///
/// Entries seen once carry a bare index. A repeat promotes it to a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Origin {
    Single { url_idx: usize },
    Merged { urls: Vec<usize> },
}

impl Origin {
    pub fn single(index: usize) -> Self {
        Origin::Single { url_idx: index }
    }

    /// Record another connection index, promoting a bare index to a list.
    ///
    /// Indices already present are ignored.
    pub fn push(&mut self, index: usize) {
        match self {
            Origin::Single { url_idx } => {
                if *url_idx != index {
                    *self = Origin::Merged {
                        urls: vec![*url_idx, index],
                    };
                }
            }
            Origin::Merged { urls } => {
                if !urls.contains(&index) {
                    urls.push(index);
                }
            }
        }
    }

    /// Origin indices in insertion order.
    pub fn indices(&self) -> Vec<usize> {
        match self {
            Origin::Single { url_idx } => vec![*url_idx],
            Origin::Merged { urls } => urls.clone(),
        }
    }

    /// The first connection that exposed the entry.
    pub fn first(&self) -> usize {
        match self {
            Origin::Single { url_idx } => *url_idx,
            Origin::Merged { urls } => urls.first().copied().unwrap_or_default(),
        }
    }
}

/// A provider-agnostic model descriptor produced by listing or aggregation.
///
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Model id after prefixing.
    pub id: String,
    pub name: String,
    pub owned_by: ProviderKind,
    pub connection_type: String,
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Provider-native payload for this model.
    pub raw: serde_json::Value,
}

/// Reachability report returned by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyStatus {
    pub status: u16,
    pub status_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(form: ConnectionForm) -> ProviderConnection {
        ProviderConnection::from_form(ConnectionId(1), form, 100).unwrap()
    }

    #[test]
    fn create_requires_type() {
        let form = ConnectionForm {
            base_url: "http://localhost:11434".to_string(),
            ..Default::default()
        };
        let err = ProviderConnection::from_form(ConnectionId(1), form, 0).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn create_rejects_unparseable_base_url() {
        let form = ConnectionForm::new(ProviderKind::OpenAi, "bad", "not a url");
        let err = ProviderConnection::from_form(ConnectionId(1), form, 0).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn url_trims_trailing_slash() {
        let conn = connection(ConnectionForm::new(
            ProviderKind::OpenAi,
            "oai",
            "https://api.openai.com/v1/",
        ));
        assert_eq!(conn.url("/models"), "https://api.openai.com/v1/models");
    }

    #[test]
    fn prefix_applies_with_dot() {
        let conn = connection(
            ConnectionForm::new(ProviderKind::OpenAi, "work", "http://proxy.local/v1")
                .prefix("work"),
        );
        assert_eq!(conn.prefixed("gpt-4"), "work.gpt-4");

        let plain = connection(ConnectionForm::new(
            ProviderKind::OpenAi,
            "plain",
            "http://proxy.local/v1",
        ));
        assert_eq!(plain.prefixed("gpt-4"), "gpt-4");
    }

    #[test]
    fn bearer_token_respects_auth_type_and_empty_key() {
        let mut conn = connection(
            ConnectionForm::new(ProviderKind::OpenAi, "oai", "http://proxy.local/v1")
                .api_key("sk-test"),
        );
        assert_eq!(conn.bearer_token(), Some("sk-test"));

        conn.auth_type = AuthType::Disabled;
        assert_eq!(conn.bearer_token(), None);

        conn.auth_type = AuthType::Bearer;
        conn.api_key.clear();
        assert_eq!(conn.bearer_token(), None);
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let mut conn = connection(
            ConnectionForm::new(ProviderKind::Ollama, "local", "http://localhost:11434")
                .prefix("home"),
        );
        let patch = ConnectionPatch {
            name: Some("renamed".to_string()),
            enable: Some(false),
            ..Default::default()
        };

        conn.apply_patch(patch, 200).unwrap();

        assert_eq!(conn.id, ConnectionId(1));
        assert_eq!(conn.name, "renamed");
        assert!(!conn.enable);
        assert_eq!(conn.prefix_id.as_deref(), Some("home"));
        assert_eq!(conn.created_at, 100);
        assert_eq!(conn.updated_at, 200);
    }

    #[test]
    fn patch_with_bad_url_leaves_connection_untouched() {
        let mut conn = connection(ConnectionForm::new(
            ProviderKind::Ollama,
            "local",
            "http://localhost:11434",
        ));
        let before = conn.clone();
        let patch = ConnectionPatch {
            name: Some("renamed".to_string()),
            base_url: Some("::::".to_string()),
            ..Default::default()
        };

        assert!(conn.apply_patch(patch, 200).is_err());
        assert_eq!(conn, before);
    }

    #[test]
    fn debug_redacts_api_key() {
        let conn = connection(
            ConnectionForm::new(ProviderKind::OpenAi, "oai", "http://proxy.local/v1")
                .api_key("sk-secret"),
        );
        let debug = format!("{conn:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn origin_promotes_and_dedups() {
        let mut origin = Origin::single(0);
        origin.push(0);
        assert_eq!(origin, Origin::single(0));

        origin.push(2);
        origin.push(1);
        origin.push(2);
        assert_eq!(origin.indices(), vec![0, 2, 1]);
        assert_eq!(origin.first(), 0);
    }

    #[test]
    fn catalog_entry_flattens_origin() {
        let entry = CatalogEntry {
            id: "m1".to_string(),
            name: "m1".to_string(),
            owned_by: ProviderKind::Ollama,
            connection_type: "local".to_string(),
            origin: Origin::Merged { urls: vec![0, 1] },
            tags: vec![],
            raw: serde_json::json!({"model": "m1"}),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["urls"], serde_json::json!([0, 1]));
        assert_eq!(json["owned_by"], "ollama");

        let back: CatalogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.origin, entry.origin);
    }
}

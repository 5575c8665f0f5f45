//! Core types for locally registered models.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Free-form extension map carried on metadata and connections.
pub type Extensions = serde_json::Map<String, serde_json::Value>;

/// Longest model id accepted on create or import.
pub const MAX_MODEL_ID_LEN: usize = 256;

/// Grant list for a single permission kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    #[serde(default)]
    pub user_ids: BTreeSet<String>,
    #[serde(default)]
    pub group_ids: BTreeSet<String>,
}

impl AccessRule {
    /// Create a rule granting the given users.
    pub fn users<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_ids: ids.into_iter().map(Into::into).collect(),
            group_ids: BTreeSet::new(),
        }
    }

    /// Create a rule granting the given groups.
    pub fn groups<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_ids: BTreeSet::new(),
            group_ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Row-level read/write grants embedded in a [`ModelRecord`].
///
/// A missing rule denies that permission to everyone except the owner and
/// administrators. A record with no `AccessControl` at all is open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<AccessRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<AccessRule>,
}

/// Options understood by Ollama's `options` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OllamaOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_batch: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_keep: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_thread: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_gpu: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_last_n: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirostat: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirostat_eta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirostat_tau: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_mmap: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_mlock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub think: Option<bool>,
}

/// Inference parameters stored with a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub logit_bias: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
    /// Ollama-specific options.
    #[serde(default, skip_serializing_if = "is_default")]
    pub ollama: OllamaOptions,
    /// Parameters passed through to the provider verbatim.
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub custom_params: Extensions,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// A user-defined label attached to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Presentation metadata for a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Capability flags such as `vision` or `citations`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extra: Extensions,
}

/// A model definition owned by the local registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Primary key, immutable after creation.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// `None` marks a base model, which is excluded from the user-facing list.
    pub base_model_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub params: ModelParams,
    #[serde(default)]
    pub meta: ModelMeta,
    /// `None` means open access.
    #[serde(default)]
    pub access_control: Option<AccessControl>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds.
    pub updated_at: i64,
}

fn default_true() -> bool {
    true
}

impl ModelRecord {
    /// Whether this is a base model (no `base_model_id`).
    pub fn is_base(&self) -> bool {
        self.base_model_id.is_none()
    }

    /// Case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.meta.tags.iter().any(|t| t.name.to_lowercase() == tag)
    }

    /// Case-insensitive substring match on name or id.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query) || self.id.to_lowercase().contains(&query)
    }

    /// Build a fresh record from a form, stamped at `now`.
    pub fn from_form(form: ModelForm, owner: &str, now: i64) -> Self {
        Self {
            user_id: form.user_id.unwrap_or_else(|| owner.to_string()),
            id: form.id,
            base_model_id: form.base_model_id,
            name: form.name,
            params: form.params,
            meta: form.meta,
            access_control: form.access_control,
            is_active: form.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace every mutable field from `form`, keeping `id` and `created_at`.
    ///
    /// The owner is only replaced when the form names one.
    pub fn apply_form(&mut self, form: ModelForm, now: i64) {
        if let Some(user_id) = form.user_id {
            self.user_id = user_id;
        }
        self.base_model_id = form.base_model_id;
        self.name = form.name;
        self.params = form.params;
        self.meta = form.meta;
        self.access_control = form.access_control;
        self.is_active = form.is_active;
        self.updated_at = now;
    }
}

/// Create/update/import payload for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelForm {
    pub id: String,
    #[serde(default)]
    pub base_model_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub meta: ModelMeta,
    #[serde(default)]
    pub params: ModelParams,
    #[serde(default)]
    pub access_control: Option<AccessControl>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Owner; defaults to the caller when absent.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ModelForm {
    /// Create a minimal form for a derived model.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_model_id: None,
            name: name.into(),
            meta: ModelMeta::default(),
            params: ModelParams::default(),
            access_control: None,
            is_active: true,
            user_id: None,
        }
    }

    /// Set the base model.
    pub fn base(mut self, base_model_id: impl Into<String>) -> Self {
        self.base_model_id = Some(base_model_id.into());
        self
    }

    /// Attach access control.
    pub fn access(mut self, access: AccessControl) -> Self {
        self.access_control = Some(access);
        self
    }

    /// Add a tag.
    pub fn tag(mut self, name: impl Into<String>) -> Self {
        self.meta.tags.push(Tag::new(name));
        self
    }

    /// Set the owner.
    pub fn owner(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

impl From<ModelRecord> for ModelForm {
    fn from(record: ModelRecord) -> Self {
        Self {
            id: record.id,
            base_model_id: record.base_model_id,
            name: record.name,
            meta: record.meta,
            params: record.params,
            access_control: record.access_control,
            is_active: record.is_active,
            user_id: Some(record.user_id),
        }
    }
}

/// One item of a batch import, kept as the raw JSON object.
///
/// Importing over an existing id only overwrites the keys the item
/// carries; everything it leaves out keeps its stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelImport(pub Extensions);

impl ModelImport {
    /// The item's `id`, or `""` when missing or not a string.
    pub fn id(&self) -> &str {
        self.0.get("id").and_then(Value::as_str).unwrap_or_default()
    }

    /// Parse the item as a complete form for a new model.
    pub fn into_form(self) -> Result<ModelForm> {
        let id = self.id().to_string();
        serde_json::from_value(Value::Object(self.0))
            .map_err(|e| Error::Validation(format!("import item {id}: {e}")))
    }

    /// Overlay the item's keys onto `existing` and parse the result.
    pub fn merge_onto(self, existing: &ModelRecord) -> Result<ModelForm> {
        let invalid =
            |e: serde_json::Error| Error::Validation(format!("import item {}: {e}", existing.id));

        let stored = serde_json::to_value(ModelForm::from(existing.clone())).map_err(invalid)?;
        let mut merged = match stored {
            Value::Object(map) => map,
            _ => Extensions::new(),
        };
        merged.extend(self.0);
        serde_json::from_value(Value::Object(merged)).map_err(invalid)
    }
}

impl From<ModelForm> for ModelImport {
    fn from(form: ModelForm) -> Self {
        match serde_json::to_value(form) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_from_form_defaults_owner_and_stamps_times() {
        let form = ModelForm::new("helper", "Helper").base("llama3");
        let record = ModelRecord::from_form(form, "alice", 1_700_000_000);

        assert_eq!(record.user_id, "alice");
        assert_eq!(record.created_at, 1_700_000_000);
        assert_eq!(record.updated_at, 1_700_000_000);
        assert!(!record.is_base());
        assert!(record.is_active);
    }

    #[test]
    fn apply_form_preserves_id_and_creation_time() {
        let mut record = ModelRecord::from_form(ModelForm::new("m1", "One"), "alice", 100);
        let form = ModelForm::new("ignored", "Renamed").base("gpt-4o");

        record.apply_form(form, 250);

        assert_eq!(record.id, "m1");
        assert_eq!(record.name, "Renamed");
        assert_eq!(record.user_id, "alice");
        assert_eq!(record.created_at, 100);
        assert_eq!(record.updated_at, 250);
    }

    #[test]
    fn tag_and_query_matching_ignore_case() {
        let record = ModelRecord::from_form(
            ModelForm::new("Coder-Pro", "Code Assistant").tag("Coding"),
            "alice",
            1,
        );

        assert!(record.has_tag("coding"));
        assert!(!record.has_tag("writing"));
        assert!(record.matches_query("assist"));
        assert!(record.matches_query("coder"));
        assert!(!record.matches_query("chat"));
    }

    #[test]
    fn record_deserializes_with_missing_optional_sections() {
        let json = r#"{
            "id": "m1",
            "user_id": "u1",
            "base_model_id": "llama3",
            "name": "Model One",
            "created_at": 10,
            "updated_at": 20
        }"#;

        let record: ModelRecord = serde_json::from_str(json).unwrap();
        assert!(record.access_control.is_none());
        assert!(record.is_active);
        assert!(record.meta.tags.is_empty());
        assert_eq!(record.params, ModelParams::default());
    }

    #[test]
    fn access_control_uses_snake_case_keys() {
        let access = AccessControl {
            read: Some(AccessRule::groups(["eng"])),
            write: None,
        };
        let json = serde_json::to_string(&access).unwrap();
        assert_eq!(json, r#"{"read":{"user_ids":[],"group_ids":["eng"]}}"#);
    }

    #[test]
    fn params_skip_unset_fields() {
        let params = ModelParams {
            temperature: Some(0.2),
            ollama: OllamaOptions {
                num_ctx: Some(8192),
                ..Default::default()
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"temperature": 0.2, "ollama": {"num_ctx": 8192}})
        );
    }

    fn import_item(json: serde_json::Value) -> ModelImport {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn import_merge_keeps_keys_the_item_omits() {
        let existing = ModelRecord::from_form(
            ModelForm::new("m1", "One")
                .base("llama3")
                .access(AccessControl {
                    read: Some(AccessRule::users(["bob"])),
                    write: None,
                }),
            "alice",
            100,
        );

        let form = import_item(serde_json::json!({"id": "m1", "name": "Renamed"}))
            .merge_onto(&existing)
            .unwrap();

        assert_eq!(form.name, "Renamed");
        assert_eq!(form.base_model_id.as_deref(), Some("llama3"));
        assert_eq!(form.access_control, existing.access_control);
        assert_eq!(form.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn import_merge_applies_explicit_null() {
        let existing = ModelRecord::from_form(
            ModelForm::new("m1", "One").access(AccessControl::default()),
            "alice",
            100,
        );

        let form = import_item(serde_json::json!({"id": "m1", "access_control": null}))
            .merge_onto(&existing)
            .unwrap();
        assert!(form.access_control.is_none());
    }

    #[test]
    fn import_item_without_name_is_not_a_complete_form() {
        let item = import_item(serde_json::json!({"id": "fresh"}));
        assert_eq!(item.id(), "fresh");
        assert!(matches!(item.into_form(), Err(Error::Validation(_))));
    }

    #[test]
    fn import_item_id_defaults_to_empty() {
        assert_eq!(import_item(serde_json::json!({"id": 7})).id(), "");
        assert_eq!(ModelImport::default().id(), "");
    }
}

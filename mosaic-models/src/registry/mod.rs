//! Registry of locally owned model definitions.
//!
//! Every operation takes the [`Caller`] explicitly. Administrators and
//! owners bypass row-level grants; everyone else goes through
//! [`has_access`].

mod filter;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

pub use filter::{Direction, ModelFilter, OrderBy, PAGE_SIZE, ViewOption, page_count};

use crate::auth::{Caller, Permission, has_access};
use crate::store::{ModelStore, StoreError};
use crate::types::{MAX_MODEL_ID_LEN, ModelForm, ModelImport, ModelRecord};
use crate::{Error, Result, unix_now};

/// One page of a model listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPage {
    pub items: Vec<ModelRecord>,
    /// Matches across all pages.
    pub total: usize,
}

/// Outcome counts of [`ModelRegistry::import`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::Validation("model id must not be empty".to_string()));
    }
    if id.chars().count() > MAX_MODEL_ID_LEN {
        return Err(Error::Validation(format!(
            "model id exceeds {MAX_MODEL_ID_LEN} characters"
        )));
    }
    Ok(())
}

fn authorize(caller: &Caller, record: &ModelRecord, permission: Permission) -> Result<()> {
    if caller.is_admin()
        || caller.owns(&record.user_id)
        || has_access(caller, record.access_control.as_ref(), permission)
    {
        Ok(())
    } else {
        Err(Error::Forbidden(format!("model {}", record.id)))
    }
}

/// CRUD, listing and bulk operations over [`ModelRecord`]s.
#[derive(Clone)]
pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }

    async fn load(&self, id: &str) -> Result<ModelRecord> {
        self.store
            .get_model(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("model {id}")))
    }

    async fn save(&self, record: ModelRecord) -> Result<ModelRecord> {
        let id = record.id.clone();
        self.store.update_model(record).await.map_err(|e| match e {
            StoreError::Missing(_) => Error::NotFound(format!("model {id}")),
            other => other.into(),
        })
    }

    /// Derived models visible to `caller`, filtered, sorted and paged.
    ///
    /// Base models never appear here; see [`list_base`](Self::list_base).
    pub async fn list(&self, caller: &Caller, filter: &ModelFilter) -> Result<ModelPage> {
        let mut records: Vec<_> = self
            .store
            .list_models()
            .await?
            .into_iter()
            .filter(|r| !r.is_base())
            .filter(|r| filter.matches(caller, r))
            .filter(|r| filter::visible_in_listing(caller, r))
            .collect();

        filter.sort(&mut records);
        let total = records.len();
        Ok(ModelPage {
            items: filter.paginate(records),
            total,
        })
    }

    /// Every base model, unfiltered.
    pub async fn list_base(&self) -> Result<Vec<ModelRecord>> {
        Ok(self
            .store
            .list_models()
            .await?
            .into_iter()
            .filter(ModelRecord::is_base)
            .collect())
    }

    /// Distinct non-empty tag names across all models, sorted.
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        let tags: BTreeSet<String> = self
            .store
            .list_models()
            .await?
            .into_iter()
            .flat_map(|r| r.meta.tags)
            .map(|t| t.name)
            .filter(|name| !name.is_empty())
            .collect();
        Ok(tags.into_iter().collect())
    }

    /// Create a model. Fails with [`Error::Conflict`] if the id is taken.
    #[instrument(skip(self, caller, form), fields(id = %form.id, caller = %caller.id))]
    pub async fn create(&self, caller: &Caller, form: ModelForm) -> Result<ModelRecord> {
        validate_id(&form.id)?;
        if self.store.get_model(&form.id).await?.is_some() {
            return Err(Error::Conflict(format!("model {}", form.id)));
        }

        let record = ModelRecord::from_form(form, &caller.id, unix_now());
        let record = self.store.insert_model(record).await.map_err(|e| match e {
            StoreError::Duplicate(id) => Error::Conflict(format!("model {id}")),
            other => other.into(),
        })?;
        info!("model created");
        Ok(record)
    }

    /// Admins get every model; others get what they own.
    pub async fn export(&self, caller: &Caller) -> Result<Vec<ModelRecord>> {
        Ok(self
            .store
            .list_models()
            .await?
            .into_iter()
            .filter(|r| caller.is_admin() || caller.owns(&r.user_id))
            .collect())
    }

    /// Batch upsert. Items whose id is empty or too long are skipped.
    ///
    /// An item whose id already exists is merged onto the stored model:
    /// keys it carries overwrite, keys it leaves out are kept. Stops at the
    /// first item that fails to parse or write; items written before it
    /// stay written.
    #[instrument(skip(self, caller, items), fields(count = items.len(), caller = %caller.id))]
    pub async fn import(&self, caller: &Caller, items: Vec<ModelImport>) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for item in items {
            if let Err(e) = validate_id(item.id()) {
                debug!(error = %e, "skipping import item");
                summary.skipped += 1;
                continue;
            }

            let now = unix_now();
            let stored = self.store.get_model(item.id()).await?;
            match stored {
                Some(mut existing) => {
                    let form = item.merge_onto(&existing)?;
                    existing.apply_form(form, now);
                    self.save(existing).await?;
                    summary.updated += 1;
                }
                None => {
                    let record = ModelRecord::from_form(item.into_form()?, &caller.id, now);
                    self.store.insert_model(record).await?;
                    summary.created += 1;
                }
            }
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            "import complete"
        );
        Ok(summary)
    }

    /// Replace the entire model collection with `forms`.
    ///
    /// **Destructive.** Every supplied model is upserted with its owner forced
    /// to `caller`, then every stored model whose id is not in `forms` is
    /// deleted. An empty `forms` deletes the whole collection. Use
    /// [`import`](Self::import) for a non-destructive merge.
    ///
    /// Returns the collection as it stands afterwards.
    #[instrument(skip(self, caller, forms), fields(count = forms.len(), caller = %caller.id))]
    pub async fn sync_replace(&self, caller: &Caller, forms: Vec<ModelForm>) -> Result<Vec<ModelRecord>> {
        for form in &forms {
            validate_id(&form.id)?;
        }

        let now = unix_now();
        let mut keep = BTreeSet::new();
        for mut form in forms {
            form.user_id = Some(caller.id.clone());
            keep.insert(form.id.clone());
            self.store
                .upsert_model(ModelRecord::from_form(form, &caller.id, now))
                .await?;
        }

        let deleted = self.store.retain_models(&keep).await?;
        if keep.is_empty() && deleted > 0 {
            warn!(deleted, "sync with empty payload cleared every model");
        } else {
            info!(upserted = keep.len(), deleted, "sync complete");
        }

        Ok(self.store.list_models().await?)
    }

    /// Fetch a model the caller may read.
    pub async fn get(&self, caller: &Caller, id: &str) -> Result<ModelRecord> {
        let record = self.load(id).await?;
        authorize(caller, &record, Permission::Read)?;
        Ok(record)
    }

    /// Flip `is_active` on a model the caller may write.
    #[instrument(skip(self, caller), fields(caller = %caller.id))]
    pub async fn toggle(&self, caller: &Caller, id: &str) -> Result<ModelRecord> {
        let mut record = self.load(id).await?;
        authorize(caller, &record, Permission::Write)?;

        record.is_active = !record.is_active;
        record.updated_at = unix_now();
        let record = self.save(record).await?;
        info!(active = record.is_active, "model toggled");
        Ok(record)
    }

    /// Replace every mutable field. `id` and `created_at` are kept.
    #[instrument(skip(self, caller, form), fields(caller = %caller.id))]
    pub async fn update(&self, caller: &Caller, id: &str, form: ModelForm) -> Result<ModelRecord> {
        let mut record = self.load(id).await?;
        authorize(caller, &record, Permission::Write)?;

        record.apply_form(form, unix_now());
        let record = self.save(record).await?;
        info!("model updated");
        Ok(record)
    }

    #[instrument(skip(self, caller), fields(caller = %caller.id))]
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<()> {
        let record = self.load(id).await?;
        authorize(caller, &record, Permission::Write)?;

        if !self.store.delete_model(id).await? {
            return Err(Error::NotFound(format!("model {id}")));
        }
        info!("model deleted");
        Ok(())
    }

    /// Delete every model. Restricting this to administrators is the
    /// caller's job.
    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<usize> {
        let count = self.store.delete_all_models().await?;
        info!(count, "all models deleted");
        Ok(count)
    }
}

//! Provider adapters and connection types.
//!
//! The [`ProviderAdapter`] trait is the seam between the catalog and each
//! remote protocol. One adapter exists per [`ProviderKind`]; adding a new
//! protocol means adding an adapter and registering it in [`Adapters`].
//!
//! # Example
//!
//! ```ignore
//! use mosaic_models::config::CatalogConfig;
//! use mosaic_models::providers::Adapters;
//!
//! let adapters = Adapters::http(&CatalogConfig::default())?;
//! let adapter = adapters.get(connection.kind)?;
//! let entries = adapter.list_models(&connection, 0).await?;
//! ```

mod http;
mod types;

pub mod ollama;
pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

pub use http::HttpClient;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use types::*;

use crate::config::CatalogConfig;
use crate::{Error, Result};

/// Protocol-specific verification and model listing.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The connection type this adapter serves.
    fn kind(&self) -> ProviderKind;

    /// Check that the endpoint answers with a success status.
    async fn verify(&self, connection: &ProviderConnection) -> Result<VerifyStatus>;

    /// List the connection's models, each tagged with origin index `origin`.
    ///
    /// Entries come back in provider order.
    async fn list_models(
        &self,
        connection: &ProviderConnection,
        origin: usize,
    ) -> Result<Vec<CatalogEntry>>;
}

/// The set of adapters available to the catalog, keyed by kind.
#[derive(Clone, Default)]
pub struct Adapters {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl Adapters {
    /// An empty set. Every lookup fails until adapters are added.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The real HTTP adapters for every supported kind, sharing one client.
    pub fn http(config: &CatalogConfig) -> Result<Self> {
        let http = HttpClient::new(config)?;
        Ok(Self::empty()
            .with(Arc::new(OpenAiAdapter::new(http.clone())))
            .with(Arc::new(OllamaAdapter::new(http))))
    }

    /// Add or replace the adapter for its kind.
    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Result<&Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&kind)
            .ok_or_else(|| Error::Validation(format!("no adapter registered for type {kind}")))
    }
}

impl std::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.adapters.keys().collect();
        kinds.sort();
        f.debug_struct("Adapters").field("kinds", &kinds).finish()
    }
}

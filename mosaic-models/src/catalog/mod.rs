//! Catalog aggregation across every registered connection.
//!
//! Connections are fetched concurrently, up to
//! [`CatalogConfig::max_concurrency`] at a time. Merging starts only after
//! every fetch has finished, and the merged catalog is sorted by id, so the
//! degree of concurrency never shows in the output.
//!
//! # Example
//!
//! ```ignore
//! use tokio_util::sync::CancellationToken;
//!
//! let catalog = CatalogService::new(connections, Adapters::http(&config)?, config);
//! let entries = catalog.aggregate(&CancellationToken::new()).await?;
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::future::Future;

use futures_util::{StreamExt, TryStreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::CatalogConfig;
use crate::connections::ConnectionRegistry;
use crate::providers::{Adapters, CatalogEntry, ConnectionId, ProviderConnection, VerifyStatus};
use crate::{Error, Result};

/// A connection that failed during [`CatalogService::aggregate_lenient`].
#[derive(Debug)]
pub struct ConnectionFailure {
    /// Position in the connection list.
    pub index: usize,
    pub connection_id: ConnectionId,
    pub error: Error,
}

/// Partial catalog plus the connections that could not be listed.
#[derive(Debug, Default)]
pub struct LenientCatalog {
    pub entries: Vec<CatalogEntry>,
    pub failures: Vec<ConnectionFailure>,
}

/// Collapse entries sharing an id into one, accumulating origin indices.
///
/// The first occurrence seeds the entry; later ones only contribute their
/// origins, in scan order. Output is sorted ascending by id.
pub fn merge<I>(batches: I) -> Vec<CatalogEntry>
where
    I: IntoIterator<Item = Vec<CatalogEntry>>,
{
    let mut merged: BTreeMap<String, CatalogEntry> = BTreeMap::new();

    for entry in batches.into_iter().flatten() {
        match merged.entry(entry.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                for index in entry.origin.indices() {
                    existing.origin.push(index);
                }
            }
        }
    }

    merged.into_values().collect()
}

/// Race `fut` against `cancel`. Dropping `fut` aborts its in-flight requests.
async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("catalog request cancelled");
            Err(Error::cancelled())
        }
        result = fut => result,
    }
}

/// Builds catalogs from the connection registry and provider adapters.
#[derive(Clone)]
pub struct CatalogService {
    connections: ConnectionRegistry,
    adapters: Adapters,
    config: CatalogConfig,
}

impl CatalogService {
    pub fn new(connections: ConnectionRegistry, adapters: Adapters, config: CatalogConfig) -> Self {
        Self {
            connections,
            adapters,
            config,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    async fn fetch(&self, index: usize, connection: &ProviderConnection) -> Result<Vec<CatalogEntry>> {
        if self.config.skip_disabled && !connection.enable {
            debug!(index, connection = %connection.id, "skipping disabled connection");
            return Ok(Vec::new());
        }
        let adapter = self.adapters.get(connection.kind)?;
        adapter.list_models(connection, index).await
    }

    /// Merged catalog across all connections.
    ///
    /// Fails fast: if any connection errors, that error is returned and no
    /// catalog is produced. When several fail, the one with the lowest
    /// index is reported. Outstanding fetches are dropped.
    #[instrument(skip(self, cancel))]
    pub async fn aggregate(&self, cancel: &CancellationToken) -> Result<Vec<CatalogEntry>> {
        let connections = self.connections.list().await?;

        let batches: Vec<Vec<CatalogEntry>> = cancellable(cancel, async {
            stream::iter(connections.iter().enumerate())
                .map(|(index, connection)| async move {
                    self.fetch(index, connection).await.inspect_err(|e| {
                        warn!(index, connection = %connection.id, error = %e, "connection listing failed");
                    })
                })
                .buffered(self.config.concurrency())
                .try_collect::<Vec<_>>()
                .await
        })
        .await?;

        let entries = merge(batches);
        info!(connections = connections.len(), models = entries.len(), "catalog aggregated");
        Ok(entries)
    }

    /// Merged catalog across the connections that answered.
    ///
    /// Failing connections are reported in [`LenientCatalog::failures`]
    /// instead of aborting. Store errors and cancellation still fail the
    /// whole call.
    #[instrument(skip(self, cancel))]
    pub async fn aggregate_lenient(&self, cancel: &CancellationToken) -> Result<LenientCatalog> {
        let connections = self.connections.list().await?;

        let results: Vec<Result<Vec<CatalogEntry>>> = cancellable(cancel, async {
            Ok(stream::iter(connections.iter().enumerate())
                .map(|(index, connection)| self.fetch(index, connection))
                .buffered(self.config.concurrency())
                .collect::<Vec<_>>()
                .await)
        })
        .await?;

        let mut batches = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for ((index, connection), result) in connections.iter().enumerate().zip(results) {
            match result {
                Ok(batch) => batches.push(batch),
                Err(error) => {
                    warn!(index, connection = %connection.id, error = %error, "connection listing failed");
                    failures.push(ConnectionFailure {
                        index,
                        connection_id: connection.id,
                        error,
                    });
                }
            }
        }

        let entries = merge(batches);
        info!(
            models = entries.len(),
            failed = failures.len(),
            "lenient catalog aggregated"
        );
        Ok(LenientCatalog { entries, failures })
    }

    /// One connection's models in provider order, without merging.
    ///
    /// Entries carry the connection's position in the connection list. The
    /// `enable` flag is ignored.
    #[instrument(skip(self, cancel))]
    pub async fn fetch_connection_models(
        &self,
        id: ConnectionId,
        cancel: &CancellationToken,
    ) -> Result<Vec<CatalogEntry>> {
        let (index, connection) = self.connections.get_indexed(id).await?;
        let adapter = self.adapters.get(connection.kind)?;
        cancellable(cancel, adapter.list_models(&connection, index)).await
    }

    /// Check that a connection's endpoint is reachable.
    #[instrument(skip(self, cancel))]
    pub async fn verify_connection(
        &self,
        id: ConnectionId,
        cancel: &CancellationToken,
    ) -> Result<VerifyStatus> {
        let connection = self.connections.get(id).await?;
        let adapter = self.adapters.get(connection.kind)?;
        let status = cancellable(cancel, adapter.verify(&connection)).await?;
        info!(status = status.status, "connection verified");
        Ok(status)
    }
}

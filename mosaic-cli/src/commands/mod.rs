//! Subcommand implementations.

pub mod catalog;
pub mod connections;
pub mod models;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use mosaic_models::auth::Caller;
use mosaic_models::providers::Adapters;
use mosaic_models::store::FileStore;
use mosaic_models::{CatalogService, ConnectionRegistry, ModelRegistry};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::MosaicConfig;

/// Everything a command needs, wired from config.
pub struct Context {
    pub caller: Caller,
    pub models: ModelRegistry,
    pub connections: ConnectionRegistry,
    pub catalog: CatalogService,
}

impl Context {
    /// Open the configured store and build the registries on top of it.
    pub async fn open(config: &MosaicConfig, caller: Caller) -> Result<Self> {
        let store = Arc::new(
            FileStore::open(&config.store.path)
                .await
                .with_context(|| format!("opening store {}", config.store.path.display()))?,
        );
        debug!(path = %config.store.path.display(), caller = %caller.id, "store opened");

        let connections = ConnectionRegistry::new(store.clone());
        let adapters = Adapters::http(&config.catalog)?;

        Ok(Self {
            caller,
            models: ModelRegistry::new(store),
            catalog: CatalogService::new(connections.clone(), adapters, config.catalog.clone()),
            connections,
        })
    }
}

/// A token cancelled when the user hits Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read JSON from `path`, or from stdin when `path` is `-`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        s.to_string()
    }
}

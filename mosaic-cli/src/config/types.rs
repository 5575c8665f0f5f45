use mosaic_models::config::CatalogConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawMosaicConfig {
    #[serde(default)]
    pub store: RawStoreConfig,

    #[serde(default)]
    pub catalog: RawCatalogConfig,
}

/// Store config as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawStoreConfig {
    /// Location of the JSON store document
    pub path: Option<PathBuf>,
}

/// Catalog config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCatalogConfig {
    pub verify_timeout_secs: Option<u64>,
    pub list_timeout_secs: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub skip_disabled: Option<bool>,
    pub user_agent: Option<String>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MosaicConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Location of the JSON store document
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// File name of the store document inside the data directory
pub const STORE_FILE_NAME: &str = "store.json";

/// Platform data directory, falling back to the project directory
pub fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "mosaic")
        .map(|dirs| dirs.data_dir().join(STORE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(".mosaic").join(STORE_FILE_NAME))
}

use super::types::{MosaicConfig, RawCatalogConfig, RawMosaicConfig, RawStoreConfig, StoreConfig};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use mosaic_models::config::CatalogConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + explicit file)
    pub fn load(explicit: Option<&Path>) -> Result<MosaicConfig> {
        let mut raw = RawMosaicConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        // Layer 3: --config
        if let Some(path) = explicit {
            raw = Self::merge_raw(raw, Self::read_raw(path)?);
        }

        // Convert to final config with defaults applied
        Ok(Self::finalize(raw))
    }

    fn read_raw(path: &Path) -> Result<RawMosaicConfig> {
        debug!(path = %path.display(), "reading config layer");
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mosaic").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with MOSAIC_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("MOSAIC_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".mosaic/config.toml")
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawMosaicConfig, overlay: RawMosaicConfig) -> RawMosaicConfig {
        RawMosaicConfig {
            store: RawStoreConfig {
                path: overlay.store.path.or(base.store.path),
            },
            catalog: RawCatalogConfig {
                verify_timeout_secs: overlay
                    .catalog
                    .verify_timeout_secs
                    .or(base.catalog.verify_timeout_secs),
                list_timeout_secs: overlay
                    .catalog
                    .list_timeout_secs
                    .or(base.catalog.list_timeout_secs),
                max_concurrency: overlay
                    .catalog
                    .max_concurrency
                    .or(base.catalog.max_concurrency),
                skip_disabled: overlay.catalog.skip_disabled.or(base.catalog.skip_disabled),
                user_agent: overlay.catalog.user_agent.or(base.catalog.user_agent),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawMosaicConfig) -> MosaicConfig {
        let defaults = CatalogConfig::default();
        MosaicConfig {
            store: raw
                .store
                .path
                .map(|path| StoreConfig { path })
                .unwrap_or_default(),
            catalog: CatalogConfig {
                verify_timeout_secs: raw
                    .catalog
                    .verify_timeout_secs
                    .unwrap_or(defaults.verify_timeout_secs),
                list_timeout_secs: raw
                    .catalog
                    .list_timeout_secs
                    .unwrap_or(defaults.list_timeout_secs),
                max_concurrency: raw
                    .catalog
                    .max_concurrency
                    .unwrap_or(defaults.max_concurrency),
                skip_disabled: raw.catalog.skip_disabled.unwrap_or(defaults.skip_disabled),
                user_agent: raw.catalog.user_agent,
            },
        }
    }
}

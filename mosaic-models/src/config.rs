//! Tunables for catalog aggregation and provider calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Catalog aggregation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Timeout for a single verification request.
    pub verify_timeout_secs: u64,
    /// Timeout for a single model-listing request.
    pub list_timeout_secs: u64,
    /// Upper bound on connections fetched at the same time.
    pub max_concurrency: usize,
    /// Leave disabled connections out of the aggregated catalog.
    pub skip_disabled: bool,
    /// Overrides the default `User-Agent` on outbound requests.
    pub user_agent: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            verify_timeout_secs: 10,
            list_timeout_secs: 15,
            max_concurrency: 8,
            skip_disabled: true,
            user_agent: None,
        }
    }
}

impl CatalogConfig {
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    /// Effective fan-out width, never zero.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provider_timeouts() {
        let config = CatalogConfig::default();
        assert_eq!(config.verify_timeout(), Duration::from_secs(10));
        assert_eq!(config.list_timeout(), Duration::from_secs(15));
        assert!(config.skip_disabled);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: CatalogConfig = serde_json::from_str(r#"{"max_concurrency": 0}"#).unwrap();
        assert_eq!(config.list_timeout_secs, 15);
        assert_eq!(config.concurrency(), 1);
    }
}

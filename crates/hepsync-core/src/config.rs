//! Pipeline configuration
//!
//! Endpoint locations, working directories and fan-out limits for a
//! synchronization pass, loaded from the environment.

use hepsync_common::ids::{InspireId, DEFAULT_ID_PREFIX};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder substituted with the identifier in the bundle URL template.
const ID_PLACEHOLDER: &str = "{id}";

/// Configuration for a synchronization pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Catalog listing endpoint; an optional `YYYYMMDD` path segment
    /// filters by modification date
    pub catalog_url: String,
    /// Bundle download URL with an `{id}` placeholder
    pub bundle_url_template: String,
    /// Bibliographic metadata service, queried by numeric identifier
    pub inspire_url: String,
    /// Prefix applied to numeric catalog identifiers
    pub id_prefix: String,
    /// Per-identifier working directories for expanded bundles
    pub data_dir: PathBuf,
    /// Directory for downloaded archives before expansion
    pub tmp_dir: PathBuf,
    /// Timeout applied to every outbound HTTP call, in seconds
    pub http_timeout_secs: u64,
    /// Maximum units of work in flight in async dispatch
    pub concurrency: usize,
}

impl SyncConfig {
    /// Load configuration from `HEPSYNC_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            catalog_url: std::env::var("HEPSYNC_CATALOG_URL")
                .unwrap_or(defaults.catalog_url),
            bundle_url_template: std::env::var("HEPSYNC_BUNDLE_URL_TEMPLATE")
                .unwrap_or(defaults.bundle_url_template),
            inspire_url: std::env::var("HEPSYNC_INSPIRE_URL")
                .unwrap_or(defaults.inspire_url),
            id_prefix: std::env::var("HEPSYNC_ID_PREFIX").unwrap_or(defaults.id_prefix),
            data_dir: std::env::var("HEPSYNC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            tmp_dir: std::env::var("HEPSYNC_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.tmp_dir),
            http_timeout_secs: std::env::var("HEPSYNC_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
            concurrency: std::env::var("HEPSYNC_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.concurrency),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.catalog_url.is_empty() {
            anyhow::bail!("HEPSYNC_CATALOG_URL cannot be empty");
        }
        if !self.bundle_url_template.contains(ID_PLACEHOLDER) {
            anyhow::bail!(
                "HEPSYNC_BUNDLE_URL_TEMPLATE must contain an {} placeholder, got: {}",
                ID_PLACEHOLDER,
                self.bundle_url_template
            );
        }
        if self.inspire_url.is_empty() {
            anyhow::bail!("HEPSYNC_INSPIRE_URL cannot be empty");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("HEPSYNC_HTTP_TIMEOUT_SECS must be greater than 0");
        }
        if self.concurrency == 0 {
            anyhow::bail!("HEPSYNC_CONCURRENCY must be greater than 0");
        }
        Ok(())
    }

    /// Get the HTTP timeout as a Duration.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Bundle download URL for one identifier.
    pub fn bundle_url(&self, id: &InspireId) -> String {
        self.bundle_url_template.replace(ID_PLACEHOLDER, id.as_str())
    }

    /// Working directory for one identifier's expanded bundle.
    pub fn workdir(&self, id: &InspireId) -> PathBuf {
        self.data_dir.join(id.as_str())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            catalog_url: "http://hepdata.cedar.ac.uk/allids".to_string(),
            bundle_url_template: "http://hepdata.cedar.ac.uk/view/{id}/yaml".to_string(),
            inspire_url: "https://inspirehep.net/api/literature".to_string(),
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            data_dir: std::env::temp_dir().join("hepsync-data"),
            tmp_dir: std::env::temp_dir().join("hepsync-tmp"),
            http_timeout_secs: 30,
            concurrency: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_template_without_placeholder() {
        let mut config = SyncConfig::default();
        config.bundle_url_template = "http://example.org/bundle".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = SyncConfig::default();
        config.http_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let mut config = SyncConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bundle_url_substitution() {
        let config = SyncConfig::default();
        let url = config.bundle_url(&InspireId::new("ins1001"));
        assert_eq!(url, "http://hepdata.cedar.ac.uk/view/ins1001/yaml");
    }

    #[test]
    fn test_workdir_is_per_identifier() {
        let config = SyncConfig::default();
        let dir = config.workdir(&InspireId::new("ins1001"));
        assert!(dir.ends_with("ins1001"));
    }

    #[test]
    fn test_http_timeout_duration() {
        let config = SyncConfig {
            http_timeout_secs: 10,
            ..Default::default()
        };
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
    }
}

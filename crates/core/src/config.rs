use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::GrowthResult;

/// Root application configuration. Loaded from environment variables
/// with the prefix `GROWTH__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub license: LicenseServiceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LicenseServiceConfig {
    #[serde(default = "default_license_base_url")]
    pub base_url: String,
    #[serde(default = "default_product_id")]
    pub product_id: String,
    #[serde(default = "default_license_timeout_secs")]
    pub timeout_secs: u64,
}

impl LicenseServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default functions
fn default_license_base_url() -> String {
    "https://api.license.example.com/v1".to_string()
}
fn default_product_id() -> String {
    "growth-dashboard".to_string()
}
fn default_license_timeout_secs() -> u64 {
    30
}
fn default_snapshot_path() -> String {
    "growth-store.json".to_string()
}
fn default_log_filter() -> String {
    "growth_admin=info,growth_admin_console=info".to_string()
}

impl Default for LicenseServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_license_base_url(),
            product_id: default_product_id(),
            timeout_secs: default_license_timeout_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables only.
    pub fn load() -> GrowthResult<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an optional TOML file, with environment
    /// variables taking precedence.
    pub fn load_from(file: Option<&Path>) -> GrowthResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("GROWTH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.license.timeout(), Duration::from_secs(30));
        assert_eq!(config.license.product_id, "growth-dashboard");
        assert_eq!(config.store.snapshot_path, "growth-store.json");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!("growth-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[license]\nbase_url = \"http://127.0.0.1:9000\"\ntimeout_secs = 5\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.license.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.license.timeout_secs, 5);
        // Unset fields keep their defaults.
        assert_eq!(config.license.product_id, "growth-dashboard");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("growth-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[license\nbase_url = ").unwrap();

        let err = AppConfig::load_from(Some(&path)).unwrap_err();
        assert!(matches!(err, crate::GrowthError::Config(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("growth-missing-{}.toml", uuid::Uuid::new_v4()));
        assert!(AppConfig::load_from(Some(&path)).is_err());
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::storage_utils::AsyncStorageManager;

// CONFIGURATION STRUCTS
// Loaded from `<storage>/<name>.json`; every field falls back to its default.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    pub coins: String,      // e.g., "/coins"
    pub fear_greed: String, // e.g., "/fear_greed"
    pub prices: String,     // coin id is appended: "/prices/{id}"
    pub chart_data: String, // "/chart_data/{id}"
    pub csv: String,        // "/get_csv/{id}"
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            coins: "/coins".to_string(),
            fear_greed: "/fear_greed".to_string(),
            prices: "/prices".to_string(),
            chart_data: "/chart_data".to_string(),
            csv: "/get_csv".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub endpoints: Endpoints,
    pub timeout_secs: u64,
    /// Where `data.csv` lands. Relative paths resolve against the binary directory.
    pub download_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            endpoints: Endpoints::default(),
            timeout_secs: 30,
            download_dir: "downloads".to_string(),
        }
    }
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Loads `<name>.json` from the storage directory, or defaults if the file is absent.
    pub async fn load_or_default(
        storage: &AsyncStorageManager,
        name: &str,
    ) -> anyhow::Result<Self> {
        if !storage.contains(name).await {
            info!(config = name, "no config file, using defaults");
            return Ok(Self::default());
        }
        match storage.load(name).await {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(config = name, error = %e, "config file is invalid");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"base_url": "http://backend:9000", "endpoints": {"csv": "/csv"}}"#,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://backend:9000");
        assert_eq!(config.endpoints.csv, "/csv");
        assert_eq!(config.endpoints.coins, "/coins");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = std::env::temp_dir().join(format!("fng-config-{}", std::process::id()));
        let storage = AsyncStorageManager::new(&dir).await.unwrap();

        let config = AppConfig::load_or_default(&storage, "absent").await.unwrap();
        assert_eq!(config, AppConfig::default());

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn saved_config_round_trips_through_storage() {
        let dir = std::env::temp_dir().join(format!("fng-config-saved-{}", std::process::id()));
        let storage = AsyncStorageManager::new(&dir).await.unwrap();
        let config = AppConfig {
            timeout_secs: 5,
            ..AppConfig::default()
        };
        storage.save("config", &config).await.unwrap();

        let loaded = AppConfig::load_or_default(&storage, "config").await.unwrap();
        assert_eq!(loaded.timeout_secs, 5);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}

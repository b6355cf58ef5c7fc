//! Application configuration management.
//!
//! This module handles loading and saving the SDK configuration: the cloud
//! server, brand and app name sent with account calls, the last used
//! username, and where the session is stored.
//!
//! Configuration is stored at `~/.config/iotapps/config.json`. The
//! `IOTAPPS_SERVER_URL` and `IOTAPPS_BRAND` environment variables override
//! the file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::DEFAULT_SERVER_URL;
use crate::auth::{FileStore, KeyValueStore, KeyringStore};

/// Application name used for config/cache directory paths and the keychain service
pub const APP_NAME: &str = "iotapps";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_SERVER_URL: &str = "IOTAPPS_SERVER_URL";
const ENV_BRAND: &str = "IOTAPPS_BRAND";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub brand: Option<String>,
    pub app_name: Option<String>,
    pub last_username: Option<String>,
    /// Keep the session in the OS keychain instead of the cache directory
    pub use_keyring: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            brand: None,
            app_name: None,
            last_username: None,
            use_keyring: false,
        }
    }
}

impl Config {
    /// Load the config file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_SERVER_URL).filter(|v| !v.is_empty()) {
            debug!(server_url = %url, "Server URL overridden by environment");
            self.server_url = url;
        }
        if let Some(brand) = var(ENV_BRAND).filter(|v| !v.is_empty()) {
            self.brand = Some(brand);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Storage for the session: the OS keychain or `session.json` in the cache directory
    pub fn open_store(&self) -> Result<Arc<dyn KeyValueStore>> {
        if self.use_keyring {
            return Ok(Arc::new(KeyringStore::new(APP_NAME)));
        }
        let store = FileStore::in_dir(&self.cache_dir()?).context("Failed to open session store")?;
        Ok(Arc::new(store))
    }
}

//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! API location, token storage backend, refresh policy and upload settings.
//!
//! Configuration is stored at `~/.config/homestead/config.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::api::{GatewayConfig, DEFAULT_TIMEOUT_SECS};
use crate::auth::{FileStorage, KeyringStorage, TokenStorage};
use crate::media::DEFAULT_MEDIA_BASE_URL;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "homestead";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "HOMESTEAD_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

const DEFAULT_UPLOAD_FOLDER: &str = "properties";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub storage: StorageBackend,
    pub request_timeout_secs: u64,
    pub dedupe_refresh: bool,
    pub upload_folder: Option<String>,
    pub media_base_url: String,
    pub last_email: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage: StorageBackend::File,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            dedupe_refresh: true,
            upload_folder: Some(DEFAULT_UPLOAD_FOLDER.to_string()),
            media_base_url: DEFAULT_MEDIA_BASE_URL.to_string(),
            last_email: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
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

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let mut gateway = GatewayConfig::new(self.base_url()?);
        gateway.dedupe_refresh = self.dedupe_refresh;
        Ok(gateway)
    }

    /// The token storage backend selected by this config.
    pub fn token_storage(&self) -> Result<Arc<dyn TokenStorage>> {
        Ok(match self.storage {
            StorageBackend::File => Arc::new(FileStorage::in_dir(&self.cache_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
        })
    }
}

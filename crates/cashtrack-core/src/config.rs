//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the cache key namespace, the last used email and the
//! offline behaviour switches.
//!
//! Configuration is stored at `~/.config/cashtrack/config.json`. The remote
//! endpoint and project key come from the environment instead.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::DEFAULT_NAMESPACE;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "cashtrack";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable holding the backend base URL
pub const URL_ENV: &str = "CASHTRACK_SUPABASE_URL";

/// Environment variable holding the backend project (anon) key
pub const ANON_KEY_ENV: &str = "CASHTRACK_SUPABASE_ANON_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub key_namespace: String,
    pub last_email: Option<String>,
    /// Push pending writes before each online refresh
    pub drain_on_reconnect: bool,
    /// Treat the network as unreachable regardless of the real state
    pub force_offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_namespace: DEFAULT_NAMESPACE.to_string(),
            last_email: None,
            drain_on_reconnect: true,
            force_offline: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
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
}

/// Remote service location and project key.
///
/// Missing values default to empty strings and are not validated; requests
/// against an empty URL fail with [`crate::api::ApiError::NotConfigured`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub anon_key: String,
}

impl Endpoint {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup(URL_ENV).unwrap_or_default();
        let anon_key = lookup(ANON_KEY_ENV).unwrap_or_default();
        if url.is_empty() || anon_key.is_empty() {
            warn!(
                url_set = !url.is_empty(),
                key_set = !anon_key.is_empty(),
                "Remote endpoint is not fully configured"
            );
        }
        Self { url, anon_key }
    }

    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.anon_key.is_empty()
    }
}

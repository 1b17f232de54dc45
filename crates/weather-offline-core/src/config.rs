//! Application and worker configuration.
//!
//! `WorkerConfig` carries the constants the offline worker is built around
//! (cache generation, offline page, static assets, API host). `AppConfig`
//! wraps it with the per-installation settings and is stored at
//! `~/.config/weather-offline/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "weather-offline";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Current cache generation. Bump whenever cached asset content changes.
pub const CACHE_NAME: &str = "weather-app-v1";

/// Page served to navigations when the network is unavailable.
pub const OFFLINE_URL: &str = "/";

/// Assets pre-populated into the current cache at install time.
pub const STATIC_ASSETS: &[&str] = &[
    OFFLINE_URL,
    "/manifest.json",
    "/icons/icon-192.png",
    "/icons/icon-512.png",
];

/// Host of the weather-data provider.
pub const API_HOST: &str = "api.openweathermap.org";

/// Origin the app is served from when nothing else is configured.
pub const DEFAULT_ORIGIN: &str = "http://localhost:3000/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub cache_name: String,
    pub offline_url: String,
    pub static_assets: Vec<String>,
    pub api_host: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: CACHE_NAME.to_string(),
            offline_url: OFFLINE_URL.to_string(),
            static_assets: STATIC_ASSETS.iter().map(|s| s.to_string()).collect(),
            api_host: API_HOST.to_string(),
        }
    }
}

impl WorkerConfig {
    /// Whether `url` targets the weather-data provider (the host or a subdomain of it).
    pub fn is_api_url(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => {
                let host = host.to_ascii_lowercase();
                let api_host = self.api_host.to_ascii_lowercase();
                host == api_host || host.ends_with(&format!(".{}", api_host))
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Origin the app is served from; relative asset URLs resolve against it.
    pub origin: Option<String>,
    pub api_key: Option<String>,
    /// Overrides the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    pub worker: WorkerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
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

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root under which cache containers are persisted.
    pub fn cache_root(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn origin_url(&self) -> Result<Url> {
        let origin = self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        Url::parse(origin).with_context(|| format!("Invalid origin URL: {}", origin))
    }
}

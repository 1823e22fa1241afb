use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, Result};

pub const DEFAULT_API_URL: &str = "https://techfidants-hrms-be.onrender.com";
pub const DEFAULT_PAGE_SIZE: u32 = 3;

/// Overrides `api_url` for a single run without touching settings.json.
pub const API_URL_ENV: &str = "HRCONSOLE_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            api_url: default_api_url(),
            page_size: default_page_size(),
        }
    }
}

impl Settings {
    /// The API base URL with the environment override applied and any
    /// trailing slash removed.
    pub fn effective_api_url(&self) -> String {
        let url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.api_url.clone());
        url.trim_end_matches('/').to_string()
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("hrconsole.db")
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("hrconsole")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("hrconsole")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring unreadable {}: {e}", path.display());
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    if settings.page_size == 0 {
        return Err(ConsoleError::Settings("page_size must be at least 1".to_string()));
    }
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ConsoleError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    log::debug!("settings written to {}", settings_path().display());
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

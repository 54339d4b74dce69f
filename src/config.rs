use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    pub congress_api_key: Option<String>,
    pub claude_api_key: Option<String>,

    /// Congress number the sync passes target, e.g. 119.
    #[serde(default = "default_congress")]
    pub congress: i64,

    /// First day of the targeted congress session, used as the baseline
    /// sync checkpoint. Bills updated before this date are never walked.
    pub congress_start_date: Option<chrono::NaiveDate>,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_sync_window_days")]
    pub sync_window_days: u32,

    #[serde(default = "default_request_delay_secs")]
    pub request_delay_secs: u64,

    #[serde(default = "default_rate_limit_delay_secs")]
    pub rate_limit_delay_secs: u64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("billwatch");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("bills.db").to_string_lossy().to_string()
}

fn default_cache_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("billwatch")
        .join("bill_text")
        .to_string_lossy()
        .to_string()
}

fn default_congress() -> i64 {
    119
}

fn default_page_size() -> u32 {
    250 // Maximum allowed by the API
}

fn default_sync_window_days() -> u32 {
    4
}

fn default_request_delay_secs() -> u64 {
    1
}

fn default_rate_limit_delay_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_dir: default_cache_dir(),
            congress_api_key: None,
            claude_api_key: None,
            congress: default_congress(),
            congress_start_date: None,
            page_size: default_page_size(),
            sync_window_days: default_sync_window_days(),
            request_delay_secs: default_request_delay_secs(),
            rate_limit_delay_secs: default_rate_limit_delay_secs(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("billwatch")
            .join("config.toml")
    }

    /// Delay between successive API/document requests.
    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.request_delay_secs)
    }

    /// Longer pause applied after the API answers 429, before the same
    /// page is requested again.
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs(self.rate_limit_delay_secs)
    }
}

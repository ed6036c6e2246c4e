use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::{PollCadence, DEFAULT_API_URL, DEFAULT_MODEL_TYPE, DEFAULT_RESULT_LANGUAGE};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStrategy {
    /// Every 3 seconds for up to 5 minutes.
    #[default]
    Fixed,
    /// Waits grow by 1.5x, up to 10 status checks.
    Growing,
}

impl PollStrategy {
    pub fn cadence(self) -> PollCadence {
        match self {
            PollStrategy::Fixed => PollCadence::fixed(),
            PollStrategy::Growing => PollCadence::growing(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub lilys_api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_result_language")]
    pub result_language: String,

    #[serde(default = "default_model_type")]
    pub model_type: String,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default)]
    pub poll_strategy: PollStrategy,

    /// Upper bound on one generation, submission included.
    pub overall_timeout_secs: Option<u64>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tubesum");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("summaries.db").to_string_lossy().to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_result_language() -> String {
    DEFAULT_RESULT_LANGUAGE.to_string()
}

fn default_model_type() -> String {
    DEFAULT_MODEL_TYPE.to_string()
}

fn default_cache_ttl() -> u64 {
    60 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            lilys_api_key: None,
            api_url: default_api_url(),
            result_language: default_result_language(),
            model_type: default_model_type(),
            cache_ttl_secs: default_cache_ttl(),
            poll_strategy: PollStrategy::default(),
            overall_timeout_secs: None,
        }
    }
}

impl Config {
    /// Reads the config file (writing defaults on first run), then applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.cache_ttl_secs == 0 {
            return Err(AppError::Config("cache_ttl_secs must be positive".to_string()));
        }
        Ok(config)
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
            .join("tubesum")
            .join("config.toml")
    }

    /// `LILYS_API_KEY` and `TUBESUM_API_URL` win over the file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("LILYS_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.lilys_api_key = Some(key);
        }
        if let Some(url) = var("TUBESUM_API_URL").filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.lilys_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_secs.map(Duration::from_secs)
    }
}

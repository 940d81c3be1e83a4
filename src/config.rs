use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::time::Duration;
use anyhow::{Result, Context};

pub const CONFIG_PATH: &str = "data/config.yaml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Linux; Android 14; Mobile) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_tracing_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            user_agent: default_user_agent(),
            request_timeout_seconds: default_request_timeout_seconds(),
            tracing_level: default_tracing_level(),
        }
    }
}

impl Config {
    /// Loads data/config.yaml when present, then applies environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match fs::read_to_string(CONFIG_PATH) {
            Ok(config_str) => Self::from_yaml_str(&config_str)
                .with_context(|| format!("Failed to parse {}", CONFIG_PATH))?,
            Err(_) => Config::default(),
        };

        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self> {
        // An empty file deserializes to null rather than an empty mapping
        if config_str.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(config_str)?)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(user_agent) = var("USER_AGENT") {
            self.user_agent = user_agent;
        }

        if let Some(timeout) = var("REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = timeout.parse()
                .context("Failed to parse REQUEST_TIMEOUT_SECONDS environment variable")?;
        }

        if let Some(tracing_level) = var("TRACING_LEVEL") {
            self.tracing_level = tracing_level;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            anyhow::bail!("user_agent must not be empty (set via {} or USER_AGENT env var)", CONFIG_PATH);
        }

        if self.request_timeout_seconds == 0 {
            anyhow::bail!("request_timeout_seconds must be greater than 0");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn create_default() -> Result<()> {
        // Ensure data directory exists
        fs::create_dir_all("data")?;

        let config_str = serde_yaml::to_string(&Config::default())?;
        fs::write(CONFIG_PATH, config_str)?;
        Ok(())
    }
}

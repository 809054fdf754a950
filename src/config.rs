use std::{path::PathBuf, time::Duration};

use directories::BaseDirs;
use fever_client::client::{config::env_flag, ClientConfig, RequestConfig};
use serde::{Deserialize, Serialize};

use crate::result::{AppError, Result};

/// Settings stored in `fever.toml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the aggregator, e.g. `https://freshrss.example.net`
    pub host: String,
    pub username: String,
    /// API password, not necessarily the web login password
    pub password: String,
    pub verify_ssl: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// One of trace, debug, info, warn, error or Off
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let request = RequestConfig::default();
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            verify_ssl: true,
            timeout_secs: request.timeout.as_secs(),
            max_retries: request.max_retries,
            log_level: None,
        }
    }
}

impl AppConfig {
    /// Let `FEVER_API_*` variables override values from the file
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("FEVER_API_HOST") {
            self.host = host;
        }
        if let Ok(username) = std::env::var("FEVER_API_USERNAME") {
            self.username = username;
        }
        if let Ok(password) = std::env::var("FEVER_API_PASSWORD") {
            self.password = password;
        }
        if let Some(verify) = env_flag("FEVER_API_VERIFY_SSL") {
            self.verify_ssl = verify;
        }
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host is required (set it in the config file or FEVER_API_HOST)".to_string());
        }
        if self.username.trim().is_empty() {
            return Err("username is required (FEVER_API_USERNAME)".to_string());
        }
        if self.password.is_empty() {
            return Err("password is required (FEVER_API_PASSWORD)".to_string());
        }
        Ok(())
    }
}

impl TryFrom<AppConfig> for ClientConfig {
    type Error = AppError;

    fn try_from(config: AppConfig) -> Result<Self> {
        config.validate().map_err(AppError::ConfigError)?;

        let request = RequestConfig {
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            max_retries: config.max_retries,
            ..Default::default()
        };

        let client_config = ClientConfig::new(config.host, config.username, config.password)
            .with_verify_ssl(config.verify_ssl)
            .with_request(request);
        client_config.validate()?;

        Ok(client_config)
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(dirs) = BaseDirs::new() {
        dirs.config_dir().join("fever.toml")
    } else {
        PathBuf::from("fever.toml")
    }
}

/// Load the config file, falling back to defaults when it does not exist
pub fn load_config(config_file: &PathBuf) -> Result<AppConfig> {
    if !config_file.exists() {
        return Ok(AppConfig::default());
    }

    confy::load_path(config_file).map_err(|e| AppError::ConfigError(e.to_string()))
}

pub fn save_config(config_file: &PathBuf, config: &AppConfig) -> Result<()> {
    confy::store_path(config_file, config).map_err(|e| AppError::ConfigError(e.to_string()))?;

    Ok(())
}

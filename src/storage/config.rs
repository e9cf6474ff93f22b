//! JSON Configuration Management
//!
//! Handles reading and writing the bot configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::models::settings::BotConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{default_config_path, ensure_dir};

/// Environment variable that overrides the configured bot token
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";

/// Configuration service for managing bot settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: BotConfig,
}

impl ConfigService {
    /// Load the config at `path` (or the default location), creating a
    /// default file when none exists. `BOT_TOKEN` is applied on top.
    pub fn new(path: Option<PathBuf>) -> AppResult<Self> {
        let config_path = match path {
            Some(path) => path,
            None => default_config_path()?,
        };

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            if let Some(parent) = config_path.parent() {
                ensure_dir(parent)?;
            }
            let default_config = BotConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            info!(path = %config_path.display(), "created default config");
            default_config
        };

        Self::apply_env_override(&mut config, std::env::var(BOT_TOKEN_ENV).ok());

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Write a fresh default config to `path`, refusing to overwrite.
    pub fn init_file(path: &Path) -> AppResult<()> {
        if path.exists() {
            return Err(AppError::config(format!(
                "Config already exists: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        Self::save_to_file(path, &BotConfig::default())
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<BotConfig> {
        let content = fs::read_to_string(path)?;
        let config: BotConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &BotConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn apply_env_override(config: &mut BotConfig, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            config.bot_token = Some(token);
        }
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &BotConfig {
        &self.config
    }

    /// Get a clone of the current configuration
    pub fn get_config_clone(&self) -> BotConfig {
        self.config.clone()
    }

    /// Path of the backing file
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AppResult<()> {
        let mut config = Self::load_from_file(&self.config_path)?;
        Self::apply_env_override(&mut config, std::env::var(BOT_TOKEN_ENV).ok());
        self.config = config;
        Ok(())
    }

    /// Check if the config service is healthy
    pub fn is_healthy(&self) -> bool {
        self.config_path.exists() && self.config.validate().is_ok()
    }
}

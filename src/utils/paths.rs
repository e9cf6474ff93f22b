//! Path Utilities
//!
//! Resolves the bot's config and data locations. The defaults live under
//! `~/.blogger-flow/`; the config file may move the data directory elsewhere.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the bot's home directory (~/.blogger-flow/)
pub fn app_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".blogger-flow"))
}

/// Get the default config file path (~/.blogger-flow/config.json)
pub fn default_config_path() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("config.json"))
}

/// Get the default data directory (~/.blogger-flow/data/)
pub fn default_data_dir() -> AppResult<PathBuf> {
    Ok(app_dir()?.join("data"))
}

/// Database file inside a data directory
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("bot.db")
}

/// Downloaded photos inside a data directory
pub fn media_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("media")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

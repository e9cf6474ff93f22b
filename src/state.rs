//! Application State
//!
//! Configuration, database and data directory shared by the bot and the CLI
//! subcommands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::models::settings::BotConfig;
use crate::services::export::Exporter;
use crate::services::remote::adapters::ChatAdapter;
use crate::services::workflow::Workflow;
use crate::storage::{ConfigService, Database};
use crate::utils::error::AppResult;
use crate::utils::paths::{database_path, ensure_dir};

/// Loaded services.
pub struct AppState {
    config: ConfigService,
    database: Arc<Database>,
    data_dir: PathBuf,
}

impl AppState {
    /// Load the config and open the database under its data directory.
    pub fn initialize(config_path: Option<PathBuf>) -> AppResult<Self> {
        let config = ConfigService::new(config_path)?;
        let data_dir = config.get_config().resolved_data_dir()?;
        ensure_dir(&data_dir)?;

        let database = Database::open(&database_path(&data_dir))?;
        info!(
            config = %config.config_path().display(),
            data_dir = %data_dir.display(),
            "State initialized"
        );

        Ok(Self {
            config,
            database: Arc::new(database),
            data_dir,
        })
    }

    pub fn config(&self) -> &BotConfig {
        self.config.get_config()
    }

    pub fn database(&self) -> Arc<Database> {
        self.database.clone()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn exporter(&self) -> Exporter {
        Exporter::new(&self.data_dir)
    }

    /// Workflow bound to `adapter`.
    pub fn workflow(&self, adapter: Arc<dyn ChatAdapter>) -> Workflow {
        Workflow::new(
            self.database.clone(),
            adapter,
            self.config.get_config_clone(),
            &self.data_dir,
        )
    }

    /// Check if all services are healthy
    pub fn is_healthy(&self) -> bool {
        self.database.is_healthy() && self.config.is_healthy()
    }
}

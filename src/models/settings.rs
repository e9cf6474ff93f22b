//! Settings Models
//!
//! Bot configuration stored in config.json.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::utils::error::AppResult;
use crate::utils::paths::default_data_dir;

/// What a blogger proves the purchase with on a marketplace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    /// Typed marketplace order number
    OrderNumber,
    /// Photo of the purchase receipt
    ReceiptPhoto,
}

/// A marketplace orders are placed on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformConfig {
    pub name: String,
    pub proof: ProofKind,
}

impl PlatformConfig {
    pub fn new(name: impl Into<String>, proof: ProofKind) -> Self {
        Self {
            name: name.into(),
            proof,
        }
    }
}

/// Bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token; `BOT_TOKEN` overrides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    /// Chat id of the admin who confirms payouts
    pub admin_id: i64,
    /// Staff with read-only console access
    #[serde(default)]
    pub moderator_ids: Vec<i64>,
    /// Contact shown by the "contact manager" button
    pub manager_contact: String,
    /// Where the database, media and exports live
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Marketplaces in assignment priority order
    pub platforms: Vec<PlatformConfig>,
    /// Days from assignment to the order date
    #[serde(default = "default_order_offset_days")]
    pub order_offset_days: i64,
    /// Days from assignment to the purchase deadline
    #[serde(default = "default_deadline_offset_days")]
    pub deadline_offset_days: i64,
    /// Seconds between reminder sweeps
    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,
    /// Seconds before the first reminder sweep
    #[serde(default = "default_reminder_initial_delay_secs")]
    pub reminder_initial_delay_secs: u64,
    /// Age after which an unpaid payout request alerts the admin
    #[serde(default = "default_payment_overdue_days")]
    pub payment_overdue_days: i64,
    /// Days within which payouts are promised
    #[serde(default = "default_payout_days")]
    pub payout_days: u32,
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Search phrase bloggers use to find the product
    pub task_keyword: String,
}

fn default_order_offset_days() -> i64 {
    1
}

fn default_deadline_offset_days() -> i64 {
    4
}

fn default_reminder_interval_secs() -> u64 {
    3600
}

fn default_reminder_initial_delay_secs() -> u64 {
    60
}

fn default_payment_overdue_days() -> i64 {
    7
}

fn default_payout_days() -> u32 {
    7
}

fn default_max_message_length() -> usize {
    4000
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            admin_id: 0,
            moderator_ids: Vec::new(),
            manager_contact: "@manager".to_string(),
            data_dir: None,
            platforms: vec![
                PlatformConfig::new("Wildberries", ProofKind::ReceiptPhoto),
                PlatformConfig::new("Ozon", ProofKind::OrderNumber),
            ],
            order_offset_days: default_order_offset_days(),
            deadline_offset_days: default_deadline_offset_days(),
            reminder_interval_secs: default_reminder_interval_secs(),
            reminder_initial_delay_secs: default_reminder_initial_delay_secs(),
            payment_overdue_days: default_payment_overdue_days(),
            payout_days: default_payout_days(),
            max_message_length: default_max_message_length(),
            task_keyword: "Board game".to_string(),
        }
    }
}

impl BotConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.platforms.is_empty() {
            return Err("At least one platform must be configured".to_string());
        }

        let mut names = HashSet::new();
        for platform in &self.platforms {
            if platform.name.trim().is_empty() {
                return Err("Platform names cannot be empty".to_string());
            }
            if !names.insert(platform.name.as_str()) {
                return Err(format!("Duplicate platform: {}", platform.name));
            }
        }

        if self.order_offset_days < 0 {
            return Err("order_offset_days cannot be negative".to_string());
        }

        if self.deadline_offset_days < self.order_offset_days {
            return Err("deadline_offset_days must not precede order_offset_days".to_string());
        }

        if self.reminder_interval_secs < 60 {
            return Err("reminder_interval_secs must be at least 60 seconds".to_string());
        }

        if self.payment_overdue_days < 1 {
            return Err("payment_overdue_days must be at least 1".to_string());
        }

        if !(100..=4096).contains(&self.max_message_length) {
            return Err(format!(
                "Invalid max_message_length: {}. Must be between 100 and 4096",
                self.max_message_length
            ));
        }

        if self.moderator_ids.contains(&self.admin_id) && self.admin_id != 0 {
            return Err("admin_id must not be listed among moderator_ids".to_string());
        }

        Ok(())
    }

    /// Check the fields only the running bot needs.
    pub fn validate_for_run(&self) -> Result<(), String> {
        self.validate()?;
        match self.bot_token.as_deref() {
            Some(token) if !token.trim().is_empty() => {}
            _ => return Err("Bot token is required (config or BOT_TOKEN)".to_string()),
        }
        if self.admin_id == 0 {
            return Err("admin_id must be set".to_string());
        }
        Ok(())
    }

    /// Look up a platform by name.
    pub fn platform(&self, name: &str) -> Option<&PlatformConfig> {
        self.platforms.iter().find(|p| p.name == name)
    }

    /// Platform names in priority order.
    pub fn platform_names(&self) -> Vec<String> {
        self.platforms.iter().map(|p| p.name.clone()).collect()
    }

    /// Proof kind for a platform; unknown platforms ask for a receipt photo.
    pub fn proof_kind(&self, platform: &str) -> ProofKind {
        self.platform(platform)
            .map(|p| p.proof)
            .unwrap_or(ProofKind::ReceiptPhoto)
    }

    /// Configured data directory, or the default one.
    pub fn resolved_data_dir(&self) -> AppResult<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }
}

//! Blogger Flow Bot
//!
//! Telegram bot that walks bloggers through a fixed pipeline: fill in the
//! profile, receive a task, submit proof links, request a payout, get paid
//! once the admin confirms.
//!
//! It includes:
//! - Chat transport (Telegram adapter, update gateway, command router)
//! - Conversation workflow and staff console
//! - Storage layer (SQLite, JSON config)
//! - Reminder sweep and CSV exports

pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use models::settings::{BotConfig, PlatformConfig, ProofKind};
pub use state::AppState;
pub use utils::error::{AppError, AppResult};

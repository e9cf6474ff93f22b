//! Services
//!
//! Business logic services for the bot.
//! The gateway feeds updates to the workflow; everything else is called
//! from the workflow or the CLI.

pub mod access;
pub mod export;
pub mod media;
pub mod reminders;
pub mod remote;
pub mod workflow;

pub use access::{AccessPolicy, Capability, Role};
pub use export::{ExportFile, Exporter};
pub use media::{MediaStore, StoredMedia};
pub use reminders::{ReminderSweep, SweepReport};
pub use remote::gateway::BotGateway;
pub use workflow::Workflow;

//! Access Policy
//!
//! Roles, capabilities and the check that decides whether a user may run a
//! staff action. Staff ids come from configuration.

use blogger_flow_core::UserId;
use serde::{Deserialize, Serialize};

use crate::models::settings::BotConfig;
use crate::services::remote::command_router::{CallbackAction, Command};

/// Who a user is to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Holds every capability
    Admin,
    /// Read-mostly staff
    Moderator,
    Blogger,
}

/// A staff action that needs authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewConsole,
    LookupUsers,
    Broadcast,
    Export,
    ConfirmPayouts,
    MessageBloggers,
}

impl Role {
    /// Capabilities granted to the role.
    ///
    /// | Role      | Capabilities                                      |
    /// |-----------|---------------------------------------------------|
    /// | Admin     | all                                               |
    /// | Moderator | ViewConsole, LookupUsers, Broadcast, Export       |
    /// | Blogger   | none                                              |
    pub fn allows(&self, capability: Capability) -> bool {
        match self {
            Role::Admin => true,
            Role::Moderator => matches!(
                capability,
                Capability::ViewConsole
                    | Capability::LookupUsers
                    | Capability::Broadcast
                    | Capability::Export
            ),
            Role::Blogger => false,
        }
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Blogger)
    }
}

/// Capability a command requires, `None` for blogger commands.
pub fn required_for_command(command: &Command) -> Option<Capability> {
    match command {
        Command::Admin
        | Command::AdminBack
        | Command::AdminSummary
        | Command::AdminUnpaid
        | Command::AdminDrafts
        | Command::AdminReferrals
        | Command::Stats { .. } => Some(Capability::ViewConsole),
        Command::AdminUserStatus | Command::Find { .. } | Command::FindId { .. } => {
            Some(Capability::LookupUsers)
        }
        Command::AdminBroadcast | Command::AdminSaveDraft => Some(Capability::Broadcast),
        Command::AdminExport => Some(Capability::Export),
        _ => None,
    }
}

/// Capability an inline-button action requires.
pub fn required_for_callback(action: &CallbackAction) -> Capability {
    match action {
        CallbackAction::PayDone { .. } => Capability::ConfirmPayouts,
        CallbackAction::Support { .. } => Capability::MessageBloggers,
        CallbackAction::BroadcastConfirm { .. } | CallbackAction::SegmentBroadcast(_) => {
            Capability::Broadcast
        }
        CallbackAction::SegmentExport(_) => Capability::Export,
    }
}

/// Maps user ids to roles.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    admin_id: UserId,
    moderator_ids: Vec<UserId>,
}

impl AccessPolicy {
    pub fn new(admin_id: UserId, moderator_ids: Vec<UserId>) -> Self {
        Self {
            admin_id,
            moderator_ids,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.admin_id, config.moderator_ids.clone())
    }

    /// Chat that receives payout cards and alerts.
    pub fn admin_id(&self) -> UserId {
        self.admin_id
    }

    pub fn role_of(&self, user_id: UserId) -> Role {
        if user_id == self.admin_id && self.admin_id != 0 {
            Role::Admin
        } else if self.moderator_ids.contains(&user_id) {
            Role::Moderator
        } else {
            Role::Blogger
        }
    }

    pub fn can(&self, user_id: UserId, capability: Capability) -> bool {
        self.role_of(user_id).allows(capability)
    }

    pub fn is_staff(&self, user_id: UserId) -> bool {
        self.role_of(user_id).is_staff()
    }
}

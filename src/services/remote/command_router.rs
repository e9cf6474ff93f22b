//! Command Router
//!
//! Parses incoming text into structured `Command` variants and inline-button
//! data into `CallbackAction`s. Menu buttons and slash commands are
//! recognized here; everything else is free text for the active wizard.

use blogger_flow_core::{Segment, UserId};

/// Reply-keyboard labels.
pub mod buttons {
    pub const FILL_PROFILE: &str = "📋 Fill in profile";
    pub const GET_TASK: &str = "📝 Get task";
    pub const TASK_DONE: &str = "✅ Task done";
    pub const DECLINE: &str = "❌ Decline collaboration";
    pub const REQUEST_PAYOUT: &str = "💸 Request payout";
    pub const CONTACT: &str = "📞 Contact manager";
    pub const RESTART: &str = "🔁 Restart bot";
    pub const ADMIN_MENU: &str = "👑 Admin menu";

    pub const USER_STATUS: &str = "📊 User status";
    pub const EXPORT: &str = "📤 Export";
    pub const SUMMARY: &str = "📈 Status summary";
    pub const UNPAID: &str = "🧾 Unpaid requests";
    pub const BROADCAST: &str = "📣 Broadcast";
    pub const SAVE_DRAFT: &str = "💾 Save draft";
    pub const DRAFTS: &str = "🗂 Drafts";
    pub const FIND_HINT: &str = "🔎 /find name";
    pub const FIND_ID_HINT: &str = "🔎 /findid id";
    pub const STATS_HINT: &str = "📅 /stats 01.08.2025-11.08.2025";
    pub const REFERRALS: &str = "👥 Referrals";
    pub const BACK: &str = "⬅️ Back";
}

/// Command parsed from a text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start [ref_<id>]`
    Start { referral: Option<String> },
    Restart,
    FillProfile,
    GetTask,
    TaskDone,
    Decline,
    RequestPayout,
    Contact,
    /// `/admin` or the admin-menu button
    Admin,
    /// `/whoami`
    WhoAmI,
    AdminUserStatus,
    AdminExport,
    AdminSummary,
    AdminUnpaid,
    AdminBroadcast,
    AdminSaveDraft,
    AdminDrafts,
    AdminReferrals,
    AdminBack,
    /// `/find <name fragment>`
    Find { query: String },
    /// `/findid <user id>`
    FindId { user_id: String },
    /// `/stats <from>-<to>`
    Stats { range: String },
    /// Anything else; input for the active wizard
    FreeText(String),
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Restart => "restart",
            Command::FillProfile => "fill_profile",
            Command::GetTask => "get_task",
            Command::TaskDone => "task_done",
            Command::Decline => "decline",
            Command::RequestPayout => "request_payout",
            Command::Contact => "contact",
            Command::Admin => "admin",
            Command::WhoAmI => "whoami",
            Command::AdminUserStatus => "admin_user_status",
            Command::AdminExport => "admin_export",
            Command::AdminSummary => "admin_summary",
            Command::AdminUnpaid => "admin_unpaid",
            Command::AdminBroadcast => "admin_broadcast",
            Command::AdminSaveDraft => "admin_save_draft",
            Command::AdminDrafts => "admin_drafts",
            Command::AdminReferrals => "admin_referrals",
            Command::AdminBack => "admin_back",
            Command::Find { .. } => "find",
            Command::FindId { .. } => "findid",
            Command::Stats { .. } => "stats",
            Command::FreeText(_) => "free_text",
        }
    }
}

/// Stateless command parser.
pub struct CommandRouter;

impl CommandRouter {
    /// Parse message text into a Command.
    ///
    /// Supports menu buttons and slash commands:
    /// - `/start [ref_<id>]` -> Start
    /// - `/admin`, `/whoami`
    /// - `/find <name>`, `/findid <id>`, `/stats <range>`
    /// - Anything else -> FreeText
    pub fn parse(text: &str) -> Command {
        let text = text.trim();

        if let Some(command) = Self::parse_button(text) {
            return command;
        }

        if let Some(rest) = text.strip_prefix('/') {
            let (head, args) = match rest.split_once(char::is_whitespace) {
                Some((head, args)) => (head, args.trim()),
                None => (rest, ""),
            };
            // `/start@my_bot` in group chats
            let name = head.split('@').next().unwrap_or(head);

            match name {
                "start" => {
                    let referral = args
                        .split_whitespace()
                        .next()
                        .and_then(|arg| arg.strip_prefix("ref_"))
                        .filter(|id| !id.is_empty())
                        .map(str::to_string);
                    return Command::Start { referral };
                }
                "admin" => return Command::Admin,
                "whoami" => return Command::WhoAmI,
                "find" => {
                    return Command::Find {
                        query: args.to_string(),
                    }
                }
                "findid" => {
                    return Command::FindId {
                        user_id: args.to_string(),
                    }
                }
                "stats" => {
                    return Command::Stats {
                        range: args.to_string(),
                    }
                }
                _ => {}
            }
        }

        Command::FreeText(text.to_string())
    }

    fn parse_button(text: &str) -> Option<Command> {
        use buttons::*;

        let command = match text {
            FILL_PROFILE => Command::FillProfile,
            GET_TASK => Command::GetTask,
            TASK_DONE => Command::TaskDone,
            DECLINE => Command::Decline,
            REQUEST_PAYOUT => Command::RequestPayout,
            CONTACT => Command::Contact,
            RESTART => Command::Restart,
            ADMIN_MENU => Command::Admin,
            USER_STATUS => Command::AdminUserStatus,
            EXPORT => Command::AdminExport,
            SUMMARY => Command::AdminSummary,
            UNPAID => Command::AdminUnpaid,
            BROADCAST => Command::AdminBroadcast,
            SAVE_DRAFT => Command::AdminSaveDraft,
            DRAFTS => Command::AdminDrafts,
            REFERRALS => Command::AdminReferrals,
            BACK => Command::AdminBack,
            // Hint buttons show usage
            FIND_HINT => Command::Find {
                query: String::new(),
            },
            FIND_ID_HINT => Command::FindId {
                user_id: String::new(),
            },
            STATS_HINT => Command::Stats {
                range: String::new(),
            },
            _ => return None,
        };
        Some(command)
    }
}

// ---------------------------------------------------------------------------
// Inline-button callbacks
// ---------------------------------------------------------------------------

pub const CB_PAY_DONE: &str = "pay_done:";
pub const CB_SUPPORT: &str = "support:";
pub const CB_BROADCAST: &str = "bcast:";
pub const CB_SEGMENT_BROADCAST: &str = "segcast:";
pub const CB_SEGMENT_EXPORT: &str = "segexport:";

/// Action carried by inline-button data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Admin starts confirming a payout
    PayDone { payment_id: String },
    /// Admin wants to message the blogger behind a payout
    Support { payment_id: String, user_id: UserId },
    /// Confirm or cancel the pending broadcast preview
    BroadcastConfirm { confirmed: bool },
    /// Start a broadcast to one segment
    SegmentBroadcast(Segment),
    /// Export one segment
    SegmentExport(Segment),
}

impl CallbackAction {
    /// Parse callback data; unknown or malformed data yields `None`.
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(payment_id) = data.strip_prefix(CB_PAY_DONE) {
            if payment_id.is_empty() {
                return None;
            }
            return Some(CallbackAction::PayDone {
                payment_id: payment_id.to_string(),
            });
        }
        if let Some(rest) = data.strip_prefix(CB_SUPPORT) {
            let (payment_id, user_id) = rest.split_once(':')?;
            if payment_id.is_empty() {
                return None;
            }
            return Some(CallbackAction::Support {
                payment_id: payment_id.to_string(),
                user_id: user_id.parse().ok()?,
            });
        }
        if let Some(decision) = data.strip_prefix(CB_BROADCAST) {
            return match decision {
                "yes" => Some(CallbackAction::BroadcastConfirm { confirmed: true }),
                "no" => Some(CallbackAction::BroadcastConfirm { confirmed: false }),
                _ => None,
            };
        }
        if let Some(key) = data.strip_prefix(CB_SEGMENT_BROADCAST) {
            return key.parse().ok().map(CallbackAction::SegmentBroadcast);
        }
        if let Some(key) = data.strip_prefix(CB_SEGMENT_EXPORT) {
            return key.parse().ok().map(CallbackAction::SegmentExport);
        }
        None
    }

    /// Callback data for this action.
    pub fn data(&self) -> String {
        match self {
            CallbackAction::PayDone { payment_id } => format!("{}{}", CB_PAY_DONE, payment_id),
            CallbackAction::Support {
                payment_id,
                user_id,
            } => format!("{}{}:{}", CB_SUPPORT, payment_id, user_id),
            CallbackAction::BroadcastConfirm { confirmed } => {
                format!("{}{}", CB_BROADCAST, if *confirmed { "yes" } else { "no" })
            }
            CallbackAction::SegmentBroadcast(segment) => {
                format!("{}{}", CB_SEGMENT_BROADCAST, segment.key())
            }
            CallbackAction::SegmentExport(segment) => {
                format!("{}{}", CB_SEGMENT_EXPORT, segment.key())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Slash command parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_start_plain() {
        assert_eq!(CommandRouter::parse("/start"), Command::Start { referral: None });
    }

    #[test]
    fn test_parse_start_with_referral() {
        assert_eq!(
            CommandRouter::parse("/start ref_12345"),
            Command::Start {
                referral: Some("12345".to_string())
            }
        );
    }

    #[test]
    fn test_parse_start_ignores_other_payloads() {
        assert_eq!(
            CommandRouter::parse("/start promo"),
            Command::Start { referral: None }
        );
        assert_eq!(
            CommandRouter::parse("/start ref_"),
            Command::Start { referral: None }
        );
    }

    #[test]
    fn test_parse_command_with_bot_suffix() {
        assert_eq!(CommandRouter::parse("/admin@blogger_bot"), Command::Admin);
    }

    #[test]
    fn test_parse_find_commands() {
        assert_eq!(
            CommandRouter::parse("/find  Game Mom "),
            Command::Find {
                query: "Game Mom".to_string()
            }
        );
        assert_eq!(
            CommandRouter::parse("/findid 42"),
            Command::FindId {
                user_id: "42".to_string()
            }
        );
        assert_eq!(
            CommandRouter::parse("/find"),
            Command::Find {
                query: String::new()
            }
        );
    }

    #[test]
    fn test_parse_stats_keeps_range_text() {
        assert_eq!(
            CommandRouter::parse("/stats 01.08.2025 - 11.08.2025"),
            Command::Stats {
                range: "01.08.2025 - 11.08.2025".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_slash_is_free_text() {
        assert_eq!(
            CommandRouter::parse("/help"),
            Command::FreeText("/help".to_string())
        );
    }

    // -----------------------------------------------------------------------
    // Buttons
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_user_buttons() {
        assert_eq!(CommandRouter::parse(buttons::FILL_PROFILE), Command::FillProfile);
        assert_eq!(CommandRouter::parse(buttons::GET_TASK), Command::GetTask);
        assert_eq!(CommandRouter::parse(buttons::TASK_DONE), Command::TaskDone);
        assert_eq!(CommandRouter::parse(buttons::DECLINE), Command::Decline);
        assert_eq!(
            CommandRouter::parse(buttons::REQUEST_PAYOUT),
            Command::RequestPayout
        );
        assert_eq!(CommandRouter::parse(buttons::CONTACT), Command::Contact);
        assert_eq!(CommandRouter::parse(buttons::RESTART), Command::Restart);
    }

    #[test]
    fn test_parse_admin_buttons() {
        assert_eq!(CommandRouter::parse(buttons::ADMIN_MENU), Command::Admin);
        assert_eq!(CommandRouter::parse(buttons::SUMMARY), Command::AdminSummary);
        assert_eq!(CommandRouter::parse(buttons::BACK), Command::AdminBack);
        assert_eq!(
            CommandRouter::parse(buttons::STATS_HINT),
            Command::Stats {
                range: String::new()
            }
        );
    }

    #[test]
    fn test_parse_button_with_surrounding_whitespace() {
        let padded = format!("  {}\n", buttons::GET_TASK);
        assert_eq!(CommandRouter::parse(&padded), Command::GetTask);
    }

    #[test]
    fn test_parse_plain_text() {
        assert_eq!(
            CommandRouter::parse("https://a.com/1, https://b.com/2"),
            Command::FreeText("https://a.com/1, https://b.com/2".to_string())
        );
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    #[test]
    fn test_callback_parse() {
        assert_eq!(
            CallbackAction::parse("pay_done:PAY0A1B2C"),
            Some(CallbackAction::PayDone {
                payment_id: "PAY0A1B2C".to_string()
            })
        );
        assert_eq!(
            CallbackAction::parse("support:PAY0A1B2C:77"),
            Some(CallbackAction::Support {
                payment_id: "PAY0A1B2C".to_string(),
                user_id: 77
            })
        );
        assert_eq!(
            CallbackAction::parse("bcast:no"),
            Some(CallbackAction::BroadcastConfirm { confirmed: false })
        );
        assert_eq!(
            CallbackAction::parse("segexport:unpaid"),
            Some(CallbackAction::SegmentExport(Segment::Unpaid))
        );
    }

    #[test]
    fn test_callback_parse_rejects_malformed() {
        assert_eq!(CallbackAction::parse("pay_done:"), None);
        assert_eq!(CallbackAction::parse("support:PAY1"), None);
        assert_eq!(CallbackAction::parse("support:PAY1:abc"), None);
        assert_eq!(CallbackAction::parse("bcast:maybe"), None);
        assert_eq!(CallbackAction::parse("segcast:got_tz"), None);
        assert_eq!(CallbackAction::parse("unknown"), None);
    }

    #[test]
    fn test_callback_data_parses_back() {
        let actions = [
            CallbackAction::PayDone {
                payment_id: "PAYABCDEF".to_string(),
            },
            CallbackAction::Support {
                payment_id: "PAYABCDEF".to_string(),
                user_id: 5,
            },
            CallbackAction::BroadcastConfirm { confirmed: true },
            CallbackAction::SegmentBroadcast(Segment::Paid),
        ];
        for action in actions {
            assert_eq!(CallbackAction::parse(&action.data()), Some(action));
        }
    }
}

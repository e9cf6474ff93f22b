//! Conversation State
//!
//! Where each chat stands in a multi-step wizard. States are stored as JSON
//! per chat id so a restart in the middle of a flow resumes where it left off.

use blogger_flow_core::{Segment, UserId};
use serde::{Deserialize, Serialize};

/// Intake wizard steps, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStep {
    Name,
    Followers,
    Platforms,
    Theme,
    ReachScreenshot,
}

/// Answers collected so far by the intake wizard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileDraft {
    pub display_name: Option<String>,
    pub followers: Option<String>,
    pub platforms: Vec<String>,
    pub theme: Option<String>,
}

/// Payout wizard steps. Only one of `OrderNumber` and `ReceiptPhoto` is
/// visited, depending on the platform's proof kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStep {
    ReviewScreenshot,
    Barcode,
    OrderNumber,
    ReceiptPhoto,
    Details,
}

/// Attachments collected so far by the payout wizard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayoutDraft {
    pub review_file_id: Option<String>,
    pub barcode_file_id: Option<String>,
    pub receipt_file_id: Option<String>,
    pub marketplace_order_no: Option<String>,
}

/// Recipients of a broadcast.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "segment", rename_all = "snake_case")]
pub enum BroadcastTarget {
    /// Everyone with a profile
    All,
    Segment(Segment),
}

impl BroadcastTarget {
    pub fn label(&self) -> &'static str {
        match self {
            BroadcastTarget::All => "All bloggers",
            BroadcastTarget::Segment(segment) => segment.label(),
        }
    }
}

/// Per-chat wizard position.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    Profile {
        step: ProfileStep,
        draft: ProfileDraft,
    },
    AwaitingLinks,
    AwaitingDeclineReason,
    Payout {
        step: PayoutStep,
        draft: PayoutDraft,
    },
    AdminStatusLookup,
    AdminAwaitingReceipt {
        payment_id: String,
    },
    AdminSupportText {
        payment_id: String,
        user_id: UserId,
    },
    AdminBroadcastText {
        target: BroadcastTarget,
    },
    AdminDraftText,
    /// Recipients are frozen when the preview is shown
    BroadcastPreview {
        target: BroadcastTarget,
        text: String,
        recipients: Vec<UserId>,
    },
}

impl ConversationState {
    /// Start of the intake wizard.
    pub fn profile_start() -> Self {
        ConversationState::Profile {
            step: ProfileStep::Name,
            draft: ProfileDraft::default(),
        }
    }

    /// Start of the payout wizard.
    pub fn payout_start() -> Self {
        ConversationState::Payout {
            step: PayoutStep::ReviewScreenshot,
            draft: PayoutDraft::default(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ConversationState::Idle)
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Profile { .. } => "profile",
            ConversationState::AwaitingLinks => "awaiting_links",
            ConversationState::AwaitingDeclineReason => "awaiting_decline_reason",
            ConversationState::Payout { .. } => "payout",
            ConversationState::AdminStatusLookup => "admin_status_lookup",
            ConversationState::AdminAwaitingReceipt { .. } => "admin_awaiting_receipt",
            ConversationState::AdminSupportText { .. } => "admin_support_text",
            ConversationState::AdminBroadcastText { .. } => "admin_broadcast_text",
            ConversationState::AdminDraftText => "admin_draft_text",
            ConversationState::BroadcastPreview { .. } => "broadcast_preview",
        }
    }
}

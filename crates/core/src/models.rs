//! Domain Models
//!
//! Bloggers, their single order and their payout requests. Status enums are
//! the one canonical vocabulary used by storage, exports and chat replies.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Chat platform user id.
pub type UserId = i64;

// ---------------------------------------------------------------------------
// Blogger
// ---------------------------------------------------------------------------

/// Profile filled once through the intake wizard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloggerProfile {
    pub user_id: UserId,
    /// Nickname or channel name
    pub display_name: String,
    /// Follower count as the blogger typed it ("12k", "12 000")
    pub followers: String,
    pub platforms: Vec<String>,
    pub theme: String,
    /// Chat platform file id of the reach screenshot
    pub reach_file_id: String,
    /// Referrer id from the `/start ref_<id>` deep link
    pub referral_source: Option<String>,
    /// Chat platform @username, if any
    pub tg_username: Option<String>,
    pub consent_at: DateTime<Utc>,
}

impl BloggerProfile {
    /// Split a free-form "where do you post" answer into platform names.
    pub fn parse_platforms(answer: &str) -> Vec<String> {
        answer
            .split([',', ';', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// Lifecycle of a blogger's single assignment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Assigned,
    LinksReceived,
    UnderReview,
    Completed,
    Declined,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Assigned => "assigned",
            OrderStatus::LinksReceived => "links_received",
            OrderStatus::UnderReview => "under_review",
            OrderStatus::Completed => "completed",
            OrderStatus::Declined => "declined",
        }
    }

    /// Whether more proof links may be attached in this state.
    pub fn accepts_links(&self) -> bool {
        matches!(
            self,
            OrderStatus::Assigned | OrderStatus::LinksReceived | OrderStatus::UnderReview
        )
    }

    /// Whether the blogger has submitted proof links.
    pub fn has_submitted(&self) -> bool {
        matches!(
            self,
            OrderStatus::LinksReceived | OrderStatus::UnderReview | OrderStatus::Completed
        )
    }

    /// Whether a payout may be requested in this state.
    pub fn allows_payout(&self) -> bool {
        matches!(self, OrderStatus::LinksReceived | OrderStatus::UnderReview)
    }

    /// Status after a link submission, given whether repeats were found.
    pub fn after_submission(&self, has_duplicates: bool) -> OrderStatus {
        if has_duplicates || *self == OrderStatus::UnderReview {
            OrderStatus::UnderReview
        } else {
            OrderStatus::LinksReceived
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(OrderStatus::Assigned),
            "links_received" => Ok(OrderStatus::LinksReceived),
            // Older records spell it `on_review`
            "under_review" | "on_review" => Ok(OrderStatus::UnderReview),
            "completed" => Ok(OrderStatus::Completed),
            "declined" => Ok(OrderStatus::Declined),
            other => Err(CoreError::parse(format!("unknown order status: {}", other))),
        }
    }
}

/// A blogger's content assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub user_id: UserId,
    pub platform: String,
    /// Day the blogger should place the marketplace order
    pub order_date: NaiveDate,
    /// Last day to complete the purchase
    pub deadline: NaiveDate,
    pub status: OrderStatus,
    pub links: Vec<String>,
    pub assigned_at: DateTime<Utc>,
    pub reminder_sent: bool,
}

impl Order {
    /// Whether a deadline reminder is due on `today`.
    pub fn reminder_due(&self, today: NaiveDate) -> bool {
        self.status == OrderStatus::Assigned && !self.reminder_sent && today >= self.deadline
    }
}

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

/// Payout request status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    UnderReview,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::UnderReview => "under_review",
            PaymentStatus::Paid => "paid",
        }
    }

    /// Not yet paid out.
    pub fn is_active(&self) -> bool {
        !matches!(self, PaymentStatus::Paid)
    }

    /// Initial status for a payout tied to an order in `order_status`.
    pub fn for_order(order_status: OrderStatus) -> PaymentStatus {
        if order_status == OrderStatus::UnderReview {
            PaymentStatus::UnderReview
        } else {
            PaymentStatus::Pending
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "under_review" | "on_review" => Ok(PaymentStatus::UnderReview),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(CoreError::parse(format!("unknown payment status: {}", other))),
        }
    }
}

/// A blogger's payout request with its proof attachments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    /// Short id shown to people, e.g. `PAY3FA91C`
    pub id: String,
    pub user_id: UserId,
    pub review_file_id: Option<String>,
    pub barcode_file_id: Option<String>,
    pub receipt_file_id: Option<String>,
    pub marketplace_order_no: Option<String>,
    /// Free-text payout details (card number and holder name)
    pub details: String,
    /// Proof links copied from the order at request time
    pub links: Vec<String>,
    pub platform: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    /// Message id of the admin's payout card
    pub admin_message_id: Option<i64>,
    pub admin_reminder_sent: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Photo attachments in the order they were collected.
    pub fn photo_file_ids(&self) -> Vec<&str> {
        [
            self.review_file_id.as_deref(),
            self.barcode_file_id.as_deref(),
            self.receipt_file_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Bookkeeping records
// ---------------------------------------------------------------------------

/// Reason a blogger gave for declining the assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decline {
    pub user_id: UserId,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Broadcast text saved by staff for later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draft {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory view of every blogger, order and payment.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub bloggers: Vec<BloggerProfile>,
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
}

impl Snapshot {
    pub fn blogger(&self, user_id: UserId) -> Option<&BloggerProfile> {
        self.bloggers.iter().find(|b| b.user_id == user_id)
    }

    pub fn order(&self, user_id: UserId) -> Option<&Order> {
        self.orders.iter().find(|o| o.user_id == user_id)
    }

    /// Display name for lists, `-` when the user has no profile.
    pub fn display_name(&self, user_id: UserId) -> &str {
        self.blogger(user_id)
            .map(|b| b.display_name.as_str())
            .unwrap_or("-")
    }
}

//! Chat Transport Types
//!
//! Platform-neutral shapes for updates coming in from the chat platform and
//! messages going out, plus the adapter error type.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Incoming
// ---------------------------------------------------------------------------

/// What an incoming update carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateKind {
    /// Plain text message
    Text(String),
    /// Photo; `file_id` is the largest available size
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    /// Inline-button press
    Callback {
        query_id: String,
        data: String,
        /// Message the pressed button belongs to
        message_id: Option<i64>,
    },
    /// Anything the bot does not handle (stickers, documents, ...)
    Other,
}

/// A message or callback received from the chat platform.
#[derive(Debug, Clone)]
pub struct IncomingUpdate {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub kind: UpdateKind,
    pub message_id: i64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl IncomingUpdate {
    /// Text content, if this is a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Photo file id, if this is a photo message.
    pub fn photo(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::Photo { file_id, .. } => Some(file_id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outgoing
// ---------------------------------------------------------------------------

/// A button attached under a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
        }
    }
}

/// Keyboard attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMarkup {
    /// Persistent reply keyboard, rows of button labels
    Menu(Vec<Vec<String>>),
    /// Buttons under the message
    Inline(Vec<Vec<InlineButton>>),
    /// Hide the reply keyboard
    Remove,
}

/// An outgoing text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub markup: Option<ReplyMarkup>,
    /// Parse `text` as HTML
    pub html: bool,
}

impl OutgoingMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
            html: false,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
            html: true,
        }
    }

    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.markup = Some(markup);
        self
    }
}

impl From<&str> for OutgoingMessage {
    fn from(text: &str) -> Self {
        Self::plain(text)
    }
}

impl From<String> for OutgoingMessage {
    fn from(text: String) -> Self {
        Self::plain(text)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Gateway runtime status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayStatus {
    pub running: bool,
    pub connected_since: Option<String>,
    pub total_updates_processed: u64,
    pub failed_updates: u64,
    pub last_update_at: Option<String>,
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (processed {}, failed {})",
            if self.running { "running" } else { "stopped" },
            self.total_updates_processed,
            self.failed_updates
        )
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Chat transport error
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("Failed to download file: {0}")]
    DownloadFailed(String),

    #[error("Adapter is not running")]
    NotRunning,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

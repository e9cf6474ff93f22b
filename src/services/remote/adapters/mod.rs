//! Chat Adapters
//!
//! Trait definition for chat platform adapters.
//! Each adapter implements platform-specific update receiving and sending.

pub mod recording;
pub mod telegram;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{ChatError, IncomingUpdate, OutgoingMessage, ReplyMarkup};

/// Chat adapter trait for platform-specific message handling.
///
/// Adapters are responsible for:
/// - Receiving updates from the platform (long-polling or webhook)
/// - Sending text, photos and documents back
/// - Editing earlier messages and answering button presses
/// - Downloading files users attach
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Adapter name for logs
    fn adapter_name(&self) -> &'static str;

    /// Start the adapter (begin receiving updates).
    ///
    /// Updates are forwarded through the provided mpsc sender channel.
    /// The adapter should spawn its own task for the receive loop.
    async fn start(&self, update_tx: mpsc::Sender<IncomingUpdate>) -> Result<(), ChatError>;

    /// Stop the adapter gracefully.
    async fn stop(&self) -> Result<(), ChatError>;

    /// Send a message, splitting it when it exceeds the platform limit.
    /// Returns the id of the last message sent.
    async fn send_message(&self, chat_id: i64, message: &OutgoingMessage) -> Result<i64, ChatError>;

    /// Replace the text of an earlier message and drop its inline buttons.
    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), ChatError>;

    /// Replace (or with `None`, remove) an earlier message's inline buttons.
    async fn edit_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), ChatError>;

    /// Send a photo by file id. Returns the message id.
    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<i64, ChatError>;

    /// Send several photos as one album.
    async fn send_media_group(&self, chat_id: i64, file_ids: &[String]) -> Result<(), ChatError>;

    /// Upload a document from memory.
    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<(), ChatError>;

    /// Acknowledge an inline-button press, optionally with a toast.
    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result<(), ChatError>;

    /// Download an attached file.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ChatError>;

    /// Check adapter health/connectivity.
    async fn health_check(&self) -> Result<(), ChatError>;
}

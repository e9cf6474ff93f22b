//! Recording Adapter
//!
//! In-memory ChatAdapter that records every outgoing call. Used to drive the
//! workflow without a network connection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::ChatAdapter;
use crate::services::remote::types::{ChatError, IncomingUpdate, OutgoingMessage, ReplyMarkup};

/// One recorded outgoing call.
#[derive(Debug, Clone, PartialEq)]
pub enum SentItem {
    Message {
        chat_id: i64,
        message_id: i64,
        message: OutgoingMessage,
    },
    Edit {
        chat_id: i64,
        message_id: i64,
        text: String,
    },
    EditMarkup {
        chat_id: i64,
        message_id: i64,
        markup: Option<ReplyMarkup>,
    },
    Photo {
        chat_id: i64,
        file_id: String,
        caption: Option<String>,
    },
    MediaGroup {
        chat_id: i64,
        file_ids: Vec<String>,
    },
    Document {
        chat_id: i64,
        file_name: String,
        bytes: Vec<u8>,
        caption: Option<String>,
    },
    CallbackAnswer {
        query_id: String,
        text: Option<String>,
    },
}

impl SentItem {
    /// Chat the item went to; callback answers have none.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            SentItem::Message { chat_id, .. }
            | SentItem::Edit { chat_id, .. }
            | SentItem::EditMarkup { chat_id, .. }
            | SentItem::Photo { chat_id, .. }
            | SentItem::MediaGroup { chat_id, .. }
            | SentItem::Document { chat_id, .. } => Some(*chat_id),
            SentItem::CallbackAnswer { .. } => None,
        }
    }
}

/// Adapter that keeps everything in memory.
#[derive(Default)]
pub struct RecordingAdapter {
    sent: Mutex<Vec<SentItem>>,
    failing_chats: Mutex<HashSet<i64>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    next_message_id: AtomicI64,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicI64::new(1000),
            ..Default::default()
        }
    }

    /// Make every send to `chat_id` fail.
    pub async fn fail_chat(&self, chat_id: i64) {
        self.failing_chats.lock().await.insert(chat_id);
    }

    /// Content returned when `file_id` is downloaded.
    pub async fn put_file(&self, file_id: &str, bytes: Vec<u8>) {
        self.files.lock().await.insert(file_id.to_string(), bytes);
    }

    /// Everything sent so far.
    pub async fn sent(&self) -> Vec<SentItem> {
        self.sent.lock().await.clone()
    }

    /// Texts of the messages sent to one chat, in order.
    pub async fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|item| match item {
                SentItem::Message {
                    chat_id: to,
                    message,
                    ..
                } if *to == chat_id => Some(message.text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last message sent to a chat.
    pub async fn last_message_to(&self, chat_id: i64) -> Option<OutgoingMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find_map(|item| match item {
                SentItem::Message {
                    chat_id: to,
                    message,
                    ..
                } if *to == chat_id => Some(message.clone()),
                _ => None,
            })
    }

    /// Forget everything recorded so far.
    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    async fn check(&self, chat_id: i64) -> Result<(), ChatError> {
        if self.failing_chats.lock().await.contains(&chat_id) {
            return Err(ChatError::SendFailed(format!("chat {} is unreachable", chat_id)));
        }
        Ok(())
    }

    async fn record(&self, item: SentItem) {
        self.sent.lock().await.push(item);
    }

    fn next_id(&self) -> i64 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatAdapter for RecordingAdapter {
    fn adapter_name(&self) -> &'static str {
        "recording"
    }

    async fn start(&self, _update_tx: mpsc::Sender<IncomingUpdate>) -> Result<(), ChatError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChatError> {
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, message: &OutgoingMessage) -> Result<i64, ChatError> {
        self.check(chat_id).await?;
        let message_id = self.next_id();
        self.record(SentItem::Message {
            chat_id,
            message_id,
            message: message.clone(),
        })
        .await;
        Ok(message_id)
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), ChatError> {
        self.check(chat_id).await?;
        self.record(SentItem::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
        })
        .await;
        Ok(())
    }

    async fn edit_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), ChatError> {
        self.check(chat_id).await?;
        self.record(SentItem::EditMarkup {
            chat_id,
            message_id,
            markup: markup.cloned(),
        })
        .await;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<i64, ChatError> {
        self.check(chat_id).await?;
        self.record(SentItem::Photo {
            chat_id,
            file_id: file_id.to_string(),
            caption: caption.map(str::to_string),
        })
        .await;
        Ok(self.next_id())
    }

    async fn send_media_group(&self, chat_id: i64, file_ids: &[String]) -> Result<(), ChatError> {
        self.check(chat_id).await?;
        self.record(SentItem::MediaGroup {
            chat_id,
            file_ids: file_ids.to_vec(),
        })
        .await;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<(), ChatError> {
        self.check(chat_id).await?;
        self.record(SentItem::Document {
            chat_id,
            file_name: file_name.to_string(),
            bytes,
            caption: caption.map(str::to_string),
        })
        .await;
        Ok(())
    }

    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result<(), ChatError> {
        self.record(SentItem::CallbackAnswer {
            query_id: query_id.to_string(),
            text: text.map(str::to_string),
        })
        .await;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ChatError> {
        Ok(self
            .files
            .lock()
            .await
            .get(file_id)
            .cloned()
            .unwrap_or_else(|| file_id.as_bytes().to_vec()))
    }

    async fn health_check(&self) -> Result<(), ChatError> {
        Ok(())
    }
}

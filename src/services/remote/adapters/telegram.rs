//! Telegram Adapter
//!
//! Telegram Bot adapter using teloxide for long-polling update reception.
//! Implements the ChatAdapter trait with keyboard conversion and message
//! splitting for Telegram's 4096 character limit.

use super::ChatAdapter;
use crate::models::settings::BotConfig;
use crate::services::remote::types::{
    ChatError, IncomingUpdate, InlineButton, OutgoingMessage, ReplyMarkup, UpdateKind,
};
use async_trait::async_trait;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, KeyboardRemove,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Telegram Bot adapter using teloxide with long-polling.
pub struct TelegramAdapter {
    pub(crate) bot: teloxide::Bot,
    pub(crate) max_message_length: usize,
    pub(crate) cancel_token: CancellationToken,
}

impl TelegramAdapter {
    /// Create a new Telegram adapter from the bot configuration.
    pub fn new(config: &BotConfig) -> Result<Self, ChatError> {
        let bot_token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ChatError::ConfigError("Bot token is required".to_string()))?;

        Ok(Self {
            bot: teloxide::Bot::new(bot_token),
            max_message_length: config.max_message_length,
            cancel_token: CancellationToken::new(),
        })
    }
}

/// Split long messages at line boundaries to respect platform limits.
///
/// Lengths are counted in characters so multi-byte text is never cut
/// inside a code point.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        if current_len + line_len + 1 > max_len {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            // Handle single lines longer than max_len
            if line_len > max_len {
                let chars: Vec<char> = line.chars().collect();
                for piece in chars.chunks(max_len) {
                    chunks.push(piece.iter().collect());
                }
                continue;
            }
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn inline_keyboard(rows: &[Vec<InlineButton>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.text.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

fn to_teloxide_markup(markup: &ReplyMarkup) -> teloxide::types::ReplyMarkup {
    match markup {
        ReplyMarkup::Menu(rows) => KeyboardMarkup::new(rows.iter().map(|row| {
            row.iter()
                .map(|label| KeyboardButton::new(label.clone()))
                .collect::<Vec<_>>()
        }))
        .resize_keyboard()
        .into(),
        ReplyMarkup::Inline(rows) => inline_keyboard(rows).into(),
        ReplyMarkup::Remove => KeyboardRemove::new().into(),
    }
}

fn send_err(e: impl std::fmt::Display) -> ChatError {
    ChatError::SendFailed(e.to_string())
}

#[async_trait]
impl ChatAdapter for TelegramAdapter {
    fn adapter_name(&self) -> &'static str {
        "telegram"
    }

    async fn start(&self, update_tx: mpsc::Sender<IncomingUpdate>) -> Result<(), ChatError> {
        use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
        use teloxide::dptree;
        use teloxide::types::{CallbackQuery, Message, Update};

        type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

        let bot = self.bot.clone();
        let cancel = self.cancel_token.clone();
        let message_tx = update_tx.clone();
        let callback_tx = update_tx;

        tokio::spawn(async move {
            let messages = Update::filter_message().endpoint(move |msg: Message| {
                let tx = message_tx.clone();
                async move {
                    let Some(user) = msg.from.as_ref() else {
                        return HandlerResult::Ok(());
                    };

                    let kind = if let Some(text) = msg.text() {
                        UpdateKind::Text(text.to_string())
                    } else if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
                        UpdateKind::Photo {
                            file_id: photo.file.id.0.clone(),
                            caption: msg.caption().map(str::to_string),
                        }
                    } else {
                        UpdateKind::Other
                    };

                    let incoming = IncomingUpdate {
                        chat_id: msg.chat.id.0,
                        user_id: user.id.0 as i64,
                        username: user.username.clone(),
                        kind,
                        message_id: msg.id.0 as i64,
                        timestamp: chrono::Utc::now(),
                    };
                    let _ = tx.send(incoming).await;
                    Ok(())
                }
            });

            let callbacks = Update::filter_callback_query().endpoint(move |query: CallbackQuery| {
                let tx = callback_tx.clone();
                async move {
                    let chat_id = query
                        .message
                        .as_ref()
                        .map(|m| m.chat().id.0)
                        .unwrap_or(query.from.id.0 as i64);
                    let message_id = query.message.as_ref().map(|m| m.id().0 as i64);

                    let incoming = IncomingUpdate {
                        chat_id,
                        user_id: query.from.id.0 as i64,
                        username: query.from.username.clone(),
                        kind: UpdateKind::Callback {
                            query_id: query.id.0.clone(),
                            data: query.data.clone().unwrap_or_default(),
                            message_id,
                        },
                        message_id: message_id.unwrap_or(0),
                        timestamp: chrono::Utc::now(),
                    };
                    let _ = tx.send(incoming).await;
                    HandlerResult::Ok(())
                }
            });

            let handler = dptree::entry().branch(messages).branch(callbacks);

            // Build and run dispatcher
            let mut dispatcher = Dispatcher::builder(bot, handler)
                .enable_ctrlc_handler()
                .build();

            // Get shutdown token for graceful termination
            let shutdown_token = dispatcher.shutdown_token();

            // Spawn a task that watches the CancellationToken and triggers shutdown
            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                cancel_clone.cancelled().await;
                if let Ok(fut) = shutdown_token.shutdown() {
                    fut.await;
                }
            });

            dispatcher.dispatch().await;
        });

        Ok(())
    }

    async fn stop(&self) -> Result<(), ChatError> {
        self.cancel_token.cancel();
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, message: &OutgoingMessage) -> Result<i64, ChatError> {
        use teloxide::prelude::*;
        use teloxide::types::{ChatId, ParseMode};

        let chunks = split_message(&message.text, self.max_message_length);
        let last = chunks.len().saturating_sub(1);
        let mut last_id = 0;

        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut request = self.bot.send_message(ChatId(chat_id), chunk);
            if message.html {
                request = request.parse_mode(ParseMode::Html);
            }
            // Keyboards go on the final chunk only
            if i == last {
                if let Some(markup) = &message.markup {
                    request = request.reply_markup(to_teloxide_markup(markup));
                }
            }
            let sent = request.await.map_err(send_err)?;
            last_id = sent.id.0 as i64;
        }
        Ok(last_id)
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), ChatError> {
        use teloxide::prelude::*;
        use teloxide::types::{ChatId, MessageId};

        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id as i32), text)
            .await
            .map_err(send_err)?;
        Ok(())
    }

    async fn edit_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        markup: Option<&ReplyMarkup>,
    ) -> Result<(), ChatError> {
        use teloxide::prelude::*;
        use teloxide::types::{ChatId, MessageId};

        let mut request = self
            .bot
            .edit_message_reply_markup(ChatId(chat_id), MessageId(message_id as i32));
        if let Some(ReplyMarkup::Inline(rows)) = markup {
            request = request.reply_markup(inline_keyboard(rows));
        }
        request.await.map_err(send_err)?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<i64, ChatError> {
        use teloxide::prelude::*;
        use teloxide::types::{ChatId, FileId, InputFile};

        let mut request = self
            .bot
            .send_photo(ChatId(chat_id), InputFile::file_id(FileId(file_id.to_string())));
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        let sent = request.await.map_err(send_err)?;
        Ok(sent.id.0 as i64)
    }

    async fn send_media_group(&self, chat_id: i64, file_ids: &[String]) -> Result<(), ChatError> {
        use teloxide::prelude::*;
        use teloxide::types::{ChatId, FileId, InputFile, InputMedia, InputMediaPhoto};

        match file_ids {
            [] => Ok(()),
            // Telegram rejects single-item albums
            [single] => self.send_photo(chat_id, single, None).await.map(|_| ()),
            many => {
                let media: Vec<InputMedia> = many
                    .iter()
                    .map(|id| {
                        InputMedia::Photo(InputMediaPhoto::new(InputFile::file_id(FileId(
                            id.clone(),
                        ))))
                    })
                    .collect();
                self.bot
                    .send_media_group(ChatId(chat_id), media)
                    .await
                    .map_err(send_err)?;
                Ok(())
            }
        }
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<(), ChatError> {
        use teloxide::prelude::*;
        use teloxide::types::{ChatId, InputFile};

        let mut request = self.bot.send_document(
            ChatId(chat_id),
            InputFile::memory(bytes).file_name(file_name.to_string()),
        );
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        request.await.map_err(send_err)?;
        Ok(())
    }

    async fn answer_callback(&self, query_id: &str, text: Option<&str>) -> Result<(), ChatError> {
        use teloxide::prelude::*;
        use teloxide::types::CallbackQueryId;

        let mut request = self
            .bot
            .answer_callback_query(CallbackQueryId(query_id.to_string()));
        if let Some(text) = text {
            request = request.text(text);
        }
        request.await.map_err(send_err)?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ChatError> {
        use teloxide::net::Download;
        use teloxide::prelude::*;
        use teloxide::types::FileId;

        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| ChatError::DownloadFailed(e.to_string()))?;

        let mut bytes = Vec::new();
        self.bot
            .download_file(&file.path, &mut bytes)
            .await
            .map_err(|e| ChatError::DownloadFailed(e.to_string()))?;
        Ok(bytes)
    }

    async fn health_check(&self) -> Result<(), ChatError> {
        use teloxide::prelude::*;

        self.bot
            .get_me()
            .await
            .map_err(|e| ChatError::ConfigError(format!("Bot health check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_message_short() {
        let chunks = split_message("Hello world", 100);
        assert_eq!(chunks, vec!["Hello world"]);
    }

    #[test]
    fn test_split_message_empty() {
        let chunks = split_message("", 100);
        assert_eq!(chunks, vec![""]);
    }

    #[test]
    fn test_split_message_multiline() {
        let text = "Line 1\nLine 2\nLine 3\nLine 4";
        let chunks = split_message(text, 15);
        assert_eq!(chunks, vec!["Line 1\nLine 2", "Line 3\nLine 4"]);
    }

    #[test]
    fn test_split_message_long_single_line() {
        let text = "a".repeat(250);
        let chunks = split_message(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn test_split_message_cyrillic_counts_chars() {
        // 2 bytes per char: a byte-based split would panic mid code point
        let text = "ж".repeat(150);
        let chunks = split_message(&text, 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 100);
        assert_eq!(chunks[1].chars().count(), 50);

        let fits = "привет\nмир";
        assert_eq!(split_message(fits, 10), vec![fits]);
    }

    #[test]
    fn test_split_message_with_newlines_near_boundary() {
        let mut text = String::new();
        for i in 0..100 {
            text.push_str(&format!("Строка {}\n", i));
        }
        let chunks = split_message(&text, 100);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn test_telegram_adapter_new_without_token() {
        let result = TelegramAdapter::new(&BotConfig::default());
        match result {
            Err(ChatError::ConfigError(msg)) => assert!(msg.contains("Bot token is required")),
            _ => panic!("Expected ConfigError"),
        }
    }

    #[test]
    fn test_telegram_adapter_new_with_token() {
        let config = BotConfig {
            bot_token: Some("test-token-123:ABC".to_string()),
            max_message_length: 1000,
            ..Default::default()
        };
        let adapter = TelegramAdapter::new(&config).unwrap();
        assert_eq!(adapter.adapter_name(), "telegram");
        assert_eq!(adapter.max_message_length, 1000);
    }

    #[test]
    fn test_cancel_token_stops_adapter() {
        let config = BotConfig {
            bot_token: Some("test-token-123:ABC".to_string()),
            ..Default::default()
        };
        let adapter = TelegramAdapter::new(&config).unwrap();
        assert!(!adapter.cancel_token.is_cancelled());
        adapter.cancel_token.cancel();
        assert!(adapter.cancel_token.is_cancelled());
    }

    #[test]
    fn test_menu_markup_conversion() {
        let markup = ReplyMarkup::Menu(vec![vec!["A".to_string(), "B".to_string()]]);
        assert!(matches!(
            to_teloxide_markup(&markup),
            teloxide::types::ReplyMarkup::Keyboard(_)
        ));

        let inline = ReplyMarkup::Inline(vec![vec![InlineButton::new("Pay", "pay_done:PAY1")]]);
        assert!(matches!(
            to_teloxide_markup(&inline),
            teloxide::types::ReplyMarkup::InlineKeyboard(_)
        ));
    }
}

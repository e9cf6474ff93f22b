//! Test harness around a workflow wired to the recording adapter.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use blogger_flow_bot::models::settings::BotConfig;
use blogger_flow_bot::services::remote::adapters::recording::{RecordingAdapter, SentItem};
use blogger_flow_bot::services::remote::command_router::buttons;
use blogger_flow_bot::services::remote::types::{IncomingUpdate, ReplyMarkup, UpdateKind};
use blogger_flow_bot::services::Workflow;
use blogger_flow_bot::storage::Database;

pub const ADMIN: i64 = 1;
pub const MODERATOR: i64 = 2;

pub const CARD_DETAILS: &str = "2200 1234 5678 9012 Anna Petrova";

pub struct Harness {
    pub workflow: Workflow,
    pub adapter: Arc<RecordingAdapter>,
    pub db: Arc<Database>,
    pub dir: TempDir,
    pub now: DateTime<Utc>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new_in_memory().unwrap());
        let adapter = Arc::new(RecordingAdapter::new());
        let config = BotConfig {
            admin_id: ADMIN,
            moderator_ids: vec![MODERATOR],
            manager_contact: "@manager_test".to_string(),
            ..Default::default()
        };
        let workflow = Workflow::new(db.clone(), adapter.clone(), config, dir.path());
        Self {
            workflow,
            adapter,
            db,
            dir,
            now: Utc.with_ymd_and_hms(2025, 8, 1, 10, 0, 0).unwrap(),
        }
    }

    fn update(&self, user_id: i64, kind: UpdateKind) -> IncomingUpdate {
        IncomingUpdate {
            chat_id: user_id,
            user_id,
            username: Some(format!("user{}", user_id)),
            kind,
            message_id: 1,
            timestamp: self.now,
        }
    }

    pub async fn text(&self, user_id: i64, text: &str) {
        let update = self.update(user_id, UpdateKind::Text(text.to_string()));
        self.workflow.handle_update(&update).await.unwrap();
    }

    pub async fn photo(&self, user_id: i64, file_id: &str) {
        let update = self.update(
            user_id,
            UpdateKind::Photo {
                file_id: file_id.to_string(),
                caption: None,
            },
        );
        self.workflow.handle_update(&update).await.unwrap();
    }

    pub async fn callback(&self, user_id: i64, data: &str, message_id: Option<i64>) {
        let update = self.update(
            user_id,
            UpdateKind::Callback {
                query_id: format!("q-{}", user_id),
                data: data.to_string(),
                message_id,
            },
        );
        self.workflow.handle_update(&update).await.unwrap();
    }

    pub fn advance_days(&mut self, days: i64) {
        self.now += Duration::days(days);
    }

    /// Text of the last message sent to a chat.
    pub async fn last_text(&self, chat_id: i64) -> String {
        self.adapter
            .last_message_to(chat_id)
            .await
            .map(|m| m.text)
            .unwrap_or_default()
    }

    /// Labels of the reply keyboard on the last message to a chat.
    pub async fn last_menu(&self, chat_id: i64) -> Vec<String> {
        match self.adapter.last_message_to(chat_id).await.and_then(|m| m.markup) {
            Some(ReplyMarkup::Menu(rows)) => rows.into_iter().flatten().collect(),
            _ => Vec::new(),
        }
    }

    pub async fn sent_to(&self, chat_id: i64) -> Vec<SentItem> {
        self.adapter
            .sent()
            .await
            .into_iter()
            .filter(|item| item.chat_id() == Some(chat_id))
            .collect()
    }

    /// Walk a user through the whole profile wizard.
    pub async fn fill_profile(&self, user_id: i64, name: &str) {
        self.text(user_id, buttons::FILL_PROFILE).await;
        self.text(user_id, name).await;
        self.text(user_id, "12k").await;
        self.text(user_id, "Instagram, TikTok").await;
        self.text(user_id, "board games").await;
        self.photo(user_id, &format!("reach-{}", user_id)).await;
    }

    /// Profile plus task.
    pub async fn onboard(&self, user_id: i64, name: &str) {
        self.fill_profile(user_id, name).await;
        self.text(user_id, buttons::GET_TASK).await;
    }

    pub async fn submit_links(&self, user_id: i64, links: &str) {
        self.text(user_id, buttons::TASK_DONE).await;
        self.text(user_id, links).await;
    }

    /// Payout wizard for a receipt-photo platform.
    pub async fn request_receipt_payout(&self, user_id: i64) {
        self.text(user_id, buttons::REQUEST_PAYOUT).await;
        self.photo(user_id, &format!("review-{}", user_id)).await;
        self.photo(user_id, &format!("barcode-{}", user_id)).await;
        self.photo(user_id, &format!("receipt-{}", user_id)).await;
        self.text(user_id, CARD_DETAILS).await;
    }
}

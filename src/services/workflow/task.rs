//! Start, restart, task assignment and decline.

use blogger_flow_core::OrderStatus;
use chrono::Duration;
use serde_json::json;
use tracing::info;

use super::{Input, Workflow};
use crate::models::conversation::ConversationState;
use crate::services::remote::response_mapper::ResponseMapper;
use crate::services::remote::types::{IncomingUpdate, OutgoingMessage};
use crate::utils::error::{AppError, AppResult};

impl Workflow {
    pub(crate) async fn start(
        &self,
        update: &IncomingUpdate,
        referral: Option<&str>,
    ) -> AppResult<()> {
        if let Some(referrer) = referral {
            if self
                .db
                .record_referral(update.user_id, referrer, Self::now(update))?
            {
                self.audit(
                    "referral",
                    update.user_id,
                    json!({ "referrer": referrer }),
                );
            }
        }

        let text = ResponseMapper::start_text(
            ResponseMapper::random_greeting(),
            self.config.payout_days,
        );
        self.reply_with_menu(update, text).await
    }

    pub(crate) async fn restart(&self, update: &IncomingUpdate) -> AppResult<()> {
        self.send(update.chat_id, "🔁 Restarting. Let's start over.")
            .await?;
        self.start(update, None).await
    }

    pub(crate) async fn whoami(&self, update: &IncomingUpdate) -> AppResult<()> {
        let username = update
            .username
            .as_deref()
            .map(|u| format!("@{}", u))
            .unwrap_or_else(|| "-".to_string());
        self.send(
            update.chat_id,
            format!("Your id: {}\nUsername: {}", update.user_id, username),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn contact(&self, update: &IncomingUpdate) -> AppResult<()> {
        self.reply_with_menu(
            update,
            format!("📞 Manager contact: {}", self.config.manager_contact),
        )
        .await
    }

    pub(crate) async fn get_task(&self, update: &IncomingUpdate) -> AppResult<()> {
        if !self.db.has_profile(update.user_id)? {
            return self
                .reply_with_menu(update, "Fill in the profile first 📋")
                .await;
        }
        if let Some(order) = self.db.get_order(update.user_id)? {
            return self
                .reply_with_menu(
                    update,
                    format!(
                        "The task has already been issued.\nPlatform: {}\nDeadline: {}\nStatus: {}",
                        order.platform, order.deadline, order.status
                    ),
                )
                .await;
        }

        let now = Self::now(update);
        let today = now.date_naive();
        let order = self.db.assign_order(
            update.user_id,
            &self.config.platform_names(),
            today + Duration::days(self.config.order_offset_days),
            today + Duration::days(self.config.deadline_offset_days),
            now,
        )?;
        info!(user_id = update.user_id, platform = %order.platform, "Task assigned");
        self.audit(
            "tz_assigned",
            update.user_id,
            json!({ "platform": order.platform, "deadline": order.deadline }),
        );

        let brief = ResponseMapper::task_brief(
            &order,
            &self.config.task_keyword,
            self.config.payout_days,
        );
        let menu = self.menu_for(update.user_id).await?;
        self.send(update.chat_id, OutgoingMessage::html(brief).with_markup(menu))
            .await?;
        Ok(())
    }

    pub(crate) async fn start_decline(&self, update: &IncomingUpdate) -> AppResult<()> {
        match self.db.get_order(update.user_id)? {
            Some(order) if order.status == OrderStatus::Assigned => {
                self.db
                    .set_conversation(update.chat_id, &ConversationState::AwaitingDeclineReason)?;
                self.send(
                    update.chat_id,
                    "Sorry to hear that. Please tell us why you are declining (one message).",
                )
                .await?;
                Ok(())
            }
            Some(_) => {
                self.reply_with_menu(update, "This task can no longer be declined.")
                    .await
            }
            None => self.reply_with_menu(update, "You have no active task.").await,
        }
    }

    pub(crate) async fn receive_decline_reason(
        &self,
        update: &IncomingUpdate,
        input: Input<'_>,
    ) -> AppResult<()> {
        let reason = match input {
            Input::Text(text) if !text.trim().is_empty() => text.trim(),
            Input::Text(_) => "-",
            _ => {
                self.send(update.chat_id, "Please describe the reason in text.")
                    .await?;
                return Ok(());
            }
        };

        self.db.clear_conversation(update.chat_id)?;
        match self
            .db
            .decline_order(update.user_id, reason, Self::now(update))
        {
            Ok(()) => {}
            Err(AppError::Validation(_)) | Err(AppError::NotFound(_)) => {
                return self
                    .reply_with_menu(update, "This task can no longer be declined.")
                    .await;
            }
            Err(e) => return Err(e),
        }
        self.audit(
            "decline_reason",
            update.user_id,
            json!({ "reason": reason }),
        );
        self.reply_with_menu(
            update,
            "Got it, thank you. If you change your mind, press «🔁 Restart bot».",
        )
        .await
    }
}

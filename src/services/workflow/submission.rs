//! Proof link submission.
//!
//! Links are normalized and checked against every link stored so far. A
//! repeat moves the order to `under_review` and alerts the admin; the links
//! are appended either way.

use blogger_flow_core::extract_links;
use serde_json::json;
use tracing::info;

use super::{Input, Workflow};
use crate::models::conversation::ConversationState;
use crate::services::remote::types::IncomingUpdate;
use crate::utils::error::{AppError, AppResult};

impl Workflow {
    pub(crate) async fn task_done(&self, update: &IncomingUpdate) -> AppResult<()> {
        let Some(order) = self.db.get_order(update.user_id)? else {
            return self.reply_with_menu(update, "Get the task first 📝").await;
        };
        if !order.status.accepts_links() {
            return self
                .reply_with_menu(update, "Links can no longer be added to this task.")
                .await;
        }

        self.db
            .set_conversation(update.chat_id, &ConversationState::AwaitingLinks)?;
        self.send(
            update.chat_id,
            "Send the links to your review and Reels. Several links can go in one message, \
             separated by spaces or new lines.",
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn receive_links(
        &self,
        update: &IncomingUpdate,
        input: Input<'_>,
    ) -> AppResult<()> {
        let text = match input {
            Input::Text(text) if !text.trim().is_empty() => text,
            Input::Text(_) => {
                self.send(update.chat_id, "The message is empty. Send the links.")
                    .await?;
                return Ok(());
            }
            _ => {
                self.send(update.chat_id, "Send the links as a text message.")
                    .await?;
                return Ok(());
            }
        };

        let links = extract_links(text);
        if links.is_empty() {
            self.send(
                update.chat_id,
                "No links found. Links must start with http:// or https://",
            )
            .await?;
            return Ok(());
        }

        let submission = match self
            .db
            .submit_links(update.user_id, &links, Self::now(update))
        {
            Ok(submission) => submission,
            Err(AppError::Validation(_)) | Err(AppError::NotFound(_)) => {
                self.db.clear_conversation(update.chat_id)?;
                return self
                    .reply_with_menu(update, "Links can no longer be added to this task.")
                    .await;
            }
            Err(e) => return Err(e),
        };
        self.db.clear_conversation(update.chat_id)?;
        info!(
            user_id = update.user_id,
            links = links.len(),
            duplicates = submission.duplicates.len(),
            status = %submission.order.status,
            "Links submitted"
        );

        let mut reply = String::from("Links received ✅ Now you can request the payout.");
        if !submission.duplicates.is_empty() {
            let profile = self.db.get_profile(update.user_id)?;
            let name = profile
                .as_ref()
                .map(|p| p.display_name.as_str())
                .unwrap_or("-");
            let listed = submission
                .duplicates
                .iter()
                .map(|l| format!("- {}", l))
                .collect::<Vec<_>>()
                .join("\n");
            self.notify_admin(format!(
                "⚠️ Duplicate links from user:\n{}\n\nName: {}\nuser_id: {}",
                listed, name, update.user_id
            ))
            .await;
            self.audit(
                "links_duplicate",
                update.user_id,
                json!({ "links": submission.duplicates }),
            );
            reply.push_str("\nSome links were submitted before, the manager will check them.");
        }

        self.reply_with_menu(update, reply).await
    }
}

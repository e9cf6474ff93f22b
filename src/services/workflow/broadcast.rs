//! Broadcasts to every blogger or one segment.
//!
//! Text, then a preview with the recipient count, then confirm or cancel.
//! Recipients are fixed when the preview is shown.

use std::time::Duration;

use blogger_flow_core::{segment_members, Segment, UserId};
use serde_json::json;
use tracing::{info, warn};

use super::{Input, Workflow};
use crate::models::conversation::{BroadcastTarget, ConversationState};
use crate::services::remote::response_mapper::ResponseMapper;
use crate::services::remote::types::{IncomingUpdate, OutgoingMessage};
use crate::utils::error::AppResult;

/// Pause between two deliveries.
const DELIVERY_PAUSE: Duration = Duration::from_millis(50);

impl Workflow {
    pub(crate) async fn start_global_broadcast(&self, update: &IncomingUpdate) -> AppResult<()> {
        self.start_broadcast(update, BroadcastTarget::All).await
    }

    pub(crate) async fn start_segment_broadcast(
        &self,
        update: &IncomingUpdate,
        segment: Segment,
    ) -> AppResult<()> {
        self.start_broadcast(update, BroadcastTarget::Segment(segment))
            .await
    }

    async fn start_broadcast(
        &self,
        update: &IncomingUpdate,
        target: BroadcastTarget,
    ) -> AppResult<()> {
        self.db.set_conversation(
            update.chat_id,
            &ConversationState::AdminBroadcastText { target },
        )?;
        self.send(
            update.chat_id,
            format!("Send the broadcast text for «{}».", target.label()),
        )
        .await?;
        Ok(())
    }

    fn recipients_for(&self, target: BroadcastTarget) -> AppResult<Vec<UserId>> {
        match target {
            BroadcastTarget::All => Ok(self
                .db
                .list_profiles()?
                .into_iter()
                .map(|p| p.user_id)
                .collect()),
            BroadcastTarget::Segment(segment) => {
                let snapshot = self.db.load_snapshot()?;
                Ok(segment_members(&snapshot, segment))
            }
        }
    }

    pub(crate) async fn receive_broadcast_text(
        &self,
        update: &IncomingUpdate,
        target: BroadcastTarget,
        input: Input<'_>,
    ) -> AppResult<()> {
        let text = match input {
            Input::Text(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => {
                self.send(update.chat_id, "Send the broadcast as text.")
                    .await?;
                return Ok(());
            }
        };

        let recipients = self.recipients_for(target)?;
        if recipients.is_empty() {
            self.db.clear_conversation(update.chat_id)?;
            return self
                .reply_admin_menu(update, format!("No recipients in «{}».", target.label()))
                .await;
        }

        let preview = ResponseMapper::broadcast_preview(target.label(), &text, recipients.len());
        let keyboard = ResponseMapper::broadcast_confirm_keyboard(recipients.len());
        self.db.set_conversation(
            update.chat_id,
            &ConversationState::BroadcastPreview {
                target,
                text,
                recipients,
            },
        )?;
        self.send(
            update.chat_id,
            OutgoingMessage::plain(preview).with_markup(keyboard),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn confirm_broadcast(
        &self,
        update: &IncomingUpdate,
        confirmed: bool,
        preview_message_id: Option<i64>,
    ) -> AppResult<()> {
        let ConversationState::BroadcastPreview {
            target,
            text,
            recipients,
        } = self.db.get_conversation(update.chat_id)?
        else {
            self.send(
                update.chat_id,
                "This preview has expired. Start the broadcast again.",
            )
            .await?;
            return Ok(());
        };

        self.db.clear_conversation(update.chat_id)?;
        if let Some(message_id) = preview_message_id {
            if let Err(e) = self
                .adapter
                .edit_reply_markup(update.chat_id, message_id, None)
                .await
            {
                warn!(error = %e, "Failed to remove preview buttons");
            }
        }

        if !confirmed {
            return self.reply_admin_menu(update, "Broadcast cancelled.").await;
        }

        let message = OutgoingMessage::plain(text);
        let mut delivered = 0usize;
        let mut failed: Vec<UserId> = Vec::new();
        for (i, user_id) in recipients.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(DELIVERY_PAUSE).await;
            }
            match self.adapter.send_message(*user_id, &message).await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    warn!(user_id, error = %e, "Broadcast delivery failed");
                    failed.push(*user_id);
                }
            }
        }

        info!(broadcast_target = target.label(), delivered, failed = failed.len(), "Broadcast finished");
        self.audit(
            "broadcast",
            update.user_id,
            json!({
                "target": target,
                "delivered": delivered,
                "failed": failed.len(),
            }),
        );
        self.reply_admin_menu(update, ResponseMapper::broadcast_report(delivered, &failed))
            .await
    }
}

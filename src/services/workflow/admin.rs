//! Staff console: lookups, summaries, exports and payout confirmation.

use blogger_flow_core::{compute_segments, funnel_stats, parse_date_range, Segment, UserId};
use serde_json::json;
use tracing::{info, warn};

use super::{Input, Workflow};
use crate::models::conversation::ConversationState;
use crate::services::remote::response_mapper::ResponseMapper;
use crate::services::remote::types::{IncomingUpdate, OutgoingMessage};
use crate::utils::error::{AppError, AppResult};

const FIND_LIMIT: usize = 20;
const DRAFTS_SHOWN: usize = 5;
const TOP_REFERRERS: usize = 20;
const STATS_USAGE: &str = "Format: /stats 01.08.2025-11.08.2025";

impl Workflow {
    pub(crate) async fn admin_menu(&self, update: &IncomingUpdate) -> AppResult<()> {
        self.reply_admin_menu(update, "👑 Admin menu").await
    }

    pub(crate) async fn admin_back(&self, update: &IncomingUpdate) -> AppResult<()> {
        self.reply_with_menu(update, "Main menu").await
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub(crate) async fn start_status_lookup(&self, update: &IncomingUpdate) -> AppResult<()> {
        self.db
            .set_conversation(update.chat_id, &ConversationState::AdminStatusLookup)?;
        self.send(update.chat_id, "Send the user_id.").await?;
        Ok(())
    }

    pub(crate) async fn receive_status_lookup(
        &self,
        update: &IncomingUpdate,
        input: Input<'_>,
    ) -> AppResult<()> {
        let Some(user_id) = parse_user_id(input) else {
            self.send(update.chat_id, "user_id must be a number.").await?;
            return Ok(());
        };
        self.db.clear_conversation(update.chat_id)?;
        self.send_user_status(update, user_id).await
    }

    pub(crate) async fn find_id(&self, update: &IncomingUpdate, raw: &str) -> AppResult<()> {
        if raw.trim().is_empty() {
            self.send(update.chat_id, "Usage: /findid <user_id>").await?;
            return Ok(());
        }
        match raw.trim().parse::<UserId>() {
            Ok(user_id) => self.send_user_status(update, user_id).await,
            Err(_) => {
                self.send(update.chat_id, "user_id must be a number.").await?;
                Ok(())
            }
        }
    }

    async fn send_user_status(&self, update: &IncomingUpdate, user_id: UserId) -> AppResult<()> {
        let profile = self.db.get_profile(user_id)?;
        let order = self.db.get_order(user_id)?;
        if profile.is_none() && order.is_none() {
            self.send(update.chat_id, "User not found.").await?;
            return Ok(());
        }
        let referral = self.db.referral_of(user_id)?;
        let text = ResponseMapper::user_status(
            user_id,
            profile.as_ref(),
            order.as_ref(),
            referral.as_deref(),
        );
        self.send(update.chat_id, text).await?;
        Ok(())
    }

    pub(crate) async fn find(&self, update: &IncomingUpdate, query: &str) -> AppResult<()> {
        if query.trim().is_empty() {
            self.send(update.chat_id, "Usage: /find <name>").await?;
            return Ok(());
        }
        let found = self.db.find_profiles_by_name(query, FIND_LIMIT)?;
        if found.is_empty() {
            self.send(update.chat_id, "Nothing found.").await?;
            return Ok(());
        }
        let mut lines = vec!["🔎 Found:".to_string()];
        for profile in &found {
            let username = profile
                .tg_username
                .as_deref()
                .map(|u| format!(" @{}", u))
                .unwrap_or_default();
            lines.push(format!(
                "• {} (id: {}){}",
                profile.display_name, profile.user_id, username
            ));
        }
        self.send(update.chat_id, lines.join("\n")).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Overviews
    // ------------------------------------------------------------------------

    pub(crate) async fn summary(&self, update: &IncomingUpdate) -> AppResult<()> {
        let snapshot = self.db.load_snapshot()?;
        let segments = compute_segments(&snapshot);
        let text = ResponseMapper::summary(&segments, &snapshot);
        self.send(
            update.chat_id,
            OutgoingMessage::plain(text).with_markup(ResponseMapper::summary_keyboard()),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn unpaid(&self, update: &IncomingUpdate) -> AppResult<()> {
        let payments = self.db.list_unpaid()?;
        let snapshot = self.db.load_snapshot()?;
        self.send(
            update.chat_id,
            ResponseMapper::unpaid_list(&payments, &snapshot),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn referrals(&self, update: &IncomingUpdate) -> AppResult<()> {
        let top = self.db.top_referrers(TOP_REFERRERS)?;
        self.send(update.chat_id, ResponseMapper::referrals_list(&top))
            .await?;
        Ok(())
    }

    pub(crate) async fn stats(&self, update: &IncomingUpdate, range: &str) -> AppResult<()> {
        if range.trim().is_empty() {
            self.send(update.chat_id, STATS_USAGE).await?;
            return Ok(());
        }
        let Ok((from, to)) = parse_date_range(range) else {
            self.send(update.chat_id, STATS_USAGE).await?;
            return Ok(());
        };
        let snapshot = self.db.load_snapshot()?;
        let stats = funnel_stats(&snapshot, from, to);
        self.send(update.chat_id, ResponseMapper::stats_text(&stats))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Drafts
    // ------------------------------------------------------------------------

    pub(crate) async fn start_draft(&self, update: &IncomingUpdate) -> AppResult<()> {
        self.db
            .set_conversation(update.chat_id, &ConversationState::AdminDraftText)?;
        self.send(update.chat_id, "Send the draft text.").await?;
        Ok(())
    }

    pub(crate) async fn receive_draft(
        &self,
        update: &IncomingUpdate,
        input: Input<'_>,
    ) -> AppResult<()> {
        let Input::Text(text) = input else {
            self.send(update.chat_id, "Drafts are text only.").await?;
            return Ok(());
        };
        self.db.save_draft(text, Self::now(update))?;
        self.db.clear_conversation(update.chat_id)?;
        self.reply_admin_menu(update, "Draft saved ✅").await
    }

    pub(crate) async fn drafts(&self, update: &IncomingUpdate) -> AppResult<()> {
        let drafts = self.db.list_drafts(DRAFTS_SHOWN)?;
        self.send(update.chat_id, ResponseMapper::drafts_list(&drafts))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Exports
    // ------------------------------------------------------------------------

    pub(crate) async fn export_all(&self, update: &IncomingUpdate) -> AppResult<()> {
        let files = self.exporter.export_all(&self.db)?;
        for file in files {
            let caption = format!("{} rows", file.rows);
            self.adapter
                .send_document(update.chat_id, &file.file_name, file.data, Some(&caption))
                .await?;
        }
        info!(user_id = update.user_id, "Full export sent");
        self.reply_admin_menu(update, "📤 Export ready.").await
    }

    pub(crate) async fn export_segment(
        &self,
        update: &IncomingUpdate,
        segment: Segment,
    ) -> AppResult<()> {
        let file = self.exporter.export_segment(&self.db, segment)?;
        let caption = format!("🧾 {}: {}", segment.label(), file.rows);
        self.adapter
            .send_document(update.chat_id, &file.file_name, file.data, Some(&caption))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Payout confirmation
    // ------------------------------------------------------------------------

    pub(crate) async fn pay_done(
        &self,
        update: &IncomingUpdate,
        payment_id: &str,
        card_message_id: Option<i64>,
    ) -> AppResult<()> {
        let Some(payment) = self.db.get_payment(payment_id)? else {
            self.send(update.chat_id, format!("Request #{} not found.", payment_id))
                .await?;
            return Ok(());
        };
        if !payment.status.is_active() {
            self.send(
                update.chat_id,
                format!("Request #{} is already paid.", payment_id),
            )
            .await?;
            return Ok(());
        }

        if let Some(message_id) = card_message_id {
            let markup = ResponseMapper::awaiting_receipt_keyboard(payment_id);
            if let Err(e) = self
                .adapter
                .edit_reply_markup(update.chat_id, message_id, Some(&markup))
                .await
            {
                warn!(payment_id, error = %e, "Failed to update payout card");
            }
        }

        self.db.set_conversation(
            update.chat_id,
            &ConversationState::AdminAwaitingReceipt {
                payment_id: payment_id.to_string(),
            },
        )?;
        self.send(
            update.chat_id,
            format!("Send a photo of the payment receipt for #{}.", payment_id),
        )
        .await?;
        Ok(())
    }

    /// Close the payout: mark it paid, then tell the blogger.
    pub(crate) async fn receive_receipt(
        &self,
        update: &IncomingUpdate,
        payment_id: &str,
        input: Input<'_>,
    ) -> AppResult<()> {
        let Input::Photo(file_id) = input else {
            self.send(update.chat_id, "Send the receipt as a photo.").await?;
            return Ok(());
        };

        let now = Self::now(update);
        self.db.clear_conversation(update.chat_id)?;
        let payment = match self.db.confirm_payment(payment_id, now) {
            Ok(payment) => payment,
            Err(AppError::Validation(_)) | Err(AppError::NotFound(_)) => {
                return self
                    .reply_admin_menu(
                        update,
                        format!("Request #{} is already closed or missing.", payment_id),
                    )
                    .await;
            }
            Err(e) => return Err(e),
        };

        let receipt_name = format!("receipt_{}.jpg", payment.id);
        if let Err(e) = self
            .media
            .store(
                self.adapter.as_ref(),
                &self.db,
                payment.user_id,
                file_id,
                &receipt_name,
                now,
            )
            .await
        {
            warn!(payment_id, error = %e, "Could not store payout receipt");
        }

        info!(payment_id, user_id = payment.user_id, "Payout confirmed");
        self.audit(
            "payment_paid",
            update.user_id,
            json!({ "payment_id": payment.id, "user_id": payment.user_id }),
        );
        self.refresh_payments_export();

        let notice = format!("✅ Payout done for request #{}. Thank you!", payment.id);
        let delivered = match self.send(payment.user_id, notice).await {
            Ok(_) => {
                if let Err(e) = self
                    .adapter
                    .send_photo(payment.user_id, file_id, Some("Payment receipt"))
                    .await
                {
                    warn!(payment_id, error = %e, "Failed to send receipt to blogger");
                }
                true
            }
            Err(e) => {
                warn!(payment_id, error = %e, "Failed to notify blogger about payout");
                false
            }
        };

        if let Some(card_id) = payment.admin_message_id {
            let closed = format!("✅ Paid\n\nRequest #{} closed", payment.id);
            if let Err(e) = self
                .adapter
                .edit_message(self.access.admin_id(), card_id, &closed)
                .await
            {
                warn!(payment_id, error = %e, "Failed to close payout card");
            }
        }

        let reply = if delivered {
            "Done. The user has been notified."
        } else {
            "Marked as paid, but the user could not be notified."
        };
        self.reply_admin_menu(update, reply).await
    }

    // ------------------------------------------------------------------------
    // Support messages
    // ------------------------------------------------------------------------

    pub(crate) async fn start_support(
        &self,
        update: &IncomingUpdate,
        payment_id: &str,
        user_id: UserId,
    ) -> AppResult<()> {
        self.db.set_conversation(
            update.chat_id,
            &ConversationState::AdminSupportText {
                payment_id: payment_id.to_string(),
                user_id,
            },
        )?;
        self.send(
            update.chat_id,
            format!(
                "Write the message for user {} (request #{}).",
                user_id, payment_id
            ),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn receive_support_text(
        &self,
        update: &IncomingUpdate,
        payment_id: &str,
        user_id: UserId,
        input: Input<'_>,
    ) -> AppResult<()> {
        let Input::Text(text) = input else {
            self.send(update.chat_id, "Send the message as text.").await?;
            return Ok(());
        };

        self.db.clear_conversation(update.chat_id)?;
        let message = format!("📨 Message from support:\n\n{}", text);
        if let Err(e) = self.send(user_id, message).await {
            warn!(user_id, error = %e, "Failed to deliver support message");
            return self
                .reply_admin_menu(update, "Could not deliver the message.")
                .await;
        }
        self.audit(
            "support_message",
            update.user_id,
            json!({ "payment_id": payment_id, "user_id": user_id }),
        );
        self.reply_admin_menu(update, "Sent ✅").await
    }
}

fn parse_user_id(input: Input<'_>) -> Option<UserId> {
    match input {
        Input::Text(text) => text.trim().parse().ok(),
        _ => None,
    }
}

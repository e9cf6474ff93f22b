//! Payout request wizard.
//!
//! Collects the review screenshot, the barcode photo, the platform's purchase
//! proof and the card details, then files the request and sends the admin a
//! card with the confirmation buttons.

use blogger_flow_core::{is_card_like, is_marketplace_order_no, Payment, UserId};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use super::{Input, Workflow};
use crate::models::conversation::{ConversationState, PayoutDraft, PayoutStep};
use crate::models::settings::ProofKind;
use crate::services::remote::response_mapper::ResponseMapper;
use crate::services::remote::types::{IncomingUpdate, OutgoingMessage};
use crate::storage::PaymentRequest;
use crate::utils::error::{AppError, AppResult};

const PROMPT_BARCODE: &str = "2) Send a photo of the barcode cut out of the package.";
const PROMPT_ORDER_NUMBER: &str = "3) Send the marketplace order number.";
const PROMPT_RECEIPT: &str = "3) Send a photo of the purchase receipt.";
const PROMPT_DETAILS: &str = "4) Send the payout details: card number plus the holder's first \
                              and last name, e.g. 2200 1234 5678 9012 Ivan Petrov";
const NOT_A_PHOTO: &str = "This is not a photo. Please send a photo.";

impl Workflow {
    pub(crate) async fn request_payout(&self, update: &IncomingUpdate) -> AppResult<()> {
        if !self.db.has_profile(update.user_id)? {
            return self
                .reply_with_menu(update, "Fill in the profile first 📋")
                .await;
        }
        let Some(order) = self.db.get_order(update.user_id)? else {
            return self.reply_with_menu(update, "Get the task first 📝").await;
        };
        if !order.status.allows_payout() {
            return self
                .reply_with_menu(update, "Send the links first (✅ Task done).")
                .await;
        }
        if let Some(active) = self.db.active_payment_for(update.user_id)? {
            return self
                .reply_with_menu(
                    update,
                    format!(
                        "You already have payout request #{} ({}). Please wait for it to be processed.",
                        active.id, active.status
                    ),
                )
                .await;
        }

        self.db
            .set_conversation(update.chat_id, &ConversationState::payout_start())?;
        self.send(
            update.chat_id,
            format!("1) Send a screenshot of your review on {}.", order.platform),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn payout_step(
        &self,
        update: &IncomingUpdate,
        step: PayoutStep,
        mut draft: PayoutDraft,
        input: Input<'_>,
    ) -> AppResult<()> {
        let now = Self::now(update);
        let (next, prompt) = match (step, input) {
            (PayoutStep::ReviewScreenshot, Input::Photo(file_id)) => {
                self.store_proof(update.user_id, file_id, "review", now).await;
                draft.review_file_id = Some(file_id.to_string());
                (PayoutStep::Barcode, PROMPT_BARCODE)
            }
            (PayoutStep::Barcode, Input::Photo(file_id)) => {
                self.store_proof(update.user_id, file_id, "barcode", now).await;
                draft.barcode_file_id = Some(file_id.to_string());
                let platform = self
                    .db
                    .get_order(update.user_id)?
                    .map(|o| o.platform)
                    .unwrap_or_default();
                match self.config.proof_kind(&platform) {
                    ProofKind::OrderNumber => (PayoutStep::OrderNumber, PROMPT_ORDER_NUMBER),
                    ProofKind::ReceiptPhoto => (PayoutStep::ReceiptPhoto, PROMPT_RECEIPT),
                }
            }
            (PayoutStep::OrderNumber, Input::Text(text)) => {
                let order_no = text.trim();
                if !is_marketplace_order_no(order_no) {
                    self.send(
                        update.chat_id,
                        "This does not look like an order number. Use letters, digits and \
                         hyphens, at least 6 characters.",
                    )
                    .await?;
                    return Ok(());
                }
                draft.marketplace_order_no = Some(order_no.to_string());
                (PayoutStep::Details, PROMPT_DETAILS)
            }
            (PayoutStep::ReceiptPhoto, Input::Photo(file_id)) => {
                self.store_proof(update.user_id, file_id, "receipt", now).await;
                draft.receipt_file_id = Some(file_id.to_string());
                (PayoutStep::Details, PROMPT_DETAILS)
            }
            (PayoutStep::Details, Input::Text(text)) => {
                let details = text.trim();
                if !is_card_like(details) {
                    self.send(
                        update.chat_id,
                        "Details not recognized. Send the card number and the holder's first \
                         and last name.",
                    )
                    .await?;
                    return Ok(());
                }
                return self.finish_payout(update, draft, details).await;
            }
            (PayoutStep::OrderNumber, _) | (PayoutStep::Details, _) => {
                self.send(update.chat_id, "Please answer with text.").await?;
                return Ok(());
            }
            (_, _) => {
                self.send(update.chat_id, NOT_A_PHOTO).await?;
                return Ok(());
            }
        };

        self.db.set_conversation(
            update.chat_id,
            &ConversationState::Payout { step: next, draft },
        )?;
        self.send(update.chat_id, prompt).await?;
        Ok(())
    }

    async fn finish_payout(
        &self,
        update: &IncomingUpdate,
        draft: PayoutDraft,
        details: &str,
    ) -> AppResult<()> {
        let request = PaymentRequest {
            user_id: update.user_id,
            review_file_id: draft.review_file_id,
            barcode_file_id: draft.barcode_file_id,
            receipt_file_id: draft.receipt_file_id,
            marketplace_order_no: draft.marketplace_order_no,
            details: details.to_string(),
        };

        self.db.clear_conversation(update.chat_id)?;
        let payment = match self.db.create_payment(&request, Self::now(update)) {
            Ok(payment) => payment,
            Err(AppError::Validation(msg)) | Err(AppError::NotFound(msg)) => {
                warn!(user_id = update.user_id, reason = %msg, "Payout request rejected");
                return self
                    .reply_with_menu(update, "The payout request cannot be filed right now.")
                    .await;
            }
            Err(e) => return Err(e),
        };

        info!(user_id = update.user_id, payment_id = %payment.id, status = %payment.status, "Payout requested");
        self.audit(
            "payment_requested",
            update.user_id,
            json!({ "payment_id": payment.id, "status": payment.status }),
        );
        self.refresh_payments_export();

        self.reply_with_menu(update, ResponseMapper::payout_requested(&payment))
            .await?;
        self.send_payout_card(&payment).await?;
        Ok(())
    }

    /// Forward the attachments and the card to the admin.
    async fn send_payout_card(&self, payment: &Payment) -> AppResult<()> {
        let admin_id = self.access.admin_id();
        if admin_id == 0 {
            return Ok(());
        }

        let photos: Vec<String> = payment
            .photo_file_ids()
            .into_iter()
            .map(str::to_string)
            .collect();
        if !photos.is_empty() {
            if let Err(e) = self.adapter.send_media_group(admin_id, &photos).await {
                warn!(payment_id = %payment.id, error = %e, "Failed to forward payout attachments");
            }
        }

        let name = self
            .db
            .get_profile(payment.user_id)?
            .map(|p| p.display_name)
            .unwrap_or_else(|| "-".to_string());
        let card = OutgoingMessage::plain(ResponseMapper::payout_card(payment, &name))
            .with_markup(ResponseMapper::payout_card_keyboard(payment));
        if let Some(message_id) = self.notify_admin(card).await {
            self.db.set_payment_admin_message(&payment.id, message_id)?;
        }
        Ok(())
    }

    /// Keep a local copy of a payout photo and alert the admin on reuse.
    async fn store_proof(&self, user_id: UserId, file_id: &str, kind: &str, now: DateTime<Utc>) {
        let name = format!("{}.jpg", kind);
        match self
            .media
            .store(self.adapter.as_ref(), &self.db, user_id, file_id, &name, now)
            .await
        {
            Ok(stored) if stored.duplicate => {
                self.notify_admin(format!("⚠️ Duplicate media ({}) from {}", kind, user_id))
                    .await;
            }
            Ok(_) => {}
            Err(e) => warn!(user_id, kind, error = %e, "Could not store payout photo"),
        }
    }
}

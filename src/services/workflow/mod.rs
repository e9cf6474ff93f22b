//! Blogger Workflow
//!
//! Turns parsed updates into state changes and replies. Every handler reads
//! the persisted conversation state for the chat, applies one step and
//! writes the next state back.
//!
//! ## Architecture
//!
//! ```text
//! IncomingUpdate → Workflow::handle_update
//!                    ├─ Text  → CommandRouter::parse → command handler
//!                    │                               └─ FreeText → active wizard step
//!                    ├─ Photo → active wizard step
//!                    └─ Callback → CallbackAction::parse → staff handler
//! ```

mod admin;
mod broadcast;
mod payout;
mod profile;
mod submission;
mod task;

use std::path::Path;
use std::sync::Arc;

use blogger_flow_core::UserId;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::conversation::ConversationState;
use crate::models::settings::BotConfig;
use crate::services::access::{required_for_callback, required_for_command, AccessPolicy};
use crate::services::export::Exporter;
use crate::services::media::MediaStore;
use crate::services::remote::adapters::ChatAdapter;
use crate::services::remote::command_router::{CallbackAction, Command, CommandRouter};
use crate::services::remote::response_mapper::ResponseMapper;
use crate::services::remote::types::{IncomingUpdate, OutgoingMessage, ReplyMarkup, UpdateKind};
use crate::storage::Database;
use crate::utils::error::AppResult;
use crate::utils::paths::media_dir;

const NO_RIGHTS: &str = "⛔ Not enough rights.";

/// Non-command content fed to a wizard step.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Input<'a> {
    Text(&'a str),
    Photo(&'a str),
    Other,
}

/// The conversation engine.
pub struct Workflow {
    pub(crate) db: Arc<Database>,
    pub(crate) adapter: Arc<dyn ChatAdapter>,
    pub(crate) config: Arc<BotConfig>,
    pub(crate) access: AccessPolicy,
    pub(crate) exporter: Exporter,
    pub(crate) media: MediaStore,
}

impl Workflow {
    /// Exports and media land under `data_dir`.
    pub fn new(
        db: Arc<Database>,
        adapter: Arc<dyn ChatAdapter>,
        config: BotConfig,
        data_dir: &Path,
    ) -> Self {
        Self {
            access: AccessPolicy::from_config(&config),
            exporter: Exporter::new(data_dir),
            media: MediaStore::new(media_dir(data_dir)),
            db,
            adapter,
            config: Arc::new(config),
        }
    }

    pub fn access(&self) -> &AccessPolicy {
        &self.access
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Process one update end to end.
    pub async fn handle_update(&self, update: &IncomingUpdate) -> AppResult<()> {
        match &update.kind {
            UpdateKind::Text(text) => match CommandRouter::parse(text) {
                Command::FreeText(text) => self.handle_input(update, Input::Text(&text)).await,
                command => self.handle_command(update, command).await,
            },
            UpdateKind::Photo { file_id, .. } => {
                self.handle_input(update, Input::Photo(file_id)).await
            }
            UpdateKind::Callback {
                query_id,
                data,
                message_id,
            } => {
                self.handle_callback(update, query_id, data, *message_id)
                    .await
            }
            UpdateKind::Other => self.handle_input(update, Input::Other).await,
        }
    }

    async fn handle_command(&self, update: &IncomingUpdate, command: Command) -> AppResult<()> {
        if let Some(capability) = required_for_command(&command) {
            if !self.access.can(update.user_id, capability) {
                warn!(user_id = update.user_id, command = command.name(), "Staff command refused");
                return self.send(update.chat_id, NO_RIGHTS).await.map(|_| ());
            }
        }

        // A recognized command always interrupts the active wizard.
        self.db.clear_conversation(update.chat_id)?;
        debug!(user_id = update.user_id, command = command.name(), "Command");

        match command {
            Command::Start { referral } => self.start(update, referral.as_deref()).await,
            Command::Restart => self.restart(update).await,
            Command::WhoAmI => self.whoami(update).await,
            Command::Contact => self.contact(update).await,
            Command::FillProfile => self.start_profile(update).await,
            Command::GetTask => self.get_task(update).await,
            Command::TaskDone => self.task_done(update).await,
            Command::Decline => self.start_decline(update).await,
            Command::RequestPayout => self.request_payout(update).await,
            Command::Admin => self.admin_menu(update).await,
            Command::AdminBack => self.admin_back(update).await,
            Command::AdminUserStatus => self.start_status_lookup(update).await,
            Command::Find { query } => self.find(update, &query).await,
            Command::FindId { user_id } => self.find_id(update, &user_id).await,
            Command::AdminSummary => self.summary(update).await,
            Command::AdminUnpaid => self.unpaid(update).await,
            Command::AdminSaveDraft => self.start_draft(update).await,
            Command::AdminDrafts => self.drafts(update).await,
            Command::AdminReferrals => self.referrals(update).await,
            Command::Stats { range } => self.stats(update, &range).await,
            Command::AdminExport => self.export_all(update).await,
            Command::AdminBroadcast => self.start_global_broadcast(update).await,
            // Routed to the active wizard by handle_update
            Command::FreeText(_) => Ok(()),
        }
    }

    async fn handle_input(&self, update: &IncomingUpdate, input: Input<'_>) -> AppResult<()> {
        let state = self.db.get_conversation(update.chat_id)?;
        debug!(chat_id = update.chat_id, state = state.name(), "Wizard input");

        match state {
            ConversationState::Idle => {
                self.reply_with_menu(update, "Choose an action from the menu 👇")
                    .await
            }
            ConversationState::Profile { step, draft } => {
                self.profile_step(update, step, draft, input).await
            }
            ConversationState::AwaitingLinks => self.receive_links(update, input).await,
            ConversationState::AwaitingDeclineReason => {
                self.receive_decline_reason(update, input).await
            }
            ConversationState::Payout { step, draft } => {
                self.payout_step(update, step, draft, input).await
            }
            ConversationState::AdminStatusLookup => self.receive_status_lookup(update, input).await,
            ConversationState::AdminAwaitingReceipt { payment_id } => {
                self.receive_receipt(update, &payment_id, input).await
            }
            ConversationState::AdminSupportText {
                payment_id,
                user_id,
            } => {
                self.receive_support_text(update, &payment_id, user_id, input)
                    .await
            }
            ConversationState::AdminBroadcastText { target } => {
                self.receive_broadcast_text(update, target, input).await
            }
            ConversationState::AdminDraftText => self.receive_draft(update, input).await,
            ConversationState::BroadcastPreview { .. } => self
                .send(
                    update.chat_id,
                    "Use the buttons under the preview to send or cancel the broadcast.",
                )
                .await
                .map(|_| ()),
        }
    }

    async fn handle_callback(
        &self,
        update: &IncomingUpdate,
        query_id: &str,
        data: &str,
        message_id: Option<i64>,
    ) -> AppResult<()> {
        let Some(action) = CallbackAction::parse(data) else {
            debug!(data, "Unknown callback data");
            self.answer(query_id, None).await;
            return Ok(());
        };

        if !self.access.can(update.user_id, required_for_callback(&action)) {
            warn!(user_id = update.user_id, data, "Staff callback refused");
            self.answer(query_id, Some(NO_RIGHTS)).await;
            return Ok(());
        }
        self.answer(query_id, None).await;

        match action {
            CallbackAction::PayDone { payment_id } => {
                self.pay_done(update, &payment_id, message_id).await
            }
            CallbackAction::Support {
                payment_id,
                user_id,
            } => self.start_support(update, &payment_id, user_id).await,
            CallbackAction::BroadcastConfirm { confirmed } => {
                self.confirm_broadcast(update, confirmed, message_id).await
            }
            CallbackAction::SegmentBroadcast(segment) => {
                self.start_segment_broadcast(update, segment).await
            }
            CallbackAction::SegmentExport(segment) => self.export_segment(update, segment).await,
        }
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    /// Main menu for a user, reflecting their profile and order.
    pub async fn menu_for(&self, user_id: UserId) -> AppResult<ReplyMarkup> {
        let has_profile = self.db.has_profile(user_id)?;
        let order = self.db.get_order(user_id)?.map(|o| o.status);
        Ok(ResponseMapper::user_menu(
            has_profile,
            order,
            self.access.is_staff(user_id),
        ))
    }

    pub(crate) async fn send(
        &self,
        chat_id: i64,
        message: impl Into<OutgoingMessage>,
    ) -> AppResult<i64> {
        Ok(self.adapter.send_message(chat_id, &message.into()).await?)
    }

    pub(crate) async fn reply_with_menu(
        &self,
        update: &IncomingUpdate,
        text: impl Into<String>,
    ) -> AppResult<()> {
        let menu = self.menu_for(update.user_id).await?;
        self.send(
            update.chat_id,
            OutgoingMessage::plain(text).with_markup(menu),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn reply_admin_menu(
        &self,
        update: &IncomingUpdate,
        text: impl Into<String>,
    ) -> AppResult<()> {
        self.send(
            update.chat_id,
            OutgoingMessage::plain(text).with_markup(ResponseMapper::admin_menu()),
        )
        .await?;
        Ok(())
    }

    /// Alert the admin; delivery failures are logged, not returned.
    pub(crate) async fn notify_admin(&self, message: impl Into<OutgoingMessage>) -> Option<i64> {
        let admin_id = self.access.admin_id();
        if admin_id == 0 {
            return None;
        }
        match self.adapter.send_message(admin_id, &message.into()).await {
            Ok(message_id) => Some(message_id),
            Err(e) => {
                warn!(admin_id, error = %e, "Failed to notify admin");
                None
            }
        }
    }

    /// Write an audit record; failures are logged only.
    pub(crate) fn audit(&self, action: &str, actor_id: UserId, payload: serde_json::Value) {
        info!(action, actor_id, "Audit");
        if let Err(e) = self.db.audit(action, actor_id, &payload) {
            warn!(action, error = %e, "Failed to write audit record");
        }
    }

    pub(crate) fn refresh_payments_export(&self) {
        if let Err(e) = self.exporter.refresh_payments_export(&self.db) {
            warn!(error = %e, "Failed to refresh payments export");
        }
    }

    async fn answer(&self, query_id: &str, text: Option<&str>) {
        if let Err(e) = self.adapter.answer_callback(query_id, text).await {
            debug!(error = %e, "Failed to answer callback");
        }
    }

    pub(crate) fn now(update: &IncomingUpdate) -> DateTime<Utc> {
        update.timestamp
    }
}

//! Bot Gateway
//!
//! Owns the adapter lifecycle and the update loop. Updates are handed to the
//! workflow one at a time, so each chat's wizard steps apply in arrival
//! order. A failing handler is logged and answered with an apology plus the
//! user's menu.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::adapters::ChatAdapter;
use super::response_mapper::{ResponseMapper, ERROR_REPLY};
use super::types::{ChatError, GatewayStatus, IncomingUpdate, OutgoingMessage};
use crate::services::workflow::Workflow;

/// Buffered updates between the adapter and the loop.
const UPDATE_BUFFER: usize = 100;

/// Update loop around one adapter.
pub struct BotGateway {
    workflow: Arc<Workflow>,
    adapter: Arc<dyn ChatAdapter>,
    status: Arc<RwLock<GatewayStatus>>,
    cancel_token: CancellationToken,
}

impl BotGateway {
    pub fn new(workflow: Arc<Workflow>, adapter: Arc<dyn ChatAdapter>) -> Self {
        Self {
            workflow,
            adapter,
            status: Arc::new(RwLock::new(GatewayStatus::default())),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get current gateway status.
    pub async fn get_status(&self) -> GatewayStatus {
        self.status.read().await.clone()
    }

    /// Token cancelled when the gateway stops.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start the adapter and spawn the processing loop.
    pub async fn start(&self) -> Result<JoinHandle<()>, ChatError> {
        let (tx, mut rx) = mpsc::channel::<IncomingUpdate>(UPDATE_BUFFER);
        self.adapter.start(tx).await?;

        let workflow = self.workflow.clone();
        let adapter = self.adapter.clone();
        let status = self.status.clone();
        let cancel = self.cancel_token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = rx.recv() => {
                        match update {
                            Some(update) => {
                                Self::process(&workflow, adapter.as_ref(), &status, &update).await;
                            }
                            None => {
                                debug!("Update channel closed");
                                break;
                            }
                        }
                    }
                    _ = cancel.cancelled() => {
                        break;
                    }
                }
            }
        });

        let mut status = self.status.write().await;
        status.running = true;
        status.connected_since = Some(chrono::Utc::now().to_rfc3339());
        info!(adapter = self.adapter.adapter_name(), "Gateway started");

        Ok(handle)
    }

    /// Handle one update outside the loop.
    pub async fn dispatch(&self, update: &IncomingUpdate) {
        Self::process(&self.workflow, self.adapter.as_ref(), &self.status, update).await;
    }

    async fn process(
        workflow: &Workflow,
        adapter: &dyn ChatAdapter,
        status: &RwLock<GatewayStatus>,
        update: &IncomingUpdate,
    ) {
        let result = workflow.handle_update(update).await;

        {
            let mut s = status.write().await;
            s.total_updates_processed += 1;
            s.last_update_at = Some(chrono::Utc::now().to_rfc3339());
            if result.is_err() {
                s.failed_updates += 1;
            }
        }

        if let Err(e) = result {
            error!(
                chat_id = update.chat_id,
                user_id = update.user_id,
                error = %e,
                "Update handler failed"
            );
            let menu = workflow
                .menu_for(update.user_id)
                .await
                .unwrap_or_else(|_| ResponseMapper::user_menu(false, None, false));
            let reply = OutgoingMessage::plain(ERROR_REPLY).with_markup(menu);
            if let Err(e) = adapter.send_message(update.chat_id, &reply).await {
                warn!(chat_id = update.chat_id, error = %e, "Failed to send error reply");
            }
        }
    }

    /// Stop the gateway gracefully.
    pub async fn stop(&self) -> Result<(), ChatError> {
        self.cancel_token.cancel();
        self.adapter.stop().await?;
        let mut status = self.status.write().await;
        status.running = false;
        status.connected_since = None;
        info!("Gateway stopped");
        Ok(())
    }
}

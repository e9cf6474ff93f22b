//! Reminder Sweep
//!
//! Periodic pass over orders and payments:
//! - assigned orders whose deadline has come get one reminder to the blogger;
//! - pending payments older than the overdue threshold alert the admin once.
//!
//! Flags are written only after the message went out, so a failed delivery
//! is retried on the next pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::settings::BotConfig;
use crate::services::remote::adapters::ChatAdapter;
use crate::services::remote::types::OutgoingMessage;
use crate::storage::Database;
use crate::utils::error::AppResult;

pub const ORDER_REMINDER: &str = "⏰ Reminder. The deadline for your task has come. \
                                  Please complete it and send the links (✅ Task done).";

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub order_reminders: usize,
    pub payment_alerts: usize,
    pub failures: usize,
}

pub struct ReminderSweep {
    db: Arc<Database>,
    adapter: Arc<dyn ChatAdapter>,
    config: Arc<BotConfig>,
}

impl ReminderSweep {
    pub fn new(db: Arc<Database>, adapter: Arc<dyn ChatAdapter>, config: Arc<BotConfig>) -> Self {
        Self {
            db,
            adapter,
            config,
        }
    }

    /// Run one pass at `now`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();

        for order in self.db.due_order_reminders(now.date_naive())? {
            match self
                .adapter
                .send_message(order.user_id, &OutgoingMessage::plain(ORDER_REMINDER))
                .await
            {
                Ok(_) => {
                    self.db.mark_order_reminded(order.user_id)?;
                    report.order_reminders += 1;
                }
                Err(e) => {
                    warn!(user_id = order.user_id, error = %e, "Order reminder failed");
                    report.failures += 1;
                }
            }
        }

        let admin_id = self.config.admin_id;
        if admin_id != 0 {
            let cutoff = now - chrono::Duration::days(self.config.payment_overdue_days);
            for payment in self.db.overdue_payments(cutoff)? {
                let name = self
                    .db
                    .get_profile(payment.user_id)?
                    .map(|p| p.display_name)
                    .unwrap_or_else(|| "-".to_string());
                let text = format!(
                    "⏰ Overdue payout #{}\nUser: {} (id:{})",
                    payment.id, name, payment.user_id
                );
                match self
                    .adapter
                    .send_message(admin_id, &OutgoingMessage::plain(text))
                    .await
                {
                    Ok(_) => {
                        self.db.mark_payment_reminded(&payment.id)?;
                        report.payment_alerts += 1;
                    }
                    Err(e) => {
                        warn!(payment_id = %payment.id, error = %e, "Overdue payout alert failed");
                        report.failures += 1;
                    }
                }
            }
        }

        if report != SweepReport::default() {
            info!(
                order_reminders = report.order_reminders,
                payment_alerts = report.payment_alerts,
                failures = report.failures,
                "Reminder sweep finished"
            );
        } else {
            debug!("Reminder sweep found nothing to send");
        }
        Ok(report)
    }

    /// Run the sweep on the configured interval until `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let initial_delay = Duration::from_secs(self.config.reminder_initial_delay_secs);
        let period = Duration::from_secs(self.config.reminder_interval_secs);

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(initial_delay) => {}
                _ = cancel.cancelled() => return,
            }

            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once(Utc::now()).await {
                            warn!(error = %e, "Reminder sweep failed");
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("Reminder sweep stopped");
                        break;
                    }
                }
            }
        })
    }
}

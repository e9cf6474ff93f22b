//! Response Mapper
//!
//! Builds the texts and keyboards the bot sends. Pure formatting, no I/O.

use std::collections::BTreeMap;

use blogger_flow_core::{
    BloggerProfile, Draft, FunnelStats, Order, OrderStatus, Payment, PaymentStatus, Segment,
    Snapshot, UserId,
};
use rand::seq::SliceRandom;

use super::command_router::{buttons, CallbackAction};
use super::types::{InlineButton, ReplyMarkup};

/// Greeting variants for `/start`.
pub const GREETINGS: [&str; 3] = [
    "Hello! Ready to start working together? ✨",
    "Glad to see you! Let's get started 👇",
    "Good day! A couple of steps and we're off 🚀",
];

/// Reply sent when a handler fails.
pub const ERROR_REPLY: &str =
    "Oops, something went wrong. Press «🔁 Restart bot» and we'll start over 🙏";

/// Lines per segment in the summary.
pub const SEGMENT_LIST_LIMIT: usize = 200;
/// Failed recipient ids listed in a broadcast report.
pub const FAILED_IDS_LIMIT: usize = 100;
/// Payments listed by the unpaid view.
pub const UNPAID_LIST_LIMIT: usize = 50;
/// Characters of each draft shown in the drafts list.
const DRAFT_PREVIEW_CHARS: usize = 120;

/// Response formatter for the chat platform.
pub struct ResponseMapper;

impl ResponseMapper {
    // -----------------------------------------------------------------------
    // Menus
    // -----------------------------------------------------------------------

    /// Reply keyboard for a blogger, reflecting where they are in the pipeline.
    pub fn user_menu(has_profile: bool, order: Option<OrderStatus>, is_staff: bool) -> ReplyMarkup {
        let mut rows: Vec<Vec<String>> = Vec::new();
        if !has_profile {
            rows.push(vec![buttons::FILL_PROFILE.to_string()]);
        }
        rows.push(vec![buttons::GET_TASK.to_string()]);

        match order {
            Some(status) if status.allows_payout() => {
                rows.push(vec![buttons::REQUEST_PAYOUT.to_string()]);
            }
            Some(OrderStatus::Assigned) => {
                rows.push(vec![buttons::TASK_DONE.to_string(), buttons::DECLINE.to_string()]);
            }
            _ => {}
        }

        rows.push(vec![buttons::CONTACT.to_string()]);
        rows.push(vec![buttons::RESTART.to_string()]);
        if is_staff {
            rows.push(vec![buttons::ADMIN_MENU.to_string()]);
        }
        ReplyMarkup::Menu(rows)
    }

    /// Reply keyboard of the staff console.
    pub fn admin_menu() -> ReplyMarkup {
        let row = |labels: &[&str]| labels.iter().map(|l| l.to_string()).collect::<Vec<_>>();
        ReplyMarkup::Menu(vec![
            row(&[buttons::USER_STATUS, buttons::EXPORT]),
            row(&[buttons::SUMMARY, buttons::UNPAID]),
            row(&[buttons::BROADCAST, buttons::SAVE_DRAFT, buttons::DRAFTS]),
            row(&[buttons::FIND_HINT, buttons::FIND_ID_HINT, buttons::STATS_HINT]),
            row(&[buttons::REFERRALS, buttons::BACK]),
        ])
    }

    // -----------------------------------------------------------------------
    // Blogger texts
    // -----------------------------------------------------------------------

    pub fn random_greeting() -> &'static str {
        GREETINGS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(GREETINGS[0])
    }

    /// Greeting plus the pipeline summary.
    pub fn start_text(greeting: &str, payout_days: u32) -> String {
        format!(
            "{}\n\n\
             1) Fill in the profile (once).\n\
             2) Get the task, complete it and send the links.\n\
             3) Request the payout. It is paid within {} days.",
            greeting, payout_days
        )
    }

    /// HTML task brief for a fresh order.
    pub fn task_brief(order: &Order, keyword: &str, payout_days: u32) -> String {
        let platform = escape_html(&order.platform);
        format!(
            "Your platform: <b>{platform}</b>\n\
             Place the order: <b>{order_date}</b>\n\
             Purchase deadline: <b>by {deadline}</b>\n\n\
             ❗ Task:\n\
             1) Order and buy the product using the search phrase <b>«{keyword}»</b>.\n\
             2) Leave a review with photo or video on <b>{platform}</b>.\n\
             3) Shoot a voiced Reels review: show the product and talk about the game.\n\
             4) Send the statistics 5 days later.\n\
             <b>5) Returns are not allowed.</b>\n\
             6) Payment within <b>{payout_days} days</b> of the payout request.\n\n\
             Done? Press «{done}» and send the links.",
            platform = platform,
            order_date = order.order_date.format("%Y-%m-%d"),
            deadline = order.deadline.format("%Y-%m-%d"),
            keyword = escape_html(keyword),
            payout_days = payout_days,
            done = buttons::TASK_DONE,
        )
    }

    pub fn payout_requested(payment: &Payment) -> String {
        let status = match payment.status {
            PaymentStatus::UnderReview => "under review",
            _ => "processing",
        };
        format!(
            "✅ Payout request sent. Number: {}.\nStatus: {}.",
            payment.id, status
        )
    }

    // -----------------------------------------------------------------------
    // Staff texts
    // -----------------------------------------------------------------------

    /// Admin card for a new payout request.
    pub fn payout_card(payment: &Payment, display_name: &str) -> String {
        let links = if payment.links.is_empty() {
            "-".to_string()
        } else {
            payment
                .links
                .iter()
                .map(|l| format!("- {}", l))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let mut text = format!(
            "💰 Payout request #{}\n\
             👤 Name: {}\n\
             🆔 user_id: {}\n\
             📦 Platform: {}\n\
             🔗 Links:\n{}\n",
            payment.id, display_name, payment.user_id, payment.platform, links
        );
        if let Some(order_no) = &payment.marketplace_order_no {
            text.push_str(&format!("📄 Marketplace order: {}\n", order_no));
        }
        if payment.status == PaymentStatus::UnderReview {
            text.push_str("⚠️ Links were flagged as duplicates\n");
        }
        text.push_str(&format!("💳 Payout details:\n{}\n\nActions:", payment.details));
        text
    }

    /// Buttons under the payout card.
    pub fn payout_card_keyboard(payment: &Payment) -> ReplyMarkup {
        ReplyMarkup::Inline(vec![
            vec![InlineButton::new(
                format!("✅ Payout done #{}", payment.id),
                CallbackAction::PayDone {
                    payment_id: payment.id.clone(),
                }
                .data(),
            )],
            vec![InlineButton::new(
                format!("💬 Ask the blogger #{}", payment.id),
                CallbackAction::Support {
                    payment_id: payment.id.clone(),
                    user_id: payment.user_id,
                }
                .data(),
            )],
        ])
    }

    /// Card buttons while the admin is expected to send the receipt.
    pub fn awaiting_receipt_keyboard(payment_id: &str) -> ReplyMarkup {
        ReplyMarkup::Inline(vec![vec![InlineButton::new(
            format!("⏳ Waiting for receipt #{}", payment_id),
            CallbackAction::PayDone {
                payment_id: payment_id.to_string(),
            }
            .data(),
        )]])
    }

    /// Profile and order of one user.
    pub fn user_status(
        user_id: UserId,
        profile: Option<&BloggerProfile>,
        order: Option<&Order>,
        referral: Option<&str>,
    ) -> String {
        let dash = "-".to_string();
        let mut lines = vec![
            format!("👤 user_id: {}", user_id),
            format!(
                "• Name/channel: {}",
                profile.map(|p| p.display_name.clone()).unwrap_or_else(|| dash.clone())
            ),
            format!(
                "• Followers: {}",
                profile.map(|p| p.followers.clone()).unwrap_or_else(|| dash.clone())
            ),
            format!(
                "• Platform: {}",
                order.map(|o| o.platform.clone()).unwrap_or_else(|| dash.clone())
            ),
            format!(
                "• Order date: {}",
                order
                    .map(|o| o.order_date.to_string())
                    .unwrap_or_else(|| dash.clone())
            ),
            format!(
                "• Deadline: {}",
                order
                    .map(|o| o.deadline.to_string())
                    .unwrap_or_else(|| dash.clone())
            ),
            format!(
                "• Status: {}",
                order
                    .map(|o| o.status.to_string())
                    .unwrap_or_else(|| dash.clone())
            ),
            format!("• Referrer: {}", referral.unwrap_or("-")),
        ];
        if let Some(order) = order.filter(|o| !o.links.is_empty()) {
            lines.push("• Links:".to_string());
            for (i, link) in order.links.iter().enumerate() {
                lines.push(format!("   {}. {}", i + 1, link));
            }
        }
        lines.join("\n")
    }

    /// One segment with its members, capped at `max_lines`.
    pub fn segment_block(
        segment: Segment,
        members: &[UserId],
        snapshot: &Snapshot,
        max_lines: usize,
    ) -> String {
        let mut lines = vec![format!("- {}: {}", segment.label(), members.len())];
        for user_id in members.iter().take(max_lines) {
            lines.push(format!(
                "  • {} (id: {})",
                snapshot.display_name(*user_id),
                user_id
            ));
        }
        if members.len() > max_lines {
            lines.push(format!("  ...and {} more", members.len() - max_lines));
        }
        lines.join("\n")
    }

    /// Every segment with members.
    pub fn summary(segments: &BTreeMap<Segment, Vec<UserId>>, snapshot: &Snapshot) -> String {
        let blocks: Vec<String> = Segment::ALL
            .iter()
            .map(|segment| {
                let members = segments.get(segment).map(Vec::as_slice).unwrap_or(&[]);
                Self::segment_block(*segment, members, snapshot, SEGMENT_LIST_LIMIT)
            })
            .collect();
        format!("📈 Status summary (by user):\n\n{}", blocks.join("\n\n"))
    }

    /// Broadcast and export buttons for every segment.
    pub fn summary_keyboard() -> ReplyMarkup {
        let mut rows = Vec::new();
        for segment in Segment::ALL {
            rows.push(vec![InlineButton::new(
                format!("📣 Broadcast: {}", segment.label()),
                CallbackAction::SegmentBroadcast(segment).data(),
            )]);
            rows.push(vec![InlineButton::new(
                format!("🧾 Export: {}", segment.label()),
                CallbackAction::SegmentExport(segment).data(),
            )]);
        }
        ReplyMarkup::Inline(rows)
    }

    pub fn unpaid_list(payments: &[Payment], snapshot: &Snapshot) -> String {
        if payments.is_empty() {
            return "No unpaid requests.".to_string();
        }
        let mut lines = vec!["🧾 Unpaid requests:".to_string()];
        for payment in payments.iter().take(UNPAID_LIST_LIMIT) {
            lines.push(format!(
                "• #{} - {} (id:{}) - {}",
                payment.id,
                snapshot.display_name(payment.user_id),
                payment.user_id,
                payment.status
            ));
        }
        if payments.len() > UNPAID_LIST_LIMIT {
            lines.push(format!("...and {} more", payments.len() - UNPAID_LIST_LIMIT));
        }
        lines.join("\n")
    }

    pub fn drafts_list(drafts: &[Draft]) -> String {
        if drafts.is_empty() {
            return "No drafts.".to_string();
        }
        let mut lines = vec!["🗂 Latest drafts:".to_string()];
        for (i, draft) in drafts.iter().enumerate() {
            let preview = truncate(&draft.text, DRAFT_PREVIEW_CHARS).replace('\n', " ");
            lines.push(format!(
                "{}) {}  ({})",
                i + 1,
                preview,
                draft.created_at.format("%Y-%m-%d %H:%M")
            ));
        }
        lines.join("\n")
    }

    pub fn referrals_list(top: &[(String, usize)]) -> String {
        if top.is_empty() {
            return "No referrals yet.".to_string();
        }
        let mut lines = vec!["👥 Top referrers:".to_string()];
        for (referrer, invited) in top {
            lines.push(format!("• {}: {} invited", referrer, invited));
        }
        lines.join("\n")
    }

    pub fn stats_text(stats: &FunnelStats) -> String {
        let day = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        format!(
            "📅 Statistics {} - {}:\n\
             • Filled the profile: {}\n\
             • Received the task: {}\n\
             • Submitted links: {}\n\
             • Requested payout: {}\n\
             • Paid: {}",
            day(stats.from),
            day(stats.to),
            stats.filled_form,
            stats.assigned,
            stats.submitted,
            stats.requested_payout,
            stats.paid
        )
    }

    pub fn broadcast_preview(target_label: &str, text: &str, recipients: usize) -> String {
        format!(
            "📣 Broadcast preview for «{}» ({} users):\n\n{}\n\nSend?",
            target_label, recipients, text
        )
    }

    pub fn broadcast_confirm_keyboard(recipients: usize) -> ReplyMarkup {
        ReplyMarkup::Inline(vec![vec![
            InlineButton::new(
                format!("✅ Yes, send to {} users", recipients),
                CallbackAction::BroadcastConfirm { confirmed: true }.data(),
            ),
            InlineButton::new(
                "❌ Cancel",
                CallbackAction::BroadcastConfirm { confirmed: false }.data(),
            ),
        ]])
    }

    /// Delivery summary listing the first failed recipients.
    pub fn broadcast_report(delivered: usize, failed: &[UserId]) -> String {
        let mut report = format!(
            "Broadcast finished.\nDelivered: {}\nFailed: {}",
            delivered,
            failed.len()
        );
        if !failed.is_empty() {
            report.push_str("\n\nNot delivered (user_id):");
            for user_id in failed.iter().take(FAILED_IDS_LIMIT) {
                report.push_str(&format!("\n{}", user_id));
            }
            if failed.len() > FAILED_IDS_LIMIT {
                report.push_str(&format!("\n...and {} more", failed.len() - FAILED_IDS_LIMIT));
            }
        }
        report
    }
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Smart truncation that adds ellipsis indicator.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return "...".to_string();
    }
    let head: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", head)
}

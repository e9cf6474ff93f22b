//! Admin Console Integration Tests
//!
//! Access control, summaries, broadcasts, lookups, exports and support
//! messages as seen from the staff chats.

use blogger_flow_core::Segment;

use blogger_flow_bot::models::conversation::ConversationState;
use blogger_flow_bot::services::remote::adapters::recording::SentItem;
use blogger_flow_bot::services::remote::command_router::{buttons, CallbackAction};
use blogger_flow_bot::services::remote::types::ReplyMarkup;

use crate::support::{Harness, ADMIN, MODERATOR};

const NO_RIGHTS: &str = "⛔ Not enough rights.";

fn broadcast_yes() -> String {
    CallbackAction::BroadcastConfirm { confirmed: true }.data()
}

fn broadcast_no() -> String {
    CallbackAction::BroadcastConfirm { confirmed: false }.data()
}

// ============================================================================
// Access
// ============================================================================

#[tokio::test]
async fn test_blogger_cannot_open_console() {
    let h = Harness::new();
    h.text(100, "/admin").await;
    assert_eq!(h.last_text(100).await, NO_RIGHTS);
    h.text(100, buttons::SUMMARY).await;
    assert_eq!(h.last_text(100).await, NO_RIGHTS);
}

#[tokio::test]
async fn test_staff_menus() {
    let h = Harness::new();
    h.text(ADMIN, "/start").await;
    assert!(h.last_menu(ADMIN).await.contains(&buttons::ADMIN_MENU.to_string()));

    h.text(MODERATOR, buttons::ADMIN_MENU).await;
    assert_eq!(h.last_text(MODERATOR).await, "👑 Admin menu");
    let menu = h.last_menu(MODERATOR).await;
    assert!(menu.contains(&buttons::SUMMARY.to_string()));
    assert!(menu.contains(&buttons::BACK.to_string()));

    h.text(MODERATOR, buttons::BACK).await;
    assert_eq!(h.last_text(MODERATOR).await, "Main menu");
}

#[tokio::test]
async fn test_moderator_cannot_confirm_payout() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;
    h.request_receipt_payout(100).await;
    let payment = h.db.active_payment_for(100).unwrap().unwrap();

    let data = CallbackAction::PayDone {
        payment_id: payment.id.clone(),
    }
    .data();
    h.callback(MODERATOR, &data, None).await;

    let answers: Vec<_> = h
        .adapter
        .sent()
        .await
        .into_iter()
        .filter(|item| matches!(item, SentItem::CallbackAnswer { .. }))
        .collect();
    assert_eq!(
        answers,
        vec![SentItem::CallbackAnswer {
            query_id: format!("q-{}", MODERATOR),
            text: Some(NO_RIGHTS.to_string()),
        }]
    );
    assert!(h.db.get_conversation(MODERATOR).unwrap().is_idle());
    assert!(h.db.active_payment_for(100).unwrap().is_some());
}

#[tokio::test]
async fn test_unknown_callback_is_answered_silently() {
    let h = Harness::new();
    h.callback(ADMIN, "nonsense:1", None).await;
    assert_eq!(
        h.adapter.sent().await,
        vec![SentItem::CallbackAnswer {
            query_id: format!("q-{}", ADMIN),
            text: None,
        }]
    );
}

// ============================================================================
// Summary & Lists
// ============================================================================

#[tokio::test]
async fn test_summary_lists_segments_with_buttons() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.fill_profile(200, "Boris").await;
    h.submit_links(100, "https://a.com/video").await;

    h.text(ADMIN, buttons::SUMMARY).await;
    let message = h.adapter.last_message_to(ADMIN).await.unwrap();
    assert!(message.text.starts_with("📈 Status summary (by user):"));
    assert!(message.text.contains("- Filled the profile: 2"));
    assert!(message.text.contains("- Received the task: 1"));
    assert!(message.text.contains("- Submitted links: 1"));
    assert!(message.text.contains("  • Anna (id: 100)"));

    match message.markup {
        Some(ReplyMarkup::Inline(rows)) => assert_eq!(rows.len(), Segment::ALL.len() * 2),
        other => panic!("expected inline keyboard, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unpaid_list() {
    let h = Harness::new();
    h.text(ADMIN, buttons::UNPAID).await;
    assert_eq!(h.last_text(ADMIN).await, "No unpaid requests.");

    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;
    h.request_receipt_payout(100).await;
    let payment = h.db.active_payment_for(100).unwrap().unwrap();

    h.text(ADMIN, buttons::UNPAID).await;
    let text = h.last_text(ADMIN).await;
    assert!(text.starts_with("🧾 Unpaid requests:"));
    assert!(text.contains(&format!("#{}", payment.id)));
    assert!(text.contains("Anna (id:100)"));
}

#[tokio::test]
async fn test_referrals_ranking() {
    let h = Harness::new();
    h.text(ADMIN, buttons::REFERRALS).await;
    assert_eq!(h.last_text(ADMIN).await, "No referrals yet.");

    h.text(300, "/start ref_100").await;
    h.text(400, "/start ref_100").await;
    h.text(500, "/start ref_200").await;

    h.text(ADMIN, buttons::REFERRALS).await;
    assert_eq!(
        h.last_text(ADMIN).await,
        "👥 Top referrers:\n• 100: 2 invited\n• 200: 1 invited"
    );
    assert_eq!(h.db.audit_entries("referral").unwrap().len(), 3);
}

#[tokio::test]
async fn test_stats_for_date_range() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.fill_profile(200, "Boris").await;

    h.text(ADMIN, "/stats 01.08.2025-11.08.2025").await;
    let text = h.last_text(ADMIN).await;
    assert!(text.starts_with("📅 Statistics 2025-08-01 - 2025-08-11:"));
    assert!(text.contains("• Filled the profile: 2"));
    assert!(text.contains("• Received the task: 1"));
    assert!(text.contains("• Paid: 0"));

    h.text(ADMIN, "/stats 01.09.2025-11.09.2025").await;
    assert!(h.last_text(ADMIN).await.contains("• Filled the profile: 0"));

    h.text(ADMIN, "/stats yesterday").await;
    assert_eq!(h.last_text(ADMIN).await, "Format: /stats 01.08.2025-11.08.2025");
    h.text(ADMIN, "/stats").await;
    assert_eq!(h.last_text(ADMIN).await, "Format: /stats 01.08.2025-11.08.2025");
}

// ============================================================================
// Lookups
// ============================================================================

#[tokio::test]
async fn test_find_by_name() {
    let h = Harness::new();
    h.fill_profile(100, "Anna Board").await;
    h.fill_profile(200, "Boris").await;

    h.text(MODERATOR, "/find Anna").await;
    assert_eq!(
        h.last_text(MODERATOR).await,
        "🔎 Found:\n• Anna Board (id: 100) @user100"
    );

    h.text(MODERATOR, "/find Zed").await;
    assert_eq!(h.last_text(MODERATOR).await, "Nothing found.");

    h.text(MODERATOR, "/find").await;
    assert_eq!(h.last_text(MODERATOR).await, "Usage: /find <name>");
}

#[tokio::test]
async fn test_findid_and_status_lookup() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;

    h.text(ADMIN, "/findid 100").await;
    let text = h.last_text(ADMIN).await;
    assert!(text.contains("👤 user_id: 100"));
    assert!(text.contains("• Name/channel: Anna"));
    assert!(text.contains("https://a.com/video"));

    h.text(ADMIN, "/findid abc").await;
    assert_eq!(h.last_text(ADMIN).await, "user_id must be a number.");
    h.text(ADMIN, "/findid 999").await;
    assert_eq!(h.last_text(ADMIN).await, "User not found.");

    h.text(ADMIN, buttons::USER_STATUS).await;
    assert_eq!(h.last_text(ADMIN).await, "Send the user_id.");
    h.text(ADMIN, "Anna").await;
    assert_eq!(h.last_text(ADMIN).await, "user_id must be a number.");
    h.text(ADMIN, "100").await;
    assert!(h.last_text(ADMIN).await.contains("👤 user_id: 100"));
    assert!(h.db.get_conversation(ADMIN).unwrap().is_idle());
}

// ============================================================================
// Broadcasts
// ============================================================================

#[tokio::test]
async fn test_broadcast_to_everyone_reports_failures() {
    let h = Harness::new();
    h.fill_profile(100, "Anna").await;
    h.fill_profile(200, "Boris").await;
    h.fill_profile(300, "Vera").await;
    h.adapter.fail_chat(300).await;

    h.text(ADMIN, buttons::BROADCAST).await;
    assert_eq!(
        h.last_text(ADMIN).await,
        "Send the broadcast text for «All bloggers»."
    );
    h.text(ADMIN, "New task batch on Monday").await;

    let preview = h.adapter.last_message_to(ADMIN).await.unwrap();
    assert!(preview.text.contains("(3 users)"));
    assert!(preview.text.contains("New task batch on Monday"));
    assert!(matches!(preview.markup, Some(ReplyMarkup::Inline(_))));

    h.callback(ADMIN, &broadcast_yes(), Some(77)).await;
    assert_eq!(
        h.last_text(ADMIN).await,
        "Broadcast finished.\nDelivered: 2\nFailed: 1\n\nNot delivered (user_id):\n300"
    );
    assert_eq!(h.last_text(100).await, "New task batch on Monday");
    assert_eq!(h.last_text(200).await, "New task batch on Monday");
    assert!(h.adapter.sent().await.iter().any(|item| matches!(
        item,
        SentItem::EditMarkup { message_id: 77, markup: None, .. }
    )));
    assert_eq!(h.db.audit_entries("broadcast").unwrap().len(), 1);
}

#[tokio::test]
async fn test_broadcast_recipients_are_frozen_at_preview() {
    let h = Harness::new();
    h.fill_profile(100, "Anna").await;

    h.text(ADMIN, buttons::BROADCAST).await;
    h.text(ADMIN, "Hello").await;
    h.fill_profile(200, "Boris").await;
    h.callback(ADMIN, &broadcast_yes(), None).await;

    assert!(h.last_text(ADMIN).await.contains("Delivered: 1"));
    assert_ne!(h.last_text(200).await, "Hello");
}

#[tokio::test]
async fn test_broadcast_cancel_and_expired_preview() {
    let h = Harness::new();
    h.fill_profile(100, "Anna").await;

    h.text(ADMIN, buttons::BROADCAST).await;
    h.text(ADMIN, "Hello").await;
    h.callback(ADMIN, &broadcast_no(), None).await;
    assert_eq!(h.last_text(ADMIN).await, "Broadcast cancelled.");
    assert_ne!(h.last_text(100).await, "Hello");

    h.callback(ADMIN, &broadcast_yes(), None).await;
    assert_eq!(
        h.last_text(ADMIN).await,
        "This preview has expired. Start the broadcast again."
    );
}

#[tokio::test]
async fn test_segment_broadcast_reaches_members_only() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.fill_profile(200, "Boris").await;

    h.callback(
        MODERATOR,
        &CallbackAction::SegmentBroadcast(Segment::Assigned).data(),
        None,
    )
    .await;
    assert_eq!(
        h.last_text(MODERATOR).await,
        "Send the broadcast text for «Received the task»."
    );
    h.text(MODERATOR, "Deadline is close").await;
    h.callback(MODERATOR, &broadcast_yes(), None).await;

    assert_eq!(h.last_text(100).await, "Deadline is close");
    assert_ne!(h.last_text(200).await, "Deadline is close");
}

#[tokio::test]
async fn test_segment_broadcast_without_members() {
    let h = Harness::new();
    h.callback(
        ADMIN,
        &CallbackAction::SegmentBroadcast(Segment::Paid).data(),
        None,
    )
    .await;
    h.text(ADMIN, "Thanks everyone").await;
    assert_eq!(h.last_text(ADMIN).await, "No recipients in «Paid».");
    assert!(h.db.get_conversation(ADMIN).unwrap().is_idle());
}

// ============================================================================
// Drafts
// ============================================================================

#[tokio::test]
async fn test_save_and_list_drafts() {
    let h = Harness::new();
    h.text(ADMIN, buttons::DRAFTS).await;
    assert_eq!(h.last_text(ADMIN).await, "No drafts.");

    h.text(ADMIN, buttons::SAVE_DRAFT).await;
    assert!(matches!(
        h.db.get_conversation(ADMIN).unwrap(),
        ConversationState::AdminDraftText
    ));
    h.text(ADMIN, "Reminder:\nsend the stats").await;
    assert_eq!(h.last_text(ADMIN).await, "Draft saved ✅");

    h.text(ADMIN, buttons::DRAFTS).await;
    assert_eq!(
        h.last_text(ADMIN).await,
        "🗂 Latest drafts:\n1) Reminder: send the stats  (2025-08-01 10:00)"
    );
}

// ============================================================================
// Exports
// ============================================================================

#[tokio::test]
async fn test_full_export_sends_documents() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;
    h.request_receipt_payout(100).await;

    h.text(ADMIN, buttons::EXPORT).await;

    let documents: Vec<(String, Option<String>)> = h
        .sent_to(ADMIN)
        .await
        .into_iter()
        .filter_map(|item| match item {
            SentItem::Document {
                file_name, caption, ..
            } => Some((file_name, caption)),
            _ => None,
        })
        .collect();
    let names: Vec<&str> = documents.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "bloggers.csv",
            "orders.csv",
            "payments.csv",
            "declines.csv",
            "payments_export.csv"
        ]
    );
    assert_eq!(documents[0].1.as_deref(), Some("1 rows"));
    assert_eq!(documents[3].1.as_deref(), Some("0 rows"));
    assert_eq!(h.last_text(ADMIN).await, "📤 Export ready.");
}

#[tokio::test]
async fn test_segment_export() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;

    h.callback(
        MODERATOR,
        &CallbackAction::SegmentExport(Segment::Submitted).data(),
        None,
    )
    .await;

    let document = h
        .sent_to(MODERATOR)
        .await
        .into_iter()
        .find_map(|item| match item {
            SentItem::Document {
                file_name,
                bytes,
                caption,
                ..
            } => Some((file_name, bytes, caption)),
            _ => None,
        })
        .unwrap();
    assert_eq!(document.0, "export_seg_submitted.csv");
    assert_eq!(document.2.as_deref(), Some("🧾 Submitted links: 1"));
    let csv = String::from_utf8(document.1).unwrap();
    assert!(csv.starts_with("user_id,nickname,status,platform,order_date,deadline,first_link"));
    assert!(csv.contains("100,Anna,links_received,Wildberries,2025-08-02,2025-08-05,https://a.com/video"));
    assert!(h.dir.path().join("export_seg_submitted.csv").exists());
}

// ============================================================================
// Support
// ============================================================================

#[tokio::test]
async fn test_support_message_reaches_blogger() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;
    h.request_receipt_payout(100).await;
    let payment = h.db.active_payment_for(100).unwrap().unwrap();

    let data = CallbackAction::Support {
        payment_id: payment.id.clone(),
        user_id: 100,
    }
    .data();
    h.callback(ADMIN, &data, None).await;
    assert_eq!(
        h.last_text(ADMIN).await,
        format!("Write the message for user 100 (request #{}).", payment.id)
    );

    h.text(ADMIN, "Please resend the barcode photo").await;
    assert_eq!(
        h.last_text(100).await,
        "📨 Message from support:\n\nPlease resend the barcode photo"
    );
    assert_eq!(h.last_text(ADMIN).await, "Sent ✅");
    assert_eq!(h.db.audit_entries("support_message").unwrap().len(), 1);
}

#[tokio::test]
async fn test_moderator_cannot_message_bloggers() {
    let h = Harness::new();
    let data = CallbackAction::Support {
        payment_id: "123456".to_string(),
        user_id: 100,
    }
    .data();
    h.callback(MODERATOR, &data, None).await;
    assert!(h.db.get_conversation(MODERATOR).unwrap().is_idle());
    assert!(h.adapter.texts_to(MODERATOR).await.is_empty());
}

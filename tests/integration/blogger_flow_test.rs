//! Blogger Flow Integration Tests
//!
//! Profile intake through payout confirmation, with link deduplication and
//! wizard interruption along the way.

use blogger_flow_core::{OrderStatus, PaymentStatus};
use chrono::NaiveDate;

use blogger_flow_bot::models::conversation::{ConversationState, ProfileStep};
use blogger_flow_bot::models::settings::BotConfig;
use blogger_flow_bot::services::remote::adapters::recording::SentItem;
use blogger_flow_bot::services::remote::command_router::{buttons, CallbackAction};
use blogger_flow_bot::services::remote::types::ReplyMarkup;
use blogger_flow_bot::services::Workflow;

use crate::support::{Harness, ADMIN, CARD_DETAILS};

// ============================================================================
// Start & Profile
// ============================================================================

#[tokio::test]
async fn test_start_shows_pipeline_and_profile_button() {
    let h = Harness::new();
    h.text(100, "/start").await;

    let text = h.last_text(100).await;
    assert!(text.contains("1) Fill in the profile (once)."));
    assert!(text.contains("paid within 7 days"));
    let menu = h.last_menu(100).await;
    assert_eq!(menu[0], buttons::FILL_PROFILE);
    assert!(!menu.contains(&buttons::ADMIN_MENU.to_string()));
}

#[tokio::test]
async fn test_profile_wizard_saves_profile() {
    let h = Harness::new();
    h.text(100, buttons::FILL_PROFILE).await;
    assert_eq!(h.last_text(100).await, "1. Your nickname or channel name");
    h.text(100, "Anna").await;
    h.text(100, "12k").await;
    h.text(100, "Instagram, TikTok").await;
    h.text(100, "board games").await;

    h.text(100, "here is my screenshot").await;
    assert!(h.last_text(100).await.starts_with("This is not a photo"));

    h.photo(100, "reach-100").await;
    let profile = h.db.get_profile(100).unwrap().unwrap();
    assert_eq!(profile.display_name, "Anna");
    assert_eq!(profile.platforms, vec!["Instagram", "TikTok"]);
    assert_eq!(profile.tg_username.as_deref(), Some("user100"));
    assert_eq!(profile.reach_file_id, "reach-100");
    assert_eq!(profile.consent_at, h.now);
    assert!(h.last_text(100).await.contains("Profile accepted ✅"));
    assert!(!h.last_menu(100).await.contains(&buttons::FILL_PROFILE.to_string()));

    assert!(h.dir.path().join("media").join("100").join("reach.jpg").exists());
    assert_eq!(h.db.audit_entries("form_filled").unwrap().len(), 1);
}

#[tokio::test]
async fn test_profile_cannot_be_filled_twice() {
    let h = Harness::new();
    h.fill_profile(100, "Anna").await;
    h.text(100, buttons::FILL_PROFILE).await;
    assert_eq!(h.last_text(100).await, "Your profile is already filled ✅");
    assert!(h.db.get_conversation(100).unwrap().is_idle());
}

#[tokio::test]
async fn test_reused_reach_screenshot_alerts_admin() {
    let h = Harness::new();
    h.adapter.put_file("shot-a", b"same".to_vec()).await;
    h.adapter.put_file("shot-b", b"same".to_vec()).await;

    h.text(100, buttons::FILL_PROFILE).await;
    for answer in ["Anna", "1k", "Instagram", "games"] {
        h.text(100, answer).await;
    }
    h.photo(100, "shot-a").await;
    assert!(h.adapter.texts_to(ADMIN).await.is_empty());

    h.text(200, buttons::FILL_PROFILE).await;
    for answer in ["Boris", "2k", "YouTube", "games"] {
        h.text(200, answer).await;
    }
    h.photo(200, "shot-b").await;
    assert_eq!(
        h.adapter.texts_to(ADMIN).await,
        vec!["⚠️ Duplicate media (reach) from 200"]
    );
    assert!(h.db.has_profile(200).unwrap());
}

#[tokio::test]
async fn test_command_interrupts_wizard() {
    let h = Harness::new();
    h.text(100, buttons::FILL_PROFILE).await;
    h.text(100, "Anna").await;

    h.text(100, buttons::GET_TASK).await;
    assert_eq!(h.last_text(100).await, "Fill in the profile first 📋");
    assert!(h.db.get_conversation(100).unwrap().is_idle());

    h.text(100, "12k").await;
    assert_eq!(h.last_text(100).await, "Choose an action from the menu 👇");
}

#[tokio::test]
async fn test_wizard_resumes_after_restart() {
    let h = Harness::new();
    h.text(100, buttons::FILL_PROFILE).await;
    h.text(100, "Anna").await;
    match h.db.get_conversation(100).unwrap() {
        ConversationState::Profile { step, draft } => {
            assert_eq!(step, ProfileStep::Followers);
            assert_eq!(draft.display_name.as_deref(), Some("Anna"));
        }
        other => panic!("unexpected state {:?}", other),
    }

    // A new workflow over the same database picks up the stored state.
    let restarted = Workflow::new(
        h.db.clone(),
        h.adapter.clone(),
        BotConfig {
            admin_id: ADMIN,
            ..Default::default()
        },
        h.dir.path(),
    );
    let update = blogger_flow_bot::services::remote::types::IncomingUpdate {
        chat_id: 100,
        user_id: 100,
        username: None,
        kind: blogger_flow_bot::services::remote::types::UpdateKind::Text("12k".to_string()),
        message_id: 5,
        timestamp: h.now,
    };
    restarted.handle_update(&update).await.unwrap();
    assert_eq!(h.last_text(100).await, "3. Which platforms do you advertise on? (comma separated)");
}

// ============================================================================
// Task
// ============================================================================

#[tokio::test]
async fn test_get_task_assigns_least_loaded_platform() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.onboard(200, "Boris").await;

    let first = h.db.get_order(100).unwrap().unwrap();
    let second = h.db.get_order(200).unwrap().unwrap();
    assert_eq!(first.platform, "Wildberries");
    assert_eq!(second.platform, "Ozon");
    assert_eq!(first.order_date, NaiveDate::from_ymd_opt(2025, 8, 2).unwrap());
    assert_eq!(first.deadline, NaiveDate::from_ymd_opt(2025, 8, 5).unwrap());
    assert_eq!(first.status, OrderStatus::Assigned);

    let brief = h.adapter.last_message_to(200).await.unwrap();
    assert!(brief.html);
    assert!(brief.text.contains("Your platform: <b>Ozon</b>"));
    assert!(brief.text.contains("«Board game»"));

    let menu = h.last_menu(200).await;
    assert!(menu.contains(&buttons::TASK_DONE.to_string()));
    assert!(menu.contains(&buttons::DECLINE.to_string()));
    assert!(!menu.contains(&buttons::REQUEST_PAYOUT.to_string()));
}

#[tokio::test]
async fn test_get_task_twice_keeps_first_order() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.text(100, buttons::GET_TASK).await;
    assert!(h.last_text(100).await.starts_with("The task has already been issued."));
    assert_eq!(h.db.list_orders().unwrap().len(), 1);
    assert_eq!(h.db.audit_entries("tz_assigned").unwrap().len(), 1);
}

#[tokio::test]
async fn test_decline_records_reason() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.text(100, buttons::DECLINE).await;
    h.text(100, "Too busy this month").await;

    let order = h.db.get_order(100).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Declined);
    let declines = h.db.list_declines().unwrap();
    assert_eq!(declines.len(), 1);
    assert_eq!(declines[0].reason, "Too busy this month");

    let menu = h.last_menu(100).await;
    assert!(!menu.contains(&buttons::TASK_DONE.to_string()));
    assert!(!menu.contains(&buttons::DECLINE.to_string()));
}

#[tokio::test]
async fn test_decline_refused_after_payout_request() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;
    h.request_receipt_payout(100).await;

    h.text(100, buttons::DECLINE).await;
    assert_eq!(h.last_text(100).await, "This task can no longer be declined.");
    assert!(h.db.get_conversation(100).unwrap().is_idle());

    h.text(100, "changed my mind").await;
    assert_eq!(h.last_text(100).await, "Choose an action from the menu 👇");

    assert_eq!(
        h.db.get_order(100).unwrap().unwrap().status,
        OrderStatus::LinksReceived
    );
    assert!(h.db.list_declines().unwrap().is_empty());
    assert_eq!(
        h.db.active_payment_for(100).unwrap().unwrap().status,
        PaymentStatus::Pending
    );
}

// ============================================================================
// Links
// ============================================================================

#[tokio::test]
async fn test_links_are_normalized_and_unlock_payout() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;

    h.text(100, buttons::TASK_DONE).await;
    h.text(100, "no links here").await;
    assert!(h.last_text(100).await.starts_with("No links found."));

    h.text(
        100,
        "https://youtube.com/watch?v=1&utm_source=tg, https://instagram.com/reel/abc",
    )
    .await;
    let order = h.db.get_order(100).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::LinksReceived);
    assert_eq!(
        order.links,
        vec!["https://youtube.com/watch?v=1", "https://instagram.com/reel/abc"]
    );
    assert!(h.last_text(100).await.starts_with("Links received ✅"));
    assert!(h
        .last_menu(100)
        .await
        .contains(&buttons::REQUEST_PAYOUT.to_string()));
    assert!(h.adapter.texts_to(ADMIN).await.is_empty());
}

#[tokio::test]
async fn test_links_keep_their_own_query_text() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.onboard(200, "Boris").await;

    h.submit_links(
        100,
        "https://youtu.be/abc?si https://a.com/s?q=a%20b&utm_source=tg https://a.com/p?x=1;y=2",
    )
    .await;
    assert_eq!(
        h.db.get_order(100).unwrap().unwrap().links,
        vec![
            "https://youtu.be/abc?si",
            "https://a.com/s?q=a%20b",
            "https://a.com/p?x=1;y=2"
        ]
    );

    // The same link with a different query is a different proof.
    h.submit_links(200, "https://a.com/s?q=a+b").await;
    assert_eq!(
        h.db.get_order(200).unwrap().unwrap().status,
        OrderStatus::LinksReceived
    );
}

#[tokio::test]
async fn test_duplicate_links_flag_order_for_review() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.onboard(200, "Boris").await;

    h.submit_links(100, "https://a.com/video").await;
    h.submit_links(200, "https://a.com/video?utm_medium=social https://b.com/new")
        .await;

    let order = h.db.get_order(200).unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::UnderReview);
    assert_eq!(order.links.len(), 2);

    let alerts = h.adapter.texts_to(ADMIN).await;
    assert_eq!(
        alerts,
        vec!["⚠️ Duplicate links from user:\n- https://a.com/video\n\nName: Boris\nuser_id: 200"]
    );
    assert_eq!(h.db.audit_entries("links_duplicate").unwrap().len(), 1);
    assert!(h.last_text(200).await.contains("the manager will check them"));

    // Clean links later do not clear the review flag.
    h.submit_links(200, "https://c.com/extra").await;
    assert_eq!(
        h.db.get_order(200).unwrap().unwrap().status,
        OrderStatus::UnderReview
    );
}

// ============================================================================
// Payout
// ============================================================================

#[tokio::test]
async fn test_payout_requires_links() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.text(100, buttons::REQUEST_PAYOUT).await;
    assert_eq!(h.last_text(100).await, "Send the links first (✅ Task done).");
    assert!(h.db.get_conversation(100).unwrap().is_idle());
}

#[tokio::test]
async fn test_payout_request_reaches_admin() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;

    h.text(100, buttons::REQUEST_PAYOUT).await;
    assert_eq!(
        h.last_text(100).await,
        "1) Send a screenshot of your review on Wildberries."
    );
    h.text(100, "not a photo").await;
    assert!(h.last_text(100).await.starts_with("This is not a photo"));
    h.photo(100, "review-100").await;
    h.photo(100, "barcode-100").await;
    assert_eq!(
        h.last_text(100).await,
        "3) Send a photo of the purchase receipt."
    );
    h.photo(100, "receipt-100").await;
    h.text(100, "my card is 1234").await;
    assert!(h.last_text(100).await.starts_with("Details not recognized."));
    h.text(100, CARD_DETAILS).await;

    let payment = h.db.active_payment_for(100).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.details, CARD_DETAILS);
    assert_eq!(payment.links, vec!["https://a.com/video"]);
    assert_eq!(payment.receipt_file_id.as_deref(), Some("receipt-100"));
    assert!(h
        .last_text(100)
        .await
        .starts_with(&format!("✅ Payout request sent. Number: {}.", payment.id)));

    let admin_items = h.sent_to(ADMIN).await;
    assert!(matches!(
        &admin_items[0],
        SentItem::MediaGroup { file_ids, .. }
            if file_ids == &vec!["review-100".to_string(), "barcode-100".to_string(), "receipt-100".to_string()]
    ));
    match &admin_items[1] {
        SentItem::Message {
            message_id,
            message,
            ..
        } => {
            assert!(message.text.contains(&format!("Payout request #{}", payment.id)));
            assert!(matches!(message.markup, Some(ReplyMarkup::Inline(_))));
            assert_eq!(payment.admin_message_id, Some(*message_id));
        }
        other => panic!("expected payout card, got {:?}", other),
    }

    assert!(h.dir.path().join("payments_export.csv").exists());
    assert_eq!(h.db.audit_entries("payment_requested").unwrap().len(), 1);
}

#[tokio::test]
async fn test_order_number_platform_asks_for_number() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.onboard(200, "Boris").await;
    h.submit_links(200, "https://b.com/video").await;

    h.text(200, buttons::REQUEST_PAYOUT).await;
    h.photo(200, "review-200").await;
    h.photo(200, "barcode-200").await;
    assert_eq!(h.last_text(200).await, "3) Send the marketplace order number.");
    h.text(200, "12#").await;
    assert!(h.last_text(200).await.starts_with("This does not look like an order number."));
    h.text(200, "12345678-0001").await;
    h.text(200, CARD_DETAILS).await;

    let payment = h.db.active_payment_for(200).unwrap().unwrap();
    assert_eq!(payment.marketplace_order_no.as_deref(), Some("12345678-0001"));
    assert_eq!(payment.receipt_file_id, None);
}

#[tokio::test]
async fn test_second_payout_request_is_refused() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;
    h.request_receipt_payout(100).await;

    h.text(100, buttons::REQUEST_PAYOUT).await;
    assert!(h.last_text(100).await.starts_with("You already have payout request #"));
    assert_eq!(h.db.list_payments().unwrap().len(), 1);
}

#[tokio::test]
async fn test_under_review_order_gives_under_review_payment() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.onboard(200, "Boris").await;
    h.submit_links(100, "https://a.com/video").await;
    h.submit_links(200, "https://a.com/video").await;

    h.text(200, buttons::REQUEST_PAYOUT).await;
    h.photo(200, "review-200").await;
    h.photo(200, "barcode-200").await;
    h.text(200, "12345678-0001").await;
    h.text(200, CARD_DETAILS).await;

    let payment = h.db.active_payment_for(200).unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::UnderReview);
    assert!(h.last_text(200).await.contains("Status: under review."));
}

// ============================================================================
// Confirmation
// ============================================================================

#[tokio::test]
async fn test_admin_confirms_payout_with_receipt() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;
    h.request_receipt_payout(100).await;
    let payment = h.db.active_payment_for(100).unwrap().unwrap();
    let card_id = payment.admin_message_id.unwrap();

    let pay_done = CallbackAction::PayDone {
        payment_id: payment.id.clone(),
    }
    .data();
    h.callback(ADMIN, &pay_done, Some(card_id)).await;
    assert_eq!(
        h.last_text(ADMIN).await,
        format!("Send a photo of the payment receipt for #{}.", payment.id)
    );
    assert!(h.adapter.sent().await.iter().any(|item| matches!(
        item,
        SentItem::EditMarkup { message_id, markup: Some(_), .. } if *message_id == card_id
    )));

    h.text(ADMIN, "where do I send it?").await;
    assert_eq!(h.last_text(ADMIN).await, "Send the receipt as a photo.");

    h.photo(ADMIN, "bank-receipt").await;

    let paid = h.db.get_payment(&payment.id).unwrap().unwrap();
    assert_eq!(paid.status, PaymentStatus::Paid);
    assert_eq!(paid.paid_at, Some(h.now));
    assert_eq!(
        h.db.get_order(100).unwrap().unwrap().status,
        OrderStatus::Completed
    );

    let user_items = h.sent_to(100).await;
    let n = user_items.len();
    assert!(matches!(
        &user_items[n - 2],
        SentItem::Message { message, .. }
            if message.text == format!("✅ Payout done for request #{}. Thank you!", payment.id)
    ));
    assert!(matches!(
        &user_items[n - 1],
        SentItem::Photo { file_id, caption: Some(caption), .. }
            if file_id == "bank-receipt" && caption == "Payment receipt"
    ));

    assert!(h.adapter.sent().await.iter().any(|item| matches!(
        item,
        SentItem::Edit { chat_id, message_id, text }
            if *chat_id == ADMIN && *message_id == card_id && text.ends_with("closed")
    )));
    assert_eq!(h.last_text(ADMIN).await, "Done. The user has been notified.");
    assert!(h
        .dir
        .path()
        .join("media")
        .join("100")
        .join(format!("receipt_{}.jpg", payment.id))
        .exists());
    assert_eq!(h.db.audit_entries("payment_paid").unwrap().len(), 1);

    // Pressing the button again does not reopen the request.
    h.callback(ADMIN, &pay_done, Some(card_id)).await;
    assert_eq!(
        h.last_text(ADMIN).await,
        format!("Request #{} is already paid.", payment.id)
    );
}

#[tokio::test]
async fn test_unreachable_blogger_still_marked_paid() {
    let h = Harness::new();
    h.onboard(100, "Anna").await;
    h.submit_links(100, "https://a.com/video").await;
    h.request_receipt_payout(100).await;
    let payment = h.db.active_payment_for(100).unwrap().unwrap();

    h.adapter.fail_chat(100).await;
    let pay_done = CallbackAction::PayDone {
        payment_id: payment.id.clone(),
    }
    .data();
    h.callback(ADMIN, &pay_done, None).await;
    h.photo(ADMIN, "bank-receipt").await;

    assert_eq!(
        h.db.get_payment(&payment.id).unwrap().unwrap().status,
        PaymentStatus::Paid
    );
    assert_eq!(
        h.last_text(ADMIN).await,
        "Marked as paid, but the user could not be notified."
    );
}

#[tokio::test]
async fn test_referral_is_recorded_on_start() {
    let h = Harness::new();
    h.text(400, "/start ref_100").await;
    h.text(400, "/start ref_300").await;
    h.text(500, "/start ref_500").await;

    assert_eq!(h.db.referral_of(400).unwrap().as_deref(), Some("100"));
    assert_eq!(h.db.referral_of(500).unwrap(), None);

    h.fill_profile(400, "Vera").await;
    assert_eq!(
        h.db.get_profile(400).unwrap().unwrap().referral_source.as_deref(),
        Some("100")
    );
}

#[tokio::test]
async fn test_contact_and_whoami() {
    let h = Harness::new();
    h.text(100, buttons::CONTACT).await;
    assert_eq!(h.last_text(100).await, "📞 Manager contact: @manager_test");
    h.text(100, "/whoami").await;
    assert_eq!(h.last_text(100).await, "Your id: 100\nUsername: @user100");
}

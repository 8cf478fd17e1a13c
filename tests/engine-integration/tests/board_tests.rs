//! Staff board alerting over live snapshots.

use kiosk_common::message::MessageSender;
use kiosk_engine::messaging::{self, decode_message};
use kiosk_engine::order_messages_path;
use kiosk_engine::session::Slot;
use kiosk_engine_integration::TestHarness;
use kiosk_store::Filter;

#[tokio::test]
async fn preexisting_orders_seed_the_baseline_silently() {
    let h = TestHarness::setup();
    let mut gary = h.shopper("Gary");
    for _ in 0..5 {
        gary.place_order(&h).await;
    }

    let mut staff = h.staff();
    assert_eq!(staff.open_board(), None);
    assert_eq!(staff.board.orders.len(), 5);
    assert_eq!(staff.board.counts().new, 5);
}

#[tokio::test]
async fn a_fresh_order_after_baseline_alerts_exactly_once() {
    let h = TestHarness::setup();
    let mut gary = h.shopper("Gary");
    for _ in 0..5 {
        gary.place_order(&h).await;
    }

    let mut staff = h.staff();
    staff.open_board();

    let mut emma = h.shopper("Emma");
    emma.place_order(&h).await;

    let alerts = staff.pump_board();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].new_orders, 1);
    assert_eq!(alerts[0].updated_threads, 0);
    assert_eq!(staff.board.orders.len(), 6);

    // Draining again with nothing new stays silent.
    assert!(staff.pump_board().is_empty());
}

#[tokio::test]
async fn customer_message_raises_unread_alert_and_reading_does_not() {
    let h = TestHarness::setup();
    let mut gary = h.shopper("Gary");
    let order = gary.place_order(&h).await;

    let mut staff = h.staff();
    staff.open_board();

    gary.send_order_message(&order, "extra hot please").await;
    let alerts = staff.pump_board();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].updated_threads, 1);

    // Staff reads the thread; the counter drops, nothing alerts.
    let msgs = gary.thread_messages(&order).await;
    messaging::mark_order_messages_read(
        &staff.session.store,
        &staff.session.read_guard,
        &order,
        MessageSender::Business,
        &msgs,
    )
    .await
    .unwrap();
    assert!(staff.pump_board().is_empty());
}

#[tokio::test]
async fn staff_own_reply_does_not_alert_the_board() {
    let h = TestHarness::setup();
    let mut gary = h.shopper("Gary");
    let order = gary.place_order(&h).await;

    let mut staff = h.staff();
    staff.open_board();
    staff.reply_on_order(&order, "coming right up").await;

    // The reply bumps the customer's counter, not the staff one.
    assert!(staff.pump_board().is_empty());
}

#[tokio::test]
async fn replacing_the_board_subscription_reseeds_the_baseline() {
    let h = TestHarness::setup();
    let mut gary = h.shopper("Gary");
    gary.place_order(&h).await;

    let mut staff = h.staff();
    staff.open_board();
    assert_eq!(staff.session.store.subscriber_count(), 1);

    // Navigating back to the board installs a fresh subscription and
    // a fresh reducer; the old listener is gone, the seed is silent.
    staff.board = kiosk_engine::sync::OrderBoard::new();
    staff
        .session
        .install(Slot::OrderBoard, |store| store.subscribe(kiosk_engine::ORDERS, Filter::All));
    assert_eq!(staff.session.store.subscriber_count(), 1);
    assert!(staff.pump_board().is_empty());
    assert_eq!(staff.board.orders.len(), 1);
}

#[tokio::test]
async fn thread_subcollection_is_reachable_by_path() {
    let h = TestHarness::setup();
    let mut gary = h.shopper("Gary");
    let order = gary.place_order(&h).await;
    gary.send_order_message(&order, "hello").await;

    let docs = h
        .store
        .fetch_page(&order_messages_path(&order.0), &Filter::All, 10)
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(decode_message(&docs[0]).unwrap().message.text, "hello");
}

//! Both messaging channels end to end, including read-receipt
//! idempotency and the support inbox.

use kiosk_common::message::MessageSender;
use kiosk_common::support::{ChatSender, ChatStatus};
use kiosk_engine::messaging;
use kiosk_engine::orders::decode_order;
use kiosk_engine::support::{self, decode_chat, decode_chat_message};
use kiosk_engine::sync::OrderThread;
use kiosk_engine::{chat_messages_path, ORDERS, CHATS};
use kiosk_engine_integration::TestHarness;
use kiosk_store::Filter;

#[tokio::test]
async fn order_thread_round_trip_with_read_receipts() {
    let h = TestHarness::setup();
    let mut gary = h.shopper("Gary");
    let order = gary.place_order(&h).await;

    gary.send_order_message(&order, "no onions please").await;
    let staff = h.staff();
    staff.reply_on_order(&order, "noted!").await;

    let parent = decode_order(&h.store.get(ORDERS, &order.0).await.unwrap().unwrap()).unwrap();
    assert_eq!(parent.order.unread_for_business_count, 1);
    assert_eq!(parent.order.unread_for_customer_count, 1);
    assert_eq!(parent.order.last_message_preview.as_deref(), Some("noted!"));

    // Customer reads; only their side zeroes.
    let msgs = gary.thread_messages(&order).await;
    let wrote = messaging::mark_order_messages_read(
        &h.store,
        &gary.session.read_guard,
        &order,
        MessageSender::Customer,
        &msgs,
    )
    .await
    .unwrap();
    assert!(wrote);

    let parent = decode_order(&h.store.get(ORDERS, &order.0).await.unwrap().unwrap()).unwrap();
    assert_eq!(parent.order.unread_for_customer_count, 0);
    assert_eq!(parent.order.unread_for_business_count, 1);

    // A second identical pass is a no-op: one receipt batch total.
    let commits = h.store.batch_commits();
    let msgs = gary.thread_messages(&order).await;
    let wrote = messaging::mark_order_messages_read(
        &h.store,
        &gary.session.read_guard,
        &order,
        MessageSender::Customer,
        &msgs,
    )
    .await
    .unwrap();
    assert!(!wrote);
    assert_eq!(h.store.batch_commits(), commits);
}

#[tokio::test]
async fn thread_reducer_reports_fresh_business_messages() {
    let h = TestHarness::setup();
    let mut gary = h.shopper("Gary");
    let order = gary.place_order(&h).await;
    let staff = h.staff();
    staff.reply_on_order(&order, "first").await;

    let mut thread = OrderThread::new();
    let mut sub = h
        .store
        .subscribe(&kiosk_engine::order_messages_path(&order.0), Filter::All);

    let seed = sub.try_next().expect("seeding snapshot");
    assert_eq!(thread.apply(&seed), 0);

    staff.reply_on_order(&order, "second").await;
    let snap = sub.try_next().expect("reply snapshot");
    assert_eq!(thread.apply(&snap), 1);
    assert_eq!(thread.messages.len(), 2);
    assert_eq!(thread.unread_for(MessageSender::Customer), 2);
}

#[tokio::test]
async fn support_chat_flow_create_alert_reply_close() {
    let h = TestHarness::setup();
    let mut staff = h.staff();
    assert_eq!(staff.open_inbox(), None);

    let mut emma = h.shopper("Emma");
    let chat_id = emma.ask_support("do you have oat milk?").await;

    let alerts = staff.pump_inbox();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].new_chats, 1);
    assert_eq!(staff.inbox.total_unread(), 1);

    // Staff reads the chat, replies; customer's unread goes up.
    let msgs: Vec<_> = h
        .store
        .fetch_page(&chat_messages_path(&chat_id), &Filter::All, usize::MAX)
        .await
        .unwrap()
        .iter()
        .map(|d| decode_chat_message(d).unwrap())
        .collect();
    support::mark_chat_read(
        &h.store,
        &staff.session.read_guard,
        &chat_id,
        ChatSender::Admin,
        &msgs,
    )
    .await
    .unwrap();
    support::send_admin_reply(&h.store, &chat_id, "we do!").await.unwrap();

    let chat = decode_chat(&h.store.get(CHATS, &chat_id).await.unwrap().unwrap()).unwrap();
    assert_eq!(chat.chat.unread_for_admin, 0);
    assert_eq!(chat.chat.unread_for_customer, 1);

    // Read receipt and reply change the chat but add no new chat and
    // no admin-unread rise: pumping raises nothing.
    assert!(staff.pump_inbox().is_empty());

    support::close_chat(&h.store, &chat_id).await.unwrap();
    staff.pump_inbox();
    assert_eq!(staff.inbox.chats[0].chat.status, ChatStatus::Closed);

    // Customer writes again into the same chat; inbox alerts again.
    let again = emma.ask_support("and decaf?").await;
    assert_eq!(again, chat_id);
    let alerts = staff.pump_inbox();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].updated_chats, 1);
}

#[tokio::test]
async fn inbox_orders_by_recent_activity() {
    let h = TestHarness::setup();
    let mut emma = h.shopper("Emma");
    let mut gary = h.shopper("Gary");
    let first = emma.ask_support("question one").await;
    let second = gary.ask_support("question two").await;
    assert_ne!(first, second);

    let mut staff = h.staff();
    staff.open_inbox();
    assert_eq!(staff.inbox.chats[0].id, second);

    // Activity on the older chat floats it back to the top.
    emma.ask_support("still there?").await;
    staff.pump_inbox();
    assert_eq!(staff.inbox.chats[0].id, first);
}

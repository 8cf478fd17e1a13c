//! Order lifecycle end to end: checkout, staff transitions, delivery
//! confirmation, and what the customer's live order view sees.

use kiosk_common::order::{DeliveryConfirmation, OrderStatus};
use kiosk_engine::orders::{self, decode_order, DeliveryDecision};
use kiosk_engine::session::Slot;
use kiosk_engine::ORDERS;
use kiosk_engine_integration::TestHarness;
use kiosk_store::ChangeKind;

#[tokio::test]
async fn full_lifecycle_with_confirmation() {
    let h = TestHarness::setup();
    let mut alice = h.shopper("Alice");
    let order = alice.place_order(&h).await;

    let staff = h.staff();
    staff.set_status(&order, OrderStatus::InProgress).await;
    staff.set_status(&order, OrderStatus::Ready).await;
    staff.set_status(&order, OrderStatus::Delivered).await;

    // The customer's live view shows the prompt, answers it.
    let doc = decode_order(&h.store.get(ORDERS, &order.0).await.unwrap().unwrap()).unwrap();
    assert!(orders::should_prompt_delivery(&alice.session.local, &doc));
    orders::submit_delivery_decision(
        &h.store,
        &mut alice.session.local,
        &order,
        DeliveryDecision::Confirmed,
    )
    .await
    .unwrap();

    let doc = decode_order(&h.store.get(ORDERS, &order.0).await.unwrap().unwrap()).unwrap();
    assert_eq!(doc.order.delivery_confirmed, DeliveryConfirmation::Confirmed);
    assert!(!orders::should_prompt_delivery(&alice.session.local, &doc));

    let mut staff = h.staff();
    staff.open_board();
    assert_eq!(staff.board.confirmed_history().len(), 1);
    assert!(staff.board.denied_deliveries().is_empty());
}

#[tokio::test]
async fn denied_delivery_lands_on_the_staff_board() {
    let h = TestHarness::setup();
    let mut bob = h.shopper("Bob");
    let order = bob.place_order(&h).await;

    let mut staff = h.staff();
    staff.open_board();
    staff.set_status(&order, OrderStatus::Delivered).await;

    orders::submit_delivery_decision(
        &h.store,
        &mut bob.session.local,
        &order,
        DeliveryDecision::Denied,
    )
    .await
    .unwrap();

    staff.pump_board();
    let denied = staff.board.denied_deliveries();
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].id, order);
    assert_eq!(staff.board.counts().denied_deliveries, 1);
}

#[tokio::test]
async fn customer_order_view_tracks_status_and_deletion() {
    let h = TestHarness::setup();
    let mut iris = h.shopper("Iris");
    let order = iris.place_order(&h).await;

    let view = iris
        .session
        .install(Slot::ActiveOrder, |store| store.subscribe_doc(ORDERS, &order.0));

    let seed = view.try_next().expect("seeding snapshot");
    assert_eq!(
        decode_order(&seed.docs[0]).unwrap().order.status,
        OrderStatus::New
    );

    let staff = h.staff();
    staff.set_status(&order, OrderStatus::Ready).await;
    let view = iris.session.subscription(Slot::ActiveOrder).unwrap();
    let snap = view.try_next().expect("status change snapshot");
    assert_eq!(
        decode_order(&snap.docs[0]).unwrap().order.status,
        OrderStatus::Ready
    );

    // Deleting the order tells the watcher it is gone.
    h.store.delete(ORDERS, &order.0).await.unwrap();
    let view = iris.session.subscription(Slot::ActiveOrder).unwrap();
    let snap = view.try_next().expect("deletion snapshot");
    assert!(snap.docs.is_empty());
    assert_eq!(snap.changes[0].kind, ChangeKind::Removed);
}

#[tokio::test]
async fn stale_decision_is_rejected_after_status_cycled() {
    let h = TestHarness::setup();
    let mut alice = h.shopper("Alice");
    let order = alice.place_order(&h).await;

    let staff = h.staff();
    staff.set_status(&order, OrderStatus::Delivered).await;
    // Staff pulls it back before the customer answers.
    staff.set_status(&order, OrderStatus::InProgress).await;

    let err = orders::submit_delivery_decision(
        &h.store,
        &mut alice.session.local,
        &order,
        DeliveryDecision::Confirmed,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        kiosk_engine::EngineError::NotDelivered(OrderStatus::InProgress)
    ));

    // Delivered again: the prompt is back, unanswered.
    staff.set_status(&order, OrderStatus::Delivered).await;
    let doc = decode_order(&h.store.get(ORDERS, &order.0).await.unwrap().unwrap()).unwrap();
    assert!(orders::should_prompt_delivery(&alice.session.local, &doc));
}

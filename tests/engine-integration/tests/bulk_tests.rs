//! Bulk deletion: batching, selectors, the recount-before-confirm
//! contract, and cascade of order subcollections.

use std::collections::BTreeSet;

use kiosk_common::order::OrderStatus;
use kiosk_engine::bulk::{self, DeleteSelector, DELETE_BATCH_SIZE};
use kiosk_engine::{order_messages_path, ORDERS};
use kiosk_engine_integration::TestHarness;
use kiosk_store::Filter;
use serde_json::json;

async fn seed_plain_orders(h: &TestHarness, n: usize, status: OrderStatus) {
    for i in 0..n {
        h.store
            .create(
                ORDERS,
                json!({
                    "status": status.as_str(),
                    "customer": { "name": format!("c{i}"), "phone": "0501234567" },
                    "items": [],
                    "total": 0,
                    "createdAt": h.store.server_time(),
                }),
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn four_hundred_fifty_orders_take_three_batches() {
    let h = TestHarness::setup();
    seed_plain_orders(&h, 450, OrderStatus::Delivered).await;

    let before = h.store.batch_commits();
    let deleted = bulk::delete_orders(&h.store, &DeleteSelector::All).await.unwrap();
    assert_eq!(deleted, 450);
    assert_eq!(h.store.batch_commits() - before, 3);
}

#[tokio::test]
async fn count_is_recomputed_between_phrase_and_final_confirm() {
    // The guard flow recounts right before the destructive step; an
    // order placed in between must show up in the second count.
    let h = TestHarness::setup();
    seed_plain_orders(&h, 10, OrderStatus::Delivered).await;

    let selector = DeleteSelector::ByStatus(BTreeSet::from([OrderStatus::Delivered]));
    let first_count = bulk::count_matching(&h.store, &selector).await.unwrap();
    assert_eq!(first_count, 10);

    seed_plain_orders(&h, 2, OrderStatus::Delivered).await;
    let final_count = bulk::count_matching(&h.store, &selector).await.unwrap();
    assert_eq!(final_count, 12);

    let deleted = bulk::delete_orders(&h.store, &selector).await.unwrap();
    assert_eq!(deleted as usize, final_count);
}

#[tokio::test]
async fn deleting_an_order_takes_its_thread_with_it() {
    let h = TestHarness::setup();
    let mut gary = h.shopper("Gary");
    let order = gary.place_order(&h).await;
    gary.send_order_message(&order, "see you soon").await;

    let deleted = bulk::delete_orders(&h.store, &DeleteSelector::ById(vec![order.clone()]))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let msgs = h
        .store
        .fetch_page(&order_messages_path(&order.0), &Filter::All, 10)
        .await
        .unwrap();
    assert!(msgs.is_empty());
}

#[tokio::test]
async fn mid_run_failure_reports_partial_progress_and_is_resumable() {
    let h = TestHarness::setup();
    seed_plain_orders(&h, DELETE_BATCH_SIZE * 2, OrderStatus::Cancelled).await;
    h.store.fail_batches_after(1, 1);

    let abort = bulk::delete_orders(&h.store, &DeleteSelector::All)
        .await
        .unwrap_err();
    assert_eq!(abort.deleted as usize, DELETE_BATCH_SIZE);

    let remaining = bulk::count_matching(&h.store, &DeleteSelector::All).await.unwrap();
    assert_eq!(remaining, DELETE_BATCH_SIZE);
    assert_eq!(
        bulk::delete_orders(&h.store, &DeleteSelector::All).await.unwrap() as usize,
        DELETE_BATCH_SIZE
    );
}

//! The order-created SMS trigger wired to a live subscription.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kiosk_common::order::SmsStatus;
use kiosk_engine::notify::{run_order_created_trigger, SmsSendError, SmsSender};
use kiosk_engine::orders::decode_order;
use kiosk_engine::ORDERS;
use kiosk_engine_integration::TestHarness;

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct CountingSms {
    sends: AtomicUsize,
}

impl SmsSender for CountingSms {
    async fn send(&self, _to: &str, _body: &str) -> Result<String, SmsSendError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("SM{n:04}"))
    }
}

async fn wait_for_receipt(h: &TestHarness, order_id: &str) -> SmsStatus {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let doc = h.store.get(ORDERS, order_id).await.unwrap().unwrap();
        if let Some(receipt) = decode_order(&doc).unwrap().order.sms {
            return receipt.status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no receipt within timeout"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn orders_placed_while_running_get_exactly_one_sms() {
    let h = TestHarness::setup();
    let sms = Arc::new(CountingSms::default());
    let task = tokio::spawn(run_order_created_trigger(h.store.clone(), sms.clone()));

    let mut gary = h.shopper("Gary");
    let order = gary.place_order(&h).await;
    assert_eq!(wait_for_receipt(&h, &order.0).await, SmsStatus::Sent);

    // Later writes to the same order change nothing sms-wise.
    let staff = h.staff();
    staff
        .set_status(&order, kiosk_common::order::OrderStatus::Ready)
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(sms.sends.load(Ordering::SeqCst), 1);

    task.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backlog_and_invalid_phones_settle_into_terminal_receipts() {
    let h = TestHarness::setup();
    // One order exists before the trigger starts; the seeding
    // snapshot delivers it as a creation event.
    let mut emma = h.shopper("Emma");
    let backlog = emma.place_order(&h).await;

    let sms = Arc::new(CountingSms::default());
    let task = tokio::spawn(run_order_created_trigger(h.store.clone(), sms.clone()));

    let mut iris = h.shopper("Iris");
    let bad_phone = iris.place_order_with_phone(&h, "02-6234567").await;

    assert_eq!(wait_for_receipt(&h, &backlog.0).await, SmsStatus::Sent);
    assert_eq!(
        wait_for_receipt(&h, &bad_phone.0).await,
        SmsStatus::InvalidPhone
    );
    assert_eq!(sms.sends.load(Ordering::SeqCst), 1);

    task.abort();
}

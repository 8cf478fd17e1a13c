use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use kiosk_common::message::MessageSender;
use kiosk_common::order::{OrderId, OrderItem, OrderStatus};
use kiosk_common::schedule::{DayWindow, PickupConfig, WeeklyHours};
use kiosk_engine::localstore::LocalFlags;
use kiosk_engine::messaging::{self, decode_message, MessageDoc};
use kiosk_engine::orders::{self, CheckoutForm};
use kiosk_engine::session::{Session, Slot};
use kiosk_engine::support;
use kiosk_engine::sync::{BoardAlert, InboxAlert, OrderBoard, SupportInbox};
use kiosk_engine::{order_messages_path, CHATS, ORDERS};
use kiosk_store::{Filter, Store};

/// Fixed wall clock for schedule math: Sunday 2026-03-01, 10:00,
/// well inside the nine-to-five window.
pub fn harness_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 1)
        .unwrap()
        .and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap())
}

pub fn nine_to_five() -> WeeklyHours {
    let mut hours = WeeklyHours::closed();
    for day in 0..7 {
        hours.set_day(
            day,
            DayWindow::new(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            ),
        );
    }
    hours
}

pub fn sample_item(name: &str, qty: u32, unit_price: u64) -> OrderItem {
    OrderItem {
        id: name.to_lowercase().replace(' ', "-"),
        name: name.to_owned(),
        qty,
        base_price: unit_price,
        modifiers: BTreeMap::new(),
        unit_price,
        line_total: 0,
    }
}

/// One store, one schedule, as many participants as a test wants.
pub struct TestHarness {
    pub store: Store,
    pub hours: WeeklyHours,
    pub config: PickupConfig,
    pub now: NaiveDateTime,
}

impl TestHarness {
    pub fn setup() -> Self {
        tracing_subscriber::fmt::try_init().ok();
        TestHarness {
            store: Store::new(),
            hours: nine_to_five(),
            config: PickupConfig::default(),
            now: harness_now(),
        }
    }

    /// A customer-side participant with its own device-local state.
    pub fn shopper(&self, name: &str) -> Shopper {
        Shopper {
            name: name.to_owned(),
            session: Session::new(self.store.clone(), LocalFlags::in_memory()),
        }
    }

    /// The staff console participant.
    pub fn staff(&self) -> Staff {
        Staff {
            session: Session::new(self.store.clone(), LocalFlags::in_memory()),
            board: OrderBoard::new(),
            inbox: SupportInbox::new(),
        }
    }
}

/// A customer participant in the test harness.
pub struct Shopper {
    pub name: String,
    pub session: Session,
}

impl Shopper {
    /// Place an order through the full checkout path.
    pub async fn place_order(&mut self, h: &TestHarness) -> OrderId {
        self.place_order_with_phone(h, "050-1234567").await
    }

    pub async fn place_order_with_phone(&mut self, h: &TestHarness, phone: &str) -> OrderId {
        let form = CheckoutForm {
            items: vec![sample_item("Espresso", 2, 12)],
            customer_name: self.name.clone(),
            customer_phone: phone.to_owned(),
            notes: String::new(),
            pickup_slot: Some(h.now + chrono::Duration::minutes(30)),
        };
        orders::checkout(
            &h.store,
            &mut self.session.local,
            &h.hours,
            &h.config,
            h.now,
            form,
        )
        .await
        .expect("checkout should succeed")
    }

    pub async fn send_order_message(&mut self, order_id: &OrderId, text: &str) {
        messaging::send_order_message(
            &self.session.store,
            order_id,
            MessageSender::Customer,
            text,
        )
        .await
        .expect("customer message should send");
    }

    /// Ask support; returns the chat id (stable per device).
    pub async fn ask_support(&mut self, text: &str) -> String {
        support::send_customer_message(
            &self.session.store,
            &mut self.session.local,
            Some(&self.name),
            None,
            text,
        )
        .await
        .expect("support message should send")
    }

    pub async fn thread_messages(&self, order_id: &OrderId) -> Vec<MessageDoc> {
        self.session
            .store
            .fetch_page(&order_messages_path(&order_id.0), &Filter::All, usize::MAX)
            .await
            .expect("thread fetch")
            .iter()
            .map(|d| decode_message(d).expect("decode message"))
            .collect()
    }
}

/// The staff console participant: a session plus the board and inbox
/// reducers its views would hold.
pub struct Staff {
    pub session: Session,
    pub board: OrderBoard,
    pub inbox: SupportInbox,
}

impl Staff {
    /// Open the live board: subscribe and fold the seeding snapshot.
    /// Returns the baseline alert, which must always be `None`.
    pub fn open_board(&mut self) -> Option<BoardAlert> {
        self.session
            .install(Slot::OrderBoard, |store| store.subscribe(ORDERS, Filter::All));
        self.pump_board().into_iter().next()
    }

    /// Drain every queued board snapshot, collecting raised alerts.
    pub fn pump_board(&mut self) -> Vec<BoardAlert> {
        let mut alerts = Vec::new();
        if let Some(sub) = self.session.subscription(Slot::OrderBoard) {
            while let Some(snapshot) = sub.try_next() {
                if let Some(alert) = self.board.apply(&snapshot) {
                    alerts.push(alert);
                }
            }
        }
        alerts
    }

    pub fn open_inbox(&mut self) -> Option<InboxAlert> {
        self.session
            .install(Slot::SupportInbox, |store| store.subscribe(CHATS, Filter::All));
        self.pump_inbox().into_iter().next()
    }

    pub fn pump_inbox(&mut self) -> Vec<InboxAlert> {
        let mut alerts = Vec::new();
        if let Some(sub) = self.session.subscription(Slot::SupportInbox) {
            while let Some(snapshot) = sub.try_next() {
                if let Some(alert) = self.inbox.apply(&snapshot) {
                    alerts.push(alert);
                }
            }
        }
        alerts
    }

    pub async fn set_status(&self, order_id: &OrderId, status: OrderStatus) {
        orders::set_status(&self.session.store, order_id, status)
            .await
            .expect("status update should succeed");
    }

    pub async fn reply_on_order(&self, order_id: &OrderId, text: &str) {
        messaging::send_order_message(
            &self.session.store,
            order_id,
            MessageSender::Business,
            text,
        )
        .await
        .expect("staff message should send");
    }
}

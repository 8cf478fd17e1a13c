//! Reducers that fold live snapshots into client-side views.
//!
//! All of them follow the same discipline: the first snapshot seeds a
//! baseline and never raises an alert (a console opening onto five
//! orders is not five events), later snapshots raise at most one
//! coalesced alert per batch, counter decreases never alert, and the
//! baseline advances unconditionally whether or not anything alerted.
//! Display order is always recomputed here; the store's ordering is
//! never trusted.

use std::collections::HashMap;

use kiosk_common::message::MessageSender;
use kiosk_common::order::OrderStatus;
use kiosk_store::{ChangeKind, Snapshot};
use tracing::warn;

use crate::messaging::{decode_message, MessageDoc};
use crate::orders::{decode_order, OrderDoc};
use crate::support::{decode_chat, ChatDoc};

/// Coalesced alert for one board snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardAlert {
    /// Orders that appeared in this batch with status `new`.
    pub new_orders: usize,
    /// Existing orders whose customer-unread counter went up.
    pub updated_threads: usize,
}

/// Live counters shown on the staff board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub new: usize,
    pub in_progress: usize,
    pub ready: usize,
    pub denied_deliveries: usize,
}

/// The staff order board: every order, newest first.
#[derive(Debug, Default)]
pub struct OrderBoard {
    initialized: bool,
    unread_baseline: HashMap<String, u32>,
    pub orders: Vec<OrderDoc>,
}

impl OrderBoard {
    pub fn new() -> Self {
        OrderBoard::default()
    }

    /// Fold one snapshot into the board. Returns an alert only for
    /// post-baseline snapshots that contain something alert-worthy.
    pub fn apply(&mut self, snapshot: &Snapshot) -> Option<BoardAlert> {
        let mut orders: Vec<OrderDoc> = snapshot
            .docs
            .iter()
            .filter_map(|doc| match decode_order(doc) {
                Ok(order) => Some(order),
                Err(e) => {
                    warn!(doc_id = %doc.id, error = %e, "skipping malformed order");
                    None
                }
            })
            .collect();
        orders.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });

        let alert = if self.initialized {
            let new_orders = snapshot
                .changes
                .iter()
                .filter(|c| c.kind == ChangeKind::Added)
                .filter(|c| {
                    orders
                        .iter()
                        .any(|o| o.id.0 == c.id && o.order.status == OrderStatus::New)
                })
                .count();
            let updated_threads = orders
                .iter()
                .filter(|o| {
                    self.unread_baseline
                        .get(&o.id.0)
                        .is_some_and(|&seen| o.order.unread_for_business_count > seen)
                })
                .count();
            (new_orders > 0 || updated_threads > 0).then_some(BoardAlert {
                new_orders,
                updated_threads,
            })
        } else {
            self.initialized = true;
            None
        };

        self.unread_baseline = orders
            .iter()
            .map(|o| (o.id.0.clone(), o.order.unread_for_business_count))
            .collect();
        self.orders = orders;
        alert
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for doc in &self.orders {
            match doc.order.status {
                OrderStatus::New => counts.new += 1,
                OrderStatus::InProgress => counts.in_progress += 1,
                OrderStatus::Ready => counts.ready += 1,
                _ => {}
            }
            if doc.order.is_denied_delivery() {
                counts.denied_deliveries += 1;
            }
        }
        counts
    }

    /// Delivered orders the customer denied receiving, newest first.
    pub fn denied_deliveries(&self) -> Vec<&OrderDoc> {
        self.orders
            .iter()
            .filter(|o| o.order.is_denied_delivery())
            .collect()
    }

    /// Confirmed deliveries ordered by confirmation time, newest first.
    pub fn confirmed_history(&self) -> Vec<&OrderDoc> {
        let mut confirmed: Vec<&OrderDoc> = self
            .orders
            .iter()
            .filter(|o| o.order.delivery_confirmed.as_bool() == Some(true))
            .collect();
        confirmed.sort_by(|a, b| {
            b.order
                .delivery_confirmed_at
                .cmp(&a.order.delivery_confirmed_at)
        });
        confirmed
    }
}

/// Coalesced alert for one support-inbox snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxAlert {
    pub new_chats: usize,
    pub updated_chats: usize,
}

/// The staff support inbox: every chat, most recently active first.
#[derive(Debug, Default)]
pub struct SupportInbox {
    initialized: bool,
    unread_baseline: HashMap<String, u32>,
    pub chats: Vec<ChatDoc>,
}

impl SupportInbox {
    pub fn new() -> Self {
        SupportInbox::default()
    }

    pub fn apply(&mut self, snapshot: &Snapshot) -> Option<InboxAlert> {
        let mut chats: Vec<ChatDoc> = snapshot
            .docs
            .iter()
            .filter_map(|doc| match decode_chat(doc) {
                Ok(chat) => Some(chat),
                Err(e) => {
                    warn!(doc_id = %doc.id, error = %e, "skipping malformed chat");
                    None
                }
            })
            .collect();
        chats.sort_by(|a, b| {
            b.chat
                .updated_at
                .cmp(&a.chat.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let alert = if self.initialized {
            let new_chats = snapshot
                .changes
                .iter()
                .filter(|c| c.kind == ChangeKind::Added)
                .count();
            let updated_chats = chats
                .iter()
                .filter(|c| {
                    self.unread_baseline
                        .get(&c.id)
                        .is_some_and(|&seen| c.chat.unread_for_admin > seen)
                })
                .count();
            (new_chats > 0 || updated_chats > 0).then_some(InboxAlert {
                new_chats,
                updated_chats,
            })
        } else {
            self.initialized = true;
            None
        };

        self.unread_baseline = chats
            .iter()
            .map(|c| (c.id.clone(), c.chat.unread_for_admin))
            .collect();
        self.chats = chats;
        alert
    }

    pub fn total_unread(&self) -> u32 {
        self.chats.iter().map(|c| c.chat.unread_for_admin).sum()
    }
}

/// One order's conversation as the customer sees it.
#[derive(Debug, Default)]
pub struct OrderThread {
    initialized: bool,
    known_business_count: usize,
    pub messages: Vec<MessageDoc>,
}

impl OrderThread {
    pub fn new() -> Self {
        OrderThread::default()
    }

    /// Fold one snapshot; returns how many business messages are new
    /// since the baseline (zero for the seeding snapshot).
    pub fn apply(&mut self, snapshot: &Snapshot) -> usize {
        let mut messages: Vec<MessageDoc> = snapshot
            .docs
            .iter()
            .filter_map(|doc| match decode_message(doc) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!(doc_id = %doc.id, error = %e, "skipping malformed message");
                    None
                }
            })
            .collect();
        messages.sort_by(|a, b| {
            a.message
                .created_at
                .cmp(&b.message.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let business_count = messages
            .iter()
            .filter(|m| m.message.sender == MessageSender::Business)
            .count();
        let fresh = if self.initialized {
            business_count.saturating_sub(self.known_business_count)
        } else {
            self.initialized = true;
            0
        };
        self.known_business_count = business_count;
        self.messages = messages;
        fresh
    }

    pub fn unread_for(&self, viewer: MessageSender) -> usize {
        self.messages
            .iter()
            .filter(|m| m.message.sender == viewer.counterpart() && !m.message.is_read_by(viewer))
            .count()
    }
}

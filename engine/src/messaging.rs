//! The per-order conversation channel. Every send is one atomic
//! batch: the message insert, the parent's preview/`lastMessageAt`
//! denormalization, and the counterpart's unread increment land
//! together or not at all.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use kiosk_common::message::{self, MessageSender, OrderMessage};
use kiosk_common::order::OrderId;
use kiosk_store::{Document, FieldWrite, Store, WriteBatch};
use serde_json::json;
use tracing::debug;

use crate::{fields, order_messages_path, Result, ORDERS};

/// A message document paired with its id.
#[derive(Debug, Clone)]
pub struct MessageDoc {
    pub id: String,
    pub message: OrderMessage,
}

pub fn decode_message(doc: &Document) -> Result<MessageDoc> {
    Ok(MessageDoc {
        id: doc.id.clone(),
        message: serde_json::from_value(doc.data.clone())?,
    })
}

fn unread_counter_for(recipient: MessageSender) -> &'static str {
    match recipient {
        MessageSender::Business => fields::UNREAD_FOR_BUSINESS,
        MessageSender::Customer => fields::UNREAD_FOR_CUSTOMER,
    }
}

fn read_flag_for(viewer: MessageSender) -> &'static str {
    match viewer {
        MessageSender::Business => fields::READ_BY_BUSINESS,
        MessageSender::Customer => fields::READ_BY_CUSTOMER,
    }
}

/// Send a message on an order's thread. Validates locally before any
/// write and commits the insert, the parent preview, and the unread
/// increment as one batch.
pub async fn send_order_message(
    store: &Store,
    order_id: &OrderId,
    sender: MessageSender,
    raw_text: &str,
) -> Result<()> {
    let text = message::validate_text(raw_text)?;
    let msg = OrderMessage {
        sender,
        text: text.clone(),
        created_at: store.server_time(),
        read_by_business: sender == MessageSender::Business,
        read_by_customer: sender == MessageSender::Customer,
    };

    let mut batch = WriteBatch::new();
    batch.create(&order_messages_path(&order_id.0), serde_json::to_value(&msg)?);
    batch.update(
        ORDERS,
        &order_id.0,
        vec![
            (fields::LAST_MESSAGE_AT.to_owned(), FieldWrite::ServerTimestamp),
            (
                fields::LAST_MESSAGE_PREVIEW.to_owned(),
                FieldWrite::Value(json!(message::preview(&text))),
            ),
            (
                unread_counter_for(sender.counterpart()).to_owned(),
                FieldWrite::Increment(1),
            ),
        ],
    );
    store.commit(batch).await?;
    Ok(())
}

/// Re-entrancy guard for read receipts: at most one receipt batch in
/// flight per thread, so a snapshot arriving while the batch commits
/// cannot double-fire it. Clones share the underlying set.
#[derive(Debug, Clone, Default)]
pub struct ReadGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ReadGuard {
    pub fn new() -> Self {
        ReadGuard::default()
    }

    /// Try to claim `key`. Returns false when already claimed.
    pub(crate) fn begin(&self, key: &str) -> bool {
        let mut set = match self.in_flight.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.insert(key.to_owned())
    }

    pub(crate) fn end(&self, key: &str) {
        let mut set = match self.in_flight.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.remove(key);
    }
}

/// Mark the counterpart's messages read for `viewer` and zero the
/// viewer's unread counter, all in one batch. Returns whether a write
/// was issued; no unread messages, or a receipt already in flight for
/// this thread, short-circuits to `Ok(false)`.
pub async fn mark_order_messages_read(
    store: &Store,
    guard: &ReadGuard,
    order_id: &OrderId,
    viewer: MessageSender,
    messages: &[MessageDoc],
) -> Result<bool> {
    let thread_key = order_messages_path(&order_id.0);
    if !guard.begin(&thread_key) {
        debug!(order_id = %order_id, "read receipt already in flight");
        return Ok(false);
    }

    let unread: Vec<&MessageDoc> = messages
        .iter()
        .filter(|m| m.message.sender == viewer.counterpart() && !m.message.is_read_by(viewer))
        .collect();
    if unread.is_empty() {
        guard.end(&thread_key);
        return Ok(false);
    }

    let mut batch = WriteBatch::new();
    for doc in &unread {
        batch.update(
            &thread_key,
            &doc.id,
            vec![(read_flag_for(viewer).to_owned(), FieldWrite::Value(json!(true)))],
        );
    }
    batch.update(
        ORDERS,
        &order_id.0,
        vec![(
            unread_counter_for(viewer).to_owned(),
            FieldWrite::Value(json!(0)),
        )],
    );
    let result = store.commit(batch).await;
    guard.end(&thread_key);
    result?;
    debug!(order_id = %order_id, count = unread.len(), "messages marked read");
    Ok(true)
}

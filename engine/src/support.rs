//! The support channel: pre-order chats between anonymous visitors
//! and staff. Unlike the order channel there are many chats; staff
//! work on one selected chat at a time.

use kiosk_common::message;
use kiosk_common::support::{ChatSender, ChatStatus, SupportChat, SupportChatMessage};
use kiosk_store::{Document, FieldWrite, Filter, Store, StoreError, WriteBatch};
use serde_json::json;
use tracing::{debug, info};

use crate::localstore::LocalFlags;
use crate::messaging::ReadGuard;
use crate::{chat_messages_path, fields, EngineError, Result, CHATS};

#[derive(Debug, Clone)]
pub struct ChatDoc {
    pub id: String,
    pub chat: SupportChat,
}

#[derive(Debug, Clone)]
pub struct ChatMessageDoc {
    pub id: String,
    pub message: SupportChatMessage,
}

pub fn decode_chat(doc: &Document) -> Result<ChatDoc> {
    Ok(ChatDoc {
        id: doc.id.clone(),
        chat: serde_json::from_value(doc.data.clone())?,
    })
}

pub fn decode_chat_message(doc: &Document) -> Result<ChatMessageDoc> {
    Ok(ChatMessageDoc {
        id: doc.id.clone(),
        message: serde_json::from_value(doc.data.clone())?,
    })
}

fn unread_counter_for(recipient: ChatSender) -> &'static str {
    match recipient {
        ChatSender::Admin => fields::UNREAD_FOR_ADMIN,
        ChatSender::Customer => fields::UNREAD_FOR_CUSTOMER_CHAT,
    }
}

fn read_stamp_for(viewer: ChatSender) -> &'static str {
    match viewer {
        ChatSender::Admin => fields::READ_BY_ADMIN_AT,
        ChatSender::Customer => fields::READ_BY_CUSTOMER_AT,
    }
}

/// The chat this device already started, if any.
pub async fn find_chat_for_device(store: &Store, device_id: &str) -> Result<Option<ChatDoc>> {
    let docs = store
        .fetch_page(
            CHATS,
            &Filter::field_in(fields::CUSTOMER_DEVICE_ID, vec![json!(device_id)]),
            1,
        )
        .await?;
    docs.first().map(decode_chat).transpose()
}

/// Send a visitor message. The first message from a device creates
/// the chat document and the message in one batch; later messages
/// append and bump the chat's preview, `updatedAt`, and the staff
/// unread counter, also in one batch.
pub async fn send_customer_message(
    store: &Store,
    local: &mut LocalFlags,
    customer_name: Option<&str>,
    customer_phone: Option<&str>,
    raw_text: &str,
) -> Result<String> {
    let text = message::validate_text(raw_text)?;
    let device_id = local.device_id();
    let now = store.server_time();
    let msg = SupportChatMessage {
        sender: ChatSender::Customer,
        text: text.clone(),
        created_at: now,
        read_by_admin_at: None,
        read_by_customer_at: Some(now),
    };

    let mut batch = WriteBatch::new();
    let chat_id = match find_chat_for_device(store, &device_id).await? {
        Some(existing) => {
            batch.create(&chat_messages_path(&existing.id), serde_json::to_value(&msg)?);
            batch.update(
                CHATS,
                &existing.id,
                vec![
                    (
                        fields::LAST_MESSAGE.to_owned(),
                        FieldWrite::Value(json!(message::preview(&text))),
                    ),
                    (fields::UPDATED_AT.to_owned(), FieldWrite::ServerTimestamp),
                    (fields::UNREAD_FOR_ADMIN.to_owned(), FieldWrite::Increment(1)),
                ],
            );
            existing.id
        }
        None => {
            let chat = SupportChat {
                status: ChatStatus::Open,
                customer_name: customer_name.map(str::to_owned),
                customer_phone: customer_phone.map(str::to_owned),
                customer_device_id: device_id,
                last_message: Some(message::preview(&text)),
                created_at: now,
                updated_at: now,
                unread_for_admin: 1,
                unread_for_customer: 0,
            };
            let chat_id = batch.create(CHATS, serde_json::to_value(&chat)?);
            batch.create(&chat_messages_path(&chat_id), serde_json::to_value(&msg)?);
            chat_id
        }
    };
    store.commit(batch).await?;
    debug!(chat_id = %chat_id, "customer support message sent");
    Ok(chat_id)
}

/// Staff reply to a chat. Re-opens a closed chat in the same batch as
/// the message, since answering is what reopening means here.
pub async fn send_admin_reply(store: &Store, chat_id: &str, raw_text: &str) -> Result<()> {
    let text = message::validate_text(raw_text)?;
    let now = store.server_time();
    let msg = SupportChatMessage {
        sender: ChatSender::Admin,
        text: text.clone(),
        created_at: now,
        read_by_admin_at: Some(now),
        read_by_customer_at: None,
    };

    let mut batch = WriteBatch::new();
    batch.create(&chat_messages_path(chat_id), serde_json::to_value(&msg)?);
    batch.update(
        CHATS,
        chat_id,
        vec![
            (
                fields::STATUS.to_owned(),
                FieldWrite::Value(serde_json::to_value(ChatStatus::Open)?),
            ),
            (
                fields::LAST_MESSAGE.to_owned(),
                FieldWrite::Value(json!(message::preview(&text))),
            ),
            (fields::UPDATED_AT.to_owned(), FieldWrite::ServerTimestamp),
            (
                fields::UNREAD_FOR_CUSTOMER_CHAT.to_owned(),
                FieldWrite::Increment(1),
            ),
        ],
    );
    store.commit(batch).await.map_err(|e| match e {
        StoreError::NotFound { .. } => EngineError::ChatNotFound(chat_id.to_owned()),
        other => other.into(),
    })?;
    debug!(chat_id, "admin reply sent");
    Ok(())
}

/// Close a chat without deleting its history.
pub async fn close_chat(store: &Store, chat_id: &str) -> Result<()> {
    store
        .update(
            CHATS,
            chat_id,
            vec![
                (
                    fields::STATUS.to_owned(),
                    FieldWrite::Value(serde_json::to_value(ChatStatus::Closed)?),
                ),
                (fields::UPDATED_AT.to_owned(), FieldWrite::ServerTimestamp),
            ],
        )
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => EngineError::ChatNotFound(chat_id.to_owned()),
            other => other.into(),
        })?;
    info!(chat_id, "chat closed");
    Ok(())
}

/// Stamp the counterpart's messages as read by `viewer` and zero the
/// viewer's unread counter in one batch. Same idempotency contract as
/// the order channel: returns whether a write was issued.
pub async fn mark_chat_read(
    store: &Store,
    guard: &ReadGuard,
    chat_id: &str,
    viewer: ChatSender,
    messages: &[ChatMessageDoc],
) -> Result<bool> {
    let thread_key = chat_messages_path(chat_id);
    if !guard.begin(&thread_key) {
        return Ok(false);
    }

    let unread: Vec<&ChatMessageDoc> = messages
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
            vec![(read_stamp_for(viewer).to_owned(), FieldWrite::ServerTimestamp)],
        );
    }
    batch.update(
        CHATS,
        chat_id,
        vec![(unread_counter_for(viewer).to_owned(), FieldWrite::Value(json!(0)))],
    );
    let result = store.commit(batch).await;
    guard.end(&thread_key);
    result?;
    Ok(true)
}

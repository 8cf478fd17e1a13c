//! Support-channel types: pre-order chats between anonymous visitors
//! and staff, kept in their own collection rather than under an order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSender {
    Customer,
    Admin,
}

impl ChatSender {
    pub fn counterpart(self) -> ChatSender {
        match self {
            ChatSender::Customer => ChatSender::Admin,
            ChatSender::Admin => ChatSender::Customer,
        }
    }
}

/// A support conversation document. `updated_at` orders the staff
/// inbox; the unread counters drive its badges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportChat {
    #[serde(default)]
    pub status: ChatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    /// Stable per-device token letting an anonymous visitor find
    /// their own chat again.
    pub customer_device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub unread_for_admin: u32,
    #[serde(default)]
    pub unread_for_customer: u32,
}

/// One message in a support chat's subcollection. Read receipts are
/// timestamps here; `None` means unread by that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportChatMessage {
    pub sender: ChatSender,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_by_admin_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_by_customer_at: Option<DateTime<Utc>>,
}

impl SupportChatMessage {
    pub fn is_read_by(&self, viewer: ChatSender) -> bool {
        match viewer {
            ChatSender::Admin => self.read_by_admin_at.is_some(),
            ChatSender::Customer => self.read_by_customer_at.is_some(),
        }
    }
}

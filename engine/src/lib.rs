//! Order lifecycle and realtime synchronization engine: checkout,
//! staff status transitions, delivery confirmation, two messaging
//! channels, snapshot reducers for the staff board and inboxes, bulk
//! deletion, and the order-created SMS trigger.

pub mod bulk;
pub mod error;
pub mod localstore;
pub mod messaging;
pub mod notify;
pub mod orders;
pub mod session;
pub mod support;
pub mod sync;

pub use error::{EngineError, Result};

/// Top-level collection of order documents.
pub const ORDERS: &str = "orders";
/// Top-level collection of support chats.
pub const CHATS: &str = "chats";

pub fn order_messages_path(order_id: &str) -> String {
    format!("{ORDERS}/{order_id}/messages")
}

pub fn chat_messages_path(chat_id: &str) -> String {
    format!("{CHATS}/{chat_id}/messages")
}

/// Document field names, as written to the wire.
pub(crate) mod fields {
    pub const STATUS: &str = "status";
    pub const DELIVERY_CONFIRMED: &str = "deliveryConfirmed";
    pub const DELIVERY_CONFIRMED_AT: &str = "deliveryConfirmedAt";
    pub const DELIVERY_CONFIRM_NOTE: &str = "deliveryConfirmNote";
    pub const LAST_MESSAGE_AT: &str = "lastMessageAt";
    pub const LAST_MESSAGE_PREVIEW: &str = "lastMessagePreview";
    pub const UNREAD_FOR_BUSINESS: &str = "unreadForBusinessCount";
    pub const UNREAD_FOR_CUSTOMER: &str = "unreadForCustomerCount";
    pub const SMS: &str = "sms";
    pub const LAST_MESSAGE: &str = "lastMessage";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const UNREAD_FOR_ADMIN: &str = "unreadForAdmin";
    pub const UNREAD_FOR_CUSTOMER_CHAT: &str = "unreadForCustomer";
    pub const READ_BY_BUSINESS: &str = "readByBusiness";
    pub const READ_BY_CUSTOMER: &str = "readByCustomer";
    pub const READ_BY_ADMIN_AT: &str = "readByAdminAt";
    pub const READ_BY_CUSTOMER_AT: &str = "readByCustomerAt";
    pub const CUSTOMER_DEVICE_ID: &str = "customerDeviceId";
}

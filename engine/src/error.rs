use kiosk_common::message::MessageTextError;
use kiosk_common::order::OrderStatus;
use kiosk_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Backend failure; the operation may be retried as a whole.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored document does not decode as the expected shape.
    #[error("malformed document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("chat not found: {0}")]
    ChatNotFound(String),

    /// The order left the delivered state between the customer seeing
    /// the prompt and answering it; the answer is discarded.
    #[error("order is no longer delivered (currently {0})")]
    NotDelivered(OrderStatus),

    #[error(transparent)]
    InvalidMessage(#[from] MessageTextError),

    // Checkout validation, in the order the form is checked.
    #[error("cart is empty")]
    EmptyCart,
    #[error("customer name is required")]
    MissingName,
    #[error("invalid phone number")]
    InvalidPhone,
    #[error("ordering is closed right now")]
    OrderingClosed,
    #[error("no pickup slot selected")]
    MissingPickupSlot,
    #[error("selected pickup slot is no longer available")]
    StalePickupSlot,
}

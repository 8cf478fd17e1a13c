use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest message body accepted, in characters.
pub const MESSAGE_MAX_CHARS: usize = 500;
/// Length of the preview denormalized onto the parent document.
pub const PREVIEW_MAX_CHARS: usize = 120;

/// Which side of an order conversation wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    Customer,
    Business,
}

impl MessageSender {
    pub fn counterpart(self) -> MessageSender {
        match self {
            MessageSender::Customer => MessageSender::Business,
            MessageSender::Business => MessageSender::Customer,
        }
    }
}

/// One message in an order's conversation subcollection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMessage {
    pub sender: MessageSender,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_by_business: bool,
    #[serde(default)]
    pub read_by_customer: bool,
}

impl OrderMessage {
    pub fn is_read_by(&self, viewer: MessageSender) -> bool {
        match viewer {
            MessageSender::Business => self.read_by_business,
            MessageSender::Customer => self.read_by_customer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MessageTextError {
    #[error("message is empty")]
    Empty,
    #[error("message exceeds {MESSAGE_MAX_CHARS} characters")]
    TooLong,
}

/// Validate a message body before any write: trimmed, non-empty, and
/// at most [`MESSAGE_MAX_CHARS`] characters. Returns the trimmed text.
pub fn validate_text(raw: &str) -> Result<String, MessageTextError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MessageTextError::Empty);
    }
    if trimmed.chars().count() > MESSAGE_MAX_CHARS {
        return Err(MessageTextError::TooLong);
    }
    Ok(trimmed.to_owned())
}

/// First [`PREVIEW_MAX_CHARS`] characters, cut on a char boundary.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_MAX_CHARS).collect()
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unique order identifier (the document id in the order collection).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        OrderId(s.to_owned())
    }
}

/// Lifecycle state of an order on the staff board.
///
/// Staff may move an order between any two states; there is no
/// enforced transition order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    New,
    InProgress,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::New,
        OrderStatus::InProgress,
        OrderStatus::Ready,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// True for states that still need staff attention.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::InProgress | OrderStatus::Ready
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

/// Customer's answer to "did you receive your order?".
///
/// Serialized as a nullable boolean so documents written before the
/// feature existed read back as [`DeliveryConfirmation::Unset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryConfirmation {
    /// Not asked yet, or reset by a fresh transition into delivered.
    #[default]
    Unset,
    Confirmed,
    Denied,
}

impl DeliveryConfirmation {
    pub fn is_unset(self) -> bool {
        self == DeliveryConfirmation::Unset
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            DeliveryConfirmation::Unset => None,
            DeliveryConfirmation::Confirmed => Some(true),
            DeliveryConfirmation::Denied => Some(false),
        }
    }
}

impl From<Option<bool>> for DeliveryConfirmation {
    fn from(v: Option<bool>) -> Self {
        match v {
            None => DeliveryConfirmation::Unset,
            Some(true) => DeliveryConfirmation::Confirmed,
            Some(false) => DeliveryConfirmation::Denied,
        }
    }
}

impl Serialize for DeliveryConfirmation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_bool() {
            Some(b) => serializer.serialize_bool(b),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for DeliveryConfirmation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<bool>::deserialize(deserializer)?.into())
    }
}

/// Who the order is for and how to reach them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
}

/// The pickup slot the customer chose at checkout.
///
/// Slot times are wall-clock local to the shop, not UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupInfo {
    pub time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_label: Option<String>,
}

/// One line of the cart. Prices are whole shekels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub name: String,
    pub qty: u32,
    pub base_price: u64,
    /// Selected options keyed by option group, as chosen in the menu.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub modifiers: BTreeMap<String, serde_json::Value>,
    /// Base price plus modifier surcharges, per unit.
    pub unit_price: u64,
    pub line_total: u64,
}

impl OrderItem {
    /// Recompute derived amounts from qty and unit price.
    pub fn with_totals(mut self) -> Self {
        self.line_total = u64::from(self.qty) * self.unit_price;
        self
    }
}

/// Outcome of the order-created SMS notification, persisted on the
/// order so redelivered creation events are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsReceipt {
    pub status: SmsStatus,
    pub sent_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsStatus {
    Sent,
    InvalidPhone,
    Failed,
}

/// An order document. The document id lives outside this payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub status: OrderStatus,
    pub customer: CustomerInfo,
    pub items: Vec<OrderItem>,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup: Option<PickupInfo>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub delivery_confirmed: DeliveryConfirmation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_confirm_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_preview: Option<String>,
    /// Messages from the customer not yet read by staff.
    #[serde(default)]
    pub unread_for_business_count: u32,
    /// Messages from staff not yet read by the customer.
    #[serde(default)]
    pub unread_for_customer_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms: Option<SmsReceipt>,
}

impl Order {
    /// True when the customer denied receiving a delivered order.
    pub fn is_denied_delivery(&self) -> bool {
        self.status == OrderStatus::Delivered
            && self.delivery_confirmed == DeliveryConfirmation::Denied
    }
}

/// Total of all line items, in whole shekels.
pub fn cart_total(items: &[OrderItem]) -> u64 {
    items.iter().map(|item| item.line_total).sum()
}

pub fn format_ils(amount: u64) -> String {
    format!("\u{20aa}{amount}")
}

//! Checkout and the order lifecycle: status transitions on the staff
//! board and the customer's delivery confirmation.

use chrono::NaiveDateTime;
use kiosk_common::order::{
    cart_total, DeliveryConfirmation, Order, OrderId, OrderItem, OrderStatus,
};
use kiosk_common::schedule::{
    compute_availability, format_day_and_time, is_pickup_valid, PickupConfig, WeeklyHours,
};
use kiosk_common::{order::CustomerInfo, order::PickupInfo, phone};
use kiosk_store::{Document, FieldWrite, Store, StoreError};
use serde_json::json;
use tracing::info;

use crate::localstore::LocalFlags;
use crate::{fields, EngineError, Result, ORDERS};

/// An order document paired with its id.
#[derive(Debug, Clone)]
pub struct OrderDoc {
    pub id: OrderId,
    pub order: Order,
}

pub fn decode_order(doc: &Document) -> Result<OrderDoc> {
    Ok(OrderDoc {
        id: OrderId(doc.id.clone()),
        order: serde_json::from_value(doc.data.clone())?,
    })
}

/// What the checkout form submits.
#[derive(Debug, Clone)]
pub struct CheckoutForm {
    pub items: Vec<OrderItem>,
    pub customer_name: String,
    pub customer_phone: String,
    pub notes: String,
    pub pickup_slot: Option<NaiveDateTime>,
}

/// Validate the form against the live schedule and create the order.
///
/// Validation order matches the form top to bottom: cart, name,
/// phone, ordering window, slot chosen, slot still valid. The chosen
/// slot is re-validated against `now` because it was computed when
/// the form was opened, possibly minutes ago.
pub async fn checkout(
    store: &Store,
    local: &mut LocalFlags,
    hours: &WeeklyHours,
    config: &PickupConfig,
    now: NaiveDateTime,
    form: CheckoutForm,
) -> Result<OrderId> {
    let items: Vec<OrderItem> = form
        .items
        .into_iter()
        .filter(|item| item.qty > 0)
        .map(OrderItem::with_totals)
        .collect();
    if items.is_empty() {
        return Err(EngineError::EmptyCart);
    }
    let name = form.customer_name.trim();
    if name.is_empty() {
        return Err(EngineError::MissingName);
    }
    if !phone::is_valid_customer_phone(&form.customer_phone) {
        return Err(EngineError::InvalidPhone);
    }
    if !compute_availability(hours, config, now).can_checkout() {
        return Err(EngineError::OrderingClosed);
    }
    let slot = form.pickup_slot.ok_or(EngineError::MissingPickupSlot)?;
    if !is_pickup_valid(hours, config, now, slot) {
        return Err(EngineError::StalePickupSlot);
    }

    let notes = form.notes.trim();
    let order = Order {
        status: OrderStatus::New,
        customer: CustomerInfo {
            name: name.to_owned(),
            phone: form.customer_phone.trim().to_owned(),
        },
        total: cart_total(&items),
        items,
        notes: (!notes.is_empty()).then(|| notes.to_owned()),
        pickup: Some(PickupInfo {
            time: slot,
            day_label: Some(format_day_and_time(slot)),
        }),
        created_at: store.server_time(),
        delivery_confirmed: DeliveryConfirmation::Unset,
        delivery_confirmed_at: None,
        delivery_confirm_note: None,
        last_message_at: None,
        last_message_preview: None,
        unread_for_business_count: 0,
        unread_for_customer_count: 0,
        sms: None,
    };
    let id = store.create(ORDERS, serde_json::to_value(&order)?).await?;
    local.set_last_order_id(&id);
    info!(order_id = %id, total = order.total, "order placed");
    Ok(OrderId(id))
}

/// Staff transition to any status. Moving INTO `delivered` resets the
/// delivery tri-state in the same write, so a re-delivered order asks
/// the customer again.
pub async fn set_status(store: &Store, order_id: &OrderId, next: OrderStatus) -> Result<()> {
    let mut patch = vec![(
        fields::STATUS.to_owned(),
        FieldWrite::Value(serde_json::to_value(next)?),
    )];
    if next == OrderStatus::Delivered {
        patch.push((fields::DELIVERY_CONFIRMED.to_owned(), FieldWrite::Value(json!(null))));
        patch.push((fields::DELIVERY_CONFIRMED_AT.to_owned(), FieldWrite::Value(json!(null))));
        patch.push((fields::DELIVERY_CONFIRM_NOTE.to_owned(), FieldWrite::Value(json!(null))));
    }
    store
        .update(ORDERS, &order_id.0, patch)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => EngineError::OrderNotFound(order_id.0.clone()),
            other => other.into(),
        })?;
    info!(order_id = %order_id, status = %next, "status updated");
    Ok(())
}

/// The customer's answer to the delivery prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDecision {
    Confirmed,
    Denied,
}

impl DeliveryDecision {
    fn note(self) -> &'static str {
        match self {
            DeliveryDecision::Confirmed => "customer_confirmed",
            DeliveryDecision::Denied => "customer_denied",
        }
    }

    fn confirmed(self) -> bool {
        self == DeliveryDecision::Confirmed
    }
}

/// Record the customer's delivery answer.
///
/// The live document is re-read first and the write is abandoned
/// unless the order is still `delivered`; staff may have moved it
/// while the prompt sat on screen. The local marker is written only
/// after the store accepts the decision.
pub async fn submit_delivery_decision(
    store: &Store,
    local: &mut LocalFlags,
    order_id: &OrderId,
    decision: DeliveryDecision,
) -> Result<()> {
    let doc = store
        .get(ORDERS, &order_id.0)
        .await?
        .ok_or_else(|| EngineError::OrderNotFound(order_id.0.clone()))?;
    let current = decode_order(&doc)?;
    if current.order.status != OrderStatus::Delivered {
        return Err(EngineError::NotDelivered(current.order.status));
    }

    store
        .update(
            ORDERS,
            &order_id.0,
            vec![
                (
                    fields::DELIVERY_CONFIRMED.to_owned(),
                    FieldWrite::Value(json!(decision.confirmed())),
                ),
                (
                    fields::DELIVERY_CONFIRMED_AT.to_owned(),
                    FieldWrite::ServerTimestamp,
                ),
                (
                    fields::DELIVERY_CONFIRM_NOTE.to_owned(),
                    FieldWrite::Value(json!(decision.note())),
                ),
            ],
        )
        .await?;
    local.set_delivery_decision(&order_id.0, decision.confirmed());
    info!(order_id = %order_id, ?decision, "delivery decision recorded");
    Ok(())
}

/// Whether the customer-facing order view should show the delivery
/// prompt. Decided from the live document; the local marker only
/// suppresses re-asking on a device that already answered.
pub fn should_prompt_delivery(local: &LocalFlags, doc: &OrderDoc) -> bool {
    doc.order.status == OrderStatus::Delivered
        && doc.order.delivery_confirmed.is_unset()
        && local.delivery_decision(&doc.id.0).is_none()
}

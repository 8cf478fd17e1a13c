//! Order-created SMS notification. Delivery of creation events is
//! at-least-once; the receipt persisted on the order makes the
//! handler idempotent, and exactly one terminal receipt is written
//! per order: sent, invalid_phone, or failed.

use std::future::Future;
use std::sync::Arc;

use kiosk_common::order::{SmsReceipt, SmsStatus};
use kiosk_common::phone;
use kiosk_store::{ChangeKind, FieldWrite, Store};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::orders::decode_order;
use crate::{fields, Result, ORDERS};

/// Body of the confirmation message.
pub const SMS_BODY: &str = "Your order has been received. We'll text you when it's ready.";

/// Longest error text persisted on a failed receipt.
pub const SMS_ERROR_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Error)]
#[error("sms gateway: {0}")]
pub struct SmsSendError(pub String);

/// Gateway seam. `send` returns the provider's message sid.
pub trait SmsSender {
    fn send(
        &self,
        to: &str,
        body: &str,
    ) -> impl Future<Output = std::result::Result<String, SmsSendError>> + Send;
}

/// A shared sender forwards through the pointer, so one gateway
/// client can serve the trigger task and its owner at once.
impl<S: SmsSender> SmsSender for Arc<S> {
    fn send(
        &self,
        to: &str,
        body: &str,
    ) -> impl Future<Output = std::result::Result<String, SmsSendError>> + Send {
        self.as_ref().send(to, body)
    }
}

/// What the handler did for one creation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The order vanished before the handler ran.
    MissingOrder,
    /// A receipt already exists; redelivered event, nothing to do.
    AlreadyHandled,
    Sent,
    InvalidPhone,
    Failed,
}

/// Handle one order-created event. Re-reads the order first: the
/// receipt check and every terminal write go through the live
/// document, never through event payload state.
pub async fn process_order_created<S: SmsSender>(
    store: &Store,
    sms: &S,
    order_id: &str,
) -> Result<TriggerOutcome> {
    let Some(doc) = store.get(ORDERS, order_id).await? else {
        warn!(order_id, "order gone before notification ran");
        return Ok(TriggerOutcome::MissingOrder);
    };
    let order = decode_order(&doc)?.order;
    if order.sms.is_some() {
        return Ok(TriggerOutcome::AlreadyHandled);
    }

    let receipt = match phone::normalize(&order.customer.phone) {
        None => {
            warn!(order_id, phone = %order.customer.phone, "undeliverable phone");
            SmsReceipt {
                status: SmsStatus::InvalidPhone,
                sent_at: store.server_time(),
                sid: None,
                error: Some("invalid_phone".to_owned()),
            }
        }
        Some(to) => match sms.send(&to, SMS_BODY).await {
            Ok(sid) => {
                info!(order_id, sid = %sid, "confirmation sms sent");
                SmsReceipt {
                    status: SmsStatus::Sent,
                    sent_at: store.server_time(),
                    sid: Some(sid),
                    error: None,
                }
            }
            Err(e) => {
                error!(order_id, error = %e, "sms send failed");
                SmsReceipt {
                    status: SmsStatus::Failed,
                    sent_at: store.server_time(),
                    sid: None,
                    error: Some(truncate_error(&e.to_string())),
                }
            }
        },
    };

    let outcome = match receipt.status {
        SmsStatus::Sent => TriggerOutcome::Sent,
        SmsStatus::InvalidPhone => TriggerOutcome::InvalidPhone,
        SmsStatus::Failed => TriggerOutcome::Failed,
    };
    store
        .update(
            ORDERS,
            order_id,
            vec![(
                fields::SMS.to_owned(),
                FieldWrite::Value(serde_json::to_value(&receipt)?),
            )],
        )
        .await?;
    Ok(outcome)
}

fn truncate_error(message: &str) -> String {
    message.chars().take(SMS_ERROR_MAX_CHARS).collect()
}

/// Long-running trigger task: watches the order collection and runs
/// the handler for every added document, including the backlog in the
/// seeding snapshot (at-least-once delivery makes that harmless).
/// Exits when the store shuts down or the subscription is cancelled.
pub async fn run_order_created_trigger<S>(store: Store, sms: S)
where
    S: SmsSender + Send + Sync + 'static,
{
    let mut sub = store.subscribe(ORDERS, kiosk_store::Filter::All);
    while let Some(snapshot) = sub.next().await {
        for change in &snapshot.changes {
            if change.kind != ChangeKind::Added {
                continue;
            }
            match process_order_created(&store, &sms, &change.id).await {
                Ok(outcome) => {
                    if outcome == TriggerOutcome::Failed {
                        warn!(order_id = %change.id, "notification ended in failed receipt");
                    }
                }
                Err(e) => error!(order_id = %change.id, error = %e, "notification handler error"),
            }
        }
    }
}

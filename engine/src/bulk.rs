//! Bulk order deletion for the operator console. Deletes run in
//! batches of [`DELETE_BATCH_SIZE`]; the running count survives a
//! mid-run failure so the operator knows how much already went.

use std::collections::{BTreeSet, HashSet};

use kiosk_common::order::{OrderId, OrderStatus};
use kiosk_store::{Filter, Store, StoreError, WriteBatch};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::{fields, ORDERS};

/// Documents per deletion batch.
pub const DELETE_BATCH_SIZE: usize = 200;

/// Exact phrase the operator must type before a purge runs.
pub const DELETE_CONFIRM_PHRASE: &str = "DELETE";

/// Which orders a purge targets.
#[derive(Debug, Clone)]
pub enum DeleteSelector {
    All,
    ByStatus(BTreeSet<OrderStatus>),
    ById(Vec<OrderId>),
}

impl DeleteSelector {
    /// Store-side filter for the fetch loop. `None` means the
    /// selector matches nothing at all.
    fn filter(&self) -> Option<Filter> {
        match self {
            DeleteSelector::All => Some(Filter::All),
            DeleteSelector::ByStatus(statuses) if statuses.is_empty() => None,
            DeleteSelector::ByStatus(statuses) => Some(Filter::field_in(
                fields::STATUS,
                statuses.iter().map(|s| json!(s.as_str())).collect(),
            )),
            DeleteSelector::ById(_) => None,
        }
    }

    /// Human description for confirmation prompts.
    pub fn describe(&self) -> String {
        match self {
            DeleteSelector::All => "all orders".to_owned(),
            DeleteSelector::ByStatus(statuses) => {
                let names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
                format!("orders with status {}", names.join(", "))
            }
            DeleteSelector::ById(ids) => format!("{} orders by id", dedup_ids(ids).len()),
        }
    }
}

fn dedup_ids(ids: &[OrderId]) -> Vec<&OrderId> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(&id.0)).collect()
}

/// Live match count for the selector, recomputed immediately before
/// the final confirmation so the operator sees the number that will
/// actually go.
pub async fn count_matching(store: &Store, selector: &DeleteSelector) -> Result<usize, StoreError> {
    match selector {
        DeleteSelector::ById(ids) => {
            let mut count = 0;
            for id in dedup_ids(ids) {
                if store.get(ORDERS, &id.0).await?.is_some() {
                    count += 1;
                }
            }
            Ok(count)
        }
        other => match other.filter() {
            Some(filter) => store.count_matching(ORDERS, &filter).await,
            None => Ok(0),
        },
    }
}

/// A purge that died mid-run: `deleted` batches had already
/// committed, then the store refused the next one.
#[derive(Debug, Error)]
#[error("bulk delete aborted after {deleted} orders: {source}")]
pub struct BulkAbort {
    pub deleted: u64,
    #[source]
    pub source: StoreError,
}

/// Delete every order the selector matches, in committed batches of
/// [`DELETE_BATCH_SIZE`]. Returns the number deleted. On failure the
/// error carries the count that had already committed.
pub async fn delete_orders(
    store: &Store,
    selector: &DeleteSelector,
) -> Result<u64, BulkAbort> {
    let mut deleted: u64 = 0;
    let fail = |deleted: u64| {
        move |source: StoreError| {
            warn!(deleted, error = %source, "bulk delete aborted");
            BulkAbort { deleted, source }
        }
    };

    match selector {
        DeleteSelector::ById(ids) => {
            let ids = dedup_ids(ids);
            for chunk in ids.chunks(DELETE_BATCH_SIZE) {
                let mut batch = WriteBatch::new();
                for id in chunk {
                    batch.delete(ORDERS, &id.0);
                }
                store.commit(batch).await.map_err(fail(deleted))?;
                deleted += chunk.len() as u64;
            }
        }
        other => {
            let Some(filter) = other.filter() else {
                return Ok(0);
            };
            // Fetch-then-delete until a short page signals the end.
            loop {
                let page = store
                    .fetch_page(ORDERS, &filter, DELETE_BATCH_SIZE)
                    .await
                    .map_err(fail(deleted))?;
                if page.is_empty() {
                    break;
                }
                let mut batch = WriteBatch::new();
                for doc in &page {
                    batch.delete(ORDERS, &doc.id);
                }
                store.commit(batch).await.map_err(fail(deleted))?;
                deleted += page.len() as u64;
                if page.len() < DELETE_BATCH_SIZE {
                    break;
                }
            }
        }
    }
    info!(deleted, "bulk delete finished");
    Ok(deleted)
}

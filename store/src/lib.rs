//! In-process document store: named collections of JSON documents
//! with point reads, atomic write batches, and live query
//! subscriptions that deliver full snapshots with per-document change
//! kinds. Server time is strictly monotonic per store instance, and a
//! batch observes a single commit timestamp.
//!
//! Collection paths are slash-separated; a document's subcollections
//! live under `{path}/{id}/...` and are cascaded away when the parent
//! is deleted.

mod batch;
mod error;
mod subscribe;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

pub use batch::{FieldWrite, Patch, WriteBatch};
pub use error::{Result, StoreError};
pub use subscribe::{ChangeKind, DocChange, Snapshot, Subscription};

use batch::WriteOp;

pub type DocId = String;

/// A stored document: id plus JSON payload. The id is the collection
/// key and is not duplicated inside the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocId,
    pub data: Value,
}

/// Server-side filter for queries and subscriptions.
#[derive(Debug, Clone)]
pub enum Filter {
    All,
    /// Matches documents whose `field` equals any of `values`.
    FieldIn { field: String, values: Vec<Value> },
}

impl Filter {
    pub fn field_in(field: &str, values: Vec<Value>) -> Self {
        Filter::FieldIn {
            field: field.to_owned(),
            values,
        }
    }

    fn matches(&self, data: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::FieldIn { field, values } => data
                .get(field)
                .map(|v| values.contains(v))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone)]
enum SubTarget {
    Collection(String),
    Doc { path: String, id: DocId },
}

struct SubEntry {
    target: SubTarget,
    filter: Filter,
    tx: mpsc::UnboundedSender<Snapshot>,
    /// Matching set as of the last delivered snapshot.
    last: BTreeMap<DocId, Value>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<DocId, Value>>,
    subs: HashMap<u64, SubEntry>,
    next_sub_id: u64,
    last_server_time: Option<DateTime<Utc>>,
    fail_skip: u32,
    fail_batches: u32,
    batch_commits: u64,
}

impl Inner {
    /// Strictly monotonic server clock at millisecond granularity:
    /// never steps backwards, never returns the same instant twice.
    /// Quantized so values written through [`FieldWrite::ServerTimestamp`]
    /// compare exactly with values stamped via [`Store::server_time`].
    fn next_server_time(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = now
            .duration_trunc(Duration::milliseconds(1))
            .unwrap_or(now);
        let next = match self.last_server_time {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_server_time = Some(next);
        next
    }

    fn matching(
        collections: &HashMap<String, BTreeMap<DocId, Value>>,
        target: &SubTarget,
        filter: &Filter,
    ) -> BTreeMap<DocId, Value> {
        match target {
            SubTarget::Collection(path) => collections
                .get(path)
                .map(|docs| {
                    docs.iter()
                        .filter(|(_, data)| filter.matches(data))
                        .map(|(id, data)| (id.clone(), data.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            SubTarget::Doc { path, id } => {
                let mut out = BTreeMap::new();
                if let Some(data) = collections.get(path).and_then(|docs| docs.get(id)) {
                    out.insert(id.clone(), data.clone());
                }
                out
            }
        }
    }

    /// Validate then apply a batch. On `Err` nothing was changed.
    fn apply(&mut self, ops: &[WriteOp]) -> Result<()> {
        for op in ops {
            if let WriteOp::Update { path, id, .. } = op {
                let exists = self
                    .collections
                    .get(path)
                    .is_some_and(|docs| docs.contains_key(id));
                if !exists {
                    return Err(StoreError::NotFound {
                        path: path.clone(),
                        id: id.clone(),
                    });
                }
            }
        }

        let commit_time = self.next_server_time();
        for op in ops {
            match op {
                WriteOp::Set { path, id, data } => {
                    self.collections
                        .entry(path.clone())
                        .or_default()
                        .insert(id.clone(), data.clone());
                }
                WriteOp::Update { path, id, patch } => {
                    if let Some(doc) = self
                        .collections
                        .get_mut(path)
                        .and_then(|docs| docs.get_mut(id))
                    {
                        apply_patch(doc, patch, commit_time);
                    }
                }
                WriteOp::Delete { path, id } => {
                    if let Some(docs) = self.collections.get_mut(path) {
                        docs.remove(id);
                    }
                    // Subcollections go with the parent.
                    let prefix = format!("{path}/{id}/");
                    self.collections.retain(|key, _| !key.starts_with(&prefix));
                }
            }
        }
        Ok(())
    }

    /// Recompute every subscription's matching set and deliver one
    /// snapshot per subscription that changed.
    fn notify(&mut self) {
        let Inner {
            collections, subs, ..
        } = self;
        let mut dead = Vec::new();
        for (sub_id, entry) in subs.iter_mut() {
            let current = Inner::matching(collections, &entry.target, &entry.filter);
            let changes = diff(&entry.last, &current);
            if changes.is_empty() {
                continue;
            }
            entry.last = current.clone();
            let snapshot = Snapshot {
                docs: to_docs(current),
                changes,
            };
            if entry.tx.send(snapshot).is_err() {
                dead.push(*sub_id);
            }
        }
        for sub_id in dead {
            subs.remove(&sub_id);
        }
    }
}

fn apply_patch(doc: &mut Value, patch: &Patch, commit_time: DateTime<Utc>) {
    let Some(obj) = doc.as_object_mut() else {
        return;
    };
    for (field, write) in patch {
        match write {
            FieldWrite::Value(v) => {
                obj.insert(field.clone(), v.clone());
            }
            FieldWrite::Increment(n) => {
                let current = obj.get(field).and_then(Value::as_i64).unwrap_or(0);
                obj.insert(field.clone(), Value::from(current + n));
            }
            FieldWrite::ServerTimestamp => {
                obj.insert(
                    field.clone(),
                    Value::String(commit_time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
                );
            }
        }
    }
}

fn diff(last: &BTreeMap<DocId, Value>, current: &BTreeMap<DocId, Value>) -> Vec<DocChange> {
    let mut changes = Vec::new();
    for (id, data) in current {
        match last.get(id) {
            None => changes.push(DocChange {
                id: id.clone(),
                kind: ChangeKind::Added,
            }),
            Some(old) if old != data => changes.push(DocChange {
                id: id.clone(),
                kind: ChangeKind::Modified,
            }),
            Some(_) => {}
        }
    }
    for id in last.keys() {
        if !current.contains_key(id) {
            changes.push(DocChange {
                id: id.clone(),
                kind: ChangeKind::Removed,
            });
        }
    }
    changes
}

fn to_docs(map: BTreeMap<DocId, Value>) -> Vec<Document> {
    map.into_iter()
        .map(|(id, data)| Document { id, data })
        .collect()
}

/// Handle to the store. Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            // A poisoned lock only means another thread panicked
            // mid-write; the data itself is still consistent enough
            // to read, so keep going.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Insert under a fresh auto-generated id.
    pub async fn create(&self, path: &str, data: Value) -> Result<DocId> {
        let id = batch::generate_id();
        self.set(path, &id, data).await?;
        Ok(id)
    }

    /// Insert or fully replace a document.
    pub async fn set(&self, path: &str, id: &str, data: Value) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.set(path, id, data);
        self.apply_ops(&batch.ops)
    }

    /// Apply field writes to an existing document. Fails with
    /// [`StoreError::NotFound`] when the document does not exist.
    pub async fn update(&self, path: &str, id: &str, patch: Patch) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.update(path, id, patch);
        self.apply_ops(&batch.ops)
    }

    /// Delete a document and its subcollections. Deleting an absent
    /// document is a no-op.
    pub async fn delete(&self, path: &str, id: &str) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(path, id);
        self.apply_ops(&batch.ops)
    }

    pub async fn get(&self, path: &str, id: &str) -> Result<Option<Document>> {
        let inner = self.lock();
        Ok(inner
            .collections
            .get(path)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_owned(),
                data: data.clone(),
            }))
    }

    /// Commit a batch atomically: subscribers observe either all of
    /// its writes in one snapshot or none of them.
    pub async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_skip > 0 {
            inner.fail_skip -= 1;
        } else if inner.fail_batches > 0 {
            inner.fail_batches -= 1;
            return Err(StoreError::Unavailable("injected batch failure".into()));
        }
        inner.apply(&batch.ops)?;
        inner.batch_commits += 1;
        debug!(ops = batch.ops.len(), "batch committed");
        inner.notify();
        Ok(())
    }

    /// Up to `limit` matching documents, in stable id order.
    pub async fn fetch_page(&self, path: &str, filter: &Filter, limit: usize) -> Result<Vec<Document>> {
        let inner = self.lock();
        Ok(inner
            .collections
            .get(path)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, data)| filter.matches(data))
                    .take(limit)
                    .map(|(id, data)| Document {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    pub async fn count_matching(&self, path: &str, filter: &Filter) -> Result<usize> {
        let inner = self.lock();
        Ok(inner
            .collections
            .get(path)
            .map(|docs| docs.values().filter(|data| filter.matches(data)).count())
            .unwrap_or(0))
    }

    /// Live query over a collection. The initial snapshot is delivered
    /// immediately, even when the matching set is empty.
    pub fn subscribe(&self, path: &str, filter: Filter) -> Subscription {
        self.subscribe_target(SubTarget::Collection(path.to_owned()), filter)
    }

    /// Live view of a single document. Deletion is delivered as an
    /// empty snapshot with a [`ChangeKind::Removed`] change.
    pub fn subscribe_doc(&self, path: &str, id: &str) -> Subscription {
        self.subscribe_target(
            SubTarget::Doc {
                path: path.to_owned(),
                id: id.to_owned(),
            },
            Filter::All,
        )
    }

    fn subscribe_target(&self, target: SubTarget, filter: Filter) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let sub_id = inner.next_sub_id;
        inner.next_sub_id += 1;

        let current = Inner::matching(&inner.collections, &target, &filter);
        let initial = Snapshot {
            changes: current
                .keys()
                .map(|id| DocChange {
                    id: id.clone(),
                    kind: ChangeKind::Added,
                })
                .collect(),
            docs: to_docs(current.clone()),
        };
        // Unbounded channel: this cannot block while the lock is held.
        let _ = tx.send(initial);

        inner.subs.insert(
            sub_id,
            SubEntry {
                target,
                filter,
                tx,
                last: current,
            },
        );
        trace!(sub_id, "subscription opened");
        Subscription {
            id: sub_id,
            store: self.clone(),
            rx,
            cancelled: false,
        }
    }

    pub(crate) fn unsubscribe(&self, sub_id: u64) {
        let mut inner = self.lock();
        if inner.subs.remove(&sub_id).is_some() {
            trace!(sub_id, "subscription cancelled");
        }
    }

    /// Current server time; strictly later than any previously issued.
    pub fn server_time(&self) -> DateTime<Utc> {
        self.lock().next_server_time()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subs.len()
    }

    /// Number of batches committed so far.
    pub fn batch_commits(&self) -> u64 {
        self.lock().batch_commits
    }

    /// Fault injection: let the next `skip` batch commits through,
    /// then fail the `n` after them with [`StoreError::Unavailable`]
    /// without applying anything.
    pub fn fail_batches_after(&self, skip: u32, n: u32) {
        let mut inner = self.lock();
        inner.fail_skip = skip;
        inner.fail_batches = n;
    }

    /// Fault injection: fail the next `n` batch commits.
    pub fn set_fail_batches(&self, n: u32) {
        self.fail_batches_after(0, n);
    }

    fn apply_ops(&self, ops: &[WriteOp]) -> Result<()> {
        let mut inner = self.lock();
        inner.apply(ops)?;
        inner.notify();
        Ok(())
    }
}

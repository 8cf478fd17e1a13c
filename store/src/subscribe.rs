use tokio::sync::mpsc;

use crate::{DocId, Document, Store};

/// How a document moved relative to the previous snapshot delivered
/// on the same subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone)]
pub struct DocChange {
    pub id: DocId,
    pub kind: ChangeKind,
}

/// One delivery on a live query: the full matching set plus per-doc
/// changes. The first snapshot after subscribing reports every
/// matching document as [`ChangeKind::Added`].
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub docs: Vec<Document>,
    pub changes: Vec<DocChange>,
}

impl Snapshot {
    pub fn doc(&self, id: &str) -> Option<&Document> {
        self.docs.iter().find(|d| d.id == id)
    }

    pub fn added_ids(&self) -> impl Iterator<Item = &DocId> {
        self.changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Added)
            .map(|c| &c.id)
    }
}

/// Handle to a live query. Dropping it (or calling [`cancel`]) stops
/// delivery; snapshots already queued are discarded with the channel.
///
/// [`cancel`]: Subscription::cancel
#[derive(Debug)]
pub struct Subscription {
    pub(crate) id: u64,
    pub(crate) store: Store,
    pub(crate) rx: mpsc::UnboundedReceiver<Snapshot>,
    pub(crate) cancelled: bool,
}

impl Subscription {
    /// Next snapshot, or `None` once cancelled.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Non-blocking variant for callers draining a backlog.
    pub fn try_next(&mut self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }

    pub fn cancel(&mut self) {
        if !self.cancelled {
            self.cancelled = true;
            self.store.unsubscribe(self.id);
            self.rx.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! Per-client session context. A client holds at most one live
//! subscription per slot; whatever installs a replacement cancels the
//! previous one first, and teardown cancels everything at once. This
//! is what keeps a stale listener from feeding a view after the user
//! navigated elsewhere or logged out.

use std::collections::HashMap;

use kiosk_store::{Store, Subscription};
use tracing::debug;

use crate::localstore::LocalFlags;
use crate::messaging::ReadGuard;

/// The places a client can point a live query at. One subscription
/// per slot, ever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Staff board over the order collection.
    OrderBoard,
    /// Staff support inbox over the chat collection.
    SupportInbox,
    /// The single order a customer view is watching.
    ActiveOrder,
    /// That order's message thread.
    ActiveOrderMessages,
    /// The support chat currently selected (either side).
    ActiveChatMessages,
}

pub struct Session {
    pub store: Store,
    pub local: LocalFlags,
    pub read_guard: ReadGuard,
    subs: HashMap<Slot, Subscription>,
}

impl Session {
    pub fn new(store: Store, local: LocalFlags) -> Self {
        Session {
            store,
            local,
            read_guard: ReadGuard::new(),
            subs: HashMap::new(),
        }
    }

    /// Point a slot at a new live query. The previous occupant is
    /// cancelled strictly before the replacement is created, so the
    /// store never carries two listeners for the same slot.
    pub fn install<F>(&mut self, slot: Slot, subscribe: F) -> &mut Subscription
    where
        F: FnOnce(&Store) -> Subscription,
    {
        if let Some(mut old) = self.subs.remove(&slot) {
            old.cancel();
            debug!(?slot, "replaced live subscription");
        }
        let sub = subscribe(&self.store);
        self.subs.entry(slot).or_insert(sub)
    }

    pub fn subscription(&mut self, slot: Slot) -> Option<&mut Subscription> {
        self.subs.get_mut(&slot)
    }

    /// Cancel one slot, e.g. when navigating away from a chat.
    pub fn release(&mut self, slot: Slot) {
        if let Some(mut sub) = self.subs.remove(&slot) {
            sub.cancel();
        }
    }

    /// Cancel every live subscription. Used on navigation teardown;
    /// local flags survive.
    pub fn teardown(&mut self) {
        for (_, mut sub) in self.subs.drain() {
            sub.cancel();
        }
    }

    /// Staff logout: teardown plus dropping the session flag.
    pub fn logout(&mut self) {
        self.teardown();
        self.local.set_admin_session(false);
        debug!("session logged out");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

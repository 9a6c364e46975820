//! Per-vertex attribute-change notification.
//!
//! A vertex owns a `ChangeNotifier` and calls [`ChangeNotifier::notify`]
//! after mutating an attribute. Each root graph holding the vertex has one
//! subscription, keyed by the root's `ListenerId`, so re-subscribing
//! replaces rather than duplicates. Subscriptions are weak: a dropped root
//! never keeps a vertex's notifier busy, and dead entries are pruned lazily.

use std::fmt;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::Result;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a subscribed root graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Receiver side of an attribute change. Implemented by root graphs.
pub(crate) trait AttributeListener<K>: Send + Sync {
    fn attribute_changed(&self, key: &K) -> Result<()>;
}

struct Subscription<K> {
    id: ListenerId,
    listener: Weak<dyn AttributeListener<K>>,
}

/// Subscriber list embedded in every vertex.
pub struct ChangeNotifier<K> {
    subscriptions: Mutex<SmallVec<[Subscription<K>; 2]>>,
}

impl<K> ChangeNotifier<K> {
    pub fn new() -> Self {
        Self { subscriptions: Mutex::new(SmallVec::new()) }
    }

    /// Subscribe `listener` under `id`, replacing any earlier subscription
    /// with the same id.
    pub(crate) fn subscribe(&self, id: ListenerId, listener: Weak<dyn AttributeListener<K>>) {
        let mut subs = self.subscriptions.lock();
        subs.retain(|s| s.id != id && s.listener.strong_count() > 0);
        subs.push(Subscription { id, listener });
    }

    /// Returns true if a subscription was removed.
    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut subs = self.subscriptions.lock();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscriptions.lock();
        subs.retain(|s| s.listener.strong_count() > 0);
        subs.len()
    }

    /// Tell every subscribed graph that the vertex identified by `key`
    /// changed an attribute.
    ///
    /// Every live subscriber is called even if an earlier one fails; the
    /// first error is returned. The subscriber list is not locked while
    /// subscribers run.
    pub fn notify(&self, key: &K) -> Result<()> {
        let listeners: SmallVec<[Weak<dyn AttributeListener<K>>; 2]> = {
            let mut subs = self.subscriptions.lock();
            subs.retain(|s| s.listener.strong_count() > 0);
            subs.iter().map(|s| s.listener.clone()).collect()
        };

        let mut first_err = None;
        for listener in listeners {
            let Some(listener) = listener.upgrade() else { continue };
            if let Err(e) = listener.attribute_changed(key) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl<K> Default for ChangeNotifier<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for ChangeNotifier<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscriptions", &self.subscriptions.lock().len())
            .finish()
    }
}

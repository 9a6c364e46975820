//! The `Vertex` capability: stable identity plus change notification.

use std::fmt::Debug;
use std::hash::Hash;

use super::{ChangeNotifier, Value};

/// A vertex that can live in an `AccessGraph`.
///
/// Identity comes from `key()` alone and must never change while the vertex
/// is a member of a graph. Attributes may change freely, as long as the
/// vertex calls `self.notifier().notify(&self.key())` after every write that
/// a predicate might observe. Graphs subscribe to that notifier when the
/// vertex is inserted and unsubscribe when it is removed.
pub trait Vertex: Send + Sync + 'static {
    /// Identity of the vertex. Equal keys mean "the same vertex".
    type Key: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static;

    fn key(&self) -> Self::Key;

    fn notifier(&self) -> &ChangeNotifier<Self::Key>;

    /// Named attribute lookup used by expression predicates.
    ///
    /// Returns None for unknown attributes, which expressions treat as NULL.
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }
}

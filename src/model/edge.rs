//! Undirected edge between two vertices.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Vertex;

/// Identity of an undirected edge: the unordered pair of endpoint keys,
/// stored normalized so that `lo <= hi`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey<K> {
    lo: K,
    hi: K,
}

impl<K: Ord> EdgeKey<K> {
    pub fn new(a: K, b: K) -> Self {
        if a <= b { Self { lo: a, hi: b } } else { Self { lo: b, hi: a } }
    }

    pub fn endpoints(&self) -> (&K, &K) {
        (&self.lo, &self.hi)
    }

    pub fn into_endpoints(self) -> (K, K) {
        (self.lo, self.hi)
    }

    /// The "other" endpoint from the given one. A self-loop returns the
    /// vertex itself.
    pub fn other(&self, from: &K) -> Option<&K> {
        if from == &self.lo { Some(&self.hi) }
        else if from == &self.hi { Some(&self.lo) }
        else { None }
    }
}

/// An undirected edge carrying handles to both endpoint vertices.
///
/// Equality and hashing go through `EdgeKey`, so `Edge::new(a, b)` and
/// `Edge::new(b, a)` are the same edge.
pub struct Edge<V: Vertex> {
    source: Arc<V>,
    target: Arc<V>,
}

impl<V: Vertex> Edge<V> {
    pub fn new(source: Arc<V>, target: Arc<V>) -> Self {
        Self { source, target }
    }

    pub fn source(&self) -> &Arc<V> {
        &self.source
    }

    pub fn target(&self) -> &Arc<V> {
        &self.target
    }

    pub fn key(&self) -> EdgeKey<V::Key> {
        EdgeKey::new(self.source.key(), self.target.key())
    }

    /// The endpoint opposite to `from`, or None if `from` is not an endpoint.
    pub fn other_vertex(&self, from: &V::Key) -> Option<&Arc<V>> {
        if &self.source.key() == from { Some(&self.target) }
        else if &self.target.key() == from { Some(&self.source) }
        else { None }
    }
}

impl<V: Vertex> Clone for Edge<V> {
    fn clone(&self) -> Self {
        Self { source: Arc::clone(&self.source), target: Arc::clone(&self.target) }
    }
}

impl<V: Vertex> PartialEq for Edge<V> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<V: Vertex> Eq for Edge<V> {}

impl<V: Vertex> Hash for Edge<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl<V: Vertex> fmt::Debug for Edge<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge({:?} -- {:?})", self.source.key(), self.target.key())
    }
}

//! # Access-Control Graphs
//!
//! `AccessGraph` is the root: it owns the canonical graph and a cache of
//! child graphs keyed by predicate. `ChildGraph` is a read-only handle on
//! one cached entry. Both implement `GraphView`.
//!
//! ```text
//!   mutation ──► AccessGraph ──► MemoryStore ──notifications──► CacheSync
//!                    ▲                                              │
//!   Vertex::notifier ┘ (attribute change)          per-entry include/exclude
//!                                                                   ▼
//!   child_graph(pred) ──hit──► ChildGraph ◄──────────────── PredicateCache
//!                     ──miss─► build + install (same lock)
//! ```

pub mod root;
pub mod child;
mod cache;

use std::sync::Arc;

use crate::model::{Edge, EdgeKey, Vertex};

pub use root::AccessGraph;
pub use child::ChildGraph;

/// Read access shared by root and child graphs.
///
/// Every method takes the graph's lock only for the duration of the call
/// and returns owned data: iterating a result never blocks writers and is
/// never affected by them.
pub trait GraphView<V: Vertex> {
    fn vertices(&self) -> Vec<Arc<V>>;

    fn edges(&self) -> Vec<Edge<V>>;

    /// Edges incident to `key` within this graph; empty if absent.
    fn adjacent_edges(&self, key: &V::Key) -> Vec<Edge<V>>;

    fn contains_vertex(&self, key: &V::Key) -> bool;

    fn contains_edge(&self, a: &V::Key, b: &V::Key) -> bool;

    fn vertex_count(&self) -> usize;

    fn edge_count(&self) -> usize;

    fn vertex_keys(&self) -> Vec<V::Key> {
        self.vertices().iter().map(|v| v.key()).collect()
    }

    fn edge_keys(&self) -> Vec<EdgeKey<V::Key>> {
        self.edges().iter().map(Edge::key).collect()
    }
}

//! # Graph Store Contract
//!
//! The plain mutable graph underneath an `AccessGraph`: vertex and edge
//! membership, adjacency, enumeration, and change notifications. The cache
//! layer never touches adjacency directly; it reacts to the notifications a
//! store fires.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | Hash-map backed canonical graph |
//!
//! `Topology` (module `topology`) is the key-only adjacency structure both
//! the canonical store and cached child graphs are built on.

pub mod memory;
pub mod topology;

use std::sync::Arc;

use crate::model::{Edge, EdgeKey, Vertex};

pub use memory::MemoryStore;
pub use topology::Topology;

// ============================================================================
// Notifications
// ============================================================================

/// Receives a store's change notifications.
///
/// Every callback fires synchronously, after the store's own state has
/// changed and before the mutating call returns. Callbacks cannot fail:
/// anything fallible must be decided before the store is mutated.
pub trait StoreObserver<V: Vertex> {
    fn vertex_added(&mut self, _vertex: &Arc<V>) {}
    fn vertex_removed(&mut self, _vertex: &Arc<V>) {}
    fn edge_added(&mut self, _edge: &EdgeKey<V::Key>) {}
    fn edge_removed(&mut self, _edge: &EdgeKey<V::Key>) {}
}

/// Ignore all notifications.
impl<V: Vertex> StoreObserver<V> for () {}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The store contract the cache layer relies on.
///
/// Mutations report whether anything changed and never fail: inserting an
/// existing element or removing an absent one is a no-op returning false.
pub trait GraphStore<V: Vertex> {
    /// Insert a vertex. An existing vertex with the same key is kept and
    /// the given handle is dropped.
    fn add_vertex(&mut self, vertex: Arc<V>, observer: &mut dyn StoreObserver<V>) -> bool;

    /// Remove a vertex together with all incident edges. Incident edges are
    /// reported removed before the vertex itself.
    fn remove_vertex(&mut self, key: &V::Key, observer: &mut dyn StoreObserver<V>) -> bool;

    /// Insert an edge, inserting missing endpoints first.
    fn add_edge(&mut self, edge: Edge<V>, observer: &mut dyn StoreObserver<V>) -> bool;

    fn remove_edge(&mut self, edge: &EdgeKey<V::Key>, observer: &mut dyn StoreObserver<V>) -> bool;

    fn contains_vertex(&self, key: &V::Key) -> bool;

    fn contains_edge(&self, edge: &EdgeKey<V::Key>) -> bool;

    /// The stored handle for `key`.
    fn vertex(&self, key: &V::Key) -> Option<&Arc<V>>;

    /// Build an `Edge` with the stored endpoint handles.
    fn resolve_edge(&self, edge: &EdgeKey<V::Key>) -> Option<Edge<V>> {
        let (a, b) = edge.endpoints();
        Some(Edge::new(Arc::clone(self.vertex(a)?), Arc::clone(self.vertex(b)?)))
    }

    fn vertices(&self) -> Vec<Arc<V>>;

    fn edges(&self) -> Vec<EdgeKey<V::Key>>;

    fn adjacent_edges(&self, key: &V::Key) -> Vec<EdgeKey<V::Key>>;

    fn vertex_count(&self) -> usize;

    fn edge_count(&self) -> usize;
}

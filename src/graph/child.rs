//! Child graphs: cached, predicate-filtered views of a root graph.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::model::{Edge, EdgeKey, Vertex};
use crate::predicate::PredicateKey;
use crate::storage::{GraphStore, Topology};
use super::root::{RootState, Shared};
use super::GraphView;

// ============================================================================
// Subgraph: the privileged write surface
// ============================================================================

/// Materialized membership of one cached child graph.
///
/// Holds vertex keys only; handles are resolved through the canonical
/// store. Mutators are crate-private: only the owning root's cache
/// maintenance may call them.
#[derive(Debug, Clone)]
pub(crate) struct Subgraph<K> {
    topology: Topology<K>,
}

impl<K: Clone + Eq + Hash + Ord> Subgraph<K> {
    pub(crate) fn new() -> Self {
        Self { topology: Topology::new() }
    }

    pub(crate) fn add_vertex(&mut self, key: K) -> bool {
        self.topology.add_vertex(key)
    }

    /// Removes the vertex and, with it, its edges in this subgraph.
    pub(crate) fn remove_vertex(&mut self, key: &K) -> bool {
        self.topology.remove_vertex(key).is_some()
    }

    pub(crate) fn add_edge_with_endpoints(&mut self, edge: EdgeKey<K>) -> bool {
        self.topology.add_edge(edge)
    }

    pub(crate) fn remove_edge(&mut self, edge: &EdgeKey<K>) -> bool {
        self.topology.remove_edge(edge)
    }

    pub(crate) fn contains_vertex(&self, key: &K) -> bool {
        self.topology.contains_vertex(key)
    }

    pub(crate) fn topology(&self) -> &Topology<K> {
        &self.topology
    }
}

// ============================================================================
// ChildGraph: the public read-only handle
// ============================================================================

/// Read-only handle on a cached child graph.
///
/// Cloning is cheap and yields the same graph. Two handles compare equal
/// when they refer to the same cache entry of the same root, which is what
/// repeated `child_graph` calls with an equal key return.
pub struct ChildGraph<V: Vertex> {
    shared: Arc<Shared<V>>,
    slot: usize,
    key: PredicateKey,
}

impl<V: Vertex> ChildGraph<V> {
    pub(crate) fn new(shared: Arc<Shared<V>>, slot: usize, key: PredicateKey) -> Self {
        Self { shared, slot, key }
    }

    /// Canonical key this graph is cached under.
    pub fn key(&self) -> &PredicateKey {
        &self.key
    }

    fn read<R>(&self, f: impl FnOnce(&RootState<V>, &Subgraph<V::Key>) -> R) -> R {
        let state = self.shared.state.lock();
        // Entries are append-only, so a handed-out slot always exists.
        let graph = state.cache.graph(self.slot);
        f(&state, graph)
    }
}

impl<V: Vertex> GraphView<V> for ChildGraph<V> {
    fn vertices(&self) -> Vec<Arc<V>> {
        self.read(|state, graph| {
            graph
                .topology()
                .vertices()
                .filter_map(|k| state.store.vertex(k).cloned())
                .collect()
        })
    }

    fn edges(&self) -> Vec<Edge<V>> {
        self.read(|state, graph| {
            graph
                .topology()
                .edges()
                .filter_map(|e| state.store.resolve_edge(&e))
                .collect()
        })
    }

    fn adjacent_edges(&self, key: &V::Key) -> Vec<Edge<V>> {
        self.read(|state, graph| {
            graph
                .topology()
                .adjacent_edges(key)
                .iter()
                .filter_map(|e| state.store.resolve_edge(e))
                .collect()
        })
    }

    fn contains_vertex(&self, key: &V::Key) -> bool {
        self.read(|_, graph| graph.contains_vertex(key))
    }

    fn contains_edge(&self, a: &V::Key, b: &V::Key) -> bool {
        let edge = EdgeKey::new(a.clone(), b.clone());
        self.read(|_, graph| graph.topology().contains_edge(&edge))
    }

    fn vertex_count(&self) -> usize {
        self.read(|_, graph| graph.topology().vertex_count())
    }

    fn edge_count(&self) -> usize {
        self.read(|_, graph| graph.topology().edge_count())
    }

    fn vertex_keys(&self) -> Vec<V::Key> {
        self.read(|_, graph| graph.topology().vertices().cloned().collect())
    }

    fn edge_keys(&self) -> Vec<EdgeKey<V::Key>> {
        self.read(|_, graph| graph.topology().edges().collect())
    }
}

impl<V: Vertex> Clone for ChildGraph<V> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared), slot: self.slot, key: self.key.clone() }
    }
}

impl<V: Vertex> PartialEq for ChildGraph<V> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.slot == other.slot
    }
}

impl<V: Vertex> Eq for ChildGraph<V> {}

impl<V: Vertex> fmt::Debug for ChildGraph<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildGraph")
            .field("key", &self.key)
            .field("slot", &self.slot)
            .finish()
    }
}

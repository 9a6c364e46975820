//! In-memory canonical graph store.
//!
//! The reference implementation of `GraphStore`: a key → handle map plus a
//! `Topology`. It has no lock of its own; the owning `AccessGraph` guards
//! it together with the cache.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::model::{Edge, EdgeKey, Vertex};
use super::{GraphStore, StoreObserver, Topology};

// ============================================================================
// MemoryStore
// ============================================================================

/// Hash-map backed undirected graph.
pub struct MemoryStore<V: Vertex> {
    vertices: HashMap<V::Key, Arc<V>>,
    topology: Topology<V::Key>,
}

impl<V: Vertex> MemoryStore<V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            vertices: HashMap::with_capacity(vertices),
            topology: Topology::with_capacity(vertices),
        }
    }

    pub(crate) fn topology(&self) -> &Topology<V::Key> {
        &self.topology
    }

    pub(crate) fn handles(&self) -> impl Iterator<Item = &Arc<V>> + '_ {
        self.vertices.values()
    }
}

impl<V: Vertex> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

impl<V: Vertex> GraphStore<V> for MemoryStore<V> {
    fn add_vertex(&mut self, vertex: Arc<V>, observer: &mut dyn StoreObserver<V>) -> bool {
        let key = vertex.key();
        if self.vertices.contains_key(&key) {
            return false;
        }
        self.topology.add_vertex(key.clone());
        self.vertices.insert(key, Arc::clone(&vertex));
        observer.vertex_added(&vertex);
        true
    }

    fn remove_vertex(&mut self, key: &V::Key, observer: &mut dyn StoreObserver<V>) -> bool {
        let Some(vertex) = self.vertices.remove(key) else {
            return false;
        };
        for edge in self.topology.remove_vertex(key).unwrap_or_default() {
            observer.edge_removed(&edge);
        }
        observer.vertex_removed(&vertex);
        true
    }

    fn add_edge(&mut self, edge: Edge<V>, observer: &mut dyn StoreObserver<V>) -> bool {
        let key = edge.key();
        self.add_vertex(Arc::clone(edge.source()), observer);
        self.add_vertex(Arc::clone(edge.target()), observer);
        if !self.topology.add_edge(key.clone()) {
            return false;
        }
        observer.edge_added(&key);
        true
    }

    fn remove_edge(&mut self, edge: &EdgeKey<V::Key>, observer: &mut dyn StoreObserver<V>) -> bool {
        if !self.topology.remove_edge(edge) {
            return false;
        }
        observer.edge_removed(edge);
        true
    }

    fn contains_vertex(&self, key: &V::Key) -> bool {
        self.vertices.contains_key(key)
    }

    fn contains_edge(&self, edge: &EdgeKey<V::Key>) -> bool {
        self.topology.contains_edge(edge)
    }

    fn vertex(&self, key: &V::Key) -> Option<&Arc<V>> {
        self.vertices.get(key)
    }

    fn vertices(&self) -> Vec<Arc<V>> {
        self.vertices.values().cloned().collect()
    }

    fn edges(&self) -> Vec<EdgeKey<V::Key>> {
        self.topology.edges().collect()
    }

    fn adjacent_edges(&self, key: &V::Key) -> Vec<EdgeKey<V::Key>> {
        self.topology.adjacent_edges(key)
    }

    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    fn edge_count(&self) -> usize {
        self.topology.edge_count()
    }
}

// ============================================================================
// Tests
// ============================================================================

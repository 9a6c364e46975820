//! Key-only undirected adjacency.
//!
//! `Topology` knows vertex keys and which pairs are connected, nothing
//! else. The canonical store pairs it with the vertex handles; cached child
//! graphs use it bare, resolving keys through the canonical store, so a
//! vertex is never owned by more than one place.

use hashbrown::{HashMap, HashSet};
use std::hash::Hash;

use crate::model::EdgeKey;

#[derive(Debug, Clone)]
pub struct Topology<K> {
    /// vertex key → neighbor keys (a self-loop lists the vertex itself)
    adjacency: HashMap<K, HashSet<K>>,
    edge_count: usize,
}

impl<K: Clone + Eq + Hash + Ord> Topology<K> {
    pub fn new() -> Self {
        Self { adjacency: HashMap::new(), edge_count: 0 }
    }

    pub fn with_capacity(vertices: usize) -> Self {
        Self { adjacency: HashMap::with_capacity(vertices), edge_count: 0 }
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn contains_vertex(&self, key: &K) -> bool {
        self.adjacency.contains_key(key)
    }

    pub fn contains_edge(&self, edge: &EdgeKey<K>) -> bool {
        let (a, b) = edge.endpoints();
        self.adjacency.get(a).is_some_and(|n| n.contains(b))
    }

    /// Returns true if the vertex was newly inserted.
    pub fn add_vertex(&mut self, key: K) -> bool {
        if self.adjacency.contains_key(&key) {
            return false;
        }
        self.adjacency.insert(key, HashSet::new());
        true
    }

    /// Remove a vertex and every incident edge.
    ///
    /// Returns the removed edges, or None if the vertex was absent.
    pub fn remove_vertex(&mut self, key: &K) -> Option<Vec<EdgeKey<K>>> {
        let neighbors = self.adjacency.remove(key)?;
        let mut removed = Vec::with_capacity(neighbors.len());
        for n in neighbors {
            if &n != key {
                if let Some(back) = self.adjacency.get_mut(&n) {
                    back.remove(key);
                }
            }
            removed.push(EdgeKey::new(key.clone(), n));
        }
        self.edge_count -= removed.len();
        Some(removed)
    }

    /// Insert an edge, adding missing endpoints. Returns true if the edge
    /// was newly inserted.
    pub fn add_edge(&mut self, edge: EdgeKey<K>) -> bool {
        let (a, b) = edge.into_endpoints();
        let inserted = self.adjacency.entry(a.clone()).or_default().insert(b.clone());
        if a != b {
            self.adjacency.entry(b).or_default().insert(a);
        }
        if inserted {
            self.edge_count += 1;
        }
        inserted
    }

    /// Returns true if the edge existed.
    pub fn remove_edge(&mut self, edge: &EdgeKey<K>) -> bool {
        let (a, b) = edge.endpoints();
        let removed = self.adjacency.get_mut(a).is_some_and(|n| n.remove(b));
        if removed {
            if a != b {
                if let Some(back) = self.adjacency.get_mut(b) {
                    back.remove(a);
                }
            }
            self.edge_count -= 1;
        }
        removed
    }

    pub fn vertices(&self) -> impl Iterator<Item = &K> + '_ {
        self.adjacency.keys()
    }

    /// Every edge exactly once.
    pub fn edges(&self) -> impl Iterator<Item = EdgeKey<K>> + '_ {
        self.adjacency.iter().flat_map(|(k, neighbors)| {
            neighbors
                .iter()
                .filter(move |n| k <= *n)
                .map(move |n| EdgeKey::new(k.clone(), n.clone()))
        })
    }

    /// Edges incident to `key`; empty if the vertex is absent.
    pub fn adjacent_edges(&self, key: &K) -> Vec<EdgeKey<K>> {
        self.adjacency
            .get(key)
            .map(|neighbors| {
                neighbors.iter().map(|n| EdgeKey::new(key.clone(), n.clone())).collect()
            })
            .unwrap_or_default()
    }
}

impl<K: Clone + Eq + Hash + Ord> Default for Topology<K> {
    fn default() -> Self {
        Self::new()
    }
}

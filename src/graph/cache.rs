//! Predicate cache and its incremental maintenance.
//!
//! Invariant, after every public operation of the owning root: for each
//! entry `(P, S)`,
//!
//! ```text
//! S.vertices == { v in root : P(v) }
//! S.edges    == { (a, b) in root : P(a) && P(b) }
//! ```
//!
//! Maintenance is split into a fallible *evaluate* step that only reads, and
//! an infallible *apply* step. A predicate failing on an incoming vertex
//! aborts the insert before anything changes. On an attribute change each
//! entry is decided on its own: entries whose predicate fails keep their
//! membership, the others are updated. Apart from the vertex being inserted
//! or re-evaluated, endpoint decisions read subgraph membership, which by
//! the invariant equals the predicate result.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use tracing::{trace, warn};

use crate::model::notify::ListenerId;
use crate::model::{EdgeKey, Vertex};
use crate::predicate::{Predicate, PredicateKey};
use crate::storage::{GraphStore, MemoryStore, StoreObserver};
use crate::{Error, Result};
use super::child::Subgraph;

pub(crate) struct CacheEntry<V: Vertex> {
    key: PredicateKey,
    predicate: Predicate<V>,
    graph: Subgraph<V::Key>,
}

impl<V: Vertex> CacheEntry<V> {
    fn evaluate(&self, vertex: &V) -> Result<bool> {
        self.predicate.evaluate(vertex).map_err(|e| Error::Evaluation {
            key: self.key.clone(),
            source: Box::new(e),
        })
    }
}

/// Canonical key → child graph. Append-only: entries are never evicted, so
/// a slot index stays valid for the life of the cache.
pub(crate) struct PredicateCache<V: Vertex> {
    slots: HashMap<PredicateKey, usize>,
    entries: Vec<CacheEntry<V>>,
}

impl<V: Vertex> PredicateCache<V> {
    pub(crate) fn new() -> Self {
        Self { slots: HashMap::new(), entries: Vec::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn slot(&self, key: &PredicateKey) -> Option<usize> {
        self.slots.get(key).copied()
    }

    pub(crate) fn graph(&self, slot: usize) -> &Subgraph<V::Key> {
        &self.entries[slot].graph
    }

    pub(crate) fn keys(&self) -> Vec<PredicateKey> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    /// Filter the canonical graph from scratch. Nothing is installed; on
    /// error the partial result is simply dropped.
    pub(crate) fn build(
        key: &PredicateKey,
        predicate: &Predicate<V>,
        store: &MemoryStore<V>,
    ) -> Result<Subgraph<V::Key>> {
        let mut graph = Subgraph::new();
        for vertex in store.handles() {
            let keep = predicate.evaluate(vertex).map_err(|e| Error::Evaluation {
                key: key.clone(),
                source: Box::new(e),
            })?;
            if keep {
                graph.add_vertex(vertex.key());
            }
        }
        for edge in store.topology().edges() {
            let (a, b) = edge.endpoints();
            if graph.contains_vertex(a) && graph.contains_vertex(b) {
                graph.add_edge_with_endpoints(edge);
            }
        }
        Ok(graph)
    }

    pub(crate) fn install(
        &mut self,
        key: PredicateKey,
        predicate: Predicate<V>,
        graph: Subgraph<V::Key>,
    ) -> usize {
        let slot = self.entries.len();
        self.slots.insert(key.clone(), slot);
        self.entries.push(CacheEntry { key, predicate, graph });
        slot
    }

    // ========================================================================
    // Evaluate
    // ========================================================================

    /// Decide, for every entry, which of the incoming vertices it admits.
    /// `fresh` must hold exactly the vertices the store is about to insert.
    pub(crate) fn admit(&self, fresh: &[Arc<V>]) -> Result<Admission<V::Key>> {
        let mut admitted = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let mut keys = HashSet::new();
            for vertex in fresh {
                if entry.evaluate(vertex)? {
                    keys.insert(vertex.key());
                }
            }
            admitted.push(keys);
        }
        Ok(Admission { admitted })
    }

    /// Re-evaluate a member vertex after an attribute change and list the
    /// entries whose membership flips.
    ///
    /// Entries are independent: one whose predicate fails gets no transition
    /// and keeps its membership, every other entry is still decided. The
    /// first failure is returned next to the transitions.
    pub(crate) fn reevaluate(&self, vertex: &V) -> (Vec<Transition>, Option<Error>) {
        let key = vertex.key();
        let mut transitions = Vec::new();
        let mut failure = None;
        for (slot, entry) in self.entries.iter().enumerate() {
            let was_in = entry.graph.contains_vertex(&key);
            let is_in = match entry.evaluate(vertex) {
                Ok(is_in) => is_in,
                Err(e) => {
                    warn!(predicate = %entry.key, vertex = ?key, error = %e, "re-evaluation failed");
                    failure.get_or_insert(e);
                    continue;
                }
            };
            match (was_in, is_in) {
                (true, false) => transitions.push(Transition::Exclude(slot)),
                (false, true) => transitions.push(Transition::Include(slot)),
                _ => {}
            }
        }
        (transitions, failure)
    }

    // ========================================================================
    // Apply
    // ========================================================================

    pub(crate) fn apply(
        &mut self,
        key: &V::Key,
        transitions: &[Transition],
        store: &MemoryStore<V>,
    ) {
        for transition in transitions {
            match *transition {
                Transition::Exclude(slot) => {
                    let entry = &mut self.entries[slot];
                    entry.graph.remove_vertex(key);
                    trace!(predicate = %entry.key, vertex = ?key, "excluded");
                }
                Transition::Include(slot) => {
                    let entry = &mut self.entries[slot];
                    entry.graph.add_vertex(key.clone());
                    // The subgraph cannot know the vertex's edges yet: walk
                    // canonical adjacency. A self-loop's "other" end is the
                    // vertex itself, already added above.
                    for edge in store.adjacent_edges(key) {
                        let keep = edge
                            .other(key)
                            .is_some_and(|other| entry.graph.contains_vertex(other));
                        if keep {
                            entry.graph.add_edge_with_endpoints(edge);
                        }
                    }
                    trace!(predicate = %entry.key, vertex = ?key, "included");
                }
            }
        }
    }
}

/// Per-entry membership change for one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Include(usize),
    Exclude(usize),
}

/// Pre-computed predicate verdicts for vertices about to be inserted,
/// indexed like the cache entries.
pub(crate) struct Admission<K> {
    admitted: Vec<HashSet<K>>,
}

impl<K: Eq + std::hash::Hash> Admission<K> {
    pub(crate) fn none() -> Self {
        Self { admitted: Vec::new() }
    }

    fn admits(&self, slot: usize, key: &K) -> bool {
        self.admitted.get(slot).is_some_and(|keys| keys.contains(key))
    }
}

// ============================================================================
// CacheSync: store notifications → cache entries
// ============================================================================

/// Store observer that mirrors canonical changes into every cache entry
/// and drops the root's subscription on vertices leaving the graph.
///
/// Incoming vertices are subscribed by the root before admission.
pub(crate) struct CacheSync<'a, V: Vertex> {
    cache: &'a mut PredicateCache<V>,
    admission: &'a Admission<V::Key>,
    listener_id: ListenerId,
}

impl<'a, V: Vertex> CacheSync<'a, V> {
    pub(crate) fn new(
        cache: &'a mut PredicateCache<V>,
        admission: &'a Admission<V::Key>,
        listener_id: ListenerId,
    ) -> Self {
        Self { cache, admission, listener_id }
    }
}

impl<V: Vertex> StoreObserver<V> for CacheSync<'_, V> {
    fn vertex_added(&mut self, vertex: &Arc<V>) {
        let key = vertex.key();
        for (slot, entry) in self.cache.entries.iter_mut().enumerate() {
            if self.admission.admits(slot, &key) {
                entry.graph.add_vertex(key.clone());
            }
        }
    }

    fn vertex_removed(&mut self, vertex: &Arc<V>) {
        vertex.notifier().unsubscribe(self.listener_id);
        let key = vertex.key();
        for entry in &mut self.cache.entries {
            entry.graph.remove_vertex(&key);
        }
    }

    fn edge_added(&mut self, edge: &EdgeKey<V::Key>) {
        let (a, b) = edge.endpoints();
        for entry in &mut self.cache.entries {
            if entry.graph.contains_vertex(a) && entry.graph.contains_vertex(b) {
                entry.graph.add_edge_with_endpoints(edge.clone());
            }
        }
    }

    fn edge_removed(&mut self, edge: &EdgeKey<V::Key>) {
        for entry in &mut self.cache.entries {
            entry.graph.remove_edge(edge);
        }
    }
}

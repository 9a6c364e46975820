//! The root graph: canonical store plus predicate cache under one lock.
//!
//! ## Locking
//!
//! One `parking_lot::Mutex` per root guards the canonical store, the cache
//! map and every cached subgraph. Mutations, attribute-change callbacks and
//! the whole check–build–install sequence of `child_graph` each hold it for
//! their full duration, so:
//!
//! - at most one build runs per key; a concurrent caller for the same key
//!   waits and then sees the cache hit;
//! - no mutation can slip in between a build's snapshot and its install.
//!
//! Reads hold the lock only while copying results out.
//!
//! Predicates run with the lock held. A predicate that writes vertex
//! attributes would re-enter the lock and deadlock; predicates must be pure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use hashbrown::HashSet;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::GraphConfig;
use crate::model::notify::{AttributeListener, ListenerId};
use crate::model::{Edge, EdgeKey, Vertex};
use crate::predicate::{PredicateKey, PredicateSource};
use crate::storage::{GraphStore, MemoryStore};
use crate::Result;
use super::cache::{Admission, CacheSync, PredicateCache};
use super::child::ChildGraph;
use super::GraphView;

// ============================================================================
// Shared state
// ============================================================================

pub(crate) struct RootState<V: Vertex> {
    pub(crate) store: MemoryStore<V>,
    pub(crate) cache: PredicateCache<V>,
}

/// Everything a root and its child handles share.
pub(crate) struct Shared<V: Vertex> {
    id: ListenerId,
    /// Weak self-reference handed to vertex notifiers.
    listener: Weak<dyn AttributeListener<V::Key>>,
    config: GraphConfig,
    builds: AtomicU64,
    pub(crate) state: Mutex<RootState<V>>,
}

impl<V: Vertex> AttributeListener<V::Key> for Shared<V> {
    fn attribute_changed(&self, key: &V::Key) -> Result<()> {
        let mut state = self.state.lock();
        let RootState { store, cache } = &mut *state;
        // Stale notification from a vertex that has since been removed.
        let Some(vertex) = store.vertex(key).cloned() else {
            return Ok(());
        };
        let (transitions, failure) = cache.reevaluate(&vertex);
        if !transitions.is_empty() {
            trace!(graph = self.config.label(), vertex = ?key, changed = transitions.len(), "attribute change");
        }
        cache.apply(key, &transitions, store);
        failure.map_or(Ok(()), Err)
    }
}

impl<V: Vertex> Drop for Shared<V> {
    fn drop(&mut self) {
        let id = self.id;
        for vertex in self.state.get_mut().store.handles() {
            vertex.notifier().unsubscribe(id);
        }
    }
}

// ============================================================================
// AccessGraph
// ============================================================================

/// The root graph.
///
/// Owns the canonical vertex/edge set and every cached child graph. Handles
/// are cheap to clone and can be shared across threads; all clones refer to
/// the same graph.
pub struct AccessGraph<V: Vertex> {
    shared: Arc<Shared<V>>,
}

impl<V: Vertex> AccessGraph<V> {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        let shared = Arc::new_cyclic(|weak: &Weak<Shared<V>>| {
            let listener: Weak<dyn AttributeListener<V::Key>> = weak.clone();
            Shared {
                id: ListenerId::next(),
                listener,
                builds: AtomicU64::new(0),
                state: Mutex::new(RootState {
                    store: MemoryStore::with_capacity(config.vertex_capacity),
                    cache: PredicateCache::new(),
                }),
                config,
            }
        });
        Self { shared }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.shared.config
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Insert a single vertex. Returns false if a vertex with the same key
    /// already exists; the existing vertex is kept.
    pub fn add_vertex(&self, vertex: Arc<V>) -> Result<bool> {
        let (vertices, _) = self.insert(vec![vertex], Vec::new())?;
        Ok(vertices == 1)
    }

    /// Insert edges together with any endpoints not yet in the graph.
    /// Returns the number of edges that were new.
    ///
    /// Endpoints whose key is already present keep the existing vertex; the
    /// handle carried by the edge is dropped. If any cached predicate fails
    /// on an incoming vertex, nothing is inserted.
    pub fn add_vertices_and_edges<I>(&self, edges: I) -> Result<usize>
    where
        I: IntoIterator<Item = Edge<V>>,
    {
        let (_, edges) = self.insert(Vec::new(), edges.into_iter().collect())?;
        Ok(edges)
    }

    fn insert(&self, vertices: Vec<Arc<V>>, edges: Vec<Edge<V>>) -> Result<(usize, usize)> {
        let mut state = self.shared.state.lock();
        let RootState { store, cache } = &mut *state;

        // Exactly the vertices the store will insert, in insertion order;
        // the first handle seen for a key wins, as it does in the store.
        let mut seen = HashSet::new();
        let fresh: Vec<Arc<V>> = vertices
            .iter()
            .chain(edges.iter().flat_map(|e| [e.source(), e.target()]))
            .filter(|v| {
                let key = v.key();
                !store.contains_vertex(&key) && seen.insert(key)
            })
            .cloned()
            .collect();

        // Subscribe before evaluating: a concurrent attribute write on an
        // incoming vertex then waits for this lock and re-evaluates after
        // the insert instead of going unseen.
        let id = self.shared.id;
        for vertex in &fresh {
            vertex.notifier().subscribe(id, Weak::clone(&self.shared.listener));
        }
        let admission = match cache.admit(&fresh) {
            Ok(admission) => admission,
            Err(e) => {
                for vertex in &fresh {
                    vertex.notifier().unsubscribe(id);
                }
                return Err(e);
            }
        };

        let mut sync = CacheSync::new(cache, &admission, id);
        let mut added_vertices = 0;
        for vertex in vertices {
            if store.add_vertex(vertex, &mut sync) {
                added_vertices += 1;
            }
        }
        let mut added_edges = 0;
        for edge in edges {
            if store.add_edge(edge, &mut sync) {
                added_edges += 1;
            }
        }

        trace!(
            graph = self.shared.config.label(),
            new_vertices = fresh.len(),
            new_edges = added_edges,
            "inserted"
        );
        Ok((added_vertices, added_edges))
    }

    /// Remove a vertex and its edges from the graph and from every cached
    /// child graph. Returns false (and does nothing) if it was absent.
    pub fn remove_vertex(&self, key: &V::Key) -> bool {
        let mut state = self.shared.state.lock();
        let RootState { store, cache } = &mut *state;
        let admission = Admission::none();
        let mut sync = CacheSync::new(cache, &admission, self.shared.id);
        let removed = store.remove_vertex(key, &mut sync);
        if removed {
            trace!(graph = self.shared.config.label(), vertex = ?key, "removed vertex");
        }
        removed
    }

    /// Remove the edge between `a` and `b`, keeping both vertices.
    pub fn remove_edge(&self, a: &V::Key, b: &V::Key) -> bool {
        let edge = EdgeKey::new(a.clone(), b.clone());
        let mut state = self.shared.state.lock();
        let RootState { store, cache } = &mut *state;
        let admission = Admission::none();
        let mut sync = CacheSync::new(cache, &admission, self.shared.id);
        store.remove_edge(&edge, &mut sync)
    }

    // ========================================================================
    // Child graphs
    // ========================================================================

    /// The child graph of all vertices matching `source`, plus the edges
    /// between them.
    ///
    /// Cached by canonical key: the first call builds the graph from the
    /// current canonical graph, later calls with an equal key return the
    /// same graph, kept up to date since. A build that fails installs
    /// nothing.
    pub fn child_graph<P>(&self, source: P) -> Result<ChildGraph<V>>
    where
        P: PredicateSource<V>,
    {
        let key = source.canonical_key();
        let mut state = self.shared.state.lock();

        if let Some(slot) = state.cache.slot(&key) {
            trace!(graph = self.shared.config.label(), predicate = %key, "cache hit");
            return Ok(ChildGraph::new(Arc::clone(&self.shared), slot, key));
        }

        let predicate = source.into_predicate()?;
        let graph = PredicateCache::build(&key, &predicate, &state.store)?;
        let (vertices, edges) = (graph.topology().vertex_count(), graph.topology().edge_count());
        let slot = state.cache.install(key.clone(), predicate, graph);
        self.shared.builds.fetch_add(1, Ordering::Relaxed);

        debug!(
            graph = self.shared.config.label(),
            predicate = %key,
            vertices,
            edges,
            "child graph built"
        );
        let cached = state.cache.len();
        if let Some(limit) = self.shared.config.cache_warn_threshold {
            if cached > limit {
                warn!(
                    graph = self.shared.config.label(),
                    cached,
                    limit,
                    "predicate cache keeps growing; entries are never evicted"
                );
            }
        }

        Ok(ChildGraph::new(Arc::clone(&self.shared), slot, key))
    }

    /// Keys of all cached child graphs, in build order.
    pub fn cached_predicates(&self) -> Vec<PredicateKey> {
        self.shared.state.lock().cache.keys()
    }

    pub fn cache_len(&self) -> usize {
        self.shared.state.lock().cache.len()
    }

    /// Number of child graphs built from scratch so far (cache misses).
    pub fn build_count(&self) -> u64 {
        self.shared.builds.load(Ordering::Relaxed)
    }

    /// The stored handle for `key`.
    pub fn vertex(&self, key: &V::Key) -> Option<Arc<V>> {
        self.shared.state.lock().store.vertex(key).cloned()
    }
}

impl<V: Vertex> Default for AccessGraph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Vertex> Clone for AccessGraph<V> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

// ============================================================================
// GraphView impl
// ============================================================================

impl<V: Vertex> GraphView<V> for AccessGraph<V> {
    fn vertices(&self) -> Vec<Arc<V>> {
        self.shared.state.lock().store.vertices()
    }

    fn edges(&self) -> Vec<Edge<V>> {
        let state = self.shared.state.lock();
        state
            .store
            .topology()
            .edges()
            .filter_map(|e| state.store.resolve_edge(&e))
            .collect()
    }

    fn adjacent_edges(&self, key: &V::Key) -> Vec<Edge<V>> {
        let state = self.shared.state.lock();
        state
            .store
            .adjacent_edges(key)
            .iter()
            .filter_map(|e| state.store.resolve_edge(e))
            .collect()
    }

    fn contains_vertex(&self, key: &V::Key) -> bool {
        self.shared.state.lock().store.contains_vertex(key)
    }

    fn contains_edge(&self, a: &V::Key, b: &V::Key) -> bool {
        let edge = EdgeKey::new(a.clone(), b.clone());
        self.shared.state.lock().store.contains_edge(&edge)
    }

    fn vertex_count(&self) -> usize {
        self.shared.state.lock().store.vertex_count()
    }

    fn edge_count(&self) -> usize {
        self.shared.state.lock().store.edge_count()
    }

    fn edge_keys(&self) -> Vec<EdgeKey<V::Key>> {
        self.shared.state.lock().store.edges()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeId, Value};
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use crate::export::GraphSnapshot;
    use crate::predicate::{Expr, Predicate};
    use crate::Error;

    fn chain(graph: &AccessGraph<Node>, ids: &[u64]) -> Vec<Arc<Node>> {
        let nodes: Vec<Arc<Node>> = ids.iter().map(|&id| Arc::new(Node::new(id))).collect();
        let edges = nodes.windows(2).map(|w| Edge::new(w[0].clone(), w[1].clone()));
        graph.add_vertices_and_edges(edges).unwrap();
        nodes
    }

    #[test]
    fn test_cache_hit_does_not_rebuild() {
        let graph = AccessGraph::new();
        chain(&graph, &[1, 2, 3, 4]);

        let a = graph.child_graph(Expr::attr("id").gt(1)).unwrap();
        let b = graph.child_graph(Expr::attr("id").gt(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(graph.build_count(), 1);

        let c = graph.child_graph(Expr::attr("id").gt(2)).unwrap();
        assert_ne!(a, c);
        assert_eq!(graph.build_count(), 2);
        assert_eq!(graph.cache_len(), 2);
    }

    #[test]
    fn test_failed_build_installs_nothing() {
        let graph = AccessGraph::new();
        let nodes = chain(&graph, &[1, 2]);
        nodes[1].set("level", "high").unwrap();

        let err = graph.child_graph(Expr::attr("level").gt(3)).unwrap_err();
        assert!(matches!(err, Error::Evaluation { .. }));
        assert_eq!(graph.cache_len(), 0);
        assert_eq!(graph.build_count(), 0);

        nodes[1].set("level", 5).unwrap();
        let child = graph.child_graph(Expr::attr("level").gt(3)).unwrap();
        assert_eq!(child.vertex_keys(), vec![NodeId(2)]);
    }

    #[test]
    fn test_failed_insert_changes_nothing() {
        let graph = AccessGraph::new();
        chain(&graph, &[1, 2]);
        let err = graph
            .child_graph(Predicate::fallible("level > 1", |n: &Node| {
                match n.get("level") {
                    Some(Value::Int(l)) => Ok(l > 1),
                    _ => Err(Error::predicate(format!("node {} has no level", n.id()))),
                }
            }))
            .unwrap_err();
        assert!(matches!(err, Error::Evaluation { .. }));

        let graph = AccessGraph::new();
        let a = Arc::new(Node::new(1).with_property("level", 2));
        graph.add_vertex(a.clone()).unwrap();
        let child = graph
            .child_graph(Predicate::fallible("level > 1", |n: &Node| {
                n.get("level")
                    .and_then(|v| v.as_int())
                    .map(|l| l > 1)
                    .ok_or_else(|| Error::predicate("no level"))
            }))
            .unwrap();

        let bad = Arc::new(Node::new(2));
        let err = graph.add_vertices_and_edges([Edge::new(a.clone(), bad)]).unwrap_err();
        assert!(matches!(err, Error::Evaluation { .. }));
        assert_eq!(graph.vertex_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(child.vertex_count(), 1);
    }

    #[test]
    fn test_failed_insert_leaves_every_entry_untouched() {
        let graph = AccessGraph::new();
        let a = Arc::new(Node::new(1).with_property("level", 2));
        graph.add_vertex(a.clone()).unwrap();
        let all = graph.child_graph(Expr::attr("id").gt(0)).unwrap();
        let leveled = graph
            .child_graph(Predicate::fallible("level > 1", |n: &Node| {
                n.get("level")
                    .and_then(|v| v.as_int())
                    .map(|l| l > 1)
                    .ok_or_else(|| Error::predicate("no level"))
            }))
            .unwrap();

        let good = Arc::new(Node::new(2).with_property("level", 5));
        let bad = Arc::new(Node::new(3));
        let err = graph
            .add_vertices_and_edges([Edge::new(a.clone(), good.clone()), Edge::new(good.clone(), bad.clone())])
            .unwrap_err();
        assert!(matches!(err, Error::Evaluation { ref key, .. } if key.as_str() == "level > 1"));

        assert_eq!(graph.vertex_keys(), vec![NodeId(1)]);
        assert_eq!(all.vertex_keys(), vec![NodeId(1)]);
        assert_eq!(leveled.vertex_keys(), vec![NodeId(1)]);
        assert_eq!(good.notifier().subscriber_count(), 0);
        assert_eq!(bad.notifier().subscriber_count(), 0);
    }

    #[test]
    fn test_failing_entry_does_not_block_the_others() {
        let graph = AccessGraph::new();
        let nodes = chain(&graph, &[1, 2]);
        nodes[0].set("level", 4).unwrap();
        nodes[1].set("level", "x").unwrap();

        let high = graph.child_graph(Expr::attr("id").equals(1).and(Expr::attr("level").ge(3))).unwrap();
        let text = Predicate::new("level is text", |n: &Node| {
            matches!(n.get("level"), Some(Value::String(_)))
        });
        let textual = graph.child_graph(text.clone()).unwrap();
        assert_eq!(high.vertex_keys(), vec![NodeId(1)]);
        assert_eq!(textual.vertex_keys(), vec![NodeId(2)]);

        let err = nodes[0].set("level", "n/a").unwrap_err();
        assert!(matches!(err, Error::Evaluation { ref key, .. } if key == high.key()));
        assert_eq!(nodes[0].get("level"), Some(Value::from("n/a")));

        // the failing entry keeps its membership, the other follows the write
        assert_eq!(high.vertex_keys(), vec![NodeId(1)]);
        assert_eq!(GraphSnapshot::of(&textual), GraphSnapshot::filtered(&graph, &text).unwrap());
        assert!(textual.contains_edge(&NodeId(1), &NodeId(2)));

        nodes[0].set("level", 0).unwrap();
        assert_eq!(high.vertex_count(), 0);
        assert_eq!(textual.vertex_keys(), vec![NodeId(2)]);
    }

    #[test]
    fn test_attribute_write_during_admission_is_seen() {
        let graph = AccessGraph::new();
        let target = Arc::new(Node::new(7));
        let writer: Arc<Mutex<Option<thread::JoinHandle<()>>>> = Arc::new(Mutex::new(None));
        let fired = AtomicBool::new(false);

        let flagged = {
            let target = Arc::clone(&target);
            let writer = Arc::clone(&writer);
            Predicate::new("flagged", move |n: &Node| {
                let verdict = n.get("flag") == Some(Value::Bool(true));
                if n.id() == NodeId(7) && !fired.swap(true, Ordering::SeqCst) {
                    // write from another thread while this verdict is pending
                    let v = Arc::clone(&target);
                    let handle = thread::spawn(move || v.set("flag", true).unwrap());
                    while target.get("flag").is_none() {
                        thread::yield_now();
                    }
                    *writer.lock() = Some(handle);
                }
                verdict
            })
        };
        let child = graph.child_graph(flagged.clone()).unwrap();

        assert!(graph.add_vertex(target.clone()).unwrap());
        let handle = writer.lock().take().unwrap();
        handle.join().unwrap();

        assert!(child.contains_vertex(&NodeId(7)));
        assert_eq!(GraphSnapshot::of(&child), GraphSnapshot::filtered(&graph, &flagged).unwrap());
    }

    #[test]
    fn test_failed_attribute_change_leaves_entries_untouched() {
        let graph = AccessGraph::new();
        let nodes = chain(&graph, &[1, 2]);
        nodes[0].set("level", 4).unwrap();
        nodes[1].set("level", 1).unwrap();

        let high = graph.child_graph(Expr::attr("level").ge(3)).unwrap();
        assert_eq!(high.vertex_keys(), vec![NodeId(1)]);

        let err = nodes[0].set("level", "n/a").unwrap_err();
        assert!(matches!(err, Error::Evaluation { .. }));
        assert_eq!(high.vertex_keys(), vec![NodeId(1)]);

        nodes[0].set("level", 0).unwrap();
        assert_eq!(high.vertex_count(), 0);
    }

    #[test]
    fn test_subscriptions_follow_membership() {
        let graph = AccessGraph::new();
        let nodes = chain(&graph, &[1, 2]);
        assert_eq!(nodes[0].notifier().subscriber_count(), 1);

        // re-inserting the same vertex must not double-subscribe
        graph.add_vertex(nodes[0].clone()).unwrap();
        assert_eq!(nodes[0].notifier().subscriber_count(), 1);

        assert!(graph.remove_vertex(&NodeId(1)));
        assert_eq!(nodes[0].notifier().subscriber_count(), 0);
        assert!(!graph.remove_vertex(&NodeId(1)));

        graph.add_vertex(nodes[0].clone()).unwrap();
        assert_eq!(nodes[0].notifier().subscriber_count(), 1);

        drop(graph);
        assert_eq!(nodes[0].notifier().subscriber_count(), 0);
    }

    #[test]
    fn test_isolated_vertices_are_filtered() {
        let graph = AccessGraph::new();
        graph.add_vertex(Arc::new(Node::new(2))).unwrap();
        graph.add_vertex(Arc::new(Node::new(3))).unwrap();

        let even = graph.child_graph(Predicate::new("even", |n: &Node| n.id().0 % 2 == 0)).unwrap();
        assert_eq!(even.vertex_keys(), vec![NodeId(2)]);

        graph.add_vertex(Arc::new(Node::new(4))).unwrap();
        assert_eq!(even.vertex_count(), 2);
    }

    #[test]
    fn test_remove_edge_propagates() {
        let graph = AccessGraph::new();
        chain(&graph, &[2, 4, 6]);
        let even = graph.child_graph(Predicate::new("even", |n: &Node| n.id().0 % 2 == 0)).unwrap();
        assert_eq!(even.edge_count(), 2);

        assert!(graph.remove_edge(&NodeId(4), &NodeId(2)));
        assert!(!graph.remove_edge(&NodeId(4), &NodeId(2)));
        assert_eq!(even.edge_count(), 1);
        assert_eq!(even.vertex_count(), 3);
    }

    #[test]
    fn test_self_loop_follows_vertex() {
        let graph = AccessGraph::new();
        let n = Arc::new(Node::new(5).with_property("on", false));
        graph.add_vertices_and_edges([Edge::new(n.clone(), n.clone())]).unwrap();
        let on = graph.child_graph(Expr::attr("on").equals(true)).unwrap();
        assert_eq!(on.edge_count(), 0);

        n.set("on", true).unwrap();
        assert!(on.contains_edge(&NodeId(5), &NodeId(5)));

        n.set("on", false).unwrap();
        assert_eq!(on.vertex_count(), 0);
        assert_eq!(on.edge_count(), 0);
    }
}

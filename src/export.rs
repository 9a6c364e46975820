//! Snapshot export: a sorted, comparable image of any graph view.
//!
//! ```text
//! AccessGraph / ChildGraph → GraphSnapshot::of() → PartialEq, Debug
//!                                                → write_json() → {"vertices": [..], "edges": [[a, b], ..]}
//! ```
//!
//! `GraphSnapshot::filtered` recomputes a child graph from scratch. It is
//! the reference a cached child graph must always agree with.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::graph::GraphView;
use crate::model::Vertex;
use crate::predicate::Predicate;
use crate::Result;

/// Vertex keys and edge endpoint pairs, both sorted. Edge pairs are
/// normalized so that the smaller key comes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot<K> {
    pub vertices: Vec<K>,
    pub edges: Vec<(K, K)>,
}

impl<K: Ord + Clone> GraphSnapshot<K> {
    pub fn of<V, G>(view: &G) -> Self
    where
        V: Vertex<Key = K>,
        G: GraphView<V> + ?Sized,
    {
        let vertices = view.vertex_keys();
        let edges = view
            .edge_keys()
            .into_iter()
            .map(|e| e.into_endpoints())
            .collect();
        Self::sorted(vertices, edges)
    }

    /// Filter `view` with `predicate` without consulting any cache: every
    /// matching vertex, and every edge whose endpoints both match.
    pub fn filtered<V, G>(view: &G, predicate: &Predicate<V>) -> Result<Self>
    where
        V: Vertex<Key = K>,
        G: GraphView<V> + ?Sized,
    {
        let mut vertices = Vec::new();
        for vertex in view.vertices() {
            if predicate.evaluate(&vertex)? {
                vertices.push(vertex.key());
            }
        }
        vertices.sort();

        let edges = view
            .edge_keys()
            .into_iter()
            .map(|e| e.into_endpoints())
            .filter(|(a, b)| vertices.binary_search(a).is_ok() && vertices.binary_search(b).is_ok())
            .collect();
        Ok(Self::sorted(vertices, edges))
    }

    fn sorted(mut vertices: Vec<K>, mut edges: Vec<(K, K)>) -> Self {
        vertices.sort();
        edges.sort();
        Self { vertices, edges }
    }
}

/// Write `view` as a pretty-printed JSON snapshot.
pub fn write_json<V, G>(view: &G, writer: &mut dyn Write) -> Result<()>
where
    V: Vertex,
    V::Key: Serialize,
    G: GraphView<V> + ?Sized,
{
    let snapshot = GraphSnapshot::of::<V, G>(view);
    serde_json::to_writer_pretty(&mut *writer, &snapshot)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::graph::AccessGraph;
    use crate::model::{Edge, Node, NodeId};

    fn square() -> AccessGraph<Node> {
        let graph = AccessGraph::new();
        let n: Vec<Arc<Node>> = (1..=4).map(|i| Arc::new(Node::new(i))).collect();
        graph
            .add_vertices_and_edges([
                Edge::new(n[1].clone(), n[0].clone()),
                Edge::new(n[1].clone(), n[2].clone()),
                Edge::new(n[2].clone(), n[3].clone()),
                Edge::new(n[3].clone(), n[0].clone()),
            ])
            .unwrap();
        graph
    }

    #[test]
    fn test_snapshot_is_sorted_and_normalized() {
        let snap = GraphSnapshot::of(&square());
        assert_eq!(snap.vertices, (1..=4).map(NodeId).collect::<Vec<_>>());
        assert_eq!(
            snap.edges,
            vec![
                (NodeId(1), NodeId(2)),
                (NodeId(1), NodeId(4)),
                (NodeId(2), NodeId(3)),
                (NodeId(3), NodeId(4)),
            ]
        );
    }

    #[test]
    fn test_filtered_matches_child_graph() {
        let graph = square();
        let low = Predicate::new("id <= 2", |n: &Node| n.id().0 <= 2);
        let expected = GraphSnapshot::filtered(&graph, &low).unwrap();
        assert_eq!(expected.vertices, vec![NodeId(1), NodeId(2)]);
        assert_eq!(expected.edges, vec![(NodeId(1), NodeId(2))]);

        let child = graph.child_graph(low).unwrap();
        assert_eq!(GraphSnapshot::of(&child), expected);
    }

    #[test]
    fn test_write_json() {
        let graph = AccessGraph::new();
        graph
            .add_vertices_and_edges([Edge::new(Arc::new(Node::new(7)), Arc::new(Node::new(3)))])
            .unwrap();

        let mut out = Vec::new();
        write_json(&graph, &mut out).unwrap();
        let back: GraphSnapshot<NodeId> = serde_json::from_slice(&out).unwrap();
        assert_eq!(back.vertices, vec![NodeId(3), NodeId(7)]);
        assert_eq!(back.edges, vec![(NodeId(3), NodeId(7))]);
    }
}

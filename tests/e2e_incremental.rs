//! Randomized checks: after any sequence of inserts, removals and attribute
//! writes, every cached child graph equals a from-scratch filter of the root.

use std::sync::Arc;

use acgraph::{AccessGraph, ChildGraph, Edge, Expr, GraphSnapshot, GraphView, Node, NodeId, Predicate};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    Connect { a: u64, b: u64 },
    Insert { id: u64, level: i64 },
    RemoveVertex { id: u64 },
    RemoveEdge { a: u64, b: u64 },
    SetLevel { id: u64, level: i64 },
    ClearLevel { id: u64 },
    Query { index: usize },
}

fn predicates() -> Vec<Expr> {
    vec![
        Expr::attr("level").ge(3),
        (Expr::attr("id") % 3).equals(0),
        (Expr::attr("level") % 2).equals(0).or(Expr::attr("id").lt(10)),
        !Expr::attr("level").equals(1),
        Expr::attr("id").to_text().ends_with("1"),
        Expr::attr("level").gt(Expr::attr("id") % 5),
    ]
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (1u64..=30, 1u64..=30).prop_map(|(a, b)| Operation::Connect { a, b }),
        1 => (1u64..=30, 0i64..6).prop_map(|(id, level)| Operation::Insert { id, level }),
        1 => (1u64..=30).prop_map(|id| Operation::RemoveVertex { id }),
        1 => (1u64..=30, 1u64..=30).prop_map(|(a, b)| Operation::RemoveEdge { a, b }),
        3 => (1u64..=30, 0i64..6).prop_map(|(id, level)| Operation::SetLevel { id, level }),
        1 => (1u64..=30).prop_map(|id| Operation::ClearLevel { id }),
        1 => (0..predicates().len()).prop_map(|index| Operation::Query { index }),
    ]
}

fn apply(graph: &AccessGraph<Node>, op: &Operation) {
    let node = |id: u64| Arc::new(Node::new(id).with_property("level", id as i64 % 6));
    match *op {
        Operation::Connect { a, b } => {
            graph.add_vertices_and_edges([Edge::new(node(a), node(b))]).unwrap();
        }
        Operation::Insert { id, level } => {
            graph.add_vertex(Arc::new(Node::new(id).with_property("level", level))).unwrap();
        }
        Operation::RemoveVertex { id } => {
            graph.remove_vertex(&NodeId(id));
        }
        Operation::RemoveEdge { a, b } => {
            graph.remove_edge(&NodeId(a), &NodeId(b));
        }
        Operation::SetLevel { id, level } => {
            if let Some(v) = graph.vertex(&NodeId(id)) {
                v.set("level", level).unwrap();
            }
        }
        Operation::ClearLevel { id } => {
            if let Some(v) = graph.vertex(&NodeId(id)) {
                v.remove("level").unwrap();
            }
        }
        Operation::Query { .. } => {}
    }
}

proptest! {
    #[test]
    fn prop_cached_graphs_track_root(
        warm in prop::collection::vec(0..predicates().len(), 0..4),
        ops in prop::collection::vec(arb_operation(), 1..80),
    ) {
        let exprs = predicates();
        let graph = AccessGraph::new();
        let mut cached: Vec<(Predicate<Node>, ChildGraph<Node>)> = Vec::new();
        let cache = |index: usize, cached: &mut Vec<(Predicate<Node>, ChildGraph<Node>)>| {
            let child = graph.child_graph(&exprs[index]).unwrap();
            cached.push((Predicate::from_expr(exprs[index].clone()).unwrap(), child));
        };

        for &index in &warm {
            cache(index, &mut cached);
        }

        for op in &ops {
            apply(&graph, op);
            if let Operation::Query { index } = *op {
                cache(index, &mut cached);
            }
            for (predicate, child) in &cached {
                prop_assert_eq!(
                    GraphSnapshot::of(child),
                    GraphSnapshot::filtered(&graph, predicate).unwrap(),
                    "{} after {:?}",
                    predicate.key(),
                    op
                );
            }
        }

        let mut distinct: Vec<_> = warm
            .iter()
            .copied()
            .chain(ops.iter().filter_map(|op| match *op {
                Operation::Query { index } => Some(index),
                _ => None,
            }))
            .collect();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(graph.cache_len(), distinct.len());
        prop_assert_eq!(graph.build_count(), distinct.len() as u64);
    }

    #[test]
    fn prop_edge_endpoints_stay_in_root(ops in prop::collection::vec(arb_operation(), 1..60)) {
        let graph = AccessGraph::new();
        for op in &ops {
            apply(&graph, op);
        }
        for edge in graph.edges() {
            prop_assert!(graph.contains_vertex(&edge.source().id()));
            prop_assert!(graph.contains_vertex(&edge.target().id()));
        }
        let snapshot = GraphSnapshot::of(&graph);
        prop_assert_eq!(snapshot.vertices.len(), graph.vertex_count());
        prop_assert_eq!(snapshot.edges.len(), graph.edge_count());
    }
}

//! # acgraph: Access-Control Graph
//!
//! An undirected, attributed graph that hands out **filtered child graphs**:
//! the vertices satisfying a predicate plus every edge whose endpoints both
//! satisfy it. Child graphs are cached by the predicate's canonical key and
//! kept in sync with the root graph incrementally, so re-issuing the same
//! query ("all nodes with security level 12") is a map lookup.
//!
//! ## Design Principles
//!
//! 1. **One lock per root**: the canonical graph, the cache and every cached
//!    child graph are guarded by a single mutex; every public operation is one
//!    critical section.
//! 2. **Shared vertices**: child graphs hold vertex keys, never copies. A
//!    vertex's attributes are visible through every graph containing it.
//! 3. **Explicit subscriptions**: vertices expose a `ChangeNotifier`; the root
//!    subscribes on insertion and unsubscribes on removal.
//! 4. **Evaluate, then apply**: predicate failures surface to the caller and
//!    never leave a cache entry half-updated.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use acgraph::{AccessGraph, Edge, Expr, GraphView, Node};
//!
//! # fn example() -> acgraph::Result<()> {
//! let graph = AccessGraph::<Node>::new();
//! let root = Arc::new(Node::new(1));
//! graph.add_vertices_and_edges([
//!     Edge::new(root.clone(), Arc::new(Node::new(2))),
//!     Edge::new(root.clone(), Arc::new(Node::new(3))),
//! ])?;
//!
//! let odd = graph.child_graph((Expr::attr("id") % 2).equals(1))?;
//! assert_eq!(odd.vertex_count(), 2);
//! assert_eq!(odd.edge_count(), 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod model;
pub mod storage;
pub mod predicate;
pub mod graph;
pub mod export;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Value, PropertyMap, Vertex, ChangeNotifier,
    Node, NodeId, Edge, EdgeKey,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{GraphStore, StoreObserver, MemoryStore};

// ============================================================================
// Re-exports: Predicates
// ============================================================================

pub use predicate::{Predicate, PredicateKey, PredicateSource, Expr, BinaryOp};

// ============================================================================
// Re-exports: Graphs
// ============================================================================

pub use config::GraphConfig;
pub use graph::{AccessGraph, ChildGraph, GraphView};
pub use export::GraphSnapshot;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Raised by a caller-supplied predicate.
    #[error("Predicate error: {0}")]
    Predicate(String),

    /// A predicate failed while a cache entry was being built or maintained.
    #[error("Evaluation of predicate `{key}` failed: {source}")]
    Evaluation {
        key: PredicateKey,
        #[source]
        source: Box<Error>,
    },

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Type error: cannot compare {left} with {right}")]
    Incomparable { left: String, right: String },

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    #[error("Unbound parameter: ${0}")]
    UnboundParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor for failures raised inside predicates.
    pub fn predicate(message: impl Into<String>) -> Self {
        Error::Predicate(message.into())
    }

    pub(crate) fn type_error(expected: impl Into<String>, got: &Value) -> Self {
        Error::TypeError { expected: expected.into(), got: got.type_name().to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! # Graph Model
//!
//! The types every other module speaks in: attribute values, the `Vertex`
//! capability, per-vertex change notification, and undirected edges.
//!
//! Design rule: no locking of graph state and no cache logic here. The only
//! interior mutability is on a vertex's own attributes and its subscriber list.

pub mod node;
pub mod edge;
pub mod notify;
pub mod value;
pub mod vertex;
pub mod property_map;

pub use node::{Node, NodeId};
pub use edge::{Edge, EdgeKey};
pub use notify::ChangeNotifier;
pub use value::Value;
pub use vertex::Vertex;
pub use property_map::PropertyMap;

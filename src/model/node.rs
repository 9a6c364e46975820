//! Stock vertex type: an identified node with labels and properties.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{ChangeNotifier, PropertyMap, Value, Vertex};
use crate::Result;

/// Opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

/// A node in the access-control graph.
///
/// Identity is the `NodeId`; labels and properties are mutable through a
/// shared reference and every mutation notifies subscribed graphs, so a
/// `Node` behind an `Arc` can be edited while it sits in any number of
/// cached child graphs.
///
/// Attribute lookup (`Vertex::attribute`) resolves `"id"` to the node id and
/// `"labels"` to the label list; every other name is a property.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    attrs: RwLock<Attributes>,
    notifier: ChangeNotifier<NodeId>,
}

#[derive(Debug, Default)]
struct Attributes {
    labels: Vec<String>,
    properties: PropertyMap,
}

impl Node {
    pub fn new(id: u64) -> Self {
        Self {
            id: NodeId(id),
            attrs: RwLock::new(Attributes::default()),
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn with_labels(self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.attrs.write().labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.write().properties.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.attrs.read().labels.iter().any(|l| l == label)
    }

    pub fn labels(&self) -> Vec<String> {
        self.attrs.read().labels.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.attrs.read().properties.get(key).cloned()
    }

    pub fn properties(&self) -> PropertyMap {
        self.attrs.read().properties.clone()
    }

    /// Set a property (upsert) and notify subscribed graphs.
    ///
    /// The write itself always happens; an error means a subscribed graph
    /// could not re-evaluate one of its predicates against the new value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.attrs.write().properties.insert(key.into(), value.into());
        self.notifier.notify(&self.id)
    }

    /// Remove a property and notify subscribed graphs.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        let removed = self.attrs.write().properties.remove(key);
        if removed.is_some() {
            self.notifier.notify(&self.id)?;
        }
        Ok(removed)
    }

    /// Add a label. No-op (and no notification) if already present.
    pub fn add_label(&self, label: &str) -> Result<()> {
        {
            let mut attrs = self.attrs.write();
            if attrs.labels.iter().any(|l| l == label) {
                return Ok(());
            }
            attrs.labels.push(label.to_string());
        }
        self.notifier.notify(&self.id)
    }

    pub fn remove_label(&self, label: &str) -> Result<()> {
        {
            let mut attrs = self.attrs.write();
            let before = attrs.labels.len();
            attrs.labels.retain(|l| l != label);
            if attrs.labels.len() == before {
                return Ok(());
            }
        }
        self.notifier.notify(&self.id)
    }
}

impl Vertex for Node {
    type Key = NodeId;

    fn key(&self) -> NodeId {
        self.id
    }

    fn notifier(&self) -> &ChangeNotifier<NodeId> {
        &self.notifier
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => i64::try_from(self.id.0).ok().map(Value::Int),
            "labels" => Some(Value::from(self.labels())),
            _ => self.get(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_lookup() {
        let node = Node::new(12)
            .with_labels(["Host"])
            .with_property("sec_level", 3);

        assert_eq!(node.attribute("id"), Some(Value::Int(12)));
        assert_eq!(node.attribute("sec_level"), Some(Value::Int(3)));
        assert_eq!(node.attribute("labels"), Some(Value::from(vec!["Host"])));
        assert_eq!(node.attribute("missing"), None);
    }

    #[test]
    fn test_mutation_without_subscribers() {
        let node = Node::new(1);
        node.set("owner", "ops").unwrap();
        node.add_label("Vm").unwrap();
        node.add_label("Vm").unwrap();

        assert_eq!(node.get("owner"), Some(Value::from("ops")));
        assert_eq!(node.labels(), vec!["Vm"]);
        assert_eq!(node.remove("owner").unwrap(), Some(Value::from("ops")));
        assert_eq!(node.remove("owner").unwrap(), None);
    }
}

//! In-memory document the progress widget mounts into
//!
//! A [`Stage`] is a flat set of named containers, always including the
//! body, each holding an ordered list of elements. It stands in for the
//! host document: it resolves mount points, inserts and removes elements,
//! and hands element snapshots to the renderer.
//!
//! `Stage` is a cheap handle. Clones share the same document, so a host can
//! add a container after a widget was built against it.

pub mod element;

pub use element::{BarParts, Display, Element, ElementContent, Part, StyleMap};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// A container on the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// The document body; always present
pub const BODY: NodeId = NodeId(0);

/// An element mounted on the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

/// Where the widget should mount
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContainerSpec {
    /// The stage body
    #[default]
    Body,
    /// `#name` or a bare container name
    Selector(String),
    /// A container obtained directly from the stage
    Node(NodeId),
}

impl From<String> for ContainerSpec {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == "body" {
            return ContainerSpec::Body;
        }
        if let Some(id) = trimmed.strip_prefix('@').and_then(|n| n.parse().ok()) {
            return ContainerSpec::Node(NodeId(id));
        }
        ContainerSpec::Selector(trimmed.to_string())
    }
}

impl From<&str> for ContainerSpec {
    fn from(value: &str) -> Self {
        ContainerSpec::from(value.to_string())
    }
}

impl From<NodeId> for ContainerSpec {
    fn from(node: NodeId) -> Self {
        ContainerSpec::Node(node)
    }
}

impl fmt::Display for ContainerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerSpec::Body => write!(f, "body"),
            ContainerSpec::Selector(selector) => write!(f, "{}", selector),
            ContainerSpec::Node(NodeId(id)) => write!(f, "@{}", id),
        }
    }
}

impl Serialize for ContainerSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContainerSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(ContainerSpec::from(String::deserialize(deserializer)?))
    }
}

#[derive(Debug)]
struct ContainerNode {
    name: String,
    children: Vec<ElementId>,
}

#[derive(Debug)]
struct StageInner {
    containers: BTreeMap<NodeId, ContainerNode>,
    elements: HashMap<ElementId, Element>,
    next_id: u64,
}

impl StageInner {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Clone)]
pub struct Stage {
    inner: Rc<RefCell<StageInner>>,
}

impl Stage {
    pub fn new() -> Self {
        let mut containers = BTreeMap::new();
        containers.insert(
            BODY,
            ContainerNode {
                name: "body".to_string(),
                children: Vec::new(),
            },
        );
        Self {
            inner: Rc::new(RefCell::new(StageInner {
                containers,
                elements: HashMap::new(),
                next_id: 1,
            })),
        }
    }

    /// Add a named container, matched by the selector `#name`
    pub fn add_container(&self, name: &str) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        let node = NodeId(inner.next_id());
        inner.containers.insert(
            node,
            ContainerNode {
                name: name.trim_start_matches('#').to_string(),
                children: Vec::new(),
            },
        );
        node
    }

    /// Remove a container together with its elements. The body stays.
    pub fn remove_container(&self, node: NodeId) {
        if node == BODY {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        if let Some(container) = inner.containers.remove(&node) {
            for child in container.children {
                inner.elements.remove(&child);
            }
        }
    }

    /// Mount point `target` refers to, if it exists yet
    pub fn resolve(&self, target: &ContainerSpec) -> Option<NodeId> {
        let inner = self.inner.borrow();
        match target {
            ContainerSpec::Body => Some(BODY),
            ContainerSpec::Node(node) => inner.containers.contains_key(node).then_some(*node),
            ContainerSpec::Selector(selector) => {
                let name = selector.trim().trim_start_matches('#');
                inner
                    .containers
                    .iter()
                    .find(|(_, container)| container.name == name)
                    .map(|(node, _)| *node)
            }
        }
    }

    /// Insert `element` as the first child of `container`
    pub fn insert_first(&self, container: NodeId, element: Element) -> Option<ElementId> {
        let mut inner = self.inner.borrow_mut();
        if !inner.containers.contains_key(&container) {
            return None;
        }
        let id = ElementId(inner.next_id());
        inner.elements.insert(id, element);
        if let Some(node) = inner.containers.get_mut(&container) {
            node.children.insert(0, id);
        }
        Some(id)
    }

    /// Detach an element from its parent
    pub fn remove(&self, id: ElementId) -> Option<Element> {
        let mut inner = self.inner.borrow_mut();
        for container in inner.containers.values_mut() {
            container.children.retain(|child| *child != id);
        }
        inner.elements.remove(&id)
    }

    /// Mutate a mounted element in place
    pub fn update<R>(&self, id: ElementId, f: impl FnOnce(&mut Element) -> R) -> Option<R> {
        self.inner.borrow_mut().elements.get_mut(&id).map(f)
    }

    /// Snapshot of a mounted element
    pub fn element(&self, id: ElementId) -> Option<Element> {
        self.inner.borrow().elements.get(&id).cloned()
    }

    pub fn children(&self, node: NodeId) -> Vec<ElementId> {
        self.inner
            .borrow()
            .containers
            .get(&node)
            .map(|container| container.children.clone())
            .unwrap_or_default()
    }

    /// Every mounted element in document order
    pub fn mounted(&self) -> Vec<Element> {
        let inner = self.inner.borrow();
        inner
            .containers
            .values()
            .flat_map(|container| container.children.iter())
            .filter_map(|id| inner.elements.get(id).cloned())
            .collect()
    }

    pub fn element_count(&self) -> usize {
        self.inner.borrow().elements.len()
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProgressOptions;

    #[test]
    fn test_body_always_resolves() {
        let stage = Stage::new();
        assert_eq!(stage.resolve(&ContainerSpec::Body), Some(BODY));
        assert_eq!(stage.resolve(&ContainerSpec::from("body")), Some(BODY));
    }

    #[test]
    fn test_selector_resolves_once_container_exists() {
        let stage = Stage::new();
        let spec = ContainerSpec::from("#app");
        assert_eq!(stage.resolve(&spec), None);

        let node = stage.add_container("app");
        assert_eq!(stage.resolve(&spec), Some(node));
        assert_eq!(stage.resolve(&ContainerSpec::Node(node)), Some(node));

        stage.remove_container(node);
        assert_eq!(stage.resolve(&spec), None);
    }

    #[test]
    fn test_insert_first_and_remove() {
        let stage = Stage::new();
        let options = ProgressOptions::default();

        let first = stage.insert_first(BODY, Element::generated(&options)).unwrap();
        let second = stage.insert_first(BODY, Element::from_template("x")).unwrap();
        assert_eq!(stage.children(BODY), vec![second, first]);

        let removed = stage.remove(first).unwrap();
        assert!(removed.bar().is_some());
        assert_eq!(stage.children(BODY), vec![second]);
        assert!(stage.remove(first).is_none());
    }

    #[test]
    fn test_insert_into_missing_container() {
        let stage = Stage::new();
        let node = stage.add_container("gone");
        stage.remove_container(node);
        assert!(stage.insert_first(node, Element::from_template("x")).is_none());
        assert_eq!(stage.element_count(), 0);
    }

    #[test]
    fn test_clones_share_the_document() {
        let stage = Stage::new();
        let host = stage.clone();
        host.add_container("late");
        assert!(stage.resolve(&ContainerSpec::from("#late")).is_some());
    }

    #[test]
    fn test_container_spec_string_forms() {
        assert_eq!(ContainerSpec::from(""), ContainerSpec::Body);
        assert_eq!(ContainerSpec::from("@4"), ContainerSpec::Node(NodeId(4)));
        assert_eq!(ContainerSpec::from("#x").to_string(), "#x");
        assert_eq!(ContainerSpec::Node(NodeId(4)).to_string(), "@4");
    }
}

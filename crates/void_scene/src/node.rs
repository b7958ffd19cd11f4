//! Node - a scene tree entity
//!
//! A node carries an id, a name, ordered child handles, a string property map
//! and an optional [`NodeBehavior`] with lifecycle hooks. Structure (parent,
//! children, tree membership) is only changed through [`SceneTree`].
//!
//! [`SceneTree`]: crate::SceneTree

use std::collections::BTreeMap;
use std::fmt;

use crate::arena::NodeHandle;
use crate::tree::SceneTree;

/// Numeric node identity. `0` means "not yet registered".
pub type NodeId = u64;

/// Id value of a node that has never been attached to a tree
pub const UNASSIGNED_ID: NodeId = 0;

/// Property key holding an explicit type marker
pub const TYPE_PROPERTY: &str = "@type";

/// Lifecycle hooks invoked by the scene tree.
///
/// Hooks receive the tree itself, so they may issue structural requests.
/// Requests made while the tree is ticking are deferred until the walk ends.
pub trait NodeBehavior {
    /// Type id reported for nodes carrying this behavior when no `@type`
    /// property is set.
    fn type_id(&self) -> Option<&str> {
        None
    }

    /// Called after the node is registered, before its children enter
    fn on_enter_tree(&mut self, _tree: &mut SceneTree, _node: NodeHandle) {}

    /// Called once before the first `on_process` after entering the tree
    fn on_ready(&mut self, _tree: &mut SceneTree, _node: NodeHandle) {}

    /// Called every tick
    fn on_process(&mut self, _tree: &mut SceneTree, _node: NodeHandle, _dt: f64) {}

    /// Called after all children have exited, before the node is unregistered
    fn on_exit_tree(&mut self, _tree: &mut SceneTree, _node: NodeHandle) {}
}

/// A scene node
pub struct Node {
    pub(crate) id: NodeId,
    name: String,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
    properties: BTreeMap<String, String>,
    pub(crate) in_tree: bool,
    pub(crate) ready_called: bool,
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
}

impl Node {
    /// Create a detached node without behavior
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            properties: BTreeMap::new(),
            in_tree: false,
            ready_called: false,
            behavior: None,
        }
    }

    /// Create a detached node driven by `behavior`
    pub fn with_behavior(name: impl Into<String>, behavior: Box<dyn NodeBehavior>) -> Self {
        let mut node = Self::new(name);
        node.behavior = Some(behavior);
        node
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    /// Whether the node is reachable from its tree's root
    #[inline]
    pub fn is_inside_tree(&self) -> bool {
        self.in_tree
    }

    /// Whether `on_ready` has run since the node last entered the tree
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready_called
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Set a property, returning the previous value
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.properties.insert(key.into(), value.into())
    }

    /// Remove a property, returning the previous value
    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }

    /// Type id declared by the node's behavior, if any
    pub fn behavior_type(&self) -> Option<&str> {
        self.behavior.as_ref().and_then(|b| b.type_id())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("properties", &self.properties)
            .field("in_tree", &self.in_tree)
            .field("ready_called", &self.ready_called)
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

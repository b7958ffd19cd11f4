//! Op validation against live tree state
//!
//! [`BatchValidator`] checks operations in order and keeps a working set of
//! their effects, so later ops in the same batch see earlier ones:
//!
//! - names reserved per parent (seeded from the parent's current children,
//!   extended by every validated `CreateNode` and `Rename`)
//! - nodes freed by `QueueFree`, including their subtrees
//! - parent links changed by `Reparent`, used for cycle checks; the moved
//!   node's name is reserved under its new parent
//! - types changed by writes to `@type`
//!
//! Reserved names are never released within a batch.

use std::collections::{HashMap, HashSet};

use void_scene::{NodeHandle, NodeId, NodeTypes, PropertyError, SceneTree, DEFAULT_TYPE, TYPE_PROPERTY};

use crate::op::SceneOp;
use crate::result::{SceneOpError, SceneOpResult};

/// Result of validation
pub type ValidationResult<T = ()> = Result<T, ValidationError>;

/// Reasons an operation is rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// CreateNode parent does not exist
    ParentNotFound(NodeId),
    /// Name is empty or blank
    NameEmpty,
    /// CreateNode name already used under the parent
    ChildExists(String),
    /// Target node does not exist
    NodeNotFound(NodeId),
    /// QueueFree on the root
    CannotFreeRoot,
    /// Rename collides with a sibling
    SiblingExists(String),
    /// Property rejected by the type registry
    Property(PropertyError),
    /// Reparent of the root
    CannotReparentRoot,
    /// Reparent target does not exist
    NewParentNotFound(NodeId),
    /// Reparent under the node itself or a descendant
    Cycle,
}

impl ValidationError {
    /// Wire error kind for this failure
    pub fn kind(&self) -> SceneOpError {
        match self {
            Self::ParentNotFound(_) | Self::NodeNotFound(_) | Self::NewParentNotFound(_) => SceneOpError::NotFound,
            Self::ChildExists(_) | Self::SiblingExists(_) => SceneOpError::AlreadyExists,
            Self::NameEmpty
            | Self::CannotFreeRoot
            | Self::Property(_)
            | Self::CannotReparentRoot
            | Self::Cycle => SceneOpError::Invalid,
        }
    }

    /// Failed result for `op`
    pub fn to_result(&self, op: &SceneOp) -> SceneOpResult {
        SceneOpResult::fail(op.target_id(), self.kind(), self.to_string())
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParentNotFound(_) => write!(f, "parent not found"),
            Self::NameEmpty => write!(f, "name empty"),
            Self::ChildExists(_) => write!(f, "child already exists"),
            Self::NodeNotFound(_) => write!(f, "node not found"),
            Self::CannotFreeRoot => write!(f, "cannot free root"),
            Self::SiblingExists(_) => write!(f, "sibling already exists"),
            Self::Property(err) => write!(f, "{}", err),
            Self::CannotReparentRoot => write!(f, "cannot reparent root"),
            Self::NewParentNotFound(_) => write!(f, "new parent not found"),
            Self::Cycle => write!(f, "cycle"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<PropertyError> for ValidationError {
    fn from(err: PropertyError) -> Self {
        Self::Property(err)
    }
}

/// Validates ops in order against a tree plus the effects of earlier ops
pub struct BatchValidator<'a> {
    tree: &'a SceneTree,
    types: &'a dyn NodeTypes,
    reserved: HashMap<NodeHandle, HashSet<String>>,
    renamed: HashMap<NodeHandle, String>,
    moved: HashMap<NodeHandle, NodeHandle>,
    freed: HashSet<NodeHandle>,
    retyped: HashMap<NodeHandle, String>,
}

impl<'a> BatchValidator<'a> {
    pub fn new(tree: &'a SceneTree, types: &'a dyn NodeTypes) -> Self {
        Self {
            tree,
            types,
            reserved: HashMap::new(),
            renamed: HashMap::new(),
            moved: HashMap::new(),
            freed: HashSet::new(),
            retyped: HashMap::new(),
        }
    }

    /// Validate one op against the tree and the working set, then record its
    /// effects.
    pub fn validate(&mut self, op: &SceneOp) -> ValidationResult {
        match op {
            SceneOp::CreateNode { parent_id, name, .. } => {
                let parent = self.resolve(*parent_id).ok_or(ValidationError::ParentNotFound(*parent_id))?;
                if name.trim().is_empty() {
                    return Err(ValidationError::NameEmpty);
                }
                let names = self.reserved_names(parent);
                if !names.insert(name.clone()) {
                    return Err(ValidationError::ChildExists(name.clone()));
                }
                Ok(())
            }
            SceneOp::QueueFree { node_id } => {
                let node = self.resolve(*node_id).ok_or(ValidationError::NodeNotFound(*node_id))?;
                if node == self.tree.root() {
                    return Err(ValidationError::CannotFreeRoot);
                }
                self.freed.insert(node);
                Ok(())
            }
            SceneOp::Rename { node_id, new_name } => {
                let node = self.resolve(*node_id).ok_or(ValidationError::NodeNotFound(*node_id))?;
                if new_name.trim().is_empty() {
                    return Err(ValidationError::NameEmpty);
                }
                let current = self.current_name(node);
                if let Some(parent) = self.parent_of(node) {
                    let names = self.reserved_names(parent);
                    if current.as_deref() != Some(new_name.as_str()) && !names.insert(new_name.clone()) {
                        return Err(ValidationError::SiblingExists(new_name.clone()));
                    }
                }
                self.renamed.insert(node, new_name.clone());
                Ok(())
            }
            SceneOp::SetProperty { node_id, key, value } => {
                let node = self.resolve(*node_id).ok_or(ValidationError::NodeNotFound(*node_id))?;
                if key.trim().is_empty() {
                    return Err(PropertyError::EmptyKey.into());
                }
                let type_id = self.type_of(node);
                self.types.validate_set_property(&type_id, key, value)?;
                if key == TYPE_PROPERTY {
                    let retyped = if value.trim().is_empty() {
                        self.fallback_type(node)
                    } else {
                        value.clone()
                    };
                    self.retyped.insert(node, retyped);
                }
                Ok(())
            }
            SceneOp::RemoveProperty { node_id, key } => {
                let node = self.resolve(*node_id).ok_or(ValidationError::NodeNotFound(*node_id))?;
                if key.trim().is_empty() {
                    return Err(PropertyError::EmptyKey.into());
                }
                let type_id = self.type_of(node);
                self.types.validate_remove_property(&type_id, key)?;
                if key == TYPE_PROPERTY {
                    let fallback = self.fallback_type(node);
                    self.retyped.insert(node, fallback);
                }
                Ok(())
            }
            SceneOp::Reparent { node_id, new_parent_id, .. } => {
                let node = self.resolve(*node_id).ok_or(ValidationError::NodeNotFound(*node_id))?;
                if node == self.tree.root() || self.parent_of(node).is_none() {
                    return Err(ValidationError::CannotReparentRoot);
                }
                let new_parent = self
                    .resolve(*new_parent_id)
                    .ok_or(ValidationError::NewParentNotFound(*new_parent_id))?;
                if self.is_ancestor_or_self(node, new_parent) {
                    return Err(ValidationError::Cycle);
                }
                if self.parent_of(node) != Some(new_parent) {
                    if let Some(name) = self.current_name(node) {
                        self.reserved_names(new_parent).insert(name);
                    }
                }
                self.moved.insert(node, new_parent);
                Ok(())
            }
        }
    }

    /// Look up a live node that has not been freed earlier in the batch
    fn resolve(&self, id: NodeId) -> Option<NodeHandle> {
        let handle = self.tree.handle_of(id)?;
        if self.is_freed(handle) {
            return None;
        }
        Some(handle)
    }

    fn parent_of(&self, node: NodeHandle) -> Option<NodeHandle> {
        match self.moved.get(&node) {
            Some(parent) => Some(*parent),
            None => self.tree.node(node).and_then(|n| n.parent()),
        }
    }

    fn is_freed(&self, node: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(handle) = current {
            if self.freed.contains(&handle) {
                return true;
            }
            current = self.parent_of(handle);
        }
        false
    }

    fn is_ancestor_or_self(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.parent_of(handle);
        }
        false
    }

    fn current_name(&self, node: NodeHandle) -> Option<String> {
        if let Some(name) = self.renamed.get(&node) {
            return Some(name.clone());
        }
        self.tree.node(node).map(|n| n.name().to_string())
    }

    fn type_of(&self, node: NodeHandle) -> String {
        if let Some(type_id) = self.retyped.get(&node) {
            return type_id.clone();
        }
        self.tree
            .node(node)
            .map(|n| self.types.type_id_for(n))
            .unwrap_or_default()
    }

    /// Type a node resolves to once its `@type` tag is gone
    fn fallback_type(&self, node: NodeHandle) -> String {
        self.tree
            .node(node)
            .and_then(|n| n.behavior_type())
            .unwrap_or(DEFAULT_TYPE)
            .to_string()
    }

    fn reserved_names(&mut self, parent: NodeHandle) -> &mut HashSet<String> {
        let tree = self.tree;
        self.reserved.entry(parent).or_insert_with(|| {
            tree.node(parent)
                .map(|p| {
                    p.children()
                        .iter()
                        .filter_map(|c| tree.node(*c))
                        .map(|c| c.name().to_string())
                        .collect()
                })
                .unwrap_or_default()
        })
    }
}

/// Validate a single op against the live tree only
pub fn validate_op(tree: &SceneTree, types: &dyn NodeTypes, op: &SceneOp) -> ValidationResult {
    BatchValidator::new(tree, types).validate(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_scene::NodeTypeRegistry;

    /// root(1) ── a(2) ── b(3)
    ///        └── c(4)
    fn fixture() -> (SceneTree, NodeTypeRegistry) {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let a = tree.create_node("a");
        let b = tree.create_node("b");
        let c = tree.create_node("c");
        tree.add_child(root, a).unwrap();
        tree.add_child(a, b).unwrap();
        tree.add_child(root, c).unwrap();
        (tree, NodeTypeRegistry::with_core_types())
    }

    #[test]
    fn test_create_rules() {
        let (tree, types) = fixture();
        let mut v = BatchValidator::new(&tree, &types);

        assert_eq!(v.validate(&SceneOp::create_node(99, "x", "Node")), Err(ValidationError::ParentNotFound(99)));
        assert_eq!(v.validate(&SceneOp::create_node(1, " ", "Node")), Err(ValidationError::NameEmpty));
        assert_eq!(v.validate(&SceneOp::create_node(1, "a", "Node")), Err(ValidationError::ChildExists("a".into())));
        assert!(v.validate(&SceneOp::create_node(1, "d", "Node")).is_ok());
        assert_eq!(v.validate(&SceneOp::create_node(1, "d", "Node")), Err(ValidationError::ChildExists("d".into())));
        // same name under another parent is fine
        assert!(v.validate(&SceneOp::create_node(2, "d", "Node")).is_ok());
    }

    #[test]
    fn test_rename_rules() {
        let (tree, types) = fixture();
        let mut v = BatchValidator::new(&tree, &types);

        assert!(v.validate(&SceneOp::rename(2, "a")).is_ok());
        assert_eq!(v.validate(&SceneOp::rename(2, "c")), Err(ValidationError::SiblingExists("c".into())));
        assert_eq!(v.validate(&SceneOp::rename(2, "")), Err(ValidationError::NameEmpty));
        assert!(v.validate(&SceneOp::rename(1, "world")).is_ok());
        assert!(v.validate(&SceneOp::rename(2, "z")).is_ok());
        assert_eq!(v.validate(&SceneOp::create_node(1, "z", "Node")), Err(ValidationError::ChildExists("z".into())));
    }

    #[test]
    fn test_free_rules() {
        let (tree, types) = fixture();
        let mut v = BatchValidator::new(&tree, &types);

        assert_eq!(v.validate(&SceneOp::queue_free(1)), Err(ValidationError::CannotFreeRoot));
        assert!(v.validate(&SceneOp::queue_free(2)).is_ok());
        // descendants of a freed node are gone for later ops
        assert_eq!(v.validate(&SceneOp::rename(3, "q")), Err(ValidationError::NodeNotFound(3)));
        assert_eq!(v.validate(&SceneOp::queue_free(2)), Err(ValidationError::NodeNotFound(2)));
    }

    #[test]
    fn test_reparent_rules() {
        let (tree, types) = fixture();
        let mut v = BatchValidator::new(&tree, &types);

        assert_eq!(v.validate(&SceneOp::reparent(1, 2, 0)), Err(ValidationError::CannotReparentRoot));
        assert_eq!(v.validate(&SceneOp::reparent(2, 99, 0)), Err(ValidationError::NewParentNotFound(99)));
        assert_eq!(v.validate(&SceneOp::reparent(2, 3, 0)), Err(ValidationError::Cycle));
        assert!(v.validate(&SceneOp::reparent(4, 3, 0)).is_ok());
        // c now sits under b, so moving a under c would close a loop
        assert_eq!(v.validate(&SceneOp::reparent(2, 4, 0)), Err(ValidationError::Cycle));
    }

    #[test]
    fn test_reparent_reserves_name_under_new_parent() {
        let (tree, types) = fixture();
        let mut v = BatchValidator::new(&tree, &types);

        // c(4) moves under a(2); a later "c" under a must clash
        assert!(v.validate(&SceneOp::reparent(4, 2, 0)).is_ok());
        assert_eq!(v.validate(&SceneOp::create_node(2, "c", "Node")), Err(ValidationError::ChildExists("c".into())));
        assert_eq!(v.validate(&SceneOp::rename(3, "c")), Err(ValidationError::SiblingExists("c".into())));
    }

    #[test]
    fn test_type_change_seen_by_later_ops() {
        let (tree, mut types) = fixture();
        types.set_allow_unknown_properties(false);
        let mut v = BatchValidator::new(&tree, &types);

        // "weather" is declared by WorldEnvironment but not by Node
        assert!(v.validate(&SceneOp::set_property(2, TYPE_PROPERTY, "WorldEnvironment")).is_ok());
        assert!(v.validate(&SceneOp::set_property(2, "weather", "rain")).is_ok());
        assert!(v.validate(&SceneOp::remove_property(2, TYPE_PROPERTY)).is_ok());
        assert_eq!(
            v.validate(&SceneOp::set_property(2, "weather", "rain")),
            Err(ValidationError::Property(PropertyError::UnknownProperty("weather".into())))
        );
    }

    #[test]
    fn test_property_rules() {
        let (tree, mut types) = fixture();
        types.set_allow_unknown_properties(false);
        let v = validate_op;

        assert_eq!(
            v(&tree, &types, &SceneOp::set_property(2, "", "1")),
            Err(ValidationError::Property(PropertyError::EmptyKey))
        );
        assert_eq!(
            v(&tree, &types, &SceneOp::set_property(2, "hp", "1")),
            Err(ValidationError::Property(PropertyError::UnknownProperty("hp".into())))
        );
        assert!(v(&tree, &types, &SceneOp::set_property(2, "foo", "bar")).is_ok());
        assert_eq!(
            v(&tree, &types, &SceneOp::remove_property(42, "foo")),
            Err(ValidationError::NodeNotFound(42))
        );
    }

    #[test]
    fn test_error_kinds_and_messages() {
        let op = SceneOp::create_node(1, "a", "Node");
        let result = ValidationError::ChildExists("a".into()).to_result(&op);
        assert_eq!(result.error, SceneOpError::AlreadyExists);
        assert_eq!(result.message, "child already exists");
        assert_eq!(result.target_id, 1);

        assert_eq!(ValidationError::Cycle.kind(), SceneOpError::Invalid);
        assert_eq!(ValidationError::NodeNotFound(1).kind(), SceneOpError::NotFound);
        assert_eq!(
            ValidationError::Property(PropertyError::UnknownType("X".into())).to_string(),
            "unknown type: X"
        );
    }
}

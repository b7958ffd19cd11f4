//! Bulk scene replacement from flat node specs
//!
//! Used when a scene is loaded: every current child of the root is discarded
//! and a new hierarchy is materialized from `(id, parent_id, name, type,
//! properties)` records. Specs whose parent is `0` or missing from the list
//! attach directly under the root.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::arena::NodeHandle;
use crate::node::{Node, NodeId, TYPE_PROPERTY, UNASSIGNED_ID};
use crate::tree::SceneTree;
use crate::types::{NodeTypes, DEFAULT_TYPE};

/// Flat description of one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub parent_id: NodeId,
    pub name: String,
    pub type_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl NodeSpec {
    pub fn new(id: NodeId, parent_id: NodeId, name: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            name: name.into(),
            type_id: type_id.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Replace all children of the root with the hierarchy described by `specs`.
///
/// Specs with id `0` or a blank name are ignored, and only the first spec for
/// a given id is used. Returns the number of nodes attached.
pub fn replace_root_children(tree: &mut SceneTree, specs: &[NodeSpec], types: &dyn NodeTypes) -> usize {
    let root = tree.root();
    let existing = tree.node(root).map(|n| n.children().to_vec()).unwrap_or_default();
    for child in existing {
        if let Err(err) = tree.free_immediate(child) {
            log::warn!("Failed to discard root child {:?}: {}", child, err);
        }
    }

    let mut seen = HashSet::new();
    let accepted: Vec<&NodeSpec> = specs
        .iter()
        .filter(|spec| spec.id != UNASSIGNED_ID && !spec.name.trim().is_empty())
        .filter(|spec| seen.insert(spec.id))
        .collect();

    let mut handles: HashMap<NodeId, NodeHandle> = HashMap::with_capacity(accepted.len());
    for spec in &accepted {
        handles.insert(spec.id, tree.insert(materialize(spec, types)));
    }

    let mut children_by_parent: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();
    for spec in &accepted {
        let parent = Some(spec.parent_id).filter(|id| *id != UNASSIGNED_ID && seen.contains(id));
        children_by_parent.entry(parent).or_default().push(spec.id);
    }

    let attached = attach_from_root(tree, &handles, &children_by_parent);

    // Specs that never reached the root (parent cycles, id conflicts) are dropped.
    let mut dropped = 0;
    for handle in handles.values() {
        let orphan = tree
            .node(*handle)
            .is_some_and(|node| node.parent().is_none() && !node.is_inside_tree());
        if orphan && tree.destroy(*handle).is_ok() {
            dropped += 1;
        }
    }
    if dropped > 0 {
        log::warn!("Scene load dropped {} unreachable node(s)", dropped);
    }

    log::info!("Scene load attached {} of {} node spec(s)", attached, specs.len());
    attached
}

fn materialize(spec: &NodeSpec, types: &dyn NodeTypes) -> Node {
    let mut node = Node::new(spec.name.clone());
    node.id = spec.id;

    let type_id = if spec.type_id.trim().is_empty() {
        DEFAULT_TYPE
    } else {
        spec.type_id.as_str()
    };
    if type_id != DEFAULT_TYPE {
        node.set_property(TYPE_PROPERTY, type_id);
    }
    for (key, value) in &spec.properties {
        if !key.trim().is_empty() {
            node.set_property(key.clone(), value.clone());
        }
    }
    types.apply_defaults(&mut node, type_id);
    node
}

fn attach_from_root(
    tree: &mut SceneTree,
    handles: &HashMap<NodeId, NodeHandle>,
    children_by_parent: &HashMap<Option<NodeId>, Vec<NodeId>>,
) -> usize {
    let mut attached = 0;
    let mut stack: Vec<(NodeHandle, NodeId)> = Vec::new();
    push_children(&mut stack, tree.root(), None, children_by_parent);

    while let Some((parent, id)) = stack.pop() {
        let Some(&handle) = handles.get(&id) else {
            continue;
        };
        if tree.node(handle).map_or(true, |node| node.parent().is_some()) {
            continue;
        }
        match tree.add_child_immediate(parent, handle) {
            Ok(()) => {
                attached += 1;
                push_children(&mut stack, handle, Some(id), children_by_parent);
            }
            Err(err) => log::warn!("Skipping node spec {}: {}", id, err),
        }
    }
    attached
}

/// Push in reverse so siblings pop in declaration order
fn push_children(
    stack: &mut Vec<(NodeHandle, NodeId)>,
    parent: NodeHandle,
    key: Option<NodeId>,
    children_by_parent: &HashMap<Option<NodeId>, Vec<NodeId>>,
) {
    if let Some(children) = children_by_parent.get(&key) {
        stack.extend(children.iter().rev().map(|id| (parent, *id)));
    }
}

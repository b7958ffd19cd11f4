//! Scene and schema snapshots
//!
//! A [`SceneSnapshot`] is a flat depth-first listing of the whole tree, sent
//! to clients on request and usable to reload a scene. A [`SchemaSnapshot`]
//! describes the registered node types for editors.

use serde::{Deserialize, Serialize};
use void_scene::{NodeId, NodeSpec, NodeTypeDef, UNASSIGNED_ID};

/// A key/value property pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotProperty {
    pub key: String,
    pub value: String,
}

impl SnapshotProperty {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One node in a scene snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: NodeId,
    /// `0` for the root
    pub parent_id: NodeId,
    pub name: String,
    pub type_id: String,
    pub properties: Vec<SnapshotProperty>,
}

/// Full scene state at a revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub request_id: u64,
    pub revision: u64,
    /// Depth-first, root first
    pub nodes: Vec<NodeSnapshot>,
}

impl SceneSnapshot {
    pub fn find(&self, node_id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// Convert to loader specs, skipping the root entry and blank keys
    pub fn to_node_specs(&self) -> Vec<NodeSpec> {
        let root_index = self.nodes.iter().position(|n| n.parent_id == UNASSIGNED_ID);

        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != root_index)
            .map(|(_, node)| NodeSpec {
                id: node.node_id,
                parent_id: node.parent_id,
                name: node.name.clone(),
                type_id: node.type_id.clone(),
                properties: node
                    .properties
                    .iter()
                    .filter(|p| !p.key.trim().is_empty())
                    .map(|p| (p.key.clone(), p.value.clone()))
                    .collect(),
            })
            .collect()
    }
}

/// Registered node types at a schema revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub schema_revision: u64,
    pub types: Vec<NodeTypeDef>,
}

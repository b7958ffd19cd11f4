//! Scene operations - declarative mutations of the scene tree
//!
//! Every mutation a client can request is one [`SceneOp`] variant. Each kind
//! has a stable numeric id used on the wire.

use serde::{Deserialize, Serialize};
use void_scene::NodeId;

/// Wire id of an operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SceneOpKind {
    CreateNode = 1,
    QueueFree = 2,
    Rename = 3,
    SetProperty = 4,
    RemoveProperty = 5,
    Reparent = 6,
}

impl SceneOpKind {
    #[inline]
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::CreateNode),
            2 => Some(Self::QueueFree),
            3 => Some(Self::Rename),
            4 => Some(Self::SetProperty),
            5 => Some(Self::RemoveProperty),
            6 => Some(Self::Reparent),
            _ => None,
        }
    }
}

/// A single declarative scene mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneOp {
    /// Create a node named `name` of type `type_id` under `parent_id`
    CreateNode {
        parent_id: NodeId,
        name: String,
        type_id: String,
    },
    /// Detach and destroy a node and its subtree
    QueueFree { node_id: NodeId },
    /// Change a node's name
    Rename { node_id: NodeId, new_name: String },
    /// Set a property value
    SetProperty {
        node_id: NodeId,
        key: String,
        value: String,
    },
    /// Remove a property
    RemoveProperty { node_id: NodeId, key: String },
    /// Move a node under a new parent at `index` (clamped when applied)
    Reparent {
        node_id: NodeId,
        new_parent_id: NodeId,
        index: i32,
    },
}

impl SceneOp {
    pub fn create_node(parent_id: NodeId, name: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self::CreateNode {
            parent_id,
            name: name.into(),
            type_id: type_id.into(),
        }
    }

    pub fn queue_free(node_id: NodeId) -> Self {
        Self::QueueFree { node_id }
    }

    pub fn rename(node_id: NodeId, new_name: impl Into<String>) -> Self {
        Self::Rename {
            node_id,
            new_name: new_name.into(),
        }
    }

    pub fn set_property(node_id: NodeId, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::SetProperty {
            node_id,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove_property(node_id: NodeId, key: impl Into<String>) -> Self {
        Self::RemoveProperty {
            node_id,
            key: key.into(),
        }
    }

    pub fn reparent(node_id: NodeId, new_parent_id: NodeId, index: i32) -> Self {
        Self::Reparent {
            node_id,
            new_parent_id,
            index,
        }
    }

    pub fn kind(&self) -> SceneOpKind {
        match self {
            Self::CreateNode { .. } => SceneOpKind::CreateNode,
            Self::QueueFree { .. } => SceneOpKind::QueueFree,
            Self::Rename { .. } => SceneOpKind::Rename,
            Self::SetProperty { .. } => SceneOpKind::SetProperty,
            Self::RemoveProperty { .. } => SceneOpKind::RemoveProperty,
            Self::Reparent { .. } => SceneOpKind::Reparent,
        }
    }

    /// Id reported as the result target: the parent for `CreateNode`, the
    /// affected node otherwise.
    pub fn target_id(&self) -> NodeId {
        match self {
            Self::CreateNode { parent_id, .. } => *parent_id,
            Self::QueueFree { node_id }
            | Self::Rename { node_id, .. }
            | Self::SetProperty { node_id, .. }
            | Self::RemoveProperty { node_id, .. }
            | Self::Reparent { node_id, .. } => *node_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ids() {
        let kinds = [
            SceneOpKind::CreateNode,
            SceneOpKind::QueueFree,
            SceneOpKind::Rename,
            SceneOpKind::SetProperty,
            SceneOpKind::RemoveProperty,
            SceneOpKind::Reparent,
        ];
        for (i, kind) in kinds.iter().enumerate() {
            assert_eq!(kind.id(), i as u32 + 1);
            assert_eq!(SceneOpKind::from_id(kind.id()), Some(*kind));
        }
        assert_eq!(SceneOpKind::from_id(0), None);
        assert_eq!(SceneOpKind::from_id(7), None);
    }

    #[test]
    fn test_target_id() {
        assert_eq!(SceneOp::create_node(3, "a", "Node").target_id(), 3);
        assert_eq!(SceneOp::reparent(9, 3, 0).target_id(), 9);
        assert_eq!(SceneOp::remove_property(4, "hp").kind(), SceneOpKind::RemoveProperty);
    }
}

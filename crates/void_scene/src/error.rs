//! Scene tree errors

use thiserror::Error;

use crate::arena::NodeHandle;
use crate::node::NodeId;

/// Structural errors raised by [`SceneTree`](crate::SceneTree) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("invalid node handle: {0:?}")]
    InvalidHandle(NodeHandle),

    #[error("node '{0}' already has a parent")]
    AlreadyHasParent(String),

    #[error("node '{0}' is already in a tree")]
    AlreadyInTree(String),

    #[error("node '{0}' is not a child of the given parent")]
    NotAChild(String),

    #[error("node '{0}' has no parent")]
    NoParent(String),

    #[error("operation would make a node its own ancestor")]
    Cycle,

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("parent not found: {0}")]
    ParentNotFound(NodeId),

    #[error("operation not allowed on the root node")]
    IsRoot,

    #[error("node id {0} is already registered")]
    DuplicateId(NodeId),

    #[error("no free node ids left")]
    IdsExhausted,

    /// The deferred queue kept refilling itself past the pass ceiling.
    /// This signals a non-terminating mutation cascade and is not recoverable.
    #[error("deferred ops did not stabilize after {0} passes")]
    DeferredOverflow(usize),
}

/// Result type for scene tree operations
pub type SceneResult<T = ()> = Result<T, SceneError>;

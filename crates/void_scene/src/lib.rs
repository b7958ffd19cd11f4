//! # Void Scene - Scene Graph
//!
//! Authoritative node hierarchy shared with remote clients. Nodes live in a
//! generational arena owned by the [`SceneTree`]; parent links are handles,
//! so ownership is strictly top-down.
//!
//! ## Architecture
//!
//! ```text
//!             ┌──────────────── SceneTree ────────────────┐
//! tick(dt) ──►│ walk(root) ── hooks ──► deferred queue    │
//!             │      │                        │          │
//!             │      ▼                        ▼          │
//!             │  NodeArena ◄── drain (FIFO passes, capped)│
//!             │      ▲                                   │
//!             │  id registry (u64 → NodeHandle)          │
//!             └──────┬────────────────────────────────────┘
//!                    │
//! NodeSpec[] ──► replace_root_children ◄── NodeTypes (defaults/validation)
//! ```
//!
//! ## Key Concepts
//!
//! - **Node**: name, id, ordered children, string properties, optional behavior
//! - **SceneTree**: root, id allocation, processing flag, deferred mutations
//! - **NodeTypes**: type resolution, defaults and property validation
//! - **NodeSpec**: flat record used to load a whole scene at once

pub mod arena;
pub mod builtin;
pub mod error;
pub mod mutator;
pub mod node;
pub mod path;
pub mod tree;
pub mod types;

pub use arena::NodeHandle;
pub use builtin::register_core_types;
pub use error::{SceneError, SceneResult};
pub use mutator::{replace_root_children, NodeSpec};
pub use node::{Node, NodeBehavior, NodeId, TYPE_PROPERTY, UNASSIGNED_ID};
pub use path::{NodePath, PathSegment};
pub use tree::{SceneTree, SceneTreeConfig, DEFAULT_MAX_DEFERRED_PASSES, DEFAULT_ROOT_NAME};
pub use types::{
    NodeTypeDef, NodeTypeRegistry, NodeTypes, PropertyDef, PropertyError, PropertyType, DEFAULT_TYPE,
};

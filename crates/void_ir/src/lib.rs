//! # Void IR - Scene Operation Representation
//!
//! Clients never touch the scene tree directly - they send declarative
//! operation batches that the kernel validates and applies, and receive
//! acknowledgements and snapshots back.
//!
//! ## Architecture
//!
//! ```text
//! Client ──► SceneOpBatch ──► BatchValidator ──► Kernel Applies ──► SceneTree
//!    ▲                                                 │
//!    └──────────── SceneOpAck / SceneSnapshot ◄────────┘
//! ```
//!
//! ## Key Concepts
//!
//! - **SceneOp**: a single declarative mutation (create/free/rename/property/reparent)
//! - **SceneOpBatch**: ordered ops, applied atomically or one by one
//! - **SceneOpAck**: per-op results plus the scene revision after the batch
//! - **Message**: the closed set of protocol values carried on the wire

pub mod batch;
pub mod message;
pub mod op;
pub mod result;
pub mod snapshot;
pub mod validation;

pub use batch::{next_batch_id, SceneOpBatch, SceneOpBatchBuilder};
pub use message::{
    Hello, Message, MessageType, Ping, Pong, SceneInfo, SceneList, SceneSelect, SceneSnapshotRequest,
    ServerHello, PROTOCOL_VERSION,
};
pub use op::{SceneOp, SceneOpKind};
pub use result::{SceneOpAck, SceneOpError, SceneOpResult};
pub use snapshot::{NodeSnapshot, SceneSnapshot, SchemaSnapshot, SnapshotProperty};
pub use validation::{validate_op, BatchValidator, ValidationError, ValidationResult};

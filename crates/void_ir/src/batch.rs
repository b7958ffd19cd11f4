//! Op batches - ordered groups of scene operations
//!
//! A batch is applied either atomically (validated as a whole first, no
//! mutation if anything fails) or op by op.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::op::SceneOp;

/// Allocate a process-unique batch id
pub fn next_batch_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// An ordered list of operations with an id and an atomic flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneOpBatch {
    pub batch_id: u64,
    pub atomic: bool,
    pub ops: Vec<SceneOp>,
}

impl SceneOpBatch {
    pub fn new(batch_id: u64, atomic: bool, ops: Vec<SceneOp>) -> Self {
        Self { batch_id, atomic, ops }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Builder for creating batches
#[derive(Debug)]
pub struct SceneOpBatchBuilder {
    batch: SceneOpBatch,
}

impl SceneOpBatchBuilder {
    /// Start a non-atomic batch with a fresh id
    pub fn new() -> Self {
        Self {
            batch: SceneOpBatch::new(next_batch_id(), false, Vec::new()),
        }
    }

    /// Use an explicit batch id
    pub fn id(mut self, batch_id: u64) -> Self {
        self.batch.batch_id = batch_id;
        self
    }

    pub fn atomic(mut self, atomic: bool) -> Self {
        self.batch.atomic = atomic;
        self
    }

    pub fn op(mut self, op: SceneOp) -> Self {
        self.batch.ops.push(op);
        self
    }

    pub fn ops(mut self, ops: impl IntoIterator<Item = SceneOp>) -> Self {
        self.batch.ops.extend(ops);
        self
    }

    pub fn build(self) -> SceneOpBatch {
        self.batch
    }
}

impl Default for SceneOpBatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_ids_are_unique() {
        let a = SceneOpBatchBuilder::new().build();
        let b = SceneOpBatchBuilder::new().build();
        assert_ne!(a.batch_id, b.batch_id);
    }

    #[test]
    fn test_builder() {
        let batch = SceneOpBatchBuilder::new()
            .id(77)
            .atomic(true)
            .op(SceneOp::create_node(1, "a", "Node"))
            .ops([SceneOp::queue_free(5), SceneOp::rename(6, "b")])
            .build();

        assert_eq!(batch.batch_id, 77);
        assert!(batch.atomic);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.ops[1], SceneOp::queue_free(5));
    }
}

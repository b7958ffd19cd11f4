//! Per-operation results and batch acknowledgements

use serde::{Deserialize, Serialize};
use void_scene::{NodeId, UNASSIGNED_ID};

/// Failure category of an operation, with stable wire ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum SceneOpError {
    #[default]
    None = 0,
    NotFound = 1,
    AlreadyExists = 2,
    Invalid = 3,
    Internal = 4,
}

impl SceneOpError {
    #[inline]
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1 => Some(Self::NotFound),
            2 => Some(Self::AlreadyExists),
            3 => Some(Self::Invalid),
            4 => Some(Self::Internal),
            _ => None,
        }
    }
}

/// Outcome of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneOpResult {
    pub target_id: NodeId,
    /// Id of the created node; only set for a successful `CreateNode`
    pub created_id: NodeId,
    pub ok: bool,
    pub error: SceneOpError,
    pub message: String,
}

impl SceneOpResult {
    pub fn ok(target_id: NodeId) -> Self {
        Self {
            target_id,
            created_id: UNASSIGNED_ID,
            ok: true,
            error: SceneOpError::None,
            message: String::new(),
        }
    }

    pub fn created(parent_id: NodeId, created_id: NodeId) -> Self {
        Self {
            created_id,
            ..Self::ok(parent_id)
        }
    }

    pub fn fail(target_id: NodeId, error: SceneOpError, message: impl Into<String>) -> Self {
        Self {
            target_id,
            created_id: UNASSIGNED_ID,
            ok: false,
            error,
            message: message.into(),
        }
    }
}

/// Acknowledgement of a whole batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneOpAck {
    pub batch_id: u64,
    /// Scene revision after the batch
    pub scene_revision: u64,
    /// One result per op, in input order
    pub results: Vec<SceneOpResult>,
}

impl SceneOpAck {
    pub fn new(batch_id: u64, scene_revision: u64, results: Vec<SceneOpResult>) -> Self {
        Self {
            batch_id,
            scene_revision,
            results,
        }
    }

    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }

    pub fn failed(&self) -> impl Iterator<Item = &SceneOpResult> {
        self.results.iter().filter(|r| !r.ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_ids() {
        for id in 0..5 {
            assert_eq!(SceneOpError::from_id(id).map(SceneOpError::id), Some(id));
        }
        assert_eq!(SceneOpError::from_id(5), None);
    }

    #[test]
    fn test_result_constructors() {
        let created = SceneOpResult::created(1, 42);
        assert!(created.ok);
        assert_eq!(created.target_id, 1);
        assert_eq!(created.created_id, 42);

        let failed = SceneOpResult::fail(7, SceneOpError::NotFound, "node not found");
        assert!(!failed.ok);
        assert_eq!(failed.created_id, 0);

        let ack = SceneOpAck::new(1, 2, vec![created, failed]);
        assert!(!ack.all_ok());
        assert_eq!(ack.failed().count(), 1);
    }
}

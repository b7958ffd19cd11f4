//! Op applicator - applies scene op batches to the engine
//!
//! The applicator is the bridge between the IR and the live scene tree.
//!
//! # Modes
//!
//! - **Non-atomic**: every op is validated against the live tree and applied
//!   on its own. A failed op does not stop the ops after it.
//! - **Atomic**: all ops are validated first against a working set that sees
//!   the effects of earlier ops in the batch. One failure rejects the whole
//!   batch before anything is touched.
//!
//! Either way the scene revision moves at most once per batch.

use void_ir::{validate_op, BatchValidator, SceneOp, SceneOpAck, SceneOpBatch, SceneOpError, SceneOpResult};
use void_scene::{NodeHandle, NodeId, NodeTypes, SceneError, TYPE_PROPERTY};

use crate::engine::SceneEngine;
use crate::transform::{is_transform_key, propagate};

/// Message given to ops that validated but belong to a rejected atomic batch
pub const ATOMIC_REJECTED: &str = "atomic batch rejected";

/// Outcome of one op
#[derive(Debug)]
struct Outcome {
    result: SceneOpResult,
    scene_changed: bool,
    derived_changed: bool,
}

impl Outcome {
    fn failed(result: SceneOpResult) -> Self {
        Self {
            result,
            scene_changed: false,
            derived_changed: false,
        }
    }

    fn changed(result: SceneOpResult, derived_changed: bool) -> Self {
        Self {
            result,
            scene_changed: true,
            derived_changed,
        }
    }
}

/// Counters across all batches seen by an applicator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub batches: u64,
    pub rejected_batches: u64,
    pub ops_applied: u64,
    pub ops_failed: u64,
}

/// Applies op batches to a [`SceneEngine`]
#[derive(Debug, Default)]
pub struct SceneOpApplier {
    stats: ApplyStats,
}

impl SceneOpApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ApplyStats {
        self.stats
    }

    /// Apply `batch` and acknowledge it with one result per op, in order.
    pub fn apply(&mut self, engine: &mut SceneEngine, batch: &SceneOpBatch) -> SceneOpAck {
        self.stats.batches += 1;

        if batch.atomic {
            if let Some(rejected) = validate_atomic(engine, &batch.ops) {
                self.stats.rejected_batches += 1;
                self.stats.ops_failed += batch.ops.len() as u64;
                log::debug!(
                    "Atomic batch {} rejected ({} ops)",
                    batch.batch_id,
                    batch.ops.len()
                );
                return SceneOpAck::new(batch.batch_id, engine.scene_revision(), rejected);
            }
        }

        let mut results = Vec::with_capacity(batch.ops.len());
        let mut scene_changed = false;
        let mut derived_changed = false;

        let ops = &batch.ops;
        let mut i = 0;
        while i < ops.len() {
            let (outcome, consumed) = match transform_group(engine, &ops[i..]) {
                Some((node, len)) => (apply_transform_group(engine, node, &ops[i..i + len]), len),
                None => (apply_op(engine, &ops[i], batch.atomic), 1),
            };

            if outcome.result.ok {
                self.stats.ops_applied += consumed as u64;
            } else {
                self.stats.ops_failed += consumed as u64;
            }
            scene_changed |= outcome.scene_changed;
            derived_changed |= outcome.derived_changed;
            for _ in 0..consumed {
                results.push(outcome.result.clone());
            }
            i += consumed;
        }

        if scene_changed {
            engine.bump_scene_revision();
        }
        if derived_changed {
            let revision = engine.bump_derived_revision();
            log::info!("SceneOp: CSG changed; csgRevision={}", revision);
        }

        log::debug!(
            "Applied batch {} ({} ops, {} failed, scene revision {})",
            batch.batch_id,
            results.len(),
            results.iter().filter(|r| !r.ok).count(),
            engine.scene_revision()
        );
        SceneOpAck::new(batch.batch_id, engine.scene_revision(), results)
    }
}

/// Validate a whole atomic batch. Returns the rejection results if any op
/// fails.
fn validate_atomic(engine: &SceneEngine, ops: &[SceneOp]) -> Option<Vec<SceneOpResult>> {
    let mut validator = BatchValidator::new(&engine.tree, &engine.types);
    let outcomes: Vec<_> = ops.iter().map(|op| validator.validate(op)).collect();
    if outcomes.iter().all(Result::is_ok) {
        return None;
    }

    let results = ops
        .iter()
        .zip(outcomes)
        .map(|(op, outcome)| match outcome {
            Ok(()) => SceneOpResult::fail(op.target_id(), SceneOpError::None, ATOMIC_REJECTED),
            Err(err) => err.to_result(op),
        })
        .collect();
    Some(results)
}

/// Validate `op` against the live tree, then apply it
fn apply_op(engine: &mut SceneEngine, op: &SceneOp, atomic: bool) -> Outcome {
    if let Err(err) = validate_op(&engine.tree, &engine.types, op) {
        if atomic {
            log::error!("Validated atomic op failed on apply: {:?}: {}", op, err);
            return Outcome::failed(SceneOpResult::fail(
                op.target_id(),
                SceneOpError::Internal,
                err.to_string(),
            ));
        }
        return Outcome::failed(err.to_result(op));
    }

    match mutate(engine, op) {
        Ok(outcome) => outcome,
        Err(err) => {
            log::error!("Scene op {:?} failed after validation: {}", op, err);
            Outcome::failed(SceneOpResult::fail(
                op.target_id(),
                SceneOpError::Internal,
                err.to_string(),
            ))
        }
    }
}

fn resolve(engine: &SceneEngine, id: NodeId) -> Result<NodeHandle, SceneError> {
    engine.tree.handle_of(id).ok_or(SceneError::NodeNotFound(id))
}

/// Perform a validated op
fn mutate(engine: &mut SceneEngine, op: &SceneOp) -> Result<Outcome, SceneError> {
    match op {
        SceneOp::CreateNode { parent_id, name, type_id } => {
            let parent = engine
                .tree
                .handle_of(*parent_id)
                .ok_or(SceneError::ParentNotFound(*parent_id))?;
            let child = engine.tree.create_node(name.clone());
            if let Some(node) = engine.tree.node_mut(child) {
                engine.types.apply_defaults(node, type_id);
            }
            if let Err(err) = engine.tree.add_child(parent, child) {
                let _ = engine.tree.destroy(child);
                return Err(err);
            }
            let derived = is_tracked(engine, child);
            let created = engine.tree.id_of(child);
            Ok(Outcome::changed(SceneOpResult::created(*parent_id, created), derived))
        }
        SceneOp::QueueFree { node_id } => {
            let node = resolve(engine, *node_id)?;
            let derived = engine.subtree_contains_tracked(node);
            engine.tree.queue_free(node)?;
            Ok(Outcome::changed(SceneOpResult::ok(*node_id), derived))
        }
        SceneOp::Rename { node_id, new_name } => {
            let node = resolve(engine, *node_id)?;
            if let Some(node) = engine.tree.node_mut(node) {
                node.set_name(new_name.clone());
            }
            Ok(Outcome::changed(SceneOpResult::ok(*node_id), false))
        }
        SceneOp::SetProperty { node_id, key, value } => {
            let node = resolve(engine, *node_id)?;
            let mut derived = affects_derived(engine, node, key);
            if engine.config().transform.propagate_to_children
                && is_transform_key(key)
                && propagate(&mut engine.tree, &engine.types, node, &[(key.as_str(), value.as_str())])
            {
                derived |= engine.subtree_contains_tracked(node);
            }
            if let Some(node) = engine.tree.node_mut(node) {
                node.set_property(key.clone(), value.clone());
            }
            Ok(Outcome::changed(SceneOpResult::ok(*node_id), derived))
        }
        SceneOp::RemoveProperty { node_id, key } => {
            let node = resolve(engine, *node_id)?;
            let derived = affects_derived(engine, node, key);
            if let Some(node) = engine.tree.node_mut(node) {
                node.remove_property(key);
            }
            Ok(Outcome::changed(SceneOpResult::ok(*node_id), derived))
        }
        SceneOp::Reparent { node_id, new_parent_id, index } => {
            let index = usize::try_from(*index).unwrap_or(0);
            engine.tree.reparent_by_id(*node_id, *new_parent_id, index)?;
            Ok(Outcome::changed(SceneOpResult::ok(*node_id), false))
        }
    }
}

fn is_tracked(engine: &SceneEngine, node: NodeHandle) -> bool {
    engine.type_of(node).as_deref() == Some(engine.config().derived_cache.tracked_type.as_str())
}

/// Whether writing `key` on `node` invalidates the derived cache
fn affects_derived(engine: &SceneEngine, node: NodeHandle, key: &str) -> bool {
    if key == TYPE_PROPERTY {
        return true;
    }
    engine.config().derived_cache.tracked_keys.contains(key) && is_tracked(engine, node)
}

/// Detect a run of at least two transform writes to the same node that has
/// children. Such a run is applied as one transform change so descendants
/// move once.
fn transform_group(engine: &SceneEngine, ops: &[SceneOp]) -> Option<(NodeHandle, usize)> {
    if !engine.config().transform.propagate_to_children {
        return None;
    }
    let SceneOp::SetProperty { node_id, key, .. } = ops.first()? else {
        return None;
    };
    if !is_transform_key(key) {
        return None;
    }
    let node = engine.tree.handle_of(*node_id)?;
    if engine.tree.node(node)?.children().is_empty() {
        return None;
    }

    let len = ops
        .iter()
        .take_while(|op| {
            matches!(op, SceneOp::SetProperty { node_id: id, key, .. } if id == node_id && is_transform_key(key))
        })
        .count();
    if len < 2 {
        return None;
    }

    let valid = ops[..len]
        .iter()
        .all(|op| validate_op(&engine.tree, &engine.types, op).is_ok());
    valid.then_some((node, len))
}

fn apply_transform_group(engine: &mut SceneEngine, node: NodeHandle, ops: &[SceneOp]) -> Outcome {
    let changes: Vec<(&str, &str)> = ops
        .iter()
        .filter_map(|op| match op {
            SceneOp::SetProperty { key, value, .. } => Some((key.as_str(), value.as_str())),
            _ => None,
        })
        .collect();

    let moved = propagate(&mut engine.tree, &engine.types, node, &changes);

    let mut derived = false;
    for (key, value) in &changes {
        if let Some(n) = engine.tree.node_mut(node) {
            n.set_property(*key, *value);
        }
        derived |= affects_derived(engine, node, key);
    }
    if moved {
        derived |= engine.subtree_contains_tracked(node);
    }

    let node_id = engine.tree.id_of(node);
    Outcome::changed(SceneOpResult::ok(node_id), derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_ir::SceneOpBatchBuilder;
    use void_scene::NodeSpec;

    fn engine() -> SceneEngine {
        let mut engine = SceneEngine::new();
        engine.load_specs(&[
            NodeSpec::new(10, 0, "level", "Node3D"),
            NodeSpec::new(11, 10, "wall", "CSGBlock"),
            NodeSpec::new(12, 0, "props", "Node"),
        ]);
        engine
    }

    #[test]
    fn test_create_reports_parent_and_child() {
        let mut engine = engine();
        let mut applier = SceneOpApplier::new();
        let batch = SceneOpBatch::new(1, false, vec![SceneOp::create_node(10, "block", "CSGBlock")]);

        let before = engine.derived_revision();
        let ack = applier.apply(&mut engine, &batch);
        let result = &ack.results[0];
        assert!(result.ok);
        assert_eq!(result.target_id, 10);
        assert!(result.created_id > 12);
        assert_eq!(engine.derived_revision(), before + 1);

        let handle = engine.tree().handle_of(result.created_id).unwrap();
        let node = engine.tree().node(handle).unwrap();
        assert_eq!(node.property("block"), Some("minecraft:stone"));
        assert_eq!(node.property(TYPE_PROPERTY), Some("CSGBlock"));
    }

    #[test]
    fn test_atomic_rejection_marks_every_op() {
        let mut engine = engine();
        let mut applier = SceneOpApplier::new();
        let batch = SceneOpBatchBuilder::new()
            .atomic(true)
            .op(SceneOp::rename(12, "things"))
            .op(SceneOp::queue_free(999))
            .build();

        let ack = applier.apply(&mut engine, &batch);
        assert_eq!(ack.results.len(), 2);
        assert!(ack.results.iter().all(|r| !r.ok));
        assert_eq!(ack.results[0].error, SceneOpError::None);
        assert_eq!(ack.results[0].message, ATOMIC_REJECTED);
        assert_eq!(ack.results[1].error, SceneOpError::NotFound);
        assert_eq!(ack.scene_revision, 1);

        let props = engine.tree().handle_of(12).unwrap();
        assert_eq!(engine.tree().node(props).unwrap().name(), "props");
        assert_eq!(applier.stats().rejected_batches, 1);
    }

    #[test]
    fn test_negative_reparent_index_inserts_first() {
        let mut engine = engine();
        let mut applier = SceneOpApplier::new();
        let batch = SceneOpBatch::new(1, false, vec![SceneOp::reparent(12, 10, -1)]);

        let ack = applier.apply(&mut engine, &batch);
        assert!(ack.all_ok());
        let level = engine.tree().handle_of(10).unwrap();
        let first = engine.tree().node(level).unwrap().children()[0];
        assert_eq!(engine.tree().id_of(first), 12);
    }

    #[test]
    fn test_type_change_always_touches_derived_cache() {
        let mut engine = engine();
        let mut applier = SceneOpApplier::new();
        let before = engine.derived_revision();

        applier.apply(&mut engine, &SceneOpBatch::new(1, false, vec![SceneOp::set_property(12, "foo", "bar")]));
        assert_eq!(engine.derived_revision(), before);

        applier.apply(
            &mut engine,
            &SceneOpBatch::new(2, false, vec![SceneOp::set_property(12, TYPE_PROPERTY, "CSGBlock")]),
        );
        assert_eq!(engine.derived_revision(), before + 1);
    }

    #[test]
    fn test_transform_group_moves_children_once() {
        let mut engine = engine();
        let mut applier = SceneOpApplier::new();
        let batch = SceneOpBatch::new(
            1,
            false,
            vec![SceneOp::set_property(10, "x", "3"), SceneOp::set_property(10, "y", "2")],
        );

        let before = engine.derived_revision();
        let ack = applier.apply(&mut engine, &batch);
        assert_eq!(ack.results.len(), 2);
        assert!(ack.all_ok());

        let wall = engine.tree().handle_of(11).unwrap();
        let wall = engine.tree().node(wall).unwrap();
        assert_eq!(wall.property("x"), Some("3"));
        assert_eq!(wall.property("y"), Some("2"));
        assert_eq!(engine.derived_revision(), before + 1);
    }

    #[test]
    fn test_propagation_can_be_disabled() {
        let mut config = crate::config::KernelConfig::default();
        config.transform.propagate_to_children = false;
        let mut engine = SceneEngine::with_config(config);
        engine.load_specs(&[
            NodeSpec::new(10, 0, "level", "Node3D"),
            NodeSpec::new(11, 10, "wall", "CSGBlock"),
        ]);

        let mut applier = SceneOpApplier::new();
        applier.apply(&mut engine, &SceneOpBatch::new(1, false, vec![SceneOp::set_property(10, "x", "3")]));

        let wall = engine.tree().handle_of(11).unwrap();
        assert_eq!(engine.tree().node(wall).unwrap().property("x"), Some("0"));
    }
}

//! Complete IR System Example
//!
//! This example demonstrates the scene op IR with:
//! - Building op batches
//! - Whole-batch validation against a scene tree
//! - Turning validation failures into acknowledgements
//! - Snapshots converted back into node specs

use void_ir::{
    BatchValidator, Message, NodeSnapshot, SceneOp, SceneOpAck, SceneOpBatchBuilder, SceneOpResult, SceneSnapshot,
    SnapshotProperty,
};
use void_scene::{NodeTypeRegistry, SceneTree};

fn main() {
    println!("=== Complete IR System Demo ===\n");

    // 1. Setup
    println!("1. Setting up a scene tree and type registry...");
    let mut tree = SceneTree::new();
    let types = NodeTypeRegistry::with_core_types();
    let root = tree.root();
    let level = tree.create_node("level");
    tree.add_child(root, level).expect("attach level");
    let level_id = tree.id_of(level);
    println!("   - Root #{} with child 'level' #{}\n", tree.id_of(root), level_id);

    // 2. Build a batch
    println!("2. Building an atomic batch...");
    let batch = SceneOpBatchBuilder::new()
        .atomic(true)
        .op(SceneOp::create_node(level_id, "crate", "CSGBlock"))
        .op(SceneOp::create_node(level_id, "crate", "CSGBlock"))
        .op(SceneOp::set_property(level_id, "x", "2.5"))
        .op(SceneOp::reparent(level_id, level_id, 0))
        .build();
    println!("   - Batch {} with {} ops\n", batch.batch_id, batch.len());

    // 3. Validate every op against the tree plus earlier ops in the batch
    println!("3. Validating...");
    let mut validator = BatchValidator::new(&tree, &types);
    let results: Vec<SceneOpResult> = batch
        .ops
        .iter()
        .map(|op| match validator.validate(op) {
            Ok(()) => SceneOpResult::ok(op.target_id()),
            Err(err) => {
                println!("   - {:?} rejected: {} ({:?})", op.kind(), err, err.kind());
                err.to_result(op)
            }
        })
        .collect();

    let ack = SceneOpAck::new(batch.batch_id, 0, results);
    println!("   - {} of {} ops failed\n", ack.failed().count(), ack.results.len());

    // 4. Messages
    println!("4. Wrapping in protocol messages...");
    for message in [Message::from(batch), Message::from(ack)] {
        println!("   - {:?}", message.message_type());
    }
    println!();

    // 5. Snapshot to specs
    println!("5. Converting a snapshot into node specs...");
    let snapshot = SceneSnapshot {
        request_id: 0,
        revision: 3,
        nodes: vec![
            NodeSnapshot {
                node_id: 1,
                parent_id: 0,
                name: "root".into(),
                type_id: "Node".into(),
                properties: Vec::new(),
            },
            NodeSnapshot {
                node_id: 5,
                parent_id: 1,
                name: "wall".into(),
                type_id: "CSGBlock".into(),
                properties: vec![SnapshotProperty::new("x", "4")],
            },
        ],
    };
    for spec in snapshot.to_node_specs() {
        println!("   - #{} '{}' [{}] under #{}", spec.id, spec.name, spec.type_id, spec.parent_id);
    }

    println!("\n=== Demo Complete ===");
}

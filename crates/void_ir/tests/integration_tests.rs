//! Integration tests for void_ir crate
//!
//! Tests op/message serialization and whole-batch validation against a tree

use void_ir::*;
use void_scene::{NodeTypeRegistry, SceneTree};

fn sample_batch() -> SceneOpBatch {
    SceneOpBatchBuilder::new()
        .id(12)
        .atomic(true)
        .op(SceneOp::create_node(1, "crate", "CSGBlock"))
        .op(SceneOp::set_property(2, "x", "1.5"))
        .op(SceneOp::remove_property(2, "block"))
        .op(SceneOp::rename(2, "box"))
        .op(SceneOp::reparent(2, 1, -1))
        .op(SceneOp::queue_free(2))
        .build()
}

#[test]
fn test_batch_serialization() {
    let batch = sample_batch();

    let json = serde_json::to_string(&batch).expect("Failed to serialize");
    let deserialized: SceneOpBatch = serde_json::from_str(&json).expect("Failed to deserialize");

    assert_eq!(deserialized, batch);
    assert_eq!(deserialized.ops[4], SceneOp::reparent(2, 1, -1));
}

#[test]
fn test_message_serialization() {
    let messages: Vec<Message> = vec![
        Hello { protocol_version: PROTOCOL_VERSION }.into(),
        Pong { nonce: u64::MAX }.into(),
        sample_batch().into(),
        SceneOpAck::new(12, 3, vec![SceneOpResult::created(1, 5)]).into(),
        SceneList {
            scenes: vec![SceneInfo::new("lobby", "Lobby")],
            active_scene_id: "lobby".into(),
        }
        .into(),
    ];

    for message in messages {
        let json = serde_json::to_string(&message).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
        assert_eq!(back.message_type(), message.message_type());
    }
}

#[test]
fn test_whole_batch_validation_sees_earlier_ops() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let level = tree.create_node("level");
    tree.add_child(root, level).unwrap();
    let level_id = tree.id_of(level);
    let types = NodeTypeRegistry::with_core_types();

    let batch = SceneOpBatchBuilder::new()
        .atomic(true)
        .op(SceneOp::create_node(1, "player", "Node3D"))
        .op(SceneOp::create_node(1, "player", "Node3D"))
        .op(SceneOp::queue_free(level_id))
        .op(SceneOp::set_property(level_id, "x", "1"))
        .build();

    let mut validator = BatchValidator::new(&tree, &types);
    let outcomes: Vec<_> = batch.ops.iter().map(|op| validator.validate(op)).collect();

    assert!(outcomes[0].is_ok());
    assert_eq!(outcomes[1], Err(ValidationError::ChildExists("player".into())));
    assert!(outcomes[2].is_ok());
    assert_eq!(outcomes[3], Err(ValidationError::NodeNotFound(level_id)));

    // validation never mutates the tree
    assert_eq!(tree.node(root).unwrap().children(), &[level]);
}

#[test]
fn test_single_op_validation_uses_live_state_only() {
    let tree = SceneTree::new();
    let types = NodeTypeRegistry::new();

    // without a working set the same create passes twice
    let op = SceneOp::create_node(1, "twin", "Node");
    assert!(validate_op(&tree, &types, &op).is_ok());
    assert!(validate_op(&tree, &types, &op).is_ok());

    let err = validate_op(&tree, &types, &SceneOp::queue_free(1)).unwrap_err();
    let result = err.to_result(&SceneOp::queue_free(1));
    assert!(!result.ok);
    assert_eq!(result.error, SceneOpError::Invalid);
    assert_eq!(result.message, "cannot free root");
}

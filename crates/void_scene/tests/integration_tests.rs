//! Integration tests for void_scene
//!
//! Tests traversal stability under hook-driven mutation, deferred drain
//! semantics and scene loading through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use void_scene::*;

/// On its first tick, adds spares to its parent, frees its siblings and
/// moves itself under the root.
struct Churn {
    spare: Vec<NodeHandle>,
    fired: bool,
}

impl NodeBehavior for Churn {
    fn on_process(&mut self, tree: &mut SceneTree, node: NodeHandle, _dt: f64) {
        if self.fired {
            return;
        }
        self.fired = true;
        let parent = tree.node(node).and_then(Node::parent).unwrap();
        for spare in self.spare.drain(..) {
            tree.add_child(parent, spare).unwrap();
        }
        let siblings: Vec<_> = tree.node(parent).unwrap().children().to_vec();
        for sibling in siblings {
            if sibling != node {
                tree.queue_free(sibling).unwrap();
            }
        }
        tree.reparent(node, tree.root(), 0).unwrap();
    }
}

struct Visit {
    label: String,
    seen: Rc<RefCell<Vec<String>>>,
}

impl NodeBehavior for Visit {
    fn on_process(&mut self, _tree: &mut SceneTree, _node: NodeHandle, _dt: f64) {
        self.seen.borrow_mut().push(self.label.clone());
    }
}

#[test]
fn test_traversal_unaffected_by_requests_from_hooks() {
    let seen: Rc<RefCell<Vec<String>>> = Rc::default();
    let mut tree = SceneTree::new();
    let group = tree.create_node("group");
    tree.add_child(tree.root(), group).unwrap();

    let spares: Vec<_> = (0..3)
        .map(|i| {
            tree.create_node_with(
                format!("spare{i}"),
                Box::new(Visit { label: format!("spare{i}"), seen: seen.clone() }),
            )
        })
        .collect();
    let churn = tree.create_node_with("churn", Box::new(Churn { spare: spares, fired: false }));
    tree.add_child(group, churn).unwrap();
    for i in 0..3 {
        let sibling = tree.create_node_with(
            format!("sibling{i}"),
            Box::new(Visit { label: format!("sibling{i}"), seen: seen.clone() }),
        );
        tree.add_child(group, sibling).unwrap();
    }

    tree.tick(0.016).unwrap();

    // all original siblings were walked, none of the spares were
    assert_eq!(*seen.borrow(), vec!["sibling0", "sibling1", "sibling2"]);

    // requests were applied afterwards in FIFO order
    let root_children: Vec<_> = tree
        .node(tree.root())
        .unwrap()
        .children()
        .iter()
        .map(|h| tree.node(*h).unwrap().name().to_string())
        .collect();
    assert_eq!(root_children, vec!["churn", "group"]);
    let group_children: Vec<_> = tree
        .node(group)
        .unwrap()
        .children()
        .iter()
        .map(|h| tree.node(*h).unwrap().name().to_string())
        .collect();
    assert_eq!(group_children, vec!["spare0", "spare1", "spare2"]);
    assert_eq!(tree.registered_count(), 6);

    seen.borrow_mut().clear();
    tree.tick(0.016).unwrap();
    assert_eq!(*seen.borrow(), vec!["spare0", "spare1", "spare2"]);
}

#[test]
fn test_requests_outside_tick_apply_immediately() {
    let mut tree = SceneTree::new();
    let a = tree.create_node("a");
    tree.add_child(tree.root(), a).unwrap();
    assert_eq!(tree.pending_deferred(), 0);
    assert!(tree.node(a).unwrap().is_inside_tree());
}

#[test]
fn test_load_then_tick() {
    let registry = NodeTypeRegistry::with_core_types();
    let mut tree = SceneTree::new();
    let specs = vec![
        NodeSpec::new(2, 0, "world", "WorldEnvironment"),
        NodeSpec::new(3, 0, "blocks", "Node3D"),
        NodeSpec::new(4, 3, "floor", "CSGBlock").with_property("sx", "16"),
    ];
    assert_eq!(replace_root_children(&mut tree, &specs, &registry), 3);
    tree.tick(0.016).unwrap();

    let floor = tree.get_node_at("/root/blocks/floor").unwrap();
    let node = tree.node(floor).unwrap();
    assert!(node.is_ready());
    assert_eq!(registry.type_id_for(node), "CSGBlock");
    assert_eq!(tree.path(floor).as_deref(), Some("/root/blocks/floor"));

    // loading again replaces everything
    let specs = vec![NodeSpec::new(9, 0, "only", "Node")];
    assert_eq!(replace_root_children(&mut tree, &specs, &registry), 1);
    assert!(tree.handle_of(4).is_none());
    assert_eq!(tree.registered_count(), 2);
}

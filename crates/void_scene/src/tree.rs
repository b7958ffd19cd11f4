//! SceneTree - owner of a node hierarchy
//!
//! The tree owns the node arena, the root, the id registry and the deferred
//! operation queue. While [`SceneTree::tick`] walks the hierarchy, structural
//! requests (add, remove, reparent, free) against attached nodes are queued
//! instead of applied, and the walk iterates a copy of each child list.
//! After the walk the queue is drained in FIFO passes:
//!
//! ```text
//! tick(dt)
//!   ├─ processing = true
//!   ├─ walk(root): on_ready (once) → on_process → walk(copy of children)
//!   ├─ processing = false
//!   └─ drain: take queue → apply each → repeat until empty (≤ max passes)
//! ```
//!
//! Requests issued by hooks during the drain land in the next pass, so a
//! cascade that never settles surfaces as [`SceneError::DeferredOverflow`].

use std::collections::{HashMap, HashSet};

use crate::arena::{NodeArena, NodeHandle};
use crate::error::{SceneError, SceneResult};
use crate::node::{Node, NodeBehavior, NodeId, UNASSIGNED_ID};
use crate::path::{NodePath, PathSegment};

/// Default name of the root node
pub const DEFAULT_ROOT_NAME: &str = "root";

/// Default ceiling on deferred drain passes per tick
pub const DEFAULT_MAX_DEFERRED_PASSES: usize = 1000;

/// Scene tree configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneTreeConfig {
    /// Name given to the root node
    pub root_name: String,
    /// Maximum number of drain passes before a tick fails
    pub max_deferred_passes: usize,
}

impl Default for SceneTreeConfig {
    fn default() -> Self {
        Self {
            root_name: DEFAULT_ROOT_NAME.to_string(),
            max_deferred_passes: DEFAULT_MAX_DEFERRED_PASSES,
        }
    }
}

/// A structural request captured during traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeferredOp {
    AddChild { parent: NodeHandle, child: NodeHandle },
    RemoveChild { parent: NodeHandle, child: NodeHandle },
    Reparent { node: NodeHandle, new_parent: NodeHandle, index: usize },
    Free { node: NodeHandle },
}

/// A node hierarchy with id registry and deferred mutation
pub struct SceneTree {
    arena: NodeArena,
    root: NodeHandle,
    registry: HashMap<NodeId, NodeHandle>,
    next_id: NodeId,
    processing: bool,
    draining: bool,
    deferred: Vec<DeferredOp>,
    config: SceneTreeConfig,
}

impl SceneTree {
    /// Create a tree with a plain root node and default configuration
    pub fn new() -> Self {
        Self::with_config(SceneTreeConfig::default())
    }

    pub fn with_config(config: SceneTreeConfig) -> Self {
        let root = Node::new(config.root_name.clone());
        Self::with_root(root, config)
    }

    /// Create a tree around `root`. The root enters the tree immediately.
    pub fn with_root(root: Node, config: SceneTreeConfig) -> Self {
        let mut arena = NodeArena::new();
        let root = arena.insert(root);
        let mut tree = Self {
            arena,
            root,
            registry: HashMap::new(),
            next_id: 1,
            processing: false,
            draining: false,
            deferred: Vec::new(),
            config,
        };
        tree.enter_tree(root);
        tree
    }

    #[inline]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    pub fn config(&self) -> &SceneTreeConfig {
        &self.config
    }

    /// Whether the tree is currently walking nodes in [`tick`](Self::tick)
    #[inline]
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Number of queued structural requests
    pub fn pending_deferred(&self) -> usize {
        self.deferred.len()
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.arena.get(handle)
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.arena.get_mut(handle)
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.arena.contains(handle)
    }

    /// Number of registered (attached) nodes
    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of stored nodes, attached or detached
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Look up an attached node by id
    pub fn handle_of(&self, id: NodeId) -> Option<NodeHandle> {
        self.registry.get(&id).copied()
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.handle_of(id).and_then(|handle| self.arena.get(handle))
    }

    /// Id of a node, `0` if unregistered or the handle is stale
    pub fn id_of(&self, handle: NodeHandle) -> NodeId {
        self.arena.get(handle).map_or(UNASSIGNED_ID, Node::id)
    }

    /// Store a detached node and return its handle
    pub fn insert(&mut self, node: Node) -> NodeHandle {
        self.arena.insert(node)
    }

    /// Store a new detached node named `name`
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeHandle {
        self.arena.insert(Node::new(name))
    }

    /// Store a new detached node driven by `behavior`
    pub fn create_node_with(
        &mut self,
        name: impl Into<String>,
        behavior: Box<dyn NodeBehavior>,
    ) -> NodeHandle {
        self.arena.insert(Node::with_behavior(name, behavior))
    }

    /// Release the storage of a detached subtree
    ///
    /// # Errors
    ///
    /// Fails if the node is still linked to a parent or inside the tree.
    pub fn destroy(&mut self, handle: NodeHandle) -> SceneResult {
        let node = self.arena.get(handle).ok_or(SceneError::InvalidHandle(handle))?;
        if node.in_tree {
            return Err(SceneError::AlreadyInTree(node.name().to_string()));
        }
        if node.parent.is_some() {
            return Err(SceneError::AlreadyHasParent(node.name().to_string()));
        }
        for handle in self.subtree(handle) {
            self.arena.remove(handle);
        }
        Ok(())
    }

    /// Depth-first pre-order listing of `handle` and its descendants
    pub fn subtree(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            let Some(node) = self.arena.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = Some(node);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.arena.get(handle).and_then(Node::parent);
        }
        false
    }

    pub fn find_child(&self, parent: NodeHandle, name: &str) -> Option<NodeHandle> {
        let node = self.arena.get(parent)?;
        node.children
            .iter()
            .copied()
            .find(|child| self.arena.get(*child).is_some_and(|c| c.name() == name))
    }

    /// Slash-delimited path from the topmost ancestor, e.g. `/root/level/player`
    pub fn path(&self, handle: NodeHandle) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            let node = self.arena.get(h)?;
            names.push(node.name());
            current = node.parent;
        }
        let mut path = String::new();
        for name in names.iter().rev() {
            path.push('/');
            path.push_str(name);
        }
        Some(path)
    }

    /// Resolve `path` relative to `from`, or from the root if it is absolute.
    ///
    /// Returns `None` when `from` is not inside the tree or any segment fails
    /// to resolve.
    pub fn get_node(&self, from: NodeHandle, path: &str) -> Option<NodeHandle> {
        if !self.arena.get(from)?.in_tree {
            return None;
        }
        let path = NodePath::parse(path);
        if path.is_absolute() {
            return self.resolve_from_root(&path);
        }
        self.resolve(from, path.segments())
    }

    /// Resolve `path` from the root. An absolute path must start with the
    /// root's name.
    pub fn get_node_at(&self, path: &str) -> Option<NodeHandle> {
        self.resolve_from_root(&NodePath::parse(path))
    }

    fn resolve_from_root(&self, path: &NodePath) -> Option<NodeHandle> {
        if !path.is_absolute() {
            return self.resolve(self.root, path.segments());
        }
        let Some(first) = path.parts().first() else {
            return Some(self.root);
        };
        if self.arena.get(self.root)?.name() != first {
            return None;
        }
        self.resolve(self.root, path.segments().skip(1))
    }

    fn resolve<'a>(
        &self,
        from: NodeHandle,
        segments: impl Iterator<Item = PathSegment<'a>>,
    ) -> Option<NodeHandle> {
        let mut current = from;
        for segment in segments {
            current = match segment {
                PathSegment::Current => current,
                PathSegment::Parent => self.arena.get(current)?.parent?,
                PathSegment::Child(name) => self.find_child(current, name)?,
            };
        }
        Some(current)
    }

    // ------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------

    #[inline]
    fn should_defer(&self) -> bool {
        self.processing || self.draining
    }

    fn attached(&self, handle: NodeHandle) -> SceneResult<bool> {
        self.arena
            .get(handle)
            .map(|node| node.in_tree)
            .ok_or(SceneError::InvalidHandle(handle))
    }

    /// Append `child` to `parent`'s children.
    ///
    /// Deferred while the tree is ticking and `parent` is inside the tree.
    /// Otherwise the child and its descendants are registered and receive
    /// `on_enter_tree` top-down.
    ///
    /// # Errors
    ///
    /// Fails if the child already has a parent, is already in a tree, would
    /// become its own ancestor, or carries an id already registered to
    /// another node.
    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> SceneResult {
        if !self.arena.contains(child) {
            return Err(SceneError::InvalidHandle(child));
        }
        if self.attached(parent)? && self.should_defer() {
            self.deferred.push(DeferredOp::AddChild { parent, child });
            return Ok(());
        }
        self.add_child_immediate(parent, child)
    }

    pub(crate) fn add_child_immediate(&mut self, parent: NodeHandle, child: NodeHandle) -> SceneResult {
        let child_node = self.arena.get(child).ok_or(SceneError::InvalidHandle(child))?;
        if child_node.parent.is_some() {
            return Err(SceneError::AlreadyHasParent(child_node.name().to_string()));
        }
        if child_node.in_tree {
            return Err(SceneError::AlreadyInTree(child_node.name().to_string()));
        }
        let parent_in_tree = self.attached(parent)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneError::Cycle);
        }
        if parent_in_tree {
            self.check_ids_free(child)?;
            self.assign_ids(child)?;
        }

        if let Some(node) = self.arena.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.arena.get_mut(parent) {
            node.children.push(child);
        }
        if parent_in_tree {
            self.enter_tree(child);
        }
        Ok(())
    }

    /// Unlink `child` from `parent`. The child is kept as a detached node.
    ///
    /// Deferred while the tree is ticking and `parent` is inside the tree.
    /// Otherwise the child subtree exits the tree children-first, ids are
    /// unregistered and `ready` flags reset.
    pub fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> SceneResult {
        if !self.arena.contains(child) {
            return Err(SceneError::InvalidHandle(child));
        }
        if self.attached(parent)? && self.should_defer() {
            self.deferred.push(DeferredOp::RemoveChild { parent, child });
            return Ok(());
        }
        self.remove_child_immediate(parent, child)
    }

    fn remove_child_immediate(&mut self, parent: NodeHandle, child: NodeHandle) -> SceneResult {
        let child_node = self.arena.get(child).ok_or(SceneError::InvalidHandle(child))?;
        if child_node.parent != Some(parent) {
            return Err(SceneError::NotAChild(child_node.name().to_string()));
        }
        let child_in_tree = child_node.in_tree;

        let parent_node = self.arena.get_mut(parent).ok_or(SceneError::InvalidHandle(parent))?;
        if let Some(pos) = parent_node.children.iter().position(|c| *c == child) {
            parent_node.children.remove(pos);
        }
        if child_in_tree {
            self.exit_tree(child);
        }
        if let Some(node) = self.arena.get_mut(child) {
            node.parent = None;
        }
        Ok(())
    }

    /// Detach `node` from its parent and release its subtree.
    ///
    /// Deferred while the tree is ticking and the node is inside the tree.
    pub fn queue_free(&mut self, node: NodeHandle) -> SceneResult {
        if node == self.root {
            return Err(SceneError::IsRoot);
        }
        if self.attached(node)? && self.should_defer() {
            self.deferred.push(DeferredOp::Free { node });
            return Ok(());
        }
        self.free_immediate(node)
    }

    pub(crate) fn free_immediate(&mut self, node: NodeHandle) -> SceneResult {
        if node == self.root {
            return Err(SceneError::IsRoot);
        }
        let parent = self
            .arena
            .get(node)
            .ok_or(SceneError::InvalidHandle(node))?
            .parent;
        if let Some(parent) = parent {
            self.remove_child_immediate(parent, node)?;
        }
        self.destroy(node)
    }

    /// Move `node` under `new_parent` at `index` (clamped to the child count).
    ///
    /// # Errors
    ///
    /// Fails if the node is the root or has no parent, or if `new_parent` is
    /// the node itself or one of its descendants.
    pub fn reparent(&mut self, node: NodeHandle, new_parent: NodeHandle, index: usize) -> SceneResult {
        self.check_reparent(node, new_parent)?;
        if self.should_defer() {
            self.deferred.push(DeferredOp::Reparent { node, new_parent, index });
            return Ok(());
        }
        self.reparent_immediate(node, new_parent, index)
    }

    /// [`reparent`](Self::reparent) addressed by registered ids
    pub fn reparent_by_id(&mut self, node_id: NodeId, new_parent_id: NodeId, index: usize) -> SceneResult {
        let node = self.handle_of(node_id).ok_or(SceneError::NodeNotFound(node_id))?;
        let new_parent = self
            .handle_of(new_parent_id)
            .ok_or(SceneError::ParentNotFound(new_parent_id))?;
        self.reparent(node, new_parent, index)
    }

    fn check_reparent(&self, node: NodeHandle, new_parent: NodeHandle) -> SceneResult {
        if node == self.root {
            return Err(SceneError::IsRoot);
        }
        let current = self.arena.get(node).ok_or(SceneError::InvalidHandle(node))?;
        if current.parent.is_none() {
            return Err(SceneError::NoParent(current.name().to_string()));
        }
        if !self.arena.contains(new_parent) {
            return Err(SceneError::InvalidHandle(new_parent));
        }
        if self.is_ancestor_or_self(node, new_parent) {
            return Err(SceneError::Cycle);
        }
        Ok(())
    }

    fn reparent_immediate(&mut self, node: NodeHandle, new_parent: NodeHandle, index: usize) -> SceneResult {
        self.check_reparent(node, new_parent)?;
        let node_in_tree = self.attached(node)?;
        let target_in_tree = self.attached(new_parent)?;
        if !node_in_tree && target_in_tree {
            self.check_ids_free(node)?;
            self.assign_ids(node)?;
        }

        let old_parent = self.arena.get(node).and_then(Node::parent);
        if let Some(old) = old_parent.and_then(|h| self.arena.get_mut(h)) {
            if let Some(pos) = old.children.iter().position(|c| *c == node) {
                old.children.remove(pos);
            }
        }
        if let Some(target) = self.arena.get_mut(new_parent) {
            let clamped = index.min(target.children.len());
            target.children.insert(clamped, node);
        }
        if let Some(moved) = self.arena.get_mut(node) {
            moved.parent = Some(new_parent);
        }

        if node_in_tree && !target_in_tree {
            self.exit_tree(node);
        } else if !node_in_tree && target_in_tree {
            self.enter_tree(node);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Registration and lifecycle
    // ------------------------------------------------------------------

    /// Reject a subtree whose ids collide with each other or with ids
    /// registered to other nodes.
    fn check_ids_free(&self, handle: NodeHandle) -> SceneResult {
        let mut seen = HashSet::new();
        for h in self.subtree(handle) {
            let id = self.id_of(h);
            if id == UNASSIGNED_ID {
                continue;
            }
            if !seen.insert(id) {
                return Err(SceneError::DuplicateId(id));
            }
            if self.registry.get(&id).is_some_and(|other| *other != h) {
                return Err(SceneError::DuplicateId(id));
            }
        }
        Ok(())
    }

    /// Give every unassigned node under `handle` a fresh id ahead of
    /// registration, so exhaustion surfaces before any node enters the tree.
    fn assign_ids(&mut self, handle: NodeHandle) -> SceneResult {
        let subtree = self.subtree(handle);
        let explicit: HashSet<NodeId> = subtree
            .iter()
            .map(|h| self.id_of(*h))
            .filter(|id| *id != UNASSIGNED_ID)
            .collect();
        for h in subtree {
            if self.id_of(h) != UNASSIGNED_ID {
                continue;
            }
            let id = self.allocate_id(&explicit)?;
            if let Some(node) = self.arena.get_mut(h) {
                node.id = id;
            }
        }
        Ok(())
    }

    /// Next id that is neither registered nor in `reserved`. Wraps to 1
    /// once past `NodeId::MAX`.
    fn allocate_id(&mut self, reserved: &HashSet<NodeId>) -> SceneResult<NodeId> {
        let mut wrapped = false;
        loop {
            let id = self.next_id;
            self.next_id = match id.checked_add(1) {
                Some(next) => next,
                None if wrapped => return Err(SceneError::IdsExhausted),
                None => {
                    wrapped = true;
                    1
                }
            };
            if id != UNASSIGNED_ID && !self.registry.contains_key(&id) && !reserved.contains(&id) {
                return Ok(id);
            }
        }
    }

    fn register(&mut self, handle: NodeHandle) {
        let mut id = self.id_of(handle);
        if id == UNASSIGNED_ID {
            // attached by a hook to a node that had not entered yet
            id = match self.allocate_id(&HashSet::new()) {
                Ok(id) => id,
                Err(err) => {
                    log::error!("Node left unregistered: {}", err);
                    return;
                }
            };
        } else if id >= self.next_id {
            self.next_id = id.saturating_add(1);
        }
        if let Some(node) = self.arena.get_mut(handle) {
            node.id = id;
            self.registry.insert(id, handle);
        }
    }

    fn unregister(&mut self, handle: NodeHandle) {
        let id = self.id_of(handle);
        if id != UNASSIGNED_ID && self.registry.get(&id) == Some(&handle) {
            self.registry.remove(&id);
        }
    }

    fn enter_tree(&mut self, handle: NodeHandle) {
        self.register(handle);
        if let Some(node) = self.arena.get_mut(handle) {
            node.in_tree = true;
        }
        self.call_hook(handle, |behavior, tree| behavior.on_enter_tree(tree, handle));

        let children = self.children_of(handle);
        for child in children {
            let pending = self
                .arena
                .get(child)
                .is_some_and(|c| !c.in_tree && c.parent == Some(handle));
            if pending {
                self.enter_tree(child);
            }
        }
    }

    fn exit_tree(&mut self, handle: NodeHandle) {
        let children = self.children_of(handle);
        for child in children {
            if self.arena.get(child).is_some_and(|c| c.in_tree) {
                self.exit_tree(child);
            }
        }
        self.call_hook(handle, |behavior, tree| behavior.on_exit_tree(tree, handle));
        self.unregister(handle);
        if let Some(node) = self.arena.get_mut(handle) {
            node.in_tree = false;
            node.ready_called = false;
        }
    }

    fn children_of(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        self.arena
            .get(handle)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    /// Run a hook with the behavior temporarily taken out of its node, so the
    /// hook can borrow the tree mutably.
    fn call_hook(&mut self, handle: NodeHandle, hook: impl FnOnce(&mut dyn NodeBehavior, &mut SceneTree)) {
        let Some(mut behavior) = self.arena.get_mut(handle).and_then(|node| node.behavior.take()) else {
            return;
        };
        hook(behavior.as_mut(), self);
        if let Some(node) = self.arena.get_mut(handle) {
            if node.behavior.is_none() {
                node.behavior = Some(behavior);
            }
        }
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Walk the tree invoking `on_ready` (once) and `on_process`, then drain
    /// the deferred queue.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DeferredOverflow`] if the queue is still
    /// refilling after `max_deferred_passes` drain passes. Remaining requests
    /// are dropped.
    pub fn tick(&mut self, dt: f64) -> SceneResult {
        self.processing = true;
        self.process_node(self.root, dt);
        self.processing = false;
        self.flush_deferred()
    }

    fn process_node(&mut self, handle: NodeHandle, dt: f64) {
        let Some(node) = self.arena.get_mut(handle) else {
            return;
        };
        if !node.in_tree {
            return;
        }
        if !node.ready_called {
            node.ready_called = true;
            self.call_hook(handle, |behavior, tree| behavior.on_ready(tree, handle));
        }
        self.call_hook(handle, |behavior, tree| behavior.on_process(tree, handle, dt));

        for child in self.children_of(handle) {
            self.process_node(child, dt);
        }
    }

    fn flush_deferred(&mut self) -> SceneResult {
        let max_passes = self.config.max_deferred_passes;
        let mut passes = 0;
        self.draining = true;
        while !self.deferred.is_empty() {
            passes += 1;
            if passes > max_passes {
                self.draining = false;
                let dropped = self.deferred.len();
                self.deferred.clear();
                log::error!(
                    "Deferred ops did not stabilize after {} passes; dropped {} pending ops",
                    max_passes,
                    dropped
                );
                return Err(SceneError::DeferredOverflow(max_passes));
            }
            let ops = std::mem::take(&mut self.deferred);
            for op in ops {
                if let Err(err) = self.apply_deferred(op) {
                    log::warn!("Skipping deferred {:?}: {}", op, err);
                }
            }
        }
        self.draining = false;
        Ok(())
    }

    fn apply_deferred(&mut self, op: DeferredOp) -> SceneResult {
        match op {
            DeferredOp::AddChild { parent, child } => self.add_child_immediate(parent, child),
            DeferredOp::RemoveChild { parent, child } => self.remove_child_immediate(parent, child),
            DeferredOp::Reparent { node, new_parent, index } => self.reparent_immediate(node, new_parent, index),
            DeferredOp::Free { node } => self.free_immediate(node),
        }
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SceneTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneTree")
            .field("root", &self.root)
            .field("registered", &self.registry.len())
            .field("next_id", &self.next_id)
            .field("processing", &self.processing)
            .field("pending_deferred", &self.deferred.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        label: &'static str,
        log: Log,
    }

    impl NodeBehavior for Recorder {
        fn on_enter_tree(&mut self, _tree: &mut SceneTree, _node: NodeHandle) {
            self.log.borrow_mut().push(format!("enter:{}", self.label));
        }

        fn on_ready(&mut self, _tree: &mut SceneTree, _node: NodeHandle) {
            self.log.borrow_mut().push(format!("ready:{}", self.label));
        }

        fn on_process(&mut self, _tree: &mut SceneTree, _node: NodeHandle, _dt: f64) {
            self.log.borrow_mut().push(format!("process:{}", self.label));
        }

        fn on_exit_tree(&mut self, _tree: &mut SceneTree, _node: NodeHandle) {
            self.log.borrow_mut().push(format!("exit:{}", self.label));
        }
    }

    fn recorder(tree: &mut SceneTree, label: &'static str, log: &Log) -> NodeHandle {
        tree.create_node_with(label, Box::new(Recorder { label, log: log.clone() }))
    }

    #[test]
    fn test_root_is_registered() {
        let tree = SceneTree::new();
        let root = tree.node(tree.root()).unwrap();
        assert_eq!(root.id(), 1);
        assert_eq!(root.name(), DEFAULT_ROOT_NAME);
        assert!(root.is_inside_tree());
        assert_eq!(tree.handle_of(1), Some(tree.root()));
    }

    #[test]
    fn test_add_child_assigns_ids_recursively() {
        let mut tree = SceneTree::new();
        let a = tree.create_node("a");
        let b = tree.create_node("b");
        tree.add_child(a, b).unwrap();

        // detached parent: nothing registered yet
        assert_eq!(tree.id_of(b), 0);

        tree.add_child(tree.root(), a).unwrap();
        assert_eq!(tree.id_of(a), 2);
        assert_eq!(tree.id_of(b), 3);
        assert!(tree.node(b).unwrap().is_inside_tree());
        assert_eq!(tree.registered_count(), 3);
    }

    #[test]
    fn test_add_child_rejects_attached_child() {
        let mut tree = SceneTree::new();
        let a = tree.create_node("a");
        let b = tree.create_node("b");
        tree.add_child(tree.root(), a).unwrap();
        tree.add_child(tree.root(), b).unwrap();

        assert!(matches!(tree.add_child(a, b), Err(SceneError::AlreadyHasParent(_))));
        assert!(matches!(tree.add_child(a, tree.root()), Err(SceneError::AlreadyInTree(_))));
    }

    #[test]
    fn test_add_child_rejects_cycle() {
        let mut tree = SceneTree::new();
        let a = tree.create_node("a");
        let b = tree.create_node("b");
        tree.add_child(a, b).unwrap();
        assert_eq!(tree.add_child(b, a), Err(SceneError::Cycle));
        assert_eq!(tree.add_child(a, a), Err(SceneError::Cycle));
    }

    #[test]
    fn test_enter_and_exit_order() {
        let log: Log = Rc::default();
        let mut tree = SceneTree::new();
        let parent = recorder(&mut tree, "parent", &log);
        let child = recorder(&mut tree, "child", &log);
        tree.add_child(parent, child).unwrap();

        tree.add_child(tree.root(), parent).unwrap();
        tree.remove_child(tree.root(), parent).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["enter:parent", "enter:child", "exit:child", "exit:parent"]
        );
        assert!(tree.node(parent).unwrap().parent().is_none());
        assert!(!tree.node(child).unwrap().is_inside_tree());
        // child stays linked to its detached parent
        assert_eq!(tree.node(child).unwrap().parent(), Some(parent));
    }

    #[test]
    fn test_id_persists_across_reattach() {
        let mut tree = SceneTree::new();
        let a = tree.create_node("a");
        tree.add_child(tree.root(), a).unwrap();
        let id = tree.id_of(a);

        tree.remove_child(tree.root(), a).unwrap();
        assert!(tree.handle_of(id).is_none());
        assert_eq!(tree.id_of(a), id);

        tree.add_child(tree.root(), a).unwrap();
        assert_eq!(tree.id_of(a), id);
        assert_eq!(tree.handle_of(id), Some(a));
    }

    #[test]
    fn test_ready_replays_after_reattach() {
        let log: Log = Rc::default();
        let mut tree = SceneTree::new();
        let a = recorder(&mut tree, "a", &log);
        tree.add_child(tree.root(), a).unwrap();
        tree.tick(0.016).unwrap();
        tree.tick(0.016).unwrap();
        tree.remove_child(tree.root(), a).unwrap();
        tree.add_child(tree.root(), a).unwrap();
        tree.tick(0.016).unwrap();

        let ready_count = log.borrow().iter().filter(|e| *e == "ready:a").count();
        assert_eq!(ready_count, 2);
    }

    #[test]
    fn test_duplicate_id_rejected_without_partial_state() {
        let mut tree = SceneTree::new();
        let a = tree.create_node("a");
        tree.add_child(tree.root(), a).unwrap();
        let id = tree.id_of(a);

        let clone = tree.create_node("clone");
        tree.node_mut(clone).unwrap().id = id;
        assert_eq!(tree.add_child(tree.root(), clone), Err(SceneError::DuplicateId(id)));
        assert!(tree.node(clone).unwrap().parent().is_none());
        assert_eq!(tree.node(tree.root()).unwrap().children(), &[a]);
        assert_eq!(tree.handle_of(id), Some(a));
    }

    #[test]
    fn test_stale_unregister_keeps_mapping() {
        let mut tree = SceneTree::new();
        let a = tree.create_node("a");
        tree.add_child(tree.root(), a).unwrap();
        let id = tree.id_of(a);
        tree.remove_child(tree.root(), a).unwrap();

        // another node now owns the id
        let b = tree.create_node("b");
        tree.node_mut(b).unwrap().id = id;
        tree.add_child(tree.root(), b).unwrap();
        assert_eq!(tree.handle_of(id), Some(b));

        // removing a node that doesn't own the mapping leaves it intact
        tree.unregister(a);
        assert_eq!(tree.handle_of(id), Some(b));
    }

    #[test]
    fn test_max_id_does_not_overflow_allocator() {
        let mut tree = SceneTree::new();
        let big = tree.create_node("big");
        tree.node_mut(big).unwrap().id = NodeId::MAX;
        tree.add_child(tree.root(), big).unwrap();

        let fresh = tree.create_node("fresh");
        tree.add_child(tree.root(), fresh).unwrap();
        let id = tree.id_of(fresh);
        assert_ne!(id, UNASSIGNED_ID);
        assert_ne!(id, NodeId::MAX);
        assert_eq!(tree.handle_of(NodeId::MAX), Some(big));
        assert_eq!(tree.handle_of(id), Some(fresh));
    }

    #[test]
    fn test_fresh_ids_skip_explicit_ids_in_same_subtree() {
        let mut tree = SceneTree::new();
        let a = tree.create_node("a");
        let b = tree.create_node("b");
        tree.node_mut(b).unwrap().id = 2;
        tree.add_child(a, b).unwrap();

        tree.add_child(tree.root(), a).unwrap();
        assert_eq!(tree.id_of(b), 2);
        assert_eq!(tree.id_of(a), 3);
        assert_eq!(tree.registered_count(), 3);
    }

    #[test]
    fn test_reparent_validation() {
        let mut tree = SceneTree::new();
        let a = tree.create_node("a");
        let b = tree.create_node("b");
        tree.add_child(tree.root(), a).unwrap();
        tree.add_child(a, b).unwrap();

        assert_eq!(tree.reparent(tree.root(), a, 0), Err(SceneError::IsRoot));
        assert_eq!(tree.reparent(a, b, 0), Err(SceneError::Cycle));
        assert_eq!(tree.reparent(a, a, 0), Err(SceneError::Cycle));
        assert_eq!(tree.reparent_by_id(99, 1, 0), Err(SceneError::NodeNotFound(99)));
        assert_eq!(
            tree.reparent_by_id(tree.id_of(b), 99, 0),
            Err(SceneError::ParentNotFound(99))
        );
    }

    #[test]
    fn test_reparent_clamps_index() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let a = tree.create_node("a");
        let b = tree.create_node("b");
        let c = tree.create_node("c");
        tree.add_child(root, a).unwrap();
        tree.add_child(root, b).unwrap();
        tree.add_child(a, c).unwrap();

        tree.reparent(c, root, 100).unwrap();
        assert_eq!(tree.node(root).unwrap().children(), &[a, b, c]);

        tree.reparent(c, root, 0).unwrap();
        assert_eq!(tree.node(root).unwrap().children(), &[c, a, b]);
        assert!(tree.node(a).unwrap().children().is_empty());
        assert_eq!(tree.node(c).unwrap().parent(), Some(root));
    }

    #[test]
    fn test_reparent_into_detached_parent_exits_tree() {
        let mut tree = SceneTree::new();
        let a = tree.create_node("a");
        tree.add_child(tree.root(), a).unwrap();
        let id = tree.id_of(a);
        let holder = tree.create_node("holder");

        tree.reparent(a, holder, 0).unwrap();
        assert!(!tree.node(a).unwrap().is_inside_tree());
        assert!(tree.handle_of(id).is_none());
    }

    #[test]
    fn test_queue_free_releases_subtree() {
        let mut tree = SceneTree::new();
        let a = tree.create_node("a");
        let b = tree.create_node("b");
        tree.add_child(a, b).unwrap();
        tree.add_child(tree.root(), a).unwrap();

        tree.queue_free(a).unwrap();
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert_eq!(tree.registered_count(), 1);
        assert_eq!(tree.queue_free(tree.root()), Err(SceneError::IsRoot));
    }

    #[test]
    fn test_paths() {
        let mut tree = SceneTree::new();
        let level = tree.create_node("level");
        let player = tree.create_node("player");
        let enemy = tree.create_node("enemy");
        tree.add_child(tree.root(), level).unwrap();
        tree.add_child(level, player).unwrap();
        tree.add_child(level, enemy).unwrap();

        assert_eq!(tree.path(player).as_deref(), Some("/root/level/player"));
        assert_eq!(tree.get_node(player, "../enemy"), Some(enemy));
        assert_eq!(tree.get_node(player, "./.."), Some(level));
        assert_eq!(tree.get_node(player, "missing"), None);
        assert_eq!(tree.get_node(enemy, "/root/level/player"), Some(player));
        assert_eq!(tree.get_node_at("/root/level"), Some(level));
        assert_eq!(tree.get_node_at("/other/level"), None);
        assert_eq!(tree.get_node_at("level/enemy"), Some(enemy));
        assert_eq!(tree.get_node(tree.root(), ".."), None);
    }

    /// Mutates the parent's child list from inside `on_process`
    struct Mutator {
        parent: NodeHandle,
        add: NodeHandle,
        remove: NodeHandle,
    }

    impl NodeBehavior for Mutator {
        fn on_process(&mut self, tree: &mut SceneTree, _node: NodeHandle, _dt: f64) {
            tree.add_child(self.parent, self.add).unwrap();
            tree.remove_child(self.parent, self.remove).unwrap();
        }
    }

    #[test]
    fn test_mutation_during_tick_is_deferred() {
        let log: Log = Rc::default();
        let mut tree = SceneTree::new();
        let root = tree.root();
        let added = recorder(&mut tree, "added", &log);
        let removed = recorder(&mut tree, "removed", &log);
        let mutator = tree.create_node("mutator");
        tree.node_mut(mutator).unwrap().behavior = Some(Box::new(Mutator {
            parent: root,
            add: added,
            remove: removed,
        }));
        tree.add_child(root, mutator).unwrap();
        tree.add_child(root, removed).unwrap();
        log.borrow_mut().clear();

        tree.tick(0.016).unwrap();

        // the removed node was still walked this tick; the added one was not
        assert_eq!(
            *log.borrow(),
            vec!["ready:removed", "process:removed", "enter:added", "exit:removed"]
        );
        assert_eq!(tree.node(root).unwrap().children(), &[mutator, added]);
        assert_eq!(tree.pending_deferred(), 0);
        assert!(!tree.is_processing());
    }

    /// Frees itself the first time it becomes ready
    struct SelfFreeing;

    impl NodeBehavior for SelfFreeing {
        fn on_ready(&mut self, tree: &mut SceneTree, node: NodeHandle) {
            tree.queue_free(node).unwrap();
        }
    }

    #[test]
    fn test_drain_ceiling() {
        let config = SceneTreeConfig {
            max_deferred_passes: 5,
            ..Default::default()
        };
        let mut tree = SceneTree::with_config(config);
        let a = tree.create_node("a");
        let b = tree.create_node("b");
        tree.add_child(tree.root(), a).unwrap();
        tree.add_child(tree.root(), b).unwrap();

        // every drain pass enqueues one more request via on_enter_tree
        struct Chain {
            parent: NodeHandle,
        }
        impl NodeBehavior for Chain {
            fn on_enter_tree(&mut self, tree: &mut SceneTree, _node: NodeHandle) {
                let next = tree.create_node_with("link", Box::new(Chain { parent: self.parent }));
                tree.add_child(self.parent, next).unwrap();
            }
        }

        let seed = tree.create_node_with("seed", Box::new(Chain { parent: a }));
        struct Spawner {
            parent: NodeHandle,
            seed: NodeHandle,
        }
        impl NodeBehavior for Spawner {
            fn on_process(&mut self, tree: &mut SceneTree, _node: NodeHandle, _dt: f64) {
                let _ = tree.add_child(self.parent, self.seed);
            }
        }
        tree.node_mut(b).unwrap().behavior = Some(Box::new(Spawner { parent: a, seed }));

        let err = tree.tick(0.016).unwrap_err();
        assert_eq!(err, SceneError::DeferredOverflow(5));
        assert_eq!(tree.pending_deferred(), 0);
    }

    #[test]
    fn test_free_from_hook_applies_after_walk() {
        let mut tree = SceneTree::new();
        let a = tree.create_node_with("a", Box::new(SelfFreeing));
        tree.add_child(tree.root(), a).unwrap();
        tree.tick(0.016).unwrap();
        assert!(!tree.contains(a));
        assert_eq!(tree.registered_count(), 1);
    }
}

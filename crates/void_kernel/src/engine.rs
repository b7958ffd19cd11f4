//! Scene engine - the authoritative scene and its revision counters

use std::fmt::Write as _;

use void_ir::{NodeSnapshot, SceneSnapshot, SchemaSnapshot, SnapshotProperty};
use void_scene::{
    replace_root_children, NodeHandle, NodeSpec, NodeTypeRegistry, NodeTypes, SceneResult, SceneTree,
};

use crate::config::KernelConfig;

/// Revision reported in every schema snapshot
pub const SCHEMA_REVISION: u64 = 1;

/// Owns the scene tree, the type registry and the revision counters.
///
/// The scene revision moves once per batch (or scene load) that changed the
/// tree. The derived revision moves when a change touches the tracked node
/// type, so caches built from those nodes know to rebuild.
pub struct SceneEngine {
    pub(crate) tree: SceneTree,
    pub(crate) types: NodeTypeRegistry,
    config: KernelConfig,
    scene_revision: u64,
    derived_revision: u64,
    ticks: u64,
}

impl SceneEngine {
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        let mut types = if config.types.register_core_types {
            NodeTypeRegistry::with_core_types()
        } else {
            NodeTypeRegistry::new()
        };
        types.set_allow_unknown_types(config.types.allow_unknown_types);
        types.set_allow_unknown_properties(config.types.allow_unknown_properties);

        Self {
            tree: SceneTree::with_config(config.scene.clone()),
            types,
            config,
            scene_revision: 0,
            derived_revision: 0,
            ticks: 0,
        }
    }

    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    pub fn types(&self) -> &NodeTypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut NodeTypeRegistry {
        &mut self.types
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn scene_revision(&self) -> u64 {
        self.scene_revision
    }

    pub fn derived_revision(&self) -> u64 {
        self.derived_revision
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn bump_scene_revision(&mut self) -> u64 {
        self.scene_revision += 1;
        self.scene_revision
    }

    pub(crate) fn bump_derived_revision(&mut self) -> u64 {
        self.derived_revision += 1;
        self.derived_revision
    }

    /// Advance one frame
    pub fn tick(&mut self, dt: f64) -> SceneResult {
        self.ticks += 1;
        self.tree.tick(dt)
    }

    /// Resolved type of a node
    pub fn type_of(&self, handle: NodeHandle) -> Option<String> {
        self.tree.node(handle).map(|n| self.types.type_id_for(n))
    }

    /// Whether `handle` or any descendant resolves to the tracked type
    pub fn subtree_contains_tracked(&self, handle: NodeHandle) -> bool {
        let tracked = &self.config.derived_cache.tracked_type;
        self.tree
            .subtree(handle)
            .into_iter()
            .any(|h| self.type_of(h).as_deref() == Some(tracked.as_str()))
    }

    /// Depth-first snapshot of the whole tree, root first
    pub fn snapshot(&self, request_id: u64) -> SceneSnapshot {
        let nodes = self
            .tree
            .subtree(self.tree.root())
            .into_iter()
            .filter_map(|handle| {
                let node = self.tree.node(handle)?;
                let parent_id = node.parent().map(|p| self.tree.id_of(p)).unwrap_or(0);
                Some(NodeSnapshot {
                    node_id: node.id(),
                    parent_id,
                    name: node.name().to_string(),
                    type_id: self.types.type_id_for(node),
                    properties: node
                        .properties()
                        .iter()
                        .map(|(k, v)| SnapshotProperty::new(k.clone(), v.clone()))
                        .collect(),
                })
            })
            .collect();

        SceneSnapshot {
            request_id,
            revision: self.scene_revision,
            nodes,
        }
    }

    pub fn schema_snapshot(&self) -> SchemaSnapshot {
        SchemaSnapshot {
            schema_revision: SCHEMA_REVISION,
            types: self.types.schema(),
        }
    }

    /// Replace the root's children with `specs`. Returns the number of nodes
    /// attached.
    pub fn load_specs(&mut self, specs: &[NodeSpec]) -> usize {
        let attached = replace_root_children(&mut self.tree, specs, &self.types);
        let revision = self.bump_scene_revision();

        let root = self.tree.root();
        if self.subtree_contains_tracked(root) {
            let derived = self.bump_derived_revision();
            log::info!(
                "Scene load touched {}; derived revision {}",
                self.config.derived_cache.tracked_type,
                derived
            );
        }
        log::info!("Loaded {} nodes (scene revision {})", attached, revision);
        attached
    }

    /// Replace the scene with the contents of a snapshot
    pub fn load_snapshot(&mut self, snapshot: &SceneSnapshot) -> usize {
        self.load_specs(&snapshot.to_node_specs())
    }

    /// Indented text dump, one node per line
    pub fn dump_scene(&self) -> String {
        let mut out = String::with_capacity(4096);
        let _ = writeln!(out, "SceneTree ticks={}", self.ticks);
        self.dump_node(&mut out, self.tree.root(), 0);
        out
    }

    fn dump_node(&self, out: &mut String, handle: NodeHandle, depth: usize) {
        let Some(node) = self.tree.node(handle) else {
            return;
        };
        let _ = writeln!(
            out,
            "{}{} [{}] #{}",
            "  ".repeat(depth),
            node.name(),
            self.types.type_id_for(node),
            node.id()
        );
        for child in node.children() {
            self.dump_node(out, *child, depth + 1);
        }
    }
}

impl Default for SceneEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SceneEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneEngine")
            .field("nodes", &self.tree.registered_count())
            .field("types", &self.types.len())
            .field("scene_revision", &self.scene_revision)
            .field("derived_revision", &self.derived_revision)
            .field("ticks", &self.ticks)
            .finish()
    }
}

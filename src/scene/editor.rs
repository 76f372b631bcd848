//! Scene Editor
//!
//! The coordinator-facing facade: owns the live [`SceneGraph`], the
//! [`AssetPipeline`] and a single-slot deferred edit queue. UI code may
//! schedule a structural edit at any point during a frame (possibly while
//! a traversal over the same graph is rendering a tree view); the edit is
//! applied at the start of the next `on_update` tick, when nothing is
//! iterating the graph.
//!
//! The slot holds at most one pending edit. Scheduling overwrites
//! whatever was there: the last request before a tick wins.

use std::mem;
use std::path::PathBuf;

use crate::assets::gltf::GltfDecoder;
use crate::assets::{AssetDecoder, AssetPipeline, LoadStage, ModelConfig};
use crate::scene::resources::Object;
use crate::scene::store::{DirtyFlags, SceneStore};
use crate::scene::{MeshKey, NodeKey, ObjectKey, PrefabKey, SceneGraph};

// ============================================================================
// Deferred edits
// ============================================================================

/// Addresses one structural edit: the child at `child_index` under
/// `source_parent`, and (for move/copy) the destination parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditTarget {
    pub source_parent: NodeKey,
    pub child_index: usize,
    pub dest_parent: NodeKey,
}

/// The single-slot deferred edit queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PendingEdit {
    #[default]
    None,
    Move(EditTarget),
    Copy(EditTarget),
    Delete(EditTarget),
}

// ============================================================================
// SceneEditor
// ============================================================================

/// Coordinator-side scene facade: live graph, ingestion pipeline and the
/// deferred edit slot.
pub struct SceneEditor<D: AssetDecoder = GltfDecoder> {
    store: SceneStore,
    pipeline: AssetPipeline<D>,
    graph: SceneGraph,
    pending: PendingEdit,
}

impl SceneEditor<GltfDecoder> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_decoder(SceneStore::new(), GltfDecoder::new())
    }
}

impl Default for SceneEditor<GltfDecoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: AssetDecoder> SceneEditor<D> {
    #[must_use]
    pub fn with_decoder(store: SceneStore, decoder: D) -> Self {
        let pipeline = AssetPipeline::new(store.clone(), decoder);
        Self::with_pipeline(store, pipeline)
    }

    /// Builds an editor around an existing pipeline (sharing its store).
    #[must_use]
    pub fn with_pipeline(store: SceneStore, pipeline: AssetPipeline<D>) -> Self {
        Self {
            store,
            pipeline,
            graph: SceneGraph::new(),
            pending: PendingEdit::None,
        }
    }

    #[must_use]
    pub fn store(&self) -> &SceneStore {
        &self.store
    }

    #[must_use]
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    // ========================================================================
    // Asset loading passthroughs
    // ========================================================================

    pub fn load_model(&mut self, config: ModelConfig) {
        self.pipeline.load_model(config);
    }

    pub fn load_environment(&self, path: PathBuf) {
        self.pipeline.load_environment(path);
    }

    #[must_use]
    pub fn load_stage(&self) -> LoadStage {
        self.pipeline.stage()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        !self.pipeline.is_idle()
    }

    // ========================================================================
    // Deferred edit scheduling
    // ========================================================================

    pub fn schedule_node_move(&mut self, target: EditTarget) {
        self.pending = PendingEdit::Move(target);
    }

    pub fn schedule_node_copy(&mut self, target: EditTarget) {
        self.pending = PendingEdit::Copy(target);
    }

    pub fn schedule_node_deletion(&mut self, source_parent: NodeKey, child_index: usize) {
        self.pending = PendingEdit::Delete(EditTarget {
            source_parent,
            child_index,
            dest_parent: self.graph.root(),
        });
    }

    #[must_use]
    pub fn pending_edit(&self) -> PendingEdit {
        self.pending
    }

    /// Per-tick update: applies the pending structural edit (at most one,
    /// before anything traverses the graph this tick), then polls the
    /// ingestion pipeline.
    pub fn on_update(&mut self) {
        match mem::take(&mut self.pending) {
            PendingEdit::None => {}
            PendingEdit::Move(target) => self.apply_move(target),
            PendingEdit::Copy(target) => self.apply_copy(target),
            PendingEdit::Delete(target) => self.apply_delete(target),
        }
        self.pipeline.on_update();
    }

    fn apply_move(&mut self, target: EditTarget) {
        // A target invalidated since scheduling (stale key, out-of-range
        // index) detaches nothing and the edit is dropped.
        let Some(child) = self.graph.detach_child(target.source_parent, target.child_index)
        else {
            return;
        };
        if !self.graph.attach(child, target.dest_parent) {
            // Bad destination: put the subtree back where it was.
            self.graph.attach(child, target.source_parent);
            return;
        }
        self.graph.update_transforms(&self.store);
        self.store.request_update(DirtyFlags::OBJECTS);
    }

    fn apply_copy(&mut self, target: EditTarget) {
        let Some(src) = self.graph.child_at(target.source_parent, target.child_index) else {
            return;
        };
        if self
            .graph
            .copy_subtree(&self.store, src, target.dest_parent)
            .is_some()
        {
            self.graph.update_transforms(&self.store);
            self.store.request_update(DirtyFlags::OBJECTS);
        }
    }

    fn apply_delete(&mut self, target: EditTarget) {
        if self
            .graph
            .remove_child(&self.store, target.source_parent, target.child_index)
        {
            self.store.request_update(DirtyFlags::OBJECTS);
        }
    }

    // ========================================================================
    // Object and prefab operations
    // ========================================================================

    /// Creates an Object and a leaf for it under `parent`.
    pub fn emplace_object(
        &mut self,
        parent: NodeKey,
        name: impl Into<String>,
        mesh: Option<MeshKey>,
    ) -> Option<NodeKey> {
        let object = self.store.objects.insert(Object::with_mesh(mesh));
        let node = self.graph.add_leaf(parent, object, name);
        if node.is_none() {
            self.store.objects.remove(object);
            return None;
        }
        self.graph.update_transforms(&self.store);
        self.store.request_update(DirtyFlags::OBJECTS);
        node
    }

    /// Duplicates one Object store entry under a fresh key.
    pub fn duplicate_object(&mut self, object: ObjectKey) -> Option<ObjectKey> {
        let copy = self.store.objects.duplicate(object)?;
        self.store.request_update(DirtyFlags::OBJECTS);
        Some(copy)
    }

    /// Erases an Object and every graph leaf referencing it.
    pub fn erase_object(&mut self, object: ObjectKey) {
        let mut leaves = Vec::new();
        self.collect_leaves_for(self.graph.root(), object, &mut leaves);
        for leaf in leaves {
            self.graph.remove_subtree(&self.store, leaf);
        }
        self.store.objects.remove(object);
        self.store.request_update(DirtyFlags::OBJECTS);
    }

    fn collect_leaves_for(&self, node: NodeKey, object: ObjectKey, out: &mut Vec<NodeKey>) {
        let Some(n) = self.graph.get(node) else {
            return;
        };
        if n.object_key() == Some(object) {
            out.push(node);
            return;
        }
        for &child in n.children() {
            self.collect_leaves_for(child, object, out);
        }
    }

    /// Erases a mesh, pruning every leaf whose Object references it.
    pub fn erase_mesh(&mut self, mesh: MeshKey) {
        let root = self.graph.root();
        self.graph.remove_children_with_mesh(&self.store, root, mesh);
        self.store.meshes.remove(mesh);
        self.store.request_update(
            DirtyFlags::MESHES | DirtyFlags::MESH_MATERIALS | DirtyFlags::OBJECTS,
        );
    }

    /// Instances a prefab into the live graph under `parent`. Every
    /// template Object is duplicated, so repeated instancing shares
    /// nothing between instances.
    pub fn instance_prefab(&mut self, prefab: PrefabKey, parent: NodeKey) -> Option<NodeKey> {
        let slot = self.store.prefabs.get(prefab)?;
        let (template, name) = {
            let p = slot.read();
            (p.graph.snapshot(p.graph.root())?, p.name.clone())
        };
        let node = self.graph.instantiate(&self.store, &template, parent)?;
        if let Some(n) = self.graph.get_mut(node) {
            n.name = name;
        }
        self.graph.update_transforms(&self.store);
        self.store.request_update(DirtyFlags::OBJECTS);
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduling_overwrites_pending_slot() {
        let mut editor = SceneEditor::new();
        let root = editor.graph().root();
        editor.schedule_node_move(EditTarget {
            source_parent: root,
            child_index: 0,
            dest_parent: root,
        });
        editor.schedule_node_deletion(root, 3);

        match editor.pending_edit() {
            PendingEdit::Delete(target) => assert_eq!(target.child_index, 3),
            other => panic!("expected the delete to win, got {other:?}"),
        }
    }

    #[test]
    fn invalid_delete_is_dropped() {
        let mut editor = SceneEditor::new();
        let root = editor.graph().root();
        editor.schedule_node_deletion(root, 7);
        editor.on_update();
        assert_eq!(editor.pending_edit(), PendingEdit::None);
        assert!(editor.graph().children(root).is_empty());
    }
}

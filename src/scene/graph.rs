//! Scene Graph
//!
//! An arena-backed tree of nodes. Each node is either a group (ordered
//! list of children) or a leaf referencing one [`Object`] in the scene
//! store; the payload is a sum type so a node is always exactly one of
//! the two. Nodes address each other by [`NodeKey`] and keep a non-owning
//! parent key used only for bottom-up queries, never for lifetime
//! management — the arena owns every node.
//!
//! Structural mutation is explicit and store-aware: removing a leaf also
//! erases the Object it references (ownership of the Object belongs to
//! the leaf), and deep copies mint freshly duplicated Objects so copies
//! never alias their source.
//!
//! [`Object`]: crate::scene::resources::Object

use glam::Affine3A;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::scene::NodeKey;
use crate::scene::store::SceneStore;
use crate::scene::transform::Transform;
use crate::scene::{MeshKey, ObjectKey};

/// Node payload: an internal node owns an ordered child list, a leaf
/// references one scene Object.
#[derive(Debug, Clone)]
pub enum NodePayload {
    Group(SmallVec<[NodeKey; 4]>),
    Leaf(ObjectKey),
}

/// One node of the graph: name, local TRS and payload.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    parent: Option<NodeKey>,
    payload: NodePayload,
}

impl SceneNode {
    fn group(name: String) -> Self {
        Self {
            name,
            transform: Transform::new(),
            parent: None,
            payload: NodePayload::Group(SmallVec::new()),
        }
    }

    fn leaf(name: String, object: ObjectKey) -> Self {
        Self {
            name,
            transform: Transform::new(),
            parent: None,
            payload: NodePayload::Leaf(object),
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self.payload, NodePayload::Leaf(_))
    }

    /// The referenced Object key, for leaf nodes.
    #[must_use]
    pub fn object_key(&self) -> Option<ObjectKey> {
        match self.payload {
            NodePayload::Leaf(key) => Some(key),
            NodePayload::Group(_) => None,
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        match &self.payload {
            NodePayload::Group(children) => children,
            NodePayload::Leaf(_) => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut SmallVec<[NodeKey; 4]>> {
        match &mut self.payload {
            NodePayload::Group(children) => Some(children),
            NodePayload::Leaf(_) => None,
        }
    }
}

/// Deep-copy template of a subtree, detached from any arena. Leaves still
/// reference their *source* Objects; duplication happens on instantiation.
#[derive(Debug, Clone)]
pub(crate) struct SubtreeTemplate {
    name: String,
    transform: Transform,
    payload: TemplatePayload,
}

#[derive(Debug, Clone)]
enum TemplatePayload {
    Group(Vec<SubtreeTemplate>),
    Leaf(ObjectKey),
}

/// Arena-backed scene tree with a fixed group root.
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, SceneNode>,
    root: NodeKey,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::group("Root".to_string()));
        Self { nodes, root }
    }

    #[must_use]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn get(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Appends a new internal (group) node under `parent`. Returns `None`
    /// if `parent` is missing or a leaf.
    pub fn add_group(&mut self, parent: NodeKey, name: impl Into<String>) -> Option<NodeKey> {
        self.add_node(parent, SceneNode::group(name.into()))
    }

    /// Appends a new leaf node referencing `object` under `parent`.
    pub fn add_leaf(
        &mut self,
        parent: NodeKey,
        object: ObjectKey,
        name: impl Into<String>,
    ) -> Option<NodeKey> {
        self.add_node(parent, SceneNode::leaf(name.into(), object))
    }

    fn add_node(&mut self, parent: NodeKey, node: SceneNode) -> Option<NodeKey> {
        if !matches!(self.nodes.get(parent)?.payload, NodePayload::Group(_)) {
            log::warn!("cannot add a child to leaf node {parent:?}");
            return None;
        }
        let key = self.nodes.insert(node);
        self.nodes[key].parent = Some(parent);
        self.nodes[parent]
            .children_mut()
            .expect("parent verified as group above")
            .push(key);
        Some(key)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Children of `node` in insertion order (empty for leaves).
    #[must_use]
    pub fn children(&self, node: NodeKey) -> &[NodeKey] {
        self.nodes.get(node).map_or(&[], SceneNode::children)
    }

    /// The child of `parent` at `index`, if both exist.
    #[must_use]
    pub fn child_at(&self, parent: NodeKey, index: usize) -> Option<NodeKey> {
        self.children(parent).get(index).copied()
    }

    /// Whether any leaf in the subtree rooted at `node` references `object`.
    #[must_use]
    pub fn subtree_contains(&self, node: NodeKey, object: ObjectKey) -> bool {
        let Some(n) = self.nodes.get(node) else {
            return false;
        };
        match &n.payload {
            NodePayload::Leaf(key) => *key == object,
            NodePayload::Group(children) => children
                .iter()
                .any(|&child| self.subtree_contains(child, object)),
        }
    }

    /// World transform of `node`, accumulated bottom-up through the
    /// parent chain. Path-independent: works for any node key.
    #[must_use]
    pub fn accumulated_transform(&self, node: NodeKey) -> Affine3A {
        let mut result = Affine3A::IDENTITY;
        let mut current = Some(node);
        while let Some(key) = current {
            let Some(n) = self.nodes.get(key) else { break };
            result = n.transform.local_matrix() * result;
            current = n.parent;
        }
        result
    }

    // ========================================================================
    // Structural mutation
    // ========================================================================

    /// Detaches the child of `parent` at `index` without destroying it.
    /// The node keeps its subtree and can be re-attached elsewhere.
    pub fn detach_child(&mut self, parent: NodeKey, index: usize) -> Option<NodeKey> {
        let children = self.nodes.get_mut(parent)?.children_mut()?;
        if index >= children.len() {
            return None;
        }
        let child = children.remove(index);
        self.nodes[child].parent = None;
        Some(child)
    }

    /// Appends a detached node to `parent`'s children. Refuses attachments
    /// that would break the tree shape (leaf parent, cycle).
    pub fn attach(&mut self, child: NodeKey, parent: NodeKey) -> bool {
        if child == parent || !self.nodes.contains_key(child) {
            return false;
        }
        // Walk up from the new parent: attaching below our own subtree
        // would create a cycle.
        let mut cursor = Some(parent);
        while let Some(key) = cursor {
            if key == child {
                log::warn!("refusing to attach node {child:?} inside its own subtree");
                return false;
            }
            cursor = self.nodes.get(key).and_then(SceneNode::parent);
        }
        let Some(children) = self.nodes.get_mut(parent).and_then(SceneNode::children_mut)
        else {
            log::warn!("cannot attach to missing or leaf node {parent:?}");
            return false;
        };
        children.push(child);
        self.nodes[child].parent = Some(parent);
        true
    }

    /// Removes the child of `parent` at `index` and its whole subtree.
    /// Every leaf's Object is erased from the store (leaves own their
    /// Objects).
    pub fn remove_child(&mut self, store: &SceneStore, parent: NodeKey, index: usize) -> bool {
        match self.detach_child(parent, index) {
            Some(child) => {
                self.remove_subtree(store, child);
                true
            }
            None => false,
        }
    }

    /// Removes `node` and its subtree, erasing referenced Objects. The
    /// node is detached from its parent first if still attached.
    pub fn remove_subtree(&mut self, store: &SceneStore, node: NodeKey) {
        if let Some(parent) = self.nodes.get(node).and_then(SceneNode::parent) {
            if let Some(children) = self.nodes.get_mut(parent).and_then(SceneNode::children_mut)
            {
                children.retain(|k| *k != node);
            }
        }
        self.remove_recursive(store, node);
    }

    fn remove_recursive(&mut self, store: &SceneStore, node: NodeKey) {
        let Some(removed) = self.nodes.remove(node) else {
            return;
        };
        match removed.payload {
            NodePayload::Leaf(object) => {
                store.objects.remove(object);
            }
            NodePayload::Group(children) => {
                for child in children {
                    self.remove_recursive(store, child);
                }
            }
        }
    }

    /// Recursively prunes every leaf below `node` whose Object references
    /// `mesh`. Used when a mesh is erased from the store.
    pub fn remove_children_with_mesh(&mut self, store: &SceneStore, node: NodeKey, mesh: MeshKey) {
        let children: Vec<NodeKey> = self.children(node).to_vec();
        for child in children {
            let Some(child_node) = self.nodes.get(child) else {
                continue;
            };
            match child_node.payload {
                NodePayload::Leaf(object) => {
                    let references_mesh = store
                        .objects
                        .get(object)
                        .is_some_and(|slot| slot.read().mesh == Some(mesh));
                    if references_mesh {
                        self.remove_subtree(store, child);
                    }
                }
                NodePayload::Group(_) => {
                    self.remove_children_with_mesh(store, child, mesh);
                }
            }
        }
    }

    // ========================================================================
    // Deep copy
    // ========================================================================

    /// Deep-copies the subtree rooted at `src` into a new child of
    /// `dst_parent`. Every leaf in the copy references a freshly
    /// duplicated Object, never the original key.
    pub fn copy_subtree(
        &mut self,
        store: &SceneStore,
        src: NodeKey,
        dst_parent: NodeKey,
    ) -> Option<NodeKey> {
        let template = self.snapshot(src)?;
        self.instantiate(store, &template, dst_parent)
    }

    /// Captures the subtree rooted at `node` as a detached template.
    pub(crate) fn snapshot(&self, node: NodeKey) -> Option<SubtreeTemplate> {
        let n = self.nodes.get(node)?;
        let payload = match &n.payload {
            NodePayload::Leaf(object) => TemplatePayload::Leaf(*object),
            NodePayload::Group(children) => TemplatePayload::Group(
                children
                    .iter()
                    .filter_map(|&child| self.snapshot(child))
                    .collect(),
            ),
        };
        Some(SubtreeTemplate {
            name: n.name.clone(),
            transform: n.transform.clone(),
            payload,
        })
    }

    /// Builds the template under `parent`, duplicating every referenced
    /// Object into a fresh store entry.
    pub(crate) fn instantiate(
        &mut self,
        store: &SceneStore,
        template: &SubtreeTemplate,
        parent: NodeKey,
    ) -> Option<NodeKey> {
        let key = match &template.payload {
            TemplatePayload::Leaf(source_object) => {
                let object = store.objects.duplicate(*source_object).unwrap_or_else(|| {
                    log::warn!("copied leaf references missing object {source_object:?}");
                    store.objects.insert(crate::scene::resources::Object::default())
                });
                self.add_leaf(parent, object, template.name.clone())?
            }
            TemplatePayload::Group(children) => {
                let group = self.add_group(parent, template.name.clone())?;
                for child in children {
                    self.instantiate(store, child, group);
                }
                group
            }
        };
        self.nodes[key].transform = template.transform.clone();
        Some(key)
    }

    // ========================================================================
    // Transforms
    // ========================================================================

    /// Pre-order accumulation from the root: a node's world transform is
    /// its parent's accumulated transform times its own local transform.
    /// Leaves write the result into their store Object.
    pub fn update_transforms(&self, store: &SceneStore) {
        self.update_transforms_from(store, self.root, Affine3A::IDENTITY);
    }

    /// Same as [`update_transforms`](Self::update_transforms) but rooted
    /// at an arbitrary node with an explicit parent transform.
    pub fn update_transforms_from(&self, store: &SceneStore, node: NodeKey, parent: Affine3A) {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        let world = parent * n.transform.local_matrix();
        match &n.payload {
            NodePayload::Leaf(object) => {
                if let Some(slot) = store.objects.get(*object) {
                    slot.write().transform = world;
                }
            }
            NodePayload::Group(children) => {
                for &child in children {
                    self.update_transforms_from(store, child, world);
                }
            }
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Prefabs
// ============================================================================

/// A detached subtree produced by asset ingestion. Its leaves reference
/// *template* Objects; instancing duplicates them into the live graph, so
/// one prefab can be instanced many times without aliasing.
pub struct Prefab {
    pub name: String,
    pub graph: SceneGraph,
}

impl Prefab {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), graph: SceneGraph::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::resources::Object;
    use glam::Vec3;

    #[test]
    fn add_and_query_children() {
        let mut graph = SceneGraph::new();
        let a = graph.add_group(graph.root(), "a").unwrap();
        let b = graph.add_group(graph.root(), "b").unwrap();
        assert_eq!(graph.children(graph.root()), &[a, b]);
        assert_eq!(graph.get(a).unwrap().parent(), Some(graph.root()));
    }

    #[test]
    fn leaf_rejects_children() {
        let store = SceneStore::new();
        let mut graph = SceneGraph::new();
        let object = store.objects.insert(Object::default());
        let leaf = graph.add_leaf(graph.root(), object, "leaf").unwrap();
        assert!(graph.add_group(leaf, "child").is_none());
    }

    #[test]
    fn attach_refuses_cycles() {
        let mut graph = SceneGraph::new();
        let outer = graph.add_group(graph.root(), "outer").unwrap();
        let inner = graph.add_group(outer, "inner").unwrap();

        let detached = graph.detach_child(graph.root(), 0).unwrap();
        assert_eq!(detached, outer);
        assert!(!graph.attach(outer, inner));
        assert!(graph.attach(outer, graph.root()));
    }

    #[test]
    fn accumulated_transform_walks_parents() {
        let mut graph = SceneGraph::new();
        let group = graph.add_group(graph.root(), "g").unwrap();
        graph.get_mut(group).unwrap().transform.translation = Vec3::new(1.0, 0.0, 0.0);
        let child = graph.add_group(group, "c").unwrap();
        graph.get_mut(child).unwrap().transform.translation = Vec3::new(0.0, 2.0, 0.0);

        let world = graph.accumulated_transform(child);
        let p = world.transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
    }
}

//! Scene data model:
//! - Store: key-indexed collections shared between the coordinating
//!   thread and decode workers
//! - Resources: images, meshes, materials, objects, environment
//! - Graph: arena-backed node tree with prefab support
//! - Editor: structural edits applied through a deferred single-slot queue

pub mod editor;
pub mod graph;
pub mod resources;
pub mod store;
pub mod transform;

pub use editor::{EditTarget, PendingEdit, SceneEditor};
pub use graph::{NodePayload, Prefab, SceneGraph, SceneNode};
pub use resources::{
    Environment, GeometryData, ImageData, ImageFormat, Material, Mesh, Object, Pixel, Primitive,
    Vertex,
};
pub use store::{DirtyFlags, SceneStore, Slot, Storage};
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    /// Key into the image collection.
    pub struct ImageKey;
    /// Key into the mesh collection.
    pub struct MeshKey;
    /// Key into the material collection.
    pub struct MaterialKey;
    /// Key into the object collection.
    pub struct ObjectKey;
    /// Key into the prefab collection.
    pub struct PrefabKey;
    /// Key into a scene graph's node arena.
    pub struct NodeKey;
}

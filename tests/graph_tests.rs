//! Scene graph structural behavior: cascades, deep copies and transform
//! propagation against a live store.

use glam::Vec3;
use talos::scene::{Mesh, Object, SceneGraph, SceneStore};

fn store_with_object(store: &SceneStore) -> talos::scene::ObjectKey {
    store.objects.insert(Object::default())
}

// ============================================================================
// Removal cascades
// ============================================================================

#[test]
fn removing_a_group_erases_every_object_below_it() {
    let store = SceneStore::new();
    let mut graph = SceneGraph::new();

    let group = graph.add_group(graph.root(), "group").unwrap();
    let inner = graph.add_group(group, "inner").unwrap();
    let a = store_with_object(&store);
    let b = store_with_object(&store);
    graph.add_leaf(group, a, "a").unwrap();
    graph.add_leaf(inner, b, "b").unwrap();
    let survivor = store_with_object(&store);
    graph.add_leaf(graph.root(), survivor, "survivor").unwrap();

    assert!(graph.remove_child(&store, graph.root(), 0));

    assert!(!store.objects.contains(a));
    assert!(!store.objects.contains(b));
    assert!(store.objects.contains(survivor));
    assert_eq!(graph.children(graph.root()).len(), 1);
    // Arena: group, inner and both leaves are gone.
    assert_eq!(graph.len(), 2);
}

#[test]
fn erased_mesh_prunes_only_its_leaves() {
    let store = SceneStore::new();
    let mut graph = SceneGraph::new();

    let mesh = store.meshes.insert(Mesh::default());
    let other = store.meshes.insert(Mesh::default());
    let with_mesh = store.objects.insert(Object::with_mesh(Some(mesh)));
    let with_other = store.objects.insert(Object::with_mesh(Some(other)));
    let group = graph.add_group(graph.root(), "g").unwrap();
    graph.add_leaf(group, with_mesh, "doomed").unwrap();
    graph.add_leaf(group, with_other, "kept").unwrap();

    graph.remove_children_with_mesh(&store, graph.root(), mesh);

    assert!(!store.objects.contains(with_mesh));
    assert!(store.objects.contains(with_other));
    assert_eq!(graph.children(group).len(), 1);
}

// ============================================================================
// Deep copies
// ============================================================================

#[test]
fn copied_subtree_shares_no_objects_with_its_source() {
    let store = SceneStore::new();
    let mut graph = SceneGraph::new();

    let group = graph.add_group(graph.root(), "g").unwrap();
    let object = store_with_object(&store);
    graph.add_leaf(group, object, "leaf").unwrap();

    let copy = graph.copy_subtree(&store, group, graph.root()).unwrap();
    assert_eq!(store.objects.len(), 2);

    let copied_leaf = graph.children(copy)[0];
    let copied_object = graph.get(copied_leaf).unwrap().object_key().unwrap();
    assert_ne!(copied_object, object);

    // Mutating the copy leaves the source untouched.
    store.objects.get(copied_object).unwrap().write().transform.translation.x = 9.0;
    assert_eq!(store.objects.get(object).unwrap().read().transform.translation.x, 0.0);

    // Deleting the copy keeps the source alive.
    graph.remove_subtree(&store, copy);
    assert!(store.objects.contains(object));
    assert!(!store.objects.contains(copied_object));
}

#[test]
fn subtree_contains_finds_objects_at_any_depth() {
    let store = SceneStore::new();
    let mut graph = SceneGraph::new();

    let outer = graph.add_group(graph.root(), "outer").unwrap();
    let inner = graph.add_group(outer, "inner").unwrap();
    let object = store_with_object(&store);
    graph.add_leaf(inner, object, "leaf").unwrap();
    let elsewhere = store_with_object(&store);
    graph.add_leaf(graph.root(), elsewhere, "other").unwrap();

    assert!(graph.subtree_contains(outer, object));
    assert!(graph.subtree_contains(graph.root(), object));
    assert!(!graph.subtree_contains(outer, elsewhere));
}

// ============================================================================
// Transform propagation
// ============================================================================

#[test]
fn update_transforms_writes_accumulated_world_into_objects() {
    let store = SceneStore::new();
    let mut graph = SceneGraph::new();

    let group = graph.add_group(graph.root(), "g").unwrap();
    graph.get_mut(group).unwrap().transform.translation = Vec3::new(1.0, 0.0, 0.0);
    let object = store_with_object(&store);
    let leaf = graph.add_leaf(group, object, "leaf").unwrap();
    graph.get_mut(leaf).unwrap().transform.translation = Vec3::new(0.0, 2.0, 0.0);

    graph.update_transforms(&store);

    let slot = store.objects.get(object).unwrap();
    let world = slot.read().transform;
    let p = world.transform_point3(Vec3::ZERO);
    assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
}

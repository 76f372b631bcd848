//! Scene Store
//!
//! Key-indexed collections holding everything the renderer and UI read:
//! images, meshes, materials, objects and prefabs, plus the lighting
//! environment and the dirty flags the renderer synchronizes against.
//!
//! # Concurrency discipline
//!
//! Each collection is a slot map of `Arc<RwLock<V>>` entries behind an
//! outer `RwLock`. Insertions and erasures only ever happen on the
//! coordinating thread (or inside the single parse task, before any decode
//! task is dispatched). Decode workers receive a clone of their entry's
//! slot `Arc` up front and write the value in place; they never touch the
//! outer map. Disjoint destination slots make those writes contention-free.
//!
//! Slot map keys are versioned, so a key whose entry was erased reads back
//! as absent instead of aliasing a later entry.

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use slotmap::{Key, SlotMap};

use crate::scene::graph::Prefab;
use crate::scene::resources::{Environment, ImageData, Material, Mesh, Object};
use crate::scene::{ImageKey, MaterialKey, MeshKey, ObjectKey, PrefabKey};

/// Shared slot handle for one stored value.
pub type Slot<V> = Arc<RwLock<V>>;

// ============================================================================
// Storage
// ============================================================================

/// One key-indexed collection of the scene store.
pub struct Storage<K: Key, V> {
    inner: RwLock<SlotMap<K, Slot<V>>>,
}

impl<K: Key, V> Storage<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: RwLock::new(SlotMap::with_key()) }
    }

    /// [Write] Inserts a value and returns its fresh key.
    pub fn insert(&self, value: V) -> K {
        self.inner.write().insert(Arc::new(RwLock::new(value)))
    }

    /// [Write] Inserts a value and returns both the key and the slot
    /// handle, for handing the slot to a decode worker.
    pub fn insert_slot(&self, value: V) -> (K, Slot<V>) {
        let slot = Arc::new(RwLock::new(value));
        let key = self.inner.write().insert(Arc::clone(&slot));
        (key, slot)
    }

    /// [Read] Returns the slot for `key`, if the entry still exists.
    pub fn get(&self, key: K) -> Option<Slot<V>> {
        self.inner.read().get(key).cloned()
    }

    /// [Write] Erases the entry. The value stays alive for any worker
    /// still holding the slot `Arc`, but the key reads as absent.
    pub fn remove(&self, key: K) -> Option<Slot<V>> {
        self.inner.write().remove(key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Snapshot of all live keys, in unspecified order.
    pub fn keys(&self) -> Vec<K> {
        self.inner.read().keys().collect()
    }

    /// [Read - Advanced] Acquires the outer read lock for batch iteration,
    /// e.g. the renderer's once-per-pass synchronization walk.
    pub fn read_lock(&self) -> RwLockReadGuard<'_, SlotMap<K, Slot<V>>> {
        self.inner.read()
    }
}

impl<K: Key, V> Default for Storage<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V: Clone> Storage<K, V> {
    /// [Write] Inserts a copy of the value behind `key` under a fresh key.
    pub fn duplicate(&self, key: K) -> Option<K> {
        let value = self.get(key)?.read().clone();
        Some(self.insert(value))
    }
}

// ============================================================================
// Dirty flags
// ============================================================================

bitflags! {
    /// Per-category change notification for the renderer. Raised by the
    /// pipeline/editor, consumed (and cleared) once per sync pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirtyFlags: u8 {
        const IMAGES         = 1 << 0;
        const MESHES         = 1 << 1;
        const MATERIALS      = 1 << 2;
        const MESH_MATERIALS = 1 << 3;
        const OBJECTS        = 1 << 4;
        const ENVIRONMENT    = 1 << 5;
    }
}

// ============================================================================
// SceneStore
// ============================================================================

/// Cloneable bundle of shared scene collections.
///
/// Cloning is cheap (a handful of `Arc`s); every clone observes the same
/// underlying data, which is how the pipeline's worker tasks reach the
/// store without borrowing from the coordinator.
#[derive(Clone, Default)]
pub struct SceneStore {
    pub images: Arc<Storage<ImageKey, ImageData>>,
    pub meshes: Arc<Storage<MeshKey, Mesh>>,
    pub materials: Arc<Storage<MaterialKey, Material>>,
    pub objects: Arc<Storage<ObjectKey, Object>>,
    pub prefabs: Arc<Storage<PrefabKey, Prefab>>,

    pub environment: Arc<RwLock<Environment>>,

    dirty: Arc<Mutex<DirtyFlags>>,
}

impl SceneStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises dirty flags for the renderer's next sync pass.
    pub fn request_update(&self, flags: DirtyFlags) {
        *self.dirty.lock() |= flags;
    }

    /// Raises every dirty flag (e.g. after swapping render backends).
    pub fn request_update_all(&self) {
        *self.dirty.lock() = DirtyFlags::all();
    }

    /// Currently raised flags, without clearing them.
    #[must_use]
    pub fn dirty(&self) -> DirtyFlags {
        *self.dirty.lock()
    }

    /// Reads and clears the raised flags in one step. Intended to be
    /// called exactly once per renderer synchronization pass.
    #[must_use]
    pub fn take_dirty(&self) -> DirtyFlags {
        std::mem::take(&mut *self.dirty.lock())
    }

    pub fn clear_dirty(&self) {
        *self.dirty.lock() = DirtyFlags::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::resources::Pixel;

    #[test]
    fn insert_then_get_roundtrip() {
        let storage: Storage<ImageKey, ImageData> = Storage::new();
        let key = storage.insert(ImageData::single_pixel(Pixel::WHITE));
        let slot = storage.get(key).unwrap();
        assert_eq!(slot.read().width, 1);
    }

    #[test]
    fn removed_key_reads_as_absent() {
        let storage: Storage<ObjectKey, Object> = Storage::new();
        let key = storage.insert(Object::default());
        assert!(storage.contains(key));

        storage.remove(key);
        assert!(!storage.contains(key));
        assert!(storage.get(key).is_none());

        // A later insertion must not resurrect the stale key.
        let other = storage.insert(Object::default());
        assert_ne!(other, key);
        assert!(storage.get(key).is_none());
    }

    #[test]
    fn duplicate_is_independent() {
        let storage: Storage<ObjectKey, Object> = Storage::new();
        let key = storage.insert(Object::default());
        let copy = storage.duplicate(key).unwrap();
        assert_ne!(key, copy);

        storage.get(copy).unwrap().write().transform.translation.x = 5.0;
        let original = storage.get(key).unwrap();
        assert_eq!(original.read().transform.translation.x, 0.0);
    }

    #[test]
    fn workers_can_write_disjoint_slots() {
        let storage: Arc<Storage<ImageKey, ImageData>> = Arc::new(Storage::new());
        let slots: Vec<_> = (0..8)
            .map(|_| storage.insert_slot(ImageData::default()))
            .collect();

        let handles: Vec<_> = slots
            .iter()
            .map(|(_, slot)| {
                let slot = Arc::clone(slot);
                std::thread::spawn(move || {
                    slot.write().name = "decoded".to_string();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for (key, _) in &slots {
            assert_eq!(storage.get(*key).unwrap().read().name, "decoded");
        }
    }

    #[test]
    fn take_dirty_clears_flags() {
        let store = SceneStore::new();
        store.request_update(DirtyFlags::IMAGES | DirtyFlags::MESHES);
        assert_eq!(store.dirty(), DirtyFlags::IMAGES | DirtyFlags::MESHES);

        let taken = store.take_dirty();
        assert_eq!(taken, DirtyFlags::IMAGES | DirtyFlags::MESHES);
        assert_eq!(store.dirty(), DirtyFlags::empty());
    }
}

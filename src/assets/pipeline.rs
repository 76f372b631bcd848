//! Asset Ingestion Pipeline
//!
//! Orchestrates loading one external asset at a time:
//!
//! 1. `load_model` pushes a single parse task to the worker pool. That
//!    task parses the asset, mints every store entry the model will need
//!    (materials, meshes with placeholder geometry, image slots, the
//!    prefab with its template objects) and builds one flat task
//!    descriptor per image and per primitive. Each descriptor names its
//!    own destination slot; destinations are pairwise disjoint.
//! 2. The coordinating thread polls `on_update` once per tick. When it
//!    observes the parsed stage it stores the fan-out width in an atomic
//!    countdown and dispatches the decode tasks.
//! 3. Each decode task writes its result through its pre-cloned slot and
//!    decrements the countdown — on failure it logs, leaves the
//!    placeholder and still decrements, so a bad texture degrades the
//!    session instead of hanging it.
//! 4. When the poll observes a zero countdown the session is over: dirty
//!    flags are raised and the transient parsed representation has
//!    already been dropped with the last task closure.
//!
//! The stage field is written by the parse worker (`Parsing -> Parsed`)
//! and by the coordinator (all other transitions); an `AtomicU8` with
//! acquire/release ordering keeps the payload hand-off sound. The
//! coordinator never blocks on workers — completion is detected by the
//! countdown, never by joining threads, so the pool stays available for
//! unrelated loads (e.g. an environment map) mid-session.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::assets::{AssetDecoder, ColorSpace, ImageSource, ModelConfig};
use crate::errors::Result;
use crate::scene::resources::{GeometryData, ImageData, Material, Mesh, Object, Pixel, Primitive};
use crate::scene::store::{DirtyFlags, SceneStore, Slot};
use crate::scene::{ImageKey, MaterialKey, MeshKey, Prefab};
use crate::tasks::WorkerPool;

// ============================================================================
// Stage
// ============================================================================

/// Ingestion session stage. At most one session is in flight: any
/// `load_model` call while the stage is not `Idle` is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadStage {
    Idle = 0,
    Parsing = 1,
    Parsed = 2,
    Loading = 3,
}

/// Stage cell shared between the coordinator and the parse worker.
struct StageCell(AtomicU8);

impl StageCell {
    fn new() -> Self {
        Self(AtomicU8::new(LoadStage::Idle as u8))
    }

    fn get(&self) -> LoadStage {
        match self.0.load(Ordering::Acquire) {
            0 => LoadStage::Idle,
            1 => LoadStage::Parsing,
            2 => LoadStage::Parsed,
            _ => LoadStage::Loading,
        }
    }

    fn set(&self, stage: LoadStage) {
        self.0.store(stage as u8, Ordering::Release);
    }
}

// ============================================================================
// Task descriptors
// ============================================================================

/// One image decode: destination slot plus the source to decode into it.
struct ImageTask {
    image: ImageKey,
    slot: Slot<ImageData>,
    source: ImageSource,
    color_space: ColorSpace,
}

/// One primitive decode: destination mesh slot + primitive index, plus
/// the source mesh/primitive indices inside the parsed asset.
struct PrimitiveTask {
    mesh: MeshKey,
    slot: Slot<Mesh>,
    primitive: usize,
    source_mesh: usize,
    source_primitive: usize,
}

/// Everything the parse task hands to the coordinator: the parsed asset
/// (kept alive until the last primitive decode drops its `Arc`) and the
/// flat descriptor lists.
struct ParsedSession<A> {
    asset: Arc<A>,
    images: Vec<ImageTask>,
    primitives: Vec<PrimitiveTask>,
}

impl<A> ParsedSession<A> {
    fn task_count(&self) -> usize {
        self.images.len() + self.primitives.len()
    }
}

/// State shared with worker tasks.
struct SessionShared<A> {
    stage: StageCell,
    tasks_left: AtomicUsize,
    parsed: Mutex<Option<ParsedSession<A>>>,
}

/// Coordinator-only session metadata.
struct ActiveSession {
    name: String,
    started: Instant,
}

// ============================================================================
// Pipeline
// ============================================================================

/// The asset ingestion state machine. Owned and polled by the
/// coordinating thread; never blocks.
pub struct AssetPipeline<D: AssetDecoder> {
    store: SceneStore,
    decoder: Arc<D>,
    pool: Arc<WorkerPool>,
    shared: Arc<SessionShared<D::Asset>>,
    active: Option<ActiveSession>,
}

impl<D: AssetDecoder> AssetPipeline<D> {
    #[must_use]
    pub fn new(store: SceneStore, decoder: D) -> Self {
        Self::with_pool(store, decoder, Arc::new(WorkerPool::new()))
    }

    /// Creates a pipeline sharing an explicit worker pool.
    #[must_use]
    pub fn with_pool(store: SceneStore, decoder: D, pool: Arc<WorkerPool>) -> Self {
        Self {
            store,
            decoder: Arc::new(decoder),
            pool,
            shared: Arc::new(SessionShared {
                stage: StageCell::new(),
                tasks_left: AtomicUsize::new(0),
                parsed: Mutex::new(None),
            }),
            active: None,
        }
    }

    #[must_use]
    pub fn stage(&self) -> LoadStage {
        self.shared.stage.get()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.stage() == LoadStage::Idle
    }

    /// Decode tasks still outstanding in the current session.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.shared.tasks_left.load(Ordering::Acquire)
    }

    /// Starts loading a model. Dropped (with a warning) when a session is
    /// already in flight.
    pub fn load_model(&mut self, config: ModelConfig) {
        if self.stage() != LoadStage::Idle {
            log::warn!(
                "asset ingestion already in progress; dropping load request for {}",
                config.path.display()
            );
            return;
        }

        self.active = Some(ActiveSession {
            name: config.base_name(),
            started: Instant::now(),
        });
        self.shared.stage.set(LoadStage::Parsing);

        let shared = Arc::clone(&self.shared);
        let decoder = Arc::clone(&self.decoder);
        let store = self.store.clone();
        self.pool.push(move || {
            match preprocess(decoder.as_ref(), &store, &config) {
                Ok(session) => *shared.parsed.lock() = Some(session),
                Err(e) => {
                    // The session drains to Idle with whatever placeholder
                    // entries preprocessing managed to create.
                    log::error!("failed to parse asset {}: {e}", config.path.display());
                }
            }
            // Payload is published before the stage flips; the coordinator
            // reads it only after observing Parsed.
            shared.stage.set(LoadStage::Parsed);
        });
    }

    /// Per-tick poll driving `Parsed -> Loading -> Idle`. Non-blocking.
    pub fn on_update(&mut self) {
        match self.stage() {
            LoadStage::Parsed => {
                let session = self.shared.parsed.lock().take();
                let count = session.as_ref().map_or(0, ParsedSession::task_count);
                self.shared.tasks_left.store(count, Ordering::Release);
                self.shared.stage.set(LoadStage::Loading);
                if let Some(session) = session {
                    self.dispatch(session);
                }
            }
            LoadStage::Loading => {
                if self.shared.tasks_left.load(Ordering::Acquire) == 0 {
                    self.shared.stage.set(LoadStage::Idle);
                    self.store.request_update(
                        DirtyFlags::IMAGES
                            | DirtyFlags::MESHES
                            | DirtyFlags::MATERIALS
                            | DirtyFlags::MESH_MATERIALS,
                    );
                    if let Some(active) = self.active.take() {
                        log::info!(
                            "finished loading {} (took {:.2} s)",
                            active.name,
                            active.started.elapsed().as_secs_f32()
                        );
                    }
                }
            }
            LoadStage::Idle | LoadStage::Parsing => {}
        }
    }

    /// Fans out one decode task per descriptor.
    fn dispatch(&self, session: ParsedSession<D::Asset>) {
        let ParsedSession { asset, images, primitives } = session;

        for task in images {
            let decoder = Arc::clone(&self.decoder);
            let shared = Arc::clone(&self.shared);
            self.pool.push(move || {
                match decoder.decode_image(&task.source, task.color_space) {
                    Ok(image) => *task.slot.write() = image,
                    Err(e) => {
                        log::error!("image decode failed for slot {:?}: {e}", task.image);
                    }
                }
                shared.tasks_left.fetch_sub(1, Ordering::AcqRel);
            });
        }

        for task in primitives {
            let decoder = Arc::clone(&self.decoder);
            let shared = Arc::clone(&self.shared);
            let asset = Arc::clone(&asset);
            self.pool.push(move || {
                match decoder.decode_primitive(&asset, task.source_mesh, task.source_primitive) {
                    Ok(geometry) => {
                        let mut mesh = task.slot.write();
                        if let Some(primitive) = mesh.primitives.get_mut(task.primitive) {
                            primitive.geometry = geometry;
                        }
                    }
                    Err(e) => {
                        log::error!(
                            "primitive decode failed for mesh {:?} primitive {}: {e}",
                            task.mesh,
                            task.primitive
                        );
                    }
                }
                shared.tasks_left.fetch_sub(1, Ordering::AcqRel);
            });
        }
    }

    /// Loads an HDR environment map as an independent single task. Usable
    /// at any time, including mid-session; does not touch the countdown.
    pub fn load_environment(&self, path: PathBuf) {
        let (key, slot) = self.store.images.insert_slot(ImageData::default());
        let decoder = Arc::clone(&self.decoder);
        let store = self.store.clone();
        self.pool.push(move || {
            match decoder.decode_environment(&ImageSource::File(path.clone())) {
                Ok(image) => {
                    *slot.write() = image;
                    store.environment.write().hdri = Some(key);
                    store.request_update(DirtyFlags::IMAGES | DirtyFlags::ENVIRONMENT);
                }
                Err(e) => {
                    log::error!("failed to load environment map {}: {e}", path.display());
                }
            }
        });
    }
}

// ============================================================================
// Preprocessing (runs inside the parse task)
// ============================================================================

fn factor_to_byte(factor: f32) -> u8 {
    (255.0 * factor.clamp(0.0, 1.0)) as u8
}

/// Parses the asset and mints every store entry up front: materials with
/// their image slots, meshes with placeholder primitives, and the prefab
/// hierarchy with one template object per source node. Returns the flat
/// descriptor lists for the fan-out phase.
fn preprocess<D: AssetDecoder>(
    decoder: &D,
    store: &SceneStore,
    config: &ModelConfig,
) -> Result<ParsedSession<D::Asset>> {
    let (asset, summary) = decoder.parse(config)?;
    let base_name = config.base_name();

    let mut images = Vec::new();
    // Source material index -> store key, resolved when primitives bind.
    let mut material_keys: FxHashMap<usize, MaterialKey> = FxHashMap::default();

    for (id, desc) in summary.materials.iter().enumerate() {
        let mut material = Material {
            name: desc
                .name
                .clone()
                .unwrap_or_else(|| format!("{base_name}{id}")),
            ..Material::default()
        };
        if let Some(cutoff) = desc.alpha_cutoff {
            material.alpha_cutoff = cutoff;
        }

        // Albedo always gets a slot: either a decode task or the
        // factor-derived fallback pixel written right here.
        let (image, slot) = store.images.insert_slot(ImageData::default());
        material.albedo = Some(image);
        if let Some(source) = &desc.albedo {
            images.push(ImageTask {
                image,
                slot,
                source: source.clone(),
                color_space: ColorSpace::Srgb,
            });
        } else {
            let [r, g, b, a] = desc.base_color_factor;
            *slot.write() = ImageData::single_pixel(Pixel {
                r: factor_to_byte(r),
                g: factor_to_byte(g),
                b: factor_to_byte(b),
                a: factor_to_byte(a),
            });
        }

        if config.fetch_roughness {
            let (image, slot) = store.images.insert_slot(ImageData::default());
            material.roughness = Some(image);
            if let Some(source) = &desc.metallic_roughness {
                images.push(ImageTask {
                    image,
                    slot,
                    source: source.clone(),
                    color_space: ColorSpace::Linear,
                });
            } else {
                // glTF packs roughness in G and metallic in B.
                *slot.write() = ImageData::single_pixel(Pixel {
                    r: 0,
                    g: factor_to_byte(desc.roughness_factor),
                    b: factor_to_byte(desc.metallic_factor),
                    a: 0,
                });
            }
        }

        // A normal slot exists only when the source actually has a map.
        if let Some(source) = desc.normal.as_ref().filter(|_| config.fetch_normal) {
            let (image, slot) = store.images.insert_slot(ImageData::default());
            material.normal = Some(image);
            images.push(ImageTask {
                image,
                slot,
                source: source.clone(),
                color_space: ColorSpace::Linear,
            });
        }

        material_keys.insert(id, store.materials.insert(material));
    }

    let mut primitives = Vec::new();
    let mut mesh_keys = Vec::with_capacity(summary.meshes.len());

    for (source_mesh, desc) in summary.meshes.iter().enumerate() {
        let mesh = Mesh {
            name: match &desc.name {
                Some(name) => format!("{base_name} {name}"),
                None => base_name.clone(),
            },
            primitives: desc
                .primitives
                .iter()
                .map(|primitive| Primitive {
                    geometry: GeometryData::default(),
                    material: primitive
                        .material
                        .and_then(|id| material_keys.get(&id).copied()),
                })
                .collect(),
        };

        let (mesh_key, slot) = store.meshes.insert_slot(mesh);
        for source_primitive in 0..desc.primitives.len() {
            primitives.push(PrimitiveTask {
                mesh: mesh_key,
                slot: Arc::clone(&slot),
                primitive: source_primitive,
                source_mesh,
                source_primitive,
            });
        }
        mesh_keys.push(mesh_key);
    }

    // Prefab hierarchy: one template object per source scene node.
    let mut prefab = Prefab::new(base_name);
    let root = prefab.graph.root();
    for node in &summary.nodes {
        let mesh = node.mesh.and_then(|id| mesh_keys.get(id).copied());
        let object = store.objects.insert(Object::with_mesh(mesh));
        if let Some(key) =
            prefab
                .graph
                .add_leaf(root, object, node.name.clone().unwrap_or_default())
        {
            let leaf = prefab
                .graph
                .get_mut(key)
                .expect("node inserted just above");
            leaf.transform.translation = node.translation;
            leaf.transform.rotation = node.rotation;
            leaf.transform.scale = node.scale;
        }
    }
    store.prefabs.insert(prefab);

    Ok(ParsedSession {
        asset: Arc::new(asset),
        images,
        primitives,
    })
}

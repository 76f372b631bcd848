//! Asset ingestion:
//! - [`AssetDecoder`]: the synchronous decode boundary invoked from worker
//!   tasks (glTF parsing, image decoding, primitive geometry)
//! - [`AssetPipeline`]: the polling state machine that fans decode work
//!   out to the worker pool and detects completion via an atomic countdown

pub mod gltf;
pub mod pipeline;

pub use gltf::GltfDecoder;
pub use pipeline::{AssetPipeline, LoadStage};

use std::path::PathBuf;
use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::errors::Result;
use crate::scene::resources::{GeometryData, ImageData};

// ============================================================================
// Load configuration
// ============================================================================

/// Color space hint for image decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    Linear,
}

/// One model-load request.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Display name; defaults to the file stem when `None`.
    pub name: Option<String>,
    /// Whether to ingest metallic-roughness textures.
    pub fetch_roughness: bool,
    /// Whether to ingest normal maps.
    pub fetch_normal: bool,
}

impl ModelConfig {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            fetch_roughness: true,
            fetch_normal: true,
        }
    }

    /// The display name used for store entries minted from this model.
    #[must_use]
    pub fn base_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned())
        })
    }
}

/// Where the bytes of one image come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// An image file on disk (glTF URI references).
    File(PathBuf),
    /// Bytes embedded in the asset (GLB buffer views).
    Memory(Arc<[u8]>),
}

// ============================================================================
// Parsed-asset summary
// ============================================================================

/// Flat description of one source material.
#[derive(Debug, Clone)]
pub struct MaterialDesc {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    /// `Some` only for masked materials.
    pub alpha_cutoff: Option<f32>,
    pub albedo: Option<ImageSource>,
    pub metallic_roughness: Option<ImageSource>,
    pub normal: Option<ImageSource>,
}

/// Flat description of one primitive: only its material index — the
/// geometry itself stays inside the opaque parsed asset until a worker
/// decodes it.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveDesc {
    pub material: Option<usize>,
}

/// Flat description of one source mesh.
#[derive(Debug, Clone)]
pub struct MeshDesc {
    pub name: Option<String>,
    pub primitives: Vec<PrimitiveDesc>,
}

/// One node of the source scene hierarchy.
#[derive(Debug, Clone)]
pub struct NodeDesc {
    pub name: Option<String>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub mesh: Option<usize>,
}

/// Everything preprocessing needs to mint store entries and build the
/// task descriptors, without touching pixel or vertex data.
#[derive(Debug, Clone, Default)]
pub struct AssetSummary {
    pub materials: Vec<MaterialDesc>,
    pub meshes: Vec<MeshDesc>,
    pub nodes: Vec<NodeDesc>,
}

// ============================================================================
// Decode boundary
// ============================================================================

/// The synchronous, stateless decode boundary. Every method is called
/// from a worker task; implementations must be shareable across threads.
///
/// `Asset` is the parsed in-memory representation kept alive for the
/// duration of one ingestion session (e.g. a glTF document plus its
/// resolved buffers).
pub trait AssetDecoder: Send + Sync + 'static {
    type Asset: Send + Sync + 'static;

    /// Parses the raw asset and summarizes its contents.
    fn parse(&self, config: &ModelConfig) -> Result<(Self::Asset, AssetSummary)>;

    /// Decodes one image source into pixels.
    fn decode_image(&self, source: &ImageSource, color_space: ColorSpace) -> Result<ImageData>;

    /// Decodes the geometry of one primitive of one mesh.
    fn decode_primitive(
        &self,
        asset: &Self::Asset,
        mesh: usize,
        primitive: usize,
    ) -> Result<GeometryData>;

    /// Decodes an HDR environment map.
    fn decode_environment(&self, source: &ImageSource) -> Result<ImageData>;
}

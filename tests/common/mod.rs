#![allow(dead_code)]

//! Shared test fixtures: a scriptable in-memory decoder and polling
//! helpers for driving the asynchronous pipeline from a test thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use glam::{Quat, Vec3};

use talos::assets::{
    AssetDecoder, AssetPipeline, AssetSummary, ColorSpace, ImageSource, MaterialDesc, MeshDesc,
    ModelConfig, NodeDesc, PrimitiveDesc,
};
use talos::errors::{Result, TalosError};
use talos::scene::{GeometryData, ImageData, ImageFormat, Vertex};

/// Wires the `log` facade to test output. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct MockAsset {
    /// Primitive count per mesh, mirroring the summary.
    pub meshes: Vec<usize>,
}

/// Decoder with fully scripted output. Every decode produces data that
/// identifies its source, so tests can check each destination slot got
/// exactly its own result.
#[derive(Clone)]
pub struct MockDecoder {
    pub summary: AssetSummary,
    pub parse_calls: Arc<AtomicUsize>,
    pub fail_parse: bool,
    pub fail_images: bool,
    pub decode_delay: Duration,
}

impl MockDecoder {
    pub fn new(summary: AssetSummary) -> Self {
        Self {
            summary,
            parse_calls: Arc::new(AtomicUsize::new(0)),
            fail_parse: false,
            fail_images: false,
            decode_delay: Duration::ZERO,
        }
    }

    /// A decoder whose asset contains nothing at all.
    pub fn empty() -> Self {
        Self::new(AssetSummary::default())
    }
}

/// A material whose albedo decodes from an in-memory source tagged `id`.
pub fn material_with_albedo(id: u8) -> MaterialDesc {
    MaterialDesc {
        name: Some(format!("mat-{id}")),
        base_color_factor: [1.0; 4],
        metallic_factor: 0.0,
        roughness_factor: 1.0,
        alpha_cutoff: None,
        albedo: Some(ImageSource::Memory(Arc::from([id].as_slice()))),
        metallic_roughness: None,
        normal: None,
    }
}

/// A material with factors only (no texture sources).
pub fn material_plain(base_color_factor: [f32; 4]) -> MaterialDesc {
    MaterialDesc {
        name: None,
        base_color_factor,
        metallic_factor: 0.25,
        roughness_factor: 0.5,
        alpha_cutoff: None,
        albedo: None,
        metallic_roughness: None,
        normal: None,
    }
}

pub fn mesh_desc(name: &str, primitives: usize) -> MeshDesc {
    MeshDesc {
        name: Some(name.to_string()),
        primitives: (0..primitives)
            .map(|id| PrimitiveDesc { material: Some(id % 2) })
            .collect(),
    }
}

pub fn node_desc(name: &str, mesh: Option<usize>) -> NodeDesc {
    NodeDesc {
        name: Some(name.to_string()),
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
        mesh,
    }
}

/// A load request with texture fetching off, so image task counts equal
/// the number of scripted sources.
pub fn albedo_only_config() -> ModelConfig {
    let mut config = ModelConfig::new("mock.gltf");
    config.fetch_roughness = false;
    config.fetch_normal = false;
    config
}

impl AssetDecoder for MockDecoder {
    type Asset = MockAsset;

    fn parse(&self, _config: &ModelConfig) -> Result<(Self::Asset, AssetSummary)> {
        self.parse_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_parse {
            return Err(TalosError::InvalidData("scripted parse failure".to_string()));
        }
        let meshes = self.summary.meshes.iter().map(|m| m.primitives.len()).collect();
        Ok((MockAsset { meshes }, self.summary.clone()))
    }

    fn decode_image(&self, source: &ImageSource, color_space: ColorSpace) -> Result<ImageData> {
        thread::sleep(self.decode_delay);
        if self.fail_images {
            return Err(TalosError::ImageDecodeError("scripted decode failure".to_string()));
        }
        let id = match source {
            ImageSource::Memory(bytes) => bytes.first().copied().unwrap_or(0),
            ImageSource::File(_) => 0,
        };
        let format = match color_space {
            ColorSpace::Srgb => ImageFormat::Rgba8Srgb,
            ColorSpace::Linear => ImageFormat::Rgba8Unorm,
        };
        Ok(ImageData::new(format!("decoded-{id}"), 2, 2, format, vec![id; 16]))
    }

    fn decode_primitive(
        &self,
        asset: &Self::Asset,
        mesh: usize,
        primitive: usize,
    ) -> Result<GeometryData> {
        thread::sleep(self.decode_delay);
        let primitives = *asset.meshes.get(mesh).ok_or_else(|| {
            TalosError::AssetIndexOutOfBounds { context: "mock mesh".to_string(), index: mesh }
        })?;
        if primitive >= primitives {
            return Err(TalosError::AssetIndexOutOfBounds {
                context: "mock primitive".to_string(),
                index: primitive,
            });
        }
        // Position encodes the source indices.
        let vertex = Vertex {
            position: [mesh as f32, primitive as f32, 0.0],
            ..Vertex::default()
        };
        Ok(GeometryData { vertices: vec![vertex; 3], indices: vec![0, 1, 2] })
    }

    fn decode_environment(&self, _source: &ImageSource) -> Result<ImageData> {
        thread::sleep(self.decode_delay);
        Ok(ImageData::new("mock-env", 4, 2, ImageFormat::Rgba16Float, vec![0; 4 * 2 * 8]))
    }
}

pub const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Polls `on_update` until the pipeline reports idle again.
pub fn drive_until_idle<D: AssetDecoder>(pipeline: &mut AssetPipeline<D>) {
    let deadline = Instant::now() + POLL_TIMEOUT;
    while !pipeline.is_idle() {
        pipeline.on_update();
        assert!(Instant::now() < deadline, "pipeline never returned to idle");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Waits for an arbitrary condition signaled from a worker thread.
pub fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + POLL_TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition never became true");
        thread::sleep(Duration::from_millis(1));
    }
}

//! Scene resource value types.
//!
//! These are the values held by the [`SceneStore`](crate::scene::SceneStore)
//! collections. They are created with placeholder contents on the
//! coordinating thread during preprocessing and filled in concurrently by
//! decode workers, so each type has a cheap, well-defined placeholder state.

use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Vec3};

use crate::scene::{ImageKey, MaterialKey, MeshKey};

// ============================================================================
// Images
// ============================================================================

/// A single RGBA8 pixel, used for factor-derived fallback images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub const WHITE: Pixel = Pixel { r: 255, g: 255, b: 255, a: 255 };
}

/// Pixel format of an [`ImageData`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// 8-bit RGBA, linear.
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB transfer.
    Rgba8Srgb,
    /// 16-bit float RGBA, used for HDR environment maps.
    Rgba16Float,
}

impl ImageFormat {
    /// Bytes per pixel for this format.
    #[must_use]
    pub fn pixel_size(self) -> usize {
        match self {
            ImageFormat::Rgba8Unorm | ImageFormat::Rgba8Srgb => 4,
            ImageFormat::Rgba16Float => 8,
        }
    }
}

/// Decoded pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

impl ImageData {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: ImageFormat,
        data: Vec<u8>,
    ) -> Self {
        Self { name: name.into(), width, height, format, data }
    }

    /// A 1x1 image holding one pixel. Used for factor-only material
    /// channels and as the placeholder written before decode completes.
    #[must_use]
    pub fn single_pixel(pixel: Pixel) -> Self {
        Self {
            name: String::new(),
            width: 1,
            height: 1,
            format: ImageFormat::Rgba8Unorm,
            data: vec![pixel.r, pixel.g, pixel.b, pixel.a],
        }
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

impl Default for ImageData {
    fn default() -> Self {
        Self::single_pixel(Pixel::WHITE)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Interleaved vertex layout shared by every primitive.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0, 0.0, 1.0],
            uv: [0.0; 2],
            tangent: [1.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Decoded triangle-list geometry for one primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl GeometryData {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Size of the vertex buffer in bytes.
    #[must_use]
    pub fn vertex_bytes(&self) -> usize {
        std::mem::size_of_val(self.vertices.as_slice())
    }
}

// ============================================================================
// Meshes & Materials
// ============================================================================

/// One drawable piece of a mesh. Created with empty geometry during
/// preprocessing; the geometry is filled in by a decode worker.
#[derive(Debug, Clone, Default)]
pub struct Primitive {
    pub geometry: GeometryData,
    pub material: Option<MaterialKey>,
}

/// An ordered sequence of primitives.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<Primitive>,
}

/// PBR material referencing image entries by key.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub albedo: Option<ImageKey>,
    pub roughness: Option<ImageKey>,
    pub normal: Option<ImageKey>,
    pub alpha_cutoff: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            albedo: None,
            roughness: None,
            normal: None,
            alpha_cutoff: 0.5,
        }
    }
}

// ============================================================================
// Objects & Environment
// ============================================================================

/// A renderable instance: an optional mesh plus its world transform.
///
/// The world transform is written by
/// [`SceneGraph::update_transforms`](crate::scene::SceneGraph::update_transforms);
/// objects never store local TRS themselves.
#[derive(Debug, Clone)]
pub struct Object {
    pub mesh: Option<MeshKey>,
    pub transform: Affine3A,
}

impl Object {
    #[must_use]
    pub fn with_mesh(mesh: Option<MeshKey>) -> Self {
        Self { mesh, transform: Affine3A::IDENTITY }
    }
}

impl Default for Object {
    fn default() -> Self {
        Self { mesh: None, transform: Affine3A::IDENTITY }
    }
}

/// Global lighting environment.
#[derive(Debug, Clone)]
pub struct Environment {
    pub dir_light_on: bool,
    pub light_dir: Vec3,
    pub hdri: Option<ImageKey>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            dir_light_on: true,
            light_dir: Vec3::new(-0.71, -0.08, 0.7),
            hdri: None,
        }
    }
}

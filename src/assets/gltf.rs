//! glTF decode boundary.
//!
//! Implements [`AssetDecoder`] over the `gltf` and `image` crates. Parsing
//! resolves external buffers eagerly (they are needed by every primitive
//! decode) but leaves image pixels and vertex data untouched — those are
//! decoded later, one worker task per destination slot.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::assets::{
    AssetDecoder, AssetSummary, ColorSpace, ImageSource, MaterialDesc, MeshDesc, ModelConfig,
    NodeDesc, PrimitiveDesc,
};
use crate::errors::{Result, TalosError};
use crate::scene::resources::{GeometryData, ImageData, ImageFormat, Vertex};

/// Parsed glTF document plus its resolved binary buffers.
pub struct GltfAsset {
    pub document: gltf::Document,
    pub buffers: Vec<Vec<u8>>,
}

/// Stateless glTF decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfDecoder;

impl GltfDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn load_buffers(gltf: &gltf::Gltf, base_path: &Path) -> Result<Vec<Vec<u8>>> {
        let mut buffer_data = Vec::new();
        for buffer in gltf.buffers() {
            match buffer.source() {
                gltf::buffer::Source::Bin => {
                    let blob = gltf.blob.as_deref().ok_or_else(|| {
                        TalosError::GltfError("missing GLB binary chunk".to_string())
                    })?;
                    buffer_data.push(blob.to_vec());
                }
                gltf::buffer::Source::Uri(uri) => {
                    let buffer_path = base_path.join(uri);
                    buffer_data.push(fs::read(&buffer_path)?);
                }
            }
        }
        Ok(buffer_data)
    }

    /// Resolves the byte source of one texture slot, if it has one.
    fn image_source(
        info: Option<gltf::texture::Texture>,
        base_path: &Path,
        buffers: &[Vec<u8>],
    ) -> Option<ImageSource> {
        let image = info?.source();
        match image.source() {
            gltf::image::Source::Uri { uri, .. } => Some(ImageSource::File(base_path.join(uri))),
            gltf::image::Source::View { view, .. } => {
                let start = view.offset();
                let end = start + view.length();
                let bytes = buffers.get(view.buffer().index())?.get(start..end)?;
                Some(ImageSource::Memory(Arc::from(bytes)))
            }
        }
    }

    fn summarize_materials(
        document: &gltf::Document,
        base_path: &Path,
        buffers: &[Vec<u8>],
        config: &ModelConfig,
    ) -> Vec<MaterialDesc> {
        document
            .materials()
            .map(|material| {
                let pbr = material.pbr_metallic_roughness();
                let alpha_cutoff = match material.alpha_mode() {
                    gltf::material::AlphaMode::Mask => {
                        Some(material.alpha_cutoff().unwrap_or(0.5))
                    }
                    _ => None,
                };
                MaterialDesc {
                    name: material.name().map(str::to_owned),
                    base_color_factor: pbr.base_color_factor(),
                    metallic_factor: pbr.metallic_factor(),
                    roughness_factor: pbr.roughness_factor(),
                    alpha_cutoff,
                    albedo: Self::image_source(
                        pbr.base_color_texture().map(|info| info.texture()),
                        base_path,
                        buffers,
                    ),
                    metallic_roughness: config
                        .fetch_roughness
                        .then(|| {
                            Self::image_source(
                                pbr.metallic_roughness_texture().map(|info| info.texture()),
                                base_path,
                                buffers,
                            )
                        })
                        .flatten(),
                    normal: config
                        .fetch_normal
                        .then(|| {
                            Self::image_source(
                                material.normal_texture().map(|info| info.texture()),
                                base_path,
                                buffers,
                            )
                        })
                        .flatten(),
                }
            })
            .collect()
    }

    fn summarize_meshes(document: &gltf::Document) -> Vec<MeshDesc> {
        document
            .meshes()
            .map(|mesh| MeshDesc {
                name: mesh.name().map(str::to_owned),
                primitives: mesh
                    .primitives()
                    .map(|primitive| PrimitiveDesc {
                        material: primitive.material().index(),
                    })
                    .collect(),
            })
            .collect()
    }

    fn summarize_nodes(document: &gltf::Document) -> Vec<NodeDesc> {
        let Some(scene) = document.default_scene().or_else(|| document.scenes().next())
        else {
            return Vec::new();
        };
        scene
            .nodes()
            .map(|node| {
                let (translation, rotation, scale) = node.transform().decomposed();
                NodeDesc {
                    name: node.name().map(str::to_owned),
                    translation: Vec3::from_array(translation),
                    rotation: Quat::from_array(rotation),
                    scale: Vec3::from_array(scale),
                    mesh: node.mesh().map(|m| m.index()),
                }
            })
            .collect()
    }

    fn decode_rgba8(source: &ImageSource, color_space: ColorSpace) -> Result<ImageData> {
        let (img, name) = match source {
            ImageSource::File(path) => (
                image::open(path).map_err(|e| {
                    TalosError::ImageDecodeError(format!(
                        "failed to decode {}: {e}",
                        path.display()
                    ))
                })?,
                path.display().to_string(),
            ),
            ImageSource::Memory(bytes) => (
                image::load_from_memory(bytes)?,
                "embedded".to_string(),
            ),
        };
        let (width, height) = (img.width(), img.height());
        let rgba = img.into_rgba8();
        Ok(ImageData::new(
            name,
            width,
            height,
            match color_space {
                ColorSpace::Srgb => ImageFormat::Rgba8Srgb,
                ColorSpace::Linear => ImageFormat::Rgba8Unorm,
            },
            rgba.into_raw(),
        ))
    }
}

impl AssetDecoder for GltfDecoder {
    type Asset = GltfAsset;

    fn parse(&self, config: &ModelConfig) -> Result<(Self::Asset, AssetSummary)> {
        let file = fs::File::open(&config.path)?;
        let gltf = gltf::Gltf::from_reader(std::io::BufReader::new(file))?;

        let base_path = config.path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let buffers = Self::load_buffers(&gltf, &base_path)?;

        let summary = AssetSummary {
            materials: Self::summarize_materials(&gltf.document, &base_path, &buffers, config),
            meshes: Self::summarize_meshes(&gltf.document),
            nodes: Self::summarize_nodes(&gltf.document),
        };

        Ok((GltfAsset { document: gltf.document, buffers }, summary))
    }

    fn decode_image(&self, source: &ImageSource, color_space: ColorSpace) -> Result<ImageData> {
        Self::decode_rgba8(source, color_space)
    }

    fn decode_primitive(
        &self,
        asset: &Self::Asset,
        mesh: usize,
        primitive: usize,
    ) -> Result<GeometryData> {
        let mesh_handle = asset.document.meshes().nth(mesh).ok_or_else(|| {
            TalosError::AssetIndexOutOfBounds { context: "glTF mesh".to_string(), index: mesh }
        })?;
        let prim = mesh_handle.primitives().nth(primitive).ok_or_else(|| {
            TalosError::AssetIndexOutOfBounds {
                context: "glTF primitive".to_string(),
                index: primitive,
            }
        })?;

        let reader = prim.reader(|buffer| asset.buffers.get(buffer.index()).map(Vec::as_slice));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .map(Iterator::collect)
            .unwrap_or_default();
        if positions.is_empty() {
            return Ok(GeometryData::default());
        }

        let mut vertices: Vec<Vertex> = positions
            .into_iter()
            .map(|position| Vertex { position, ..Vertex::default() })
            .collect();

        if let Some(normals) = reader.read_normals() {
            for (vertex, normal) in vertices.iter_mut().zip(normals) {
                vertex.normal = normal;
            }
        }
        if let Some(uvs) = reader.read_tex_coords(0).map(|r| r.into_f32()) {
            for (vertex, uv) in vertices.iter_mut().zip(uvs) {
                vertex.uv = uv;
            }
        }
        if let Some(tangents) = reader.read_tangents() {
            for (vertex, tangent) in vertices.iter_mut().zip(tangents) {
                vertex.tangent = tangent;
            }
        }

        let indices: Vec<u32> = reader.read_indices().map_or_else(
            || (0..vertices.len() as u32).collect(),
            |iter| iter.into_u32().collect(),
        );

        Ok(GeometryData { vertices, indices })
    }

    fn decode_environment(&self, source: &ImageSource) -> Result<ImageData> {
        let (img, name) = match source {
            ImageSource::File(path) => (
                image::open(path).map_err(|e| {
                    TalosError::ImageDecodeError(format!(
                        "failed to decode HDR {}: {e}",
                        path.display()
                    ))
                })?,
                path.display().to_string(),
            ),
            ImageSource::Memory(bytes) => (
                image::load_from_memory(bytes)?,
                "embedded".to_string(),
            ),
        };

        let (width, height) = (img.width(), img.height());
        let rgb32f = img.into_rgb32f();

        // RGB32F -> RGBA16F, the layout the IBL path samples from.
        let mut data = Vec::with_capacity((width * height) as usize * 8);
        for pixel in rgb32f.pixels() {
            for channel in [pixel[0], pixel[1], pixel[2], 1.0] {
                data.extend_from_slice(&half::f16::from_f32(channel).to_le_bytes());
            }
        }

        Ok(ImageData::new(name, width, height, ImageFormat::Rgba16Float, data))
    }
}

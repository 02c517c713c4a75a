//! glTF / GLB import into the stage's node tree.
//!
//! Only the JSON side of the asset is needed here: bounds come from the
//! POSITION accessor min/max and clip durations from the sampler input max, so
//! geometry buffers and images stay with the renderer. That also lets Draco
//! compressed assets load without decoding, as long as a decoder is configured
//! for the renderer to use.

use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use glam::Vec3;

use crate::assets::{read_with_progress, short_name, AssetError, LoadHandle, ModelSource};
use crate::scene::animation::AnimationClip;
use crate::scene::material::{EmissiveMap, Material, TextureRef};
use crate::scene::{Aabb, MeshNode, Model, SceneNode, Transform};

pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Required extensions the node tree can be built without.
const TOLERATED_EXTENSIONS: &[&str] = &[
    "KHR_materials_emissive_strength",
    "KHR_texture_transform",
    "KHR_mesh_quantization",
    "KHR_materials_unlit",
];

#[derive(Debug, Clone, Default)]
pub struct GltfLoader {
    draco_decoder: Option<PathBuf>,
}

impl GltfLoader {
    pub fn new(draco_decoder: Option<PathBuf>) -> Self {
        Self { draco_decoder }
    }
}

impl ModelSource for GltfLoader {
    fn load_model(&self, uri: &str) -> LoadHandle<Model> {
        let owned_uri = uri.to_string();
        let decoder = self.draco_decoder.clone();
        LoadHandle::spawn(uri, move |completer| {
            let bytes = read_with_progress(&owned_uri, completer)?;
            parse_model(&owned_uri, &bytes, decoder.as_ref())
        })
    }
}

#[derive(serde::Deserialize)]
struct Header {
    #[serde(default, rename = "extensionsRequired")]
    extensions_required: Vec<String>,
}

/// Lists `extensionsRequired` from either a `.gltf` document or a GLB container.
pub fn required_extensions(bytes: &[u8]) -> Result<Vec<String>, AssetError> {
    let json: Cow<'_, [u8]> = if bytes.starts_with(b"glTF") {
        ::gltf::Glb::from_slice(bytes)?.json
    } else {
        Cow::Borrowed(bytes)
    };
    let header: Header = serde_json::from_slice(&json)?;
    Ok(header.extensions_required)
}

/// Builds a [`Model`] from raw `.gltf` / `.glb` bytes.
pub fn parse_model(
    uri: &str,
    bytes: &[u8],
    draco_decoder: Option<&PathBuf>,
) -> Result<Model, AssetError> {
    let required = required_extensions(bytes)?;
    let mut compressed = false;
    for extension in &required {
        if extension == DRACO_EXTENSION {
            let decoder = draco_decoder.ok_or_else(|| AssetError::MissingDecoder {
                extension: extension.clone(),
            })?;
            if !decoder.exists() {
                return Err(AssetError::DecoderNotFound {
                    path: decoder.display().to_string(),
                });
            }
            compressed = true;
        } else if !TOLERATED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AssetError::UnsupportedExtension {
                extension: extension.clone(),
            });
        }
    }

    // Required extensions the parser does not know fail validation, so
    // anything that got this far is parsed unvalidated.
    let gltf = if required.is_empty() {
        ::gltf::Gltf::from_slice(bytes)?
    } else {
        ::gltf::Gltf::from_slice_without_validation(bytes)?
    };
    let document = &gltf.document;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(AssetError::NoScene)?;

    let materials: Vec<Arc<Material>> = document
        .materials()
        .map(|material| Arc::new(convert_material(&material)))
        .collect();
    let joints: HashSet<usize> = document
        .skins()
        .flat_map(|skin| skin.joints().map(|joint| joint.index()).collect::<Vec<_>>())
        .collect();

    let builder = NodeBuilder {
        materials: &materials,
        joints: &joints,
    };
    let nodes = scene
        .nodes()
        .map(|node| builder.build(&node))
        .collect::<Vec<_>>();

    let clips = document
        .animations()
        .enumerate()
        .map(|(index, animation)| {
            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Clip {index}"));
            let mut duration = 0.0f32;
            let mut channels = 0usize;
            for channel in animation.channels() {
                channels += 1;
                let input = channel.sampler().input();
                if let Some(max) = input.max().as_ref().and_then(first_scalar) {
                    duration = duration.max(max);
                }
            }
            AnimationClip::new(name, duration, channels)
        })
        .collect();

    let name = scene
        .name()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| model_name_from_uri(uri));

    let mut model = Model::new(name, nodes);
    model.uri = uri.to_string();
    model.digest = format!("{:x}", Sha256::digest(bytes));
    model.clips = clips;
    model.compressed_geometry = compressed;
    Ok(model)
}

struct NodeBuilder<'a> {
    materials: &'a [Arc<Material>],
    joints: &'a HashSet<usize>,
}

impl NodeBuilder<'_> {
    fn build(&self, node: &::gltf::Node<'_>) -> SceneNode {
        let (translation, rotation, scale) = node.transform().decomposed();
        let transform = Transform::from_decomposed(translation, rotation, scale);
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node{}", node.index()));

        let mut out = match node.mesh() {
            Some(mesh) => {
                let mut primitives: Vec<SceneNode> = mesh
                    .primitives()
                    .enumerate()
                    .map(|(index, primitive)| {
                        let bounds = primitive_bounds(&primitive);
                        let material = primitive
                            .material()
                            .index()
                            .and_then(|i| self.materials.get(i))
                            .cloned();
                        SceneNode::mesh(
                            format!("{name}.{index}"),
                            Transform::IDENTITY,
                            MeshNode::new(bounds, material),
                        )
                    })
                    .collect();
                if primitives.len() == 1 {
                    let mut single = primitives.remove(0);
                    single.name = name;
                    single.transform = transform;
                    single
                } else {
                    SceneNode::group(name, transform, primitives)
                }
            }
            None if self.joints.contains(&node.index()) => SceneNode::bone(name, transform),
            None => SceneNode::group(name, transform, Vec::new()),
        };

        for child in node.children() {
            out.children.push(self.build(&child));
        }
        out
    }
}

fn primitive_bounds(primitive: &::gltf::Primitive<'_>) -> Aabb {
    let Some(accessor) = primitive.get(&::gltf::Semantic::Positions) else {
        return Aabb::EMPTY;
    };
    match (
        accessor.min().as_ref().and_then(vec3_value),
        accessor.max().as_ref().and_then(vec3_value),
    ) {
        (Some(min), Some(max)) => Aabb::new(min, max),
        _ => Aabb::EMPTY,
    }
}

fn vec3_value(value: &serde_json::Value) -> Option<Vec3> {
    let items = value.as_array()?;
    if items.len() < 3 {
        return None;
    }
    Some(Vec3::new(
        items[0].as_f64()? as f32,
        items[1].as_f64()? as f32,
        items[2].as_f64()? as f32,
    ))
}

fn first_scalar(value: &serde_json::Value) -> Option<f32> {
    value.as_array()?.first()?.as_f64().map(|v| v as f32)
}

fn texture_ref(texture: ::gltf::Texture<'_>, tex_coord: u32) -> TextureRef {
    TextureRef {
        index: texture.index(),
        name: texture.name().map(str::to_string),
        tex_coord,
    }
}

fn convert_material(material: &::gltf::Material<'_>) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let normal = material.normal_texture();
    let occlusion = material.occlusion_texture();
    Material {
        name: material.name().map(str::to_string),
        base_color_factor: pbr.base_color_factor(),
        diffuse_map: pbr
            .base_color_texture()
            .map(|info| texture_ref(info.texture(), info.tex_coord())),
        normal_scale: normal.as_ref().map_or(1.0, |n| n.scale()),
        normal_map: normal.map(|n| texture_ref(n.texture(), n.tex_coord())),
        occlusion_strength: occlusion.as_ref().map_or(1.0, |o| o.strength()),
        occlusion_map: occlusion.map(|o| texture_ref(o.texture(), o.tex_coord())),
        metalness: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        emissive_color: material.emissive_factor(),
        emissive_intensity: 1.0,
        emissive_map: material
            .emissive_texture()
            .map(|info| EmissiveMap::Texture(texture_ref(info.texture(), info.tex_coord()))),
    }
}

fn model_name_from_uri(uri: &str) -> String {
    let file = short_name(uri);
    file.rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file)
        .to_string()
}

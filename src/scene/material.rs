//! Materials and overlay compositing.
//!
//! Materials are immutable once built and shared through `Arc`. Compositing an
//! overlay never touches the existing record: a new material is derived from
//! the base channels of the old one and swapped into the mesh node.

use std::fmt;
use std::sync::Arc;

use crate::diagnostics::Diagnostics;
use crate::error::{validate_mix_factor, Result, StageError};
use crate::scene::Model;

/// Reference to a texture owned by the source asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRef {
    pub index: usize,
    pub name: Option<String>,
    pub tex_coord: u32,
}

/// Decoded RGBA8 overlay image.
pub struct OverlayImage {
    pub uri: String,
    pub pixels: image::RgbaImage,
}

impl OverlayImage {
    pub fn new(uri: impl Into<String>, pixels: image::RgbaImage) -> Self {
        Self {
            uri: uri.into(),
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

impl fmt::Debug for OverlayImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayImage")
            .field("uri", &self.uri)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum EmissiveMap {
    Texture(TextureRef),
    Overlay(Arc<OverlayImage>),
}

impl PartialEq for EmissiveMap {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Texture(a), Self::Texture(b)) => a == b,
            (Self::Overlay(a), Self::Overlay(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    pub diffuse_map: Option<TextureRef>,
    pub normal_map: Option<TextureRef>,
    pub normal_scale: f32,
    pub occlusion_map: Option<TextureRef>,
    pub occlusion_strength: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub emissive_color: [f32; 3],
    pub emissive_intensity: f32,
    pub emissive_map: Option<EmissiveMap>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            diffuse_map: None,
            normal_map: None,
            normal_scale: 1.0,
            occlusion_map: None,
            occlusion_strength: 1.0,
            metalness: 1.0,
            roughness: 1.0,
            emissive_color: [0.0, 0.0, 0.0],
            emissive_intensity: 1.0,
            emissive_map: None,
        }
    }
}

impl Material {
    /// Derives a material that keeps every base channel and adds the overlay
    /// as a white-tinted emissive contribution of strength `mix_factor`.
    pub fn with_overlay(&self, overlay: &Arc<OverlayImage>, mix_factor: f32) -> Material {
        Material {
            name: self.name.clone(),
            base_color_factor: self.base_color_factor,
            diffuse_map: self.diffuse_map.clone(),
            normal_map: self.normal_map.clone(),
            normal_scale: self.normal_scale,
            occlusion_map: self.occlusion_map.clone(),
            occlusion_strength: self.occlusion_strength,
            metalness: self.metalness,
            roughness: self.roughness,
            emissive_color: [1.0, 1.0, 1.0],
            emissive_intensity: mix_factor,
            emissive_map: Some(EmissiveMap::Overlay(Arc::clone(overlay))),
        }
    }

    pub fn has_overlay(&self) -> bool {
        matches!(self.emissive_map, Some(EmissiveMap::Overlay(_)))
    }
}

pub struct MaterialCompositor {
    diagnostics: Diagnostics,
}

impl MaterialCompositor {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// Swaps every mesh material for an overlay-blended copy.
    ///
    /// Returns the number of meshes recoloured. Meshes without a material are
    /// skipped. Invalid input is rejected before anything is touched.
    pub fn apply_overlay(
        &self,
        model: &mut Model,
        overlay: &Arc<OverlayImage>,
        mix_factor: f32,
    ) -> Result<usize> {
        let mix_factor = match validate_mix_factor(mix_factor) {
            Ok(value) => value,
            Err(err) => {
                self.diagnostics.error(format!("overlay rejected: {err}"));
                return Err(err);
            }
        };
        if overlay.width() == 0 || overlay.height() == 0 {
            let err = StageError::InvalidParameter(format!(
                "overlay image {} is empty",
                overlay.uri
            ));
            self.diagnostics.error(format!("overlay rejected: {err}"));
            return Err(err);
        }

        let mut replaced = 0usize;
        let mut skipped = 0usize;
        model.visit_meshes_mut(|_, mesh| {
            let Some(existing) = mesh.material.as_deref() else {
                skipped += 1;
                return;
            };
            let derived = Arc::new(existing.with_overlay(overlay, mix_factor));
            mesh.material = Some(derived);
            replaced += 1;
        });

        self.diagnostics.info(format!(
            "overlay {} blended into {} meshes of '{}' (mix {:.2}, {} without material)",
            overlay.uri, replaced, model.name, mix_factor, skipped
        ));
        Ok(replaced)
    }

    /// Puts back the materials each mesh was loaded with.
    pub fn clear_overlay(&self, model: &mut Model) -> usize {
        let mut restored = 0usize;
        model.visit_meshes_mut(|_, mesh| {
            let changed = match (&mesh.material, &mesh.source_material) {
                (Some(current), Some(source)) => !Arc::ptr_eq(current, source),
                (None, None) => false,
                _ => true,
            };
            if changed {
                mesh.material = mesh.source_material.clone();
                restored += 1;
            }
        });
        self.diagnostics
            .info(format!("restored {} materials on '{}'", restored, model.name));
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Level, RecordingSink};
    use crate::scene::fixtures::{box_model, boxed_mesh};
    use std::rc::Rc;

    fn same_base_channels(a: &Material, b: &Material) -> bool {
        a.base_color_factor == b.base_color_factor
            && a.diffuse_map == b.diffuse_map
            && a.normal_map == b.normal_map
            && a.normal_scale == b.normal_scale
            && a.occlusion_map == b.occlusion_map
            && a.occlusion_strength == b.occlusion_strength
            && a.metalness == b.metalness
            && a.roughness == b.roughness
    }

    fn overlay(width: u32, height: u32) -> Arc<OverlayImage> {
        Arc::new(OverlayImage::new(
            "overlay.png",
            image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255])),
        ))
    }

    fn textured() -> Material {
        Material {
            name: Some("Skin".to_string()),
            base_color_factor: [0.8, 0.7, 0.6, 1.0],
            diffuse_map: Some(TextureRef {
                index: 0,
                name: Some("albedo".to_string()),
                tex_coord: 0,
            }),
            normal_map: Some(TextureRef {
                index: 1,
                name: None,
                tex_coord: 0,
            }),
            normal_scale: 0.5,
            occlusion_map: Some(TextureRef {
                index: 2,
                name: None,
                tex_coord: 1,
            }),
            occlusion_strength: 0.9,
            metalness: 0.1,
            roughness: 0.6,
            ..Material::default()
        }
    }

    fn compositor() -> (MaterialCompositor, RecordingSink) {
        let sink = RecordingSink::new();
        let diagnostics = Diagnostics::new("compositor", Rc::new(sink.clone()));
        (MaterialCompositor::new(diagnostics), sink)
    }

    #[test]
    fn overlay_keeps_base_channels_for_every_mix() {
        let (compositor, _) = compositor();
        let image = overlay(4, 4);
        for step in 0..=10 {
            let mix = step as f32 / 10.0;
            let original = Arc::new(textured());
            let mut model = Model::new(
                "skinned",
                vec![boxed_mesh([0.0; 3], [1.0; 3], Some(Arc::clone(&original)))],
            );

            let replaced = compositor.apply_overlay(&mut model, &image, mix).unwrap();
            assert_eq!(replaced, 1);

            let current = model.materials()[0].clone().unwrap();
            assert!(!Arc::ptr_eq(&current, &original));
            assert!(same_base_channels(&current, &original));
            assert_eq!(current.emissive_intensity, mix);
            assert_eq!(current.emissive_color, [1.0, 1.0, 1.0]);
            assert!(current.has_overlay());
            // The original record is untouched.
            assert_eq!(*original, textured());
        }
    }

    #[test]
    fn bad_mix_leaves_material_reference_identical() {
        let (compositor, sink) = compositor();
        let image = overlay(2, 2);
        for mix in [-0.01, 1.5, f32::NAN, f32::NEG_INFINITY] {
            let mut model = box_model("box", [0.0; 3], [1.0; 3]);
            let before = model.materials()[0].clone().unwrap();
            let err = compositor.apply_overlay(&mut model, &image, mix).unwrap_err();
            assert!(matches!(err, StageError::InvalidParameter(_)));
            let after = model.materials()[0].clone().unwrap();
            assert!(Arc::ptr_eq(&before, &after));
        }
        assert_eq!(sink.count(Level::Error), 4);
    }

    #[test]
    fn empty_overlay_is_rejected() {
        let (compositor, _) = compositor();
        let mut model = box_model("box", [0.0; 3], [1.0; 3]);
        let err = compositor
            .apply_overlay(&mut model, &overlay(0, 0), 0.5)
            .unwrap_err();
        assert!(matches!(err, StageError::InvalidParameter(_)));
        assert!(!model.materials()[0].as_ref().unwrap().has_overlay());
    }

    #[test]
    fn meshes_without_material_are_skipped() {
        let (compositor, sink) = compositor();
        let mut model = box_model("box", [0.0; 3], [1.0; 3]);
        model.nodes.push(boxed_mesh([0.0; 3], [1.0; 3], None));

        let replaced = compositor.apply_overlay(&mut model, &overlay(1, 1), 0.25).unwrap();
        assert_eq!(replaced, 1);
        let materials = model.materials();
        assert!(materials[0].as_ref().unwrap().has_overlay());
        assert!(materials[1].is_none());
        assert!(sink.contains(Level::Info, "1 without material"));
    }

    #[test]
    fn shared_material_stays_valid_elsewhere() {
        let (compositor, _) = compositor();
        let shared = Arc::new(textured());
        let mut model = Model::new(
            "twins",
            vec![
                boxed_mesh([0.0; 3], [1.0; 3], Some(Arc::clone(&shared))),
                boxed_mesh([1.0; 3], [2.0; 3], Some(Arc::clone(&shared))),
            ],
        );
        let cached = Arc::clone(&shared);

        compositor.apply_overlay(&mut model, &overlay(2, 2), 0.5).unwrap();
        assert!(model
            .materials()
            .iter()
            .all(|m| !Arc::ptr_eq(m.as_ref().unwrap(), &cached)));
        assert_eq!(*cached, textured());
    }

    #[test]
    fn clear_overlay_restores_loaded_materials() {
        let (compositor, _) = compositor();
        let mut model = box_model("box", [0.0; 3], [1.0; 3]);
        let loaded = model.materials()[0].clone().unwrap();

        compositor.apply_overlay(&mut model, &overlay(2, 2), 0.7).unwrap();
        compositor.apply_overlay(&mut model, &overlay(2, 2), 0.2).unwrap();
        let current = model.materials()[0].clone().unwrap();
        assert_eq!(current.emissive_intensity, 0.2);

        assert_eq!(compositor.clear_overlay(&mut model), 1);
        let restored = model.materials()[0].clone().unwrap();
        assert!(Arc::ptr_eq(&restored, &loaded));
        assert_eq!(compositor.clear_overlay(&mut model), 0);
    }
}

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::{Result, StageError};
use crate::scene::Model;

/// Where the normalized model's bounding-box centre ends up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Anchor {
    /// Centre on the origin.
    Center,
    /// Centre at `(0, height, 0)`, above the ground plane.
    Ground { height: f32 },
}

impl Anchor {
    fn point(&self) -> Vec3 {
        match *self {
            Anchor::Center => Vec3::ZERO,
            Anchor::Ground { height } => Vec3::new(0.0, height, 0.0),
        }
    }
}

/// Fits freshly loaded models into a box of `target_size` units.
pub struct ModelPlacer {
    target_size: f32,
    anchor: Anchor,
    diagnostics: Diagnostics,
}

impl ModelPlacer {
    pub fn new(target_size: f32, anchor: Anchor, diagnostics: Diagnostics) -> Self {
        Self {
            target_size,
            anchor,
            diagnostics,
        }
    }

    /// Scales the root uniformly so the largest extent equals the target size,
    /// then moves the bounds centre to the anchor. Returns the applied factor.
    ///
    /// A zero extent on any axis leaves the root untouched.
    pub fn place(&self, model: &mut Model) -> Result<f32> {
        if !self.target_size.is_finite() || self.target_size <= 0.0 {
            return Err(StageError::InvalidParameter(format!(
                "target unit size {} must be positive",
                self.target_size
            )));
        }

        let bounds = model.world_bounds();
        let extent = bounds.extent();
        if bounds.is_empty() || !extent.is_finite() || extent.min_element() <= 0.0 {
            let err = StageError::DegenerateGeometry {
                extent: extent.to_array(),
            };
            self.diagnostics
                .warn(format!("'{}' kept at native scale: {err}", model.name));
            return Err(err);
        }

        let factor = self.target_size / extent.max_element();
        model.root.scale *= factor;

        let scaled = model.world_bounds();
        model.root.translation += self.anchor.point() - scaled.center();

        self.diagnostics.info(format!(
            "placed '{}': extent {:?} scaled by {:.4}",
            model.name,
            extent.to_array(),
            factor
        ));
        Ok(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Level, RecordingSink};
    use crate::scene::fixtures::box_model;
    use crate::scene::Transform;
    use std::rc::Rc;

    fn placer(target: f32, anchor: Anchor) -> (ModelPlacer, RecordingSink) {
        let sink = RecordingSink::new();
        let diagnostics = Diagnostics::new("placer", Rc::new(sink.clone()));
        (ModelPlacer::new(target, anchor, diagnostics), sink)
    }

    #[test]
    fn fits_largest_extent_and_centres_on_origin() {
        let (placer, _) = placer(2.0, Anchor::Center);
        let mut model = box_model("crate", [1.0, 1.0, 1.0], [3.0, 5.0, 9.0]);

        let factor = placer.place(&mut model).unwrap();
        assert!((factor - 0.25).abs() < 1e-6);

        let bounds = model.world_bounds();
        assert!((bounds.extent().max_element() - 2.0).abs() < 1e-6);
        assert!(bounds.center().length() < 1e-6);
    }

    #[test]
    fn ground_anchor_lifts_centre() {
        let (placer, _) = placer(1.0, Anchor::Ground { height: 0.5 });
        let mut model = box_model("crate", [-4.0, -4.0, -4.0], [4.0, 4.0, 4.0]);
        model.root.translation = Vec3::new(10.0, -3.0, 2.0);

        placer.place(&mut model).unwrap();
        let bounds = model.world_bounds();
        assert!((bounds.center() - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-5);
        assert!((bounds.extent().max_element() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_extent_axis_is_degenerate() {
        let (placer, sink) = placer(2.0, Anchor::Center);
        let mut model = box_model("plane", [0.0, 0.0, 0.0], [2.0, 0.0, 2.0]);
        let before: Transform = model.root;

        let err = placer.place(&mut model).unwrap_err();
        assert!(matches!(err, StageError::DegenerateGeometry { .. }));
        assert_eq!(model.root, before);
        assert!(sink.contains(Level::Warn, "native scale"));
    }

    #[test]
    fn model_without_meshes_is_degenerate() {
        let (placer, _) = placer(2.0, Anchor::Center);
        let mut model = Model::new("rig", Vec::new());
        assert!(matches!(
            placer.place(&mut model),
            Err(StageError::DegenerateGeometry { .. })
        ));
        assert_eq!(model.root, Transform::IDENTITY);
    }

    #[test]
    fn placing_twice_is_stable() {
        let (placer, _) = placer(2.0, Anchor::Center);
        let mut model = box_model("crate", [1.0, 1.0, 1.0], [3.0, 5.0, 9.0]);
        placer.place(&mut model).unwrap();
        let second = placer.place(&mut model).unwrap();
        assert!((second - 1.0).abs() < 1e-5);
        assert!(model.world_bounds().center().length() < 1e-5);
    }

    #[test]
    fn non_positive_target_is_rejected() {
        let (placer, _) = placer(0.0, Anchor::Center);
        let mut model = box_model("crate", [0.0; 3], [1.0; 3]);
        assert!(matches!(
            placer.place(&mut model),
            Err(StageError::InvalidParameter(_))
        ));
    }
}

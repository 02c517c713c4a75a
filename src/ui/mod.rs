use glam::Vec3;
use std::fmt;

use crate::app::controller::SceneContext;
use crate::render::CameraPose;

/// One-line summary of the stage, shown in the window title or the log.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub model: Option<String>,
    pub meshes: usize,
    pub bones: usize,
    pub clip: Option<String>,
    pub playing: usize,
    pub moving: bool,
    pub overlay: bool,
    pub rig: &'static str,
    pub eye: Vec3,
}

impl StatusLine {
    pub fn capture(scene: &SceneContext, camera: &CameraPose) -> Self {
        let model = scene.model.as_ref();
        let animation = scene.animation.as_ref();
        Self {
            model: model.map(|model| model.name.clone()),
            meshes: model.map_or(0, |model| model.mesh_count()),
            bones: model.map_or(0, |model| model.bone_count()),
            clip: animation.and_then(|animation| {
                animation
                    .clips()
                    .get(animation.active_clip())
                    .map(|clip| clip.name.clone())
            }),
            playing: animation.map_or(0, |animation| animation.playing_count()),
            moving: animation.is_some_and(|animation| animation.is_moving()),
            overlay: model.is_some_and(|model| {
                model
                    .materials()
                    .iter()
                    .flatten()
                    .any(|material| material.has_overlay())
            }),
            rig: scene.rig.label(),
            eye: camera.eye,
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(model) = &self.model else {
            return write!(f, "no model | {} camera", self.rig);
        };
        write!(f, "{} ({} meshes, {} bones)", model, self.meshes, self.bones)?;
        match &self.clip {
            Some(clip) => write!(f, " | clip {} ({} playing)", clip, self.playing)?,
            None => write!(f, " | no clips")?,
        }
        if self.moving {
            write!(f, " | moving")?;
        }
        if self.overlay {
            write!(f, " | overlay")?;
        }
        write!(
            f,
            " | {} camera at ({:.1}, {:.1}, {:.1})",
            self.rig, self.eye.x, self.eye.y, self.eye.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stage_summary() {
        let status = StatusLine {
            model: None,
            meshes: 0,
            bones: 0,
            clip: None,
            playing: 0,
            moving: false,
            overlay: false,
            rig: "orbit",
            eye: Vec3::ZERO,
        };
        assert_eq!(status.to_string(), "no model | orbit camera");
    }

    #[test]
    fn loaded_model_summary() {
        let status = StatusLine {
            model: Some("Fox".to_string()),
            meshes: 1,
            bones: 24,
            clip: Some("Walk".to_string()),
            playing: 1,
            moving: true,
            overlay: true,
            rig: "follow",
            eye: Vec3::new(0.0, 2.5, -5.0),
        };
        assert_eq!(
            status.to_string(),
            "Fox (1 meshes, 24 bones) | clip Walk (1 playing) | moving | overlay | follow camera at (0.0, 2.5, -5.0)"
        );
    }
}

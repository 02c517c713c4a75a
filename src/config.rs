//! Stage configuration: what to load, how to place it, how it moves and how
//! the camera follows it. Saved and loaded as JSON.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::scene::animation::PlaybackMode;
use crate::scene::placement::Anchor;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CameraConfig {
    Orbit {
        distance: f32,
        yaw_deg: f32,
        pitch_deg: f32,
        damping: f32,
        rotate_speed: f32,
        zoom_speed: f32,
        target: [f32; 3],
    },
    Follow {
        offset: [f32; 3],
        look_offset: [f32; 3],
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MotionConfig {
    /// Model stays where placement put it.
    Static,
    /// Circular walk driven by the frame clock.
    Walk {
        radius: f32,
        angular_speed: f32,
        smoothing: f32,
    },
    /// WASD / arrow keys, fixed increments per frame.
    Keyboard { move_step: f32, turn_step: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            fov_y_deg: 45.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "modelstage".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Static model, orbit camera, every clip auto-plays.
    Orbit,
    /// Circular walk, orbit camera, first clip armed.
    Walk,
    /// Keyboard walk, follow camera, first clip armed.
    Follow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub model_path: Option<String>,
    /// Extra models cycled through at runtime.
    pub playlist: Vec<String>,
    pub overlay_path: Option<String>,
    pub mix_factor: f32,
    pub target_size: f32,
    pub anchor: Anchor,
    pub camera: CameraConfig,
    pub motion: MotionConfig,
    pub playback: PlaybackMode,
    pub projection: ProjectionConfig,
    pub draco_decoder_path: Option<PathBuf>,
    pub window: WindowConfig,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::preset(Preset::Orbit)
    }
}

impl StageConfig {
    pub fn preset(preset: Preset) -> Self {
        let base = Self {
            model_path: None,
            playlist: Vec::new(),
            overlay_path: None,
            mix_factor: 0.5,
            target_size: 2.0,
            anchor: Anchor::Center,
            camera: CameraConfig::Orbit {
                distance: 5.0,
                yaw_deg: 0.0,
                pitch_deg: 15.0,
                damping: 0.05,
                rotate_speed: 0.005,
                zoom_speed: 0.1,
                target: [0.0, 0.0, 0.0],
            },
            motion: MotionConfig::Static,
            playback: PlaybackMode::AutoPlayAll,
            projection: ProjectionConfig::default(),
            draco_decoder_path: None,
            window: WindowConfig::default(),
        };
        match preset {
            Preset::Orbit => base,
            Preset::Walk => Self {
                camera: CameraConfig::Orbit {
                    distance: 8.0,
                    yaw_deg: 0.0,
                    pitch_deg: 25.0,
                    damping: 0.05,
                    rotate_speed: 0.005,
                    zoom_speed: 0.1,
                    target: [0.0, 0.0, 0.0],
                },
                motion: MotionConfig::Walk {
                    radius: 2.0,
                    angular_speed: 0.5,
                    smoothing: 0.1,
                },
                playback: PlaybackMode::ArmFirst,
                ..base
            },
            Preset::Follow => Self {
                anchor: Anchor::Ground { height: 1.0 },
                camera: CameraConfig::Follow {
                    offset: [0.0, 2.5, -5.0],
                    look_offset: [0.0, 1.0, 0.0],
                },
                motion: MotionConfig::Keyboard {
                    move_step: 0.05,
                    turn_step: 0.03,
                },
                playback: PlaybackMode::ArmFirst,
                ..base
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.mix_factor.is_finite() || !(0.0..=1.0).contains(&self.mix_factor) {
            return Err(ConfigError::Invalid(format!(
                "mix_factor {} must be within [0, 1]",
                self.mix_factor
            )));
        }
        if !self.target_size.is_finite() || self.target_size <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "target_size {} must be positive",
                self.target_size
            )));
        }
        match self.motion {
            MotionConfig::Static => {}
            MotionConfig::Walk {
                radius,
                angular_speed,
                smoothing,
            } => {
                if !radius.is_finite() || radius < 0.0 || !angular_speed.is_finite() {
                    return Err(ConfigError::Invalid(format!(
                        "walk needs a finite radius >= 0 and a finite speed (got {radius}, {angular_speed})"
                    )));
                }
                if !(smoothing > 0.0 && smoothing <= 1.0) {
                    return Err(ConfigError::Invalid(format!(
                        "walk smoothing {smoothing} must be within (0, 1]"
                    )));
                }
            }
            MotionConfig::Keyboard {
                move_step,
                turn_step,
            } => {
                if !move_step.is_finite() || !turn_step.is_finite() {
                    return Err(ConfigError::Invalid(format!(
                        "keyboard steps must be finite (got {move_step}, {turn_step})"
                    )));
                }
            }
        }
        match self.camera {
            CameraConfig::Orbit {
                distance,
                yaw_deg,
                pitch_deg,
                damping,
                rotate_speed,
                zoom_speed,
                target,
            } => {
                if !distance.is_finite() || distance <= 0.0 || !(damping > 0.0 && damping <= 1.0) {
                    return Err(ConfigError::Invalid(
                        "orbit camera needs a positive distance and damping within (0, 1]"
                            .to_string(),
                    ));
                }
                let angles = [yaw_deg, pitch_deg, rotate_speed, zoom_speed];
                if !angles.iter().chain(&target).all(|value| value.is_finite()) {
                    return Err(ConfigError::Invalid(
                        "orbit camera parameters must be finite".to_string(),
                    ));
                }
            }
            CameraConfig::Follow {
                offset,
                look_offset,
            } => {
                if !offset.iter().chain(&look_offset).all(|value| value.is_finite()) {
                    return Err(ConfigError::Invalid(
                        "follow camera offsets must be finite".to_string(),
                    ));
                }
            }
        }
        if self.projection.near <= 0.0 || self.projection.far <= self.projection.near {
            return Err(ConfigError::Invalid(
                "projection needs 0 < near < far".to_string(),
            ));
        }
        Ok(())
    }

    /// Main model first, then the playlist, without duplicates.
    pub fn models(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for path in self.model_path.iter().chain(&self.playlist) {
            if !out.contains(path) {
                out.push(path.clone());
            }
        }
        out
    }
}

pub fn save_config_to_file(config: &StageConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_config_from_file(path: &Path) -> Result<StageConfig> {
    let json = std::fs::read_to_string(path)?;
    let config: StageConfig = serde_json::from_str(&json)?;
    config.validate()?;
    Ok(config)
}

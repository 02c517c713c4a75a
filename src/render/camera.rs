use glam::{Mat4, Vec3};

use crate::app::motion::wrap_angle;
use crate::config::{CameraConfig, ProjectionConfig};

const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Where the camera is and what it looks at, plus projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl CameraPose {
    pub fn new(projection: &ProjectionConfig, aspect: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: projection.fov_y_deg.to_radians(),
            aspect,
            near: projection.near,
            far: projection.far,
        }
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect.max(1e-3), self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

/// Pointer-driven orbit around a fixed target with inertial damping.
#[derive(Debug, Clone, Copy)]
pub struct OrbitControls {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
    zoom_velocity: f32,
    damping: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    min_distance: f32,
    max_distance: f32,
    dragging: bool,
    last_pointer: Option<(f32, f32)>,
}

impl OrbitControls {
    pub fn from_config(config: &CameraConfig) -> Self {
        let (distance, yaw, pitch, damping, rotate_speed, zoom_speed, target) = match *config {
            CameraConfig::Orbit {
                distance,
                yaw_deg,
                pitch_deg,
                damping,
                rotate_speed,
                zoom_speed,
                target,
            } => (
                distance,
                yaw_deg.to_radians(),
                pitch_deg.to_radians(),
                damping,
                rotate_speed,
                zoom_speed,
                Vec3::from(target),
            ),
            CameraConfig::Follow { .. } => (5.0, 0.0, 0.3, 0.05, 0.005, 0.1, Vec3::ZERO),
        };
        Self {
            target,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            distance,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            zoom_velocity: 0.0,
            damping: damping.clamp(0.0, 1.0),
            rotate_speed,
            zoom_speed,
            min_distance: 0.1,
            max_distance: 1000.0,
            dragging: false,
            last_pointer: None,
        }
    }

    pub fn pointer_button(&mut self, pressed: bool) {
        self.dragging = pressed;
        if !pressed {
            self.last_pointer = None;
        }
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        if self.dragging {
            if let Some((last_x, last_y)) = self.last_pointer {
                self.yaw_velocity -= (x - last_x) * self.rotate_speed;
                self.pitch_velocity += (y - last_y) * self.rotate_speed;
            }
        }
        self.last_pointer = Some((x, y));
    }

    /// Positive delta zooms in.
    pub fn wheel(&mut self, delta: f32) {
        self.zoom_velocity -= delta * self.zoom_speed;
    }

    /// Applies the accumulated velocities and decays them by the damping factor.
    pub fn update(&mut self) {
        self.yaw = wrap_angle(self.yaw + self.yaw_velocity);
        self.pitch = (self.pitch + self.pitch_velocity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.distance = (self.distance * (1.0 + self.zoom_velocity))
            .clamp(self.min_distance, self.max_distance);

        let keep = 1.0 - self.damping;
        self.yaw_velocity *= keep;
        self.pitch_velocity *= keep;
        self.zoom_velocity *= keep;
    }

    pub fn eye(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        let offset = Vec3::new(
            self.yaw.sin() * cos_pitch,
            self.pitch.sin(),
            self.yaw.cos() * cos_pitch,
        );
        self.target + offset * self.distance
    }
}

/// Camera pinned at a fixed offset from the subject, no damping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowRig {
    pub offset: Vec3,
    pub look_offset: Vec3,
}

impl FollowRig {
    pub fn pose(&self, subject: Vec3) -> (Vec3, Vec3) {
        (subject + self.offset, subject + self.look_offset)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum CameraRig {
    Orbit(OrbitControls),
    Follow(FollowRig),
}

impl CameraRig {
    pub fn from_config(config: &CameraConfig) -> Self {
        match *config {
            CameraConfig::Orbit { .. } => CameraRig::Orbit(OrbitControls::from_config(config)),
            CameraConfig::Follow {
                offset,
                look_offset,
            } => CameraRig::Follow(FollowRig {
                offset: Vec3::from(offset),
                look_offset: Vec3::from(look_offset),
            }),
        }
    }

    /// Recomputes the pose. Follow needs a subject; without one the pose is kept.
    pub fn update(&mut self, subject: Option<Vec3>, pose: &mut CameraPose) {
        match self {
            CameraRig::Orbit(orbit) => {
                orbit.update();
                pose.eye = orbit.eye();
                pose.target = orbit.target;
            }
            CameraRig::Follow(follow) => {
                if let Some(subject) = subject {
                    let (eye, target) = follow.pose(subject);
                    pose.eye = eye;
                    pose.target = target;
                }
            }
        }
    }

    pub fn pointer_button(&mut self, pressed: bool) {
        if let CameraRig::Orbit(orbit) = self {
            orbit.pointer_button(pressed);
        }
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        if let CameraRig::Orbit(orbit) = self {
            orbit.pointer_moved(x, y);
        }
    }

    pub fn wheel(&mut self, delta: f32) {
        if let CameraRig::Orbit(orbit) = self {
            orbit.wheel(delta);
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CameraRig::Orbit(_) => "orbit",
            CameraRig::Follow(_) => "follow",
        }
    }
}

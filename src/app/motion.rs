use glam::{Quat, Vec3};
use std::f32::consts::{PI, TAU};

use crate::app::input::MovementIntent;

/// Wraps an angle into (-PI, PI].
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Moves `current` a fraction `k` of the shortest way toward `target`.
pub fn smooth_heading(current: f32, target: f32, k: f32) -> f32 {
    wrap_angle(current + wrap_angle(target - current) * k)
}

/// Heading of a horizontal direction, measured from +Z toward +X.
pub fn heading_of(direction: Vec3) -> f32 {
    direction.x.atan2(direction.z)
}

pub fn heading_forward(heading: f32) -> Vec3 {
    Vec3::new(heading.sin(), 0.0, heading.cos())
}

/// Clock for the circular walk. Only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WalkState {
    time: f32,
}

impl WalkState {
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn advance(&mut self, dt: f32) {
        if dt > 0.0 {
            self.time += dt;
        }
    }

    pub fn position(&self, radius: f32, angular_speed: f32) -> Vec3 {
        let phase = angular_speed * self.time;
        Vec3::new(radius * phase.cos(), 0.0, radius * phase.sin())
    }

    /// Heading along the circle tangent in the direction of travel.
    pub fn tangent_heading(&self, angular_speed: f32) -> f32 {
        let phase = angular_speed * self.time;
        let velocity = Vec3::new(-phase.sin(), 0.0, phase.cos()) * angular_speed;
        heading_of(velocity)
    }
}

/// Ground-plane pose of the moving subject.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Avatar {
    pub position: Vec3,
    pub heading: f32,
}

impl Avatar {
    /// Applies one frame of keyboard motion. Returns whether any intent was set.
    pub fn apply_keyboard(&mut self, intent: MovementIntent, move_step: f32, turn_step: f32) -> bool {
        if intent.left {
            self.heading = wrap_angle(self.heading + turn_step);
        }
        if intent.right {
            self.heading = wrap_angle(self.heading - turn_step);
        }
        let forward = heading_forward(self.heading);
        if intent.forward {
            self.position += forward * move_step;
        }
        if intent.backward {
            self.position -= forward * move_step;
        }
        intent.any()
    }

    /// One frame of the circular walk.
    pub fn follow_walk(&mut self, walk: &WalkState, radius: f32, angular_speed: f32, smoothing: f32) {
        self.position = walk.position(radius, angular_speed);
        self.heading = smooth_heading(self.heading, walk.tangent_heading(angular_speed), smoothing);
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.heading)
    }
}

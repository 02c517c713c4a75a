pub mod camera;

pub use camera::{CameraPose, CameraRig, FollowRig, OrbitControls};

use std::sync::Arc;
use winit::window::Window;

use crate::app::controller::SceneContext;
use crate::diagnostics::Diagnostics;
use crate::ui::StatusLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// Draws whatever the scene holds. Owns every GPU-side resource.
pub trait Renderer {
    fn render(&mut self, scene: &SceneContext, camera: &CameraPose);
    fn resize(&mut self, width: u32, height: u32);
}

/// Draws nothing; logs a status line every `interval` frames.
pub struct HeadlessRenderer {
    diagnostics: Diagnostics,
    interval: u64,
    frames: u64,
}

impl HeadlessRenderer {
    pub fn new(interval: u64, diagnostics: Diagnostics) -> Self {
        Self {
            diagnostics,
            interval: interval.max(1),
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for HeadlessRenderer {
    fn render(&mut self, scene: &SceneContext, camera: &CameraPose) {
        if self.frames % self.interval == 0 {
            let status = StatusLine::capture(scene, camera);
            self.diagnostics
                .info(format!("frame {}: {}", self.frames, status));
        }
        self.frames += 1;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.diagnostics
            .info(format!("viewport resized to {width}x{height}"));
    }
}

/// Publishes the status line and frame rate in the window title.
pub struct WindowTitleRenderer {
    window: Arc<Window>,
    base_title: String,
    fps: Option<f32>,
    last_title: String,
}

impl WindowTitleRenderer {
    pub fn new(window: Arc<Window>, base_title: impl Into<String>) -> Self {
        Self {
            window,
            base_title: base_title.into(),
            fps: None,
            last_title: String::new(),
        }
    }

    pub fn set_fps(&mut self, fps: Option<f32>) {
        self.fps = fps;
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }
}

impl Renderer for WindowTitleRenderer {
    fn render(&mut self, scene: &SceneContext, camera: &CameraPose) {
        let status = StatusLine::capture(scene, camera);
        let title = match self.fps {
            Some(fps) => format!("{} - {} - {:.1} fps", self.base_title, status, fps),
            None => format!("{} - {}", self.base_title, status),
        };
        if title != self.last_title {
            self.window.set_title(&title);
            self.last_title = title;
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::debug!("Window resized to {}x{}", width, height);
    }
}

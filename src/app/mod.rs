pub mod controller;
pub mod input;
pub mod motion;
mod timing;

use controller::SceneController;
use input::InputAction;
use timing::FrameTiming;

use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{WindowAttributes, WindowId};

use crate::config::StageConfig;
use crate::diagnostics::Diagnostics;
use crate::render::{HeadlessRenderer, Renderer, WindowTitleRenderer};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
}

/// Pixels of wheel travel treated as one line.
const PIXELS_PER_LINE: f32 = 40.0;
/// How long a headless run waits for loads still running after its frames.
const HEADLESS_DRAIN_BUDGET: Duration = Duration::from_secs(10);

/// Controller plus the host-level actions: playlist cycling and overlay keys.
pub struct Stage<R: Renderer> {
    controller: SceneController<R>,
    models: Vec<String>,
    current_model: usize,
    overlay_path: Option<String>,
    mix_factor: f32,
    diagnostics: Diagnostics,
}

impl<R: Renderer> Stage<R> {
    pub fn new(config: &StageConfig, renderer: R, diagnostics: Diagnostics) -> Self {
        let controller =
            SceneController::from_config(config, renderer, diagnostics.scoped("controller"));
        Self::with_controller(controller, config, diagnostics)
    }

    pub fn with_controller(
        controller: SceneController<R>,
        config: &StageConfig,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            controller,
            models: config.models(),
            current_model: 0,
            overlay_path: config.overlay_path.clone(),
            mix_factor: config.mix_factor,
            diagnostics,
        }
    }

    pub fn controller(&self) -> &SceneController<R> {
        &self.controller
    }

    /// Issues the initial load for the first configured model.
    pub fn start(&mut self) {
        if self.models.is_empty() {
            self.diagnostics
                .warn("no model configured; pass --model or set model_path");
            return;
        }
        self.load_current();
    }

    pub fn handle_action(&mut self, action: InputAction) {
        match action {
            InputAction::None => {}
            InputAction::CycleModel => {
                if self.models.len() < 2 {
                    self.diagnostics.info("playlist has a single model");
                    return;
                }
                self.current_model = (self.current_model + 1) % self.models.len();
                self.load_current();
            }
            InputAction::ReloadOverlay => {
                let Some(path) = self.overlay_path.clone() else {
                    self.diagnostics.info("no overlay configured");
                    return;
                };
                // Failures are already reported by the controller.
                let _ = self.controller.load_overlay(&path, Some(self.mix_factor));
            }
            InputAction::ClearOverlay => {
                self.controller.clear_overlay();
            }
            InputAction::PlayClip(index) => {
                let _ = self.controller.play_clip(index);
            }
        }
    }

    /// Keeps ticking until no load is outstanding or `budget` runs out.
    /// Returns false when loads were abandoned.
    pub fn drain(&mut self, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;
        while self.controller.has_pending_loads() {
            if Instant::now() >= deadline {
                self.diagnostics.warn(format!(
                    "giving up on pending loads after {:.1}s",
                    budget.as_secs_f32()
                ));
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
            self.controller.frame();
        }
        true
    }

    fn load_current(&mut self) {
        let Some(path) = self.models.get(self.current_model).cloned() else {
            return;
        };
        let _ = self.controller.load_model(
            &path,
            self.overlay_path.as_deref(),
            Some(self.mix_factor),
        );
    }
}

/// Runs a fixed number of frames without a window.
pub fn run_headless(config: &StageConfig, frames: u64) -> Stage<HeadlessRenderer> {
    let diagnostics = Diagnostics::to_log("stage");
    let renderer = HeadlessRenderer::new(60, Diagnostics::to_log("renderer"));
    let mut stage = Stage::new(config, renderer, diagnostics);
    stage.start();
    for _ in 0..frames {
        stage.controller.frame();
        if !stage.controller.has_pending_loads() {
            continue;
        }
        // Give loader threads a moment; the frame clock stays nominal.
        std::thread::sleep(Duration::from_millis(1));
    }
    stage.drain(HEADLESS_DRAIN_BUDGET);
    log::info!(
        "headless run finished after {} frames",
        stage.controller.frame_count()
    );
    stage
}

struct App {
    config: StageConfig,
    stage: Option<Stage<WindowTitleRenderer>>,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    error: Option<AppError>,
}

impl App {
    fn new(config: StageConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            stage: None,
            timing: FrameTiming::new(now),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: now,
            error: None,
        }
    }

    fn update_target_frame_duration(&mut self) {
        let mut target = Duration::from_millis(16);
        let monitor = self
            .stage
            .as_ref()
            .and_then(|stage| stage.controller.renderer().window().current_monitor());
        if let Some(monitor) = monitor {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn render(&mut self) {
        let Some(stage) = &mut self.stage else {
            return;
        };
        if self.timing.update(Instant::now()) {
            stage.controller.renderer_mut().set_fps(self.timing.fps());
        }
        stage.controller.frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.stage.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                self.error = Some(AppError::Window(err));
                event_loop.exit();
                return;
            }
        };
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let renderer = WindowTitleRenderer::new(window, self.config.window.title.clone());
        let mut stage = Stage::new(&self.config, renderer, Diagnostics::to_log("stage"));
        stage.start();
        self.stage = Some(stage);
        self.update_target_frame_duration();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(stage) = &mut self.stage else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }
            WindowEvent::Focused(false) => {
                stage.controller.release_keys();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("Escape pressed, shutting down...");
                    event_loop.exit();
                    return;
                }
                let pressed = event.state == ElementState::Pressed;
                if pressed && event.repeat {
                    return;
                }
                let action = stage.controller.handle_key(event.physical_key, pressed);
                stage.handle_action(action);
            }
            WindowEvent::Resized(new_size) => {
                stage.controller.resize(new_size.width, new_size.height);
                self.update_target_frame_duration();
            }
            WindowEvent::Moved(_) => {
                self.update_target_frame_duration();
            }
            WindowEvent::CursorMoved { position, .. } => {
                stage
                    .controller
                    .pointer_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                stage
                    .controller
                    .pointer_button(state == ElementState::Pressed);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
                stage.controller.wheel(lines);
            }
            WindowEvent::RedrawRequested => {
                self.render();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(stage) = &self.stage {
                stage.controller.renderer().window().request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

/// Opens the window and runs until it is closed.
pub fn run(config: StageConfig) -> Result<(), AppError> {
    log::info!("modelstage: O cycles models, T/C apply/clear overlay, 1-9 play clips, ESC exits");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if let Some(err) = app.error.take() {
        return Err(err);
    }
    log::info!("Goodbye!");
    Ok(())
}

//! Per-frame driver for one staged model.
//!
//! The controller owns the [`SceneContext`] and every outstanding load. Each
//! frame it first installs whatever finished loading, then advances clips,
//! moves the subject, updates the camera and hands the result to the renderer.

use glam::{Quat, Vec3};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::app::input::{InputAction, InputState, MovementIntent};
use crate::app::motion::{Avatar, WalkState};
use crate::assets::{
    short_name, GltfLoader, ImageLoader, LoadHandle, LoadPoll, ModelSource, TextureSource,
};
use crate::config::{MotionConfig, StageConfig};
use crate::diagnostics::Diagnostics;
use crate::error::{validate_mix_factor, Result, StageError};
use crate::render::{CameraPose, CameraRig, Renderer, Viewport};
use crate::scene::animation::{AnimationController, PlaybackMode};
use crate::scene::material::{MaterialCompositor, OverlayImage};
use crate::scene::placement::ModelPlacer;
use crate::scene::Model;
use winit::keyboard::PhysicalKey;

/// Fixed step used for clip playback and the walk clock.
pub const NOMINAL_DT: f32 = 1.0 / 60.0;
pub const DEFAULT_MIX: f32 = 0.5;
/// Finished statuses kept for callers that never read them.
const MAX_SETTLED_STATUSES: usize = 64;

/// Everything the renderer sees. At most one model is installed at a time.
pub struct SceneContext {
    pub model: Option<Model>,
    pub animation: Option<AnimationController>,
    pub camera: CameraPose,
    pub rig: CameraRig,
    pub walk: WalkState,
    pub avatar: Avatar,
    /// Root placement computed when the model was installed.
    pub base_translation: Vec3,
    pub base_rotation: Quat,
    pub intent: MovementIntent,
    pub viewport: Viewport,
    /// Bumped on every install so late overlays can tell their model is gone.
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    Pending { loaded: u64, total: Option<u64> },
    Installed,
    Failed(String),
    /// Finished after the model it was meant for had been replaced.
    Discarded,
}

impl LoadStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, LoadStatus::Pending { .. })
    }
}

struct PendingOverlay {
    ticket: LoadTicket,
    handle: LoadHandle<OverlayImage>,
    mix_factor: f32,
    /// `None` until the model it belongs to is installed.
    generation: Option<u64>,
}

struct PendingModel {
    ticket: LoadTicket,
    handle: LoadHandle<Model>,
    overlay: Option<PendingOverlay>,
}

pub struct SceneController<R: Renderer> {
    scene: SceneContext,
    renderer: R,
    models: Box<dyn ModelSource>,
    textures: Box<dyn TextureSource>,
    placer: ModelPlacer,
    compositor: MaterialCompositor,
    playback: PlaybackMode,
    motion: MotionConfig,
    input: InputState,
    pending_models: Vec<PendingModel>,
    pending_overlays: Vec<PendingOverlay>,
    statuses: BTreeMap<LoadTicket, LoadStatus>,
    next_ticket: u64,
    frame: u64,
    diagnostics: Diagnostics,
}

impl<R: Renderer> SceneController<R> {
    /// Controller backed by the glTF and image loaders.
    pub fn from_config(config: &StageConfig, renderer: R, diagnostics: Diagnostics) -> Self {
        Self::new(
            config,
            Box::new(GltfLoader::new(config.draco_decoder_path.clone())),
            Box::new(ImageLoader),
            renderer,
            diagnostics,
        )
    }

    pub fn new(
        config: &StageConfig,
        models: Box<dyn ModelSource>,
        textures: Box<dyn TextureSource>,
        renderer: R,
        diagnostics: Diagnostics,
    ) -> Self {
        let viewport = Viewport::new(config.window.width, config.window.height);
        let mut scene = SceneContext {
            model: None,
            animation: None,
            camera: CameraPose::new(&config.projection, viewport.aspect()),
            rig: CameraRig::from_config(&config.camera),
            walk: WalkState::default(),
            avatar: Avatar::default(),
            base_translation: Vec3::ZERO,
            base_rotation: Quat::IDENTITY,
            intent: MovementIntent::default(),
            viewport,
            generation: 0,
        };
        scene.rig.update(None, &mut scene.camera);

        Self {
            scene,
            renderer,
            models,
            textures,
            placer: ModelPlacer::new(
                config.target_size,
                config.anchor,
                diagnostics.scoped("placer"),
            ),
            compositor: MaterialCompositor::new(diagnostics.scoped("compositor")),
            playback: config.playback,
            motion: config.motion,
            input: InputState::default(),
            pending_models: Vec::new(),
            pending_overlays: Vec::new(),
            statuses: BTreeMap::new(),
            next_ticket: 1,
            frame: 0,
            diagnostics,
        }
    }

    pub fn scene(&self) -> &SceneContext {
        &self.scene
    }

    pub fn model(&self) -> Option<&Model> {
        self.scene.model.as_ref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Current status of a load. A settled status is handed out once and then
    /// forgotten; later queries for that ticket return `None`.
    pub fn load_status(&mut self, ticket: LoadTicket) -> Option<LoadStatus> {
        let status = self.statuses.get(&ticket)?.clone();
        if status.is_settled() {
            self.statuses.remove(&ticket);
        }
        Some(status)
    }

    pub fn has_pending_loads(&self) -> bool {
        !self.pending_models.is_empty() || !self.pending_overlays.is_empty()
    }

    /// Starts loading a model, optionally with an overlay to blend in once it
    /// is installed. Nothing is issued when a parameter is rejected.
    pub fn load_model(
        &mut self,
        model_path: &str,
        texture_path: Option<&str>,
        mix_factor: Option<f32>,
    ) -> Result<LoadTicket> {
        if model_path.trim().is_empty() {
            return Err(self.reject("model path is empty".to_string()));
        }
        let overlay_request = match texture_path {
            Some(path) => Some(self.check_overlay_request(path, mix_factor)?),
            None => None,
        };

        let ticket = self.issue_ticket();
        let overlay = overlay_request.map(|(path, mix_factor)| {
            let overlay_ticket = self.issue_ticket();
            PendingOverlay {
                ticket: overlay_ticket,
                handle: self.textures.load_texture(&path),
                mix_factor,
                generation: None,
            }
        });
        self.diagnostics.info(format!(
            "loading model {}{}",
            model_path,
            texture_path
                .map(|path| format!(" with overlay {path}"))
                .unwrap_or_default()
        ));
        self.pending_models.push(PendingModel {
            ticket,
            handle: self.models.load_model(model_path),
            overlay,
        });
        Ok(ticket)
    }

    /// Blends an overlay into the installed model once the image is decoded.
    pub fn load_overlay(&mut self, texture_path: &str, mix_factor: Option<f32>) -> Result<LoadTicket> {
        let (path, mix_factor) = self.check_overlay_request(texture_path, mix_factor)?;
        if self.scene.model.is_none() {
            return Err(self.reject(format!("no model installed to receive overlay {path}")));
        }
        let ticket = self.issue_ticket();
        self.pending_overlays.push(PendingOverlay {
            ticket,
            handle: self.textures.load_texture(&path),
            mix_factor,
            generation: Some(self.scene.generation),
        });
        Ok(ticket)
    }

    /// Restores as-loaded materials. Returns the number of meshes touched.
    pub fn clear_overlay(&mut self) -> usize {
        match self.scene.model.as_mut() {
            Some(model) => self.compositor.clear_overlay(model),
            None => 0,
        }
    }

    /// Plays one clip by index. A model without clips ignores the request.
    pub fn play_clip(&mut self, index: usize) -> Result<()> {
        match self.scene.animation.as_mut() {
            Some(animation) => animation.play_clip_by_index(index),
            None => {
                self.diagnostics
                    .info(format!("no clips to play (requested {index})"));
                Ok(())
            }
        }
    }

    /// Updates held movement keys; returns any one-shot action for the host.
    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool) -> InputAction {
        let action = self.input.handle_key(key, pressed);
        self.scene.intent = self.input.intent();
        action
    }

    pub fn release_keys(&mut self) {
        self.input.release_all();
        self.scene.intent = self.input.intent();
    }

    pub fn pointer_button(&mut self, pressed: bool) {
        self.scene.rig.pointer_button(pressed);
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.scene.rig.pointer_moved(x, y);
    }

    pub fn wheel(&mut self, delta: f32) {
        self.scene.rig.wheel(delta);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.scene.viewport = Viewport::new(width, height);
        self.scene.camera.aspect = self.scene.viewport.aspect();
        self.renderer.resize(width, height);
    }

    /// One tick: finish loads, advance clips, move, update the camera, draw.
    pub fn frame(&mut self) {
        self.poll_loads();

        if let Some(animation) = self.scene.animation.as_mut() {
            animation.advance(NOMINAL_DT);
        }
        let subject = self.step_motion();
        self.scene.rig.update(subject, &mut self.scene.camera);
        self.renderer.render(&self.scene, &self.scene.camera);
        self.frame += 1;
    }

    /// Moves the model and returns its root position for the camera rig.
    fn step_motion(&mut self) -> Option<Vec3> {
        let scene = &mut self.scene;
        let model = scene.model.as_mut()?;
        match self.motion {
            MotionConfig::Static => return Some(model.root.translation),
            MotionConfig::Keyboard {
                move_step,
                turn_step,
            } => {
                let moving = scene.avatar.apply_keyboard(scene.intent, move_step, turn_step);
                if let Some(animation) = scene.animation.as_mut() {
                    animation.set_moving(moving);
                }
            }
            MotionConfig::Walk {
                radius,
                angular_speed,
                smoothing,
            } => {
                scene.walk.advance(NOMINAL_DT);
                scene
                    .avatar
                    .follow_walk(&scene.walk, radius, angular_speed, smoothing);
                if let Some(animation) = scene.animation.as_mut() {
                    animation.set_moving(true);
                }
            }
        }
        model.root.translation = scene.base_translation + scene.avatar.position;
        model.root.rotation = scene.avatar.rotation() * scene.base_rotation;
        Some(model.root.translation)
    }

    fn poll_loads(&mut self) {
        let mut index = 0;
        while index < self.pending_models.len() {
            let poll = self.pending_models[index].handle.poll();
            match poll {
                LoadPoll::Pending { loaded, total } => {
                    let ticket = self.pending_models[index].ticket;
                    self.statuses
                        .insert(ticket, LoadStatus::Pending { loaded, total });
                    index += 1;
                }
                LoadPoll::Ready(result) => {
                    let pending = self.pending_models.remove(index);
                    let uri = pending.handle.uri().to_string();
                    match result {
                        Ok(model) => self.install_model(pending.ticket, model, pending.overlay),
                        Err(source) => {
                            let err = StageError::AssetLoadFailure { uri, source };
                            self.diagnostics.error(err.to_string());
                            self.settle(pending.ticket, LoadStatus::Failed(err.to_string()));
                            if let Some(overlay) = pending.overlay {
                                self.diagnostics.warn(format!(
                                    "dropping overlay {}: its model failed to load",
                                    overlay.handle.uri()
                                ));
                                self.settle(overlay.ticket, LoadStatus::Discarded);
                            }
                        }
                    }
                }
            }
        }

        let mut index = 0;
        while index < self.pending_overlays.len() {
            let poll = self.pending_overlays[index].handle.poll();
            match poll {
                LoadPoll::Pending { loaded, total } => {
                    let ticket = self.pending_overlays[index].ticket;
                    self.statuses
                        .insert(ticket, LoadStatus::Pending { loaded, total });
                    index += 1;
                }
                LoadPoll::Ready(result) => {
                    let pending = self.pending_overlays.remove(index);
                    self.finish_overlay(pending, result);
                }
            }
        }
    }

    fn install_model(&mut self, ticket: LoadTicket, mut model: Model, overlay: Option<PendingOverlay>) {
        if let Some(previous) = self.scene.model.take() {
            self.diagnostics
                .info(format!("replacing '{}' with '{}'", previous.name, model.name));
        }
        self.scene.animation = None;

        if let Err(err) = self.placer.place(&mut model) {
            self.diagnostics
                .warn(format!("installing '{}' unplaced: {err}", model.name));
        }
        self.scene.base_translation = model.root.translation;
        self.scene.base_rotation = model.root.rotation;
        self.scene.animation = AnimationController::attach(
            model.clips.clone(),
            self.playback,
            self.diagnostics.scoped("animation"),
        );
        self.scene.generation += 1;
        self.diagnostics.info(format!(
            "installed '{}' from {} ({} meshes, {} clips, sha256 {}{})",
            model.name,
            short_name(&model.uri),
            model.mesh_count(),
            model.clips.len(),
            model.digest.get(..12).unwrap_or(model.digest.as_str()),
            if model.compressed_geometry { ", draco" } else { "" }
        ));
        self.scene.model = Some(model);
        self.settle(ticket, LoadStatus::Installed);

        if let Some(mut overlay) = overlay {
            overlay.generation = Some(self.scene.generation);
            self.pending_overlays.push(overlay);
        }
    }

    fn finish_overlay(
        &mut self,
        pending: PendingOverlay,
        result: std::result::Result<OverlayImage, crate::assets::AssetError>,
    ) {
        let image = match result {
            Ok(image) => Arc::new(image),
            Err(source) => {
                let err = StageError::AssetLoadFailure {
                    uri: pending.handle.uri().to_string(),
                    source,
                };
                self.diagnostics.error(err.to_string());
                self.settle(pending.ticket, LoadStatus::Failed(err.to_string()));
                return;
            }
        };
        let current = self.scene.generation;
        let model = match (pending.generation, self.scene.model.as_mut()) {
            (Some(generation), Some(model)) if generation == current => model,
            _ => {
                self.diagnostics.warn(format!(
                    "discarding overlay {}: its model was replaced",
                    image.uri
                ));
                self.settle(pending.ticket, LoadStatus::Discarded);
                return;
            }
        };
        let status = match self
            .compositor
            .apply_overlay(model, &image, pending.mix_factor)
        {
            Ok(_) => LoadStatus::Installed,
            Err(err) => LoadStatus::Failed(err.to_string()),
        };
        self.settle(pending.ticket, status);
    }

    /// Records a terminal status, dropping the oldest settled ones past the cap.
    fn settle(&mut self, ticket: LoadTicket, status: LoadStatus) {
        self.statuses.insert(ticket, status);
        let settled: Vec<LoadTicket> = self
            .statuses
            .iter()
            .filter(|(_, status)| status.is_settled())
            .map(|(ticket, _)| *ticket)
            .collect();
        let excess = settled.len().saturating_sub(MAX_SETTLED_STATUSES);
        for ticket in &settled[..excess] {
            self.statuses.remove(ticket);
        }
    }

    fn check_overlay_request(
        &mut self,
        texture_path: &str,
        mix_factor: Option<f32>,
    ) -> Result<(String, f32)> {
        if texture_path.trim().is_empty() {
            return Err(self.reject("overlay path is empty".to_string()));
        }
        match validate_mix_factor(mix_factor.unwrap_or(DEFAULT_MIX)) {
            Ok(mix_factor) => Ok((texture_path.to_string(), mix_factor)),
            Err(err) => {
                self.diagnostics.error(format!("load rejected: {err}"));
                Err(err)
            }
        }
    }

    fn reject(&self, message: String) -> StageError {
        let err = StageError::InvalidParameter(message);
        self.diagnostics.error(format!("load rejected: {err}"));
        err
    }

    fn issue_ticket(&mut self) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        self.statuses.insert(
            ticket,
            LoadStatus::Pending {
                loaded: 0,
                total: None,
            },
        );
        ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetError, Completer};
    use crate::config::{CameraConfig, Preset};
    use crate::diagnostics::{Level, RecordingSink};
    use crate::scene::fixtures::{box_model, clips};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use winit::keyboard::KeyCode;

    /// Resolves known URIs immediately; anything else is a read failure.
    #[derive(Default)]
    struct InstantModels {
        models: HashMap<String, Model>,
    }

    impl ModelSource for InstantModels {
        fn load_model(&self, uri: &str) -> LoadHandle<Model> {
            let result = self.models.get(uri).cloned().ok_or_else(|| AssetError::Read {
                path: uri.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            });
            LoadHandle::ready(uri, result)
        }
    }

    /// Hands completers back to the test so it decides when loads finish.
    #[derive(Clone, Default)]
    struct ManualTextures {
        completers: Rc<RefCell<Vec<(String, Completer<OverlayImage>)>>>,
    }

    impl ManualTextures {
        fn finish_next(&self, width: u32, height: u32) {
            let (uri, completer) = self.completers.borrow_mut().remove(0);
            let pixels = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 255, 0, 255]));
            completer.finish(Ok(OverlayImage::new(uri, pixels)));
        }
    }

    impl TextureSource for ManualTextures {
        fn load_texture(&self, uri: &str) -> LoadHandle<OverlayImage> {
            let (completer, handle) = LoadHandle::pair(uri);
            self.completers.borrow_mut().push((uri.to_string(), completer));
            handle
        }
    }

    /// Hands model completers back to the test.
    #[derive(Clone, Default)]
    struct ManualModels {
        completers: Rc<RefCell<Vec<Completer<Model>>>>,
    }

    impl ModelSource for ManualModels {
        fn load_model(&self, uri: &str) -> LoadHandle<Model> {
            let (completer, handle) = LoadHandle::pair(uri);
            self.completers.borrow_mut().push(completer);
            handle
        }
    }

    #[derive(Default)]
    struct RecordingRenderer {
        frames: Vec<(Option<String>, Vec3)>,
        resizes: Vec<(u32, u32)>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, scene: &SceneContext, camera: &CameraPose) {
            let name = scene.model.as_ref().map(|model| model.name.clone());
            self.frames.push((name, camera.eye));
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.resizes.push((width, height));
        }
    }

    struct Harness {
        controller: SceneController<RecordingRenderer>,
        textures: ManualTextures,
        sink: RecordingSink,
    }

    fn animated(name: &str, clip_count: usize) -> Model {
        let mut model = box_model(name, [-1.0, 0.0, -1.0], [1.0, 4.0, 1.0]);
        model.uri = format!("{name}.glb");
        model.clips = clips(clip_count);
        model.digest = "0123456789abcdef".repeat(4);
        model
    }

    fn harness(config: StageConfig) -> Harness {
        let mut models = InstantModels::default();
        models.models.insert("fox.glb".to_string(), animated("Fox", 2));
        models.models.insert("cube.glb".to_string(), animated("Cube", 0));
        models.models.insert(
            "flat.glb".to_string(),
            box_model("Flat", [-1.0, 0.0, -1.0], [1.0, 0.0, 1.0]),
        );
        // Bounds centre far from the pivot.
        models.models.insert(
            "offset.glb".to_string(),
            box_model("Offset", [10.0, 0.0, 10.0], [12.0, 4.0, 12.0]),
        );
        let mut compressed = animated("Ruins", 0);
        compressed.compressed_geometry = true;
        models.models.insert("ruins.glb".to_string(), compressed);
        harness_with(config, Box::new(models))
    }

    fn harness_with(config: StageConfig, models: Box<dyn ModelSource>) -> Harness {
        let textures = ManualTextures::default();
        let sink = RecordingSink::new();
        let diagnostics = Diagnostics::new("controller", Rc::new(sink.clone()));
        let controller = SceneController::new(
            &config,
            models,
            Box::new(textures.clone()),
            RecordingRenderer::default(),
            diagnostics,
        );
        Harness {
            controller,
            textures,
            sink,
        }
    }

    #[test]
    fn frames_without_a_model_still_render() {
        let mut h = harness(StageConfig::preset(Preset::Follow));
        for _ in 0..3 {
            h.controller.frame();
        }
        assert_eq!(h.controller.renderer().frames.len(), 3);
        assert!(h.controller.renderer().frames.iter().all(|(name, _)| name.is_none()));
        assert_eq!(h.controller.frame_count(), 3);
    }

    #[test]
    fn model_is_placed_and_animated_on_install() {
        let mut h = harness(StageConfig::preset(Preset::Orbit));
        let ticket = h.controller.load_model("fox.glb", None, None).unwrap();
        assert!(matches!(
            h.controller.load_status(ticket),
            Some(LoadStatus::Pending { .. })
        ));
        h.controller.frame();

        assert_eq!(h.controller.load_status(ticket), Some(LoadStatus::Installed));
        let model = h.controller.model().unwrap();
        // Tallest axis is 4 units, target size 2.
        assert!((model.root.scale - Vec3::splat(0.5)).length() < 1e-6);
        assert!(model.world_bounds().center().length() < 1e-5);
        let animation = h.controller.scene().animation.as_ref().unwrap();
        assert_eq!(animation.playing_count(), 2);
        assert!(h.sink.contains(
            Level::Info,
            "installed 'Fox' from Fox.glb (1 meshes, 2 clips, sha256 0123456789ab)"
        ));
    }

    #[test]
    fn install_log_flags_compressed_geometry() {
        let mut h = harness(StageConfig::default());
        h.controller.load_model("ruins.glb", None, None).unwrap();
        h.controller.frame();
        assert!(h.sink.contains(Level::Info, "sha256 0123456789ab, draco)"));
    }

    #[test]
    fn pending_status_reports_loader_progress() {
        let models = ManualModels::default();
        let mut h = harness_with(StageConfig::default(), Box::new(models.clone()));
        let ticket = h.controller.load_model("big.glb", None, None).unwrap();

        models.completers.borrow()[0].progress(10, Some(40));
        h.controller.frame();
        assert_eq!(
            h.controller.load_status(ticket),
            Some(LoadStatus::Pending {
                loaded: 10,
                total: Some(40)
            })
        );
        assert!(h.controller.has_pending_loads());

        let completer = models.completers.borrow_mut().remove(0);
        completer.finish(Ok(animated("Big", 1)));
        h.controller.frame();
        assert_eq!(h.controller.load_status(ticket), Some(LoadStatus::Installed));
        assert_eq!(h.controller.model().unwrap().name, "Big");
    }

    #[test]
    fn settled_status_is_reported_once() {
        let mut h = harness(StageConfig::default());
        let ticket = h.controller.load_model("fox.glb", None, None).unwrap();
        h.controller.frame();
        assert_eq!(h.controller.load_status(ticket), Some(LoadStatus::Installed));
        assert_eq!(h.controller.load_status(ticket), None);
    }

    #[test]
    fn unread_statuses_are_capped() {
        let mut h = harness(StageConfig::default());
        let first = h.controller.load_model("missing.glb", None, None).unwrap();
        for _ in 0..MAX_SETTLED_STATUSES * 2 {
            h.controller.load_model("missing.glb", None, None).unwrap();
            h.controller.frame();
        }
        assert_eq!(h.controller.statuses.len(), MAX_SETTLED_STATUSES);
        assert_eq!(h.controller.load_status(first), None);
    }

    #[test]
    fn second_load_leaves_exactly_one_model() {
        let mut h = harness(StageConfig::preset(Preset::Walk));
        h.controller.load_model("fox.glb", None, None).unwrap();
        h.controller.frame();
        h.controller.load_model("cube.glb", None, None).unwrap();
        h.controller.frame();

        assert_eq!(h.controller.model().unwrap().name, "Cube");
        // Cube has no clips, so the fox's controller must be gone too.
        assert!(h.controller.scene().animation.is_none());
        assert_eq!(h.controller.scene().generation, 2);
        assert!(h.sink.contains(Level::Info, "replacing 'Fox' with 'Cube'"));
        let frames = &h.controller.renderer().frames;
        assert_eq!(frames[0].0.as_deref(), Some("Fox"));
        assert_eq!(frames[1].0.as_deref(), Some("Cube"));
    }

    #[test]
    fn failed_load_is_logged_and_keeps_current_model() {
        let mut h = harness(StageConfig::default());
        h.controller.load_model("fox.glb", None, None).unwrap();
        h.controller.frame();
        let ticket = h.controller.load_model("missing.glb", None, None).unwrap();
        h.controller.frame();

        assert!(matches!(
            h.controller.load_status(ticket),
            Some(LoadStatus::Failed(_))
        ));
        assert!(h.sink.contains(Level::Error, "failed to load asset missing.glb"));
        assert_eq!(h.controller.model().unwrap().name, "Fox");
        assert_eq!(h.controller.renderer().frames.len(), 2);
    }

    #[test]
    fn invalid_parameters_issue_nothing() {
        let mut h = harness(StageConfig::default());
        assert!(matches!(
            h.controller.load_model("", None, None),
            Err(StageError::InvalidParameter(_))
        ));
        assert!(matches!(
            h.controller.load_model("fox.glb", Some("overlay.png"), Some(1.5)),
            Err(StageError::InvalidParameter(_))
        ));
        assert!(!h.controller.has_pending_loads());
        assert!(h.textures.completers.borrow().is_empty());
        assert_eq!(h.sink.count(Level::Error), 2);
    }

    #[test]
    fn degenerate_model_installs_at_native_scale() {
        let mut h = harness(StageConfig::default());
        let ticket = h.controller.load_model("flat.glb", None, None).unwrap();
        h.controller.frame();

        assert_eq!(h.controller.load_status(ticket), Some(LoadStatus::Installed));
        assert_eq!(h.controller.model().unwrap().root.scale, Vec3::ONE);
        assert!(h.sink.contains(Level::Warn, "degenerate geometry"));
    }

    #[test]
    fn overlay_requested_with_model_is_applied_after_install() {
        let mut h = harness(StageConfig::default());
        h.controller
            .load_model("fox.glb", Some("overlay.png"), Some(0.8))
            .unwrap();
        h.controller.frame();
        assert!(!h.controller.model().unwrap().materials()[0]
            .as_ref()
            .unwrap()
            .has_overlay());

        h.textures.finish_next(4, 4);
        h.controller.frame();
        let material = h.controller.model().unwrap().materials()[0].clone().unwrap();
        assert!(material.has_overlay());
        assert_eq!(material.emissive_intensity, 0.8);

        assert_eq!(h.controller.clear_overlay(), 1);
        assert!(!h.controller.model().unwrap().materials()[0]
            .as_ref()
            .unwrap()
            .has_overlay());
    }

    #[test]
    fn late_overlay_for_replaced_model_is_discarded() {
        let mut h = harness(StageConfig::default());
        h.controller.load_model("fox.glb", None, None).unwrap();
        h.controller.frame();
        let overlay = h.controller.load_overlay("overlay.png", None).unwrap();
        h.controller.load_model("cube.glb", None, None).unwrap();
        h.controller.frame();

        h.textures.finish_next(2, 2);
        h.controller.frame();
        assert_eq!(h.controller.load_status(overlay), Some(LoadStatus::Discarded));
        assert!(!h.controller.model().unwrap().materials()[0]
            .as_ref()
            .unwrap()
            .has_overlay());
        assert!(h.sink.contains(Level::Warn, "discarding overlay"));
    }

    #[test]
    fn overlay_without_model_is_rejected() {
        let mut h = harness(StageConfig::default());
        assert!(matches!(
            h.controller.load_overlay("overlay.png", None),
            Err(StageError::InvalidParameter(_))
        ));
    }

    #[test]
    fn keyboard_motion_moves_model_and_toggles_clip() {
        let mut h = harness(StageConfig::preset(Preset::Follow));
        h.controller.load_model("fox.glb", None, None).unwrap();
        h.controller.frame();
        let start = h.controller.model().unwrap().root.translation;
        assert!(!h.controller.scene().animation.as_ref().unwrap().is_playing(0));

        h.controller
            .handle_key(PhysicalKey::Code(KeyCode::KeyW), true);
        for _ in 0..10 {
            h.controller.frame();
        }
        let moved = h.controller.model().unwrap().root.translation;
        assert!((moved - start - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-4);
        assert!(h.controller.scene().animation.as_ref().unwrap().is_playing(0));

        // Follow camera sits at the model root + offset.
        let (_, eye) = *h.controller.renderer().frames.last().unwrap();
        let subject = h.controller.model().unwrap().root.translation;
        let CameraConfig::Follow { offset, .. } = StageConfig::preset(Preset::Follow).camera else {
            panic!("follow preset must use a follow camera");
        };
        assert!((eye - (subject + Vec3::from(offset))).length() < 1e-5);

        h.controller
            .handle_key(PhysicalKey::Code(KeyCode::KeyW), false);
        h.controller.frame();
        assert!(!h.controller.scene().animation.as_ref().unwrap().is_playing(0));
    }

    #[test]
    fn follow_camera_tracks_model_root_not_avatar() {
        let mut h = harness(StageConfig::preset(Preset::Follow));
        h.controller.load_model("offset.glb", None, None).unwrap();
        h.controller.frame();

        let root = h.controller.model().unwrap().root.translation;
        // Scale 0.5 moves the (11, 2, 11) centre to (5.5, 1, 5.5); ground puts it at (0, 1, 0).
        assert!((root - Vec3::new(-5.5, 0.0, -5.5)).length() < 1e-5);
        let CameraConfig::Follow {
            offset,
            look_offset,
        } = StageConfig::preset(Preset::Follow).camera
        else {
            panic!("follow preset must use a follow camera");
        };
        let camera = h.controller.scene().camera;
        assert!((camera.eye - (root + Vec3::from(offset))).length() < 1e-5);
        assert!((camera.target - (root + Vec3::from(look_offset))).length() < 1e-5);
    }

    #[test]
    fn walk_motion_keeps_clip_playing_on_the_circle() {
        let mut h = harness(StageConfig::preset(Preset::Walk));
        h.controller.load_model("fox.glb", None, None).unwrap();
        for _ in 0..120 {
            h.controller.frame();
        }
        let scene = h.controller.scene();
        assert!((scene.avatar.position.length() - 2.0).abs() < 1e-4);
        assert!(scene.animation.as_ref().unwrap().is_playing(0));
        assert!(scene.walk.time() > 1.9);
    }

    #[test]
    fn play_clip_out_of_range_is_reported() {
        let mut h = harness(StageConfig::preset(Preset::Follow));
        h.controller.load_model("fox.glb", None, None).unwrap();
        h.controller.frame();
        assert!(matches!(
            h.controller.play_clip(5),
            Err(StageError::IndexOutOfRange { index: 5, len: 2 })
        ));
        h.controller.play_clip(1).unwrap();
        assert_eq!(h.controller.scene().animation.as_ref().unwrap().active_clip(), 1);
    }

    #[test]
    fn resize_updates_aspect_and_ignores_zero() {
        let mut h = harness(StageConfig::default());
        h.controller.resize(800, 400);
        h.controller.resize(0, 400);
        assert_eq!(h.controller.scene().camera.aspect, 2.0);
        assert_eq!(h.controller.renderer().resizes, vec![(800, 400)]);
    }
}

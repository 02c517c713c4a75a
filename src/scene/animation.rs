//! Clip playback for a single model.
//!
//! `AnimationMixer` keeps per-clip playback time; `AnimationController` decides
//! which clips run based on the movement flag and the configured mode.
//! Sampling keyframes into poses is left to the renderer.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::{Result, StageError};

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds. Zero for single-keyframe clips.
    pub duration: f32,
    pub channels: usize,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration: f32, channels: usize) -> Self {
        Self {
            name: name.into(),
            duration,
            channels,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// First clip is armed and follows the movement flag.
    #[default]
    ArmFirst,
    /// Every clip starts looping at attach time.
    AutoPlayAll,
}

#[derive(Debug, Clone, Copy, Default)]
struct ClipAction {
    time: f32,
    playing: bool,
}

#[derive(Debug, Clone)]
pub struct AnimationMixer {
    clips: Vec<AnimationClip>,
    actions: Vec<ClipAction>,
}

impl AnimationMixer {
    pub fn new(clips: Vec<AnimationClip>) -> Self {
        let actions = vec![ClipAction::default(); clips.len()];
        Self { clips, actions }
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    /// Restarts a clip from time zero.
    pub fn play(&mut self, index: usize) {
        if let Some(action) = self.actions.get_mut(index) {
            action.time = 0.0;
            action.playing = true;
        }
    }

    /// Stops a clip and rewinds it.
    pub fn stop(&mut self, index: usize) {
        if let Some(action) = self.actions.get_mut(index) {
            action.time = 0.0;
            action.playing = false;
        }
    }

    pub fn stop_all(&mut self) {
        for index in 0..self.actions.len() {
            self.stop(index);
        }
    }

    pub fn is_playing(&self, index: usize) -> bool {
        self.actions.get(index).is_some_and(|action| action.playing)
    }

    pub fn time(&self, index: usize) -> Option<f32> {
        self.actions.get(index).map(|action| action.time)
    }

    pub fn playing_count(&self) -> usize {
        self.actions.iter().filter(|action| action.playing).count()
    }

    /// Moves every playing clip forward, looping at its duration.
    pub fn advance(&mut self, dt: f32) {
        for (action, clip) in self.actions.iter_mut().zip(&self.clips) {
            if !action.playing {
                continue;
            }
            action.time += dt;
            if clip.duration > 0.0 {
                action.time = action.time.rem_euclid(clip.duration);
            } else {
                action.time = 0.0;
            }
        }
    }
}

pub struct AnimationController {
    mixer: AnimationMixer,
    active: usize,
    moving: bool,
    diagnostics: Diagnostics,
}

impl AnimationController {
    /// Binds a mixer to the clips. `None` when there is nothing to play.
    pub fn attach(
        clips: Vec<AnimationClip>,
        mode: PlaybackMode,
        diagnostics: Diagnostics,
    ) -> Option<Self> {
        if clips.is_empty() {
            diagnostics.info("model has no animation clips; playback disabled");
            return None;
        }
        let mut controller = Self {
            mixer: AnimationMixer::new(clips),
            active: 0,
            moving: false,
            diagnostics,
        };
        if mode == PlaybackMode::AutoPlayAll {
            for index in 0..controller.mixer.clips().len() {
                controller.mixer.play(index);
            }
        }
        controller.diagnostics.info(format!(
            "attached {} clips ({:?}): {}",
            controller.mixer.clips().len(),
            mode,
            controller.clip_names().join(", ")
        ));
        Some(controller)
    }

    pub fn clips(&self) -> &[AnimationClip] {
        self.mixer.clips()
    }

    pub fn clip_names(&self) -> Vec<&str> {
        self.mixer
            .clips()
            .iter()
            .map(|clip| clip.name.as_str())
            .collect()
    }

    /// Index of the clip driven by the movement flag.
    pub fn active_clip(&self) -> usize {
        self.active
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn is_playing(&self, index: usize) -> bool {
        self.mixer.is_playing(index)
    }

    pub fn clip_time(&self, index: usize) -> Option<f32> {
        self.mixer.time(index)
    }

    pub fn playing_count(&self) -> usize {
        self.mixer.playing_count()
    }

    /// Edge-triggered: idle to moving replays the active clip from zero,
    /// moving to idle stops it. Repeating the current state does nothing.
    pub fn set_moving(&mut self, moving: bool) {
        if moving == self.moving {
            return;
        }
        self.moving = moving;
        if moving {
            self.mixer.play(self.active);
        } else {
            self.mixer.stop(self.active);
        }
    }

    /// Makes `index` the only playing clip, restarted from zero.
    pub fn play_clip_by_index(&mut self, index: usize) -> Result<()> {
        let len = self.mixer.clips().len();
        if index >= len {
            let err = StageError::IndexOutOfRange { index, len };
            self.diagnostics.warn(err.to_string());
            return Err(err);
        }
        self.mixer.stop_all();
        self.mixer.play(index);
        self.active = index;
        self.diagnostics
            .info(format!("playing clip {} '{}'", index, self.mixer.clips()[index].name));
        Ok(())
    }

    pub fn advance(&mut self, dt: f32) {
        self.mixer.advance(dt);
    }
}

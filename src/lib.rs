//! modelstage: loads one glTF model at a time, fits it to the stage, blends an
//! optional overlay texture into its materials, and drives clip playback, walk
//! motion and the camera rig every frame.

pub mod app;
pub mod assets;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod render;
pub mod scene;
pub mod ui;

pub use app::controller::{LoadStatus, LoadTicket, SceneContext, SceneController};
pub use config::StageConfig;
pub use error::StageError;

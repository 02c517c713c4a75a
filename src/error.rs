use crate::assets::AssetError;

/// Failures reported by the stage components. None of them stop the frame loop.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("failed to load asset {uri}: {source}")]
    AssetLoadFailure {
        uri: String,
        #[source]
        source: AssetError,
    },
    #[error("degenerate geometry: bounding box extent {extent:?} has a zero axis")]
    DegenerateGeometry { extent: [f32; 3] },
    #[error("clip index {index} out of range ({len} clips available)")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, StageError>;

/// Checks a mix factor is a finite value in `[0, 1]`.
pub fn validate_mix_factor(mix_factor: f32) -> Result<f32> {
    if mix_factor.is_finite() && (0.0..=1.0).contains(&mix_factor) {
        Ok(mix_factor)
    } else {
        Err(StageError::InvalidParameter(format!(
            "mix factor {mix_factor} is outside [0, 1]"
        )))
    }
}

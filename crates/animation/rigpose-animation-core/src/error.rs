//! Error types for the JSON/data boundaries of the core.
//!
//! Runtime operations (apply, mirror, scheduler transitions) never fail: missing
//! bones are skipped and illegal transitions are no-ops. Errors only surface
//! when importing configs, poses or clips.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PoseError {
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid clip '{clip}': {reason}")]
    InvalidClip { clip: String, reason: String },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
}

impl PoseError {
    pub fn invalid_clip(clip: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidClip {
            clip: clip.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PoseError>;

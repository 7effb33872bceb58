//! Plain data owned by the scheduler: per-target editable state, playback
//! entries, scrub state and pose history.

use serde::{Deserialize, Serialize};

use crate::compose::PoseLayer;
use crate::config::Config;
use crate::host::ClipRef;
use crate::mask::BoneMask;
use crate::snapshot::PoseSnapshot;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyMode {
    #[default]
    SinglePose,
    Stack,
}

/// Pre-apply snapshot of a rig, kept so an apply can be reverted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub label: String,
    pub pose: PoseSnapshot,
}

/// Everything editable about one rig. Saved when the selection moves away
/// from the rig and restored when it comes back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerTargetState {
    pub clip: Option<ClipRef>,
    pub time: f32,
    pub speed: f32,
    pub mask: BoneMask,
    pub blend_weight: f32,
    pub apply_mode: ApplyMode,
    pub stack: Vec<PoseLayer>,
    pub history: Vec<HistoryEntry>,
    pub was_playing: bool,
}

impl PerTargetState {
    pub fn with_defaults(cfg: &Config) -> Self {
        Self {
            clip: None,
            time: 0.0,
            speed: cfg.default_speed,
            mask: BoneMask::all(),
            blend_weight: cfg.default_blend_weight,
            apply_mode: ApplyMode::SinglePose,
            stack: Vec::new(),
            history: Vec::new(),
            was_playing: false,
        }
    }

    /// Append a history entry, dropping the oldest beyond `cap`.
    pub fn push_history(&mut self, entry: HistoryEntry, cap: usize) {
        self.history.push(entry);
        if self.history.len() > cap {
            let excess = self.history.len() - cap;
            self.history.drain(..excess);
        }
    }
}

impl Default for PerTargetState {
    fn default() -> Self {
        Self::with_defaults(&Config::default())
    }
}

/// A rig looping its own clip independently of the selection.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackEntry<N> {
    pub target: N,
    pub clip: ClipRef,
    pub elapsed: f32,
    pub speed: f32,
    pub mask: BoneMask,
    /// Live transforms captured when playback started; masked-out bones are
    /// held at these values.
    pub rest: PoseSnapshot,
}

/// The selected rig held at a fixed clip time.
#[derive(Clone, Debug, PartialEq)]
pub struct ScrubState<N> {
    pub target: N,
    pub rest: PoseSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_capped_oldest_first() {
        let mut st = PerTargetState::default();
        for i in 0..5 {
            st.push_history(
                HistoryEntry {
                    label: format!("h{i}"),
                    pose: PoseSnapshot::default(),
                },
                3,
            );
        }
        let labels: Vec<&str> = st.history.iter().map(|h| h.label.as_str()).collect();
        assert_eq!(labels, vec!["h2", "h3", "h4"]);
    }

    #[test]
    fn defaults_follow_config() {
        let cfg = Config {
            default_speed: 2.0,
            default_blend_weight: 0.5,
            ..Config::default()
        };
        let st = PerTargetState::with_defaults(&cfg);
        assert_eq!(st.speed, 2.0);
        assert_eq!(st.blend_weight, 0.5);
        assert!(st.clip.is_none());
        assert!(!st.was_playing);
    }
}

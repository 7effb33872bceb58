//! Events published by the preview scheduler.
//!
//! Events are queued on the scheduler and drained by the host after each call
//! (`PreviewScheduler::drain_events`). The scheduler never depends on anyone
//! reading them.

use serde::{Deserialize, Serialize};

use crate::compose::BoneDiff;

/// Discrete signals emitted by scheduler commands and ticks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PreviewEvent<N> {
    TargetChanged {
        previous: Option<N>,
        current: Option<N>,
    },
    /// Playing/Scrubbing flags of a rig changed.
    StateChanged {
        target: N,
        playing: bool,
        scrubbing: bool,
    },
    TimeChanged {
        target: N,
        time: f32,
    },
    DiffComputed {
        target: N,
        diffs: Vec<BoneDiff>,
    },
    PoseApplied {
        target: N,
        label: String,
        bones: usize,
    },
}

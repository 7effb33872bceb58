//! Rigpose Animation Core (engine-agnostic)
//!
//! Pose capture, bone masks, left/right mirroring, layered pose blending and a
//! multi-rig playback/preview scheduler. The live transform hierarchy, the clip
//! sampler and the undo system belong to the host and are reached through the
//! traits in [`host`]; [`memory`] provides an in-memory implementation.

pub mod clip;
pub mod compose;
pub mod config;
pub mod error;
pub mod host;
pub mod ids;
pub mod mask;
pub mod memory;
pub mod mirror;
pub mod scheduler;
pub mod snapshot;

// Re-exports for consumers (adapters)
pub use clip::{parse_pose_clip_json, sample_bone_track, BoneKey, BoneTrack, PoseClip};
pub use compose::{apply, apply_stack, compute_diff, mirror_with_map, BoneDiff, PoseLayer};
pub use config::{Config, DiffConfig};
pub use error::{PoseError, Result};
pub use host::{
    CheckpointSink, ClipEvaluator, ClipRef, NoCheckpoints, RecordedCheckpoints, SceneGraph,
};
pub use ids::ClipId;
pub use mask::{BoneMask, MaskMode};
pub use memory::{BoneDesc, KeyframeEvaluator, MemoryScene, NodeId, RigDesc};
pub use mirror::{
    default_patterns, detect, mirror_snapshot, MatchKind, MirrorAxis, MirrorPair, MirrorPairMap,
    MirrorPattern,
};
pub use scheduler::{
    ApplyMode, HistoryEntry, PerTargetState, PlaybackEntry, PreviewEvent, PreviewScheduler,
    SchedulerState,
};
pub use snapshot::{parse_pose_json, BoneRecord, PoseSnapshot, RigKind};
pub use rigpose_api_core::{BonePath, BoneTransform, Quat, Vec3};

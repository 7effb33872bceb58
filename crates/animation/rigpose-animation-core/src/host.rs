//! Host collaborator traits.
//!
//! The core never owns the live transform hierarchy or the clip sampler. Hosts
//! (an editor, a game engine adapter, or [`crate::memory`] in tests) implement
//! these traits and pass them into the composer and scheduler calls.

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::ids::ClipId;
use crate::snapshot::RigKind;
use rigpose_api_core::{BonePath, BoneTransform};

/// Live transform hierarchy.
pub trait SceneGraph {
    /// Opaque node handle. A rig is identified by its root node.
    type Node: Copy + Eq + Hash + Debug;

    /// Every node under `root` (root included, as the empty path), parents
    /// before children.
    fn walk(&self, root: Self::Node) -> Vec<(BonePath, Self::Node)>;

    fn read(&self, node: Self::Node) -> BoneTransform;

    fn write(&mut self, node: Self::Node, transform: BoneTransform);

    fn find(&self, root: Self::Node, path: &BonePath) -> Option<Self::Node>;

    /// Flag a node as needing persistence after a committed write.
    fn mark_dirty(&mut self, _node: Self::Node) {}

    fn rig_kind(&self, _root: Self::Node) -> RigKind {
        RigKind::Generic
    }
}

/// Samples clips into a scene inside batches of an evaluator session.
///
/// Contract: a node not sampled within a batch reverts toward its pre-session
/// rest value at the next `begin_batch`.
pub trait ClipEvaluator<S: SceneGraph> {
    fn begin_batch(&mut self, scene: &mut S);
    fn sample(&mut self, scene: &mut S, root: S::Node, clip: &ClipRef, time: f32);
    fn end_batch(&mut self, scene: &mut S);
    fn is_session_active(&self) -> bool;
    fn start_session(&mut self, scene: &mut S);
    fn stop_session(&mut self, scene: &mut S);
}

/// Undo checkpoint sink, called with the exact node set before committed writes.
pub trait CheckpointSink<N> {
    fn checkpoint(&mut self, nodes: &[N], label: &str);
}

/// Reference to a clip known to the evaluator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipRef {
    pub id: ClipId,
    pub name: String,
    /// Length in seconds.
    pub length: f32,
    pub frame_rate: f32,
}

impl ClipRef {
    /// Finite and positive; NaN lengths fail this too.
    fn has_length(&self) -> bool {
        self.length.is_finite() && self.length > 0.0
    }

    pub fn frame_count(&self) -> u32 {
        if !self.has_length() || !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return 0;
        }
        (self.length * self.frame_rate).round() as u32
    }

    /// Clamp a time into `[0, length]`.
    pub fn clamp_time(&self, time: f32) -> f32 {
        if !time.is_finite() || !self.has_length() {
            return 0.0;
        }
        time.clamp(0.0, self.length)
    }

    /// Wrap a time into `[0, length)` for seamless looping.
    pub fn wrap_time(&self, time: f32) -> f32 {
        if !time.is_finite() || !self.has_length() {
            return 0.0;
        }
        let t = time.rem_euclid(self.length);
        // rem_euclid can round up to `length` for tiny negative inputs.
        if t >= self.length {
            0.0
        } else {
            t
        }
    }
}

/// Checkpoint sink that ignores checkpoints, for hosts without undo.
#[derive(Debug, Default)]
pub struct NoCheckpoints;

impl<N> CheckpointSink<N> for NoCheckpoints {
    fn checkpoint(&mut self, _nodes: &[N], _label: &str) {}
}

/// Checkpoint sink that records every call; useful for tools and tests.
#[derive(Debug)]
pub struct RecordedCheckpoints<N> {
    pub calls: Vec<(Vec<N>, String)>,
}

impl<N> Default for RecordedCheckpoints<N> {
    fn default() -> Self {
        Self { calls: Vec::new() }
    }
}

impl<N: Clone> CheckpointSink<N> for RecordedCheckpoints<N> {
    fn checkpoint(&mut self, nodes: &[N], label: &str) {
        self.calls.push((nodes.to_vec(), label.to_string()));
    }
}

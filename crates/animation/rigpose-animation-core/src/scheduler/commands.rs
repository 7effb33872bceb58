//! Composer commands bound to the selected rig's editable state.
//!
//! Every write here is permanent: it runs inside the commit bracket, records a
//! pre-apply history entry, checkpoints the touched nodes and marks them dirty.

use std::fmt::Debug;
use std::hash::Hash;

use log::debug;

use super::{ApplyMode, HistoryEntry, PreviewEvent, PreviewScheduler};
use crate::compose::{self, BoneDiff, APPLY_LABEL, APPLY_STACK_LABEL, MIRROR_LABEL};
use crate::host::{CheckpointSink, ClipEvaluator, SceneGraph};
use crate::mask::BoneMask;
use crate::mirror::{self, MirrorAxis, MirrorPairMap};
use crate::snapshot::PoseSnapshot;

const REVERT_LABEL: &str = "Revert Pose";

impl<N> PreviewScheduler<N>
where
    N: Copy + Eq + Hash + Debug,
{
    /// Pause everything but the selected rig, run `write` against the real
    /// scene, then resume. Returns `None` without a selection.
    fn with_commit_bracket<S, E, F>(
        &mut self,
        scene: &mut S,
        evaluator: &mut E,
        label: &str,
        write: F,
    ) -> Option<usize>
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
        F: FnOnce(&Self, &mut S, N) -> usize,
    {
        let target = self.selected?;
        let removed = self.pause_all_for_apply(Some(target), scene, evaluator);

        let before = PoseSnapshot::capture(scene, target, label, "history", &BoneMask::all());
        let bones = write(self, scene, target);
        if bones > 0 {
            let cap = self.cfg.max_history;
            self.current.push_history(
                HistoryEntry {
                    label: label.to_string(),
                    pose: before,
                },
                cap,
            );
            self.events.push(PreviewEvent::PoseApplied {
                target,
                label: label.to_string(),
                bones,
            });
        }

        self.resume_background_playback(removed, scene, evaluator);
        debug!("{}: {} bones on {:?}", label, bones, target);
        Some(bones)
    }

    /// Write `pose` onto the selected rig using its mask and blend weight.
    pub fn apply_pose<S, E>(
        &mut self,
        pose: &PoseSnapshot,
        scene: &mut S,
        evaluator: &mut E,
        sink: &mut dyn CheckpointSink<N>,
    ) -> usize
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        self.with_commit_bracket(scene, evaluator, APPLY_LABEL, |this, scene, root| {
            compose::apply(
                scene,
                root,
                pose,
                &this.current.mask,
                this.current.blend_weight,
                Some(sink),
            )
        })
        .unwrap_or(0)
    }

    /// Blend the selected rig's layer stack onto it.
    pub fn apply_stack<S, E>(
        &mut self,
        scene: &mut S,
        evaluator: &mut E,
        sink: &mut dyn CheckpointSink<N>,
    ) -> usize
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        if self.current.stack.iter().all(|l| !l.enabled || l.source_pose.is_none()) {
            return 0;
        }
        self.with_commit_bracket(scene, evaluator, APPLY_STACK_LABEL, |this, scene, root| {
            compose::apply_stack(scene, root, &this.current.stack, Some(sink))
        })
        .unwrap_or(0)
    }

    /// Apply according to the selected rig's [`ApplyMode`]; `pose` is only
    /// used in single-pose mode.
    pub fn apply_by_mode<S, E>(
        &mut self,
        pose: Option<&PoseSnapshot>,
        scene: &mut S,
        evaluator: &mut E,
        sink: &mut dyn CheckpointSink<N>,
    ) -> usize
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        match (self.current.apply_mode, pose) {
            (ApplyMode::SinglePose, Some(pose)) => self.apply_pose(pose, scene, evaluator, sink),
            (ApplyMode::SinglePose, None) => 0,
            (ApplyMode::Stack, _) => self.apply_stack(scene, evaluator, sink),
        }
    }

    /// Mirror `source` across `pairs` onto the selected rig.
    pub fn mirror_pose<S, E>(
        &mut self,
        source: &PoseSnapshot,
        pairs: &MirrorPairMap,
        axis: MirrorAxis,
        scene: &mut S,
        evaluator: &mut E,
        sink: &mut dyn CheckpointSink<N>,
    ) -> usize
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        self.with_commit_bracket(scene, evaluator, MIRROR_LABEL, |this, scene, root| {
            compose::mirror_with_map(
                scene,
                root,
                source,
                pairs,
                axis,
                this.current.blend_weight,
                Some(sink),
            )
        })
        .unwrap_or(0)
    }

    /// Left/right pairs on the selected rig using the configured patterns.
    pub fn detect_mirror_pairs<S>(&self, scene: &S) -> MirrorPairMap
    where
        S: SceneGraph<Node = N>,
    {
        let Some(root) = self.selected else {
            return MirrorPairMap::new();
        };
        let live = PoseSnapshot::capture(scene, root, "", "", &BoneMask::all());
        mirror::detect(live.paths(), &self.cfg.mirror_patterns)
    }

    /// Re-apply a stored history snapshot in full.
    pub fn revert_history<S, E>(
        &mut self,
        index: usize,
        scene: &mut S,
        evaluator: &mut E,
        sink: &mut dyn CheckpointSink<N>,
    ) -> usize
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let Some(entry) = self.current.history.get(index).cloned() else {
            return 0;
        };
        self.with_commit_bracket(scene, evaluator, REVERT_LABEL, |_, scene, root| {
            compose::apply(scene, root, &entry.pose, &BoneMask::all(), 1.0, Some(sink))
        })
        .unwrap_or(0)
    }

    /// Ranked differences from the selected rig's live pose to `target`.
    pub fn compute_diff<S>(&mut self, target: &PoseSnapshot, scene: &S) -> Vec<BoneDiff>
    where
        S: SceneGraph<Node = N>,
    {
        let Some(root) = self.selected else {
            return Vec::new();
        };
        let diffs = compose::compute_diff(scene, root, target, &self.current.mask, &self.cfg.diff);
        self.events.push(PreviewEvent::DiffComputed {
            target: root,
            diffs: diffs.clone(),
        });
        diffs
    }

    /// Snapshot of the selected rig at the current clip time, masked.
    ///
    /// With a session open, the rig is sampled inside a full batch so other
    /// playing rigs are not reset by the capture.
    pub fn capture_current_frame<S, E>(
        &mut self,
        name: &str,
        scene: &mut S,
        evaluator: &mut E,
    ) -> Option<PoseSnapshot>
    where
        S: SceneGraph<Node = N>,
        E: ClipEvaluator<S>,
    {
        let root = self.selected?;
        let clip = self.current.clip.clone()?;
        let time = clip.clamp_time(self.current.time);
        let mask = self.current.mask.clone();
        let mut snapshot = if evaluator.is_session_active() {
            let sampled = self.is_target_playing(root) || self.is_scrubbing();
            let extra = (!sampled).then_some((root, &clip, time));
            self.evaluate_batch_with(scene, evaluator, extra);
            PoseSnapshot::capture(scene, root, name, "", &mask)
        } else {
            PoseSnapshot::capture_clip_frame(scene, evaluator, root, &clip, time, &mask)
        };
        snapshot.name = name.to_string();
        snapshot.source_description = format!("clip:{} @ {:.3}s", clip.name, time);
        Some(snapshot)
    }
}

//! Transform composer: stateless algorithms that write poses onto a live rig
//! or derive data from it.
//!
//! - `apply`: one pose, masked, optionally blended against the live value
//! - `apply_stack`: ordered layers blended against one shared baseline
//! - `compute_diff`: ranked per-bone deltas between a pose and the live rig
//! - `mirror_with_map`: axis-reflected transfer across mapped L/R pairs
//!
//! Missing data is never an error: bones absent from the rig or the pose are
//! skipped. Committed writes call the checkpoint sink once, with every node
//! about to be written, before the first write; each written node is then
//! marked dirty.

use hashbrown::{HashMap, HashSet};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::DiffConfig;
use crate::host::{CheckpointSink, SceneGraph};
use crate::mask::BoneMask;
use crate::mirror::{mirror_position, mirror_rotation, MirrorAxis, MirrorPairMap};
use crate::snapshot::PoseSnapshot;
use rigpose_api_core::{
    normalize_angle_degrees, quat_inverse, quat_mul, quat_to_euler_degrees, vec3_length,
    vec3_sub, BonePath, BoneTransform, Vec3,
};

pub const APPLY_LABEL: &str = "Apply Pose";
pub const APPLY_STACK_LABEL: &str = "Apply Pose Stack";
pub const MIRROR_LABEL: &str = "Mirror Pose";

/// One entry of a layered pose stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseLayer {
    pub name: String,
    #[serde(default)]
    pub source_pose: Option<PoseSnapshot>,
    #[serde(default)]
    pub mask: BoneMask,
    pub blend_weight: f32,
    pub enabled: bool,
}

impl PoseLayer {
    pub fn new(name: impl Into<String>, pose: PoseSnapshot, blend_weight: f32) -> Self {
        Self {
            name: name.into(),
            source_pose: Some(pose),
            mask: BoneMask::all(),
            blend_weight: clamp_weight(blend_weight),
            enabled: true,
        }
    }

    pub fn with_mask(mut self, mask: BoneMask) -> Self {
        self.mask = mask;
        self
    }
}

/// Per-bone difference between a target pose and the live rig.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneDiff {
    pub path: BonePath,
    pub position_delta: Vec3,
    /// Euler degrees, each axis in (-180, 180].
    pub rotation_delta: Vec3,
    pub scale_delta: Vec3,
    pub magnitude: f32,
}

#[inline]
pub fn clamp_weight(w: f32) -> f32 {
    if w.is_nan() {
        0.0
    } else {
        w.clamp(0.0, 1.0)
    }
}

/// Checkpoint (if committing) then write each `(node, value)` in order.
fn write_all<S: SceneGraph>(
    scene: &mut S,
    writes: &[(S::Node, BoneTransform)],
    commit: Option<&mut dyn CheckpointSink<S::Node>>,
    label: &str,
) -> usize {
    let mut touched: Vec<S::Node> = Vec::with_capacity(writes.len());
    let mut seen: HashSet<S::Node> = HashSet::with_capacity(writes.len());
    for (node, _) in writes {
        if seen.insert(*node) {
            touched.push(*node);
        }
    }
    if touched.is_empty() {
        return 0;
    }

    let committing = match commit {
        Some(sink) => {
            sink.checkpoint(&touched, label);
            true
        }
        None => false,
    };
    for (node, value) in writes {
        scene.write(*node, *value);
    }
    if committing {
        for node in &touched {
            scene.mark_dirty(*node);
        }
    }
    debug!(
        "{}: wrote {} bones (committed: {})",
        label,
        touched.len(),
        committing
    );
    touched.len()
}

/// Write `pose` onto the rig under `root`. Returns the number of bones written.
///
/// With `blend_weight >= 1` stored values overwrite the live ones; otherwise
/// position/scale lerp and rotation slerps from the current live value.
pub fn apply<S: SceneGraph>(
    scene: &mut S,
    root: S::Node,
    pose: &PoseSnapshot,
    mask: &BoneMask,
    blend_weight: f32,
    commit: Option<&mut dyn CheckpointSink<S::Node>>,
) -> usize {
    let w = clamp_weight(blend_weight);
    let mut writes = Vec::with_capacity(pose.len());
    for rec in pose.iter() {
        if !mask.is_included(&rec.path) {
            continue;
        }
        let Some(node) = scene.find(root, &rec.path) else {
            trace!("apply: '{}' not on rig, skipped", rec.path);
            continue;
        };
        let value = if w >= 1.0 {
            rec.transform
        } else {
            BoneTransform::blend(&scene.read(node), &rec.transform, w)
        };
        writes.push((node, value));
    }
    write_all(scene, &writes, commit, APPLY_LABEL)
}

/// Apply enabled layers in order, each blended from one baseline captured
/// before any write. A bone touched by several layers keeps the last layer's
/// value. Returns the number of distinct bones written.
pub fn apply_stack<S: SceneGraph>(
    scene: &mut S,
    root: S::Node,
    layers: &[PoseLayer],
    commit: Option<&mut dyn CheckpointSink<S::Node>>,
) -> usize {
    let baseline: HashMap<BonePath, (S::Node, BoneTransform)> = scene
        .walk(root)
        .into_iter()
        .map(|(path, node)| {
            let value = scene.read(node);
            (path, (node, value))
        })
        .collect();

    let mut writes = Vec::new();
    for layer in layers.iter().filter(|l| l.enabled) {
        let Some(pose) = layer.source_pose.as_ref() else {
            continue;
        };
        let w = clamp_weight(layer.blend_weight);
        for rec in pose.iter() {
            if !layer.mask.is_included(&rec.path) {
                continue;
            }
            let Some((node, base)) = baseline.get(&rec.path) else {
                trace!("apply_stack: '{}' not on rig, skipped", rec.path);
                continue;
            };
            writes.push((*node, BoneTransform::blend(base, &rec.transform, w)));
        }
    }
    write_all(scene, &writes, commit, APPLY_STACK_LABEL)
}

/// Per-bone deltas from the live rig to `target`, largest first.
pub fn compute_diff<S: SceneGraph>(
    scene: &S,
    root: S::Node,
    target: &PoseSnapshot,
    mask: &BoneMask,
    cfg: &DiffConfig,
) -> Vec<BoneDiff> {
    let mut diffs = Vec::new();
    for rec in target.iter() {
        if !mask.is_included(&rec.path) {
            continue;
        }
        let Some(node) = scene.find(root, &rec.path) else {
            continue;
        };
        let live = scene.read(node);
        let position_delta = vec3_sub(rec.transform.position, live.position);
        let euler = quat_to_euler_degrees(quat_mul(
            rec.transform.rotation,
            quat_inverse(live.rotation),
        ));
        let rotation_delta = [
            normalize_angle_degrees(euler[0]),
            normalize_angle_degrees(euler[1]),
            normalize_angle_degrees(euler[2]),
        ];
        let scale_delta = vec3_sub(rec.transform.scale, live.scale);
        let magnitude =
            vec3_length(position_delta) + cfg.rotation_weight * vec3_length(rotation_delta);

        if magnitude > cfg.magnitude_epsilon || vec3_length(scale_delta) > cfg.scale_epsilon {
            diffs.push(BoneDiff {
                path: rec.path.clone(),
                position_delta,
                rotation_delta,
                scale_delta,
                magnitude,
            });
        }
    }
    diffs.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
    diffs
}

/// For every enabled pair, mirror the source bone's stored rotation/position
/// from `source_pose` and write it onto the target bone of the live rig.
/// Target scale is kept. Returns the number of bones written.
pub fn mirror_with_map<S: SceneGraph>(
    scene: &mut S,
    root: S::Node,
    source_pose: &PoseSnapshot,
    pairs: &MirrorPairMap,
    axis: MirrorAxis,
    blend_weight: f32,
    commit: Option<&mut dyn CheckpointSink<S::Node>>,
) -> usize {
    let w = clamp_weight(blend_weight);
    let stored = source_pose.lookup();
    let mut writes = Vec::new();
    for (source, target) in pairs.build_lookup() {
        let Some(src) = stored.get(&source) else {
            trace!("mirror: source '{}' not in pose, skipped", source);
            continue;
        };
        let Some(node) = scene.find(root, &target) else {
            trace!("mirror: target '{}' not on rig, skipped", target);
            continue;
        };
        let live = scene.read(node);
        let mirrored = BoneTransform {
            position: mirror_position(src.position, axis),
            rotation: mirror_rotation(src.rotation, axis),
            scale: live.scale,
        };
        writes.push((node, BoneTransform::blend(&live, &mirrored, w)));
    }
    write_all(scene, &writes, commit, MIRROR_LABEL)
}

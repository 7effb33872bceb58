//! PoseSnapshot: ordered (bone path -> local transform) records captured from a
//! rig, either from its live state or from a sampled clip frame.
//!
//! A snapshot is built once and read many times; the record list is private so
//! stored snapshots cannot be edited in place. Cloning deep-copies the records.

use hashbrown::HashMap;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::host::{ClipEvaluator, ClipRef, SceneGraph};
use crate::mask::BoneMask;
use rigpose_api_core::{BonePath, BoneTransform};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RigKind {
    #[default]
    Generic,
    Humanoid,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneRecord {
    pub path: BonePath,
    pub transform: BoneTransform,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseSnapshot {
    pub name: String,
    #[serde(default)]
    pub source_description: String,
    #[serde(default)]
    pub rig_kind: RigKind,
    bones: Vec<BoneRecord>,
}

impl PoseSnapshot {
    pub fn from_records(
        name: impl Into<String>,
        source_description: impl Into<String>,
        rig_kind: RigKind,
        bones: Vec<BoneRecord>,
    ) -> Self {
        Self {
            name: name.into(),
            source_description: source_description.into(),
            rig_kind,
            bones,
        }
    }

    /// Capture the live transforms of every masked-in node under `root` in a
    /// single walk.
    pub fn capture<S: SceneGraph>(
        scene: &S,
        root: S::Node,
        name: &str,
        source_description: &str,
        mask: &BoneMask,
    ) -> Self {
        let bones: Vec<BoneRecord> = scene
            .walk(root)
            .into_iter()
            .filter(|(path, _)| mask.is_included(path))
            .map(|(path, node)| BoneRecord {
                transform: scene.read(node),
                path,
            })
            .collect();
        trace!("capture '{}': {} bones", name, bones.len());
        Self {
            name: name.to_string(),
            source_description: source_description.to_string(),
            rig_kind: scene.rig_kind(root),
            bones,
        }
    }

    /// Sample `clip` at `time` onto the rig and capture the result.
    ///
    /// The sample runs as one complete batch before the walk begins. A session
    /// is opened only if none is active, and closed again afterwards (which
    /// restores the rig's rest values).
    pub fn capture_clip_frame<S, E>(
        scene: &mut S,
        evaluator: &mut E,
        root: S::Node,
        clip: &ClipRef,
        time: f32,
        mask: &BoneMask,
    ) -> Self
    where
        S: SceneGraph,
        E: ClipEvaluator<S>,
    {
        let time = clip.clamp_time(time);
        let opened = !evaluator.is_session_active();
        if opened {
            evaluator.start_session(scene);
        }
        evaluator.begin_batch(scene);
        evaluator.sample(scene, root, clip, time);
        evaluator.end_batch(scene);

        let snapshot = Self::capture(
            scene,
            root,
            &format!("{} @ {:.3}s", clip.name, time),
            &format!("clip:{}", clip.name),
            mask,
        );

        if opened {
            evaluator.stop_session(scene);
        }
        snapshot
    }

    pub fn get(&self, path: &BonePath) -> Option<&BoneTransform> {
        self.bones
            .iter()
            .find(|b| &b.path == path)
            .map(|b| &b.transform)
    }

    /// Path -> transform table for repeated lookups.
    pub fn lookup(&self) -> HashMap<&BonePath, &BoneTransform> {
        self.bones.iter().map(|b| (&b.path, &b.transform)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoneRecord> {
        self.bones.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &BonePath> {
        self.bones.iter().map(|b| &b.path)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn into_records(self) -> Vec<BoneRecord> {
        self.bones
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Parse a pose snapshot previously written by [`PoseSnapshot::to_json`].
pub fn parse_pose_json(s: &str) -> Result<PoseSnapshot> {
    Ok(serde_json::from_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryScene;

    fn small_rig() -> (MemoryScene, crate::memory::NodeId) {
        let mut scene = MemoryScene::new();
        let root = scene.add_root("Rig");
        let hips = scene.add_child(root, "Hips", BoneTransform::from_position([0.0, 1.0, 0.0]));
        scene.add_child(hips, "Spine", BoneTransform::from_position([0.0, 0.2, 0.0]));
        (scene, root)
    }

    #[test]
    fn capture_walks_in_order_and_respects_mask() {
        let (scene, root) = small_rig();
        let all = PoseSnapshot::capture(&scene, root, "all", "live", &BoneMask::all());
        let paths: Vec<&str> = all.paths().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["", "Hips", "Hips/Spine"]);

        let only_spine = BoneMask::include_only(["Hips/Spine"]);
        let masked = PoseSnapshot::capture(&scene, root, "m", "live", &only_spine);
        assert_eq!(masked.len(), 1);
        assert_eq!(
            masked.get(&BonePath::from("Hips/Spine")).unwrap().position,
            [0.0, 0.2, 0.0]
        );
    }

    #[test]
    fn json_round_trip() {
        let (scene, root) = small_rig();
        let snap = PoseSnapshot::capture(&scene, root, "pose", "live", &BoneMask::all());
        let json = snap.to_json().unwrap();
        let back = parse_pose_json(&json).unwrap();
        assert_eq!(back, snap);
    }
}

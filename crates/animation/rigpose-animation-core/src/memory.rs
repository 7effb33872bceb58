//! In-memory host: a transform arena holding any number of rigs, plus a
//! keyframe clip evaluator with preview-session semantics.
//!
//! Used by tests and headless tools. The scene tracks which nodes were marked
//! dirty and counts dirty marks that happened while an evaluator session was
//! driving it, so callers can check that committed writes never land on a
//! driven rig.

use hashbrown::HashMap;
use indexmap::IndexSet;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::clip::{sample_bone_track, PoseClip};
use crate::error::Result;
use crate::host::{ClipEvaluator, ClipRef, SceneGraph};
use crate::ids::{ClipId, IdAllocator};
use crate::snapshot::RigKind;
use rigpose_api_core::{BonePath, BoneTransform};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Clone, Debug)]
struct NodeData {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    transform: BoneTransform,
}

/// One bone of a rig description. Parents missing from the list are created
/// with identity transforms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneDesc {
    pub path: BonePath,
    #[serde(default)]
    pub transform: BoneTransform,
}

/// Serializable rig layout, as stored in fixture files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigDesc {
    pub name: String,
    #[serde(default)]
    pub kind: RigKind,
    #[serde(default)]
    pub bones: Vec<BoneDesc>,
}

impl RigDesc {
    pub fn from_json(s: &str) -> Result<RigDesc> {
        Ok(serde_json::from_str(s)?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryScene {
    nodes: Vec<NodeData>,
    roots: Vec<NodeId>,
    kinds: HashMap<NodeId, RigKind>,
    dirty: IndexSet<NodeId>,
    driven: bool,
    dirty_while_driven: usize,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_node(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        transform: BoneTransform,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            transform,
        });
        if let Some(p) = parent {
            self.nodes[p.0 as usize].children.push(id);
        }
        id
    }

    pub fn add_root(&mut self, name: &str) -> NodeId {
        let id = self.push_node(name, None, BoneTransform::IDENTITY);
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: NodeId, name: &str, transform: BoneTransform) -> NodeId {
        self.push_node(name, Some(parent), transform)
    }

    pub fn set_rig_kind(&mut self, root: NodeId, kind: RigKind) {
        self.kinds.insert(root, kind);
    }

    /// Build a rig from its description and return the root node.
    pub fn add_rig(&mut self, desc: &RigDesc) -> NodeId {
        let root = self.add_root(&desc.name);
        self.set_rig_kind(root, desc.kind);
        for bone in &desc.bones {
            let node = self.ensure_path(root, &bone.path);
            self.nodes[node.0 as usize].transform = bone.transform;
        }
        debug!("rig '{}' added with {} bones", desc.name, desc.bones.len());
        root
    }

    fn ensure_path(&mut self, root: NodeId, path: &BonePath) -> NodeId {
        let mut current = root;
        for segment in path.segments() {
            current = match self.child_named(current, segment) {
                Some(child) => child,
                None => self.push_node(segment, Some(current), BoneTransform::IDENTITY),
            };
        }
        current
    }

    fn child_named(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .get(node.0 as usize)?
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[c.0 as usize].name == name)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0 as usize).map(|n| n.name.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0 as usize).and_then(|n| n.parent)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every node of every rig, in creation order.
    pub fn all_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn transform_at(&self, root: NodeId, path: &str) -> Option<BoneTransform> {
        self.find(root, &BonePath::from(path)).map(|n| self.read(n))
    }

    pub fn set_driven(&mut self, driven: bool) {
        self.driven = driven;
    }

    pub fn is_driven(&self) -> bool {
        self.driven
    }

    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.dirty.contains(&node)
    }

    pub fn dirty_nodes(&self) -> Vec<NodeId> {
        self.dirty.iter().copied().collect()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Dirty marks issued while an evaluator session was active.
    pub fn dirty_while_driven(&self) -> usize {
        self.dirty_while_driven
    }
}

impl SceneGraph for MemoryScene {
    type Node = NodeId;

    fn walk(&self, root: NodeId) -> Vec<(BonePath, NodeId)> {
        let mut out = Vec::new();
        if root.0 as usize >= self.nodes.len() {
            return out;
        }
        // Preorder; children pushed in reverse so they pop in insertion order.
        let mut stack = vec![(BonePath::root(), root)];
        while let Some((path, node)) = stack.pop() {
            for child in self.nodes[node.0 as usize].children.iter().rev() {
                stack.push((path.join(&self.nodes[child.0 as usize].name), *child));
            }
            out.push((path, node));
        }
        out
    }

    fn read(&self, node: NodeId) -> BoneTransform {
        self.nodes
            .get(node.0 as usize)
            .map(|n| n.transform)
            .unwrap_or_default()
    }

    fn write(&mut self, node: NodeId, transform: BoneTransform) {
        if let Some(n) = self.nodes.get_mut(node.0 as usize) {
            n.transform = transform;
        }
    }

    fn find(&self, root: NodeId, path: &BonePath) -> Option<NodeId> {
        if root.0 as usize >= self.nodes.len() {
            return None;
        }
        let mut current = root;
        for segment in path.segments() {
            current = self.child_named(current, segment)?;
        }
        Some(current)
    }

    fn mark_dirty(&mut self, node: NodeId) {
        if self.driven {
            warn!("node {:?} marked dirty while driven by a preview session", node);
            self.dirty_while_driven += 1;
        }
        self.dirty.insert(node);
    }

    fn rig_kind(&self, root: NodeId) -> RigKind {
        self.kinds.get(&root).copied().unwrap_or_default()
    }
}

/// One `sample` call recorded inside a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleCall {
    pub root: NodeId,
    pub clip: ClipId,
    pub time: f32,
}

/// Keyframe evaluator over [`PoseClip`]s.
///
/// A session records the rest transform of every scene node when it starts.
/// Each `begin_batch` restores those rest values, so nodes not sampled in a
/// batch revert to rest; `stop_session` restores them for good.
#[derive(Debug, Default)]
pub struct KeyframeEvaluator {
    ids: IdAllocator,
    clips: Vec<(ClipId, PoseClip)>,
    rest: Option<Vec<(NodeId, BoneTransform)>>,
    in_batch: bool,
    current_batch: Vec<SampleCall>,
    last_batch: Vec<SampleCall>,
    batches: usize,
    sessions_started: usize,
}

impl KeyframeEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a clip.
    pub fn load_clip(&mut self, clip: PoseClip) -> Result<ClipRef> {
        clip.validate()?;
        let id = self.ids.alloc_clip();
        let clip_ref = ClipRef {
            id,
            name: clip.name.clone(),
            length: clip.duration,
            frame_rate: clip.frame_rate,
        };
        self.clips.push((id, clip));
        Ok(clip_ref)
    }

    pub fn clip(&self, id: ClipId) -> Option<&PoseClip> {
        self.clips.iter().find(|(cid, _)| *cid == id).map(|(_, c)| c)
    }

    /// Samples of the last completed batch.
    pub fn last_batch(&self) -> &[SampleCall] {
        &self.last_batch
    }

    pub fn batch_count(&self) -> usize {
        self.batches
    }

    pub fn sessions_started(&self) -> usize {
        self.sessions_started
    }

    fn restore_rest(&self, scene: &mut MemoryScene) {
        if let Some(rest) = &self.rest {
            for (node, value) in rest {
                scene.write(*node, *value);
            }
        }
    }
}

impl ClipEvaluator<MemoryScene> for KeyframeEvaluator {
    fn begin_batch(&mut self, scene: &mut MemoryScene) {
        if self.in_batch {
            warn!("begin_batch while a batch is open; previous batch discarded");
        }
        self.in_batch = true;
        self.current_batch.clear();
        self.restore_rest(scene);
    }

    fn sample(&mut self, scene: &mut MemoryScene, root: NodeId, clip: &ClipRef, time: f32) {
        if self.rest.is_none() {
            warn!("sample of '{}' outside a session ignored", clip.name);
            return;
        }
        let Some(data) = self.clips.iter().find(|(id, _)| *id == clip.id).map(|(_, c)| c) else {
            warn!("sample of unknown clip {:?} ignored", clip.id);
            return;
        };
        for track in &data.tracks {
            let Some(node) = scene.find(root, &track.path) else {
                continue;
            };
            if let Some(value) = sample_bone_track(track, time) {
                scene.write(node, value);
            }
        }
        self.current_batch.push(SampleCall {
            root,
            clip: clip.id,
            time,
        });
    }

    fn end_batch(&mut self, _scene: &mut MemoryScene) {
        self.in_batch = false;
        self.batches += 1;
        self.last_batch = std::mem::take(&mut self.current_batch);
    }

    fn is_session_active(&self) -> bool {
        self.rest.is_some()
    }

    fn start_session(&mut self, scene: &mut MemoryScene) {
        if self.rest.is_some() {
            return;
        }
        let rest = scene.all_nodes().map(|n| (n, scene.read(n))).collect();
        self.rest = Some(rest);
        self.sessions_started += 1;
        scene.set_driven(true);
        debug!("evaluator session started");
    }

    fn stop_session(&mut self, scene: &mut MemoryScene) {
        if self.rest.is_none() {
            return;
        }
        self.restore_rest(scene);
        self.rest = None;
        self.in_batch = false;
        self.current_batch.clear();
        scene.set_driven(false);
        debug!("evaluator session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::BoneKey;

    fn desc() -> RigDesc {
        RigDesc::from_json(
            r#"{
                "name": "Box",
                "bones": [
                    { "path": "Base/Lid", "transform": { "position": [0.0, 1.0, 0.0] } }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn add_rig_creates_missing_parents() {
        let mut scene = MemoryScene::new();
        let root = scene.add_rig(&desc());
        let paths: Vec<String> = scene
            .walk(root)
            .into_iter()
            .map(|(p, _)| p.as_str().to_string())
            .collect();
        assert_eq!(paths, vec!["", "Base", "Base/Lid"]);
        assert_eq!(
            scene.transform_at(root, "Base/Lid").unwrap().position,
            [0.0, 1.0, 0.0]
        );
        assert_eq!(scene.transform_at(root, "Base").unwrap(), BoneTransform::IDENTITY);
    }

    #[test]
    fn session_restores_rest() {
        let mut scene = MemoryScene::new();
        let root = scene.add_rig(&desc());
        let mut eval = KeyframeEvaluator::new();
        let clip = eval
            .load_clip(PoseClip::new("open", 1.0, 30.0).with_track(
                "Base/Lid",
                vec![
                    BoneKey {
                        time: 0.0,
                        transform: BoneTransform::from_position([0.0, 1.0, 0.0]),
                    },
                    BoneKey {
                        time: 1.0,
                        transform: BoneTransform::from_position([0.0, 3.0, 0.0]),
                    },
                ],
            ))
            .unwrap();

        eval.start_session(&mut scene);
        assert!(scene.is_driven());
        eval.begin_batch(&mut scene);
        eval.sample(&mut scene, root, &clip, 0.5);
        eval.end_batch(&mut scene);
        assert_eq!(scene.transform_at(root, "Base/Lid").unwrap().position, [0.0, 2.0, 0.0]);
        assert_eq!(eval.last_batch().len(), 1);

        // Not sampled in this batch -> back to rest.
        eval.begin_batch(&mut scene);
        eval.end_batch(&mut scene);
        assert_eq!(scene.transform_at(root, "Base/Lid").unwrap().position, [0.0, 1.0, 0.0]);

        eval.begin_batch(&mut scene);
        eval.sample(&mut scene, root, &clip, 1.0);
        eval.end_batch(&mut scene);
        eval.stop_session(&mut scene);
        assert!(!scene.is_driven());
        assert_eq!(scene.transform_at(root, "Base/Lid").unwrap().position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn dirty_marks_while_driven_are_counted() {
        let mut scene = MemoryScene::new();
        let root = scene.add_root("R");
        scene.mark_dirty(root);
        assert_eq!(scene.dirty_while_driven(), 0);
        scene.set_driven(true);
        scene.mark_dirty(root);
        assert_eq!(scene.dirty_while_driven(), 1);
        assert_eq!(scene.dirty_nodes(), vec![root]);
    }
}

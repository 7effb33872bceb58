//! Left/right mirroring: pair detection from bone naming conventions and
//! axis reflection of rotations/positions.

use hashbrown::HashSet;
use indexmap::IndexMap;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::snapshot::{BoneRecord, PoseSnapshot};
use rigpose_api_core::{BonePath, BoneTransform, Quat, Vec3};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MirrorAxis {
    #[default]
    X,
    Y,
    Z,
}

impl MirrorAxis {
    #[inline]
    fn index(self) -> usize {
        match self {
            MirrorAxis::X => 0,
            MirrorAxis::Y => 1,
            MirrorAxis::Z => 2,
        }
    }
}

/// Reflect a rotation across the plane normal to `axis`: the two imaginary
/// components not matching the axis are kept, the matching one and `w` are
/// negated. X -> (-x, y, z, -w).
pub fn mirror_rotation(q: Quat, axis: MirrorAxis) -> Quat {
    let mut out = [q[0], q[1], q[2], -q[3]];
    out[axis.index()] = -q[axis.index()];
    out
}

/// Negate the coordinate matching `axis`.
pub fn mirror_position(p: Vec3, axis: MirrorAxis) -> Vec3 {
    let mut out = p;
    out[axis.index()] = -p[axis.index()];
    out
}

/// Mirror position and rotation; scale is left as is.
pub fn mirror_transform(t: &BoneTransform, axis: MirrorAxis) -> BoneTransform {
    BoneTransform {
        position: mirror_position(t.position, axis),
        rotation: mirror_rotation(t.rotation, axis),
        scale: t.scale,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Prefix,
    Suffix,
    Contains,
}

/// Naming convention: `left` and `right` tokens matched as `kind`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorPattern {
    pub left: String,
    pub right: String,
    pub kind: MatchKind,
}

impl MirrorPattern {
    pub fn new(left: &str, right: &str, kind: MatchKind) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
            kind,
        }
    }

    /// Rewrite `from -> to` in `leaf`; `None` when the token does not match.
    fn rewrite(&self, leaf: &str, from: &str, to: &str) -> Option<String> {
        if from.is_empty() {
            return None;
        }
        match self.kind {
            MatchKind::Prefix => leaf
                .strip_prefix(from)
                .map(|rest| format!("{to}{rest}")),
            MatchKind::Suffix => leaf
                .strip_suffix(from)
                .map(|rest| format!("{rest}{to}")),
            MatchKind::Contains => {
                if leaf.contains(from) {
                    Some(leaf.replacen(from, to, 1))
                } else {
                    None
                }
            }
        }
    }
}

/// Built-in naming conventions, in precedence order (first match wins).
pub fn default_patterns() -> Vec<MirrorPattern> {
    use MatchKind::*;
    vec![
        MirrorPattern::new("Left", "Right", Contains),
        MirrorPattern::new("left", "right", Contains),
        MirrorPattern::new("LEFT", "RIGHT", Contains),
        MirrorPattern::new("_L", "_R", Suffix),
        MirrorPattern::new(".L", ".R", Suffix),
        MirrorPattern::new("_l", "_r", Suffix),
        MirrorPattern::new(".l", ".r", Suffix),
        MirrorPattern::new(" L", " R", Suffix),
        MirrorPattern::new("L_", "R_", Prefix),
        MirrorPattern::new("l_", "r_", Prefix),
        MirrorPattern::new("_L_", "_R_", Contains),
    ]
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorPair {
    pub source: BonePath,
    pub target: BonePath,
    pub enabled: bool,
}

/// Ordered, user-editable list of mirror pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorPairMap {
    pub pairs: Vec<MirrorPair>,
}

impl MirrorPairMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl Into<BonePath>, target: impl Into<BonePath>) {
        self.pairs.push(MirrorPair {
            source: source.into(),
            target: target.into(),
            enabled: true,
        });
    }

    /// Enabled pairs as `source -> target`, in pair order.
    pub fn build_lookup(&self) -> IndexMap<BonePath, BonePath> {
        self.pairs
            .iter()
            .filter(|p| p.enabled)
            .map(|p| (p.source.clone(), p.target.clone()))
            .collect()
    }

    /// Exchange source and target of one pair. Returns false if out of range.
    pub fn swap(&mut self, index: usize) -> bool {
        match self.pairs.get_mut(index) {
            Some(pair) => {
                std::mem::swap(&mut pair.source, &mut pair.target);
                true
            }
            None => false,
        }
    }

    /// Swap every pair.
    pub fn swap_all(&mut self) {
        for pair in &mut self.pairs {
            std::mem::swap(&mut pair.source, &mut pair.target);
        }
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> bool {
        match self.pairs.get_mut(index) {
            Some(pair) => {
                pair.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Detect left/right pairs among `paths` using `patterns` in order.
///
/// For each unmatched path the leaf name is rewritten left->right, or if that
/// does not apply right->left; the candidate (same directory) must exist and
/// be unmatched. The left-token side becomes the pair's source. Paths without
/// a partner are left out silently.
pub fn detect<'a, I>(paths: I, patterns: &[MirrorPattern]) -> MirrorPairMap
where
    I: IntoIterator<Item = &'a BonePath>,
{
    let all: Vec<&BonePath> = paths.into_iter().collect();
    let known: HashSet<&str> = all.iter().map(|p| p.as_str()).collect();
    let mut matched: HashSet<String> = HashSet::new();
    let mut map = MirrorPairMap::new();

    for path in all {
        if matched.contains(path.as_str()) {
            continue;
        }
        let leaf = path.leaf();
        let directory = path.directory();

        for pattern in patterns {
            let (rewritten, path_is_left) =
                match pattern.rewrite(leaf, &pattern.left, &pattern.right) {
                    Some(r) => (r, true),
                    None => match pattern.rewrite(leaf, &pattern.right, &pattern.left) {
                        Some(r) => (r, false),
                        None => continue,
                    },
                };
            let candidate = format!("{directory}{rewritten}");
            if candidate == path.as_str()
                || !known.contains(candidate.as_str())
                || matched.contains(&candidate)
            {
                continue;
            }

            trace!("mirror pair: {} <-> {}", path, candidate);
            let other = BonePath::from(candidate.clone());
            let (source, target) = if path_is_left {
                (path.clone(), other)
            } else {
                (other, path.clone())
            };
            matched.insert(path.as_str().to_string());
            matched.insert(candidate);
            map.pairs.push(MirrorPair {
                source,
                target,
                enabled: true,
            });
            break;
        }
    }
    map
}

/// Copy of `pose` where each enabled pair's target record is replaced by the
/// mirrored source record. Pairs whose source or target is absent are skipped.
pub fn mirror_snapshot(pose: &PoseSnapshot, map: &MirrorPairMap, axis: MirrorAxis) -> PoseSnapshot {
    let lookup = map.build_lookup();
    let by_target: IndexMap<&BonePath, BoneTransform> = lookup
        .iter()
        .filter_map(|(source, target)| {
            pose.get(source).map(|t| {
                let mut mirrored = mirror_transform(t, axis);
                if let Some(existing) = pose.get(target) {
                    mirrored.scale = existing.scale;
                }
                (target, mirrored)
            })
        })
        .collect();

    let records = pose
        .iter()
        .map(|rec| BoneRecord {
            path: rec.path.clone(),
            transform: by_target.get(&rec.path).copied().unwrap_or(rec.transform),
        })
        .collect();

    PoseSnapshot::from_records(
        format!("{} (mirrored)", pose.name),
        format!("mirror:{}", pose.name),
        pose.rig_kind,
        records,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(list: &[&str]) -> Vec<BonePath> {
        list.iter().map(|s| BonePath::from(*s)).collect()
    }

    #[test]
    fn detects_single_suffix_pair() {
        let ps = paths(&["Arm_L", "Arm_R", "Spine"]);
        let map = detect(ps.iter(), &default_patterns());
        assert_eq!(map.len(), 1);
        assert_eq!(map.pairs[0].source.as_str(), "Arm_L");
        assert_eq!(map.pairs[0].target.as_str(), "Arm_R");
        assert!(map.pairs[0].enabled);
    }

    #[test]
    fn left_side_is_source_even_when_right_seen_first() {
        let ps = paths(&["Hips/Arm_R", "Hips/Arm_L"]);
        let map = detect(ps.iter(), &default_patterns());
        assert_eq!(map.len(), 1);
        assert_eq!(map.pairs[0].source.as_str(), "Hips/Arm_L");
        assert_eq!(map.pairs[0].target.as_str(), "Hips/Arm_R");
    }

    #[test]
    fn prefix_and_contains_patterns() {
        let ps = paths(&["L_Hand", "R_Hand", "LeftFoot", "RightFoot"]);
        let map = detect(ps.iter(), &default_patterns());
        let lookup = map.build_lookup();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup[&BonePath::from("L_Hand")].as_str(), "R_Hand");
        assert_eq!(lookup[&BonePath::from("LeftFoot")].as_str(), "RightFoot");
    }

    #[test]
    fn candidate_must_share_directory() {
        let ps = paths(&["A/Arm_L", "B/Arm_R"]);
        assert!(detect(ps.iter(), &default_patterns()).is_empty());
    }

    #[test]
    fn a_path_is_never_paired_twice() {
        // Both "Arm_L" and "Arm.L" would map onto something; each path pairs once.
        let ps = paths(&["Arm_L", "Arm_R", "Left_Arm_R"]);
        let map = detect(ps.iter(), &default_patterns());
        let mut seen = HashSet::new();
        for pair in &map.pairs {
            assert!(seen.insert(pair.source.clone()));
            assert!(seen.insert(pair.target.clone()));
        }
    }

    #[test]
    fn first_pattern_wins() {
        let patterns = vec![
            MirrorPattern::new("_L", "_R", MatchKind::Suffix),
            MirrorPattern::new("Left", "Right", MatchKind::Contains),
        ];
        // "LeftArm_L" matches the suffix pattern first.
        let ps = paths(&["LeftArm_L", "LeftArm_R", "RightArm_L"]);
        let map = detect(ps.iter(), &patterns);
        assert_eq!(map.pairs[0].source.as_str(), "LeftArm_L");
        assert_eq!(map.pairs[0].target.as_str(), "LeftArm_R");
    }

    #[test]
    fn rotation_mirror_is_an_involution() {
        let q = [0.1, 0.2, 0.3, 0.927_362];
        for axis in [MirrorAxis::X, MirrorAxis::Y, MirrorAxis::Z] {
            assert_eq!(mirror_rotation(mirror_rotation(q, axis), axis), q);
        }
        assert_eq!(mirror_rotation(q, MirrorAxis::X), [-0.1, 0.2, 0.3, -0.927_362]);
        assert_eq!(mirror_rotation(q, MirrorAxis::Y), [0.1, -0.2, 0.3, -0.927_362]);
        assert_eq!(mirror_position([1.0, 2.0, 3.0], MirrorAxis::Z), [1.0, 2.0, -3.0]);
    }

    #[test]
    fn swap_and_disable() {
        let mut map = MirrorPairMap::new();
        map.push("Arm_L", "Arm_R");
        map.push("Leg_L", "Leg_R");
        assert!(map.swap(0));
        assert!(map.set_enabled(1, false));
        assert!(!map.swap(5));
        let lookup = map.build_lookup();
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup[&BonePath::from("Arm_R")].as_str(), "Arm_L");
    }
}

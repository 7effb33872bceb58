//! BoneMask: inclusion predicate over bone paths.
//!
//! `is_included` is a pure function of `(mode, paths, path)`. There is no
//! hierarchy walk during evaluation; "apply to children" is an editing helper
//! ([`BoneMask::set_with_descendants`]) that enumerates descendants by prefix
//! and mutates `paths` up front.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use rigpose_api_core::BonePath;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaskMode {
    #[default]
    AllBones,
    IncludeList,
    ExcludeList,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneMask {
    pub mode: MaskMode,
    #[serde(default)]
    pub paths: IndexSet<BonePath>,
}

impl BoneMask {
    /// Mask that includes every bone.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn include_only<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<BonePath>,
    {
        Self {
            mode: MaskMode::IncludeList,
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn excluding<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<BonePath>,
    {
        Self {
            mode: MaskMode::ExcludeList,
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn is_included(&self, path: &BonePath) -> bool {
        match self.mode {
            MaskMode::AllBones => true,
            MaskMode::IncludeList => self.paths.contains(path),
            MaskMode::ExcludeList => !self.paths.contains(path),
        }
    }

    /// Edit the path set so that `is_included(path) == included` under the
    /// current mode. Returns false when nothing changed (always the case for
    /// `AllBones`, which has no per-path state).
    pub fn set_included(&mut self, path: &BonePath, included: bool) -> bool {
        match (self.mode, included) {
            (MaskMode::AllBones, _) => false,
            (MaskMode::IncludeList, true) | (MaskMode::ExcludeList, false) => {
                self.paths.insert(path.clone())
            }
            (MaskMode::IncludeList, false) | (MaskMode::ExcludeList, true) => {
                self.paths.shift_remove(path)
            }
        }
    }

    /// Apply [`set_included`](Self::set_included) to `path` and every path in
    /// `all_paths` that descends from it. Returns how many entries changed.
    pub fn set_with_descendants<'a, I>(
        &mut self,
        path: &BonePath,
        all_paths: I,
        included: bool,
    ) -> usize
    where
        I: IntoIterator<Item = &'a BonePath>,
    {
        let mut changed = usize::from(self.set_included(path, included));
        for candidate in all_paths {
            if candidate.is_descendant_of(path) && self.set_included(candidate, included) {
                changed += 1;
            }
        }
        changed
    }

    /// Switch mode, keeping the path list.
    pub fn set_mode(&mut self, mode: MaskMode) {
        self.mode = mode;
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> BonePath {
        BonePath::from(s)
    }

    #[test]
    fn modes() {
        let all = BoneMask::all();
        assert!(all.is_included(&p("anything")));

        let inc = BoneMask::include_only(["Hips"]);
        assert!(inc.is_included(&p("Hips")));
        assert!(!inc.is_included(&p("Hips/Spine")));

        let exc = BoneMask::excluding(["Hips"]);
        assert!(!exc.is_included(&p("Hips")));
        assert!(exc.is_included(&p("Hips/Spine")));
    }

    #[test]
    fn no_hierarchy_during_evaluation() {
        // Excluding a parent does not exclude its children.
        let exc = BoneMask::excluding(["Hips/Spine"]);
        assert!(exc.is_included(&p("Hips/Spine/Chest")));
    }

    #[test]
    fn set_with_descendants_uses_prefix_at_separator() {
        let all = [
            p("Hips"),
            p("Hips/Spine"),
            p("Hips/Spine/Chest"),
            p("Hips/SpineTwist"),
        ];
        let mut mask = BoneMask::include_only(Vec::<BonePath>::new());
        let changed = mask.set_with_descendants(&p("Hips/Spine"), all.iter(), true);
        assert_eq!(changed, 2);
        assert!(mask.is_included(&p("Hips/Spine")));
        assert!(mask.is_included(&p("Hips/Spine/Chest")));
        assert!(!mask.is_included(&p("Hips/SpineTwist")));
        assert!(!mask.is_included(&p("Hips")));

        let changed = mask.set_with_descendants(&p("Hips/Spine"), all.iter(), false);
        assert_eq!(changed, 2);
        assert!(mask.is_empty());
    }

    #[test]
    fn editing_other_paths_leaves_a_path_unchanged() {
        let target = p("Hips/Spine/Chest");
        // Neighbours, a parent, a child and a shared prefix.
        let others = [
            p("Hips/Spine"),
            p("Hips/Spine/Chest/Neck"),
            p("Hips/Spine/ChestTwist"),
            p("Chest"),
            p(""),
        ];
        for start in [
            BoneMask::include_only([target.clone()]),
            BoneMask::include_only(Vec::<BonePath>::new()),
            BoneMask::excluding([target.clone()]),
            BoneMask::excluding(Vec::<BonePath>::new()),
        ] {
            let expected = start.is_included(&target);
            let mode = start.mode;
            let mut mask = start;
            for other in &others {
                mask.set_included(other, true);
                assert_eq!(mask.is_included(&target), expected, "{mode:?} adding {other}");
                mask.set_included(other, false);
                assert_eq!(mask.is_included(&target), expected, "{mode:?} removing {other}");
            }
            mask.set_with_descendants(&p("Hips/Spine/Chest/Neck"), others.iter(), true);
            assert_eq!(mask.is_included(&target), expected);
        }
    }

    #[test]
    fn all_bones_ignores_edits() {
        let mut mask = BoneMask::all();
        assert!(!mask.set_included(&p("Hips"), false));
        assert!(mask.is_included(&p("Hips")));
    }
}

//! BonePath: slash-joined ancestor names from a rig root to a node.
//!
//!   ""               -> the rig root itself
//!   "Hips"           -> direct child of the root
//!   "Hips/Spine/Arm_L"
//!
//! Paths are plain string keys; names may contain spaces or dots. Serialized as
//! a bare string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BonePath(String);

impl BonePath {
    pub fn new(path: impl Into<String>) -> Self {
        BonePath(path.into())
    }

    /// The rig root (empty path).
    pub fn root() -> Self {
        BonePath(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of a child named `name` below this one.
    pub fn join(&self, name: &str) -> BonePath {
        if self.0.is_empty() {
            BonePath(name.to_string())
        } else {
            BonePath(format!("{}/{}", self.0, name))
        }
    }

    /// Node name: the substring after the last `/` (the whole path if none).
    pub fn leaf(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Everything up to and including the last `/`, or empty.
    pub fn directory(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..=idx],
            None => "",
        }
    }

    /// Parent path; `None` for the root.
    pub fn parent(&self) -> Option<BonePath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(idx) => BonePath(self.0[..idx].to_string()),
            None => BonePath::root(),
        })
    }

    /// Iterate over name segments (empty for the root).
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Strict descendant test at a `/` boundary. Every non-root path descends from the root.
    pub fn is_descendant_of(&self, ancestor: &BonePath) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(ancestor.as_str())
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }
}

impl fmt::Display for BonePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BonePath {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(BonePath(s.to_string()))
    }
}

impl From<&str> for BonePath {
    fn from(s: &str) -> Self {
        BonePath(s.to_string())
    }
}

impl From<String> for BonePath {
    fn from(s: String) -> Self {
        BonePath(s)
    }
}

impl AsRef<str> for BonePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_and_directory() {
        let p = BonePath::from("Hips/Spine/Arm_L");
        assert_eq!(p.leaf(), "Arm_L");
        assert_eq!(p.directory(), "Hips/Spine/");
        let q = BonePath::from("Arm_L");
        assert_eq!(q.leaf(), "Arm_L");
        assert_eq!(q.directory(), "");
    }

    #[test]
    fn join_from_root() {
        let root = BonePath::root();
        let hips = root.join("Hips");
        assert_eq!(hips.as_str(), "Hips");
        assert_eq!(hips.join("Spine").as_str(), "Hips/Spine");
        assert_eq!(hips.join("Spine").parent(), Some(hips.clone()));
        assert_eq!(hips.parent(), Some(BonePath::root()));
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn descendant_requires_separator_boundary() {
        let arm = BonePath::from("Hips/Arm");
        assert!(BonePath::from("Hips/Arm/Hand").is_descendant_of(&arm));
        assert!(!BonePath::from("Hips/Armor").is_descendant_of(&arm));
        assert!(!arm.is_descendant_of(&arm));
        assert!(arm.is_descendant_of(&BonePath::root()));
        assert!(!BonePath::root().is_descendant_of(&BonePath::root()));
    }

    #[test]
    fn serializes_as_string() {
        let p = BonePath::from("Hips/Spine");
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"Hips/Spine\"");
        let back: BonePath = serde_json::from_str("\"Hips/Spine\"").unwrap();
        assert_eq!(back, p);
    }
}

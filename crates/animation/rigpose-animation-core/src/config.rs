//! Core configuration for rigpose-animation-core.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{PoseError, Result};
use crate::mirror::{default_patterns, MirrorPattern};

/// Thresholds and weighting for [`crate::compose::compute_diff`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Degrees -> position units factor in the diff magnitude. Heuristic, not derived.
    pub rotation_weight: f32,
    /// Bones with a magnitude at or below this are not reported (unless scale changed).
    pub magnitude_epsilon: f32,
    pub scale_epsilon: f32,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            rotation_weight: 0.01,
            magnitude_epsilon: 1e-4,
            scale_epsilon: 1e-4,
        }
    }
}

/// Configuration for pose tools and the preview scheduler.
/// Keep this minimal; expand as needed without breaking API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub diff: DiffConfig,
    /// Mirror naming conventions in precedence order.
    pub mirror_patterns: Vec<MirrorPattern>,
    /// Pose history entries retained per target.
    pub max_history: usize,
    /// Editable defaults for a target seen for the first time.
    pub default_speed: f32,
    pub default_blend_weight: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            diff: DiffConfig::default(),
            mirror_patterns: default_patterns(),
            max_history: 32,
            default_speed: 1.0,
            default_blend_weight: 1.0,
        }
    }
}

impl Config {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json(s: &str) -> Result<Config> {
        let cfg: Config = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg.sanitized())
    }

    /// Reject values that cannot be repaired.
    pub fn validate(&self) -> Result<()> {
        if let Some(p) = self
            .mirror_patterns
            .iter()
            .find(|p| p.left.is_empty() || p.right.is_empty())
        {
            return Err(PoseError::InvalidConfig {
                reason: format!("mirror pattern {:?}/{:?} has an empty token", p.left, p.right),
            });
        }
        Ok(())
    }

    /// Clamp numeric fields into usable ranges.
    pub fn sanitized(mut self) -> Self {
        let d = DiffConfig::default();
        if !(self.diff.rotation_weight.is_finite() && self.diff.rotation_weight >= 0.0) {
            warn!(
                "diff.rotation_weight {} invalid; using {}",
                self.diff.rotation_weight, d.rotation_weight
            );
            self.diff.rotation_weight = d.rotation_weight;
        }
        if !(self.diff.magnitude_epsilon.is_finite() && self.diff.magnitude_epsilon >= 0.0) {
            warn!(
                "diff.magnitude_epsilon {} invalid; using {}",
                self.diff.magnitude_epsilon, d.magnitude_epsilon
            );
            self.diff.magnitude_epsilon = d.magnitude_epsilon;
        }
        if !(self.diff.scale_epsilon.is_finite() && self.diff.scale_epsilon >= 0.0) {
            warn!(
                "diff.scale_epsilon {} invalid; using {}",
                self.diff.scale_epsilon, d.scale_epsilon
            );
            self.diff.scale_epsilon = d.scale_epsilon;
        }
        if !self.default_speed.is_finite() {
            warn!("default_speed {} invalid; using 1.0", self.default_speed);
            self.default_speed = 1.0;
        }
        self.default_blend_weight = if self.default_blend_weight.is_finite() {
            self.default_blend_weight.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = Config::from_json(r#"{ "max_history": 4, "diff": { "rotation_weight": 0.02 } }"#)
            .unwrap();
        assert_eq!(cfg.max_history, 4);
        assert_eq!(cfg.diff.rotation_weight, 0.02);
        assert_eq!(cfg.diff.magnitude_epsilon, 1e-4);
        assert_eq!(cfg.mirror_patterns, default_patterns());
    }

    #[test]
    fn sanitizes_out_of_range_values() {
        let cfg = Config::from_json(
            r#"{ "default_blend_weight": 4.0, "diff": { "scale_epsilon": -1.0 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.default_blend_weight, 1.0);
        assert_eq!(cfg.diff.scale_epsilon, 1e-4);
    }

    #[test]
    fn rejects_empty_mirror_tokens() {
        let err = Config::from_json(
            r#"{ "mirror_patterns": [ { "left": "", "right": "_R", "kind": "Suffix" } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, PoseError::InvalidConfig { .. }));
    }
}

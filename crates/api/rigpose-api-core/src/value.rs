//! BoneTransform: the local TRS value stored per bone.
//! All numeric types use f32.

use serde::{Deserialize, Serialize};

use crate::blend::{lerp_vec3, quat_approx_eq, slerp};

pub type Vec3 = [f32; 3];

/// Quaternion (x, y, z, w)
pub type Quat = [f32; 4];

/// Position/rotation/scale of one node in its parent's local space.
/// Missing fields deserialize to the identity components.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoneTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: BoneTransform = BoneTransform {
        position: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0, 1.0, 1.0],
    };

    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Blend from `a` toward `b` by `weight` (clamped to [0,1]): position and
    /// scale lerp, rotation slerps. The end points are returned exactly.
    pub fn blend(a: &BoneTransform, b: &BoneTransform, weight: f32) -> BoneTransform {
        let w = if weight.is_nan() {
            0.0
        } else {
            weight.clamp(0.0, 1.0)
        };
        if w >= 1.0 {
            return *b;
        }
        if w <= 0.0 {
            return *a;
        }
        BoneTransform {
            position: lerp_vec3(a.position, b.position, w),
            rotation: slerp(a.rotation, b.rotation, w),
            scale: lerp_vec3(a.scale, b.scale, w),
        }
    }

    /// Component-wise comparison; rotations compare up to sign.
    pub fn approx_eq(&self, other: &BoneTransform, eps: f32) -> bool {
        let close = |a: &[f32], b: &[f32]| a.iter().zip(b).all(|(x, y)| (x - y).abs() <= eps);
        close(&self.position, &other.position)
            && close(&self.scale, &other.scale)
            && quat_approx_eq(self.rotation, other.rotation, eps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::quat_from_axis_angle;

    #[test]
    fn blend_endpoints_are_exact() {
        let a = BoneTransform::from_position([1.0, 2.0, 3.0]);
        let b = BoneTransform::new(
            [4.0, 5.0, 6.0],
            quat_from_axis_angle([0.0, 0.0, 1.0], 30.0),
            [2.0, 2.0, 2.0],
        );
        assert_eq!(BoneTransform::blend(&a, &b, 1.0), b);
        assert_eq!(BoneTransform::blend(&a, &b, 0.0), a);
        assert_eq!(BoneTransform::blend(&a, &b, 3.0), b);
        assert_eq!(BoneTransform::blend(&a, &b, -1.0), a);
    }

    #[test]
    fn blend_midpoint() {
        let a = BoneTransform::IDENTITY;
        let b = BoneTransform::new(
            [2.0, 0.0, 0.0],
            quat_from_axis_angle([0.0, 1.0, 0.0], 90.0),
            [3.0, 3.0, 3.0],
        );
        let mid = BoneTransform::blend(&a, &b, 0.5);
        let expected = BoneTransform::new(
            [1.0, 0.0, 0.0],
            quat_from_axis_angle([0.0, 1.0, 0.0], 45.0),
            [2.0, 2.0, 2.0],
        );
        assert!(mid.approx_eq(&expected, 1e-5));
    }

    #[test]
    fn serde_shape() {
        let t = BoneTransform::IDENTITY;
        let json = serde_json::to_value(t).unwrap();
        assert_eq!(json["rotation"], serde_json::json!([0.0, 0.0, 0.0, 1.0]));
        let back: BoneTransform = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }
}

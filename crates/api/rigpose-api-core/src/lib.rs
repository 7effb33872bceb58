//! rigpose-api-core: bone transforms, bone paths and the math shared by the
//! capture/compose/playback crates (engine-agnostic).

pub mod blend;
pub mod bone_path;
pub mod value;

pub use blend::{
    lerp_vec3, normalize_angle_degrees, quat_approx_eq, quat_from_axis_angle,
    quat_from_euler_degrees, quat_inverse, quat_mul, quat_normalize, quat_to_euler_degrees,
    slerp, vec3_length, vec3_sub,
};
pub use bone_path::BonePath;
pub use value::{BoneTransform, Quat, Vec3};

//! Blending and rotation math for transform values.
//! - f32/vec3 linear interpolation
//! - quaternion slerp (shortest-arc), multiply, inverse
//! - Euler decomposition in the Z-then-X-then-Y convention (R = Ry * Rx * Rz)
//! - angle normalization into (-180, 180]
//!
//! Quaternions are `[x, y, z, w]`.

use crate::value::{Quat, Vec3};

/// Linear interpolation for f32
#[inline]
fn lerp_f(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    [lerp_f(a[0], b[0], t), lerp_f(a[1], b[1], t), lerp_f(a[2], b[2], t)]
}

#[inline]
pub fn vec3_sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vec3_length(v: Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[inline]
fn dot4(a: Quat, b: Quat) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Normalize a quaternion; a zero quaternion becomes identity.
pub fn quat_normalize(q: Quat) -> Quat {
    let mag = dot4(q, q).sqrt();
    if mag == 0.0 {
        [0.0, 0.0, 0.0, 1.0]
    } else {
        [q[0] / mag, q[1] / mag, q[2] / mag, q[3] / mag]
    }
}

/// Slerp between two unit quaternions along the shortest arc.
pub fn slerp(q1: Quat, q2: Quat, t: f32) -> Quat {
    let qa = quat_normalize(q1);
    let mut qb = quat_normalize(q2);

    let mut dot = dot4(qa, qb);
    if dot < 0.0 {
        qb = [-qb[0], -qb[1], -qb[2], -qb[3]];
        dot = -dot;
    }

    // Nearly parallel: lerp and renormalize.
    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        return quat_normalize([
            lerp_f(qa[0], qb[0], t),
            lerp_f(qa[1], qb[1], t),
            lerp_f(qa[2], qb[2], t),
            lerp_f(qa[3], qb[3], t),
        ]);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();

    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;

    quat_normalize([
        s0 * qa[0] + s1 * qb[0],
        s0 * qa[1] + s1 * qb[1],
        s0 * qa[2] + s1 * qb[2],
        s0 * qa[3] + s1 * qb[3],
    ])
}

/// Hamilton product `a * b` (applies `b` first, then `a`).
pub fn quat_mul(a: Quat, b: Quat) -> Quat {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

pub fn quat_inverse(q: Quat) -> Quat {
    let len2 = dot4(q, q);
    if len2 == 0.0 {
        return [0.0, 0.0, 0.0, 1.0];
    }
    [-q[0] / len2, -q[1] / len2, -q[2] / len2, q[3] / len2]
}

/// Rotation of `degrees` about `axis` (normalized internally).
pub fn quat_from_axis_angle(axis: Vec3, degrees: f32) -> Quat {
    let len = vec3_length(axis);
    if len == 0.0 {
        return [0.0, 0.0, 0.0, 1.0];
    }
    let half = degrees.to_radians() * 0.5;
    let s = half.sin() / len;
    [axis[0] * s, axis[1] * s, axis[2] * s, half.cos()]
}

/// Build a rotation from Euler angles in degrees, applied Z first, then X, then Y.
pub fn quat_from_euler_degrees(euler: Vec3) -> Quat {
    let qx = quat_from_axis_angle([1.0, 0.0, 0.0], euler[0]);
    let qy = quat_from_axis_angle([0.0, 1.0, 0.0], euler[1]);
    let qz = quat_from_axis_angle([0.0, 0.0, 1.0], euler[2]);
    quat_mul(qy, quat_mul(qx, qz))
}

/// Decompose a rotation into Euler angles in degrees (inverse of
/// [`quat_from_euler_degrees`]). Each component lies in `[0, 360)`.
pub fn quat_to_euler_degrees(q: Quat) -> Vec3 {
    let [x, y, z, w] = quat_normalize(q);
    let sin_x = (2.0 * (w * x - y * z)).clamp(-1.0, 1.0);
    let ex = sin_x.asin();
    let (ey, ez) = if sin_x.abs() < 0.9999 {
        (
            (2.0 * (x * z + w * y)).atan2(1.0 - 2.0 * (x * x + y * y)),
            (2.0 * (x * y + w * z)).atan2(1.0 - 2.0 * (x * x + z * z)),
        )
    } else {
        // Gimbal lock: fold the remaining freedom into Y.
        ((-2.0 * (x * z - w * y)).atan2(1.0 - 2.0 * (y * y + z * z)), 0.0)
    };
    [
        ex.to_degrees().rem_euclid(360.0),
        ey.to_degrees().rem_euclid(360.0),
        ez.to_degrees().rem_euclid(360.0),
    ]
}

/// Wrap an angle in degrees into `(-180, 180]`.
pub fn normalize_angle_degrees(angle: f32) -> f32 {
    let a = angle.rem_euclid(360.0);
    if a > 180.0 {
        a - 360.0
    } else {
        a
    }
}

/// Compare rotations, treating `q` and `-q` as equal.
pub fn quat_approx_eq(a: Quat, b: Quat, eps: f32) -> bool {
    let d = dot4(quat_normalize(a), quat_normalize(b)).abs();
    d >= 1.0 - eps
}

//! Keyframed bone clips for the in-memory evaluator.
//!
//! Model:
//! - A clip owns one track per animated bone path.
//! - Each track has keys ordered by time in seconds, in `[0, duration]`.
//! - Between keys, position/scale lerp and rotation slerps (shortest arc).
//! - Before the first key and after the last key the end value holds.

use serde::{Deserialize, Serialize};

use crate::error::{PoseError, Result};
use rigpose_api_core::{BonePath, BoneTransform};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneKey {
    pub time: f32,
    pub transform: BoneTransform,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneTrack {
    pub path: BonePath,
    #[serde(default)]
    pub keys: Vec<BoneKey>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseClip {
    pub name: String,
    /// Seconds.
    pub duration: f32,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    #[serde(default)]
    pub tracks: Vec<BoneTrack>,
}

fn default_frame_rate() -> f32 {
    30.0
}

impl PoseClip {
    pub fn new(name: impl Into<String>, duration: f32, frame_rate: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            frame_rate,
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, path: impl Into<BonePath>, keys: Vec<BoneKey>) -> Self {
        self.tracks.push(BoneTrack {
            path: path.into(),
            keys,
        });
        self
    }

    /// Basic structural checks: positive finite duration and frame rate, key
    /// times sorted and inside the clip.
    pub fn validate(&self) -> Result<()> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(PoseError::invalid_clip(
                &self.name,
                format!("duration must be positive, got {}", self.duration),
            ));
        }
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(PoseError::invalid_clip(
                &self.name,
                format!("frame_rate must be positive, got {}", self.frame_rate),
            ));
        }
        for track in &self.tracks {
            let mut prev = f32::NEG_INFINITY;
            for key in &track.keys {
                if !key.time.is_finite() || key.time < 0.0 || key.time > self.duration {
                    return Err(PoseError::invalid_clip(
                        &self.name,
                        format!("track '{}' key at {} is outside the clip", track.path, key.time),
                    ));
                }
                if key.time < prev {
                    return Err(PoseError::invalid_clip(
                        &self.name,
                        format!("track '{}' keys are not sorted by time", track.path),
                    ));
                }
                prev = key.time;
            }
        }
        Ok(())
    }
}

/// Sample a track at `time` seconds. `None` for a track without keys.
pub fn sample_bone_track(track: &BoneTrack, time: f32) -> Option<BoneTransform> {
    let keys = &track.keys;
    let first = keys.first()?;
    let last = keys.last()?;
    if keys.len() == 1 || time <= first.time {
        return Some(first.transform);
    }
    if time >= last.time {
        return Some(last.transform);
    }
    // Linear scan; tracks are short.
    for pair in keys.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if time >= a.time && time <= b.time {
            let denom = (b.time - a.time).max(f32::EPSILON);
            let t = ((time - a.time) / denom).clamp(0.0, 1.0);
            return Some(BoneTransform::blend(&a.transform, &b.transform, t));
        }
    }
    Some(last.transform)
}

/// Parse and validate a clip JSON document.
pub fn parse_pose_clip_json(s: &str) -> Result<PoseClip> {
    let clip: PoseClip = serde_json::from_str(s)?;
    clip.validate()?;
    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigpose_api_core::{quat_from_axis_angle, quat_to_euler_degrees};

    fn approx(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    fn key(time: f32, x: f32) -> BoneKey {
        BoneKey {
            time,
            transform: BoneTransform::from_position([x, 0.0, 0.0]),
        }
    }

    #[test]
    fn holds_ends_and_interpolates_inside() {
        let track = BoneTrack {
            path: "Arm".into(),
            keys: vec![key(0.5, 0.0), key(1.5, 2.0)],
        };
        assert_eq!(sample_bone_track(&track, 0.0).unwrap().position[0], 0.0);
        assert!(approx(sample_bone_track(&track, 1.0).unwrap().position[0], 1.0, 1e-6));
        assert_eq!(sample_bone_track(&track, 9.0).unwrap().position[0], 2.0);
        assert!(sample_bone_track(&BoneTrack::default(), 0.0).is_none());
    }

    #[test]
    fn rotation_slerps() {
        let track = BoneTrack {
            path: "Arm".into(),
            keys: vec![
                BoneKey {
                    time: 0.0,
                    transform: BoneTransform::IDENTITY,
                },
                BoneKey {
                    time: 1.0,
                    transform: BoneTransform::from_rotation(quat_from_axis_angle(
                        [0.0, 0.0, 1.0],
                        90.0,
                    )),
                },
            ],
        };
        let mid = sample_bone_track(&track, 0.5).unwrap();
        let e = quat_to_euler_degrees(mid.rotation);
        assert!(approx(e[2], 45.0, 1e-3), "{e:?}");
    }

    #[test]
    fn validation_rejects_bad_clips() {
        assert!(PoseClip::new("zero", 0.0, 30.0).validate().is_err());
        let unsorted =
            PoseClip::new("u", 2.0, 30.0).with_track("Arm", vec![key(1.0, 0.0), key(0.5, 1.0)]);
        assert!(unsorted.validate().is_err());
        let outside = PoseClip::new("o", 1.0, 30.0).with_track("Arm", vec![key(2.0, 0.0)]);
        assert!(matches!(outside.validate(), Err(PoseError::InvalidClip { .. })));
    }

    #[test]
    fn parses_with_default_frame_rate() {
        let clip = parse_pose_clip_json(
            r#"{ "name": "c", "duration": 1.0, "tracks": [ { "path": "Arm", "keys": [] } ] }"#,
        )
        .unwrap();
        assert_eq!(clip.frame_rate, 30.0);
        assert_eq!(clip.tracks.len(), 1);
    }
}

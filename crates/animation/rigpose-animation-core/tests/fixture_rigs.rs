use rigpose_animation_core::{
    default_patterns, detect, mirror_snapshot, parse_pose_clip_json, parse_pose_json, BoneMask,
    BonePath, ClipEvaluator, Config, KeyframeEvaluator, MatchKind, MemoryScene, MirrorAxis,
    MirrorPattern, NodeId, PoseSnapshot, PreviewScheduler, RigDesc, RigKind, SceneGraph,
};
use rigpose_api_core::{quat_from_axis_angle, quat_to_euler_degrees, BoneTransform};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn biped() -> (MemoryScene, NodeId) {
    let json = rigpose_test_fixtures::rigs::json("biped").expect("biped fixture");
    let desc = RigDesc::from_json(&json).expect("parse biped");
    let mut scene = MemoryScene::new();
    let root = scene.add_rig(&desc);
    (scene, root)
}

const ARM_R: &str = "Hips/Spine/Chest/Shoulder_R/Arm_R";

#[test]
fn biped_fixture_builds_a_humanoid_rig() {
    let (scene, root) = biped();
    let snap = PoseSnapshot::capture(&scene, root, "rest", "live", &BoneMask::all());
    // Root plus fifteen bones.
    assert_eq!(snap.len(), 16);
    assert_eq!(snap.rig_kind, RigKind::Humanoid);
    assert_eq!(snap.paths().next().map(BonePath::as_str), Some(""));
    assert_eq!(snap.get(&BonePath::from("Hips")).unwrap().position, [0.0, 1.0, 0.0]);
}

/// it should pair only siblings, since candidates keep the directory prefix
#[test]
fn detection_on_biped_pairs_siblings() {
    let (scene, root) = biped();
    let snap = PoseSnapshot::capture(&scene, root, "rest", "live", &BoneMask::all());
    let map = detect(snap.paths(), &default_patterns());
    let pairs: Vec<(&str, &str)> = map
        .pairs
        .iter()
        .map(|p| (p.source.as_str(), p.target.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("Hips/Spine/Chest/Shoulder_L", "Hips/Spine/Chest/Shoulder_R"),
            ("Hips/UpperLeg_L", "Hips/UpperLeg_R"),
        ]
    );
}

#[test]
fn clip_frame_capture_samples_then_restores() {
    let (mut scene, root) = biped();
    let mut eval = KeyframeEvaluator::new();
    let clip_json = rigpose_test_fixtures::clips::json("wave").expect("wave fixture");
    let clip = eval
        .load_clip(parse_pose_clip_json(&clip_json).expect("parse wave"))
        .expect("valid wave");
    assert_eq!(clip.frame_count(), 60);

    let mask = BoneMask::include_only([ARM_R]);
    let frame = PoseSnapshot::capture_clip_frame(&mut scene, &mut eval, root, &clip, 1.0, &mask);
    assert_eq!(frame.len(), 1);
    let arm = frame.get(&BonePath::from(ARM_R)).unwrap();
    approx(quat_to_euler_degrees(arm.rotation)[2], 90.0, 1e-3);

    // The session it opened is closed again and the rig is back at rest.
    assert!(!eval.is_session_active());
    assert_eq!(scene.transform_at(root, ARM_R).unwrap().rotation, [0.0, 0.0, 0.0, 1.0]);

    // Times past the end clamp to the last key.
    let late = PoseSnapshot::capture_clip_frame(&mut scene, &mut eval, root, &clip, 30.0, &mask);
    let late_arm = late.get(&BonePath::from(ARM_R)).unwrap();
    approx(quat_to_euler_degrees(late_arm.rotation)[2], 0.0, 1e-3);
}

#[test]
fn clip_frame_capture_reuses_an_open_session() {
    let (mut scene, root) = biped();
    let mut eval = KeyframeEvaluator::new();
    let clip = eval
        .load_clip(rigpose_test_fixtures::clips::load("idle").expect("idle fixture"))
        .expect("valid idle");
    eval.start_session(&mut scene);
    let all = BoneMask::all();
    let frame = PoseSnapshot::capture_clip_frame(&mut scene, &mut eval, root, &clip, 0.5, &all);
    assert!(eval.is_session_active());
    assert_eq!(eval.sessions_started(), 1);
    approx(frame.get(&BonePath::from("Hips")).unwrap().position[1], 0.98, 1e-6);
    eval.stop_session(&mut scene);
    approx(scene.transform_at(root, "Hips").unwrap().position[1], 1.0, 1e-6);
}

#[test]
fn mirrored_snapshot_round_trips_through_json() {
    let (mut scene, root) = biped();
    let left = scene
        .find(root, &BonePath::from("Hips/Spine/Chest/Shoulder_L"))
        .unwrap();
    let shrug = BoneTransform {
        position: [0.08, 0.2, 0.0],
        ..BoneTransform::from_rotation(quat_from_axis_angle([0.0, 0.0, 1.0], 30.0))
    };
    scene.write(left, shrug);
    let snap = PoseSnapshot::capture(&scene, root, "shrug", "live", &BoneMask::all());
    let map = detect(snap.paths(), &default_patterns());
    let mirrored = mirror_snapshot(&snap, &map, MirrorAxis::X);

    let right = mirrored
        .get(&BonePath::from("Hips/Spine/Chest/Shoulder_R"))
        .unwrap();
    assert_eq!(right.position, [-0.08, 0.2, 0.0]);
    approx(quat_to_euler_degrees(right.rotation)[2], -30.0, 1e-3);
    assert_eq!(mirrored.len(), snap.len());

    let back = parse_pose_json(&mirrored.to_json().unwrap()).unwrap();
    assert_eq!(back, mirrored);
}

#[test]
fn scheduler_detection_follows_configured_patterns() {
    let (mut scene, root) = biped();
    let mut eval = KeyframeEvaluator::new();
    let cfg = Config {
        mirror_patterns: vec![MirrorPattern::new("Leg_L", "Leg_R", MatchKind::Suffix)],
        ..Config::default()
    };
    let mut sched = PreviewScheduler::new(cfg);
    assert!(sched.detect_mirror_pairs(&scene).is_empty());

    sched.set_target(Some(root), &mut scene, &mut eval);
    let map = sched.detect_mirror_pairs(&scene);
    let sources: Vec<&str> = map.pairs.iter().map(|p| p.source.as_str()).collect();
    assert_eq!(sources, vec!["Hips/UpperLeg_L"]);
}

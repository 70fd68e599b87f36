//! VRM Animation Tests
//!
//! Tests for:
//! - `.vrma` parsing and conversion to the normalized rig
//! - Retargeting onto VRM 1.0 and 0.x avatars
//! - Playing a retargeted clip through the mixer

mod common;

use std::sync::Arc;

use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use anima::animation::{AnimationAction, AnimationMixer, Binder, InterpolationMode, KeyframeTrack, TargetPath, TrackData};
use anima::vrm::{ExpressionPreset, HumanBoneName, Vrm, VrmLoader};
use anima::vrm_animation::{
    ExpressionTracks, HumanoidTracks, LOOK_AT_TRACK_NAME, VrmAnimation, VrmAnimationLoader, create_vrm_animation_clip,
};
use anima::AnimaError;

use common::{ANIMATION_NAME, GltfBuilder, rotation_y, vrm0_builder, vrm1_builder, vrma_builder};

const EPSILON: f32 = 1e-4;
const IDENTITY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

fn quat_approx(a: Quat, b: Quat) -> bool {
    a.dot(b).abs() > 1.0 - 1e-6
}

fn load_animation(hips_height: f32, hips_rest: [f32; 4]) -> VrmAnimation {
    let (builder, _) = vrma_builder(hips_height, hips_rest);
    let mut animations = VrmAnimationLoader::load_slice(&builder.to_glb_bytes(), None).unwrap();
    assert_eq!(animations.len(), 1);
    animations.remove(0)
}

fn load_vrm1() -> Vrm {
    let (builder, _) = vrm1_builder();
    VrmLoader::load_slice(&builder.to_glb_bytes(), None).unwrap()
}

fn load_vrm0() -> Vrm {
    let (builder, _) = vrm0_builder();
    VrmLoader::load_slice(&builder.to_glb_bytes(), None).unwrap()
}

fn linear<T: anima::animation::Interpolatable>(values: Vec<T>) -> KeyframeTrack<T> {
    let times = (0..values.len()).map(|i| i as f32).collect();
    KeyframeTrack::new(times, values, InterpolationMode::Linear)
}

/// Hand-built animation with a single spine rotation.
fn spine_animation(rotation: Quat) -> VrmAnimation {
    let mut rotations = FxHashMap::default();
    rotations.insert(HumanBoneName::Spine, linear(vec![Quat::IDENTITY, rotation]));
    VrmAnimation {
        name: "spine".to_string(),
        duration: 1.0,
        rest_hips_position: Vec3::new(0.0, 1.0, 0.0),
        humanoid_tracks: HumanoidTracks {
            translation: FxHashMap::default(),
            rotation: rotations,
        },
        expression_tracks: ExpressionTracks::default(),
        look_at_track: None,
    }
}

fn track_names(clip: &anima::AnimationClip) -> Vec<(&str, TargetPath)> {
    clip.tracks
        .iter()
        .map(|t| (t.meta.node_name.as_str(), t.meta.target))
        .collect()
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn vrma_loads_named_animation() {
    let animation = load_animation(0.9, IDENTITY);

    assert_eq!(animation.name, ANIMATION_NAME);
    assert!(approx(animation.duration, 1.0));
    assert!(vec3_approx(animation.rest_hips_position, Vec3::new(0.0, 0.9, 0.0)));
}

#[test]
fn vrma_sorts_tracks_by_role() {
    let animation = load_animation(0.9, IDENTITY);

    let humanoid = &animation.humanoid_tracks;
    assert_eq!(humanoid.rotation.len(), 2);
    assert!(humanoid.rotation.contains_key(&HumanBoneName::Hips));
    assert!(humanoid.rotation.contains_key(&HumanBoneName::Spine));
    // Only the hips translate; scale tracks are dropped.
    assert_eq!(humanoid.translation.len(), 1);

    let expressions = &animation.expression_tracks;
    assert!(expressions.preset.contains_key(&ExpressionPreset::Happy));
    assert!(expressions.custom.contains_key("custom_missing"));

    assert!(animation.look_at_track.is_some());
}

#[test]
fn vrma_expression_value_is_translation_x() {
    let animation = load_animation(0.9, IDENTITY);
    let happy = &animation.expression_tracks.preset[&ExpressionPreset::Happy];

    assert_eq!(happy.values, vec![0.0, 1.0]);
    assert!(approx(happy.sample(0.25).unwrap(), 0.25));
}

#[test]
fn vrma_identity_rest_keeps_rotations() {
    let animation = load_animation(0.9, IDENTITY);
    let spine = &animation.humanoid_tracks.rotation[&HumanBoneName::Spine];

    assert!(quat_approx(spine.values[0], Quat::IDENTITY));
    assert!(quat_approx(spine.values[1], Quat::from_rotation_y(0.5)));

    let hips = &animation.humanoid_tracks.translation[&HumanBoneName::Hips];
    assert!(vec3_approx(hips.values[1], Vec3::new(0.2, 0.9, 0.0)));
}

#[test]
fn vrma_rotated_rest_pose_is_factored_out() {
    let rest = rotation_y(std::f32::consts::FRAC_PI_2);
    let animation = load_animation(0.9, rest);

    // The hips hold their rest rotation the whole time: no motion.
    let hips = &animation.humanoid_tracks.rotation[&HumanBoneName::Hips];
    for &q in &hips.values {
        assert!(quat_approx(q, Quat::IDENTITY));
    }

    // The spine swing is re-expressed in the normalized frame.
    let spine = &animation.humanoid_tracks.rotation[&HumanBoneName::Spine];
    assert!(quat_approx(spine.values[0], Quat::IDENTITY));
    assert!(quat_approx(spine.values[1], Quat::from_rotation_y(0.5)));
}

#[test]
fn vrma_hips_translation_in_world_space() {
    let (mut builder, layout) = vrma_builder(0.5, IDENTITY);
    builder.scale(layout.get("root"), [2.0, 2.0, 2.0]);
    let animation = VrmAnimationLoader::load_slice(&builder.to_json_bytes(), None)
        .unwrap()
        .remove(0);

    assert!(vec3_approx(animation.rest_hips_position, Vec3::new(0.0, 1.0, 0.0)));
    let hips = &animation.humanoid_tracks.translation[&HumanBoneName::Hips];
    assert!(vec3_approx(hips.values[0], Vec3::new(0.0, 1.0, 0.0)));
    assert!(vec3_approx(hips.values[1], Vec3::new(0.4, 1.0, 0.0)));
}

#[test]
fn vrma_requires_extension() {
    let mut builder = GltfBuilder::new();
    builder.node("hips", None, [0.0; 3]);

    let result = VrmAnimationLoader::load_slice(&builder.to_json_bytes(), None);
    assert!(matches!(result, Err(AnimaError::MissingExtension(_))));
}

// ============================================================================
// Retargeting
// ============================================================================

#[test]
fn retarget_targets_normalized_nodes() {
    let vrm = load_vrm1();
    let animation = load_animation(1.0, IDENTITY);

    let clip = create_vrm_animation_clip(&animation, &vrm);

    assert_eq!(clip.name, ANIMATION_NAME);
    assert!(approx(clip.duration, 1.0));
    let names = track_names(&clip);
    assert!(names.contains(&("Normalized_hips", TargetPath::Rotation)));
    assert!(names.contains(&("Normalized_hips", TargetPath::Translation)));
    assert!(names.contains(&("Normalized_spine", TargetPath::Rotation)));
    assert!(names.contains(&("happy", TargetPath::Expression)));
    assert!(names.contains(&(LOOK_AT_TRACK_NAME, TargetPath::LookAt)));
    // The avatar has no such expression.
    assert!(!names.iter().any(|(name, _)| *name == "custom_missing"));
    assert_eq!(names.len(), 5);
}

#[test]
fn retarget_scales_hips_to_avatar() {
    let vrm = load_vrm1();
    // Avatar hips sit at 0.8, the animation's at 1.0.
    let animation = load_animation(1.0, IDENTITY);

    let clip = create_vrm_animation_clip(&animation, &vrm);

    let track = clip.find_track("Normalized_hips", TargetPath::Translation).unwrap();
    let TrackData::Vector3(track) = &track.data else {
        panic!("hips translation should be a Vector3 track");
    };
    assert!(vec3_approx(track.values[0], Vec3::new(0.0, 0.8, 0.0)));
    assert!(vec3_approx(track.values[1], Vec3::new(0.16, 0.8, 0.0)));
}

#[test]
fn retarget_zero_rest_height_does_not_scale() {
    let vrm = load_vrm1();
    let mut animation = load_animation(1.0, IDENTITY);
    animation.rest_hips_position = Vec3::ZERO;

    let clip = create_vrm_animation_clip(&animation, &vrm);

    let track = clip.find_track("Normalized_hips", TargetPath::Translation).unwrap();
    let TrackData::Vector3(track) = &track.data else {
        panic!("hips translation should be a Vector3 track");
    };
    assert!(vec3_approx(track.values[1], Vec3::new(0.2, 1.0, 0.0)));
}

#[test]
fn retarget_mirrors_for_vrm0() {
    let vrm = load_vrm0();
    let animation = spine_animation(Quat::from_rotation_x(0.3));

    let clip = create_vrm_animation_clip(&animation, &vrm);

    let track = clip.find_track("Normalized_spine", TargetPath::Rotation).unwrap();
    let TrackData::Quaternion(track) = &track.data else {
        panic!("spine rotation should be a Quaternion track");
    };
    assert!(quat_approx(track.values[1], Quat::from_rotation_x(-0.3)));
}

#[test]
fn retarget_mirrors_hips_translation_for_vrm0() {
    let vrm = load_vrm0();
    let animation = load_animation(1.0, IDENTITY);

    let clip = create_vrm_animation_clip(&animation, &vrm);

    let track = clip.find_track("Normalized_hips", TargetPath::Translation).unwrap();
    let TrackData::Vector3(track) = &track.data else {
        panic!("hips translation should be a Vector3 track");
    };
    assert!(vec3_approx(track.values[1], Vec3::new(-0.16, 0.8, 0.0)));
}

#[test]
fn retarget_keeps_vrm1_rotations() {
    let vrm = load_vrm1();
    let animation = spine_animation(Quat::from_rotation_x(0.3));

    let clip = create_vrm_animation_clip(&animation, &vrm);

    let track = clip.find_track("Normalized_spine", TargetPath::Rotation).unwrap();
    let TrackData::Quaternion(track) = &track.data else {
        panic!("spine rotation should be a Quaternion track");
    };
    assert!(quat_approx(track.values[1], Quat::from_rotation_x(0.3)));
}

#[test]
fn retarget_drops_look_at_without_look_at() {
    let mut vrm = load_vrm1();
    vrm.look_at = None;
    let animation = load_animation(1.0, IDENTITY);

    let clip = create_vrm_animation_clip(&animation, &vrm);

    assert!(clip.find_track(LOOK_AT_TRACK_NAME, TargetPath::LookAt).is_none());
}

#[test]
fn retarget_duration_covers_declared_length() {
    let vrm = load_vrm1();
    let mut animation = spine_animation(Quat::from_rotation_x(0.3));
    animation.duration = 3.0;

    let clip = create_vrm_animation_clip(&animation, &vrm);
    assert!(approx(clip.duration, 3.0));
}

// ============================================================================
// Playback
// ============================================================================

#[test]
fn retargeted_clip_drives_avatar() {
    let mut vrm = load_vrm1();
    let animation = load_animation(1.0, IDENTITY);
    let clip = Arc::new(create_vrm_animation_clip(&animation, &vrm));

    let mut action = AnimationAction::new(clip.clone());
    action.bindings = Binder::bind(&vrm.scene, vrm.root, &clip);
    assert_eq!(action.bindings.len(), clip.tracks.len());
    action.play();
    action.set_time(1.0);

    let mut mixer = AnimationMixer::new();
    mixer.add_action(action);
    mixer.apply(&mut vrm);
    vrm.update(0.0);

    let spine = vrm.humanoid.raw_bone_node(HumanBoneName::Spine).unwrap();
    assert!(quat_approx(vrm.scene.world_rotation(spine), Quat::from_rotation_y(0.5)));

    let hips = vrm.humanoid.raw_bone_node(HumanBoneName::Hips).unwrap();
    assert!(vec3_approx(vrm.scene.world_position(hips), Vec3::new(0.16, 0.8, 0.0)));

    assert!(approx(vrm.expression_manager.get_value("happy").unwrap(), 1.0));
    let face = vrm.scene.find_node_by_name(vrm.root, "Face").unwrap();
    assert!(approx(vrm.scene.get_node(face).unwrap().morph_weights[0], 1.0));

    let look_at = vrm.look_at.as_ref().unwrap();
    assert!(approx(look_at.yaw(), 0.3_f32.to_degrees()));
}

#[test]
fn retargeted_clip_half_way() {
    let mut vrm = load_vrm1();
    let animation = load_animation(1.0, IDENTITY);
    let clip = Arc::new(create_vrm_animation_clip(&animation, &vrm));

    let mut action = AnimationAction::new(clip.clone());
    action.bindings = Binder::bind(&vrm.scene, vrm.root, &clip);
    action.play();

    let mut mixer = AnimationMixer::new();
    mixer.add_action(action);
    mixer.update(0.5, &mut vrm);

    assert!(approx(vrm.expression_manager.get_value("happy").unwrap(), 0.5));
    let spine = vrm.humanoid.normalized_bone_node(HumanBoneName::Spine).unwrap();
    let rotation = vrm.scene.get_node(spine).unwrap().transform.rotation;
    assert!(quat_approx(rotation, Quat::from_rotation_y(0.25)));
}

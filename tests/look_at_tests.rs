//! Look-At Tests
//!
//! Tests for:
//! - LookAtRangeMap clamping
//! - Target to yaw/pitch conversion and sign conventions
//! - Look rotation round trip
//! - Bone and expression application

use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use anima::scene::{Node, NodeHandle, Scene};
use anima::vrm::{Expression, ExpressionManager, HumanBoneName, Humanoid, LookAt, LookAtRangeMap, LookAtType};

const EPSILON: f32 = 1e-3;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn quat_approx(a: Quat, b: Quat) -> bool {
    a.dot(b).abs() > 1.0 - 1e-6
}

struct Avatar {
    scene: Scene,
    root: NodeHandle,
    head: NodeHandle,
    left_eye: NodeHandle,
    humanoid: Humanoid,
    expressions: ExpressionManager,
}

fn child(scene: &mut Scene, parent: NodeHandle, name: &str, position: Vec3) -> NodeHandle {
    let mut node = Node::with_name(name);
    node.transform.position = position;
    scene.add_to_parent(node, parent)
}

fn create_avatar() -> Avatar {
    let mut scene = Scene::new();
    let root = scene.add_node(Node::with_name("root"));
    let hips = child(&mut scene, root, "hips", Vec3::new(0.0, 1.0, 0.0));
    let spine = child(&mut scene, hips, "spine", Vec3::new(0.0, 0.2, 0.0));
    let head = child(&mut scene, spine, "head", Vec3::new(0.0, 0.3, 0.0));
    let left_eye = child(&mut scene, head, "eye_L", Vec3::new(0.03, 0.05, 0.05));
    let right_eye = child(&mut scene, head, "eye_R", Vec3::new(-0.03, 0.05, 0.05));
    scene.update_matrix_world();

    let mut bones = FxHashMap::default();
    bones.insert(HumanBoneName::Hips, hips);
    bones.insert(HumanBoneName::Spine, spine);
    bones.insert(HumanBoneName::Head, head);
    bones.insert(HumanBoneName::LeftEye, left_eye);
    bones.insert(HumanBoneName::RightEye, right_eye);
    let humanoid = Humanoid::new(&mut scene, root, &bones);

    let mut expressions = ExpressionManager::new();
    for name in ["lookUp", "lookDown", "lookLeft", "lookRight"] {
        expressions.register(Expression::new(name));
    }

    Avatar {
        scene,
        root,
        head,
        left_eye,
        humanoid,
        expressions,
    }
}

fn look_at(avatar: &Avatar, look_at_type: LookAtType) -> LookAt {
    let mut look_at = LookAt::new(&avatar.scene, avatar.root, avatar.head, look_at_type);
    look_at.offset_from_head_bone = Vec3::new(0.0, 0.05, 0.05);
    look_at
}

// ============================================================================
// Range Map
// ============================================================================

#[test]
fn range_map_scales_and_clamps() {
    let map = LookAtRangeMap::new(90.0, 10.0);
    assert!(approx(map.map(45.0), 5.0));
    assert!(approx(map.map(180.0), 10.0));
    assert!(approx(map.map(-20.0), 0.0));
}

#[test]
fn range_map_zero_input_is_step() {
    let map = LookAtRangeMap::new(0.0, 0.5);
    assert_eq!(map.map(0.0), 0.0);
    assert_eq!(map.map(1.0), 0.5);
}

// ============================================================================
// Yaw / Pitch
// ============================================================================

#[test]
fn look_at_straight_ahead_is_zero() {
    let avatar = create_avatar();
    let mut look_at = look_at(&avatar, LookAtType::Bone);

    let eyes = look_at.look_at_world_position(&avatar.scene);
    look_at.look_at(&avatar.scene, eyes + Vec3::Z * 2.0);

    assert!(approx(look_at.yaw(), 0.0));
    assert!(approx(look_at.pitch(), 0.0));
}

#[test]
fn look_at_signs_follow_avatar_frame() {
    let avatar = create_avatar();
    let mut look_at = look_at(&avatar, LookAtType::Bone);
    let eyes = look_at.look_at_world_position(&avatar.scene);

    // The avatar faces +Z, so its left is +X.
    look_at.look_at(&avatar.scene, eyes + Vec3::new(1.0, 0.0, 1.0));
    assert!(approx(look_at.yaw(), 45.0));
    assert!(approx(look_at.pitch(), 0.0));

    look_at.look_at(&avatar.scene, eyes + Vec3::new(0.0, -1.0, 1.0));
    assert!(approx(look_at.yaw(), 0.0));
    assert!(approx(look_at.pitch(), -45.0));
}

#[test]
fn look_at_behind_wraps_angle() {
    let avatar = create_avatar();
    let mut look_at = look_at(&avatar, LookAtType::Bone);
    let eyes = look_at.look_at_world_position(&avatar.scene);

    look_at.look_at(&avatar.scene, eyes + Vec3::new(-0.001, 0.0, -1.0));
    assert!(look_at.yaw() < -179.0);
}

#[test]
fn look_at_respects_negative_z_face_front() {
    let avatar = create_avatar();
    let mut look_at = look_at(&avatar, LookAtType::Bone);
    look_at.face_front = Vec3::NEG_Z;
    let eyes = look_at.look_at_world_position(&avatar.scene);

    look_at.look_at(&avatar.scene, eyes + Vec3::NEG_Z);
    assert!(approx(look_at.yaw(), 0.0));
    assert!(approx(look_at.pitch(), 0.0));
}

#[test]
fn look_at_follows_rotated_root() {
    let mut avatar = create_avatar();
    let mut look_at = look_at(&avatar, LookAtType::Bone);

    avatar.scene.get_node_mut(avatar.root).unwrap().transform.rotation =
        Quat::from_rotation_y(std::f32::consts::PI);
    avatar.scene.update_matrix_world();

    // Root turned around: world -Z is now straight ahead.
    let eyes = look_at.look_at_world_position(&avatar.scene);
    look_at.look_at(&avatar.scene, eyes + Vec3::NEG_Z);
    assert!(approx(look_at.yaw(), 0.0));
}

// ============================================================================
// Rotation
// ============================================================================

#[test]
fn look_at_rotation_round_trip() {
    let avatar = create_avatar();
    let mut source = look_at(&avatar, LookAtType::Bone);
    source.set_yaw_pitch(30.0, -10.0);

    let mut target = look_at(&avatar, LookAtType::Bone);
    target.apply_quaternion(source.rotation());

    assert!(approx(target.yaw(), 30.0));
    assert!(approx(target.pitch(), -10.0));
}

#[test]
fn look_at_apply_quaternion_signs() {
    let avatar = create_avatar();
    let mut look_at = look_at(&avatar, LookAtType::Bone);

    look_at.apply_quaternion(Quat::from_rotation_y(0.5));
    assert!(approx(look_at.yaw(), 0.5_f32.to_degrees()));

    // Rotating +Z about -X tilts it upward.
    look_at.apply_quaternion(Quat::from_rotation_x(-0.3));
    assert!(approx(look_at.pitch(), 0.3_f32.to_degrees()));
    assert!(approx(look_at.yaw(), 0.0));

    look_at.reset();
    assert_eq!(look_at.rotation(), Quat::IDENTITY);
}

// ============================================================================
// Application
// ============================================================================

#[test]
fn look_at_bone_type_rotates_eyes() {
    let mut avatar = create_avatar();
    let mut look_at = look_at(&avatar, LookAtType::Bone);
    look_at.set_yaw_pitch(45.0, 0.0);

    look_at.update(&mut avatar.scene, &avatar.humanoid, &mut avatar.expressions);
    avatar.scene.update_matrix_world();

    // Default maps: 90 degrees in, 10 degrees out.
    let expected = Quat::from_rotation_y(5.0_f32.to_radians());
    let normalized = avatar.humanoid.normalized_bone_node(HumanBoneName::LeftEye).unwrap();
    let rotation = avatar.scene.get_node(normalized).unwrap().transform.rotation;
    assert!(quat_approx(rotation, expected));

    let world = avatar.scene.world_rotation(avatar.left_eye);
    assert!(quat_approx(world, expected));
}

#[test]
fn look_at_bone_type_uses_vertical_maps() {
    let mut avatar = create_avatar();
    let mut look_at = look_at(&avatar, LookAtType::Bone);
    look_at.range_map_vertical_up = LookAtRangeMap::new(20.0, 15.0);
    look_at.set_yaw_pitch(0.0, 40.0);

    look_at.update(&mut avatar.scene, &avatar.humanoid, &mut avatar.expressions);

    // Looking up turns +Z toward +Y: a negative rotation about X.
    let normalized = avatar.humanoid.normalized_bone_node(HumanBoneName::RightEye).unwrap();
    let rotation = avatar.scene.get_node(normalized).unwrap().transform.rotation;
    assert!(quat_approx(rotation, Quat::from_rotation_x(-15.0_f32.to_radians())));
}

#[test]
fn look_at_expression_type_drives_presets() {
    let mut avatar = create_avatar();
    let mut look_at = look_at(&avatar, LookAtType::Expression);
    look_at.set_yaw_pitch(-45.0, 30.0);

    look_at.update(&mut avatar.scene, &avatar.humanoid, &mut avatar.expressions);

    let value = |name: &str| avatar.expressions.get_value(name).unwrap();
    assert!(approx(value("lookUp"), 1.0 / 3.0));
    assert!(approx(value("lookDown"), 0.0));
    assert!(approx(value("lookRight"), 0.5));
    assert!(approx(value("lookLeft"), 0.0));
}

#[test]
fn look_at_auto_update_tracks_target() {
    let mut avatar = create_avatar();
    let mut look_at = look_at(&avatar, LookAtType::Expression);
    let eyes = look_at.look_at_world_position(&avatar.scene);
    look_at.target = Some(eyes + Vec3::new(1.0, 0.0, 1.0));

    look_at.update(&mut avatar.scene, &avatar.humanoid, &mut avatar.expressions);
    assert!(approx(look_at.yaw(), 45.0));
    assert!(approx(avatar.expressions.get_value("lookLeft").unwrap(), 0.5));

    look_at.auto_update = false;
    look_at.target = Some(eyes + Vec3::new(-1.0, 0.0, 1.0));
    look_at.update(&mut avatar.scene, &avatar.humanoid, &mut avatar.expressions);
    assert!(approx(look_at.yaw(), 45.0));
}

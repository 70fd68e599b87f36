//! Eye gaze: converts a target point (or a look rotation from an animation)
//! into yaw/pitch and drives either the eye bones or the look expressions.

use std::f32::consts::PI;

use glam::{EulerRot, Quat, Vec3};

use crate::scene::{NodeHandle, Scene};
use crate::vrm::expression::{ExpressionManager, ExpressionPreset};
use crate::vrm::humanoid::{HumanBoneName, Humanoid};

/// Maps an angle in degrees to an output value:
/// `output_scale * clamp(input / input_max_value, 0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAtRangeMap {
    pub input_max_value: f32,
    pub output_scale: f32,
}

impl LookAtRangeMap {
    #[must_use]
    pub fn new(input_max_value: f32, output_scale: f32) -> Self {
        Self {
            input_max_value,
            output_scale,
        }
    }

    #[must_use]
    pub fn map(&self, src: f32) -> f32 {
        if self.input_max_value <= 0.0 {
            return if src > 0.0 { self.output_scale } else { 0.0 };
        }
        self.output_scale * (src / self.input_max_value).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookAtType {
    /// Rotates the normalized eye bones.
    Bone,
    /// Drives the lookUp / lookDown / lookLeft / lookRight expressions.
    Expression,
}

#[derive(Debug, Clone)]
pub struct LookAt {
    pub look_at_type: LookAtType,
    /// Eye position relative to the head bone, in head space.
    pub offset_from_head_bone: Vec3,
    pub range_map_horizontal_inner: LookAtRangeMap,
    pub range_map_horizontal_outer: LookAtRangeMap,
    pub range_map_vertical_down: LookAtRangeMap,
    pub range_map_vertical_up: LookAtRangeMap,
    /// Direction the face points to at rest, in the avatar root frame.
    pub face_front: Vec3,
    /// World-space point to look at on every update.
    pub target: Option<Vec3>,
    pub auto_update: bool,

    root: NodeHandle,
    head: NodeHandle,
    /// Head rotation relative to the avatar root, at rest.
    rest_head_rotation: Quat,

    yaw: f32,
    pitch: f32,
    needs_update: bool,
}

impl LookAt {
    /// Captures the rest head orientation; world matrices must be current.
    #[must_use]
    pub fn new(scene: &Scene, root: NodeHandle, head: NodeHandle, look_at_type: LookAtType) -> Self {
        let rest_head_rotation = scene.world_rotation(root).inverse() * scene.world_rotation(head);
        let output_scale = match look_at_type {
            LookAtType::Bone => 10.0,
            LookAtType::Expression => 1.0,
        };
        let default_map = LookAtRangeMap::new(90.0, output_scale);

        Self {
            look_at_type,
            offset_from_head_bone: Vec3::ZERO,
            range_map_horizontal_inner: default_map,
            range_map_horizontal_outer: default_map,
            range_map_vertical_down: default_map,
            range_map_vertical_up: default_map,
            face_front: Vec3::Z,
            target: None,
            auto_update: true,
            root,
            head,
            rest_head_rotation,
            yaw: 0.0,
            pitch: 0.0,
            needs_update: true,
        }
    }

    /// Horizontal angle in degrees; positive looks toward the avatar's left.
    #[must_use]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Vertical angle in degrees; positive looks up.
    #[must_use]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_yaw_pitch(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch;
        self.needs_update = true;
    }

    pub fn reset(&mut self) {
        self.set_yaw_pitch(0.0, 0.0);
    }

    /// Look rotation equivalent to the current yaw/pitch (forward is +Z).
    #[must_use]
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.yaw.to_radians(),
            -self.pitch.to_radians(),
            0.0,
        )
    }

    /// Sets yaw/pitch from a look rotation whose forward axis is +Z.
    pub fn apply_quaternion(&mut self, rotation: Quat) {
        let (azimuth, altitude) = azimuth_altitude(rotation * Vec3::Z);
        self.set_yaw_pitch(azimuth.to_degrees(), altitude.to_degrees());
    }

    /// World position of the eyes.
    #[must_use]
    pub fn look_at_world_position(&self, scene: &Scene) -> Vec3 {
        scene
            .world_matrix(self.head)
            .transform_point3(self.offset_from_head_bone)
    }

    /// Points the gaze at a world-space position.
    pub fn look_at(&mut self, scene: &Scene, position: Vec3) {
        let root_rotation = scene.world_rotation(self.root);
        let head_rotation = root_rotation.inverse() * scene.world_rotation(self.head);
        let head_diff_inverse = self.rest_head_rotation * head_rotation.inverse();

        let to_target = position - self.look_at_world_position(scene);
        let direction = (head_diff_inverse * (root_rotation.inverse() * to_target)).normalize_or_zero();
        if direction == Vec3::ZERO {
            return;
        }

        let (azimuth_from, altitude_from) = azimuth_altitude(self.face_front);
        let (azimuth_to, altitude_to) = azimuth_altitude(direction);

        self.set_yaw_pitch(
            sanitize_angle(azimuth_to - azimuth_from).to_degrees(),
            sanitize_angle(altitude_to - altitude_from).to_degrees(),
        );
    }

    pub fn update(&mut self, scene: &mut Scene, humanoid: &Humanoid, expressions: &mut ExpressionManager) {
        if self.auto_update
            && let Some(target) = self.target
        {
            self.look_at(scene, target);
        }

        if !self.needs_update {
            return;
        }
        self.needs_update = false;

        match self.look_at_type {
            LookAtType::Bone => self.apply_to_bones(scene, humanoid),
            LookAtType::Expression => self.apply_to_expressions(expressions),
        }
    }

    fn apply_to_bones(&self, scene: &mut Scene, humanoid: &Humanoid) {
        let face = Quat::from_rotation_y(self.face_front.x.atan2(self.face_front.z));

        let x = if self.pitch < 0.0 {
            self.range_map_vertical_down.map(-self.pitch).to_radians()
        } else {
            -self.range_map_vertical_up.map(self.pitch).to_radians()
        };

        // The left eye turns outward for positive yaw, the right eye inward.
        let eyes = [
            (HumanBoneName::LeftEye, self.range_map_horizontal_outer, self.range_map_horizontal_inner),
            (HumanBoneName::RightEye, self.range_map_horizontal_inner, self.range_map_horizontal_outer),
        ];

        for (bone, positive_map, negative_map) in eyes {
            let Some(handle) = humanoid.normalized_bone_node(bone) else {
                continue;
            };
            let y = if self.yaw < 0.0 {
                -negative_map.map(-self.yaw).to_radians()
            } else {
                positive_map.map(self.yaw).to_radians()
            };

            let rotation = face * Quat::from_euler(EulerRot::YXZ, y, x, 0.0) * face.inverse();
            if let Some(node) = scene.get_node_mut(handle) {
                node.transform.rotation = rotation;
            }
            humanoid.update_bone(scene, bone);
        }
    }

    fn apply_to_expressions(&self, expressions: &mut ExpressionManager) {
        let (up, down) = if self.pitch < 0.0 {
            (0.0, self.range_map_vertical_down.map(-self.pitch))
        } else {
            (self.range_map_vertical_up.map(self.pitch), 0.0)
        };
        let (left, right) = if self.yaw < 0.0 {
            (0.0, self.range_map_horizontal_outer.map(-self.yaw))
        } else {
            (self.range_map_horizontal_outer.map(self.yaw), 0.0)
        };

        expressions.set_value(ExpressionPreset::LookUp.as_str(), up);
        expressions.set_value(ExpressionPreset::LookDown.as_str(), down);
        expressions.set_value(ExpressionPreset::LookLeft.as_str(), left);
        expressions.set_value(ExpressionPreset::LookRight.as_str(), right);
    }
}

/// `(azimuth, altitude)` in radians; azimuth 0 is +Z, positive toward +X.
fn azimuth_altitude(v: Vec3) -> (f32, f32) {
    (v.x.atan2(v.z), v.y.atan2(v.x.hypot(v.z)))
}

/// Wraps an angle into `(-PI, PI]`.
fn sanitize_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

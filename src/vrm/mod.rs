//! VRM avatars: humanoid rig, expressions, look-at and spring bones on top
//! of a loaded glTF scene.

pub mod expression;
pub mod humanoid;
pub mod loader;
pub mod look_at;
pub mod meta;
pub mod schema;
pub mod spring_bone;

use std::f32::consts::PI;

use glam::Quat;

pub use expression::{Expression, ExpressionManager, ExpressionOverride, ExpressionPreset, MorphTargetBind};
pub use humanoid::{BonePose, HumanBoneName, Humanoid, HumanoidPose};
pub use loader::{VrmLoader, VrmLoaderPlugin};
pub use look_at::{LookAt, LookAtRangeMap, LookAtType};
pub use meta::{MetaVersion, VrmMeta};
pub use spring_bone::{
    ColliderGroup, ColliderShape, SpringBoneCollider, SpringBoneJoint, SpringBoneJointSettings, SpringBoneManager,
};

use crate::animation::AnimationTarget;
use crate::assets::loaders::GltfAnimation;
use crate::scene::{NodeHandle, Scene};

/// A loaded VRM model.
///
/// Owns its scene; every sub-system refers to nodes through handles into it.
#[derive(Debug)]
pub struct Vrm {
    pub scene: Scene,
    /// Node standing in for the glTF scene root.
    pub root: NodeHandle,
    pub meta: VrmMeta,
    pub humanoid: Humanoid,
    pub expression_manager: ExpressionManager,
    pub look_at: Option<LookAt>,
    pub spring_bone_manager: SpringBoneManager,
    /// Plain glTF animations embedded in the model file.
    pub animations: Vec<GltfAnimation>,
}

impl Vrm {
    /// Advances the avatar by one frame.
    ///
    /// Copies the normalized pose onto the raw skeleton, applies look-at and
    /// expressions, then steps the spring bones against the final pose.
    pub fn update(&mut self, delta: f32) {
        self.humanoid.update(&mut self.scene);
        self.scene.update_matrix_world();

        if let Some(look_at) = &mut self.look_at {
            look_at.update(&mut self.scene, &self.humanoid, &mut self.expression_manager);
        }

        self.expression_manager.update(&mut self.scene);
        self.scene.update_matrix_world();

        self.spring_bone_manager.update(&mut self.scene, delta);
    }

    #[must_use]
    pub fn meta_version(&self) -> MetaVersion {
        self.meta.meta_version
    }

    /// Turns a VRM 0.x model around so it faces +Z like a 1.0 model.
    ///
    /// Does nothing for 1.0 models. Spring bone tails are re-seated on the
    /// rotated pose.
    pub fn rotate_vrm0(&mut self) {
        if self.meta.meta_version != MetaVersion::V0 {
            return;
        }
        if let Some(root) = self.scene.get_node_mut(self.root) {
            root.transform.rotation = Quat::from_rotation_y(PI);
        }
        self.scene.update_matrix_world();
        self.spring_bone_manager.reset(&mut self.scene);
    }
}

impl AnimationTarget for Vrm {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    fn expression_weight(&self, name: &str) -> Option<f32> {
        self.expression_manager.get_value(name)
    }

    fn set_expression_weight(&mut self, name: &str, weight: f32) {
        self.expression_manager.set_value(name, weight);
    }

    fn look_at_rotation(&self) -> Option<Quat> {
        self.look_at.as_ref().map(LookAt::rotation)
    }

    fn set_look_at_rotation(&mut self, rotation: Quat) {
        if let Some(look_at) = &mut self.look_at {
            look_at.apply_quaternion(rotation);
        }
    }
}

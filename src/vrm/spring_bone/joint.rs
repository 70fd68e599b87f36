use glam::{Affine3A, Quat, Vec3};
use smallvec::SmallVec;

use crate::scene::{NodeHandle, Scene};
use crate::vrm::spring_bone::collider::{ColliderGroup, SpringBoneCollider};

/// Tail offset used for a leaf joint, along the bone's own direction.
const LEAF_TAIL_LENGTH: f32 = 0.07;

/// Physical parameters of a joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringBoneJointSettings {
    /// Radius of the tail sphere used against colliders.
    pub hit_radius: f32,
    /// Pull back toward the rest direction.
    pub stiffness: f32,
    pub gravity_power: f32,
    /// World-space gravity direction.
    pub gravity_dir: Vec3,
    /// Velocity damping, 0 keeps all inertia and 1 removes it.
    pub drag_force: f32,
}

impl Default for SpringBoneJointSettings {
    fn default() -> Self {
        Self {
            hit_radius: 0.0,
            stiffness: 1.0,
            gravity_power: 0.0,
            gravity_dir: Vec3::NEG_Y,
            drag_force: 0.5,
        }
    }
}

/// One simulated bone: a point mass (the tail) rigidly attached to `bone`
/// and integrated with Verlet steps.
///
/// Tails are stored in the space of the optional `center` node so that
/// moving the whole avatar does not fling its hair around.
#[derive(Debug, Clone)]
pub struct SpringBoneJoint {
    bone: NodeHandle,
    child: Option<NodeHandle>,
    center: Option<NodeHandle>,
    pub settings: SpringBoneJointSettings,
    /// Indices into the manager's collider groups.
    pub collider_groups: Vec<usize>,

    initial_local_matrix: Affine3A,
    initial_local_rotation: Quat,
    initial_local_child_position: Vec3,
    /// Rest direction toward the tail, in bone-local space.
    bone_axis: Vec3,
    current_tail: Vec3,
    prev_tail: Vec3,
    world_space_bone_length: f32,
}

impl SpringBoneJoint {
    /// Creates a joint and captures its rest state from the current pose.
    ///
    /// World matrices of `bone` (and `center`, if set later) must be current.
    #[must_use]
    pub fn new(
        scene: &Scene,
        bone: NodeHandle,
        child: Option<NodeHandle>,
        settings: SpringBoneJointSettings,
        collider_groups: Vec<usize>,
    ) -> Self {
        let mut joint = Self {
            bone,
            child,
            center: None,
            settings,
            collider_groups,
            initial_local_matrix: Affine3A::IDENTITY,
            initial_local_rotation: Quat::IDENTITY,
            initial_local_child_position: Vec3::ZERO,
            bone_axis: Vec3::Y,
            current_tail: Vec3::ZERO,
            prev_tail: Vec3::ZERO,
            world_space_bone_length: 0.0,
        };
        joint.set_init_state(scene);
        joint
    }

    #[inline]
    #[must_use]
    pub fn bone(&self) -> NodeHandle {
        self.bone
    }

    #[inline]
    #[must_use]
    pub fn child(&self) -> Option<NodeHandle> {
        self.child
    }

    #[inline]
    #[must_use]
    pub fn center(&self) -> Option<NodeHandle> {
        self.center
    }

    /// Current tail position, in center space.
    #[must_use]
    pub fn current_tail(&self) -> Vec3 {
        self.current_tail
    }

    /// Previous tail position, in center space.
    #[must_use]
    pub fn prev_tail(&self) -> Vec3 {
        self.prev_tail
    }

    #[must_use]
    pub fn bone_axis(&self) -> Vec3 {
        self.bone_axis
    }

    #[must_use]
    pub fn world_space_bone_length(&self) -> f32 {
        self.world_space_bone_length
    }

    #[must_use]
    pub fn initial_local_rotation(&self) -> Quat {
        self.initial_local_rotation
    }

    /// Current tail position in world space.
    #[must_use]
    pub fn world_tail(&self, scene: &Scene) -> Vec3 {
        self.matrix_center_to_world(scene)
            .transform_point3(self.current_tail)
    }

    /// Nodes whose world matrices must be final before this joint steps:
    /// the bone's parent and the center node.
    #[must_use]
    pub fn dependencies(&self, scene: &Scene) -> SmallVec<[NodeHandle; 2]> {
        let mut deps = SmallVec::new();
        if let Some(parent) = scene.get_node(self.bone).and_then(|n| n.parent()) {
            deps.push(parent);
        }
        if let Some(center) = self.center {
            deps.push(center);
        }
        deps
    }

    /// Captures the current local pose as the rest state and resets the tail.
    pub fn set_init_state(&mut self, scene: &Scene) {
        let Some(node) = scene.get_node(self.bone) else {
            log::warn!("Spring bone joint refers to a missing node");
            return;
        };
        let transform = &node.transform;

        self.initial_local_matrix =
            Affine3A::from_scale_rotation_translation(transform.scale, transform.rotation, transform.position);
        self.initial_local_rotation = transform.rotation;

        self.initial_local_child_position = match self.child.and_then(|c| scene.get_node(c)) {
            Some(child) => child.transform.position,
            None => transform.position.normalize_or_zero() * LEAF_TAIL_LENGTH,
        };
        if self.initial_local_child_position.length_squared() <= f32::EPSILON {
            log::warn!(
                "Spring bone '{}' has a zero-length tail; using +Y",
                node.name
            );
            self.initial_local_child_position = Vec3::Y * LEAF_TAIL_LENGTH;
        }
        self.bone_axis = self.initial_local_child_position.normalize();

        let world_tail = scene
            .world_matrix(self.bone)
            .transform_point3(self.initial_local_child_position);
        self.current_tail = self.matrix_world_to_center(scene).transform_point3(world_tail);
        self.prev_tail = self.current_tail;
        self.calc_world_space_bone_length(scene);
    }

    /// Restores the rest rotation and puts the tail back at rest.
    pub fn reset(&mut self, scene: &mut Scene) {
        if let Some(node) = scene.get_node_mut(self.bone) {
            node.transform.rotation = self.initial_local_rotation;
        }
        scene.update_world_matrix(self.bone, false, false);

        let world_tail = scene
            .world_matrix(self.bone)
            .transform_point3(self.initial_local_child_position);
        self.current_tail = self.matrix_world_to_center(scene).transform_point3(world_tail);
        self.prev_tail = self.current_tail;
    }

    /// Moves the tails into the space of a new center node.
    pub fn set_center(&mut self, scene: &Scene, center: Option<NodeHandle>) {
        let to_world = self.matrix_center_to_world(scene);
        let current = to_world.transform_point3(self.current_tail);
        let prev = to_world.transform_point3(self.prev_tail);

        self.center = center;

        let to_center = self.matrix_world_to_center(scene);
        self.current_tail = to_center.transform_point3(current);
        self.prev_tail = to_center.transform_point3(prev);
    }

    /// Advances the simulation by `delta` seconds and rotates the bone.
    ///
    /// The parent's and center's world matrices must be current; the bone's
    /// own world matrix is refreshed before returning.
    pub fn update(
        &mut self,
        scene: &mut Scene,
        colliders: &[SpringBoneCollider],
        collider_groups: &[ColliderGroup],
        delta: f32,
    ) {
        if delta <= 0.0 || !scene.nodes.contains_key(self.bone) {
            return;
        }

        self.calc_world_space_bone_length(scene);

        let world_position = scene.world_position(self.bone);
        let world_to_center = self.matrix_world_to_center(scene);
        let center_to_world = self.matrix_center_to_world(scene);
        let center_space_position = world_to_center.transform_point3(world_position);
        let (_, quat_world_to_center, _) = world_to_center.to_scale_rotation_translation();

        let parent_world = scene.parent_world_matrix(self.bone);
        let center_space_parent = world_to_center * parent_world;

        let center_space_bone_axis = (center_space_parent
            .transform_point3(self.initial_local_matrix.transform_point3(self.bone_axis))
            - center_space_position)
            .normalize_or_zero();
        let center_space_gravity = (quat_world_to_center * self.settings.gravity_dir).normalize_or_zero();

        // Verlet step in center space
        let inertia = (self.current_tail - self.prev_tail) * (1.0 - self.settings.drag_force);
        let next_center = self.current_tail
            + inertia
            + center_space_bone_axis * (self.settings.stiffness * delta)
            + center_space_gravity * (self.settings.gravity_power * delta);

        let mut next_tail = center_to_world.transform_point3(next_center);
        next_tail = self.constrain_length(next_tail, world_position);

        self.collide(scene, colliders, collider_groups, world_position, &mut next_tail);

        self.prev_tail = self.current_tail;
        self.current_tail = world_to_center.transform_point3(next_tail);

        // Rotate the rest axis toward the new tail, in the rest-local frame.
        let initial_world_inverse = (parent_world * self.initial_local_matrix).inverse();
        let to = initial_world_inverse.transform_point3(next_tail).normalize_or_zero();
        let apply_rotation = if to == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            Quat::from_rotation_arc(self.bone_axis, to)
        };

        if let Some(node) = scene.get_node_mut(self.bone) {
            node.transform.rotation = self.initial_local_rotation * apply_rotation;
        }
        scene.update_world_matrix(self.bone, false, false);
    }

    fn collide(
        &self,
        scene: &Scene,
        colliders: &[SpringBoneCollider],
        collider_groups: &[ColliderGroup],
        world_position: Vec3,
        tail: &mut Vec3,
    ) {
        for &group_index in &self.collider_groups {
            let Some(group) = collider_groups.get(group_index) else {
                continue;
            };
            for &collider_index in &group.colliders {
                let Some(collider) = colliders.get(collider_index) else {
                    continue;
                };
                let matrix = scene.world_matrix(collider.node);
                let (distance, direction) =
                    collider
                        .shape
                        .calculate_collision(&matrix, *tail, self.settings.hit_radius);

                if distance < 0.0 {
                    *tail += direction * -distance;
                    *tail = self.constrain_length(*tail, world_position);
                }
            }
        }
    }

    /// Projects `tail` onto the sphere of the bone length around the bone.
    #[inline]
    fn constrain_length(&self, tail: Vec3, world_position: Vec3) -> Vec3 {
        world_position + (tail - world_position).normalize_or_zero() * self.world_space_bone_length
    }

    fn calc_world_space_bone_length(&mut self, scene: &Scene) {
        let world = scene.world_matrix(self.bone);
        let head: Vec3 = world.translation.into();
        let tail = match self.child {
            Some(child) if scene.nodes.contains_key(child) => scene.world_position(child),
            _ => world.transform_point3(self.initial_local_child_position),
        };
        self.world_space_bone_length = (tail - head).length();
    }

    fn matrix_center_to_world(&self, scene: &Scene) -> Affine3A {
        self.center
            .map_or(Affine3A::IDENTITY, |center| scene.world_matrix(center))
    }

    fn matrix_world_to_center(&self, scene: &Scene) -> Affine3A {
        self.matrix_center_to_world(scene).inverse()
    }
}

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::scene::{NodeHandle, Scene};
use crate::vrm::spring_bone::collider::{ColliderGroup, SpringBoneCollider};
use crate::vrm::spring_bone::joint::SpringBoneJoint;

/// Owns every joint, collider and collider group of an avatar and steps the
/// joints in dependency order.
#[derive(Debug, Clone, Default)]
pub struct SpringBoneManager {
    joints: Vec<SpringBoneJoint>,
    colliders: Vec<SpringBoneCollider>,
    collider_groups: Vec<ColliderGroup>,

    sorted_joints: Vec<usize>,
    needs_sort: bool,
    has_warned_circular_dependency: bool,
}

impl SpringBoneManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub fn add_collider(&mut self, collider: SpringBoneCollider) -> usize {
        self.colliders.push(collider);
        self.colliders.len() - 1
    }

    pub fn add_collider_group(&mut self, group: ColliderGroup) -> usize {
        self.collider_groups.push(group);
        self.collider_groups.len() - 1
    }

    pub fn add_joint(&mut self, joint: SpringBoneJoint) -> usize {
        self.joints.push(joint);
        self.needs_sort = true;
        self.joints.len() - 1
    }

    /// Removes every joint driving `bone`, returning how many were removed.
    pub fn remove_joints_of_bone(&mut self, bone: NodeHandle) -> usize {
        let before = self.joints.len();
        self.joints.retain(|j| j.bone() != bone);
        self.needs_sort = true;
        before - self.joints.len()
    }

    /// Changes a joint's center node, re-expressing its tails.
    pub fn set_center(&mut self, scene: &Scene, joint_index: usize, center: Option<NodeHandle>) {
        if let Some(joint) = self.joints.get_mut(joint_index) {
            joint.set_center(scene, center);
            self.needs_sort = true;
        }
    }

    /// Forces the update order to be recomputed, e.g. after re-parenting.
    pub fn mark_hierarchy_changed(&mut self) {
        self.needs_sort = true;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn joints(&self) -> &[SpringBoneJoint] {
        &self.joints
    }

    /// Mutable access to a joint's settings and collider groups.
    pub fn joint_mut(&mut self, index: usize) -> Option<&mut SpringBoneJoint> {
        self.joints.get_mut(index)
    }

    #[must_use]
    pub fn colliders(&self) -> &[SpringBoneCollider] {
        &self.colliders
    }

    #[must_use]
    pub fn collider_groups(&self) -> &[ColliderGroup] {
        &self.collider_groups
    }

    pub fn joints_of_bone(&self, bone: NodeHandle) -> impl Iterator<Item = &SpringBoneJoint> {
        self.joints.iter().filter(move |j| j.bone() == bone)
    }

    /// Joint indices in the order they are stepped.
    pub fn update_order(&mut self, scene: &Scene) -> &[usize] {
        self.ensure_sorted(scene);
        &self.sorted_joints
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    /// Re-captures the rest state of every joint from the current pose.
    pub fn set_init_state(&mut self, scene: &mut Scene) {
        self.ensure_sorted(scene);
        for &index in &self.sorted_joints {
            let joint = &mut self.joints[index];
            refresh_dependencies(scene, joint);
            joint.set_init_state(scene);
        }
    }

    /// Puts every joint back to its rest rotation and rest tail.
    pub fn reset(&mut self, scene: &mut Scene) {
        self.ensure_sorted(scene);
        for &index in &self.sorted_joints {
            let joint = &mut self.joints[index];
            refresh_dependencies(scene, joint);
            joint.reset(scene);
            scene.update_world_matrix(joint.bone(), false, true);
        }
    }

    /// Steps every joint by `delta` seconds.
    ///
    /// Before a joint steps, the world matrices of its bone's ancestors and
    /// of its center are recomputed; after it steps, its subtree is.
    pub fn update(&mut self, scene: &mut Scene, delta: f32) {
        self.ensure_sorted(scene);
        for &index in &self.sorted_joints {
            let joint = &mut self.joints[index];
            refresh_dependencies(scene, joint);
            joint.update(scene, &self.colliders, &self.collider_groups, delta);
            scene.update_world_matrix(joint.bone(), false, true);
        }
    }

    fn ensure_sorted(&mut self, scene: &Scene) {
        if !self.needs_sort && self.sorted_joints.len() == self.joints.len() {
            return;
        }

        let mut joints_by_bone: FxHashMap<NodeHandle, SmallVec<[usize; 2]>> = FxHashMap::default();
        for (index, joint) in self.joints.iter().enumerate() {
            joints_by_bone.entry(joint.bone()).or_default().push(index);
        }

        let mut sort = JointSort {
            scene,
            joints: &self.joints,
            joints_by_bone: &joints_by_bone,
            tried: vec![false; self.joints.len()],
            done: vec![false; self.joints.len()],
            order: Vec::with_capacity(self.joints.len()),
            found_cycle: false,
        };
        for index in 0..self.joints.len() {
            sort.insert(index);
        }

        if sort.found_cycle && !self.has_warned_circular_dependency {
            log::warn!("SpringBoneManager: circular dependency detected; update order may be unstable");
            self.has_warned_circular_dependency = true;
        }

        self.sorted_joints = sort.order;
        self.needs_sort = false;
    }
}

fn refresh_dependencies(scene: &mut Scene, joint: &SpringBoneJoint) {
    scene.update_world_matrix(joint.bone(), true, false);
    if let Some(center) = joint.center() {
        scene.update_world_matrix(center, true, false);
    }
}

/// Depth-first topological sort over "joint A must step before joint B".
///
/// B depends on A when A's bone is B's parent, B's center, or an ancestor of
/// either. A joint reached again while still on the stack closes a cycle;
/// that edge is dropped.
struct JointSort<'a> {
    scene: &'a Scene,
    joints: &'a [SpringBoneJoint],
    joints_by_bone: &'a FxHashMap<NodeHandle, SmallVec<[usize; 2]>>,
    tried: Vec<bool>,
    done: Vec<bool>,
    order: Vec<usize>,
    found_cycle: bool,
}

impl JointSort<'_> {
    fn insert(&mut self, index: usize) {
        if self.done[index] {
            return;
        }
        if self.tried[index] {
            self.found_cycle = true;
            return;
        }
        self.tried[index] = true;

        let scene = self.scene;
        let joints_by_bone = self.joints_by_bone;

        for dependency in self.joints[index].dependencies(scene) {
            let mut chain: SmallVec<[NodeHandle; 16]> = std::iter::once(dependency)
                .chain(scene.ancestors(dependency))
                .collect();
            chain.reverse();

            for object in chain {
                if let Some(dependents) = joints_by_bone.get(&object) {
                    for &dep_index in dependents {
                        self.insert(dep_index);
                    }
                }
            }
        }

        self.order.push(index);
        self.done[index] = true;
    }
}

use glam::Quat;

use crate::scene::{Node, NodeHandle, Scene};

/// Anything an [`AnimationMixer`](crate::animation::AnimationMixer) can write into.
///
/// Node properties go through [`scene`](Self::scene); expression and look-at
/// tracks are forwarded to the hooks, which targets without those concepts
/// ignore.
pub trait AnimationTarget {
    fn scene(&self) -> &Scene;

    fn scene_mut(&mut self) -> &mut Scene;

    fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.scene_mut().get_node_mut(handle)
    }

    /// Current weight of a named expression, used as the blend source.
    fn expression_weight(&self, _name: &str) -> Option<f32> {
        None
    }

    fn set_expression_weight(&mut self, _name: &str, _weight: f32) {}

    /// Current look-at rotation, used as the blend source.
    fn look_at_rotation(&self) -> Option<Quat> {
        None
    }

    fn set_look_at_rotation(&mut self, _rotation: Quat) {}
}

impl AnimationTarget for Scene {
    fn scene(&self) -> &Scene {
        self
    }

    fn scene_mut(&mut self) -> &mut Scene {
        self
    }
}

use glam::Quat;

use crate::animation::action::{AnimationAction, TrackValue};
use crate::animation::binding::{PropertyBinding, TargetPath};
use crate::animation::target::AnimationTarget;

/// Drives a set of actions and writes their sampled values into a target.
///
/// Actions are applied in insertion order. An action with weight `w < 1`
/// blends from whatever the target currently holds, so later actions layer
/// on top of earlier ones.
#[derive(Debug, Default)]
pub struct AnimationMixer {
    actions: Vec<AnimationAction>,
}

impl AnimationMixer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Adds an action and returns its index.
    pub fn add_action(&mut self, action: AnimationAction) -> usize {
        self.actions.push(action);
        self.actions.len() - 1
    }

    #[must_use]
    pub fn action(&self, index: usize) -> Option<&AnimationAction> {
        self.actions.get(index)
    }

    pub fn action_mut(&mut self, index: usize) -> Option<&mut AnimationAction> {
        self.actions.get_mut(index)
    }

    #[must_use]
    pub fn actions(&self) -> &[AnimationAction] {
        &self.actions
    }

    pub fn stop_all_actions(&mut self) {
        for action in &mut self.actions {
            action.stop();
        }
    }

    /// Advances every action by `dt` and applies the results to `target`.
    pub fn update<T: AnimationTarget + ?Sized>(&mut self, dt: f32, target: &mut T) {
        for action in &mut self.actions {
            action.update(dt);
        }
        self.apply(target);
    }

    /// Applies the current sample of every enabled action without advancing time.
    pub fn apply<T: AnimationTarget + ?Sized>(&mut self, target: &mut T) {
        for action in &mut self.actions {
            if !action.enabled || action.weight <= 0.0 {
                continue;
            }

            let weight = action.weight.min(1.0);
            let bindings = std::mem::take(&mut action.bindings);

            for binding in &bindings {
                let Some(value) = action.sample_track(binding.track_index) else {
                    continue;
                };
                let name = &action.clip().tracks[binding.track_index].meta.node_name;
                apply_value(target, binding, name, value, weight);
            }

            action.bindings = bindings;
        }
    }
}

fn apply_value<T: AnimationTarget + ?Sized>(
    target: &mut T,
    binding: &PropertyBinding,
    name: &str,
    value: TrackValue,
    weight: f32,
) {
    match (binding.target, value) {
        (TargetPath::Translation, TrackValue::Vector3(v)) => {
            if let Some(node) = binding.node_handle.and_then(|h| target.node_mut(h)) {
                node.transform.position = node.transform.position.lerp(v, weight);
            }
        }
        (TargetPath::Scale, TrackValue::Vector3(v)) => {
            if let Some(node) = binding.node_handle.and_then(|h| target.node_mut(h)) {
                node.transform.scale = node.transform.scale.lerp(v, weight);
            }
        }
        (TargetPath::Rotation, TrackValue::Quaternion(q)) => {
            if let Some(node) = binding.node_handle.and_then(|h| target.node_mut(h)) {
                node.transform.rotation = blend_quat(node.transform.rotation, q, weight);
            }
        }
        (TargetPath::Weights, TrackValue::MorphWeight(w)) => {
            if let Some(node) = binding.node_handle.and_then(|h| target.node_mut(h)) {
                let count = node.morph_weights.len().min(w.weights.len());
                for (slot, &sampled) in node.morph_weights[..count].iter_mut().zip(&w.weights[..count]) {
                    *slot += (sampled - *slot) * weight;
                }
            }
        }
        (TargetPath::Expression, TrackValue::Scalar(s)) => {
            let current = target.expression_weight(name).unwrap_or(0.0);
            target.set_expression_weight(name, current + (s - current) * weight);
        }
        (TargetPath::LookAt, TrackValue::Quaternion(q)) => {
            let current = target.look_at_rotation().unwrap_or(Quat::IDENTITY);
            target.set_look_at_rotation(blend_quat(current, q, weight));
        }
        (path, _) => {
            log::debug!("Track type does not match target path {path:?}; skipped");
        }
    }
}

#[inline]
fn blend_quat(current: Quat, sampled: Quat, weight: f32) -> Quat {
    if weight >= 1.0 {
        sampled
    } else {
        current.slerp(sampled, weight)
    }
}

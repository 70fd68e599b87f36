use crate::animation::binding::PropertyBinding;
use crate::animation::clip::AnimationClip;
use crate::scene::{NodeHandle, Scene};

pub struct Binder;

impl Binder {
    /// Resolves a clip's tracks against the subtree of `root_node`.
    ///
    /// Node tracks whose node cannot be found are dropped; expression and
    /// look-at tracks are kept unresolved and routed by name at apply time.
    #[must_use]
    pub fn bind(scene: &Scene, root_node: NodeHandle, clip: &AnimationClip) -> Vec<PropertyBinding> {
        let mut bindings = Vec::with_capacity(clip.tracks.len());
        let mut missing = 0usize;

        for (track_idx, track) in clip.tracks.iter().enumerate() {
            let target = track.meta.target;

            if !target.is_node_property() {
                bindings.push(PropertyBinding {
                    track_index: track_idx,
                    node_handle: None,
                    target,
                });
                continue;
            }

            if let Some(node_handle) = scene.find_node_by_name(root_node, &track.meta.node_name) {
                bindings.push(PropertyBinding {
                    track_index: track_idx,
                    node_handle: Some(node_handle),
                    target,
                });
            } else {
                log::debug!(
                    "Clip '{}': no node named '{}' for {:?} track",
                    clip.name,
                    track.meta.node_name,
                    target
                );
                missing += 1;
            }
        }

        if missing > 0 {
            log::warn!("Clip '{}': {} track(s) could not be bound", clip.name, missing);
        }

        bindings
    }
}

use crate::scene::NodeHandle;

/// Defines the target property for animation data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetPath {
    /// Maps to `transform.position`
    Translation,
    /// Maps to `transform.rotation`
    Rotation,
    /// Maps to `transform.scale`
    Scale,
    /// Maps to the node's morph target weights
    Weights,
    /// Maps to a VRM expression weight; the track's node name is the expression name
    Expression,
    /// Maps to the avatar's look-at rotation
    LookAt,
}

impl TargetPath {
    /// Whether tracks with this path resolve to a scene node.
    #[inline]
    #[must_use]
    pub fn is_node_property(self) -> bool {
        matches!(self, Self::Translation | Self::Rotation | Self::Scale | Self::Weights)
    }
}

/// Binding relationship: maps track `track_index` of a clip to its resolved
/// target. `node_handle` is set for node properties only.
#[derive(Debug, Clone)]
pub struct PropertyBinding {
    pub track_index: usize,
    pub node_handle: Option<NodeHandle>,
    pub target: TargetPath,
}

use crate::scene::NodeHandle;
use crate::scene::transform::Transform;
use glam::Affine3A;

/// A scene node: hierarchy links, a transform and the little per-node state
/// the avatar runtime needs.
///
/// # Hierarchy
///
/// Nodes form a tree structure through parent-child relationships:
/// - `parent`: Optional handle to parent node (None for root nodes)
/// - `children`: List of child node handles
///
/// # Morph weights
///
/// Nodes that instance a glTF mesh with morph targets carry one weight slot
/// per target. Expressions and weight tracks write into these slots; the
/// renderer that consumes them lives outside this crate.
#[derive(Debug, Clone)]
pub struct Node {
    /// Node name from the source file (used for animation binding)
    pub name: String,

    // === Core Hierarchy ===
    /// Parent node handle (None for root nodes)
    pub(crate) parent: Option<NodeHandle>,
    /// Child node handles
    pub(crate) children: Vec<NodeHandle>,

    // === Core Spatial Data ===
    /// Transform component (hot data accessed every frame)
    pub transform: Transform,

    // === Core State ===
    /// Visibility flag
    pub visible: bool,

    /// Index of the glTF mesh instanced by this node, if any
    pub mesh: Option<usize>,
    /// Morph target weights of the instanced mesh
    pub morph_weights: Vec<f32>,
}

impl Node {
    /// Creates a new node with default transform and visibility.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: String::new(),
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            visible: true,
            mesh: None,
            morph_weights: Vec::new(),
        }
    }

    /// Creates a new named node.
    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::new()
        }
    }

    /// Returns the parent node handle, if any.
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    /// Returns a read-only slice of child node handles.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    /// Returns a reference to the world transformation matrix.
    ///
    /// It is refreshed by the transform system; read it after
    /// [`Scene::update_matrix_world`](crate::scene::Scene::update_matrix_world).
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }

    /// Writes a morph weight, ignoring out-of-range indices.
    pub fn set_morph_weight(&mut self, index: usize, weight: f32) {
        if let Some(slot) = self.morph_weights.get_mut(index) {
            *slot = weight;
        }
    }

    /// Copies as many weights as this node has slots for.
    pub fn set_morph_weights(&mut self, weights: &[f32]) {
        let count = self.morph_weights.len().min(weights.len());
        self.morph_weights[..count].copy_from_slice(&weights[..count]);
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

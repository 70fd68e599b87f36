//! Scene graph module
//!
//! Manages the node hierarchy an avatar is loaded into:
//! - Node: scene node (parent/child links and a transform)
//! - Transform: TRS component with cached matrices and dirty checking
//! - Scene: node arena and hierarchy operations
//! - transform_system: world-matrix propagation decoupled from `Scene`

pub mod node;
pub mod scene;
pub mod transform;
pub mod transform_system;

pub use node::Node;
pub use scene::Scene;
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    /// Stable handle to a [`Node`] stored in a [`Scene`].
    pub struct NodeHandle;
}

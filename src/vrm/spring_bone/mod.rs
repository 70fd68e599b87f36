//! Spring-bone secondary motion (hair, cloth, accessories).
//!
//! - [`SpringBoneJoint`]: Verlet tail simulation for one bone
//! - [`ColliderShape`]: sphere / capsule / plane colliders
//! - [`SpringBoneManager`]: ownership and dependency-ordered stepping

pub mod collider;
pub mod joint;
pub mod manager;

pub use collider::{ColliderGroup, ColliderShape, SpringBoneCollider};
pub use joint::{SpringBoneJoint, SpringBoneJointSettings};
pub use manager::SpringBoneManager;

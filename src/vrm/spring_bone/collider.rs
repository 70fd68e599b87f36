use glam::{Affine3A, Vec3};

use crate::scene::NodeHandle;

/// Collision shape, expressed in the collider node's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    /// With `inside`, the joint is kept inside the sphere instead of outside.
    Sphere { offset: Vec3, radius: f32, inside: bool },
    /// Sphere swept from `offset` to `tail`.
    Capsule {
        offset: Vec3,
        tail: Vec3,
        radius: f32,
        inside: bool,
    },
    /// Infinite plane through `offset`; the half-space behind `normal` is solid.
    Plane { offset: Vec3, normal: Vec3 },
}

impl ColliderShape {
    #[must_use]
    pub fn sphere(offset: Vec3, radius: f32) -> Self {
        Self::Sphere {
            offset,
            radius,
            inside: false,
        }
    }

    #[must_use]
    pub fn capsule(offset: Vec3, tail: Vec3, radius: f32) -> Self {
        Self::Capsule {
            offset,
            tail,
            radius,
            inside: false,
        }
    }

    #[must_use]
    pub fn plane(offset: Vec3, normal: Vec3) -> Self {
        Self::Plane { offset, normal }
    }

    /// Signed distance between a sphere of `object_radius` at
    /// `object_position` (world space) and this shape placed by
    /// `collider_matrix`, plus the unit direction pushing the object out.
    ///
    /// A negative distance means penetration; moving the object by
    /// `direction * -distance` resolves it.
    #[must_use]
    pub fn calculate_collision(
        &self,
        collider_matrix: &Affine3A,
        object_position: Vec3,
        object_radius: f32,
    ) -> (f32, Vec3) {
        match *self {
            Self::Sphere { offset, radius, inside } => {
                let center = collider_matrix.transform_point3(offset);
                let delta = object_position - center;
                sphere_distance(delta, radius, object_radius, inside)
            }
            Self::Capsule {
                offset,
                tail,
                radius,
                inside,
            } => {
                let head = collider_matrix.transform_point3(offset);
                let axis = collider_matrix.transform_point3(tail) - head;
                let length_sq = axis.length_squared();

                let mut delta = object_position - head;
                let dot = axis.dot(delta);
                if dot > 0.0 {
                    // Past the tail the tail itself is the closest point.
                    delta -= if length_sq <= dot { axis } else { axis * (dot / length_sq) };
                }
                sphere_distance(delta, radius, object_radius, inside)
            }
            Self::Plane { offset, normal } => {
                let origin = collider_matrix.transform_point3(offset);
                let world_normal = collider_matrix.transform_vector3(normal).normalize_or_zero();
                let distance = (object_position - origin).dot(world_normal) - object_radius;
                (distance, world_normal)
            }
        }
    }
}

fn sphere_distance(delta: Vec3, radius: f32, object_radius: f32, inside: bool) -> (f32, Vec3) {
    let length = delta.length();
    if inside {
        let distance = radius - object_radius - length;
        (distance, -delta.normalize_or_zero())
    } else {
        let distance = length - radius - object_radius;
        (distance, delta.normalize_or_zero())
    }
}

/// A shape attached to a scene node.
#[derive(Debug, Clone)]
pub struct SpringBoneCollider {
    pub node: NodeHandle,
    pub shape: ColliderShape,
}

/// Named set of colliders a spring chain collides with.
#[derive(Debug, Clone, Default)]
pub struct ColliderGroup {
    pub name: String,
    /// Indices into the manager's collider list.
    pub colliders: Vec<usize>,
}

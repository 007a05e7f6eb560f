//! Transform component for the ECS system
//!
//! Holds the local TRS of an entity plus its place in the scene hierarchy.
//! Hierarchy links and the cached world matrix are crate-private: they are
//! only written through the [`World`](crate::ecs::World) hierarchy API, which
//! keeps the parent/child lists consistent and propagates dirty flags.

use std::cell::Cell;

use crate::ecs::{Component, Entity};
use crate::foundation::math::{Mat4, Quat, Transform as MathTransform, Vec3};

/// ECS Transform component
#[derive(Debug, Clone)]
pub struct TransformComponent {
    /// Local position relative to the parent
    pub(crate) position: Vec3,

    /// Local rotation relative to the parent
    pub(crate) rotation: Quat,

    /// Local scale factors
    pub(crate) scale: Vec3,

    /// Pivot point in local space that rotation and scale are applied around
    pub(crate) origin: Vec3,

    pub(crate) parent: Option<Entity>,
    pub(crate) children: Vec<Entity>,
    pub(crate) world: Cell<Mat4>,
    pub(crate) dirty: Cell<bool>,
}

impl Component for TransformComponent {}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            origin: Vec3::zeros(),
            parent: None,
            children: Vec::new(),
            world: Cell::new(Mat4::identity()),
            dirty: Cell::new(true),
        }
    }
}

impl TransformComponent {
    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Builder pattern: Set rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder pattern: Set scale (non-uniform)
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Builder pattern: Set scale (uniform)
    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vec3::new(scale, scale, scale))
    }

    /// Builder pattern: Set pivot origin
    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Local rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Local pivot origin
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Parent entity, if this node is not a root
    pub fn parent(&self) -> Option<Entity> {
        self.parent
    }

    /// Children in attachment order
    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    /// Whether the cached world matrix is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Local matrix: `T(position) * R * S * T(-origin)`
    pub fn local_matrix(&self) -> Mat4 {
        let trs = MathTransform {
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
        }
        .to_matrix();

        if self.origin == Vec3::zeros() {
            trs
        } else {
            trs * Mat4::new_translation(&-self.origin)
        }
    }

    /// Overwrite the local TRS from a matrix (origin is reset)
    pub(crate) fn set_local_matrix(&mut self, matrix: &Mat4) {
        let decomposed = MathTransform::from_matrix(matrix);
        self.position = decomposed.position;
        self.rotation = decomposed.rotation;
        self.scale = decomposed.scale;
        self.origin = Vec3::zeros();
    }
}

/// Transform factory for creating common transform configurations
pub struct TransformFactory;

impl TransformFactory {
    /// Transform at `position` whose -Z axis points at `target`
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> TransformComponent {
        let forward = target - position;
        let rotation = if forward.norm_squared() < 1e-12 {
            Quat::identity()
        } else {
            // face_towards aligns +Z, so aim it away from the target
            Quat::face_towards(&-forward, &up)
        };
        TransformComponent::from_position(position).with_rotation(rotation)
    }

    /// Directional light transform whose -Z axis points along `direction`
    pub fn directional_light(direction: Vec3) -> TransformComponent {
        let up = if direction.cross(&Vec3::y()).norm_squared() < 1e-6 {
            Vec3::z()
        } else {
            Vec3::y()
        };
        Self::look_at(Vec3::zeros(), direction, up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::foundation::math::Point3;

    #[test]
    fn test_origin_acts_as_pivot() {
        let transform = TransformComponent::from_position(Vec3::new(5.0, 0.0, 0.0))
            .with_uniform_scale(2.0)
            .with_origin(Vec3::new(1.0, 0.0, 0.0));

        let pivot = transform.local_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(pivot, Point3::new(5.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_look_at_points_negative_z_at_target() {
        let transform = TransformFactory::look_at(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::zeros(),
            Vec3::y(),
        );
        let forward = transform.rotation() * -Vec3::z();

        assert_relative_eq!(forward, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }
}

//! # Camera component
//!
//! A camera owns its projection and one [`CameraPass`] per render
//! configuration. Each pass carries the matrices and frustum used for culling
//! plus the draw lists renderers build for it every frame.
//!
//! ## Passes
//! - **Final**: the regular view.
//! - **Reflection**: the view mirrored about the reflection plane, with the
//!   winding flipped (front faces culled) and the plane as clip plane.
//! - **Refraction**: shares the Final pass storage (same view, same draw
//!   lists) and only differs in clip-plane polarity.
//!
//! ## Coordinate System
//! Right-handed, Y-up view space looking down -Z; GL clip space.

use std::any::TypeId;
use std::collections::HashMap;

use crate::ecs::{Component, Entity};
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3, Vec4};
use crate::render::culling::{Frustum, Plane};
use crate::render::device::Face;
use crate::render::RenderFlags;

/// Render configuration selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraPassId {
    /// Regular view
    Final,
    /// Mirrored view for planar reflections
    Reflection,
    /// Regular view clipped to the far side of the reflection plane
    Refraction,
}

impl CameraPassId {
    /// Index into the pass storage; Refraction aliases Final
    const fn storage_index(self) -> usize {
        match self {
            Self::Final | Self::Refraction => 0,
            Self::Reflection => 1,
        }
    }
}

/// Projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
        /// Width / height
        aspect: f32,
        /// Near plane distance
        near: f32,
        /// Far plane distance
        far: f32,
    },
    /// Orthographic projection
    Orthographic {
        /// Left plane
        left: f32,
        /// Right plane
        right: f32,
        /// Bottom plane
        bottom: f32,
        /// Top plane
        top: f32,
        /// Near plane distance
        near: f32,
        /// Far plane distance
        far: f32,
    },
}

impl Projection {
    /// Build the GL-style projection matrix
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Self::Perspective { fov_y, aspect, near, far } => Mat4::perspective(fov_y, aspect, near, far),
            Self::Orthographic { left, right, bottom, top, near, far } => {
                Mat4::orthographic(left, right, bottom, top, near, far)
            }
        }
    }
}

/// Visible entity and the submesh material slots to draw for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawItem {
    /// Entity to draw
    pub entity: Entity,
    /// Material slots whose submeshes passed the per-submesh tests; may be empty
    pub materials: Vec<usize>,
}

/// Ordered visible set for one renderer in one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawList {
    items: Vec<DrawItem>,
}

impl DrawList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append in visit order
    pub fn push(&mut self, entity: Entity, materials: Vec<usize>) {
        self.items.push(DrawItem { entity, materials });
    }

    /// Items in insertion order
    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    /// Whether `entity` made it into the list
    pub fn contains(&self, entity: Entity) -> bool {
        self.items.iter().any(|item| item.entity == entity)
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is visible
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Matrices, culling state and draw lists of one pass
#[derive(Debug, Clone)]
pub struct CameraPass {
    view: Mat4,
    projection: Mat4,
    view_projection: Mat4,
    position: Vec3,
    frustum: Frustum,
    cull_face: Face,
    cull_mask: RenderFlags,
    draw_lists: HashMap<TypeId, DrawList>,
}

impl CameraPass {
    fn new(projection: Mat4, cull_face: Face, cull_mask: RenderFlags) -> Self {
        Self {
            view: Mat4::identity(),
            projection,
            view_projection: projection,
            position: Vec3::zeros(),
            frustum: Frustum::from_matrix(&projection),
            cull_face,
            cull_mask,
            draw_lists: HashMap::new(),
        }
    }

    fn update(&mut self, view: Mat4, position: Vec3) {
        self.view = view;
        self.position = position;
        self.view_projection = self.projection * view;
        self.frustum = Frustum::from_matrix(&self.view_projection);
    }

    fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
        self.view_projection = projection * self.view;
        self.frustum = Frustum::from_matrix(&self.view_projection);
    }

    /// World to camera
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// Projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Projection * view
    pub fn view_projection(&self) -> &Mat4 {
        &self.view_projection
    }

    /// Eye position in world space
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Culling frustum in world space
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Winding rejected by opaque draws in this pass
    pub fn cull_face(&self) -> Face {
        self.cull_face
    }

    /// Model render flags this pass accepts
    pub fn cull_mask(&self) -> RenderFlags {
        self.cull_mask
    }

    /// Draw list built by renderer `R` (empty if it has not built one)
    pub fn draw_list<R: 'static>(&self) -> &[DrawItem] {
        self.draw_lists
            .get(&TypeId::of::<R>())
            .map_or(&[][..], DrawList::items)
    }

    /// Replace renderer `R`'s draw list
    pub fn set_draw_list<R: 'static>(&mut self, list: DrawList) {
        self.draw_lists.insert(TypeId::of::<R>(), list);
    }

    /// Drop every draw list (lists never persist across frames)
    pub fn clear_draw_lists(&mut self) {
        for list in self.draw_lists.values_mut() {
            list.items.clear();
        }
    }
}

/// Camera component
#[derive(Debug, Clone)]
pub struct CameraComponent {
    projection: Projection,
    passes: [CameraPass; 2],
    reflection_plane: Option<Plane>,
    clear_colour: Vec4,
}

impl Component for CameraComponent {}

impl Default for CameraComponent {
    fn default() -> Self {
        Self::perspective(utils::deg_to_rad(60.0), 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl CameraComponent {
    /// Create a perspective camera
    ///
    /// # Arguments
    /// * `fov_y` - Vertical field of view in radians
    /// * `aspect` - Width / height of the viewport
    /// * `near` - Distance to the near plane (must be > 0)
    /// * `far` - Distance to the far plane (must be > near)
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let projection = Projection::Perspective { fov_y, aspect, near, far };
        let matrix = projection.matrix();
        Self {
            projection,
            passes: [
                CameraPass::new(matrix, Face::Back, RenderFlags::FINAL),
                CameraPass::new(matrix, Face::Front, RenderFlags::REFLECTION),
            ],
            reflection_plane: None,
            clear_colour: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }

    /// Create an orthographic camera
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let mut camera = Self::default();
        camera.set_orthographic(left, right, bottom, top, near, far);
        camera
    }

    /// Switch to a perspective projection
    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.set_projection(Projection::Perspective { fov_y, aspect, near, far });
    }

    /// Switch to an orthographic projection
    pub fn set_orthographic(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.set_projection(Projection::Orthographic { left, right, bottom, top, near, far });
    }

    /// Update the aspect ratio of a perspective camera after a viewport resize
    ///
    /// Orthographic cameras ignore the call; their extents are explicit.
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if let Projection::Perspective { fov_y, aspect: old, near, far } = self.projection {
            if (old - aspect).abs() > 0.01 {
                log::info!("Camera aspect ratio changed: {old:.3} -> {aspect:.3}");
            }
            self.set_perspective(fov_y, aspect, near, far);
        }
    }

    fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        let matrix = projection.matrix();
        for pass in &mut self.passes {
            pass.set_projection(matrix);
        }
    }

    /// Projection parameters
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Projection matrix shared by every pass
    pub fn projection_matrix(&self) -> &Mat4 {
        self.passes[0].projection()
    }

    /// Pass data; Refraction returns the Final pass
    pub fn pass(&self, id: CameraPassId) -> &CameraPass {
        &self.passes[id.storage_index()]
    }

    /// Mutable pass data; Refraction returns the Final pass
    pub fn pass_mut(&mut self, id: CameraPassId) -> &mut CameraPass {
        &mut self.passes[id.storage_index()]
    }

    /// Set (or clear) the world-space reflection plane
    ///
    /// The plane's positive side is the visible, reflected side.
    pub fn set_reflection_plane(&mut self, plane: Option<Plane>) {
        self.reflection_plane = plane;
    }

    /// Current reflection plane
    pub fn reflection_plane(&self) -> Option<Plane> {
        self.reflection_plane
    }

    /// Whether the Reflection pass has anything to render
    pub fn has_reflection(&self) -> bool {
        self.reflection_plane.is_some()
    }

    /// Passes whose storage needs draw lists this frame
    pub fn active_passes(&self) -> impl Iterator<Item = CameraPassId> {
        let reflection = self.has_reflection().then_some(CameraPassId::Reflection);
        std::iter::once(CameraPassId::Final).chain(reflection)
    }

    /// Clip plane for a pass as packed coefficients
    ///
    /// Final clips nothing (all-zero plane keeps every fragment); Reflection
    /// keeps the reflected side; Refraction keeps the opposite side.
    pub fn clip_plane(&self, id: CameraPassId) -> Vec4 {
        match (id, self.reflection_plane) {
            (CameraPassId::Final, _) | (_, None) => Vec4::zeros(),
            (CameraPassId::Reflection, Some(plane)) => plane.to_vec4(),
            (CameraPassId::Refraction, Some(plane)) => plane.flipped().to_vec4(),
        }
    }

    /// Colour used when clearing the camera's target
    pub fn clear_colour(&self) -> Vec4 {
        self.clear_colour
    }

    /// Builder: clear colour
    #[must_use]
    pub fn with_clear_colour(mut self, colour: Vec4) -> Self {
        self.clear_colour = colour;
        self
    }

    /// Refresh per-pass view, view-projection and frustum from the camera's
    /// world transform
    pub fn update_passes(&mut self, world: &Mat4) {
        let view = world.inverse_or_identity();
        let position = utils::translation(world);
        self.passes[0].update(view, position);

        if let Some(plane) = self.reflection_plane {
            let mirror = Mat4::reflection(&plane.to_vec4());
            let mirrored_position = mirror.transform_point(&position.into()).coords;
            self.passes[1].update(view * mirror, mirrored_position);
        }
    }

    /// Clear draw lists of every pass
    pub fn clear_draw_lists(&mut self) {
        for pass in &mut self.passes {
            pass.clear_draw_lists();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Marker;

    #[test]
    fn test_perspective_round_trip() {
        let (fov, aspect, near, far) = (1.1_f32, 1.6_f32, 0.25_f32, 300.0_f32);
        let mut camera = CameraComponent::default();
        camera.set_perspective(fov, aspect, near, far);

        assert_eq!(*camera.pass(CameraPassId::Final).projection(), Mat4::new_perspective(aspect, fov, near, far));
        assert_eq!(camera.projection_matrix(), camera.pass(CameraPassId::Reflection).projection());
    }

    #[test]
    fn test_refraction_aliases_final_pass() {
        let mut camera = CameraComponent::default();
        let entity = crate::ecs::World::new().create_entity();
        let mut list = DrawList::new();
        list.push(entity, vec![0]);
        camera.pass_mut(CameraPassId::Final).set_draw_list::<Marker>(list);

        assert_eq!(camera.pass(CameraPassId::Refraction).draw_list::<Marker>().len(), 1);
        assert!(camera.pass(CameraPassId::Reflection).draw_list::<Marker>().is_empty());
    }

    #[test]
    fn test_clip_plane_polarity() {
        let mut camera = CameraComponent::default();
        let water = Plane::from_point_normal(Vec3::zeros(), Vec3::y());
        camera.set_reflection_plane(Some(water));

        assert_eq!(camera.clip_plane(CameraPassId::Final), Vec4::zeros());
        assert_relative_eq!(camera.clip_plane(CameraPassId::Reflection), Vec4::new(0.0, 1.0, 0.0, 0.0));
        assert_relative_eq!(camera.clip_plane(CameraPassId::Refraction), Vec4::new(0.0, -1.0, 0.0, 0.0));
    }

    #[test]
    fn test_reflection_pass_mirrors_eye_and_flips_winding() {
        let mut camera = CameraComponent::default();
        camera.set_reflection_plane(Some(Plane::from_point_normal(Vec3::zeros(), Vec3::y())));
        camera.update_passes(&Mat4::new_translation(&Vec3::new(0.0, 3.0, 10.0)));

        let reflection = camera.pass(CameraPassId::Reflection);
        assert_relative_eq!(reflection.position(), Vec3::new(0.0, -3.0, 10.0), epsilon = 1e-6);
        assert_eq!(reflection.cull_face(), Face::Front);
        assert_eq!(camera.pass(CameraPassId::Final).cull_face(), Face::Back);
        assert_eq!(camera.active_passes().count(), 2);
    }

    #[test]
    fn test_view_is_inverse_world() {
        let mut camera = CameraComponent::default();
        let world = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        camera.update_passes(&world);

        assert_relative_eq!(camera.pass(CameraPassId::Final).view() * world, Mat4::identity(), epsilon = 1e-6);
    }
}

//! Model component: a mesh with one material per submesh
//!
//! Attribute bindings are resolved once when a material is assigned, so the
//! renderers only enable precomputed (index, size, offset) triples per draw.

use std::rc::Rc;

use crate::ecs::Component;
use crate::render::binding::BoundMaterial;
use crate::render::material::Material;
use crate::render::mesh::{MeshData, ResourceResult};
use crate::render::RenderFlags;

/// Component for entities drawn by the model and shadow renderers
#[derive(Debug, Clone)]
pub struct ModelComponent {
    mesh: Rc<MeshData>,
    materials: Vec<BoundMaterial>,
    shadow_materials: Vec<Option<BoundMaterial>>,
    submesh_visible: Vec<bool>,
    flags: RenderFlags,
}

impl Component for ModelComponent {}

impl ModelComponent {
    /// Create a model, substituting [`Material::fallback`] for missing slots
    ///
    /// # Errors
    /// Returns the mesh validation error (also logged) if the mesh cannot be
    /// drawn; callers keep the entity model-less or use a placeholder mesh.
    pub fn new(mesh: Rc<MeshData>, materials: Vec<Rc<Material>>) -> ResourceResult<Self> {
        if let Err(error) = mesh.validate() {
            log::warn!("Rejecting model mesh: {error}");
            return Err(error);
        }

        let submesh_count = mesh.submeshes.len();
        if materials.len() < submesh_count {
            log::warn!(
                "Model has {} materials for {submesh_count} submeshes, using fallback for the rest",
                materials.len()
            );
        } else if materials.len() > submesh_count {
            log::debug!("Ignoring {} surplus materials", materials.len() - submesh_count);
        }

        let fallback = Rc::new(Material::fallback());
        let bound = (0..submesh_count)
            .map(|slot| {
                let material = materials.get(slot).cloned().unwrap_or_else(|| Rc::clone(&fallback));
                BoundMaterial::resolve(material, &mesh)
            })
            .collect();

        Ok(Self {
            materials: bound,
            shadow_materials: vec![None; submesh_count],
            submesh_visible: vec![true; submesh_count],
            flags: RenderFlags::default(),
            mesh,
        })
    }

    /// Builder: pass participation flags
    #[must_use]
    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builder: shadow material for a slot
    #[must_use]
    pub fn with_shadow_material(mut self, slot: usize, material: Rc<Material>) -> Self {
        self.set_shadow_material(slot, Some(material));
        self
    }

    /// Shared mesh
    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    /// Number of submesh/material slots
    pub fn slot_count(&self) -> usize {
        self.materials.len()
    }

    /// Bound material of a slot
    pub fn material(&self, slot: usize) -> Option<&BoundMaterial> {
        self.materials.get(slot)
    }

    /// Bound shadow material of a slot, if the slot casts shadows
    pub fn shadow_material(&self, slot: usize) -> Option<&BoundMaterial> {
        self.shadow_materials.get(slot).and_then(Option::as_ref)
    }

    /// Replace the material of a slot, resolving its attribute bindings
    pub fn set_material(&mut self, slot: usize, material: Rc<Material>) {
        match self.materials.get_mut(slot) {
            Some(bound) => *bound = BoundMaterial::resolve(material, &self.mesh),
            None => log::warn!("set_material: slot {slot} out of range ({})", self.materials.len()),
        }
    }

    /// Set or clear the shadow material of a slot
    pub fn set_shadow_material(&mut self, slot: usize, material: Option<Rc<Material>>) {
        let mesh = &self.mesh;
        match self.shadow_materials.get_mut(slot) {
            Some(bound) => *bound = material.map(|m| BoundMaterial::resolve(m, mesh)),
            None => log::warn!("set_shadow_material: slot {slot} out of range"),
        }
    }

    /// Per-submesh visibility toggle
    pub fn set_submesh_visible(&mut self, slot: usize, visible: bool) {
        if let Some(flag) = self.submesh_visible.get_mut(slot) {
            *flag = visible;
        }
    }

    /// Whether a submesh takes part in culling at all
    pub fn is_submesh_visible(&self, slot: usize) -> bool {
        self.submesh_visible.get(slot).copied().unwrap_or(false)
    }

    /// Pass participation flags
    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    /// Set pass participation flags
    pub fn set_flags(&mut self, flags: RenderFlags) {
        self.flags = flags;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::culling::AABB;
    use crate::render::device::{BufferId, ShaderId};
    use crate::render::mesh::{SubMesh, VertexAttribute, VertexAttributeKind};

    fn two_part_mesh() -> Rc<MeshData> {
        Rc::new(MeshData {
            vertex_buffer: BufferId(1),
            stride: 12,
            vertex_count: 8,
            attributes: vec![VertexAttribute { kind: VertexAttributeKind::Position, size: 3, offset: 0 }],
            submeshes: vec![SubMesh::triangles(BufferId(2), 6), SubMesh::triangles(BufferId(3), 6)],
            bounds: AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)),
        })
    }

    #[test]
    fn test_missing_materials_use_fallback() {
        let lit = Rc::new(Material::new("lit", ShaderId(7)));
        let model = ModelComponent::new(two_part_mesh(), vec![lit]).unwrap();

        assert_eq!(model.slot_count(), 2);
        assert_eq!(model.material(0).unwrap().material.shader, ShaderId(7));
        assert_eq!(model.material(1).unwrap().material.name, "fallback");
        assert_eq!(model.material(1).unwrap().attributes.len(), 1);
    }

    #[test]
    fn test_invalid_mesh_is_reported() {
        let mut mesh = (*two_part_mesh()).clone();
        mesh.vertex_count = 0;
        assert!(ModelComponent::new(Rc::new(mesh), Vec::new()).is_err());
    }

    #[test]
    fn test_shadow_materials_are_optional_per_slot() {
        let depth = Rc::new(Material::new("depth", ShaderId(9)));
        let model = ModelComponent::new(two_part_mesh(), Vec::new())
            .unwrap()
            .with_shadow_material(1, depth);

        assert!(model.shadow_material(0).is_none());
        assert_eq!(model.shadow_material(1).unwrap().material.shader, ShaderId(9));
    }
}

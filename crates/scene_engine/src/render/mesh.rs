//! Mesh data consumed by the renderers
//!
//! Meshes are created and owned by the resource collaborator; the renderers
//! only bind the handles stored here and never create or destroy buffers.

use thiserror::Error;

use super::culling::AABB;
use super::device::{BufferId, IndexFormat, Primitive};

/// Semantic of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexAttributeKind {
    /// Object-space position
    Position,
    /// Object-space normal
    Normal,
    /// Texture coordinate set 0
    TexCoord,
    /// Tangent
    Tangent,
    /// Vertex colour
    Colour,
    /// Skinning bone indices
    BoneIndices,
    /// Skinning bone weights
    BoneWeights,
}

/// Layout of one attribute inside the interleaved vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Semantic
    pub kind: VertexAttributeKind,
    /// Component count (1-4)
    pub size: u32,
    /// Byte offset inside a vertex
    pub offset: u32,
}

/// One indexed draw range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubMesh {
    /// Index buffer handle
    pub index_buffer: BufferId,
    /// Number of indices
    pub index_count: u32,
    /// Index element type
    pub format: IndexFormat,
    /// Topology
    pub primitive: Primitive,
    /// Object-space bounds of this range; `None` means "use the mesh bounds"
    pub bounds: Option<AABB>,
}

impl SubMesh {
    /// Triangle-list submesh with 16-bit indices
    pub fn triangles(index_buffer: BufferId, index_count: u32) -> Self {
        Self {
            index_buffer,
            index_count,
            format: IndexFormat::U16,
            primitive: Primitive::Triangles,
            bounds: None,
        }
    }

    /// Builder: per-submesh bounds
    #[must_use]
    pub fn with_bounds(mut self, bounds: AABB) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// GPU-resident mesh description
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Shared interleaved vertex buffer
    pub vertex_buffer: BufferId,
    /// Byte stride of one vertex
    pub stride: u32,
    /// Number of vertices in the buffer
    pub vertex_count: u32,
    /// Interleaved attribute layout
    pub attributes: Vec<VertexAttribute>,
    /// Draw ranges, one per material slot
    pub submeshes: Vec<SubMesh>,
    /// Object-space bounds of the whole mesh
    pub bounds: AABB,
}

/// Resource validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The mesh has no vertices or a zero stride
    #[error("Mesh has no vertex data: {0}")]
    EmptyVertexData(String),

    /// The mesh has no draw ranges
    #[error("Mesh has no submeshes")]
    NoSubmeshes,

    /// A draw range has no indices
    #[error("Submesh {0} has no indices")]
    EmptySubmesh(usize),

    /// An attribute does not fit inside the vertex stride
    #[error("Attribute {kind:?} at offset {offset} exceeds stride {stride}")]
    AttributeOutOfBounds {
        /// Attribute semantic
        kind: VertexAttributeKind,
        /// Attribute byte offset
        offset: u32,
        /// Vertex stride
        stride: u32,
    },

    /// The bounding box is inverted
    #[error("Mesh bounds are inverted")]
    InvalidBounds,

    /// Skeleton frame data is malformed
    #[error("Invalid skeleton: {0}")]
    InvalidSkeleton(String),
}

/// Result type for resource operations
pub type ResourceResult<T> = Result<T, ResourceError>;

impl MeshData {
    /// Byte size of one float attribute component
    const COMPONENT_SIZE: u32 = 4;

    /// Layout entry for `kind`, if the mesh provides it
    pub fn attribute(&self, kind: VertexAttributeKind) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|attribute| attribute.kind == kind)
    }

    /// Bounds of submesh `index`, falling back to the whole-mesh bounds
    pub fn submesh_bounds(&self, index: usize) -> AABB {
        self.submeshes
            .get(index)
            .and_then(|submesh| submesh.bounds)
            .unwrap_or(self.bounds)
    }

    /// Reject meshes that cannot be drawn
    ///
    /// # Errors
    /// Returns a [`ResourceError`] describing the first problem found.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.vertex_count == 0 || self.stride == 0 {
            return Err(ResourceError::EmptyVertexData(format!(
                "{} vertices with stride {}",
                self.vertex_count, self.stride
            )));
        }
        if self.submeshes.is_empty() {
            return Err(ResourceError::NoSubmeshes);
        }
        if let Some(index) = self.submeshes.iter().position(|s| s.index_count == 0) {
            return Err(ResourceError::EmptySubmesh(index));
        }
        for attribute in &self.attributes {
            if attribute.offset + attribute.size * Self::COMPONENT_SIZE > self.stride {
                return Err(ResourceError::AttributeOutOfBounds {
                    kind: attribute.kind,
                    offset: attribute.offset,
                    stride: self.stride,
                });
            }
        }
        if !self.bounds.is_valid() {
            return Err(ResourceError::InvalidBounds);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    fn cube() -> MeshData {
        MeshData {
            vertex_buffer: BufferId(1),
            stride: 32,
            vertex_count: 24,
            attributes: vec![
                VertexAttribute { kind: VertexAttributeKind::Position, size: 3, offset: 0 },
                VertexAttribute { kind: VertexAttributeKind::Normal, size: 3, offset: 12 },
                VertexAttribute { kind: VertexAttributeKind::TexCoord, size: 2, offset: 24 },
            ],
            submeshes: vec![SubMesh::triangles(BufferId(2), 36)],
            bounds: AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)),
        }
    }

    #[test]
    fn test_valid_mesh_passes() {
        assert_eq!(cube().validate(), Ok(()));
    }

    #[test]
    fn test_zero_length_data_is_rejected() {
        let mut mesh = cube();
        mesh.vertex_count = 0;
        assert!(matches!(mesh.validate(), Err(ResourceError::EmptyVertexData(_))));

        let mut mesh = cube();
        mesh.submeshes.push(SubMesh::triangles(BufferId(3), 0));
        assert_eq!(mesh.validate(), Err(ResourceError::EmptySubmesh(1)));
    }

    #[test]
    fn test_attribute_past_stride_is_rejected() {
        let mut mesh = cube();
        mesh.stride = 24;
        assert!(matches!(
            mesh.validate(),
            Err(ResourceError::AttributeOutOfBounds { kind: VertexAttributeKind::TexCoord, .. })
        ));
    }
}

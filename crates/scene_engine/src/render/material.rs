//! Material system for rendering
//!
//! A material pairs a shader program with the locations of the engine's
//! built-in uniforms, the vertex attributes it consumes, a blend mode and a
//! list of per-material properties (textures and constants).

use std::collections::{BTreeMap, HashMap};

use super::device::{ShaderId, TextureId, UniformLocation};
use super::mesh::VertexAttributeKind;
use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Fixed-function blending policy of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Opaque
    #[default]
    None,
    /// Alpha blending, no depth writes, no culling
    Alpha,
    /// Additive accumulation, back faces rendered
    Additive,
    /// Multiplicative tinting
    Multiply,
}

/// Uniforms the renderers fill in per draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinUniform {
    /// View * world
    WorldView,
    /// Camera projection
    Projection,
    /// Object to world
    World,
    /// World to camera
    View,
    /// Projection * view
    ViewProjection,
    /// Inverse-transpose of the world 3x3 block
    NormalMatrix,
    /// Camera position in world space
    CameraPosition,
    /// Pass clip plane (a, b, c, d)
    ClipPlane,
    /// Sun projection * sun view
    SunlightViewProjection,
    /// Shadow depth texture sampler
    ShadowMap,
    /// Bone palette
    Skinning,
    /// Light colour (light volumes)
    LightColour,
    /// Light falloff radius (light volumes)
    LightRadius,
    /// Light position in world space (light volumes)
    LightPosition,
    /// Position source buffer sampler (light volumes)
    PositionBuffer,
    /// Normal source buffer sampler (light volumes)
    NormalBuffer,
    /// Target size in pixels (light volumes)
    ScreenSize,
}

/// Per-material uniform value
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialProperty {
    /// Sampler bound to the next free texture unit
    Texture(UniformLocation, TextureId),
    /// Scalar constant
    Float(UniformLocation, f32),
    /// 3-component constant
    Vec3(UniformLocation, Vec3),
    /// 4-component constant
    Vec4(UniformLocation, Vec4),
    /// Matrix constant
    Mat4(UniformLocation, Mat4),
}

/// Material description for one submesh
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Debug name
    pub name: String,
    /// Linked program
    pub shader: ShaderId,
    /// Locations of built-in uniforms in `shader`
    pub uniforms: HashMap<BuiltinUniform, UniformLocation>,
    /// Shader attribute index for each vertex attribute kind consumed
    pub attribute_map: BTreeMap<VertexAttributeKind, u32>,
    /// Blending policy
    pub blend_mode: BlendMode,
    /// Material constants and textures
    pub properties: Vec<MaterialProperty>,
}

impl Material {
    /// Create a material with no uniforms, attributes or properties
    pub fn new(name: impl Into<String>, shader: ShaderId) -> Self {
        Self {
            name: name.into(),
            shader,
            uniforms: HashMap::new(),
            attribute_map: BTreeMap::new(),
            blend_mode: BlendMode::None,
            properties: Vec::new(),
        }
    }

    /// Substitute used when a model lacks a material for a submesh
    ///
    /// Uses program 0 and consumes positions only; embedders are expected to
    /// keep a flat-colour program at that id.
    pub fn fallback() -> Self {
        Self::new("fallback", ShaderId(0))
            .with_uniform(BuiltinUniform::WorldView, UniformLocation(0))
            .with_uniform(BuiltinUniform::Projection, UniformLocation(1))
            .with_attribute(VertexAttributeKind::Position, 0)
    }

    /// Builder: location of a built-in uniform
    #[must_use]
    pub fn with_uniform(mut self, uniform: BuiltinUniform, location: UniformLocation) -> Self {
        self.uniforms.insert(uniform, location);
        self
    }

    /// Builder: consume a vertex attribute at a shader attribute index
    #[must_use]
    pub fn with_attribute(mut self, kind: VertexAttributeKind, index: u32) -> Self {
        self.attribute_map.insert(kind, index);
        self
    }

    /// Builder: blending policy
    #[must_use]
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// Builder: append a property
    #[must_use]
    pub fn with_property(mut self, property: MaterialProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Location of a built-in uniform, inactive if the shader does not use it
    pub fn uniform(&self, uniform: BuiltinUniform) -> UniformLocation {
        self.uniforms.get(&uniform).copied().unwrap_or(UniformLocation::INACTIVE)
    }

    /// Number of texture units the property list consumes
    pub fn texture_count(&self) -> usize {
        self.properties
            .iter()
            .filter(|property| matches!(property, MaterialProperty::Texture(..)))
            .count()
    }
}

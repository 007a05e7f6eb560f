//! Material binding and fixed-function state policy
//!
//! Shared by every renderer so the per-draw protocol is identical:
//! program, built-in uniforms, material properties, blend state, attributes,
//! index buffer, draw, then attributes and index buffer are unbound again.

use std::rc::Rc;

use super::device::{
    AttributeBinding, BlendEquation, BlendFactor, Capability, Face, GraphicsDevice, TextureId,
    UniformValue,
};
use super::material::{BlendMode, BuiltinUniform, Material, MaterialProperty};
use super::mesh::{MeshData, SubMesh};
use crate::foundation::math::{Mat3, Mat4, Vec3, Vec4};
use crate::gl_check;

/// A material with its attribute bindings resolved against one mesh
#[derive(Debug, Clone, PartialEq)]
pub struct BoundMaterial {
    /// Shared material description
    pub material: Rc<Material>,
    /// Attribute arrays to enable for each draw
    pub attributes: Vec<AttributeBinding>,
}

impl BoundMaterial {
    /// Resolve `material`'s attribute map against `mesh`'s vertex layout
    ///
    /// Attributes the shader wants but the mesh lacks are skipped with a warning.
    pub fn resolve(material: Rc<Material>, mesh: &MeshData) -> Self {
        let attributes = material
            .attribute_map
            .iter()
            .filter_map(|(&kind, &index)| match mesh.attribute(kind) {
                Some(layout) => Some(AttributeBinding {
                    index,
                    size: layout.size,
                    stride: mesh.stride,
                    offset: layout.offset,
                }),
                None => {
                    log::warn!("Material '{}' expects {kind:?} which the mesh lacks", material.name);
                    None
                }
            })
            .collect();

        Self { material, attributes }
    }
}

/// Per-render-call values shared by every draw
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUniforms {
    /// World to camera
    pub view: Mat4,
    /// Camera projection
    pub projection: Mat4,
    /// Projection * view
    pub view_projection: Mat4,
    /// Camera world position
    pub camera_position: Vec3,
    /// Pass clip plane
    pub clip_plane: Vec4,
    /// Sun projection * sun view
    pub sun_view_projection: Mat4,
    /// Shadow depth texture, once the shadow pass has produced one
    pub shadow_map: Option<TextureId>,
}

/// Per-entity matrices
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectUniforms {
    /// Object to world
    pub world: Mat4,
    /// View * world
    pub world_view: Mat4,
    /// Inverse-transpose of the world 3x3 block
    pub normal: Mat3,
}

impl ObjectUniforms {
    /// Derive the per-entity matrices from a world matrix
    pub fn new(world: Mat4, view: &Mat4) -> Self {
        Self {
            world_view: view * world,
            normal: crate::foundation::math::utils::normal_matrix(&world),
            world,
        }
    }
}

/// Set a built-in uniform if the material's shader uses it
pub fn set_builtin(
    device: &mut dyn GraphicsDevice,
    material: &Material,
    uniform: BuiltinUniform,
    value: UniformValue<'_>,
) {
    let location = material.uniform(uniform);
    if location.is_active() {
        gl_check!(device, set_uniform(location, value));
    }
}

/// Upload the built-in per-draw uniforms
pub fn apply_builtin_uniforms(
    device: &mut dyn GraphicsDevice,
    material: &Material,
    frame: &FrameUniforms,
    object: &ObjectUniforms,
    skinning: Option<&[Mat4]>,
) {
    set_builtin(device, material, BuiltinUniform::WorldView, UniformValue::Mat4(object.world_view));
    set_builtin(device, material, BuiltinUniform::Projection, UniformValue::Mat4(frame.projection));
    set_builtin(device, material, BuiltinUniform::World, UniformValue::Mat4(object.world));
    set_builtin(device, material, BuiltinUniform::View, UniformValue::Mat4(frame.view));
    set_builtin(device, material, BuiltinUniform::ViewProjection, UniformValue::Mat4(frame.view_projection));
    set_builtin(device, material, BuiltinUniform::NormalMatrix, UniformValue::Mat3(object.normal));
    set_builtin(device, material, BuiltinUniform::CameraPosition, UniformValue::Vec3(frame.camera_position));
    set_builtin(device, material, BuiltinUniform::ClipPlane, UniformValue::Vec4(frame.clip_plane));
    set_builtin(
        device,
        material,
        BuiltinUniform::SunlightViewProjection,
        UniformValue::Mat4(frame.sun_view_projection),
    );
    if let Some(palette) = skinning {
        set_builtin(device, material, BuiltinUniform::Skinning, UniformValue::Mat4Array(palette));
    }
}

/// Bind material properties; textures take sequential units from 0 on every
/// call. Returns the first unit left free.
pub fn apply_properties(device: &mut dyn GraphicsDevice, material: &Material) -> u32 {
    let mut unit = 0;
    for property in &material.properties {
        let (location, value) = match *property {
            MaterialProperty::Texture(location, texture) => {
                gl_check!(device, bind_texture(unit, Some(texture)));
                let sampler = UniformValue::Int(i32::try_from(unit).unwrap_or(i32::MAX));
                unit += 1;
                (location, sampler)
            }
            MaterialProperty::Float(location, value) => (location, UniformValue::Float(value)),
            MaterialProperty::Vec3(location, value) => (location, UniformValue::Vec3(value)),
            MaterialProperty::Vec4(location, value) => (location, UniformValue::Vec4(value)),
            MaterialProperty::Mat4(location, value) => (location, UniformValue::Mat4(value)),
        };
        if location.is_active() {
            gl_check!(device, set_uniform(location, value));
        }
    }
    unit
}

/// Bind the shadow map sampler on `unit`, if the shader samples it
pub fn apply_shadow_map(
    device: &mut dyn GraphicsDevice,
    material: &Material,
    shadow_map: Option<TextureId>,
    unit: u32,
) {
    let location = material.uniform(BuiltinUniform::ShadowMap);
    if let (true, Some(texture)) = (location.is_active(), shadow_map) {
        gl_check!(device, bind_texture(unit, Some(texture)));
        gl_check!(
            device,
            set_uniform(location, UniformValue::Int(i32::try_from(unit).unwrap_or(i32::MAX)))
        );
    }
}

/// Fixed-function state for a blend mode
///
/// | Mode     | Depth test | Depth write | Cull            | Blend func              |
/// |----------|------------|-------------|-----------------|-------------------------|
/// | None     | on         | on          | pass cull face  | off                     |
/// | Alpha    | on         | off         | off             | SrcAlpha, 1 - SrcAlpha  |
/// | Additive | on         | on          | front faces     | One, One                |
/// | Multiply | on         | on          | pass cull face  | DstColour, Zero         |
pub fn apply_blend_mode(device: &mut dyn GraphicsDevice, mode: BlendMode, pass_cull_face: Face) {
    gl_check!(device, set_capability(Capability::DepthTest, true));
    match mode {
        BlendMode::None => {
            gl_check!(device, set_depth_mask(true));
            gl_check!(device, set_capability(Capability::CullFace, true));
            gl_check!(device, set_cull_face(pass_cull_face));
            gl_check!(device, set_capability(Capability::Blend, false));
        }
        BlendMode::Alpha => {
            gl_check!(device, set_depth_mask(false));
            gl_check!(device, set_capability(Capability::CullFace, false));
            enable_blending(device, BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        }
        BlendMode::Additive => {
            gl_check!(device, set_depth_mask(true));
            gl_check!(device, set_capability(Capability::CullFace, true));
            gl_check!(device, set_cull_face(Face::Front));
            enable_blending(device, BlendFactor::One, BlendFactor::One);
        }
        BlendMode::Multiply => {
            gl_check!(device, set_depth_mask(true));
            gl_check!(device, set_capability(Capability::CullFace, true));
            gl_check!(device, set_cull_face(pass_cull_face));
            enable_blending(device, BlendFactor::DstColour, BlendFactor::Zero);
        }
    }
}

fn enable_blending(device: &mut dyn GraphicsDevice, source: BlendFactor, destination: BlendFactor) {
    gl_check!(device, set_capability(Capability::Blend, true));
    gl_check!(device, set_blend_func(source, destination));
    gl_check!(device, set_blend_equation(BlendEquation::Add));
}

/// Enable attributes, draw one submesh, then disable everything that was enabled
pub fn draw_submesh(device: &mut dyn GraphicsDevice, attributes: &[AttributeBinding], submesh: &SubMesh) {
    for &binding in attributes {
        gl_check!(device, enable_vertex_attribute(binding));
    }
    gl_check!(device, bind_index_buffer(Some(submesh.index_buffer)));
    gl_check!(device, draw_elements(submesh.primitive, submesh.index_count, submesh.format));
    for binding in attributes {
        gl_check!(device, disable_vertex_attribute(binding.index));
    }
    gl_check!(device, bind_index_buffer(None));
}

/// How fixed-function state is chosen for a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    /// Apply the material's blend mode, using the pass cull face where the
    /// policy defers to it
    Material(Face),
    /// Keep whatever state the caller set up
    Fixed,
}

/// Full per-submaterial protocol: program, built-in uniforms, properties,
/// blend state, then the attribute-wrapped draw
pub fn draw_with_material(
    device: &mut dyn GraphicsDevice,
    bound: &BoundMaterial,
    submesh: &SubMesh,
    frame: &FrameUniforms,
    object: &ObjectUniforms,
    skinning: Option<&[Mat4]>,
    state: DrawState,
) {
    let material = bound.material.as_ref();
    gl_check!(device, use_program(Some(material.shader)));
    apply_builtin_uniforms(device, material, frame, object, skinning);
    let next_unit = apply_properties(device, material);
    apply_shadow_map(device, material, frame.shadow_map, next_unit);
    if let DrawState::Material(pass_cull_face) = state {
        apply_blend_mode(device, material.blend_mode, pass_cull_face);
    }
    draw_submesh(device, &bound.attributes, submesh);
}

/// Return to the baseline state every renderer starts from
pub fn restore_baseline(device: &mut dyn GraphicsDevice) {
    gl_check!(device, bind_index_buffer(None));
    gl_check!(device, bind_vertex_buffer(None));
    gl_check!(device, use_program(None));
    gl_check!(device, set_capability(Capability::Blend, false));
    gl_check!(device, set_capability(Capability::CullFace, false));
    gl_check!(device, set_capability(Capability::DepthTest, false));
    gl_check!(device, set_depth_mask(true));
}

//! State-tracking device that records every call
//!
//! Used headless by the demo binary and as the observation point for tests:
//! each indexed draw captures a [`DrawSnapshot`] of the fixed-function state
//! in effect at that moment.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use super::{
    AttributeBinding, BlendEquation, BlendFactor, BufferId, Capability, ClearMask, DeviceError,
    DeviceResult, Face, FramebufferId, GraphicsDevice, IndexFormat, Primitive, RenderTarget,
    RenderTargetDesc, ShaderId, TextureId, UniformLocation, UniformValue,
};
use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Owned copy of a uniform upload
#[derive(Debug, Clone, PartialEq)]
pub enum UniformData {
    /// Integer
    Int(i32),
    /// Scalar
    Float(f32),
    /// 2-component vector
    Vec2(Vec2),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 3x3 matrix
    Mat3(Mat3),
    /// 4x4 matrix
    Mat4(Mat4),
    /// Matrix array
    Mat4Array(Vec<Mat4>),
}

impl From<UniformValue<'_>> for UniformData {
    fn from(value: UniformValue<'_>) -> Self {
        match value {
            UniformValue::Int(v) => Self::Int(v),
            UniformValue::Float(v) => Self::Float(v),
            UniformValue::Vec2(v) => Self::Vec2(v),
            UniformValue::Vec3(v) => Self::Vec3(v),
            UniformValue::Vec4(v) => Self::Vec4(v),
            UniformValue::Mat3(v) => Self::Mat3(v),
            UniformValue::Mat4(v) => Self::Mat4(v),
            UniformValue::Mat4Array(v) => Self::Mat4Array(v.to_vec()),
        }
    }
}

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// `use_program`
    UseProgram(Option<ShaderId>),
    /// `set_uniform`
    SetUniform(UniformLocation, UniformData),
    /// `bind_texture`
    BindTexture(u32, Option<TextureId>),
    /// `bind_vertex_buffer`
    BindVertexBuffer(Option<BufferId>),
    /// `bind_index_buffer`
    BindIndexBuffer(Option<BufferId>),
    /// `enable_vertex_attribute`
    EnableAttribute(AttributeBinding),
    /// `disable_vertex_attribute`
    DisableAttribute(u32),
    /// `draw_elements`
    DrawElements(Primitive, u32, IndexFormat),
    /// `set_capability`
    SetCapability(Capability, bool),
    /// `set_depth_mask`
    SetDepthMask(bool),
    /// `set_cull_face`
    SetCullFace(Face),
    /// `set_blend_func`
    SetBlendFunc(BlendFactor, BlendFactor),
    /// `set_blend_equation`
    SetBlendEquation(BlendEquation),
    /// `bind_render_target`
    BindRenderTarget(Option<FramebufferId>),
    /// `set_viewport`
    SetViewport(i32, i32, u32, u32),
    /// `clear`
    Clear(ClearMask),
    /// `create_render_target`
    CreateRenderTarget(FramebufferId),
    /// `destroy_render_target`
    DestroyRenderTarget(FramebufferId),
}

/// Fixed-function state captured at an indexed draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawSnapshot {
    /// Bound program
    pub program: Option<ShaderId>,
    /// Bound vertex buffer
    pub vertex_buffer: Option<BufferId>,
    /// Bound index buffer
    pub index_buffer: Option<BufferId>,
    /// Enabled attribute indices
    pub attributes: BTreeSet<u32>,
    /// Texture units in use
    pub textures: BTreeMap<u32, TextureId>,
    /// Depth test enabled
    pub depth_test: bool,
    /// Depth writes enabled
    pub depth_write: bool,
    /// Face culling enabled
    pub cull_enabled: bool,
    /// Culled winding
    pub cull_face: Face,
    /// Blending enabled
    pub blend_enabled: bool,
    /// Source and destination blend factors
    pub blend_func: (BlendFactor, BlendFactor),
    /// Blend equation
    pub blend_equation: BlendEquation,
    /// Bound framebuffer, `None` for the default one
    pub target: Option<FramebufferId>,
    /// Uniforms set on the bound program
    pub uniforms: HashMap<UniformLocation, UniformData>,
    /// Index count
    pub count: u32,
}

/// Recording graphics device
#[derive(Debug)]
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
    draws: Vec<DrawSnapshot>,
    capabilities: BTreeSet<Capability>,
    depth_write: bool,
    cull_face: Face,
    blend_func: (BlendFactor, BlendFactor),
    blend_equation: BlendEquation,
    program: Option<ShaderId>,
    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    attributes: BTreeSet<u32>,
    textures: BTreeMap<u32, TextureId>,
    target: Option<FramebufferId>,
    uniforms: HashMap<(Option<ShaderId>, UniformLocation), UniformData>,
    errors: VecDeque<DeviceError>,
    next_handle: u32,
    live_targets: BTreeSet<u32>,
    fail_allocations: bool,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    /// Device in the GL default state
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            draws: Vec::new(),
            capabilities: BTreeSet::new(),
            depth_write: true,
            cull_face: Face::Back,
            blend_func: (BlendFactor::One, BlendFactor::Zero),
            blend_equation: BlendEquation::Add,
            program: None,
            vertex_buffer: None,
            index_buffer: None,
            attributes: BTreeSet::new(),
            textures: BTreeMap::new(),
            target: None,
            uniforms: HashMap::new(),
            errors: VecDeque::new(),
            next_handle: 1,
            live_targets: BTreeSet::new(),
            fail_allocations: false,
        }
    }

    /// Every call in issue order
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// State snapshots of every indexed draw
    pub fn draws(&self) -> &[DrawSnapshot] {
        &self.draws
    }

    /// Forget recorded calls and draws, keeping the current state
    pub fn clear_log(&mut self) {
        self.calls.clear();
        self.draws.clear();
    }

    /// Whether a capability is currently enabled
    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Current depth write flag
    pub fn depth_write(&self) -> bool {
        self.depth_write
    }

    /// Currently culled winding
    pub fn cull_face(&self) -> Face {
        self.cull_face
    }

    /// Current blend factors
    pub fn blend_func(&self) -> (BlendFactor, BlendFactor) {
        self.blend_func
    }

    /// Bound program
    pub fn program(&self) -> Option<ShaderId> {
        self.program
    }

    /// Bound vertex buffer
    pub fn vertex_buffer(&self) -> Option<BufferId> {
        self.vertex_buffer
    }

    /// Bound index buffer
    pub fn index_buffer(&self) -> Option<BufferId> {
        self.index_buffer
    }

    /// Enabled attribute indices
    pub fn enabled_attributes(&self) -> &BTreeSet<u32> {
        &self.attributes
    }

    /// Bound framebuffer
    pub fn bound_target(&self) -> Option<FramebufferId> {
        self.target
    }

    /// Number of live off-screen targets
    pub fn live_target_count(&self) -> usize {
        self.live_targets.len()
    }

    /// Make subsequent `create_render_target` calls fail
    pub fn fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Queue an error as if the backend had raised it
    pub fn inject_error(&mut self, error: DeviceError) {
        self.errors.push_back(error);
    }

    fn next_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn invalid(&mut self, what: &str) {
        self.errors.push_back(DeviceError::InvalidOperation(what.to_string()));
    }
}

impl GraphicsDevice for RecordingDevice {
    fn use_program(&mut self, program: Option<ShaderId>) {
        self.program = program;
        self.calls.push(DeviceCall::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>) {
        if self.program.is_none() {
            self.invalid("set_uniform without a bound program");
        }
        let data = UniformData::from(value);
        self.uniforms.insert((self.program, location), data.clone());
        self.calls.push(DeviceCall::SetUniform(location, data));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(texture) => self.textures.insert(unit, texture),
            None => self.textures.remove(&unit),
        };
        self.calls.push(DeviceCall::BindTexture(unit, texture));
    }

    fn bind_vertex_buffer(&mut self, buffer: Option<BufferId>) {
        self.vertex_buffer = buffer;
        self.calls.push(DeviceCall::BindVertexBuffer(buffer));
    }

    fn bind_index_buffer(&mut self, buffer: Option<BufferId>) {
        self.index_buffer = buffer;
        self.calls.push(DeviceCall::BindIndexBuffer(buffer));
    }

    fn enable_vertex_attribute(&mut self, binding: AttributeBinding) {
        if self.vertex_buffer.is_none() {
            self.invalid("enable_vertex_attribute without a bound vertex buffer");
        }
        self.attributes.insert(binding.index);
        self.calls.push(DeviceCall::EnableAttribute(binding));
    }

    fn disable_vertex_attribute(&mut self, index: u32) {
        self.attributes.remove(&index);
        self.calls.push(DeviceCall::DisableAttribute(index));
    }

    fn draw_elements(&mut self, primitive: Primitive, count: u32, format: IndexFormat) {
        if self.program.is_none() || self.index_buffer.is_none() {
            self.invalid("draw_elements without program or index buffer");
        }
        let uniforms = self
            .uniforms
            .iter()
            .filter(|((program, _), _)| *program == self.program)
            .map(|((_, location), data)| (*location, data.clone()))
            .collect();

        self.draws.push(DrawSnapshot {
            program: self.program,
            vertex_buffer: self.vertex_buffer,
            index_buffer: self.index_buffer,
            attributes: self.attributes.clone(),
            textures: self.textures.clone(),
            depth_test: self.is_enabled(Capability::DepthTest),
            depth_write: self.depth_write,
            cull_enabled: self.is_enabled(Capability::CullFace),
            cull_face: self.cull_face,
            blend_enabled: self.is_enabled(Capability::Blend),
            blend_func: self.blend_func,
            blend_equation: self.blend_equation,
            target: self.target,
            uniforms,
            count,
        });
        self.calls.push(DeviceCall::DrawElements(primitive, count, format));
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.capabilities.insert(capability);
        } else {
            self.capabilities.remove(&capability);
        }
        self.calls.push(DeviceCall::SetCapability(capability, enabled));
    }

    fn set_depth_mask(&mut self, write: bool) {
        self.depth_write = write;
        self.calls.push(DeviceCall::SetDepthMask(write));
    }

    fn set_cull_face(&mut self, face: Face) {
        self.cull_face = face;
        self.calls.push(DeviceCall::SetCullFace(face));
    }

    fn set_blend_func(&mut self, source: BlendFactor, destination: BlendFactor) {
        self.blend_func = (source, destination);
        self.calls.push(DeviceCall::SetBlendFunc(source, destination));
    }

    fn set_blend_equation(&mut self, equation: BlendEquation) {
        self.blend_equation = equation;
        self.calls.push(DeviceCall::SetBlendEquation(equation));
    }

    fn bind_render_target(&mut self, target: Option<&RenderTarget>) {
        let framebuffer = target.map(|t| t.framebuffer);
        if let Some(framebuffer) = framebuffer {
            if !self.live_targets.contains(&framebuffer.0) {
                self.invalid("bind_render_target with a destroyed framebuffer");
            }
        }
        self.target = framebuffer;
        self.calls.push(DeviceCall::BindRenderTarget(framebuffer));
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.calls.push(DeviceCall::SetViewport(x, y, width, height));
    }

    fn clear(&mut self, mask: ClearMask, _colour: Vec4) {
        self.calls.push(DeviceCall::Clear(mask));
    }

    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> DeviceResult<RenderTarget> {
        if self.fail_allocations {
            return Err(DeviceError::OutOfMemory);
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::TargetAllocation(format!(
                "zero-sized target {}x{}",
                desc.width, desc.height
            )));
        }

        let framebuffer = FramebufferId(self.next_handle());
        let colour = desc.colour.then(|| TextureId(self.next_handle()));
        let depth = desc.depth.then(|| TextureId(self.next_handle()));
        self.live_targets.insert(framebuffer.0);
        self.calls.push(DeviceCall::CreateRenderTarget(framebuffer));

        Ok(RenderTarget {
            framebuffer,
            colour,
            depth,
            width: desc.width,
            height: desc.height,
            samples: desc.samples,
        })
    }

    fn destroy_render_target(&mut self, target: RenderTarget) {
        self.live_targets.remove(&target.framebuffer.0);
        if self.target == Some(target.framebuffer) {
            self.target = None;
        }
        self.calls.push(DeviceCall::DestroyRenderTarget(target.framebuffer));
    }

    fn poll_error(&mut self) -> Option<DeviceError> {
        self.errors.pop_front()
    }
}

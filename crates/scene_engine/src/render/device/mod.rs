//! Graphics device abstraction
//!
//! The renderers talk to an immediate-mode, GL-style device through the
//! [`GraphicsDevice`] trait. Embedders supply a real implementation; the
//! crate ships [`RecordingDevice`] which tracks fixed-function state and
//! records every call for the demo and the tests.

pub mod recording;

pub use recording::{DeviceCall, DrawSnapshot, RecordingDevice};

use bitflags::bitflags;
use thiserror::Error;

use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Vertex or index buffer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Linked shader program handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

/// Texture handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Framebuffer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

/// Shader uniform location; negative locations are inactive and skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

impl UniformLocation {
    /// Location reported for uniforms the shader does not use
    pub const INACTIVE: Self = Self(-1);

    /// Whether the shader actually uses this uniform
    pub const fn is_active(self) -> bool {
        self.0 >= 0
    }
}

/// Toggleable fixed-function state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Depth testing
    DepthTest,
    /// Colour blending
    Blend,
    /// Face culling
    CullFace,
}

/// Polygon winding selector for culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum Face {
    /// Front faces
    Front,
    /// Back faces
    #[default]
    Back,
}

/// Blend factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    One,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination colour
    DstColour,
}

/// Blend equations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    /// src + dst
    Add,
    /// src - dst
    Subtract,
    /// dst - src
    ReverseSubtract,
}

/// Primitive topology for indexed draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Primitive {
    /// Triangle list
    #[default]
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Line list
    Lines,
    /// Point list
    Points,
}

/// Index element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit indices
    #[default]
    U16,
    /// 32-bit indices
    U32,
}

bitflags! {
    /// Buffers cleared by [`GraphicsDevice::clear`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        /// Colour attachment
        const COLOUR = 1 << 0;
        /// Depth attachment
        const DEPTH = 1 << 1;
    }
}

/// Uniform payloads
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue<'a> {
    /// Integer (also used for sampler units)
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
    /// Matrix array, e.g. a skinning palette
    Mat4Array(&'a [Mat4]),
}

/// One enabled vertex attribute array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeBinding {
    /// Shader attribute index
    pub index: u32,
    /// Component count
    pub size: u32,
    /// Byte stride between vertices
    pub stride: u32,
    /// Byte offset inside a vertex
    pub offset: u32,
}

/// Off-screen render target creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// MSAA sample count, 0 or 1 for none
    pub samples: u32,
    /// Whether to attach a colour texture
    pub colour: bool,
    /// Whether to attach a depth texture
    pub depth: bool,
}

/// Allocated off-screen render target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// Framebuffer object
    pub framebuffer: FramebufferId,
    /// Colour attachment
    pub colour: Option<TextureId>,
    /// Depth attachment
    pub depth: Option<TextureId>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// MSAA sample count
    pub samples: u32,
}

/// Device errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Render target could not be allocated
    #[error("Render target allocation failed: {0}")]
    TargetAllocation(String),

    /// Invalid enum/value passed to the backend
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Backend ran out of memory
    #[error("Out of device memory")]
    OutOfMemory,
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Immediate-mode graphics backend
///
/// Every call mutates a single logical rendering context; nothing is
/// buffered or reordered.
pub trait GraphicsDevice {
    /// Bind a shader program, or unbind with `None`
    fn use_program(&mut self, program: Option<ShaderId>);

    /// Set a uniform on the bound program
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue<'_>);

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    /// Bind the vertex buffer
    fn bind_vertex_buffer(&mut self, buffer: Option<BufferId>);

    /// Bind the index buffer
    fn bind_index_buffer(&mut self, buffer: Option<BufferId>);

    /// Enable a vertex attribute array sourced from the bound vertex buffer
    fn enable_vertex_attribute(&mut self, binding: AttributeBinding);

    /// Disable a vertex attribute array
    fn disable_vertex_attribute(&mut self, index: u32);

    /// Indexed draw from the bound index buffer
    fn draw_elements(&mut self, primitive: Primitive, count: u32, format: IndexFormat);

    /// Toggle fixed-function state
    fn set_capability(&mut self, capability: Capability, enabled: bool);

    /// Enable or disable depth writes
    fn set_depth_mask(&mut self, write: bool);

    /// Select which winding is culled
    fn set_cull_face(&mut self, face: Face);

    /// Blend factors
    fn set_blend_func(&mut self, source: BlendFactor, destination: BlendFactor);

    /// Blend equation
    fn set_blend_equation(&mut self, equation: BlendEquation);

    /// Bind an off-screen target, or the default framebuffer with `None`
    fn bind_render_target(&mut self, target: Option<&RenderTarget>);

    /// Set the viewport rectangle
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Clear attachments of the bound target
    fn clear(&mut self, mask: ClearMask, colour: Vec4);

    /// Allocate an off-screen target
    ///
    /// # Errors
    /// Returns [`DeviceError`] if the backend cannot allocate the attachments.
    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> DeviceResult<RenderTarget>;

    /// Release an off-screen target
    fn destroy_render_target(&mut self, target: RenderTarget);

    /// Pop the oldest pending backend error
    fn poll_error(&mut self) -> Option<DeviceError>;
}

/// Drain pending device errors, logging each against the call that raised it
pub fn report_errors<D: GraphicsDevice + ?Sized>(device: &mut D, call: &str, file: &str, line: u32) -> usize {
    let mut count = 0;
    while let Some(error) = device.poll_error() {
        log::error!("{file}:{line}: `{call}` failed: {error}");
        count += 1;
    }
    count
}

/// Checked device call
///
/// `gl_check!(device, use_program(Some(shader)))` issues the call and, in
/// debug builds only, drains and logs any errors the backend raised.
#[macro_export]
macro_rules! gl_check {
    ($device:expr, $method:ident ( $($arg:expr),* $(,)? )) => {{
        let result = $device.$method($($arg),*);
        if cfg!(debug_assertions) {
            $crate::render::device::report_errors(
                &mut *$device,
                stringify!($method($($arg),*)),
                file!(),
                line!(),
            );
        }
        result
    }};
}

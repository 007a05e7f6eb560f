//! Rendering pipeline
//!
//! Renderers are ECS systems with the [`Renderable`] capability. Each frame
//! the scene asks every renderable to rebuild its draw list for each active
//! camera pass, then calls `render` on them in fixed stage order:
//! shadow, light volume, world, overlay.

pub mod binding;
pub mod culling;
pub mod device;
pub mod light_volume;
pub mod material;
pub mod mesh;
pub mod model_renderer;
pub mod shadow_map_renderer;

pub use binding::BoundMaterial;
pub use culling::{Frustum, Plane, AABB};
pub use device::{GraphicsDevice, RecordingDevice, RenderTarget};
pub use light_volume::{LightVolumeSystem, LightVolumeState, SourceBuffer};
pub use material::{BlendMode, BuiltinUniform, Material, MaterialProperty};
pub use mesh::{MeshData, ResourceError, SubMesh, VertexAttribute, VertexAttributeKind};
pub use model_renderer::ModelRenderer;
pub use shadow_map_renderer::ShadowMapRenderer;

use bitflags::bitflags;

use crate::ecs::components::CameraPassId;
use crate::ecs::{Entity, World};
use crate::scene::SceneLighting;

bitflags! {
    /// Which camera passes a model takes part in; each pass accepts one flag
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderFlags: u32 {
        /// Regular view (and refraction, which shares it)
        const FINAL = 1 << 0;
        /// Mirrored reflection view
        const REFLECTION = 1 << 1;
    }
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// Fixed render order; renderables are stably sorted by stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderStage {
    /// Shadow depth maps
    Shadow,
    /// Screen-space light accumulation
    LightVolume,
    /// Main scene geometry
    World,
    /// UI and debug overlays
    Overlay,
}

/// Everything a renderable needs for one `render` call
pub struct RenderContext<'a> {
    /// Entity storage (read-only while rendering)
    pub world: &'a World,
    /// Camera entity being rendered
    pub camera: Entity,
    /// Pass being rendered
    pub pass: CameraPassId,
    /// Backend
    pub device: &'a mut dyn GraphicsDevice,
    /// Scene-owned lighting state shared between the shadow and main passes
    pub lighting: &'a mut SceneLighting,
    /// Target the caller bound, `None` for the default framebuffer
    pub target: Option<RenderTarget>,
    /// Viewport size of the caller's target, restored by off-screen passes
    pub viewport: (u32, u32),
    /// Draw calls issued so far this frame
    pub draw_calls: u32,
}

/// Rendering capability of a system
pub trait Renderable {
    /// Stage this renderable runs in
    fn render_stage(&self) -> RenderStage;

    /// Rebuild this renderable's draw list for one pass of `camera` from the
    /// system's matching `entities`
    fn update_draw_list(&mut self, world: &mut World, camera: Entity, pass: CameraPassId, entities: &[Entity]);

    /// Issue draw calls for the current draw list of `ctx.pass`
    fn render(&mut self, ctx: &mut RenderContext<'_>);
}

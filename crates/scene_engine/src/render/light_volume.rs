//! Screen-space light volumes
//!
//! Point lights are accumulated into an off-screen buffer by drawing a sphere
//! proxy per light. The proxy shader reconstructs surface positions and
//! normals from the position and normal source buffers, so the system only
//! becomes usable once both sources and the target exist:
//!
//! ```text
//! Idle --(both sources set + target allocated)--> Ready
//! ```
//!
//! Resizing or changing the sample count reallocates the target and the
//! system stays Ready; a failed allocation drops back to Idle.

use std::rc::Rc;

use crate::config::LightVolumeConfig;
use crate::ecs::components::{CameraComponent, CameraPassId, DrawList, LightVolumeComponent, TransformComponent};
use crate::ecs::world::misuse;
use crate::ecs::{ComponentMask, Entity, System, World};
use crate::foundation::math::{utils, Mat4, Vec2, Vec3, Vec4};
use crate::gl_check;
use crate::render::binding::{
    apply_builtin_uniforms, apply_properties, draw_submesh, restore_baseline, set_builtin, BoundMaterial,
    FrameUniforms, ObjectUniforms,
};
use crate::render::device::{
    BlendEquation, BlendFactor, Capability, ClearMask, DeviceResult, Face, GraphicsDevice, RenderTarget,
    RenderTargetDesc, TextureId, UniformValue,
};
use crate::render::material::{BuiltinUniform, Material};
use crate::render::mesh::MeshData;
use crate::render::{RenderContext, RenderStage, Renderable};

/// Which geometry buffer a source texture provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceBuffer {
    /// View or world-space positions
    Position,
    /// Surface normals
    Normal,
}

/// Readiness of the light buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightVolumeState {
    /// Sources or target missing
    Idle,
    /// `update_buffer` can render
    Ready,
}

/// Accumulates [`LightVolumeComponent`] lights into an off-screen buffer
#[derive(Debug)]
pub struct LightVolumeSystem {
    signature: ComponentMask,
    proxy_mesh: Option<Rc<MeshData>>,
    proxy_material: Option<BoundMaterial>,
    position_source: Option<TextureId>,
    normal_source: Option<TextureId>,
    target_size: (u32, u32),
    downscale: u32,
    samples: u32,
    target: Option<RenderTarget>,
    state: LightVolumeState,
    lights_drawn: u32,
}

impl Default for LightVolumeSystem {
    fn default() -> Self {
        Self::new(&LightVolumeConfig::default())
    }
}

impl LightVolumeSystem {
    /// Create an idle system
    pub fn new(config: &LightVolumeConfig) -> Self {
        Self {
            signature: ComponentMask::new()
                .with::<TransformComponent>()
                .with::<LightVolumeComponent>(),
            proxy_mesh: None,
            proxy_material: None,
            position_source: None,
            normal_source: None,
            target_size: (0, 0),
            downscale: config.downscale.max(1),
            samples: config.samples,
            target: None,
            state: LightVolumeState::Idle,
            lights_drawn: 0,
        }
    }

    /// Unit sphere mesh and the shader used to shade it
    pub fn with_proxy(mut self, mesh: Rc<MeshData>, material: Rc<Material>) -> Self {
        self.set_proxy(mesh, material);
        self
    }

    /// Replace the sphere proxy
    pub fn set_proxy(&mut self, mesh: Rc<MeshData>, material: Rc<Material>) {
        self.proxy_material = Some(BoundMaterial::resolve(material, &mesh));
        self.proxy_mesh = Some(mesh);
    }

    /// Set one of the geometry source textures
    pub fn set_source_buffer(&mut self, texture: TextureId, source: SourceBuffer) {
        match source {
            SourceBuffer::Position => self.position_source = Some(texture),
            SourceBuffer::Normal => self.normal_source = Some(texture),
        }
        self.refresh_state();
    }

    /// Size the buffer to `size / downscale` and (re)allocate it
    ///
    /// # Errors
    /// Returns the device error if the target cannot be allocated; the system
    /// is then Idle.
    pub fn set_target_size(
        &mut self,
        device: &mut dyn GraphicsDevice,
        size: (u32, u32),
        downscale: u32,
    ) -> DeviceResult<()> {
        self.target_size = size;
        self.downscale = downscale.max(1);
        self.reallocate(device)
    }

    /// Change the MSAA sample count, reallocating an existing target
    ///
    /// # Errors
    /// Returns the device error if reallocation fails.
    pub fn set_multi_samples(&mut self, device: &mut dyn GraphicsDevice, samples: u32) -> DeviceResult<()> {
        if samples == self.samples {
            return Ok(());
        }
        self.samples = samples;
        if self.target.is_some() {
            self.reallocate(device)
        } else {
            Ok(())
        }
    }

    /// Current state
    pub fn state(&self) -> LightVolumeState {
        self.state
    }

    /// Accumulated light texture
    pub fn buffer(&self) -> Option<TextureId> {
        self.target.and_then(|target| target.colour)
    }

    /// Buffer dimensions after downscaling
    pub fn buffer_size(&self) -> (u32, u32) {
        (self.target_size.0 / self.downscale, self.target_size.1 / self.downscale)
    }

    /// Lights drawn by the last `update_buffer`
    pub fn lights_drawn(&self) -> u32 {
        self.lights_drawn
    }

    /// Release the target and return to Idle
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(target) = self.target.take() {
            gl_check!(device, destroy_render_target(target));
        }
        self.refresh_state();
    }

    /// Render every visible light of `camera`'s Final pass into the buffer
    ///
    /// Leaves the default framebuffer bound. Returns `false` (with a warning)
    /// when the system is not Ready.
    pub fn update_buffer(&mut self, world: &World, camera: Entity, device: &mut dyn GraphicsDevice) -> bool {
        self.lights_drawn = 0;
        let (Some(target), LightVolumeState::Ready) = (self.target, self.state) else {
            log::warn!("Light volume buffer update while {:?}", self.state);
            return false;
        };
        let (Some(mesh), Some(proxy)) = (self.proxy_mesh.as_deref(), self.proxy_material.as_ref()) else {
            log::warn!("Light volume buffer update without a sphere proxy");
            return false;
        };
        let Some(camera_component) = world.get_component::<CameraComponent>(camera) else {
            misuse!("update_buffer with {camera:?} which has no camera");
            return false;
        };
        let pass = camera_component.pass(CameraPassId::Final);

        gl_check!(device, bind_render_target(Some(&target)));
        gl_check!(device, set_viewport(0, 0, target.width, target.height));
        gl_check!(device, clear(ClearMask::COLOUR, Vec4::zeros()));

        let frame = FrameUniforms {
            view: *pass.view(),
            projection: *pass.projection(),
            view_projection: *pass.view_projection(),
            camera_position: pass.position(),
            clip_plane: Vec4::zeros(),
            sun_view_projection: Mat4::identity(),
            shadow_map: None,
        };
        #[allow(clippy::cast_precision_loss)]
        let screen_size = Vec2::new(target.width as f32, target.height as f32);
        let material = proxy.material.as_ref();

        gl_check!(device, set_capability(Capability::DepthTest, false));
        gl_check!(device, set_depth_mask(false));
        gl_check!(device, set_capability(Capability::CullFace, true));
        gl_check!(device, set_cull_face(Face::Front));
        gl_check!(device, set_capability(Capability::Blend, true));
        gl_check!(device, set_blend_func(BlendFactor::One, BlendFactor::One));
        gl_check!(device, set_blend_equation(BlendEquation::Add));
        gl_check!(device, bind_vertex_buffer(Some(mesh.vertex_buffer)));

        for item in pass.draw_list::<Self>() {
            let Some(light) = world.get_component::<LightVolumeComponent>(item.entity) else {
                continue;
            };
            let light_world = world.world_transform(item.entity);
            let object = ObjectUniforms::new(
                light_world * Mat4::new_scaling(light.radius),
                &frame.view,
            );

            gl_check!(device, use_program(Some(material.shader)));
            apply_builtin_uniforms(device, material, &frame, &object, None);
            let unit = apply_properties(device, material);
            self.bind_sources(device, material, unit);
            set_builtin(device, material, BuiltinUniform::LightColour, UniformValue::Vec3(light.colour * light.intensity));
            set_builtin(device, material, BuiltinUniform::LightRadius, UniformValue::Float(light.radius));
            set_builtin(
                device,
                material,
                BuiltinUniform::LightPosition,
                UniformValue::Vec3(utils::translation(&light_world)),
            );
            set_builtin(device, material, BuiltinUniform::ScreenSize, UniformValue::Vec2(screen_size));

            for submesh in &mesh.submeshes {
                draw_submesh(device, &proxy.attributes, submesh);
            }
            self.lights_drawn += 1;
        }

        restore_baseline(device);
        gl_check!(device, bind_render_target(None));
        log::trace!("Light volumes: {} drawn", self.lights_drawn);
        true
    }

    fn bind_sources(&self, device: &mut dyn GraphicsDevice, material: &Material, first_unit: u32) {
        let sources = [
            (BuiltinUniform::PositionBuffer, self.position_source),
            (BuiltinUniform::NormalBuffer, self.normal_source),
        ];
        for (unit, (uniform, texture)) in (first_unit..).zip(sources) {
            gl_check!(device, bind_texture(unit, texture));
            set_builtin(device, material, uniform, UniformValue::Int(i32::try_from(unit).unwrap_or(i32::MAX)));
        }
    }

    fn reallocate(&mut self, device: &mut dyn GraphicsDevice) -> DeviceResult<()> {
        if let Some(old) = self.target.take() {
            gl_check!(device, destroy_render_target(old));
        }

        let (width, height) = self.buffer_size();
        let desc = RenderTargetDesc {
            width,
            height,
            samples: self.samples,
            colour: true,
            depth: false,
        };
        let result = device.create_render_target(&desc);
        match &result {
            Ok(target) => {
                log::debug!("Light buffer {width}x{height}, {} samples", self.samples);
                self.target = Some(*target);
            }
            Err(error) => log::warn!("Light buffer allocation failed: {error}"),
        }
        self.refresh_state();
        result.map(|_| ())
    }

    fn refresh_state(&mut self) {
        let ready = self.position_source.is_some() && self.normal_source.is_some() && self.target.is_some();
        let state = if ready { LightVolumeState::Ready } else { LightVolumeState::Idle };
        if state != self.state {
            log::debug!("Light volume system {:?} -> {state:?}", self.state);
            self.state = state;
        }
    }
}

impl System for LightVolumeSystem {
    fn name(&self) -> &'static str {
        "LightVolumeSystem"
    }

    fn signature(&self) -> ComponentMask {
        self.signature
    }

    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        Some(self)
    }
}

impl Renderable for LightVolumeSystem {
    fn render_stage(&self) -> RenderStage {
        RenderStage::LightVolume
    }

    fn update_draw_list(&mut self, world: &mut World, camera: Entity, pass: CameraPassId, entities: &[Entity]) {
        if pass != CameraPassId::Final {
            return;
        }
        let Some(camera_component) = world.get_component::<CameraComponent>(camera) else {
            misuse!("update_draw_list on {camera:?} which has no camera");
            return;
        };
        let frustum = camera_component.pass(pass).frustum().clone();

        let mut list = DrawList::new();
        for &entity in entities {
            let Some(light) = world.get_component::<LightVolumeComponent>(entity) else {
                continue;
            };
            if !light.enabled || light.radius <= 0.0 {
                continue;
            }
            let center: Vec3 = utils::translation(&world.world_transform(entity));
            if frustum.intersects_sphere(center, light.radius) {
                list.push(entity, Vec::new());
            }
        }

        world.component_mut::<CameraComponent>(camera).pass_mut(pass).set_draw_list::<Self>(list);
    }

    fn render(&mut self, ctx: &mut RenderContext<'_>) {
        if ctx.pass != CameraPassId::Final || self.state != LightVolumeState::Ready {
            return;
        }
        if self.update_buffer(ctx.world, ctx.camera, ctx.device) {
            ctx.draw_calls += self.lights_drawn;
            let (width, height) = ctx.viewport;
            gl_check!(ctx.device, bind_render_target(ctx.target.as_ref()));
            gl_check!(ctx.device, set_viewport(0, 0, width, height));
        }
    }
}

//! Sun shadow map renderer
//!
//! Renders shadow-casting models into a depth-only target from the sun's
//! point of view and publishes the light view-projection and depth texture
//! through [`SceneLighting`](crate::scene::SceneLighting) for the world stage.
//!
//! Visibility is not computed against the light frustum: the caster list is
//! the Final pass [`ModelRenderer`] list filtered to shadow casters, so casters
//! outside the camera view do not cast.

use crate::config::ShadowConfig;
use crate::ecs::components::{
    CameraComponent, CameraPassId, DrawList, ModelComponent, ShadowCasterComponent, SkeletonComponent,
    TransformComponent,
};
use crate::ecs::world::misuse;
use crate::ecs::{ComponentMask, Entity, System, World};
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3, Vec4};
use crate::gl_check;
use crate::render::binding::{draw_with_material, restore_baseline, DrawState, FrameUniforms, ObjectUniforms};
use crate::render::device::{
    Capability, ClearMask, Face, GraphicsDevice, RenderTarget, RenderTargetDesc, TextureId,
};
use crate::render::model_renderer::ModelRenderer;
use crate::render::{RenderContext, RenderStage, Renderable};

/// Depth-only shadow pass for the scene sun
#[derive(Debug)]
pub struct ShadowMapRenderer {
    signature: ComponentMask,
    map_size: u32,
    offset: Vec3,
    projection: Mat4,
    target: Option<RenderTarget>,
    resize_pending: bool,
    allocation_failed: bool,
}

impl Default for ShadowMapRenderer {
    fn default() -> Self {
        Self::new(&ShadowConfig::default())
    }
}

impl ShadowMapRenderer {
    /// Create the renderer; the depth target is allocated on first render
    pub fn new(config: &ShadowConfig) -> Self {
        let extent = config.extent;
        Self {
            signature: ComponentMask::new()
                .with::<TransformComponent>()
                .with::<ModelComponent>()
                .with::<ShadowCasterComponent>(),
            map_size: config.map_size,
            offset: config.offset,
            projection: Mat4::orthographic(-extent, extent, -extent, extent, config.near, config.far),
            target: None,
            resize_pending: false,
            allocation_failed: false,
        }
    }

    /// Depth map edge length
    pub fn map_size(&self) -> u32 {
        self.map_size
    }

    /// Change the depth map size; the target is reallocated on the next render
    pub fn set_map_size(&mut self, size: u32) {
        if size != self.map_size {
            log::info!("Shadow map size {} -> {size}", self.map_size);
            self.map_size = size;
            self.resize_pending = true;
        }
    }

    /// Light eye offset in the sun's local frame
    pub fn set_offset(&mut self, offset: Vec3) {
        self.offset = offset;
    }

    /// Light projection
    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    /// Light projection
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Depth texture, once allocated
    pub fn shadow_map(&self) -> Option<TextureId> {
        self.target.and_then(|target| target.depth)
    }

    /// Sun view-projection for a sun world matrix
    pub fn light_view_projection(&self, sun_world: &Mat4) -> Mat4 {
        self.projection * self.light_view(sun_world).1
    }

    /// Light eye placement and the view matrix derived from it
    fn light_view(&self, sun_world: &Mat4) -> (Mat4, Mat4) {
        let eye = sun_world * Mat4::new_translation(&self.offset);
        (eye, eye.inverse_or_identity())
    }

    /// Release the depth target
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(target) = self.target.take() {
            gl_check!(device, destroy_render_target(target));
        }
    }

    fn ensure_target(&mut self, device: &mut dyn GraphicsDevice) -> Option<RenderTarget> {
        if self.resize_pending {
            self.release(device);
            self.resize_pending = false;
            self.allocation_failed = false;
        }
        if self.target.is_some() || self.allocation_failed {
            return self.target;
        }

        let desc = RenderTargetDesc {
            width: self.map_size,
            height: self.map_size,
            samples: 0,
            colour: false,
            depth: true,
        };
        match device.create_render_target(&desc) {
            Ok(target) => {
                log::debug!("Allocated {0}x{0} shadow map", self.map_size);
                self.target = Some(target);
            }
            Err(error) => {
                log::warn!("Shadow map allocation failed, shadows disabled: {error}");
                self.allocation_failed = true;
            }
        }
        self.target
    }
}

impl System for ShadowMapRenderer {
    fn name(&self) -> &'static str {
        "ShadowMapRenderer"
    }

    fn signature(&self) -> ComponentMask {
        self.signature
    }

    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        Some(self)
    }
}

impl Renderable for ShadowMapRenderer {
    fn render_stage(&self) -> RenderStage {
        RenderStage::Shadow
    }

    fn update_draw_list(&mut self, world: &mut World, camera: Entity, pass: CameraPassId, _entities: &[Entity]) {
        if pass != CameraPassId::Final {
            return;
        }
        let Some(camera_component) = world.get_component::<CameraComponent>(camera) else {
            misuse!("update_draw_list on {camera:?} which has no camera");
            return;
        };

        let mut list = DrawList::new();
        for item in camera_component.pass(pass).draw_list::<ModelRenderer>() {
            if !world.has_component::<ShadowCasterComponent>(item.entity) {
                continue;
            }
            let Some(model) = world.get_component::<ModelComponent>(item.entity) else {
                continue;
            };
            let materials = item
                .materials
                .iter()
                .copied()
                .filter(|&slot| model.shadow_material(slot).is_some())
                .collect();
            list.push(item.entity, materials);
        }

        log::trace!("ShadowMapRenderer: {} casters", list.len());
        world.component_mut::<CameraComponent>(camera).pass_mut(pass).set_draw_list::<Self>(list);
    }

    fn render(&mut self, ctx: &mut RenderContext<'_>) {
        if ctx.pass != CameraPassId::Final {
            return;
        }
        let world = ctx.world;
        let Some(sun) = ctx.lighting.sun.filter(|&sun| world.has_component::<TransformComponent>(sun)) else {
            log::trace!("No sun, skipping shadow pass");
            ctx.lighting.clear_shadow();
            return;
        };
        let Some(target) = self.ensure_target(ctx.device) else {
            ctx.lighting.clear_shadow();
            return;
        };

        let (eye, view) = self.light_view(&world.world_transform(sun));
        let view_projection = self.projection * view;
        ctx.lighting.sun_view_projection = view_projection;
        ctx.lighting.shadow_map = target.depth;

        gl_check!(ctx.device, bind_render_target(Some(&target)));
        gl_check!(ctx.device, set_viewport(0, 0, target.width, target.height));
        gl_check!(ctx.device, clear(ClearMask::DEPTH, Vec4::zeros()));

        let items = world
            .get_component::<CameraComponent>(ctx.camera)
            .map_or(&[][..], |camera| camera.pass(CameraPassId::Final).draw_list::<Self>());
        if !items.is_empty() {
            let frame = FrameUniforms {
                view,
                projection: self.projection,
                view_projection,
                camera_position: utils::translation(&eye),
                clip_plane: Vec4::zeros(),
                sun_view_projection: view_projection,
                shadow_map: None,
            };

            gl_check!(ctx.device, set_capability(Capability::DepthTest, true));
            gl_check!(ctx.device, set_depth_mask(true));
            gl_check!(ctx.device, set_capability(Capability::CullFace, true));
            gl_check!(ctx.device, set_cull_face(Face::Front));
            gl_check!(ctx.device, set_capability(Capability::Blend, false));

            for item in items {
                let Some(model) = world.get_component::<ModelComponent>(item.entity) else {
                    continue;
                };
                if item.materials.is_empty() {
                    continue;
                }
                let object = ObjectUniforms::new(world.world_transform(item.entity), &frame.view);
                let skinning = world
                    .get_component::<SkeletonComponent>(item.entity)
                    .map(SkeletonComponent::pose);

                gl_check!(ctx.device, bind_vertex_buffer(Some(model.mesh().vertex_buffer)));
                for &slot in &item.materials {
                    let (Some(bound), Some(submesh)) =
                        (model.shadow_material(slot), model.mesh().submeshes.get(slot))
                    else {
                        continue;
                    };
                    draw_with_material(ctx.device, bound, submesh, &frame, &object, skinning, DrawState::Fixed);
                    ctx.draw_calls += 1;
                }
            }
            restore_baseline(ctx.device);
        }

        let (width, height) = ctx.viewport;
        gl_check!(ctx.device, bind_render_target(ctx.target.as_ref()));
        gl_check!(ctx.device, set_viewport(0, 0, width, height));
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::foundation::math::Quat;
    use crate::render::culling::AABB;
    use crate::render::device::{BufferId, DeviceCall, RecordingDevice, ShaderId, UniformLocation};
    use crate::render::material::{BuiltinUniform, Material};
    use crate::render::mesh::{MeshData, SubMesh, VertexAttribute, VertexAttributeKind};
    use crate::scene::SceneLighting;
    use approx::assert_relative_eq;

    fn caster_model() -> ModelComponent {
        let mesh = Rc::new(MeshData {
            vertex_buffer: BufferId(1),
            stride: 12,
            vertex_count: 8,
            attributes: vec![VertexAttribute { kind: VertexAttributeKind::Position, size: 3, offset: 0 }],
            submeshes: vec![SubMesh::triangles(BufferId(2), 36), SubMesh::triangles(BufferId(3), 36)],
            bounds: AABB::new(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5)),
        });
        let lit = Rc::new(Material::new("lit", ShaderId(1)).with_attribute(VertexAttributeKind::Position, 0));
        let depth = Rc::new(
            Material::new("depth", ShaderId(9))
                .with_uniform(BuiltinUniform::ViewProjection, UniformLocation(0))
                .with_attribute(VertexAttributeKind::Position, 0),
        );
        ModelComponent::new(mesh, vec![Rc::clone(&lit), lit])
            .expect("valid mesh")
            .with_shadow_material(0, depth)
    }

    struct Fixture {
        world: World,
        camera: Entity,
        caster: Entity,
        bystander: Entity,
        sun: Entity,
    }

    fn fixture() -> Fixture {
        let mut world = World::new();
        let camera = world.create_entity();
        world.add_component(camera, TransformComponent::default());
        world.add_component(camera, CameraComponent::orthographic(-8.0, 8.0, -8.0, 8.0, 1.0, 9.0));
        let matrix = world.world_transform(camera);
        world.component_mut::<CameraComponent>(camera).update_passes(&matrix);

        let caster = world.create_entity();
        world.add_component(caster, TransformComponent::from_position(Vec3::new(0.0, 0.0, -5.0)));
        world.add_component(caster, caster_model());
        world.add_component(caster, ShadowCasterComponent);

        let bystander = world.create_entity();
        world.add_component(bystander, TransformComponent::from_position(Vec3::new(2.0, 0.0, -5.0)));
        world.add_component(bystander, caster_model());

        let sun = world.create_entity();
        world.add_component(
            sun,
            TransformComponent::default().with_rotation(Quat::from_axis_angle(&Vec3::x_axis(), -1.2)),
        );

        let mut models = ModelRenderer::new();
        models.update_draw_list(&mut world, camera, CameraPassId::Final, &[caster, bystander]);

        Fixture { world, camera, caster, bystander, sun }
    }

    fn render(fixture: &Fixture, renderer: &mut ShadowMapRenderer, device: &mut RecordingDevice) -> SceneLighting {
        let mut lighting = SceneLighting { sun: Some(fixture.sun), ..SceneLighting::default() };
        render_into(fixture, renderer, device, &mut lighting);
        lighting
    }

    fn render_into(
        fixture: &Fixture,
        renderer: &mut ShadowMapRenderer,
        device: &mut RecordingDevice,
        lighting: &mut SceneLighting,
    ) {
        let mut ctx = RenderContext {
            world: &fixture.world,
            camera: fixture.camera,
            pass: CameraPassId::Final,
            device,
            lighting,
            target: None,
            viewport: (640, 480),
            draw_calls: 0,
        };
        renderer.render(&mut ctx);
    }

    #[test]
    fn test_casters_reuse_final_model_list() {
        let mut fixture = fixture();
        let mut renderer = ShadowMapRenderer::default();
        let (camera, caster, bystander) = (fixture.camera, fixture.caster, fixture.bystander);
        renderer.update_draw_list(&mut fixture.world, camera, CameraPassId::Final, &[caster]);

        let list = fixture.world.component::<CameraComponent>(camera).pass(CameraPassId::Final).draw_list::<ShadowMapRenderer>();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].entity, caster);
        // only slot 0 has a shadow material
        assert_eq!(list[0].materials, vec![0]);
        assert!(list.iter().all(|item| item.entity != bystander));
    }

    #[test]
    fn test_render_publishes_light_matrix_and_restores_target() {
        let mut fixture = fixture();
        let mut renderer = ShadowMapRenderer::default();
        let (camera, caster) = (fixture.camera, fixture.caster);
        renderer.update_draw_list(&mut fixture.world, camera, CameraPassId::Final, &[caster]);

        let mut device = RecordingDevice::new();
        let lighting = render(&fixture, &mut renderer, &mut device);

        let expected = renderer.light_view_projection(&fixture.world.world_transform(fixture.sun));
        assert_relative_eq!(lighting.sun_view_projection, expected, epsilon = 1e-6);
        assert!(lighting.shadow_map.is_some());
        assert_eq!(lighting.shadow_map, renderer.shadow_map());

        let draws = device.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].program, Some(ShaderId(9)));
        assert!(draws[0].depth_write);
        assert!(draws[0].cull_enabled);
        assert_eq!(draws[0].cull_face, Face::Front);
        assert!(draws[0].target.is_some());

        assert_eq!(device.bound_target(), None);
        assert_eq!(device.calls().last(), Some(&DeviceCall::SetViewport(0, 0, 640, 480)));
    }

    #[test]
    fn test_failed_allocation_disables_shadows() {
        let fixture = fixture();
        let mut renderer = ShadowMapRenderer::default();
        let mut device = RecordingDevice::new();
        device.fail_allocations(true);

        let lighting = render(&fixture, &mut renderer, &mut device);

        assert!(lighting.shadow_map.is_none());
        assert!(device.draws().is_empty());
        assert_eq!(renderer.shadow_map(), None);
    }

    #[test]
    fn test_failed_reallocation_clears_previous_frame_shadow() {
        let fixture = fixture();
        let mut renderer = ShadowMapRenderer::default();
        let mut device = RecordingDevice::new();
        let mut lighting = SceneLighting { sun: Some(fixture.sun), ..SceneLighting::default() };
        render_into(&fixture, &mut renderer, &mut device, &mut lighting);
        assert!(lighting.shadow_map.is_some());
        assert_eq!(device.live_target_count(), 1);

        renderer.set_map_size(0);
        render_into(&fixture, &mut renderer, &mut device, &mut lighting);

        assert_eq!(device.live_target_count(), 0);
        assert_eq!(lighting.shadow_map, None);
        assert_eq!(lighting.sun_view_projection, Mat4::identity());
        assert_eq!(lighting.sun, Some(fixture.sun));
    }

    #[test]
    fn test_missing_sun_clears_previous_frame_shadow() {
        let fixture = fixture();
        let mut renderer = ShadowMapRenderer::default();
        let mut device = RecordingDevice::new();
        let mut lighting = render(&fixture, &mut renderer, &mut device);

        lighting.sun = None;
        render_into(&fixture, &mut renderer, &mut device, &mut lighting);

        assert_eq!(lighting, SceneLighting::default());
    }

    #[test]
    fn test_resize_reallocates_target() {
        let fixture = fixture();
        let mut renderer = ShadowMapRenderer::default();
        let mut device = RecordingDevice::new();
        render(&fixture, &mut renderer, &mut device);
        let first = renderer.shadow_map();

        renderer.set_map_size(512);
        render(&fixture, &mut renderer, &mut device);

        assert_ne!(renderer.shadow_map(), first);
        assert_eq!(device.live_target_count(), 1);
    }
}

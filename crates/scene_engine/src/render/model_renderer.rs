//! Model renderer
//!
//! Draws every visible [`ModelComponent`] submesh with its material. Culling
//! happens in `update_draw_list`; `render` only walks the list and follows the
//! shared binding protocol in [`crate::render::binding`].

use crate::ecs::components::{
    CameraComponent, CameraPassId, DrawList, ModelComponent, SkeletonComponent, TransformComponent,
};
use crate::ecs::world::misuse;
use crate::ecs::{ComponentMask, Entity, System, World};
use crate::gl_check;
use crate::render::binding::{draw_with_material, restore_baseline, DrawState, FrameUniforms, ObjectUniforms};
use crate::render::culling::AABB;
use crate::render::{RenderContext, RenderStage, Renderable};

/// Renders models in the World stage
#[derive(Debug)]
pub struct ModelRenderer {
    signature: ComponentMask,
}

impl Default for ModelRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRenderer {
    /// Create the renderer
    pub fn new() -> Self {
        Self {
            signature: ComponentMask::new().with::<TransformComponent>().with::<ModelComponent>(),
        }
    }
}

impl System for ModelRenderer {
    fn name(&self) -> &'static str {
        "ModelRenderer"
    }

    fn signature(&self) -> ComponentMask {
        self.signature
    }

    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        Some(self)
    }
}

impl Renderable for ModelRenderer {
    fn render_stage(&self) -> RenderStage {
        RenderStage::World
    }

    fn update_draw_list(&mut self, world: &mut World, camera: Entity, pass: CameraPassId, entities: &[Entity]) {
        let Some(camera_component) = world.get_component::<CameraComponent>(camera) else {
            misuse!("update_draw_list on {camera:?} which has no camera");
            return;
        };
        let camera_pass = camera_component.pass(pass);
        let frustum = camera_pass.frustum().clone();
        let cull_mask = camera_pass.cull_mask();
        // Refraction shares the Final list; its clip plane is applied by the shader
        let clip_plane = match pass {
            CameraPassId::Reflection => camera_component.reflection_plane(),
            CameraPassId::Final | CameraPassId::Refraction => None,
        };

        let is_visible = |bounds: &AABB| {
            frustum.intersects_aabb(bounds) && clip_plane.map_or(true, |plane| plane.intersects_aabb(bounds))
        };

        let mut list = DrawList::new();
        for &entity in entities {
            let Some(model) = world.get_component::<ModelComponent>(entity) else {
                continue;
            };
            if !model.flags().intersects(cull_mask) {
                continue;
            }

            let world_matrix = world.world_transform(entity);
            if !is_visible(&model.mesh().bounds.transformed(&world_matrix)) {
                continue;
            }

            let materials = (0..model.slot_count())
                .filter(|&slot| model.is_submesh_visible(slot))
                .filter(|&slot| is_visible(&model.mesh().submesh_bounds(slot).transformed(&world_matrix)))
                .collect();
            list.push(entity, materials);
        }

        log::trace!("ModelRenderer: {} visible in {pass:?}", list.len());
        world.component_mut::<CameraComponent>(camera).pass_mut(pass).set_draw_list::<Self>(list);
    }

    fn render(&mut self, ctx: &mut RenderContext<'_>) {
        let world = ctx.world;
        let Some(camera) = world.get_component::<CameraComponent>(ctx.camera) else {
            misuse!("render with {:?} which has no camera", ctx.camera);
            return;
        };
        let pass = camera.pass(ctx.pass);
        let items = pass.draw_list::<Self>();
        if items.is_empty() {
            return;
        }

        let frame = FrameUniforms {
            view: *pass.view(),
            projection: *pass.projection(),
            view_projection: *pass.view_projection(),
            camera_position: pass.position(),
            clip_plane: camera.clip_plane(ctx.pass),
            sun_view_projection: ctx.lighting.sun_view_projection,
            shadow_map: ctx.lighting.shadow_map,
        };
        let state = DrawState::Material(pass.cull_face());

        for item in items {
            if item.materials.is_empty() {
                continue;
            }
            let Some(model) = world.get_component::<ModelComponent>(item.entity) else {
                continue;
            };

            let object = ObjectUniforms::new(world.world_transform(item.entity), &frame.view);
            let skinning = world
                .get_component::<SkeletonComponent>(item.entity)
                .map(SkeletonComponent::pose);

            gl_check!(ctx.device, bind_vertex_buffer(Some(model.mesh().vertex_buffer)));
            for &slot in &item.materials {
                let (Some(bound), Some(submesh)) = (model.material(slot), model.mesh().submeshes.get(slot)) else {
                    continue;
                };
                draw_with_material(ctx.device, bound, submesh, &frame, &object, skinning, state);
                ctx.draw_calls += 1;
            }
        }

        restore_baseline(ctx.device);
    }
}

use std::rc::Rc;

use super::{cube, spawn_model};
use crate::ecs::components::{
    CameraComponent, CameraPassId, LightFactory, Projection, ShadowCasterComponent, SunlightComponent,
    TransformComponent,
};
use crate::ecs::Entity;
use crate::events::MessageBus;
use crate::foundation::math::{Quat, Vec3};
use crate::render::culling::Plane;
use crate::render::device::recording::UniformData;
use crate::render::device::{
    BlendFactor, DeviceCall, Face, GraphicsDevice, RecordingDevice, RenderTargetDesc, ShaderId, TextureId,
    UniformLocation,
};
use crate::render::light_volume::SourceBuffer;
use crate::render::material::{BuiltinUniform, Material};
use crate::render::mesh::VertexAttributeKind;
use crate::render::{LightVolumeSystem, ModelRenderer, ShadowMapRenderer};
use crate::scene::{Scene, SceneLighting};

fn add_sun(scene: &mut Scene) -> Entity {
    let world = scene.world_mut();
    let sun = world.create_entity();
    world.add_component(
        sun,
        TransformComponent::default().with_rotation(Quat::from_axis_angle(&Vec3::x_axis(), -1.0)),
    );
    world.add_component(sun, SunlightComponent::default());
    scene.set_sun(Some(sun));
    sun
}

fn shadowed_scene() -> (Scene, Entity) {
    let mut scene = Scene::new();
    // registered out of stage order on purpose
    scene.add_system(ModelRenderer::new());
    scene.add_system(ShadowMapRenderer::default());
    let model = spawn_model(scene.world_mut(), Vec3::new(0.0, 0.0, -10.0));
    scene.world_mut().add_component(model, ShadowCasterComponent);
    add_sun(&mut scene);
    (scene, model)
}

#[test]
fn test_shadow_stage_feeds_world_stage() {
    let (mut scene, _) = shadowed_scene();
    let mut bus = MessageBus::new();
    let mut device = RecordingDevice::new();

    scene.simulate(&mut bus, 0.016);
    let draw_calls = scene.render(&mut device, None);

    assert_eq!(draw_calls, 2);
    let draws = device.draws();
    assert_eq!(draws.len(), 2);

    assert_eq!(draws[0].program, Some(ShaderId(2)));
    assert!(draws[0].target.is_some());

    let lighting = scene.lighting();
    assert_eq!(draws[1].program, Some(ShaderId(1)));
    assert_eq!(draws[1].target, None);
    assert_eq!(
        draws[1].uniforms.get(&UniformLocation(2)),
        Some(&UniformData::Mat4(lighting.sun_view_projection))
    );
    // the lit material has no textures, so the shadow map takes unit 0
    assert_eq!(draws[1].textures.get(&0).copied(), lighting.shadow_map);
    assert_eq!(draws[1].uniforms.get(&UniformLocation(3)), Some(&UniformData::Int(0)));

    assert_eq!(scene.stats().draw_calls, 2);
    assert_eq!(scene.stats().frames, 1);
}

#[test]
fn test_destroyed_sun_disables_shadow_pass() {
    let (mut scene, _) = shadowed_scene();
    let mut bus = MessageBus::new();
    let mut device = RecordingDevice::new();
    scene.simulate(&mut bus, 0.016);

    let sun = scene.lighting().sun.expect("sun set");
    scene.world_mut().destroy_entity(sun);
    scene.simulate(&mut bus, 0.016);
    let draw_calls = scene.render(&mut device, None);

    assert_eq!(scene.lighting().sun, None);
    assert_eq!(draw_calls, 1);
    assert!(device.draws().iter().all(|draw| draw.target.is_none()));
}

#[test]
fn test_clearing_sun_drops_previous_shadow_state() {
    let (mut scene, _) = shadowed_scene();
    let mut bus = MessageBus::new();
    let mut device = RecordingDevice::new();
    scene.simulate(&mut bus, 0.016);
    scene.render(&mut device, None);
    assert!(scene.lighting().shadow_map.is_some());

    scene.set_sun(None);
    assert_eq!(scene.lighting(), &SceneLighting::default());

    // fresh device so no texture binding survives from the first frame
    let mut device = RecordingDevice::new();
    scene.simulate(&mut bus, 0.016);
    assert_eq!(scene.render(&mut device, None), 1);
    let draws = device.draws();
    assert_eq!(draws[0].target, None);
    assert!(draws[0].textures.is_empty());
}

#[test]
fn test_reflection_pass_is_culled_and_rendered_mirrored() {
    let mut scene = Scene::new();
    scene.add_system(ModelRenderer::new());
    let above = spawn_model(scene.world_mut(), Vec3::new(0.0, 0.0, -10.0));
    let below = spawn_model(scene.world_mut(), Vec3::new(0.0, -4.0, -10.0));
    let camera = scene.active_camera().expect("default camera");
    scene
        .world_mut()
        .component_mut::<CameraComponent>(camera)
        .set_reflection_plane(Some(Plane::new(Vec3::y(), 2.0)));

    let mut bus = MessageBus::new();
    let mut device = RecordingDevice::new();
    scene.simulate(&mut bus, 0.016);
    scene.render(&mut device, None);

    let camera_component = scene.world().component::<CameraComponent>(camera);
    let reflected: Vec<Entity> = camera_component
        .pass(CameraPassId::Reflection)
        .draw_list::<ModelRenderer>()
        .iter()
        .map(|item| item.entity)
        .collect();
    assert_eq!(reflected, vec![above]);
    let direct = camera_component.pass(CameraPassId::Final).draw_list::<ModelRenderer>().len();
    assert_eq!(direct, 2);

    let target = device
        .create_render_target(&RenderTargetDesc { width: 256, height: 256, samples: 0, colour: true, depth: true })
        .expect("target");
    device.clear_log();
    let draw_calls = scene.render_camera(camera, CameraPassId::Reflection, &mut device, Some(target));

    assert_eq!(draw_calls, 1);
    let draw = &device.draws()[0];
    assert_eq!(draw.cull_face, Face::Front);
    assert_eq!(draw.target, Some(target.framebuffer));
    assert!(scene.world().is_alive(below));
}

#[test]
fn test_light_volumes_render_before_models() {
    let mut scene = Scene::new();
    scene.add_system(ModelRenderer::new());
    let mut device = RecordingDevice::new();

    let proxy = Rc::new(
        Material::new("point light", ShaderId(4))
            .with_uniform(BuiltinUniform::LightRadius, UniformLocation(0))
            .with_attribute(VertexAttributeKind::Position, 0),
    );
    let mut lights = LightVolumeSystem::default().with_proxy(cube(), proxy);
    lights.set_source_buffer(TextureId(50), SourceBuffer::Position);
    lights.set_source_buffer(TextureId(51), SourceBuffer::Normal);
    lights.set_target_size(&mut device, (1280, 720), 2).expect("allocates");
    scene.add_system(lights);

    spawn_model(scene.world_mut(), Vec3::new(0.0, 0.0, -10.0));
    let light = scene.world_mut().create_entity();
    scene
        .world_mut()
        .add_component(light, TransformComponent::from_position(Vec3::new(1.0, 0.0, -8.0)));
    scene
        .world_mut()
        .add_component(light, LightFactory::point(Vec3::new(1.0, 1.0, 1.0), 1.0, 4.0));

    let mut bus = MessageBus::new();
    scene.simulate(&mut bus, 0.016);
    let draw_calls = scene.render(&mut device, None);

    assert_eq!(draw_calls, 2);
    let draws = device.draws();
    assert_eq!(draws[0].program, Some(ShaderId(4)));
    assert_eq!(draws[0].blend_func, (BlendFactor::One, BlendFactor::One));
    assert!(!draws[0].depth_test);
    assert_eq!(draws[1].program, Some(ShaderId(1)));
    assert_eq!(draws[1].target, None);
    assert_eq!(scene.system::<LightVolumeSystem>().map(LightVolumeSystem::lights_drawn), Some(1));
}

#[test]
fn test_destroyed_camera_renders_nothing() {
    let mut scene = Scene::new();
    scene.add_system(ModelRenderer::new());
    spawn_model(scene.world_mut(), Vec3::new(0.0, 0.0, -10.0));
    let camera = scene.active_camera().expect("default camera");
    scene.world_mut().destroy_entity(camera);

    let mut bus = MessageBus::new();
    let mut device = RecordingDevice::new();
    scene.simulate(&mut bus, 0.016);

    assert_eq!(scene.active_camera(), None);
    assert_eq!(scene.render(&mut device, None), 0);
    assert!(device.draws().is_empty());
}

#[test]
fn test_viewport_size_drives_default_target_and_aspect() {
    let mut scene = Scene::new();
    scene.set_viewport_size(1000, 500);
    let camera = scene.active_camera().expect("default camera");

    let projection = *scene.world().component::<CameraComponent>(camera).projection();
    assert!(matches!(projection, Projection::Perspective { aspect, .. } if (aspect - 2.0).abs() < 1e-6));

    let mut bus = MessageBus::new();
    let mut device = RecordingDevice::new();
    scene.simulate(&mut bus, 0.016);
    scene.render(&mut device, None);
    assert!(device.calls().contains(&DeviceCall::SetViewport(0, 0, 1000, 500)));
}

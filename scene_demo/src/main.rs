//! Headless fleet demo with frigates, escort formations, and light sparks
//!
//! Frames are rendered into a [`RecordingDevice`] so the whole scene pipeline
//! (shadow pass, light volumes, models) runs without a window. Pass a config
//! path as the first argument, otherwise `scene.toml` is tried.

use std::collections::HashSet;
use std::rc::Rc;

use rand::rngs::ThreadRng;
use rand::Rng;
use scene_engine::foundation::logging;
use scene_engine::prelude::*;
use scene_engine::render::culling::AABB;
use scene_engine::render::device::{BufferId, RenderTargetDesc, ShaderId, UniformLocation};
use scene_engine::render::{BuiltinUniform, SourceBuffer, SubMesh, VertexAttribute, VertexAttributeKind};

// Fleet configuration
const NUM_FRIGATES: usize = 3;
const ESCORTS_PER_FRIGATE: usize = 4;
const FRIGATE_SPEED: f32 = 5.0;
const FRIGATE_SPACING: f32 = 20.0;
const FRIGATE_WRAP_DISTANCE: f32 = -150.0;
const ESCORT_ORBIT_RADIUS: f32 = 6.0;
const ESCORT_ORBIT_SPEED: f32 = 0.5;
const MAX_SPARKS: usize = 24;
const SPARK_SPREAD: f32 = 40.0;
const SPARK_LIFETIME: f32 = 1.5;
const SPARK_CALLBACK_ID: u32 = 1;

const FRAMES: u32 = 600;
const FIXED_DT: f32 = 1.0 / 60.0;
const STATS_INTERVAL: u32 = 120;

/// Shared meshes and materials; stands in for an asset loader
#[derive(Clone)]
struct DemoAssets {
    hull: Rc<MeshData>,
    lit: Rc<Material>,
    depth: Rc<Material>,
    point_light: Rc<Material>,
}

impl DemoAssets {
    fn new() -> Self {
        let hull = Rc::new(MeshData {
            vertex_buffer: BufferId(1),
            stride: 24,
            vertex_count: 24,
            attributes: vec![
                VertexAttribute { kind: VertexAttributeKind::Position, size: 3, offset: 0 },
                VertexAttribute { kind: VertexAttributeKind::Normal, size: 3, offset: 12 },
            ],
            submeshes: vec![SubMesh::triangles(BufferId(2), 36)],
            bounds: AABB::new(Vec3::new(-1.0, -0.5, -2.0), Vec3::new(1.0, 0.5, 2.0)),
        });

        let lit = Rc::new(
            Material::new("hull", ShaderId(1))
                .with_uniform(BuiltinUniform::WorldView, UniformLocation(0))
                .with_uniform(BuiltinUniform::Projection, UniformLocation(1))
                .with_uniform(BuiltinUniform::NormalMatrix, UniformLocation(2))
                .with_uniform(BuiltinUniform::SunlightViewProjection, UniformLocation(3))
                .with_uniform(BuiltinUniform::ShadowMap, UniformLocation(4))
                .with_attribute(VertexAttributeKind::Position, 0)
                .with_attribute(VertexAttributeKind::Normal, 1),
        );

        let depth = Rc::new(
            Material::new("hull depth", ShaderId(2))
                .with_uniform(BuiltinUniform::ViewProjection, UniformLocation(0))
                .with_uniform(BuiltinUniform::World, UniformLocation(1))
                .with_attribute(VertexAttributeKind::Position, 0),
        );

        let point_light = Rc::new(
            Material::new("point light", ShaderId(3))
                .with_uniform(BuiltinUniform::WorldView, UniformLocation(0))
                .with_uniform(BuiltinUniform::Projection, UniformLocation(1))
                .with_uniform(BuiltinUniform::LightColour, UniformLocation(2))
                .with_uniform(BuiltinUniform::LightRadius, UniformLocation(3))
                .with_uniform(BuiltinUniform::LightPosition, UniformLocation(4))
                .with_uniform(BuiltinUniform::ScreenSize, UniformLocation(5))
                .with_uniform(BuiltinUniform::PositionBuffer, UniformLocation(6))
                .with_uniform(BuiltinUniform::NormalBuffer, UniformLocation(7))
                .with_attribute(VertexAttributeKind::Position, 0),
        );

        Self { hull, lit, depth, point_light }
    }

    fn ship(&self, world: &mut World, transform: TransformComponent) -> Option<Entity> {
        let model = match ModelComponent::new(Rc::clone(&self.hull), vec![Rc::clone(&self.lit)]) {
            Ok(model) => model.with_shadow_material(0, Rc::clone(&self.depth)),
            Err(e) => {
                log::error!("Failed to build ship model: {e}");
                return None;
            }
        };
        let entity = world.create_entity();
        world.add_component(entity, transform);
        world.add_component(entity, model);
        world.add_component(entity, ShadowCasterComponent);
        Some(entity)
    }
}

/// What the fleet system does with an entity each frame
#[derive(Debug, Clone, Copy)]
enum FleetRole {
    /// Cruises forward and wraps back to the start line
    Frigate { start_z: f32 },
    /// Spins so its escort children orbit the parent frigate
    Pivot { speed: f32 },
}

#[derive(Debug, Clone, Copy)]
struct FleetComponent {
    role: FleetRole,
}

impl Component for FleetComponent {}

/// Moves frigates and spins escort pivots
struct FleetSystem {
    signature: ComponentMask,
}

impl FleetSystem {
    fn new() -> Self {
        Self {
            signature: ComponentMask::new().with::<TransformComponent>().with::<FleetComponent>(),
        }
    }
}

impl System for FleetSystem {
    fn name(&self) -> &'static str {
        "FleetSystem"
    }

    fn signature(&self) -> ComponentMask {
        self.signature
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entities: &[Entity], dt: f32) {
        for &entity in entities {
            let Some(fleet) = ctx.world.get_component::<FleetComponent>(entity).copied() else {
                continue;
            };
            match fleet.role {
                FleetRole::Frigate { start_z } => {
                    ctx.world.translate(entity, Vec3::new(0.0, 0.0, -FRIGATE_SPEED * dt));
                    let position = ctx.world.component::<TransformComponent>(entity).position();
                    if position.z < FRIGATE_WRAP_DISTANCE {
                        ctx.world.set_position(entity, Vec3::new(position.x, position.y, start_z));
                    }
                }
                FleetRole::Pivot { speed } => {
                    ctx.world.rotate(entity, Quat::from_axis_angle(&Vec3::y_axis(), speed * dt));
                }
            }
        }
    }
}

/// Keeps a population of short-lived light sparks around the fleet
///
/// Sparks destroy themselves through their timed callback; the destruction
/// message triggers a replacement.
struct SparkSpawner {
    rng: ThreadRng,
    live: HashSet<Entity>,
    spawned: u64,
}

impl SparkSpawner {
    fn new() -> Self {
        Self { rng: rand::thread_rng(), live: HashSet::new(), spawned: 0 }
    }

    fn spawn(&mut self, world: &mut World) {
        let position = Vec3::new(
            self.rng.gen_range(-SPARK_SPREAD..SPARK_SPREAD),
            self.rng.gen_range(-5.0..5.0),
            self.rng.gen_range(-SPARK_SPREAD * 2.0..0.0),
        );
        let colour = Vec3::new(self.rng.gen_range(0.5..1.0), self.rng.gen_range(0.3..0.8), 0.2);
        let lifetime = SPARK_LIFETIME * self.rng.gen_range(0.5..1.5);

        let spark = world.create_entity();
        world.add_component(spark, TransformComponent::from_position(position));
        world.add_component(spark, LightFactory::point(colour, 2.0, self.rng.gen_range(2.0..6.0)));
        world.add_component(
            spark,
            TimedCallbackComponent::new(SPARK_CALLBACK_ID, lifetime).started().destroy_when_finished(),
        );
        self.live.insert(spark);
        self.spawned += 1;
    }
}

impl System for SparkSpawner {
    fn name(&self) -> &'static str {
        "SparkSpawner"
    }

    fn signature(&self) -> ComponentMask {
        ComponentMask::new()
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, _entities: &[Entity], _dt: f32) {
        while self.live.len() < MAX_SPARKS {
            self.spawn(ctx.world);
        }
    }

    fn as_message_handler(&mut self) -> Option<&mut dyn MessageHandler> {
        Some(self)
    }
}

impl MessageHandler for SparkSpawner {
    fn on_message(&mut self, world: &mut World, message: &Message) -> bool {
        if message.message_type != MessageType::EntityDestroyed {
            return false;
        }
        match message.get_entity() {
            Some(entity) if self.live.remove(&entity) => {
                self.spawn(world);
                true
            }
            _ => false,
        }
    }
}

fn build_fleet(world: &mut World, assets: &DemoAssets) -> usize {
    let mut ships = 0;
    for frigate_index in 0..NUM_FRIGATES {
        let x = (frigate_index as f32 - (NUM_FRIGATES as f32 - 1.0) * 0.5) * FRIGATE_SPACING;
        let start_z = -20.0;
        let transform = TransformComponent::from_position(Vec3::new(x, 0.0, start_z)).with_scale(Vec3::new(3.0, 3.0, 3.0));
        let Some(frigate) = assets.ship(world, transform) else {
            continue;
        };
        world.add_component(frigate, FleetComponent { role: FleetRole::Frigate { start_z } });
        ships += 1;

        // The pivot carries no model; rotating it swings every escort around the frigate
        let pivot = world.create_entity();
        world.add_component(pivot, TransformComponent::default());
        world.add_component(
            pivot,
            FleetComponent {
                role: FleetRole::Pivot { speed: ESCORT_ORBIT_SPEED * (frigate_index as f32 + 1.0) },
            },
        );
        world.set_parent(pivot, Some(frigate));

        for escort_index in 0..ESCORTS_PER_FRIGATE {
            let angle = escort_index as f32 / ESCORTS_PER_FRIGATE as f32 * std::f32::consts::TAU;
            // Escort radius is in frigate space, which is scaled by 3
            let offset = Vec3::new(angle.cos(), 0.2, angle.sin()) * (ESCORT_ORBIT_RADIUS / 3.0);
            let transform = TransformComponent::from_position(offset).with_scale(Vec3::new(0.3, 0.3, 0.3));
            if let Some(escort) = assets.ship(world, transform) {
                world.set_parent(escort, Some(pivot));
                ships += 1;
            }
        }
    }
    ships
}

fn build_light_volumes(
    device: &mut RecordingDevice,
    config: &SceneConfig,
    assets: &DemoAssets,
) -> EngineResult<LightVolumeSystem> {
    let size = (config.camera.width, config.camera.height);
    // Stand-in geometry buffer the deferred pass would normally fill
    let gbuffer = device.create_render_target(&RenderTargetDesc {
        width: size.0,
        height: size.1,
        samples: 0,
        colour: true,
        depth: true,
    })?;

    let mut lights = LightVolumeSystem::new(&config.light_volume)
        .with_proxy(Rc::clone(&assets.hull), Rc::clone(&assets.point_light));
    if let Some(colour) = gbuffer.colour {
        lights.set_source_buffer(colour, SourceBuffer::Position);
        lights.set_source_buffer(colour, SourceBuffer::Normal);
    }
    lights.set_multi_samples(device, config.light_volume.samples)?;
    lights.set_target_size(device, size, config.light_volume.downscale)?;
    Ok(lights)
}

fn main() {
    logging::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "scene.toml".to_string());
    let config = SceneConfig::load_or_default(&config_path);
    log::info!(
        "Starting fleet demo at {}x{}, shadow map {}",
        config.camera.width,
        config.camera.height,
        config.shadow.map_size
    );

    let assets = DemoAssets::new();
    let mut device = RecordingDevice::new();
    let mut scene = Scene::with_config(config.clone());

    scene.add_system(FleetSystem::new());
    scene.add_system(SparkSpawner::new());
    scene.add_system(ShadowMapRenderer::new(&config.shadow));
    match build_light_volumes(&mut device, &config, &assets) {
        Ok(lights) => scene.add_system(lights),
        Err(e) => log::warn!("Light volumes disabled: {e}"),
    }
    scene.add_system(ModelRenderer::new());

    let ships = build_fleet(scene.world_mut(), &assets);
    log::info!("Spawned {ships} ships");

    if let Some(camera) = scene.active_camera() {
        let eye = TransformFactory::look_at(Vec3::new(0.0, 25.0, 30.0), Vec3::new(0.0, 0.0, -40.0), Vec3::y());
        scene.world_mut().set_position(camera, eye.position());
        scene.world_mut().set_rotation(camera, eye.rotation());
    }

    let sun = scene.world_mut().create_entity();
    scene
        .world_mut()
        .add_component(sun, TransformFactory::directional_light(Vec3::new(-0.3, -1.0, -0.4)));
    scene
        .world_mut()
        .add_component(sun, LightFactory::sun(Vec3::new(1.0, 0.95, 0.9), 1.0));
    scene.set_sun(Some(sun));

    let mut bus = MessageBus::new();
    let mut timer = FrameTimer::default();
    let mut total_draw_calls: u64 = 0;

    for frame in 1..=FRAMES {
        timer.tick();
        bus.begin_frame();
        for message in bus.poll() {
            scene.forward_message(&message);
        }

        scene.simulate(&mut bus, FIXED_DT);
        total_draw_calls += u64::from(scene.render(&mut device, None));
        device.clear_log();

        if frame % STATS_INTERVAL == 0 {
            let stats = scene.stats();
            log::info!(
                "frame {frame}: {} entities, {} draw calls, simulate {:.3}ms, render {:.3}ms",
                stats.entity_count,
                stats.draw_calls,
                stats.simulate_ms,
                stats.render_ms
            );
        }
    }

    let sparks = scene.system::<SparkSpawner>().map_or(0, |spawner| spawner.spawned);
    log::info!(
        "Finished {} frames in {:.2}s wall time: {total_draw_calls} draw calls, {sparks} sparks spawned",
        timer.frame_count(),
        timer.total_time()
    );

    if let Some(shadows) = scene.system_mut::<ShadowMapRenderer>() {
        shadows.release(&mut device);
    }
    if let Some(lights) = scene.system_mut::<LightVolumeSystem>() {
        lights.release(&mut device);
    }
}

//! Scene: system scheduling, sync points and the render frame

use std::cmp::Reverse;
use std::collections::HashSet;

use super::{SceneLighting, SceneStats};
use crate::config::SceneConfig;
use crate::ecs::components::{CameraComponent, CameraPassId, TransformComponent};
use crate::ecs::system::AsAny;
use crate::ecs::systems::{CallbackSystem, CameraSystem, SkeletalAnimator};
use crate::ecs::world::misuse;
use crate::ecs::{ComponentMask, Entity, System, SystemContext, World, WorldChanges};
use crate::events::{Message, MessageBus};
use crate::foundation::time::Stopwatch;
use crate::gl_check;
use crate::render::device::{ClearMask, GraphicsDevice, RenderTarget};
use crate::render::{RenderContext, RenderStage};

/// A registered system and the entities currently matching its signature
struct SystemEntry {
    system: Box<dyn System>,
    signature: ComponentMask,
    stage: Option<RenderStage>,
    entities: Vec<Entity>,
    members: HashSet<Entity>,
    needs_compact: bool,
}

impl SystemEntry {
    fn new(mut system: Box<dyn System>, world: &World) -> Self {
        let signature = system.signature();
        let stage = system.as_renderable().map(|renderable| renderable.render_stage());
        let entities = world.entities_matching(signature);
        for &entity in &entities {
            system.on_entity_added(world, entity);
        }

        Self {
            members: entities.iter().copied().collect(),
            system,
            signature,
            stage,
            entities,
            needs_compact: false,
        }
    }

    fn refresh(&mut self, world: &World, entity: Entity) {
        if world.is_alive(entity) && world.mask(entity).contains(self.signature) {
            if self.members.insert(entity) {
                self.entities.push(entity);
                self.system.on_entity_added(world, entity);
            }
        } else {
            self.remove(entity);
        }
    }

    /// Leaves `entities` holding a stale handle until [`Self::compact`].
    ///
    /// An entity is never removed and re-added within one sync point, so the
    /// stale handle cannot shadow a fresh insertion.
    fn remove(&mut self, entity: Entity) {
        if self.members.remove(&entity) {
            self.needs_compact = true;
            self.system.on_entity_removed(entity);
        }
    }

    /// Drop removed entities in one order-preserving pass
    fn compact(&mut self) {
        if std::mem::take(&mut self.needs_compact) {
            let members = &self.members;
            self.entities.retain(|entity| members.contains(entity));
        }
    }
}

/// Owns the world, the systems and the per-frame pipeline
///
/// User systems run in registration order, followed by the built-in
/// [`SkeletalAnimator`], [`CallbackSystem`] and [`CameraSystem`], so camera
/// passes always see this frame's final transforms.
pub struct Scene {
    world: World,
    systems: Vec<SystemEntry>,
    user_systems: usize,
    lighting: SceneLighting,
    active_camera: Option<Entity>,
    viewport: (u32, u32),
    config: SceneConfig,
    stats: SceneStats,
    outbox: Vec<Message>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create a scene with the default configuration
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    /// Create a scene with a default perspective camera set active
    pub fn with_config(config: SceneConfig) -> Self {
        let mut world = World::new();
        let camera = world.create_entity();
        world.add_component(camera, TransformComponent::default());
        world.add_component(
            camera,
            CameraComponent::perspective(
                config.camera.fov_y(),
                config.camera.aspect(),
                config.camera.near,
                config.camera.far,
            ),
        );

        let builtins: [Box<dyn System>; 3] = [
            Box::new(SkeletalAnimator::new()),
            Box::new(CallbackSystem::new()),
            Box::new(CameraSystem::new()),
        ];
        let systems = builtins.into_iter().map(|system| SystemEntry::new(system, &world)).collect();

        log::debug!("Scene created with camera {camera:?}");
        Self {
            world,
            systems,
            user_systems: 0,
            lighting: SceneLighting::default(),
            active_camera: Some(camera),
            viewport: (config.camera.width, config.camera.height),
            config,
            stats: SceneStats::default(),
            outbox: Vec::new(),
        }
    }

    /// Entity storage
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable entity storage; structural changes apply at the next sync point
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Configuration the scene was created with
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Statistics of the last frame
    pub fn stats(&self) -> &SceneStats {
        &self.stats
    }

    /// Shared lighting state
    pub fn lighting(&self) -> &SceneLighting {
        &self.lighting
    }

    /// Register a system after the previously registered user systems
    ///
    /// Its entity list is seeded from the current world.
    pub fn add_system<S: System>(&mut self, system: S) {
        self.sync();
        let entry = SystemEntry::new(Box::new(system), &self.world);
        log::debug!("Registered {} with {} entities", entry.system.name(), entry.entities.len());
        self.systems.insert(self.user_systems, entry);
        self.user_systems += 1;
    }

    /// First registered system of type `S`
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems
            .iter()
            .find_map(|entry| AsAny::as_any(entry.system.as_ref()).downcast_ref::<S>())
    }

    /// First registered system of type `S`, mutably
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems
            .iter_mut()
            .find_map(|entry| AsAny::as_any_mut(entry.system.as_mut()).downcast_mut::<S>())
    }

    /// Entities currently matching the signature of the first system of type `S`
    pub fn system_entities<S: System>(&self) -> &[Entity] {
        self.systems
            .iter()
            .find(|entry| AsAny::as_any(entry.system.as_ref()).is::<S>())
            .map_or(&[][..], |entry| &entry.entities)
    }

    /// Camera rendered by [`Scene::render`]
    pub fn active_camera(&self) -> Option<Entity> {
        self.active_camera
    }

    /// Select the camera rendered by [`Scene::render`]
    pub fn set_active_camera(&mut self, camera: Entity) {
        if !self.world.has_component::<CameraComponent>(camera) {
            misuse!("set_active_camera: {camera:?} has no CameraComponent");
            return;
        }
        self.active_camera = Some(camera);
    }

    /// Entity whose transform orients the sun, or `None` to disable shadows
    pub fn set_sun(&mut self, sun: Option<Entity>) {
        if let Some(entity) = sun {
            if !self.world.has_component::<TransformComponent>(entity) {
                misuse!("set_sun: {entity:?} has no TransformComponent");
                return;
            }
        }
        if sun.is_none() {
            self.lighting.clear_shadow();
        }
        self.lighting.sun = sun;
    }

    /// Default framebuffer size; updates the active camera's aspect ratio
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        if height == 0 {
            return;
        }
        if let Some(camera) = self
            .active_camera
            .and_then(|camera| self.world.get_component_mut::<CameraComponent>(camera))
        {
            #[allow(clippy::cast_precision_loss)]
            camera.set_aspect_ratio(width as f32 / height as f32);
        }
    }

    /// Offer `message` to every message-handling system in registration
    /// order until one consumes it
    pub fn forward_message(&mut self, message: &Message) -> bool {
        for entry in &mut self.systems {
            let Some(handler) = entry.system.as_message_handler() else {
                continue;
            };
            if handler.on_message(&mut self.world, message) {
                log::trace!("{:?} consumed by {}", message.message_type, entry.system.name());
                return true;
            }
        }
        false
    }

    /// Run every system once
    ///
    /// Each system's structural changes are applied before the next system
    /// runs. Scene messages produced by the sync points are posted to `bus`.
    pub fn simulate(&mut self, bus: &mut MessageBus, dt: f32) {
        let stopwatch = Stopwatch::start();
        self.sync();

        for index in 0..self.systems.len() {
            let entry = &mut self.systems[index];
            let mut ctx = SystemContext {
                world: &mut self.world,
                messages: &mut *bus,
            };
            entry.system.process(&mut ctx, &entry.entities, dt);
            self.sync();
        }

        for message in self.outbox.drain(..) {
            bus.post(message);
        }
        self.stats.simulate_ms = stopwatch.elapsed_millis();
        self.stats.entity_count = self.world.entity_count();
    }

    /// Rebuild draw lists of the active camera and render its Final pass
    /// into `target` (`None` for the default framebuffer)
    ///
    /// Returns the number of draw calls issued.
    pub fn render(&mut self, device: &mut dyn GraphicsDevice, target: Option<RenderTarget>) -> u32 {
        let stopwatch = Stopwatch::start();
        self.sync();

        let draw_calls = match self.active_camera {
            Some(camera) => {
                self.update_draw_lists(camera);
                self.render_camera(camera, CameraPassId::Final, device, target)
            }
            None => {
                log::trace!("No active camera, nothing rendered");
                0
            }
        };

        self.stats.draw_calls = draw_calls;
        self.stats.render_ms = stopwatch.elapsed_millis();
        self.stats.entity_count = self.world.entity_count();
        self.stats.frames += 1;
        if self.config.stats {
            log::debug!(
                "Frame {}: {} entities, {} draw calls, simulate {:.2} ms, render {:.2} ms",
                self.stats.frames,
                self.stats.entity_count,
                self.stats.draw_calls,
                self.stats.simulate_ms,
                self.stats.render_ms
            );
        }
        draw_calls
    }

    /// Rebuild every renderable's draw lists for each active pass of `camera`
    ///
    /// Later stages are updated first so a stage may derive its list from a
    /// later stage's list (shadow casters reuse the model list).
    pub fn update_draw_lists(&mut self, camera: Entity) {
        let Some(camera_component) = self.world.get_component_mut::<CameraComponent>(camera) else {
            misuse!("update_draw_lists: {camera:?} has no CameraComponent");
            return;
        };
        camera_component.clear_draw_lists();
        let passes: Vec<CameraPassId> = camera_component.active_passes().collect();

        let mut order = self.renderables_by_stage();
        order.sort_by_key(|&(stage, _)| Reverse(stage));

        for pass in passes {
            for &(_, index) in &order {
                let SystemEntry { system, entities, .. } = &mut self.systems[index];
                if let Some(renderable) = system.as_renderable() {
                    renderable.update_draw_list(&mut self.world, camera, pass, entities);
                }
            }
        }
    }

    /// Render one pass of `camera` from its current draw lists
    ///
    /// Binds and clears `target`, then runs every renderable in stage order.
    /// Returns the number of draw calls issued.
    pub fn render_camera(
        &mut self,
        camera: Entity,
        pass: CameraPassId,
        device: &mut dyn GraphicsDevice,
        target: Option<RenderTarget>,
    ) -> u32 {
        let Some(camera_component) = self.world.get_component::<CameraComponent>(camera) else {
            misuse!("render_camera: {camera:?} has no CameraComponent");
            return 0;
        };
        let clear_colour = camera_component.clear_colour();
        let viewport = target.map_or(self.viewport, |target| (target.width, target.height));

        gl_check!(device, bind_render_target(target.as_ref()));
        gl_check!(device, set_viewport(0, 0, viewport.0, viewport.1));
        gl_check!(device, clear(ClearMask::COLOUR | ClearMask::DEPTH, clear_colour));

        let order = self.renderables_by_stage();
        let mut ctx = RenderContext {
            world: &self.world,
            camera,
            pass,
            device,
            lighting: &mut self.lighting,
            target,
            viewport,
            draw_calls: 0,
        };
        for (stage, index) in order {
            let system = &mut self.systems[index].system;
            let name = system.name();
            if let Some(renderable) = system.as_renderable() {
                log::trace!("Rendering {name} ({stage:?}, {pass:?})");
                renderable.render(&mut ctx);
            }
        }
        ctx.draw_calls
    }

    /// Renderable system indices, stably sorted by stage
    fn renderables_by_stage(&self) -> Vec<(RenderStage, usize)> {
        let mut order: Vec<_> = self
            .systems
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.stage.map(|stage| (stage, index)))
            .collect();
        order.sort_by_key(|&(stage, _)| stage);
        order
    }

    /// Apply pending structural changes to the world and the entity lists
    fn sync(&mut self) {
        let changes = self.world.flush();
        if !changes.is_empty() {
            self.apply_changes(&changes);
        }
    }

    fn apply_changes(&mut self, changes: &WorldChanges) {
        for &entity in &changes.destroyed {
            for entry in &mut self.systems {
                entry.remove(entity);
            }
            if self.active_camera == Some(entity) {
                log::warn!("Active camera {entity:?} destroyed");
                self.active_camera = None;
            }
            if self.lighting.sun == Some(entity) {
                log::debug!("Sun {entity:?} destroyed, shadows disabled");
                self.lighting.sun = None;
                self.lighting.clear_shadow();
            }
            self.outbox.push(Message::entity_destroyed(entity));
        }

        for &entity in &changes.changed {
            for entry in &mut self.systems {
                entry.refresh(&self.world, entity);
            }
        }

        for entry in &mut self.systems {
            entry.compact();
        }
    }
}

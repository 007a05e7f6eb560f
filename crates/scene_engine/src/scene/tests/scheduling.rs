use super::{cube, lit_material, spawn_model};
use crate::ecs::components::{ModelComponent, TimedCallbackComponent, TransformComponent};
use crate::ecs::{ComponentMask, Entity, System, SystemContext, World};
use crate::events::{Message, MessageBus, MessageHandler, MessageType};
use crate::foundation::math::Vec3;
use crate::render::ModelRenderer;
use crate::scene::Scene;

/// Destroys its victim mid-batch and checks the victim stays readable
struct Destroyer {
    signature: ComponentMask,
    victim: Entity,
    readable_after_destroy: bool,
    visited: Vec<Entity>,
}

impl System for Destroyer {
    fn name(&self) -> &'static str {
        "Destroyer"
    }

    fn signature(&self) -> ComponentMask {
        self.signature
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entities: &[Entity], _dt: f32) {
        for &entity in entities {
            self.visited.push(entity);
            if entity == self.victim {
                ctx.world.destroy_entity(entity);
                self.readable_after_destroy = ctx.world.get_component::<TransformComponent>(entity).is_some();
            }
        }
    }
}

/// Records what it is handed and membership notifications
#[derive(Default)]
struct Observer {
    signature: ComponentMask,
    seen: Vec<Entity>,
    added: Vec<Entity>,
    removed: Vec<Entity>,
}

impl System for Observer {
    fn name(&self) -> &'static str {
        "Observer"
    }

    fn signature(&self) -> ComponentMask {
        self.signature
    }

    fn process(&mut self, _ctx: &mut SystemContext<'_>, entities: &[Entity], _dt: f32) {
        self.seen = entities.to_vec();
    }

    fn on_entity_added(&mut self, _world: &World, entity: Entity) {
        self.added.push(entity);
    }

    fn on_entity_removed(&mut self, entity: Entity) {
        self.removed.push(entity);
    }
}

fn observer(signature: ComponentMask) -> Observer {
    Observer { signature, ..Observer::default() }
}

fn models() -> ComponentMask {
    ComponentMask::new().with::<TransformComponent>().with::<ModelComponent>()
}

struct Listener {
    consume: bool,
    received: u32,
}

impl System for Listener {
    fn name(&self) -> &'static str {
        "Listener"
    }

    fn signature(&self) -> ComponentMask {
        ComponentMask::new()
    }

    fn as_message_handler(&mut self) -> Option<&mut dyn MessageHandler> {
        Some(self)
    }
}

impl MessageHandler for Listener {
    fn on_message(&mut self, _world: &mut World, _message: &Message) -> bool {
        self.received += 1;
        self.consume
    }
}

#[test]
fn test_destroy_during_process_applies_before_next_system() {
    let mut scene = Scene::new();
    let victim = spawn_model(scene.world_mut(), Vec3::new(0.0, 0.0, -5.0));
    let survivor = spawn_model(scene.world_mut(), Vec3::new(1.0, 0.0, -5.0));

    scene.add_system(Destroyer {
        signature: ComponentMask::new().with::<ModelComponent>(),
        victim,
        readable_after_destroy: false,
        visited: Vec::new(),
    });
    scene.add_system(observer(models()));

    let mut bus = MessageBus::new();
    scene.simulate(&mut bus, 0.016);

    let destroyer = scene.system::<Destroyer>().expect("registered");
    assert!(destroyer.readable_after_destroy);
    // the victim comes first, so the survivor is only reached after the destroy
    assert_eq!(destroyer.visited, vec![victim, survivor]);
    let observer = scene.system::<Observer>().expect("registered");
    assert_eq!(observer.seen, vec![survivor]);
    assert_eq!(observer.removed, vec![victim]);
    assert!(!scene.world().is_alive(victim));

    bus.begin_frame();
    let messages = bus.poll();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_type, MessageType::EntityDestroyed);
    assert_eq!(messages[0].get_entity(), Some(victim));
}

#[test]
fn test_bulk_destroy_keeps_survivors_in_insertion_order() {
    let mut scene = Scene::new();
    scene.add_system(observer(models()));
    let spawned: Vec<Entity> = (0..3000)
        .map(|i| spawn_model(scene.world_mut(), Vec3::new(i as f32, 0.0, -5.0)))
        .collect();

    let mut bus = MessageBus::new();
    scene.simulate(&mut bus, 0.016);
    assert_eq!(scene.system_entities::<Observer>(), &spawned[..]);

    for &entity in spawned.iter().step_by(2) {
        scene.world_mut().destroy_entity(entity);
    }
    scene.simulate(&mut bus, 0.016);

    let survivors: Vec<Entity> = spawned.iter().copied().skip(1).step_by(2).collect();
    assert_eq!(scene.system_entities::<Observer>(), &survivors[..]);
    let observer = scene.system::<Observer>().expect("registered");
    assert_eq!(observer.seen, survivors);
    assert_eq!(observer.removed.len(), 1500);
}

#[test]
fn test_entity_lists_follow_signature_changes() {
    let mut scene = Scene::new();
    scene.add_system(observer(models()));
    let entity = scene.world_mut().create_entity();
    scene
        .world_mut()
        .add_component(entity, TransformComponent::from_position(Vec3::new(0.0, 0.0, -5.0)));

    let mut bus = MessageBus::new();
    scene.simulate(&mut bus, 0.016);
    assert!(scene.system_entities::<Observer>().is_empty());

    let model = ModelComponent::new(cube(), vec![lit_material()]).expect("valid mesh");
    scene.world_mut().add_component(entity, model);
    scene.simulate(&mut bus, 0.016);
    assert_eq!(scene.system_entities::<Observer>(), &[entity]);

    scene.world_mut().remove_component::<ModelComponent>(entity);
    scene.simulate(&mut bus, 0.016);
    let observer = scene.system::<Observer>().expect("registered");
    assert!(observer.seen.is_empty());
    assert_eq!(observer.added, vec![entity]);
    assert_eq!(observer.removed, vec![entity]);
}

#[test]
fn test_late_registration_seeds_entity_list() {
    let mut scene = Scene::new();
    let entity = spawn_model(scene.world_mut(), Vec3::zeros());
    scene.add_system(ModelRenderer::new());

    assert_eq!(scene.system_entities::<ModelRenderer>(), &[entity]);
    assert!(scene.system::<ModelRenderer>().is_some());
    assert!(scene.system_mut::<Observer>().is_none());
}

#[test]
fn test_forward_message_stops_at_first_consumer() {
    let mut scene = Scene::new();
    scene.add_system(Listener { consume: true, received: 0 });
    scene.add_system(observer(ComponentMask::new().with::<TransformComponent>()));

    let message = Message::new(MessageType::Custom(7));
    assert!(scene.forward_message(&message));
    assert_eq!(scene.system::<Listener>().map(|listener| listener.received), Some(1));

    scene.system_mut::<Listener>().expect("registered").consume = false;
    assert!(!scene.forward_message(&message));
    assert_eq!(scene.system::<Listener>().map(|listener| listener.received), Some(2));
}

#[test]
fn test_finished_callback_destroys_its_entity() {
    let mut scene = Scene::new();
    let entity = scene.world_mut().create_entity();
    scene
        .world_mut()
        .add_component(entity, TimedCallbackComponent::new(3, 0.5).started().destroy_when_finished());

    let mut bus = MessageBus::new();
    scene.simulate(&mut bus, 0.3);
    assert!(scene.world().is_alive(entity));

    scene.simulate(&mut bus, 0.3);
    assert!(!scene.world().is_alive(entity));

    bus.begin_frame();
    let kinds: Vec<MessageType> = bus.poll().iter().map(|message| message.message_type).collect();
    assert_eq!(kinds, vec![MessageType::CallbackFired, MessageType::EntityDestroyed]);
}

//! System trait and capabilities
//!
//! A system declares the component signature it needs and receives the list
//! of matching entities, maintained incrementally by the scene. Optional
//! capabilities (rendering, message handling) are exposed through
//! `as_renderable` / `as_message_handler` instead of inheritance.

use std::any::Any;

use super::{ComponentMask, Entity, World};
use crate::events::{MessageBus, MessageHandler};
use crate::render::Renderable;

/// Mutable state a system may touch while processing
pub struct SystemContext<'a> {
    /// Entity storage; structural changes take effect at the next sync point
    pub world: &'a mut World,
    /// Outgoing messages, delivered on the next frame tick
    pub messages: &'a mut MessageBus,
}

/// Downcasting support for boxed systems
pub trait AsAny: Any {
    /// Upcast to `&dyn Any`
    fn as_any(&self) -> &dyn Any;

    /// Upcast to `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// System trait for processing entities and components
pub trait System: AsAny {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Components an entity must have to be handed to this system
    fn signature(&self) -> ComponentMask;

    /// Per-frame update over the matching entities, in entity-list order
    fn process(&mut self, _ctx: &mut SystemContext<'_>, _entities: &[Entity], _dt: f32) {}

    /// An entity started matching the signature
    fn on_entity_added(&mut self, _world: &World, _entity: Entity) {}

    /// An entity stopped matching (or was destroyed; its handle is then stale)
    fn on_entity_removed(&mut self, _entity: Entity) {}

    /// Rendering capability
    fn as_renderable(&mut self) -> Option<&mut dyn Renderable> {
        None
    }

    /// Message handling capability
    fn as_message_handler(&mut self) -> Option<&mut dyn MessageHandler> {
        None
    }
}

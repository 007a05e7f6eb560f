//! Message bus for decoupled inter-system communication
//!
//! - Key-value arguments (no order dependency)
//! - Double-buffered: messages posted during frame N are delivered in frame N+1,
//!   so every message is consumed exactly once per frame tick
//! - Handlers return bool (true = consumed, stops forwarding)

use std::collections::HashMap;

use crate::ecs::{Entity, World};

/// Message type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// An entity was removed at a sync point
    EntityDestroyed,
    /// A timed callback finished a cycle
    CallbackFired,
    /// Application-defined message
    Custom(u32),
}

/// Variant for type-safe message arguments
#[derive(Debug, Clone, PartialEq)]
pub enum MessageArg {
    /// Entity handle
    Entity(Entity),
    /// Callback identifier
    CallbackId(u32),
    /// Scalar payload
    Value(f32),
    /// Free-form text payload
    Text(String),
}

/// Message with type ID and key-value arguments
#[derive(Debug, Clone)]
pub struct Message {
    /// Type of message
    pub message_type: MessageType,
    args: HashMap<&'static str, MessageArg>,
}

impl Message {
    /// Create a new message with the given type
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            args: HashMap::new(),
        }
    }

    /// `EntityDestroyed` message for `entity`
    pub fn entity_destroyed(entity: Entity) -> Self {
        Self::new(MessageType::EntityDestroyed).with_arg("entity", MessageArg::Entity(entity))
    }

    /// `CallbackFired` message for the callback `id` attached to `entity`
    pub fn callback_fired(entity: Entity, id: u32) -> Self {
        Self::new(MessageType::CallbackFired)
            .with_arg("entity", MessageArg::Entity(entity))
            .with_arg("callback_id", MessageArg::CallbackId(id))
    }

    /// Add an argument to the message (builder pattern)
    pub fn with_arg(mut self, key: &'static str, value: MessageArg) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Get an argument by key
    pub fn get_arg(&self, key: &str) -> Option<&MessageArg> {
        self.args.get(key)
    }

    /// Get the `entity` argument if present
    pub fn get_entity(&self) -> Option<Entity> {
        match self.get_arg("entity") {
            Some(MessageArg::Entity(entity)) => Some(*entity),
            _ => None,
        }
    }

    /// Get the `callback_id` argument if present
    pub fn get_callback_id(&self) -> Option<u32> {
        match self.get_arg("callback_id") {
            Some(MessageArg::CallbackId(id)) => Some(*id),
            _ => None,
        }
    }
}

/// Message handler capability
///
/// Returns true if the message was consumed (stops forwarding to later
/// handlers), false to let it continue.
pub trait MessageHandler {
    /// Handle a message
    fn on_message(&mut self, world: &mut World, message: &Message) -> bool;
}

/// Double-buffered message queue
#[derive(Debug, Default)]
pub struct MessageBus {
    delivering: Vec<Message>,
    pending: Vec<Message>,
    frame: u64,
}

impl MessageBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for delivery on the next frame tick
    pub fn post(&mut self, message: Message) {
        log::trace!("Posted {:?}", message.message_type);
        self.pending.push(message);
    }

    /// Start a frame tick: everything posted since the previous tick becomes
    /// deliverable and undelivered messages from the previous tick are dropped
    pub fn begin_frame(&mut self) {
        if !self.delivering.is_empty() {
            log::debug!("Dropping {} unpolled messages", self.delivering.len());
        }
        self.delivering = std::mem::take(&mut self.pending);
        self.frame += 1;
    }

    /// Take this tick's messages; a second call in the same tick returns nothing
    pub fn poll(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.delivering)
    }

    /// Messages waiting for the next tick
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of `begin_frame` calls so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Clear all queued messages (useful for state transitions)
    pub fn clear(&mut self) {
        self.delivering.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_delivered_next_tick_exactly_once() {
        let mut bus = MessageBus::new();
        bus.post(Message::new(MessageType::Custom(7)));

        assert!(bus.poll().is_empty());

        bus.begin_frame();
        let delivered = bus.poll();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].message_type, MessageType::Custom(7));
        assert!(bus.poll().is_empty());

        bus.begin_frame();
        assert!(bus.poll().is_empty());
    }

    #[test]
    fn test_posting_while_delivering_defers_to_next_tick() {
        let mut bus = MessageBus::new();
        bus.post(Message::new(MessageType::Custom(1)));
        bus.begin_frame();

        for _ in bus.poll() {
            bus.post(Message::new(MessageType::Custom(2)));
        }
        assert_eq!(bus.pending_len(), 1);

        bus.begin_frame();
        assert_eq!(bus.poll()[0].message_type, MessageType::Custom(2));
    }

    #[test]
    fn test_typed_argument_accessors() {
        let mut world = World::new();
        let entity = world.create_entity();
        let message = Message::callback_fired(entity, 3);

        assert_eq!(message.get_entity(), Some(entity));
        assert_eq!(message.get_callback_id(), Some(3));
        assert_eq!(Message::new(MessageType::Custom(0)).get_entity(), None);
    }
}

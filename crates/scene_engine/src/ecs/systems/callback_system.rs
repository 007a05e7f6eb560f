//! Advances timed callbacks and posts their messages

use crate::ecs::components::{CallbackState, TimedCallbackComponent};
use crate::ecs::{ComponentMask, Entity, System, SystemContext};
use crate::events::Message;

/// Upper bound on catch-up messages a repeating timer posts in one frame
pub const MAX_FIRES_PER_TICK: u32 = 8;

/// Drives [`TimedCallbackComponent`] timers
#[derive(Debug)]
pub struct CallbackSystem {
    signature: ComponentMask,
}

impl Default for CallbackSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackSystem {
    /// Create the system
    pub fn new() -> Self {
        Self {
            signature: ComponentMask::new().with::<TimedCallbackComponent>(),
        }
    }
}

impl System for CallbackSystem {
    fn name(&self) -> &'static str {
        "CallbackSystem"
    }

    fn signature(&self) -> ComponentMask {
        self.signature
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entities: &[Entity], dt: f32) {
        for &entity in entities {
            let Some(callback) = ctx.world.get_component_mut::<TimedCallbackComponent>(entity) else {
                continue;
            };
            if callback.state != CallbackState::Running {
                continue;
            }

            callback.elapsed += dt;
            if callback.elapsed < callback.duration {
                continue;
            }

            let fired = if !callback.repeat {
                callback.elapsed = callback.duration;
                callback.state = CallbackState::Finished;
                1
            } else if callback.duration > 0.0 {
                let cycles = (callback.elapsed / callback.duration).floor();
                callback.elapsed %= callback.duration;
                // Saturating float cast
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let cycles = cycles as u32;
                cycles.min(MAX_FIRES_PER_TICK)
            } else {
                // A zero-length cycle fires once per frame
                callback.elapsed = 0.0;
                1
            };
            callback.fired = callback.fired.saturating_add(fired);

            let id = callback.id;
            let destroy = callback.state == CallbackState::Finished && callback.destroy_on_finish;
            for _ in 0..fired {
                ctx.messages.post(Message::callback_fired(entity, id));
            }
            if destroy {
                log::debug!("Callback {id} finished, destroying {entity:?}");
                ctx.world.destroy_entity(entity);
            }
        }
    }
}

//! Refreshes camera pass matrices from camera transforms

use crate::ecs::components::{CameraComponent, TransformComponent};
use crate::ecs::{ComponentMask, Entity, System, SystemContext};

/// Built into every scene; runs after user systems so pass matrices reflect
/// this frame's final camera transforms
#[derive(Debug)]
pub struct CameraSystem {
    signature: ComponentMask,
}

impl Default for CameraSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSystem {
    /// Create the system
    pub fn new() -> Self {
        Self {
            signature: ComponentMask::new().with::<TransformComponent>().with::<CameraComponent>(),
        }
    }
}

impl System for CameraSystem {
    fn name(&self) -> &'static str {
        "CameraSystem"
    }

    fn signature(&self) -> ComponentMask {
        self.signature
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, entities: &[Entity], _dt: f32) {
        for &entity in entities {
            let world_matrix = ctx.world.world_transform(entity);
            if let Some(camera) = ctx.world.get_component_mut::<CameraComponent>(entity) {
                camera.update_passes(&world_matrix);
            }
        }
    }
}

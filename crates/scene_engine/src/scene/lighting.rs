//! Scene-owned lighting state
//!
//! The shadow stage writes the sun's view-projection and depth map here; the
//! world stage reads them in the same frame. Stage order guarantees the write
//! happens first.

use crate::ecs::Entity;
use crate::foundation::math::Mat4;
use crate::render::device::TextureId;

/// Lighting shared between render stages
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLighting {
    /// Entity whose transform and [`SunlightComponent`](crate::ecs::components::SunlightComponent) drive the sun
    pub sun: Option<Entity>,
    /// Sun projection * sun view, identity until a shadow pass has run
    pub sun_view_projection: Mat4,
    /// Depth texture from the latest shadow pass
    pub shadow_map: Option<TextureId>,
}

impl Default for SceneLighting {
    fn default() -> Self {
        Self {
            sun: None,
            sun_view_projection: Mat4::identity(),
            shadow_map: None,
        }
    }
}

impl SceneLighting {
    /// Forget the previous shadow pass so the world stage renders unshadowed
    pub fn clear_shadow(&mut self) {
        self.sun_view_projection = Mat4::identity();
        self.shadow_map = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_shadow_keeps_sun() {
        let mut lighting = SceneLighting {
            sun_view_projection: Mat4::new_scaling(2.0),
            shadow_map: Some(TextureId(3)),
            ..SceneLighting::default()
        };
        lighting.clear_shadow();
        assert_eq!(lighting, SceneLighting::default());
    }
}

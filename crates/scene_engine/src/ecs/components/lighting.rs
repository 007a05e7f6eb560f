//! Lighting components
//!
//! Pure data: the sun used by the shadow pass, the shadow-caster tag, and
//! point-light volumes accumulated by the light-volume pass.

use crate::ecs::Component;
use crate::foundation::math::Vec3;

/// Directional sunlight; its transform's -Z axis is the light direction
#[derive(Debug, Clone, PartialEq)]
pub struct SunlightComponent {
    /// RGB colour (0.0 to 1.0 range)
    pub colour: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
}

impl Component for SunlightComponent {}

impl Default for SunlightComponent {
    fn default() -> Self {
        Self {
            colour: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
        }
    }
}

/// Tag: the entity's model is rendered into the shadow map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShadowCasterComponent;

impl Component for ShadowCasterComponent {}

/// Point light rendered as a sphere proxy into the light-volume buffer
#[derive(Debug, Clone, PartialEq)]
pub struct LightVolumeComponent {
    /// RGB colour
    pub colour: Vec3,
    /// Falloff radius; the proxy sphere is scaled to it
    pub radius: f32,
    /// Intensity multiplier
    pub intensity: f32,
    /// Disabled lights are skipped by culling
    pub enabled: bool,
}

impl Component for LightVolumeComponent {}

/// Factory functions for creating light components
pub struct LightFactory;

impl LightFactory {
    /// Sunlight with the given colour and intensity
    pub fn sun(colour: Vec3, intensity: f32) -> SunlightComponent {
        SunlightComponent { colour, intensity }
    }

    /// Point light volume
    pub fn point(colour: Vec3, intensity: f32, radius: f32) -> LightVolumeComponent {
        LightVolumeComponent {
            colour,
            radius: radius.max(0.0),
            intensity,
            enabled: true,
        }
    }
}

//! Scene management
//!
//! A [`Scene`] owns the entity [`World`](crate::ecs::World), the registered
//! systems and the lighting state, and drives one frame at a time:
//!
//! ```text
//! forward_message (per polled message)
//!      ↓
//! simulate: user systems → skeletal animation → callbacks → cameras
//!      ↓
//! render: draw lists for every active camera pass, then
//!         Shadow → LightVolume → World → Overlay
//! ```
//!
//! Structural changes (component add/remove, destroy) take effect at sync
//! points: the start of `simulate`, after each system's `process`, and the
//! start of `render`.

mod lighting;
mod scene_manager;
mod stats;

#[cfg(test)]
mod tests;

pub use lighting::SceneLighting;
pub use scene_manager::Scene;
pub use stats::SceneStats;

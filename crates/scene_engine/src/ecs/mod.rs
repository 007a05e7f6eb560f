//! Entity-Component-System implementation
//!
//! Generational entities, per-type component pools with signature masks, the
//! transform hierarchy and the built-in systems.

pub mod component;
pub mod components;
pub mod entity;
pub mod hierarchy;
pub mod storage;
pub mod system;
pub mod systems;
pub mod world;

pub use component::{Component, ComponentMask};
pub use entity::Entity;
pub use hierarchy::MAX_HIERARCHY_DEPTH;
pub use system::{System, SystemContext};
pub use world::{World, WorldChanges};

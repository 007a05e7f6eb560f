//! Generational entity handles
//!
//! An [`Entity`] is a slot map key: a slot index paired with a version. When
//! an entity is destroyed its slot's version is bumped, so any handle still
//! holding the old version is detectably stale. The world keeps the entity
//! table in a [`SlotMap`](slotmap::SlotMap) and every per-entity side table
//! in a [`SecondaryMap`](slotmap::SecondaryMap) keyed by the same handle.

slotmap::new_key_type! {
    /// Entity identifier
    pub struct Entity;
}

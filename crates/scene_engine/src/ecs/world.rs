//! ECS World implementation
//!
//! The world owns the entity table, one pool per component type and the
//! per-entity signature masks. Structural changes (component add/remove,
//! destruction) are recorded and handed to the scheduler at the next sync
//! point through [`World::flush`].

use std::any::{Any, TypeId};
use std::collections::HashMap;

use slotmap::SlotMap;

use super::components::TransformComponent;
use super::storage::{AnyPool, ComponentPool};
use super::{Component, ComponentMask, Entity};

/// Structural changes collected between two sync points
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorldChanges {
    /// Live entities whose signature changed, in first-change order
    pub changed: Vec<Entity>,
    /// Entities removed at this sync point (their handles are now stale)
    pub destroyed: Vec<Entity>,
}

impl WorldChanges {
    /// True when nothing happened since the previous flush
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.destroyed.is_empty()
    }
}

/// Entity table entry
#[derive(Debug, Clone, Copy, Default)]
struct EntityRecord {
    mask: ComponentMask,
    pending_destroy: bool,
    changed: bool,
}

/// ECS World containing all entities and components
#[derive(Default)]
pub struct World {
    entities: SlotMap<Entity, EntityRecord>,
    pools: HashMap<TypeId, Box<dyn AnyPool>>,
    pending_destroy: Vec<Entity>,
    changed: Vec<Entity>,
}

/// Reports a programming error: halts debug builds, logs in release.
macro_rules! misuse {
    ($($arg:tt)+) => {{
        debug_assert!(false, $($arg)+);
        log::error!($($arg)+);
    }};
}
pub(crate) use misuse;

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new entity with an empty signature
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.entities.insert(EntityRecord::default());
        log::trace!("Created {entity:?}");
        entity
    }

    /// Schedule `entity` for destruction at the next sync point.
    ///
    /// Its components remain readable until then, so a system iterating a
    /// batch can destroy entities without invalidating the batch.
    pub fn destroy_entity(&mut self, entity: Entity) {
        let Some(record) = self.entities.get_mut(entity) else {
            misuse!("destroy_entity called with stale handle {entity:?}");
            return;
        };
        if !record.pending_destroy {
            record.pending_destroy = true;
            log::trace!("Scheduled {entity:?} for destruction");
            self.pending_destroy.push(entity);
        }
    }

    /// Whether the handle refers to a live entity (including ones pending destruction)
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    /// Whether `entity` will be removed at the next sync point
    pub fn is_pending_destroy(&self, entity: Entity) -> bool {
        self.entities.get(entity).is_some_and(|record| record.pending_destroy)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate all live entities in slot order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys()
    }

    /// Live entities whose signature contains `required`, in slot order
    pub fn entities_matching(&self, required: ComponentMask) -> Vec<Entity> {
        self.entities
            .iter()
            .filter(|(_, record)| record.mask.contains(required))
            .map(|(entity, _)| entity)
            .collect()
    }

    /// Signature of `entity` (empty for stale handles)
    pub fn mask(&self, entity: Entity) -> ComponentMask {
        self.entities.get(entity).map_or_else(ComponentMask::new, |record| record.mask)
    }

    /// Add a component to an entity, replacing any existing one of the same type.
    ///
    /// A replaced [`TransformComponent`] hands its parent and children to the
    /// new value, so the hierarchy survives the swap.
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        if !self.entities.contains_key(entity) {
            misuse!(
                "add_component::<{}> called with stale handle {entity:?}",
                std::any::type_name::<T>()
            );
            return;
        }

        let replaced = self.pool_mut_or_insert::<T>().insert(entity, component);
        if let Some(mut replaced) = replaced {
            log::debug!("Replaced {} on {entity:?}", std::any::type_name::<T>());
            if let Some(previous) = (&mut replaced as &mut dyn Any).downcast_mut::<TransformComponent>() {
                self.inherit_links(entity, previous);
            }
            return;
        }
        if let Some(record) = self.entities.get_mut(entity) {
            record.mask.insert::<T>();
        }
        self.mark_changed(entity);
    }

    /// Remove a component from an entity and return it
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        if !self.entities.contains_key(entity) {
            misuse!(
                "remove_component::<{}> called with stale handle {entity:?}",
                std::any::type_name::<T>()
            );
            return None;
        }

        let removed = self.pool_mut::<T>().and_then(|pool| pool.remove(entity));
        if removed.is_none() {
            misuse!("{entity:?} has no {} to remove", std::any::type_name::<T>());
            return None;
        }
        if let Some(record) = self.entities.get_mut(entity) {
            record.mask.remove::<T>();
        }
        self.mark_changed(entity);
        removed
    }

    /// Get a component from an entity
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.entities.contains_key(entity) {
            return None;
        }
        self.pool::<T>().and_then(|pool| pool.get(entity))
    }

    /// Get a mutable component from an entity
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.entities.contains_key(entity) {
            return None;
        }
        self.pool_mut::<T>().and_then(|pool| pool.get_mut(entity))
    }

    /// Whether `entity` currently has a `T`
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.get_component::<T>(entity).is_some()
    }

    /// Borrow a component that must exist
    ///
    /// # Panics
    /// Panics if the handle is stale or the component is missing.
    pub fn component<T: Component>(&self, entity: Entity) -> &T {
        match self.get_component::<T>(entity) {
            Some(component) => component,
            None => panic!("{entity:?} has no {}", std::any::type_name::<T>()),
        }
    }

    /// Mutably borrow a component that must exist
    ///
    /// # Panics
    /// Panics if the handle is stale or the component is missing.
    pub fn component_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        match self.get_component_mut::<T>(entity) {
            Some(component) => component,
            None => panic!("{entity:?} has no {}", std::any::type_name::<T>()),
        }
    }

    /// Sync point: apply pending destruction and hand over the change lists
    pub fn flush(&mut self) -> WorldChanges {
        let pending = std::mem::take(&mut self.pending_destroy);

        // Unlink first, while every pending node is still alive
        for &entity in &pending {
            self.unlink_destroyed(entity);
        }

        let mut destroyed = Vec::with_capacity(pending.len());
        for entity in pending {
            if self.entities.remove(entity).is_none() {
                continue;
            }
            for pool in self.pools.values_mut() {
                pool.clear(entity);
            }
            log::trace!("Destroyed {entity:?}");
            destroyed.push(entity);
        }

        let mut changed = std::mem::take(&mut self.changed);
        changed.retain(|&entity| match self.entities.get_mut(entity) {
            Some(record) => {
                record.changed = false;
                true
            }
            None => false,
        });

        WorldChanges { changed, destroyed }
    }

    fn mark_changed(&mut self, entity: Entity) {
        if let Some(record) = self.entities.get_mut(entity) {
            if !record.changed {
                record.changed = true;
                self.changed.push(entity);
            }
        }
    }

    fn pool<T: Component>(&self) -> Option<&ComponentPool<T>> {
        self.pools
            .get(&TypeId::of::<T>())
            .and_then(|pool| pool.as_any().downcast_ref::<ComponentPool<T>>())
    }

    fn pool_mut<T: Component>(&mut self) -> Option<&mut ComponentPool<T>> {
        self.pools
            .get_mut(&TypeId::of::<T>())
            .and_then(|pool| pool.as_any_mut().downcast_mut::<ComponentPool<T>>())
    }

    fn pool_mut_or_insert<T: Component>(&mut self) -> &mut ComponentPool<T> {
        let pool = self
            .pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(ComponentPool::<T>::new()));
        match pool.as_any_mut().downcast_mut::<ComponentPool<T>>() {
            Some(pool) => pool,
            None => unreachable!("pool registered under the wrong TypeId"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, PartialEq)]
    struct Armor(u32);
    impl Component for Armor {}

    #[test]
    fn test_add_and_get_component() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.add_component(entity, Health(100));

        assert_eq!(world.get_component::<Health>(entity), Some(&Health(100)));
        assert!(!world.has_component::<Armor>(entity));

        world.component_mut::<Health>(entity).0 = 50;
        assert_eq!(world.component::<Health>(entity), &Health(50));
    }

    #[test]
    fn test_destroy_is_deferred_until_flush() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.add_component(entity, Health(1));
        world.flush();

        world.destroy_entity(entity);
        assert!(world.is_alive(entity));
        assert!(world.has_component::<Health>(entity));

        let changes = world.flush();
        assert_eq!(changes.destroyed, vec![entity]);
        assert!(!world.is_alive(entity));
        assert!(world.get_component::<Health>(entity).is_none());
    }

    #[test]
    fn test_recycled_slot_does_not_inherit_components() {
        let mut world = World::new();
        let old = world.create_entity();
        world.add_component(old, Health(7));
        world.destroy_entity(old);
        world.flush();

        let new = world.create_entity();
        assert_ne!(new, old);
        assert!(world.get_component::<Health>(new).is_none());
        assert!(world.get_component::<Health>(old).is_none());
    }

    #[test]
    fn test_flush_reports_signature_changes_once() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        world.add_component(a, Health(1));
        world.add_component(a, Armor(1));
        world.add_component(b, Armor(2));

        let changes = world.flush();
        assert_eq!(changes.changed, vec![a, b]);
        assert!(world.flush().is_empty());
    }

    #[test]
    fn test_bulk_destroy_reports_each_entity_once() {
        let mut world = World::new();
        let entities: Vec<Entity> = (0..2000)
            .map(|i| {
                let entity = world.create_entity();
                world.add_component(entity, Health(i));
                entity
            })
            .collect();
        assert_eq!(world.flush().changed, entities);

        for &entity in entities.iter().chain(&entities) {
            world.destroy_entity(entity);
        }
        assert!(world.is_pending_destroy(entities[1234]));

        let changes = world.flush();
        assert_eq!(changes.destroyed, entities);
        assert_eq!(world.entity_count(), 0);
        assert!(world.flush().is_empty());
    }

    #[test]
    fn test_entities_matching_signature() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        world.add_component(a, Health(1));
        world.add_component(b, Health(1));
        world.add_component(b, Armor(1));

        let required = ComponentMask::new().with::<Health>().with::<Armor>();
        assert_eq!(world.entities_matching(required), vec![b]);
    }

    #[test]
    #[should_panic(expected = "has no")]
    fn test_component_panics_when_missing() {
        let mut world = World::new();
        let entity = world.create_entity();
        let _ = world.component::<Health>(entity);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "stale handle")]
    fn test_stale_handle_halts_debug_builds() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.destroy_entity(entity);
        world.flush();
        world.add_component(entity, Health(1));
    }
}

//! Per-type component pools
//!
//! Each component type lives in its own [`SecondaryMap`] keyed by [`Entity`].
//! Liveness of the owning entity is checked by the [`World`](super::World);
//! the pool only rejects handles older than what it already stores.

use std::any::Any;

use slotmap::SecondaryMap;

use super::{Component, Entity};

/// Type-erased view of a pool, so the world can clear an entity from every
/// pool when it is destroyed
pub trait AnyPool {
    /// Drop the component stored for `entity`, if any
    fn clear(&mut self, entity: Entity);

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Storage for one component type
pub struct ComponentPool<T: Component> {
    components: SecondaryMap<Entity, T>,
}

impl<T: Component> Default for ComponentPool<T> {
    fn default() -> Self {
        Self { components: SecondaryMap::new() }
    }
}

impl<T: Component> ComponentPool<T> {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `component` for `entity`, returning the previous occupant
    pub fn insert(&mut self, entity: Entity, component: T) -> Option<T> {
        self.components.insert(entity, component)
    }

    /// Remove the component stored for `entity`
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        self.components.remove(entity)
    }

    /// Borrow the component stored for `entity`
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.components.get(entity)
    }

    /// Mutably borrow the component stored for `entity`
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.components.get_mut(entity)
    }

    /// Number of stored components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True when the pool holds nothing
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl<T: Component> AnyPool for ComponentPool<T> {
    fn clear(&mut self, entity: Entity) {
        self.remove(entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[test]
    fn test_pool_ignores_entities_without_component() {
        let mut entities: SlotMap<Entity, ()> = SlotMap::with_key();
        let a = entities.insert(());
        let b = entities.insert(());

        let mut pool = ComponentPool::new();
        assert!(pool.insert(b, Health(10)).is_none());

        assert_eq!(pool.get(b), Some(&Health(10)));
        assert_eq!(pool.get(a), None);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_recycled_handle_does_not_see_old_component() {
        let mut entities: SlotMap<Entity, ()> = SlotMap::with_key();
        let old = entities.insert(());
        let mut pool = ComponentPool::new();
        pool.insert(old, Health(3));

        entities.remove(old);
        let new = entities.insert(());

        assert!(pool.get(new).is_none());
        assert_eq!(pool.insert(new, Health(4)), None);
        assert!(pool.get(old).is_none());
    }

    #[test]
    fn test_clear_through_erased_pool() {
        let mut entities: SlotMap<Entity, ()> = SlotMap::with_key();
        let entity = entities.insert(());
        let never_stored = entities.insert(());
        let mut pool = ComponentPool::new();
        pool.insert(entity, Health(1));

        let erased: &mut dyn AnyPool = &mut pool;
        erased.clear(entity);
        erased.clear(never_stored);

        assert!(pool.is_empty());
    }
}

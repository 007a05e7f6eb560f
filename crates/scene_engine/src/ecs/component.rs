//! Component trait and signature masks

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Marker trait for components
///
/// Components are plain data stored in per-type pools owned by the
/// [`World`](super::World). They are not required to be `Send`: the core is
/// single-threaded and the transform cache uses interior mutability.
pub trait Component: 'static {}

/// Maximum number of distinct component types a process may register
pub const MAX_COMPONENT_TYPES: u32 = 64;

fn registry() -> &'static Mutex<HashMap<TypeId, u32>> {
    static REGISTRY: OnceLock<Mutex<HashMap<TypeId, u32>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Bit assigned to component type `T`, registering it on first use
///
/// # Panics
/// Registering more than [`MAX_COMPONENT_TYPES`] component types is a
/// programming error.
pub fn component_bit<T: Component>() -> u32 {
    let mut bits = registry().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let next = u32::try_from(bits.len()).unwrap_or(u32::MAX);
    let bit = *bits.entry(TypeId::of::<T>()).or_insert(next);
    assert!(
        bit < MAX_COMPONENT_TYPES,
        "component type limit ({MAX_COMPONENT_TYPES}) exceeded registering {}",
        std::any::type_name::<T>()
    );
    bit
}

/// Set of component types, used both as an entity's signature and as a
/// system's required signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// Empty mask
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Builder: add component type `T`
    #[must_use]
    pub fn with<T: Component>(self) -> Self {
        Self(self.0 | (1 << component_bit::<T>()))
    }

    /// Add component type `T`
    pub fn insert<T: Component>(&mut self) {
        self.0 |= 1 << component_bit::<T>();
    }

    /// Remove component type `T`
    pub fn remove<T: Component>(&mut self) {
        self.0 &= !(1 << component_bit::<T>());
    }

    /// Whether component type `T` is in the set
    pub fn has<T: Component>(self) -> bool {
        self.0 & (1 << component_bit::<T>()) != 0
    }

    /// Whether every type in `required` is also in `self`
    #[must_use]
    pub const fn contains(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// True when no component type is set
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bits
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position;
    impl Component for Position {}

    struct Velocity;
    impl Component for Velocity {}

    #[test]
    fn test_signature_matching() {
        let signature = ComponentMask::new().with::<Position>();
        let entity_mask = ComponentMask::new().with::<Position>().with::<Velocity>();

        assert!(entity_mask.contains(signature));
        assert!(!signature.contains(entity_mask));
        assert!(entity_mask.contains(ComponentMask::new()));
    }

    #[test]
    fn test_bits_are_stable_per_type() {
        assert_eq!(component_bit::<Position>(), component_bit::<Position>());
        assert_ne!(component_bit::<Position>(), component_bit::<Velocity>());
    }

    #[test]
    fn test_insert_and_remove() {
        let mut mask = ComponentMask::new();
        mask.insert::<Velocity>();
        assert!(mask.has::<Velocity>());
        mask.remove::<Velocity>();
        assert!(mask.is_empty());
    }
}

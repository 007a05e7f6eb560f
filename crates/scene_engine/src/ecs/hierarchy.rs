//! Transform hierarchy operations
//!
//! World matrices are computed lazily: mutating a node marks it and every
//! descendant dirty, and [`World::world_transform`] recomputes only the dirty
//! part of the parent chain. Because a node only becomes clean after its
//! parent, a dirty node always has an entirely dirty subtree.

use super::components::TransformComponent;
use super::world::misuse;
use super::{Entity, World};
use crate::foundation::math::{Mat4, Mat4Ext, Quat, Vec3};

/// Debug-build guard against runaway parent chains
pub const MAX_HIERARCHY_DEPTH: usize = 1024;

impl World {
    /// Set the local position
    pub fn set_position(&mut self, entity: Entity, position: Vec3) {
        self.modify_transform(entity, |transform| transform.position = position);
    }

    /// Set the local rotation
    pub fn set_rotation(&mut self, entity: Entity, rotation: Quat) {
        self.modify_transform(entity, |transform| transform.rotation = rotation);
    }

    /// Set the local scale
    pub fn set_scale(&mut self, entity: Entity, scale: Vec3) {
        self.modify_transform(entity, |transform| transform.scale = scale);
    }

    /// Set the local pivot origin
    pub fn set_origin(&mut self, entity: Entity, origin: Vec3) {
        self.modify_transform(entity, |transform| transform.origin = origin);
    }

    /// Move by `offset` in parent space
    pub fn translate(&mut self, entity: Entity, offset: Vec3) {
        self.modify_transform(entity, |transform| transform.position += offset);
    }

    /// Apply `delta` on top of the current local rotation
    pub fn rotate(&mut self, entity: Entity, delta: Quat) {
        self.modify_transform(entity, |transform| transform.rotation = delta * transform.rotation);
    }

    /// Multiply the local scale component-wise
    pub fn scale_by(&mut self, entity: Entity, factor: Vec3) {
        self.modify_transform(entity, |transform| {
            transform.scale = transform.scale.component_mul(&factor);
        });
    }

    /// Parent of `entity` in the transform hierarchy
    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.get_component::<TransformComponent>(entity).and_then(TransformComponent::parent)
    }

    /// Children of `entity` in attachment order
    pub fn children(&self, entity: Entity) -> &[Entity] {
        self.get_component::<TransformComponent>(entity)
            .map_or(&[][..], TransformComponent::children)
    }

    /// World matrix of `entity`, recomputed through the parent chain if dirty
    pub fn world_transform(&self, entity: Entity) -> Mat4 {
        if !self.has_component::<TransformComponent>(entity) {
            misuse!("world_transform: {entity:?} has no TransformComponent");
            return Mat4::identity();
        }
        self.resolve_world(entity, 0)
    }

    /// Attach `child` under `parent` (or make it a root), keeping its local transform
    pub fn set_parent(&mut self, child: Entity, parent: Option<Entity>) {
        if !self.can_reparent(child, parent) {
            return;
        }

        if let Some(old_parent) = self.parent(child) {
            if let Some(old) = self.get_component_mut::<TransformComponent>(old_parent) {
                old.children.retain(|&c| c != child);
            }
        }
        if let Some(new_parent) = parent {
            if let Some(new) = self.get_component_mut::<TransformComponent>(new_parent) {
                new.children.push(child);
            }
        }
        if let Some(transform) = self.get_component_mut::<TransformComponent>(child) {
            transform.parent = parent;
        }

        self.mark_subtree_dirty(child);
        log::trace!("Reparented {child:?} under {parent:?}");
    }

    /// Attach `child` under `parent`, recomputing its local transform so the
    /// world transform does not change
    pub fn set_parent_keep_world(&mut self, child: Entity, parent: Option<Entity>) {
        if !self.can_reparent(child, parent) {
            return;
        }

        let world = self.world_transform(child);
        let parent_world = parent.map_or_else(Mat4::identity, |p| self.world_transform(p));
        let local = parent_world.inverse_or_identity() * world;

        self.set_parent(child, parent);
        self.modify_transform(child, |transform| transform.set_local_matrix(&local));
    }

    /// Detach a node that is about to be destroyed: it leaves its parent's
    /// child list and its children become roots with their local transform kept
    pub(crate) fn unlink_destroyed(&mut self, entity: Entity) {
        let Some(transform) = self.get_component_mut::<TransformComponent>(entity) else {
            return;
        };
        let parent = transform.parent.take();
        let children = std::mem::take(&mut transform.children);

        if let Some(parent) = parent {
            if let Some(parent_transform) = self.get_component_mut::<TransformComponent>(parent) {
                parent_transform.children.retain(|&c| c != entity);
            }
        }
        for child in children {
            if let Some(child_transform) = self.get_component_mut::<TransformComponent>(child) {
                child_transform.parent = None;
            }
            self.mark_subtree_dirty(child);
        }
    }

    /// Hand the hierarchy links of a replaced transform to its replacement.
    ///
    /// The replacement starts dirty, so its children are dirtied explicitly.
    pub(crate) fn inherit_links(&mut self, entity: Entity, previous: &mut TransformComponent) {
        let children = std::mem::take(&mut previous.children);
        for &child in &children {
            self.mark_subtree_dirty(child);
        }
        if let Some(transform) = self.get_component_mut::<TransformComponent>(entity) {
            transform.parent = previous.parent.take();
            transform.children = children;
            transform.dirty.set(true);
        }
    }

    fn modify_transform(&mut self, entity: Entity, apply: impl FnOnce(&mut TransformComponent)) {
        let Some(transform) = self.get_component_mut::<TransformComponent>(entity) else {
            misuse!("{entity:?} has no TransformComponent to modify");
            return;
        };
        apply(transform);
        self.mark_subtree_dirty(entity);
    }

    fn mark_subtree_dirty(&self, root: Entity) {
        let mut stack = vec![root];
        while let Some(entity) = stack.pop() {
            let Some(transform) = self.get_component::<TransformComponent>(entity) else {
                continue;
            };
            // Dirty nodes already have dirty subtrees
            if transform.dirty.replace(true) {
                continue;
            }
            stack.extend_from_slice(&transform.children);
        }
    }

    fn resolve_world(&self, entity: Entity, depth: usize) -> Mat4 {
        debug_assert!(
            depth < MAX_HIERARCHY_DEPTH,
            "transform hierarchy deeper than {MAX_HIERARCHY_DEPTH} at {entity:?}; cycle?"
        );
        let Some(transform) = self.get_component::<TransformComponent>(entity) else {
            return Mat4::identity();
        };
        if !transform.dirty.get() {
            return transform.world.get();
        }

        let parent_world = transform
            .parent
            .map_or_else(Mat4::identity, |parent| self.resolve_world(parent, depth + 1));
        let world = parent_world * transform.local_matrix();
        transform.world.set(world);
        transform.dirty.set(false);
        world
    }

    fn can_reparent(&self, child: Entity, parent: Option<Entity>) -> bool {
        if !self.has_component::<TransformComponent>(child) {
            misuse!("set_parent: {child:?} has no TransformComponent");
            return false;
        }
        let Some(parent) = parent else {
            return true;
        };
        if !self.has_component::<TransformComponent>(parent) {
            misuse!("set_parent: parent {parent:?} has no TransformComponent");
            return false;
        }

        let mut ancestor = Some(parent);
        while let Some(node) = ancestor {
            if node == child {
                misuse!("set_parent: attaching {child:?} under {parent:?} would form a cycle");
                return false;
            }
            ancestor = self.parent(node);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::utils;
    use approx::assert_relative_eq;

    fn spawn(world: &mut World, position: Vec3) -> Entity {
        let entity = world.create_entity();
        world.add_component(entity, TransformComponent::from_position(position));
        entity
    }

    #[test]
    fn test_abc_translation_chain() {
        let mut world = World::new();
        let a = spawn(&mut world, Vec3::zeros());
        let b = spawn(&mut world, Vec3::new(1.0, 0.0, 0.0));
        let c = spawn(&mut world, Vec3::new(1.0, 0.0, 0.0));
        world.set_parent(b, Some(a));
        world.set_parent(c, Some(b));

        let translation = utils::translation(&world.world_transform(c));
        assert_relative_eq!(translation, Vec3::new(2.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_deep_chain_world_is_parent_times_local() {
        let mut world = World::new();
        let mut chain = vec![spawn(&mut world, Vec3::new(0.5, 1.0, 0.0))];
        for depth in 1..7 {
            let node = spawn(&mut world, Vec3::new(1.0, 0.0, 0.25));
            world.set_rotation(node, Quat::from_axis_angle(&Vec3::y_axis(), 0.1 * depth as f32));
            world.set_scale(node, Vec3::new(1.1, 0.9, 1.0));
            world.set_parent(node, chain.last().copied());
            chain.push(node);
        }

        // Mutate the root after everything was cached
        for &node in &chain {
            world.world_transform(node);
        }
        world.translate(chain[0], Vec3::new(0.0, -3.0, 0.0));

        for pair in chain.windows(2) {
            let (parent, child) = (pair[0], pair[1]);
            let local = world.component::<TransformComponent>(child).local_matrix();
            assert_relative_eq!(
                world.world_transform(child),
                world.world_transform(parent) * local,
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn test_world_transform_is_idempotent() {
        let mut world = World::new();
        let parent = spawn(&mut world, Vec3::new(1.0, 2.0, 3.0));
        let child = spawn(&mut world, Vec3::new(0.0, 1.0, 0.0));
        world.set_parent(child, Some(parent));

        assert!(world.component::<TransformComponent>(child).is_dirty());
        let first = world.world_transform(child);
        assert!(!world.component::<TransformComponent>(child).is_dirty());
        assert!(!world.component::<TransformComponent>(parent).is_dirty());

        let second = world.world_transform(child);
        assert_eq!(first, second);
        assert!(!world.component::<TransformComponent>(child).is_dirty());
    }

    #[test]
    fn test_mutating_parent_dirties_descendants() {
        let mut world = World::new();
        let root = spawn(&mut world, Vec3::zeros());
        let mid = spawn(&mut world, Vec3::x());
        let leaf = spawn(&mut world, Vec3::x());
        world.set_parent(mid, Some(root));
        world.set_parent(leaf, Some(mid));
        world.world_transform(leaf);

        world.set_position(root, Vec3::new(0.0, 5.0, 0.0));

        assert!(world.component::<TransformComponent>(mid).is_dirty());
        assert!(world.component::<TransformComponent>(leaf).is_dirty());
        let translation = utils::translation(&world.world_transform(leaf));
        assert_relative_eq!(translation, Vec3::new(2.0, 5.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_origin_pivots_scale() {
        let mut world = World::new();
        let node = spawn(&mut world, Vec3::new(1.0, 0.0, 0.0));
        world.set_origin(node, Vec3::new(1.0, 0.0, 0.0));
        world.scale_by(node, Vec3::new(2.0, 2.0, 2.0));
        world.scale_by(node, Vec3::new(1.5, 1.0, 1.0));

        assert_relative_eq!(world.component::<TransformComponent>(node).scale(), Vec3::new(3.0, 2.0, 2.0));
        // the origin maps onto the position
        let pivot = world.world_transform(node).transform_point(&Vec3::new(1.0, 0.0, 0.0).into());
        assert_relative_eq!(pivot.coords, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_replacing_parent_transform_keeps_children_attached() {
        let mut world = World::new();
        let root = spawn(&mut world, Vec3::zeros());
        let parent = spawn(&mut world, Vec3::zeros());
        let child = spawn(&mut world, Vec3::new(1.0, 0.0, 0.0));
        world.set_parent(parent, Some(root));
        world.set_parent(child, Some(parent));
        let _ = world.world_transform(child);

        world.add_component(parent, TransformComponent::from_position(Vec3::new(0.0, 5.0, 0.0)));
        assert_eq!(world.children(parent), &[child]);
        assert_eq!(world.parent(parent), Some(root));
        assert_eq!(world.children(root), &[parent]);
        assert_relative_eq!(
            utils::translation(&world.world_transform(child)),
            Vec3::new(1.0, 5.0, 0.0),
            epsilon = 1e-6
        );

        world.set_position(parent, Vec3::new(0.0, 7.0, 0.0));
        assert_relative_eq!(
            utils::translation(&world.world_transform(child)),
            Vec3::new(1.0, 7.0, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_reparent_preserves_local_by_default() {
        let mut world = World::new();
        let first = spawn(&mut world, Vec3::new(10.0, 0.0, 0.0));
        let second = spawn(&mut world, Vec3::new(0.0, 10.0, 0.0));
        let child = spawn(&mut world, Vec3::new(1.0, 0.0, 0.0));
        world.set_parent(child, Some(first));
        world.world_transform(child);

        world.set_parent(child, Some(second));

        assert!(world.children(first).is_empty());
        assert_eq!(world.children(second), &[child]);
        let translation = utils::translation(&world.world_transform(child));
        assert_relative_eq!(translation, Vec3::new(1.0, 10.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_reparent_keep_world_compensates_local() {
        let mut world = World::new();
        let parent = spawn(&mut world, Vec3::new(4.0, 0.0, 0.0));
        world.set_scale(parent, Vec3::new(2.0, 2.0, 2.0));
        let child = spawn(&mut world, Vec3::new(1.0, 1.0, 1.0));
        let before = world.world_transform(child);

        world.set_parent_keep_world(child, Some(parent));

        assert_relative_eq!(world.world_transform(child), before, epsilon = 1e-5);
        assert_relative_eq!(
            world.component::<TransformComponent>(child).position(),
            Vec3::new(-1.5, 0.5, 0.5),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_destroying_parent_orphans_children() {
        let mut world = World::new();
        let parent = spawn(&mut world, Vec3::new(3.0, 0.0, 0.0));
        let child = spawn(&mut world, Vec3::new(1.0, 0.0, 0.0));
        world.set_parent(child, Some(parent));
        world.world_transform(child);

        world.destroy_entity(parent);
        world.flush();

        assert_eq!(world.parent(child), None);
        let translation = utils::translation(&world.world_transform(child));
        assert_relative_eq!(translation, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "cycle")]
    fn test_cycle_is_a_programming_error() {
        let mut world = World::new();
        let a = spawn(&mut world, Vec3::zeros());
        let b = spawn(&mut world, Vec3::zeros());
        world.set_parent(b, Some(a));
        world.set_parent(a, Some(b));
    }
}

// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The entity registry: liveness, per-entity composition and typed storage.

use telos_core::ecs::{Component, ComponentMask, ComponentTypeId, EntityId, MAX_ENTITIES};

use crate::ecs::bitset::FixedBitset;
use crate::ecs::registry::{ComponentRegistry, ComponentSet};
use crate::ecs::storage::{AnyStore, Store, StoreKind};

/// The central container of the ECS: entity liveness, composition bitmasks,
/// and one storage container per registered component type.
///
/// An entity is live iff its bit is set in the liveness bitset; its
/// composition bitmask records which component types are currently attached
/// and is the sole predicate used for group iteration. The composition bit
/// and the storage slot are always updated under the same `&mut World`
/// borrow, so no reader can observe one without the other.
pub struct World {
    registry: ComponentRegistry,
    alive: FixedBitset,
    compositions: Vec<ComponentMask>,
    stores: Vec<Box<dyn AnyStore>>,
}

impl World {
    /// Creates an empty world with the full fixed-capacity universe.
    pub fn new() -> Self {
        Self {
            registry: ComponentRegistry::new(),
            alive: FixedBitset::new(MAX_ENTITIES),
            compositions: vec![ComponentMask::EMPTY; MAX_ENTITIES],
            stores: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Component registration
    // ─────────────────────────────────────────────────────────────────────

    /// Registers component type `T` with the given storage strategy.
    ///
    /// Must happen before startup freezes the registry. Duplicate
    /// registration is logged and returns the existing id without touching
    /// the original store; registration after the freeze is logged and
    /// refused.
    pub fn register_component<T: Component + Default>(
        &mut self,
        kind: StoreKind,
    ) -> Option<ComponentTypeId> {
        if let Some(existing) = self.registry.type_id_of::<T>() {
            log::warn!(
                "Component type {} registered twice; keeping the first registration.",
                std::any::type_name::<T>()
            );
            return Some(existing);
        }

        let id = self.registry.register::<T>()?;
        debug_assert_eq!(id.0 as usize, self.stores.len());
        self.stores.push(Box::new(Store::<T>::new(kind)));
        Some(id)
    }

    /// Freezes the component registry. Called once at startup.
    pub fn freeze(&mut self) {
        self.registry.freeze();
        log::debug!(
            "Component registry frozen with {} registered types.",
            self.registry.len()
        );
    }

    /// Read access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// ORs the registered bits of every type in `S` into one query mask.
    ///
    /// Returns `None` (with a logged diagnostic) if any member type was
    /// never registered.
    pub fn mask_of<S: ComponentSet>(&self) -> Option<ComponentMask> {
        S::mask(&self.registry)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Entity lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Creates an entity at the first free index at or after `hint`.
    ///
    /// No wrapping is performed: if every index in `[hint, MAX_ENTITIES)` is
    /// taken the universe is treated as full, the condition is logged, and
    /// `None` is returned. The new entity's composition is empty.
    pub fn create_entity(&mut self, hint: u32) -> Option<EntityId> {
        match self.alive.set_next_unset_from(hint as usize) {
            Some(index) => {
                self.compositions[index] = ComponentMask::EMPTY;
                Some(EntityId(index as u32))
            }
            None => {
                log::warn!(
                    "Entity universe full ({} slots); cannot create at or after index {}.",
                    MAX_ENTITIES,
                    hint
                );
                None
            }
        }
    }

    /// Creates an entity at exactly the given id.
    ///
    /// Fails (logged, `None`) if the id is outside the universe or already
    /// live.
    pub fn create_entity_in_place(&mut self, id: EntityId) -> Option<EntityId> {
        if !id.in_universe() {
            log::error!("Cannot create {id}: outside the fixed universe.");
            return None;
        }
        if self.alive.get(id.index()) {
            log::warn!("Cannot create {id} in place: already live.");
            return None;
        }
        self.alive.set(id.index());
        self.compositions[id.index()] = ComponentMask::EMPTY;
        Some(id)
    }

    /// Destroys an entity: clears its liveness bit and composition, and
    /// releases its slot in every registered store.
    ///
    /// Returns `false` if the entity was not live.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        if !id.in_universe() || !self.alive.get(id.index()) {
            return false;
        }
        self.alive.unset(id.index());
        self.compositions[id.index()] = ComponentMask::EMPTY;
        for store in &mut self.stores {
            store.destroy_any(id);
        }
        true
    }

    /// Returns `true` if `id` is currently live.
    pub fn entity_exists(&self, id: EntityId) -> bool {
        id.in_universe() && self.alive.get(id.index())
    }

    /// Returns `true` if `id` is live and its composition contains every bit
    /// of `mask`.
    pub fn entity_has_components(&self, id: EntityId, mask: ComponentMask) -> bool {
        self.entity_exists(id) && self.compositions[id.index()].contains_all(mask)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.alive.count_set()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Component lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Adds component `T` to an entity with its default value, overwriting
    /// any previous value, and returns the slot.
    ///
    /// The composition bit is set under the same borrow as the storage
    /// write. Fails (logged, `None`) for unregistered types and non-live
    /// entities; [`EntityId::SINGLETON`] bypasses the liveness check since
    /// the pseudo-entity is never "created".
    pub fn add_component<T: Component + Default>(&mut self, id: EntityId) -> Option<&mut T> {
        self.add_component_with(id, T::default())
    }

    /// Like [`World::add_component`] but with an explicit value.
    pub fn add_component_with<T: Component + Default>(
        &mut self,
        id: EntityId,
        component: T,
    ) -> Option<&mut T> {
        let type_id = match self.registry.type_id_of::<T>() {
            Some(type_id) => type_id,
            None => {
                log::error!(
                    "AddComponent on unregistered type {}.",
                    std::any::type_name::<T>()
                );
                return None;
            }
        };
        if id != EntityId::SINGLETON && !self.entity_exists(id) {
            log::warn!("AddComponent on non-live {id}.");
            return None;
        }

        let store = self.stores[type_id.0 as usize]
            .as_any_mut()
            .downcast_mut::<Store<T>>()?;
        store.add_with(id, component)?;
        // Storage slot is initialized above, before the composition bit
        // becomes visible.
        if id != EntityId::SINGLETON {
            self.compositions[id.index()] = self.compositions[id.index()].union(type_id.mask());
        }
        store.get_mut(id)
    }

    /// Removes component `T` from an entity: clears the composition bit and
    /// asks the store to release the slot (a no-op for dense storage).
    ///
    /// Returns `false` if the entity was not live, the type is unregistered,
    /// or the bit was not set.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> bool {
        let Some(type_id) = self.registry.type_id_of::<T>() else {
            log::error!(
                "RemoveComponent on unregistered type {}.",
                std::any::type_name::<T>()
            );
            return false;
        };

        if id == EntityId::SINGLETON {
            self.stores[type_id.0 as usize].destroy_any(id);
            return true;
        }
        if !self.entity_exists(id) {
            return false;
        }

        let composition = &mut self.compositions[id.index()];
        if !composition.contains_all(type_id.mask()) {
            return false;
        }
        *composition = composition.difference(type_id.mask());
        self.stores[type_id.0 as usize].destroy_any(id);
        true
    }

    /// Returns the component `T` of an entity.
    ///
    /// For dense and singleton storage this always answers for live ids —
    /// the default value if the component was never added; for sparse and
    /// tag storage a missing component yields `None`.
    pub fn get_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        if id != EntityId::SINGLETON && !self.entity_exists(id) {
            return None;
        }
        self.store::<T>()?.get(id)
    }

    /// Mutable variant of [`World::get_component`].
    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        if id != EntityId::SINGLETON && !self.entity_exists(id) {
            return None;
        }
        self.store_mut::<T>()?.get_mut(id)
    }

    /// Returns the process-wide singleton instance of `T`.
    pub fn singleton<T: Component>(&self) -> Option<&T> {
        self.get_component::<T>(EntityId::SINGLETON)
    }

    /// Mutable variant of [`World::singleton`].
    pub fn singleton_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.get_component_mut::<T>(EntityId::SINGLETON)
    }

    /// Returns the typed store of `T`, if registered.
    ///
    /// Exposed for hot loops that want the dense escape hatch
    /// ([`Store::slots`]); everything else goes through the typed accessors.
    pub fn store<T: Component>(&self) -> Option<&Store<T>> {
        let type_id = self.registry.type_id_of::<T>()?;
        self.stores[type_id.0 as usize]
            .as_any()
            .downcast_ref::<Store<T>>()
    }

    /// Mutable variant of [`World::store`].
    pub fn store_mut<T: Component>(&mut self) -> Option<&mut Store<T>> {
        let type_id = self.registry.type_id_of::<T>()?;
        self.stores[type_id.0 as usize]
            .as_any_mut()
            .downcast_mut::<Store<T>>()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Group iteration
    // ─────────────────────────────────────────────────────────────────────

    /// The primitive underlying group iteration: the first live id in
    /// `[start, end)` whose composition contains every bit of `mask`.
    pub fn next_entity_with(
        &self,
        mask: ComponentMask,
        start: u32,
        end: u32,
    ) -> Option<EntityId> {
        let end = (end as usize).min(MAX_ENTITIES);
        let mut index = start as usize;
        while index < end {
            // The liveness bitset skips dead ranges faster than the
            // composition scan would.
            index = match self.alive.next_set_from(index) {
                Some(next) if next < end => next,
                _ => return None,
            };
            if self.compositions[index].contains_all(mask) {
                return Some(EntityId(index as u32));
            }
            index += 1;
        }
        None
    }

    /// Diagnostic count of live entities matching `mask`: a full linear
    /// scan, not meant for hot loops.
    pub fn count(&self, mask: ComponentMask) -> usize {
        let mut total = 0;
        let mut cursor = 0u32;
        while let Some(id) = self.next_entity_with(mask, cursor, MAX_ENTITIES as u32) {
            total += 1;
            cursor = id.0 + 1;
        }
        total
    }

    /// Lazy ascending cursor over the live entities matching `mask`.
    ///
    /// The iterator borrows the world, so structural mutation (creating or
    /// destroying entities, adding or removing the queried components) while
    /// a group cursor is alive does not compile; restart iteration after
    /// structural changes by re-deriving the mask.
    pub fn group(&self, mask: ComponentMask) -> GroupIter<'_> {
        self.group_range(mask, 0, MAX_ENTITIES as u32)
    }

    /// Like [`World::group`], limited to ids in `[start, end)`.
    ///
    /// This is the primitive system splitting is built on: disjoint ranges
    /// of the same mask iterate disjoint entities.
    pub fn group_range(&self, mask: ComponentMask, start: u32, end: u32) -> GroupIter<'_> {
        GroupIter {
            world: self,
            mask,
            cursor: start,
            end,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// An iterator over the live entities matching a component mask, in
/// ascending id order. Created by [`World::group`].
pub struct GroupIter<'a> {
    world: &'a World,
    mask: ComponentMask,
    cursor: u32,
    end: u32,
}

impl Iterator for GroupIter<'_> {
    type Item = EntityId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self
            .world
            .next_entity_with(self.mask, self.cursor, self.end)?;
        self.cursor = id.0 + 1;
        Some(id)
    }
}

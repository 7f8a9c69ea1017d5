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

//! The component type registry: maps component types to their dense ids.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use telos_core::ecs::{Component, ComponentMask, ComponentTypeId};

/// A registry that maps component types to their [`ComponentTypeId`]s.
///
/// Bit assignment is monotonic and never reused within a process lifetime:
/// a type gets its id exactly once, at registration time, before any entity
/// is created. The registry is frozen at startup — registering afterwards is
/// a configuration error that is logged and refused, never fatal.
#[derive(Default)]
pub struct ComponentRegistry {
    mapping: HashMap<TypeId, ComponentTypeId>,
    names: Vec<&'static str>,
    frozen: bool,
}

impl ComponentRegistry {
    /// Creates an empty, unfrozen registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next free id to `T`.
    ///
    /// Returns `None` (with a logged diagnostic) after the registry is
    /// frozen or once the [`ComponentMask::CAPACITY`] distinct types are
    /// exhausted. The caller is expected to have checked for duplicates via
    /// [`ComponentRegistry::type_id_of`] first.
    pub(crate) fn register<T: Component>(&mut self) -> Option<ComponentTypeId> {
        debug_assert!(
            !self.mapping.contains_key(&TypeId::of::<T>()),
            "duplicate registration must be handled by the caller"
        );
        if self.frozen {
            log::error!(
                "Cannot register component type {} after startup.",
                type_name::<T>()
            );
            return None;
        }
        if self.names.len() >= ComponentMask::CAPACITY {
            log::error!(
                "Component type capacity ({}) exhausted; {} not registered.",
                ComponentMask::CAPACITY,
                type_name::<T>()
            );
            return None;
        }

        let id = ComponentTypeId(self.names.len() as u16);
        self.mapping.insert(TypeId::of::<T>(), id);
        self.names.push(type_name::<T>());
        Some(id)
    }

    /// Freezes the registry; later registrations are refused.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Returns `true` once [`ComponentRegistry::freeze`] has been called.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Returns the id assigned to `T`, if registered.
    pub fn type_id_of<T: Component>(&self) -> Option<ComponentTypeId> {
        self.mapping.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the single-bit mask of `T`, if registered.
    pub fn mask_of<T: Component>(&self) -> Option<ComponentMask> {
        self.type_id_of::<T>().map(ComponentTypeId::mask)
    }

    /// Returns the diagnostic name recorded for an id.
    pub fn name_of(&self, id: ComponentTypeId) -> Option<&'static str> {
        self.names.get(id.0 as usize).copied()
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no component type is registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A set of component types whose registered bits can be OR'd into one query
/// mask.
///
/// Implemented for tuples of component types, so a group query mask is
/// written as `world.mask_of::<(Position, Velocity)>()`. Returns `None`
/// (with a logged diagnostic) if any member type was never registered.
pub trait ComponentSet {
    /// ORs the registered bit of every member type, or `None` if one is
    /// missing from the registry.
    fn mask(registry: &ComponentRegistry) -> Option<ComponentMask>;
}

fn registered_mask<T: Component>(registry: &ComponentRegistry) -> Option<ComponentMask> {
    let mask = registry.mask_of::<T>();
    if mask.is_none() {
        log::error!(
            "Component type {} used in a query but never registered.",
            type_name::<T>()
        );
    }
    mask
}

// One implementation per arity instead of an open-ended recursion, following
// the same macro pattern as the access tuples.
macro_rules! impl_component_set_tuple {
    ($($S:ident),*) => {
        impl<$($S: Component),*> ComponentSet for ($($S,)*) {
            fn mask(registry: &ComponentRegistry) -> Option<ComponentMask> {
                let mut mask = ComponentMask::EMPTY;
                $(mask = mask.union(registered_mask::<$S>(registry)?);)*
                Some(mask)
            }
        }
    };
}

impl_component_set_tuple!(S1);
impl_component_set_tuple!(S1, S2);
impl_component_set_tuple!(S1, S2, S3);
impl_component_set_tuple!(S1, S2, S3, S4);
impl_component_set_tuple!(S1, S2, S3, S4, S5);
impl_component_set_tuple!(S1, S2, S3, S4, S5, S6);
impl_component_set_tuple!(S1, S2, S3, S4, S5, S6, S7);
impl_component_set_tuple!(S1, S2, S3, S4, S5, S6, S7, S8);

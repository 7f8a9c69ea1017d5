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

//! The four component storage strategies behind one container contract.

use std::any::Any;
use std::collections::HashMap;

use telos_core::ecs::{Component, EntityId, MAX_ENTITIES};

use crate::ecs::bitset::FixedBitset;

/// Selects the backing strategy of a component type at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// One slot per possible entity id. O(1) access, never frees, wastes
    /// space for rare components. `get` always yields a value for ids inside
    /// the universe — the default value if the component was never added.
    Dense,
    /// Hash map from id to value, for components present on a minority of
    /// entities. `destroy` erases the entry.
    Sparse,
    /// Exactly one instance, addressed through the singleton pseudo-entity;
    /// the id argument is ignored.
    Singleton,
    /// Zero-sized, presence-only. Backed purely by a bitset; no payload
    /// storage at all.
    Tag,
}

/// A typed component container.
///
/// This is a closed sum over exactly the four known strategies — no fifth
/// variant is ever added at the framework boundary, which is why the storage
/// family is an enum rather than an open trait hierarchy.
///
/// Note the deliberate asymmetry in `get`: for [`StoreKind::Sparse`] and
/// [`StoreKind::Tag`] a non-present id yields `None`, while
/// [`StoreKind::Dense`] and [`StoreKind::Singleton`] always yield a slot
/// (the default value if never written). Systems rely on this to avoid
/// branching on dense components.
pub enum Store<T: Component> {
    /// See [`StoreKind::Dense`].
    Dense {
        /// One slot per universe index.
        slots: Vec<T>,
    },
    /// See [`StoreKind::Sparse`].
    Sparse {
        /// Id → value.
        map: HashMap<u32, T>,
    },
    /// See [`StoreKind::Singleton`].
    Singleton {
        /// The process-wide instance.
        value: T,
    },
    /// See [`StoreKind::Tag`].
    Tag {
        /// Presence bits, one per universe index.
        present: FixedBitset,
        /// The canonical zero-sized instance handed out by `get`/`add` so
        /// the container contract stays uniform. Tag payloads are ZSTs, so
        /// this costs nothing.
        value: T,
    },
}

impl<T: Component + Default> Store<T> {
    /// Creates a store of the given kind.
    pub fn new(kind: StoreKind) -> Self {
        match kind {
            StoreKind::Dense => {
                let mut slots = Vec::new();
                slots.resize_with(MAX_ENTITIES, T::default);
                Store::Dense { slots }
            }
            StoreKind::Sparse => Store::Sparse {
                map: HashMap::new(),
            },
            StoreKind::Singleton => Store::Singleton {
                value: T::default(),
            },
            StoreKind::Tag => Store::Tag {
                present: FixedBitset::new(MAX_ENTITIES),
                value: T::default(),
            },
        }
    }

    /// Adds the component with its default value, overwriting any previous
    /// value, and returns the slot. `None` only for ids outside the store's
    /// addressable range.
    pub fn add(&mut self, id: EntityId) -> Option<&mut T> {
        self.add_with(id, T::default())
    }

    /// Releases every entry.
    ///
    /// Dense slots are reset to their default value; sparse entries are
    /// erased; the singleton is reset; tag bits are cleared.
    pub fn clear(&mut self) {
        match self {
            Store::Dense { slots } => {
                for slot in slots.iter_mut() {
                    *slot = T::default();
                }
            }
            Store::Sparse { map } => map.clear(),
            Store::Singleton { value } => *value = T::default(),
            Store::Tag { present, .. } => present.set_all(false),
        }
    }
}

impl<T: Component> Store<T> {
    /// Returns the kind of this store.
    pub fn kind(&self) -> StoreKind {
        match self {
            Store::Dense { .. } => StoreKind::Dense,
            Store::Sparse { .. } => StoreKind::Sparse,
            Store::Singleton { .. } => StoreKind::Singleton,
            Store::Tag { .. } => StoreKind::Tag,
        }
    }

    /// Returns the component for `id`.
    ///
    /// Dense and singleton stores always answer for addressable ids; sparse
    /// and tag stores answer only when the component is present.
    pub fn get(&self, id: EntityId) -> Option<&T> {
        match self {
            Store::Dense { slots } => slots.get(id.index()),
            Store::Sparse { map } => map.get(&id.0),
            Store::Singleton { value } => Some(value),
            Store::Tag { present, value } => present.get(id.index()).then_some(value),
        }
    }

    /// Mutable variant of [`Store::get`].
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        match self {
            Store::Dense { slots } => slots.get_mut(id.index()),
            Store::Sparse { map } => map.get_mut(&id.0),
            Store::Singleton { value } => Some(value),
            Store::Tag { present, value } => present.get(id.index()).then_some(value),
        }
    }

    /// Adds the component with the given value, overwriting any previous
    /// value, and returns the slot.
    pub fn add_with(&mut self, id: EntityId, component: T) -> Option<&mut T> {
        match self {
            Store::Dense { slots } => {
                let slot = slots.get_mut(id.index())?;
                *slot = component;
                Some(slot)
            }
            Store::Sparse { map } => {
                map.insert(id.0, component);
                map.get_mut(&id.0)
            }
            Store::Singleton { value } => {
                *value = component;
                Some(value)
            }
            Store::Tag { present, value } => {
                if id.index() >= present.capacity() {
                    return None;
                }
                present.set(id.index());
                Some(value)
            }
        }
    }

    /// Releases the entry for `id`. Idempotent for every variant.
    ///
    /// Dense storage never frees (the slot simply stops being addressed by
    /// live queries); sparse storage erases the map entry; tag storage
    /// unsets the bit; the singleton is untouched.
    pub fn destroy(&mut self, id: EntityId) {
        match self {
            Store::Dense { .. } => {}
            Store::Sparse { map } => {
                map.remove(&id.0);
            }
            Store::Singleton { .. } => {}
            Store::Tag { present, .. } => {
                if id.index() < present.capacity() {
                    present.unset(id.index());
                }
            }
        }
    }

    /// Direct indexed access to the dense slot array, or `None` for the
    /// other variants.
    ///
    /// This is the performance escape hatch for hot iteration loops: the
    /// slice is unchecked with respect to liveness, so the caller is
    /// responsible for only indexing live entities.
    pub fn slots(&self) -> Option<&[T]> {
        match self {
            Store::Dense { slots } => Some(slots),
            _ => None,
        }
    }

    /// Mutable variant of [`Store::slots`]. Same liveness caveat.
    pub fn slots_mut(&mut self) -> Option<&mut [T]> {
        match self {
            Store::Dense { slots } => Some(slots),
            _ => None,
        }
    }
}

/// An internal helper trait to perform container operations on a type-erased
/// `Box<dyn AnyStore>`.
///
/// This lets the `World` own one store per registered component type without
/// knowing the concrete `Store<T>` at compile time, and fan out entity
/// destruction to every store.
pub(crate) trait AnyStore: Send + Sync {
    /// Casts the trait object to `&dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Casts the trait object to `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Type-erased [`Store::destroy`].
    fn destroy_any(&mut self, id: EntityId);

    /// Type-erased [`Store::clear`].
    fn clear_any(&mut self);
}

impl<T: Component + Default> AnyStore for Store<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn destroy_any(&mut self, id: EntityId) {
        self.destroy(id);
    }

    fn clear_any(&mut self) {
        self.clear();
    }
}

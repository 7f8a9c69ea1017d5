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

//! Component identity: the marker trait, the dense per-process type id, and
//! the per-entity composition bitmask built from those ids.

use std::fmt;

/// A marker trait for types that can be used as components in the ECS.
///
/// This trait must be implemented for any struct you wish to attach to an
/// entity. The `'static` lifetime ensures that the component type does not
/// contain any non-static references, and `Send + Sync` are required to allow
/// the component data to be safely accessed from worker threads.
pub trait Component: 'static + Send + Sync {}

/// A dense, process-stable integer identifying a registered component type.
///
/// Ids are assigned monotonically at registration time, before startup, and
/// are never reused within a process lifetime. Each id maps to exactly one
/// bit of a [`ComponentMask`], which caps the number of distinct component
/// types at [`ComponentMask::CAPACITY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentTypeId(pub u16);

impl ComponentTypeId {
    /// Returns the single-bit mask owned by this type id.
    #[inline]
    pub fn mask(self) -> ComponentMask {
        debug_assert!((self.0 as usize) < ComponentMask::CAPACITY);
        ComponentMask(1u64 << self.0)
    }
}

/// A bitmask over registered component types.
///
/// One `ComponentMask` is kept per entity (its *composition*): the bit of a
/// component type is OR'd in when the component is added and cleared when it
/// is removed. `composition & query == query` is the sole predicate used for
/// group iteration, which keeps the matching test a pair of machine
/// instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ComponentMask(pub u64);

impl ComponentMask {
    /// The empty mask.
    pub const EMPTY: ComponentMask = ComponentMask(0);

    /// The number of distinct component types a process can register.
    pub const CAPACITY: usize = u64::BITS as usize;

    /// Returns `true` if no bit is set.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the union of the two masks.
    #[inline]
    pub fn union(self, other: ComponentMask) -> ComponentMask {
        ComponentMask(self.0 | other.0)
    }

    /// Returns this mask with every bit of `other` cleared.
    #[inline]
    pub fn difference(self, other: ComponentMask) -> ComponentMask {
        ComponentMask(self.0 & !other.0)
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    #[inline]
    pub fn contains_all(self, other: ComponentMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any bit is shared between the two masks.
    #[inline]
    pub fn intersects(self, other: ComponentMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns the number of set bits.
    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }
}

impl fmt::Display for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

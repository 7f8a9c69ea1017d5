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

//! Defines core types related to entities in the ECS architecture.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed capacity of the entity universe.
///
/// Every entity id is an index below this constant. Liveness is tracked by a
/// single bit per slot, so the memory cost of the universe is paid up front
/// and entity creation never allocates.
pub const MAX_ENTITIES: usize = 4096;

/// A unique identifier for an entity in the world.
///
/// An `EntityId` is a plain index into the fixed entity universe; it carries
/// no data itself. An id is *live* if and only if its bit is set in the
/// world's liveness bitset — handles are not reference counted, and a stale
/// handle simply fails the liveness check on its next use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// The "no entity" sentinel, returned where a lookup has no answer and
    /// stored in plain structs that need a null handle.
    pub const INVALID: EntityId = EntityId(u32::MAX);

    /// The singleton pseudo-entity.
    ///
    /// Process-wide component instances (world settings, mixer state, ...)
    /// are addressed through this id; singleton storage ignores the id
    /// entirely, so the value only needs to be distinct from every real slot.
    pub const SINGLETON: EntityId = EntityId(u32::MAX - 1);

    /// Returns the id as a storage index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` if this id is not the [`EntityId::INVALID`] sentinel.
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Returns `true` if this id addresses a slot inside the fixed universe.
    ///
    /// The sentinels ([`EntityId::INVALID`], [`EntityId::SINGLETON`]) are
    /// deliberately outside it.
    #[inline]
    pub fn in_universe(self) -> bool {
        (self.0 as usize) < MAX_ENTITIES
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Entity(invalid)")
        } else if *self == Self::SINGLETON {
            write!(f, "Entity(singleton)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

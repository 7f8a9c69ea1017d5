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

//! Implements the bit-mask-indexed Entity-Component-System storage.
//!
//! An entity is a plain index into a fixed universe; which component types it
//! currently carries is recorded in a per-entity composition bitmask, and the
//! component payloads live in per-type storage containers chosen at
//! registration time (dense, sparse, singleton or tag). Group iteration is a
//! single mask comparison per entity, which is what makes per-frame queries
//! cheap enough to run inside systems.
//!
//! The primary entry point is the [`World`] struct.

mod bitset;
mod commands;
mod registry;
mod storage;
mod world;

pub use bitset::FixedBitset;
pub use commands::CommandQueue;
pub use registry::{ComponentRegistry, ComponentSet};
pub use storage::{Store, StoreKind};
pub use world::{GroupIter, World};

pub use telos_core::ecs::{Component, ComponentMask, ComponentTypeId, EntityId, MAX_ENTITIES};

#[cfg(test)]
mod tests;

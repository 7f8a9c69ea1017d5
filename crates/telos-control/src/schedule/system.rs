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

//! The system execution model.
//!
//! A **system** is a unit of per-tick logic that declares which component
//! types and resources it reads and writes, and is scheduled based on those
//! declarations. Systems never receive `&mut World` directly — they operate
//! through a [`SystemContext`], whose accessors are only as safe as the
//! declared access is honest. Component storages carry no internal locks:
//! the graph's conflict analysis is the *sole* mechanism preventing data
//! races, and a system touching state outside its declaration is a
//! correctness violation the framework cannot detect at runtime.

use telos_core::ecs::{Component, ComponentMask, EntityId, MAX_ENTITIES};
use telos_core::Access;
use telos_data::ecs::{CommandQueue, ComponentSet, GroupIter, World};

/// A unit of per-tick logic with declared read/write dependencies.
///
/// Systems must be `Send + Sync` so they can be dispatched to worker
/// threads. Within one invocation, entity iteration through
/// [`SystemContext::group`] is ascending-id deterministic; across
/// concurrently dispatched systems there is no ordering guarantee beyond
/// the conflict freedom derived from [`System::access`].
pub trait System: Send + Sync {
    /// Stable, human-readable name; used for lookups and diagnostics.
    fn name(&self) -> &str;

    /// The declared access sets, fixed before the graph is finalized.
    fn access(&self) -> Access;

    /// Executes the system over the entity range carried by the context.
    fn run(&self, ctx: &mut SystemContext<'_>);

    /// Whether this system tolerates having its entity range partitioned
    /// into contiguous chunks run by separate workers.
    ///
    /// Splitting requires the logic to be safely re-entrant over disjoint
    /// entity ranges — no cross-entity accumulation without a synchronized
    /// reduction step. Defaults to `false`.
    fn splittable(&self) -> bool {
        false
    }
}

/// A concrete [`System`] backed by a function or closure.
///
/// The preferred way to define most simulation logic: no custom type, just
/// a name, an access declaration and the closure itself.
pub struct FnSystem<F>
where
    F: Fn(&mut SystemContext<'_>) + Send + Sync + 'static,
{
    name: &'static str,
    access: Access,
    splittable: bool,
    run: F,
}

impl<F> FnSystem<F>
where
    F: Fn(&mut SystemContext<'_>) + Send + Sync + 'static,
{
    /// Creates a function-backed system.
    pub fn new(name: &'static str, access: Access, run: F) -> Self {
        Self {
            name,
            access,
            splittable: false,
            run,
        }
    }

    /// Marks the system as safe to split over disjoint entity ranges.
    pub fn with_splitting(mut self) -> Self {
        self.splittable = true;
        self
    }
}

impl<F> System for FnSystem<F>
where
    F: Fn(&mut SystemContext<'_>) + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    fn access(&self) -> Access {
        self.access
    }

    fn run(&self, ctx: &mut SystemContext<'_>) {
        (self.run)(ctx)
    }

    fn splittable(&self) -> bool {
        self.splittable
    }
}

/// Wraps the frame's exclusive `&mut World` borrow for handoff to worker
/// threads.
///
/// This erases the lifetime so the pointer can travel inside `'static` job
/// closures. The dispatcher **must** block until every posted system job has
/// finished before the original borrow ends — that is what makes the erasure
/// sound, exactly like a stack-scoped context that is dropped before the
/// next frame.
#[derive(Clone, Copy)]
pub(crate) struct WorldSlot(*mut World);

// SAFETY: WorldSlot is only created by the dispatcher from an exclusive
// borrow, only used within the dispatch scope, and all aliasing between
// concurrent users is excluded by the declared-access conflict analysis.
unsafe impl Send for WorldSlot {}
unsafe impl Sync for WorldSlot {}

impl WorldSlot {
    /// Creates a `WorldSlot` from the frame's exclusive borrow.
    pub(crate) fn new(world: &mut World) -> Self {
        Self(world as *mut World)
    }

    /// Returns a shared reference to the world.
    ///
    /// # Safety contract
    ///
    /// Safe while the dispatch scope that created this slot is still
    /// blocking on its jobs.
    fn get(&self) -> &World {
        // SAFETY: guaranteed by the dispatch scope, see type docs.
        unsafe { &*self.0 }
    }

    /// Returns a mutable reference to the world.
    #[allow(clippy::mut_from_ref)]
    fn get_mut(&self) -> &mut World {
        // SAFETY: mutable aliasing between concurrently running systems is
        // excluded by the conflict-free schedule; see type docs.
        unsafe { &mut *self.0 }
    }
}

/// The controlled view a system gets of the world for one invocation.
///
/// Carries the step's delta time and the entity range this invocation owns
/// (the full universe unless the system was split). References obtained
/// through the accessors are scoped to the invocation — never store them
/// across frames.
pub struct SystemContext<'a> {
    world: WorldSlot,
    commands: &'a CommandQueue,
    dt: f32,
    range: (u32, u32),
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(
        world: WorldSlot,
        commands: &'a CommandQueue,
        dt: f32,
        range: (u32, u32),
    ) -> Self {
        Self {
            world,
            commands,
            dt,
            range,
        }
    }

    /// The delta time of this step, in seconds.
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// The entity range `[start, end)` this invocation owns.
    ///
    /// The full universe unless the system was split across workers.
    pub fn range(&self) -> (u32, u32) {
        self.range
    }

    /// ORs the registered bits of the component types in `S` into a query
    /// mask.
    pub fn mask_of<S: ComponentSet>(&self) -> Option<ComponentMask> {
        self.world.get().mask_of::<S>()
    }

    /// Iterates the live entities matching `mask` inside this invocation's
    /// range, in ascending id order.
    pub fn group(&self, mask: ComponentMask) -> GroupIter<'_> {
        let (start, end) = self.range;
        self.world.get().group_range(mask, start, end)
    }

    /// Diagnostic count of matching entities over the whole universe.
    pub fn count(&self, mask: ComponentMask) -> usize {
        self.world.get().count(mask)
    }

    /// Returns `true` if the entity is live and carries every bit of `mask`.
    pub fn has_components(&self, id: EntityId, mask: ComponentMask) -> bool {
        self.world.get().entity_has_components(id, mask)
    }

    /// Reads a component. Must be covered by the system's declared reads
    /// (or writes).
    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.world.get().get_component::<T>(id)
    }

    /// Writes a component. Must be covered by the system's declared writes.
    #[allow(clippy::mut_from_ref)]
    pub fn get_mut<T: Component>(&self, id: EntityId) -> Option<&mut T> {
        self.world.get_mut().get_component_mut::<T>(id)
    }

    /// Reads the process-wide singleton instance of `T`.
    pub fn singleton<T: Component>(&self) -> Option<&T> {
        self.world.get().singleton::<T>()
    }

    /// Writes the process-wide singleton instance of `T`. Must be covered by
    /// the system's declared writes.
    #[allow(clippy::mut_from_ref)]
    pub fn singleton_mut<T: Component>(&self) -> Option<&mut T> {
        self.world.get_mut().singleton_mut::<T>()
    }

    /// Defers a structural edit (create/destroy/add/remove) to the next safe
    /// point.
    ///
    /// Structural changes are never applied mid-step: the frame driver
    /// drains the queue between steps, where it holds the world exclusively.
    pub fn defer<F>(&self, command: F)
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        self.commands.push(command);
    }

    /// The full universe range, for systems that need to clamp their own
    /// sub-ranges.
    pub fn universe() -> (u32, u32) {
        (0, MAX_ENTITIES as u32)
    }
}

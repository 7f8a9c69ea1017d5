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

//! Subgraphs, timestep policy and the conflict-free dispatch plan.

use std::sync::Arc;

use telos_core::ecs::{ComponentMask, MAX_ENTITIES};
use telos_core::MultithreadingSettings;
use telos_data::ecs::{CommandQueue, World};

use crate::jobs::{Job, JobExecutorHandle};
use crate::schedule::system::{System, SystemContext, WorldSlot};

/// The maximum number of systems a single subgraph can hold, bounded by the
/// width of the conflict bitmask.
const MAX_SYSTEMS_PER_SUBGRAPH: usize = u64::BITS as usize;

struct SystemEntry {
    system: Arc<dyn System>,
    /// Component types this system touches, used for the matched-entity
    /// counts that gate the parallel plan.
    query_mask: ComponentMask,
    /// Bit `j` set ⇒ the earlier-registered system `j` conflicts with this
    /// one. Computed once at finalization, never per frame.
    earlier_conflicts: u64,
    active: bool,
}

/// A named, independently-steppable group of systems sharing a timestep
/// policy.
///
/// Execution order within a subgraph is registration order for correctness
/// purposes: when the parallel plan is engaged, a system still only starts
/// once every earlier-registered system it conflicts with has completed, so
/// later-registered systems observe earlier systems' writes within the same
/// step.
pub struct SystemSubgraph {
    name: String,
    /// If `> 0`, the subgraph accumulates real Δt and steps in fixed
    /// increments (catch-up policy); if `<= 0`, it steps exactly once per
    /// outer tick with the driving Δt.
    time_step: f32,
    accumulator: f32,
    enabled: bool,
    entries: Vec<SystemEntry>,
    finalized: bool,
}

impl SystemSubgraph {
    pub(crate) fn new(name: &str, time_step: f32) -> Self {
        Self {
            name: name.to_string(),
            time_step,
            accumulator: 0.0,
            enabled: true,
            entries: Vec::new(),
            finalized: false,
        }
    }

    /// The subgraph's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a system. Registration order is execution order between
    /// conflicting systems.
    ///
    /// Refused (logged, `false`) after finalization or when the subgraph is
    /// full.
    pub fn add_system(&mut self, system: Arc<dyn System>) -> bool {
        if self.finalized {
            log::error!(
                "Cannot register system '{}' in subgraph '{}' after startup.",
                system.name(),
                self.name
            );
            return false;
        }
        if self.entries.len() >= MAX_SYSTEMS_PER_SUBGRAPH {
            log::error!(
                "Subgraph '{}' is full ({MAX_SYSTEMS_PER_SUBGRAPH} systems); '{}' not added.",
                self.name,
                system.name()
            );
            return false;
        }

        let access = system.access();
        let query_mask = access.reads.union(access.writes);
        self.entries.push(SystemEntry {
            system,
            query_mask,
            earlier_conflicts: 0,
            active: true,
        });
        true
    }

    /// Enables or disables the whole subgraph.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns whether the subgraph currently runs.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of registered systems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no system is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Computes the pairwise conflict masks. Called once at startup.
    fn finalize(&mut self) {
        for later in 0..self.entries.len() {
            let mut conflicts = 0u64;
            let later_access = self.entries[later].system.access();
            for earlier in 0..later {
                let earlier_access = self.entries[earlier].system.access();
                if later_access.conflicts_with(&earlier_access) {
                    conflicts |= 1u64 << earlier;
                }
            }
            self.entries[later].earlier_conflicts = conflicts;
        }
        self.finalized = true;
        log::debug!(
            "Subgraph '{}' finalized with {} systems.",
            self.name,
            self.entries.len()
        );
    }

    fn set_system_active(&mut self, system_name: &str, active: bool) -> bool {
        for entry in &mut self.entries {
            if entry.system.name() == system_name {
                entry.active = active;
                return true;
            }
        }
        false
    }

    /// Executes one step of this subgraph with the given Δt.
    ///
    /// Deferred structural commands are applied before and after the step —
    /// these are the safe points where the world is held exclusively.
    fn step(
        &self,
        world: &mut World,
        executor: &JobExecutorHandle,
        settings: &MultithreadingSettings,
        commands: &Arc<CommandQueue>,
        dt: f32,
    ) {
        // A subgraph with zero (or zero active) systems is a no-op.
        let active: Vec<usize> = (0..self.entries.len())
            .filter(|&index| self.entries[index].active)
            .collect();
        if active.is_empty() {
            return;
        }

        commands.apply(world);

        // Matched entity counts drive the serial-vs-parallel decision and
        // the splitting decision, re-evaluated per step.
        let matched: Vec<usize> = self
            .entries
            .iter()
            .map(|entry| {
                if entry.active {
                    world.count(entry.query_mask)
                } else {
                    0
                }
            })
            .collect();
        let max_matched = matched.iter().copied().max().unwrap_or(0);

        let parallel = settings.enabled
            && executor.worker_count() > 1
            && max_matched >= settings.auto_multithreading_entity_threshold;

        if parallel {
            self.dispatch_parallel(&active, &matched, world, executor, settings, commands, dt);
        } else {
            // Strict serial registration order.
            let slot = WorldSlot::new(world);
            for &index in &active {
                let mut ctx =
                    SystemContext::new(slot, commands, dt, (0, MAX_ENTITIES as u32));
                self.entries[index].system.run(&mut ctx);
            }
        }

        commands.apply(world);
    }

    /// Dispatches one step through the job executor.
    ///
    /// A system is posted once no earlier-registered, not-yet-completed
    /// system conflicts with it; non-conflicting systems run concurrently
    /// on the pool. The call blocks until every posted job has finished,
    /// which is what keeps the world handoff sound.
    #[allow(clippy::too_many_arguments)]
    fn dispatch_parallel(
        &self,
        active: &[usize],
        matched: &[usize],
        world: &mut World,
        executor: &JobExecutorHandle,
        settings: &MultithreadingSettings,
        commands: &Arc<CommandQueue>,
        dt: f32,
    ) {
        let slot = WorldSlot::new(world);
        let workers = executor.worker_count().max(1);
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<usize>();

        let active_mask: u64 = active.iter().fold(0, |mask, &index| mask | (1u64 << index));
        let mut posted_mask = 0u64;
        let mut completed_mask = 0u64;
        let mut chunks_left = vec![0usize; self.entries.len()];
        let mut remaining = active.len();

        while remaining > 0 {
            for &index in active {
                let bit = 1u64 << index;
                if posted_mask & bit != 0 {
                    continue;
                }
                let entry = &self.entries[index];
                // Eligible once no earlier active conflicting system is
                // still incomplete. Inactive systems never run and never
                // block.
                if entry.earlier_conflicts & active_mask & !completed_mask != 0 {
                    continue;
                }
                debug_assert!(
                    {
                        let in_flight = posted_mask & !completed_mask;
                        (0..self.entries.len())
                            .filter(|&other| in_flight & (1u64 << other) != 0)
                            .all(|other| {
                                !self.entries[other]
                                    .system
                                    .access()
                                    .conflicts_with(&entry.system.access())
                            })
                    },
                    "conflicting systems dispatched concurrently"
                );

                let split = entry.system.splittable()
                    && workers > 1
                    && matched[index] >= settings.system_splitting_entity_threshold;
                let chunk_count = if split { workers } else { 1 };
                chunks_left[index] = chunk_count;

                let per_chunk = (MAX_ENTITIES as u32).div_ceil(chunk_count as u32);
                for chunk in 0..chunk_count as u32 {
                    let start = chunk * per_chunk;
                    let end = ((chunk + 1) * per_chunk).min(MAX_ENTITIES as u32);
                    let system = Arc::clone(&entry.system);
                    let job_commands = Arc::clone(commands);
                    let job_tx = done_tx.clone();
                    let posted = executor.post(Job::new(move || {
                        let mut ctx =
                            SystemContext::new(slot, &job_commands, dt, (start, end));
                        system.run(&mut ctx);
                        let _ = job_tx.send(index);
                    }));
                    if posted.is_none() {
                        // Executor stopped mid-frame; count the chunk as
                        // finished so the dispatcher can unwind.
                        log::error!(
                            "System chunk dropped: executor stopped during dispatch."
                        );
                        let _ = done_tx.send(index);
                    }
                }
                posted_mask |= bit;
            }

            match done_rx.recv() {
                Ok(index) => {
                    chunks_left[index] -= 1;
                    if chunks_left[index] == 0 {
                        completed_mask |= 1u64 << index;
                        remaining -= 1;
                    }
                }
                Err(_) => break,
            }
            while let Ok(index) = done_rx.try_recv() {
                chunks_left[index] -= 1;
                if chunks_left[index] == 0 {
                    completed_mask |= 1u64 << index;
                    remaining -= 1;
                }
            }
        }
    }
}

/// The ordered collection of subgraphs making up a frame.
pub struct SystemGraph {
    subgraphs: Vec<SystemSubgraph>,
    finalized: bool,
}

impl SystemGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            subgraphs: Vec::new(),
            finalized: false,
        }
    }

    /// Adds a subgraph with the given timestep policy (`<= 0` = use the
    /// driving Δt). Duplicate names are refused.
    pub fn add_subgraph(&mut self, name: &str, time_step: f32) -> bool {
        if self.finalized {
            log::error!("Cannot add subgraph '{name}' after startup.");
            return false;
        }
        if self.subgraphs.iter().any(|sub| sub.name() == name) {
            log::warn!("Subgraph '{name}' already exists; keeping the first one.");
            return false;
        }
        self.subgraphs.push(SystemSubgraph::new(name, time_step));
        true
    }

    /// Looks up a subgraph by name.
    pub fn subgraph(&self, name: &str) -> Option<&SystemSubgraph> {
        self.subgraphs.iter().find(|sub| sub.name() == name)
    }

    /// Mutable lookup, used to register systems and toggle subgraphs.
    pub fn subgraph_mut(&mut self, name: &str) -> Option<&mut SystemSubgraph> {
        self.subgraphs.iter_mut().find(|sub| sub.name() == name)
    }

    /// Finds a system by name anywhere in the graph and toggles it.
    ///
    /// This is the surface the dev-console command layer drives. Returns
    /// `false` if no system with that name exists.
    pub fn set_system_active(&mut self, system_name: &str, active: bool) -> bool {
        for sub in &mut self.subgraphs {
            if sub.set_system_active(system_name, active) {
                return true;
            }
        }
        log::warn!("No system named '{system_name}' in any subgraph.");
        false
    }

    /// Returns `true` if a system with that name is registered anywhere.
    pub fn has_system(&self, system_name: &str) -> bool {
        self.subgraphs.iter().any(|sub| {
            sub.entries
                .iter()
                .any(|entry| entry.system.name() == system_name)
        })
    }

    /// Computes every subgraph's conflict plan. Called once at startup.
    pub fn finalize(&mut self) {
        for sub in &mut self.subgraphs {
            sub.finalize();
        }
        self.finalized = true;
    }

    /// Returns whether [`SystemGraph::finalize`] has run.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Steps every enabled subgraph for one outer tick of `dt` seconds.
    pub fn run_frame(
        &mut self,
        world: &mut World,
        executor: &JobExecutorHandle,
        settings: &MultithreadingSettings,
        commands: &Arc<CommandQueue>,
        dt: f32,
    ) {
        for index in 0..self.subgraphs.len() {
            self.run_subgraph_at(index, world, executor, settings, commands, dt);
        }
    }

    /// Steps a single subgraph by name. Returns `false` if it doesn't exist.
    #[allow(clippy::too_many_arguments)]
    pub fn run_subgraph(
        &mut self,
        name: &str,
        world: &mut World,
        executor: &JobExecutorHandle,
        settings: &MultithreadingSettings,
        commands: &Arc<CommandQueue>,
        dt: f32,
    ) -> bool {
        let Some(index) = self.subgraphs.iter().position(|sub| sub.name() == name) else {
            log::warn!("No subgraph named '{name}'.");
            return false;
        };
        self.run_subgraph_at(index, world, executor, settings, commands, dt);
        true
    }

    fn run_subgraph_at(
        &mut self,
        index: usize,
        world: &mut World,
        executor: &JobExecutorHandle,
        settings: &MultithreadingSettings,
        commands: &Arc<CommandQueue>,
        dt: f32,
    ) {
        let sub = &mut self.subgraphs[index];
        if !sub.enabled {
            return;
        }
        if sub.time_step > 0.0 {
            // Fixed timestep: accumulate the real Δt and catch up in fixed
            // increments — possibly zero or several steps per outer tick.
            sub.accumulator += dt;
            while sub.accumulator >= sub.time_step {
                sub.accumulator -= sub.time_step;
                sub.step(world, executor, settings, commands, sub.time_step);
            }
        } else {
            sub.step(world, executor, settings, commands, dt);
        }
    }
}

impl Default for SystemGraph {
    fn default() -> Self {
        Self::new()
    }
}

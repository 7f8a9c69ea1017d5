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

//! The frame driver: ties the world, the system graph and the job executor
//! together once per tick.

use std::sync::Arc;

use telos_core::MultithreadingSettings;
use telos_data::ecs::{CommandQueue, World};
use thiserror::Error;

use crate::jobs::{JobExecutor, JobExecutorHandle};
use crate::schedule::{SystemGraph, SystemSubgraph};

/// Errors of the runtime lifecycle.
#[derive(Debug, Error)]
pub enum ControlError {
    /// [`Runtime::startup`] called twice.
    #[error("runtime already started")]
    AlreadyStarted,
    /// A frame entry point was used before [`Runtime::startup`].
    #[error("runtime not started")]
    NotStarted,
}

/// The process-lifetime runtime instance.
///
/// Explicitly constructed and explicitly passed — there are no ambient
/// globals. Lifecycle: configure (register component types, subgraphs and
/// systems), [`Runtime::startup`], any number of [`Runtime::run_frame`]
/// ticks, [`Runtime::shutdown`]. Startup starts the job executor before any
/// system can post jobs; shutdown stops it only after the last subgraph has
/// stopped running.
pub struct Runtime {
    world: World,
    graph: SystemGraph,
    executor: Option<JobExecutor>,
    commands: Arc<CommandQueue>,
    settings: MultithreadingSettings,
    /// If `> 0`, clamps the Δt passed into [`Runtime::run_frame`] before any
    /// subgraph sees it, so a single slow frame (a debugger break, say)
    /// cannot simulate an unbounded time jump.
    max_delta_seconds: f32,
}

impl Runtime {
    /// Creates an unstarted runtime with default settings.
    pub fn new() -> Self {
        Self {
            world: World::new(),
            graph: SystemGraph::new(),
            executor: None,
            commands: Arc::new(CommandQueue::new()),
            settings: MultithreadingSettings::default(),
            max_delta_seconds: 0.0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Configuration (before startup)
    // ─────────────────────────────────────────────────────────────────────

    /// The world, for component registration and entity setup.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The system graph, for registering subgraphs and systems.
    pub fn graph_mut(&mut self) -> &mut SystemGraph {
        &mut self.graph
    }

    /// Adds a subgraph; see [`SystemGraph::add_subgraph`].
    pub fn add_subgraph(&mut self, name: &str, time_step: f32) -> bool {
        self.graph.add_subgraph(name, time_step)
    }

    /// Registers a system into a subgraph. Returns `false` (logged) if the
    /// subgraph does not exist or the graph is already finalized.
    pub fn add_system(
        &mut self,
        subgraph: &str,
        system: Arc<dyn crate::schedule::System>,
    ) -> bool {
        let Some(sub) = self.graph.subgraph_mut(subgraph) else {
            log::error!("No subgraph named '{subgraph}' to add a system to.");
            return false;
        };
        sub.add_system(system)
    }

    /// Replaces the whole multithreading configuration.
    pub fn set_multithreading_settings(&mut self, settings: MultithreadingSettings) {
        self.settings = settings;
    }

    /// Sets the matched-entity threshold below which a subgraph runs
    /// serially.
    pub fn set_auto_multithreading_entity_threshold(&mut self, threshold: usize) {
        self.settings.auto_multithreading_entity_threshold = threshold;
    }

    /// Sets the matched-entity threshold above which a splittable system is
    /// partitioned across workers.
    pub fn set_system_splitting_entity_threshold(&mut self, threshold: usize) {
        self.settings.system_splitting_entity_threshold = threshold;
    }

    /// Sets the outer Δt clamp; `<= 0` disables clamping.
    pub fn set_max_delta_seconds(&mut self, max_delta: f32) {
        self.max_delta_seconds = max_delta;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Freezes the component registry, finalizes the conflict plan of every
    /// subgraph, and starts the worker pool.
    pub fn startup(&mut self) -> Result<(), ControlError> {
        if self.executor.is_some() {
            return Err(ControlError::AlreadyStarted);
        }
        self.world.freeze();
        self.graph.finalize();
        let executor = match self.settings.worker_count {
            Some(count) => JobExecutor::start(count),
            None => JobExecutor::start_default(),
        };
        self.executor = Some(executor);
        log::info!("Runtime started.");
        Ok(())
    }

    /// Waits for outstanding jobs, then stops the worker pool.
    pub fn shutdown(&mut self) {
        let Some(mut executor) = self.executor.take() else {
            return;
        };
        executor.wait_for_all(true);
        executor.stop();
        log::info!("Runtime stopped.");
    }

    /// Returns whether [`Runtime::startup`] has run.
    pub fn is_started(&self) -> bool {
        self.executor.is_some()
    }

    /// A handle for posting jobs from outside the system graph.
    ///
    /// `None` before startup and after shutdown.
    pub fn executor(&self) -> Option<JobExecutorHandle> {
        self.executor.as_ref().map(JobExecutor::handle)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Frame entry points
    // ─────────────────────────────────────────────────────────────────────

    /// Advances every enabled subgraph by one outer tick of `dt` seconds
    /// (clamped by the configured maximum).
    pub fn run_frame(&mut self, dt: f32) -> Result<(), ControlError> {
        let Some(executor) = self.executor.as_ref() else {
            log::error!("RunFrame called before startup.");
            return Err(ControlError::NotStarted);
        };
        let dt = if self.max_delta_seconds > 0.0 {
            dt.min(self.max_delta_seconds)
        } else {
            dt
        };
        self.graph.run_frame(
            &mut self.world,
            &executor.handle(),
            &self.settings,
            &self.commands,
            dt,
        );
        Ok(())
    }

    /// Advances a single subgraph by name. Returns `Ok(false)` if no such
    /// subgraph exists.
    pub fn run_subgraph(&mut self, name: &str, dt: f32) -> Result<bool, ControlError> {
        let Some(executor) = self.executor.as_ref() else {
            log::error!("RunSystemSubgraph called before startup.");
            return Err(ControlError::NotStarted);
        };
        Ok(self.graph.run_subgraph(
            name,
            &mut self.world,
            &executor.handle(),
            &self.settings,
            &self.commands,
            dt,
        ))
    }

    /// Finds a system by name anywhere in the graph and toggles it; the
    /// surface consumed by the dev-console command layer.
    pub fn set_system_active(&mut self, system_name: &str, active: bool) -> bool {
        self.graph.set_system_active(system_name, active)
    }

    /// Enables or disables a whole subgraph. Returns `false` if it does not
    /// exist.
    pub fn set_subgraph_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.graph.subgraph_mut(name) {
            Some(sub) => {
                sub.set_enabled(enabled);
                true
            }
            None => {
                log::warn!("No subgraph named '{name}'.");
                false
            }
        }
    }

    /// Looks up a subgraph by name.
    pub fn subgraph(&self, name: &str) -> Option<&SystemSubgraph> {
        self.graph.subgraph(name)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

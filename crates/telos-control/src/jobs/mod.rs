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

//! The job executor: a fixed pool of worker threads pulling from priority
//! queues, with best-effort cancellation, at-most-once completion, and a
//! dependency-graph execution mode.

mod executor;
mod graph;
mod queue;

pub use executor::{JobExecutor, JobExecutorHandle};
pub use graph::GraphJob;

use std::fmt;

/// A unique identifier for a posted job, assigned by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({})", self.0)
    }
}

/// Routes a job to the worker pool that services it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobKind {
    /// CPU-bound work; runs on the general worker pool.
    #[default]
    Compute,
    /// I/O-bound work; runs on the dedicated loading worker so it never
    /// starves behind compute jobs, and vice versa.
    Loading,
}

/// A unit of deferred work.
///
/// The executor owns the job from post until completion. The work closure is
/// executed by exactly one worker; if a completion callback is attached, the
/// job moves to the completed list afterwards and the callback is invoked at
/// most once, on whichever thread completes the job
/// ([`JobExecutorHandle::complete_job`], [`JobExecutorHandle::complete_jobs`]
/// or [`JobExecutorHandle::wait_for_all`]). Without a callback the job is
/// fire-and-forget and is released right after execution.
pub struct Job {
    pub(crate) work: Box<dyn FnOnce() + Send>,
    pub(crate) on_complete: Option<Box<dyn FnOnce() + Send>>,
    pub(crate) priority: i32,
    pub(crate) kind: JobKind,
}

impl Job {
    /// Creates a fire-and-forget compute job with default priority.
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            work: Box::new(work),
            on_complete: None,
            priority: 0,
            kind: JobKind::Compute,
        }
    }

    /// Sets the max-heap priority; higher runs earlier.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Routes the job to a specific worker pool.
    pub fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attaches a completion callback, opting the job into explicit
    /// completion.
    ///
    /// Typical use: work that must surface its result on a specific (usually
    /// the main) thread — that thread calls
    /// [`JobExecutorHandle::complete_job`] and the callback runs there.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("priority", &self.priority)
            .field("kind", &self.kind)
            .field("needs_completion", &self.on_complete.is_some())
            .finish()
    }
}

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

//! Dependency-graph job execution.
//!
//! A job graph is a fixed list of jobs, each declaring a
//! [`DependencyMask`]. The executor repeatedly (a) posts every not-yet-posted
//! job whose mask does not intersect the mask of any earlier-indexed,
//! not-yet-completed job, and (b) marks finished jobs complete — looping
//! until everything has completed.
//!
//! This is a conservative pessimistic scheduler, *not* a true DAG: two jobs
//! with disjoint masks run fully concurrently regardless of index order,
//! but a job with an overlapping mask waits for every earlier overlapping
//! job even when they would not actually conflict. Index order is a
//! deterministic tie-break. That over-serialization is documented behavior —
//! scheduling-order-sensitive callers depend on it — and must not be
//! "fixed" into a real topological sort.

use telos_core::DependencyMask;

use crate::jobs::executor::JobExecutorHandle;
use crate::jobs::Job;

/// One entry of a job graph: a work closure plus its declared dependency
/// mask.
pub struct GraphJob {
    pub(crate) dependencies: DependencyMask,
    pub(crate) work: Box<dyn FnOnce() + Send>,
    pub(crate) priority: i32,
}

impl GraphJob {
    /// Creates a graph job with the given dependency mask.
    pub fn new<F>(dependencies: DependencyMask, work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            dependencies,
            work: Box::new(work),
            priority: 0,
        }
    }

    /// Sets the priority used once the job is posted.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl JobExecutorHandle {
    /// Executes a job graph to completion, blocking the calling thread.
    ///
    /// Eligibility rule: a job is posted once no earlier-indexed job with an
    /// intersecting dependency mask remains incomplete. The calling thread
    /// drives posting and completion; the pool executes the work.
    pub fn execute_graph(&self, jobs: Vec<GraphJob>) {
        let total = jobs.len();
        if total == 0 {
            return;
        }

        let masks: Vec<DependencyMask> = jobs.iter().map(|job| job.dependencies).collect();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<usize>();

        let mut slots: Vec<Option<GraphJob>> = jobs.into_iter().map(Some).collect();
        let mut completed = vec![false; total];
        let mut remaining = total;

        while remaining > 0 {
            // (a) Post every job that has become eligible.
            for index in 0..total {
                let Some(slot) = slots[index].as_ref() else {
                    continue; // already posted
                };
                let blocked = (0..index).any(|earlier| {
                    !completed[earlier] && masks[earlier].intersects(slot.dependencies)
                });
                if blocked {
                    continue;
                }

                let graph_job = slots[index].take().expect("checked above");
                let tx = done_tx.clone();
                let work = graph_job.work;
                let posted = self.post(
                    Job::new(move || {
                        work();
                        // The completion signal doubles as the "finished"
                        // state transition for the graph loop.
                        let _ = tx.send(index);
                    })
                    .with_priority(graph_job.priority),
                );
                if posted.is_none() {
                    // Executor stopped mid-graph; count the job as done so
                    // the loop can terminate instead of hanging.
                    completed[index] = true;
                    remaining -= 1;
                }
            }

            if remaining == 0 {
                break;
            }

            // (b) Complete any posted job that has finished. The lowest
            // incomplete index is always either in flight or eligible, so
            // blocking here cannot deadlock.
            match done_rx.recv() {
                Ok(index) => {
                    if !completed[index] {
                        completed[index] = true;
                        remaining -= 1;
                    }
                }
                Err(_) => break,
            }
            // Drain whatever else finished in the meantime before the next
            // posting sweep.
            while let Ok(index) = done_rx.try_recv() {
                if !completed[index] {
                    completed[index] = true;
                    remaining -= 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobExecutor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn empty_graph_returns_immediately() {
        let executor = JobExecutor::start(2);
        executor.handle().execute_graph(Vec::new());
    }

    #[test]
    fn all_jobs_execute_exactly_once() {
        let executor = JobExecutor::start(2);
        let counter = Arc::new(AtomicUsize::new(0));

        let shared = DependencyMask::tag(0);
        let jobs = (0..16)
            .map(|_| {
                let counter = Arc::clone(&counter);
                GraphJob::new(shared, move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        executor.handle().execute_graph(jobs);
        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn overlapping_jobs_never_run_concurrently() {
        let executor = JobExecutor::start(4);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let shared = DependencyMask::tag(3);
        let jobs = (0..8)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let overlaps = Arc::clone(&overlaps);
                GraphJob::new(shared, move || {
                    if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    std::thread::sleep(Duration::from_millis(2));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        executor.handle().execute_graph(jobs);
        assert_eq!(
            overlaps.load(Ordering::SeqCst),
            0,
            "jobs sharing a dependency tag must be serialized"
        );
    }
}

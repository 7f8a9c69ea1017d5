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

//! The worker pool and the job state machine.
//!
//! Per-job lifecycle: `Posted → Executing → (needs completion ? Completed :
//! done)`. Posted jobs wait in a max-priority queue; a fixed pool of worker
//! threads pops and executes them. A job that opted into completion is moved
//! to the completed list after execution and must be explicitly completed —
//! its callback runs at most once, on the completing thread.
//!
//! There is no timeout mechanism: a hung job hangs the worker that picked it
//! up, and [`JobExecutorHandle::wait_for_all`] will hang the calling thread
//! too. That contract is deliberate; don't post a job that waits on its own
//! completion.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::jobs::queue::{PendingJob, PendingQueue};
use crate::jobs::{Job, JobId, JobKind};

/// A completed-but-not-yet-called-back job.
struct FinishedJob {
    id: JobId,
    callback: Box<dyn FnOnce() + Send>,
}

pub(crate) struct Shared {
    compute: PendingQueue,
    loading: PendingQueue,
    completed: std::sync::Mutex<Vec<FinishedJob>>,
    executing: std::sync::Mutex<Vec<JobId>>,
    /// Jobs posted but not yet fully done (executed + completed if needed).
    outstanding: AtomicUsize,
    next_id: AtomicU64,
    next_seq: AtomicU64,
    running: AtomicBool,
    compute_workers: usize,
}

impl Shared {
    fn post(&self, job: Job) -> Option<JobId> {
        if !self.running.load(Ordering::SeqCst) {
            log::error!("Job posted to a stopped executor; dropping it.");
            return None;
        }
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let kind = job.kind;
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let pending = PendingJob { id, seq, job };
        match kind {
            JobKind::Compute => self.compute.push(pending),
            JobKind::Loading => self.loading.push(pending),
        }
        Some(id)
    }

    /// Executes a popped job on the calling thread and does the state
    /// bookkeeping. Used by workers and by helping threads alike.
    fn run_job(&self, pending: PendingJob) {
        let PendingJob { id, job, .. } = pending;

        self.executing
            .lock()
            .expect("executing list mutex poisoned")
            .push(id);

        (job.work)();

        self.executing
            .lock()
            .expect("executing list mutex poisoned")
            .retain(|executing| *executing != id);

        match job.on_complete {
            Some(callback) => {
                self.completed
                    .lock()
                    .expect("completed list mutex poisoned")
                    .push(FinishedJob { id, callback });
            }
            None => {
                // Fire-and-forget: done as soon as it has executed.
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    fn take_finished(&self, id: JobId) -> Option<FinishedJob> {
        let mut completed = self.completed.lock().expect("completed list mutex poisoned");
        let index = completed.iter().position(|finished| finished.id == id)?;
        Some(completed.remove(index))
    }

    fn complete_job(&self, id: JobId, block: bool, help: bool) -> bool {
        loop {
            if let Some(finished) = self.take_finished(id) {
                (finished.callback)();
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                return true;
            }
            if !block {
                return false;
            }
            // Alternate between trying to complete the target and doing
            // useful work, so a pool worker blocked here cannot deadlock the
            // pool.
            if help {
                if let Some(pending) = self.compute.try_pop() {
                    self.run_job(pending);
                    continue;
                }
            }
            thread::yield_now();
        }
    }

    fn complete_jobs(&self) -> usize {
        let drained = {
            let mut completed = self.completed.lock().expect("completed list mutex poisoned");
            std::mem::take(&mut *completed)
        };
        let count = drained.len();
        for finished in drained {
            (finished.callback)();
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
        count
    }

    fn wait_for_all(&self, help: bool) {
        loop {
            self.complete_jobs();
            if self.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            if help {
                if let Some(pending) = self.compute.try_pop() {
                    self.run_job(pending);
                    continue;
                }
            }
            thread::yield_now();
        }
    }

    fn try_cancel(&self, id: JobId) -> bool {
        let removed = self
            .compute
            .remove(id)
            .or_else(|| self.loading.remove(id));
        match removed {
            Some(_) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}

fn worker_loop(shared: Arc<Shared>, kind: JobKind) {
    let queue = match kind {
        JobKind::Compute => &shared.compute,
        JobKind::Loading => &shared.loading,
    };
    while let Some(pending) = queue.pop_blocking() {
        shared.run_job(pending);
    }
    log::debug!("Worker thread exiting.");
}

/// A cheaply clonable handle for posting and completing jobs.
///
/// Handles stay valid for the lifetime of the process; posting to a stopped
/// executor is logged and refused.
#[derive(Clone)]
pub struct JobExecutorHandle {
    shared: Arc<Shared>,
}

impl JobExecutorHandle {
    /// Posts a job. Returns its id, or `None` if the executor is stopped.
    pub fn post(&self, job: Job) -> Option<JobId> {
        self.shared.post(job)
    }

    /// Completes one specific job.
    ///
    /// If the job has finished executing, its completion callback runs on
    /// this thread and `true` is returned. Otherwise: with `block == false`
    /// the call returns `false` immediately; with `block == true` it loops —
    /// executing other pending compute jobs when `help` is set, yielding
    /// otherwise — until the job can be completed. Blocking on an id that
    /// was never posted never returns.
    pub fn complete_job(&self, id: JobId, block: bool, help: bool) -> bool {
        self.shared.complete_job(id, block, help)
    }

    /// Completes every job currently in the completed list, invoking each
    /// callback exactly once on this thread. Returns how many were
    /// completed.
    pub fn complete_jobs(&self) -> usize {
        self.shared.complete_jobs()
    }

    /// Blocks until every posted job has executed and, where requested,
    /// completed. Completion callbacks run on this thread. With `help` the
    /// calling thread executes pending compute jobs while it waits.
    pub fn wait_for_all(&self, help: bool) {
        self.shared.wait_for_all(help)
    }

    /// Best-effort cancellation: removes a job that has not started
    /// executing from the pending queue.
    ///
    /// Returns whether the job was still pending. A job that has begun
    /// executing cannot be cancelled.
    pub fn try_cancel(&self, id: JobId) -> bool {
        self.shared.try_cancel(id)
    }

    /// Number of jobs waiting in the pending queues.
    pub fn pending_count(&self) -> usize {
        self.shared.compute.len() + self.shared.loading.len()
    }

    /// Snapshot of the jobs currently executing, for diagnostics.
    pub fn executing_jobs(&self) -> Vec<JobId> {
        self.shared
            .executing
            .lock()
            .expect("executing list mutex poisoned")
            .clone()
    }

    /// Number of compute workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.shared.compute_workers
    }
}

/// The worker pool owner.
///
/// Explicitly constructed and explicitly stopped — there is no ambient
/// global executor. Start it before anything can post jobs and stop it only
/// after the last subgraph has stopped running.
pub struct JobExecutor {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl JobExecutor {
    /// Starts a pool with the default size: available hardware concurrency
    /// minus the dedicated loading worker, at least one compute worker.
    pub fn start_default() -> Self {
        let available = thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(2);
        Self::start(available.saturating_sub(1).max(1))
    }

    /// Starts a pool with `compute_workers` compute threads plus the
    /// dedicated loading worker.
    pub fn start(compute_workers: usize) -> Self {
        let compute_workers = compute_workers.max(1);
        let shared = Arc::new(Shared {
            compute: PendingQueue::new(),
            loading: PendingQueue::new(),
            completed: std::sync::Mutex::new(Vec::new()),
            executing: std::sync::Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            next_seq: AtomicU64::new(0),
            running: AtomicBool::new(true),
            compute_workers,
        });

        let mut workers = Vec::with_capacity(compute_workers + 1);
        for index in 0..compute_workers {
            let worker_shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("telos-worker-{index}"))
                .spawn(move || worker_loop(worker_shared, JobKind::Compute))
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }
        let loader_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("telos-loader".to_string())
            .spawn(move || worker_loop(loader_shared, JobKind::Loading))
            .expect("failed to spawn loading worker thread");
        workers.push(handle);

        log::info!(
            "Job executor started: {compute_workers} compute workers + 1 loading worker."
        );
        JobExecutor { shared, workers }
    }

    /// Returns a clonable handle for posting and completing jobs.
    pub fn handle(&self) -> JobExecutorHandle {
        JobExecutorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stops the pool. Pending jobs still in the queues are executed before
    /// the workers exit; call [`JobExecutorHandle::wait_for_all`] first if
    /// completion callbacks must run.
    pub fn stop(&mut self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shared.compute.quit();
        self.shared.loading.quit();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        log::info!("Job executor stopped.");
    }

    // Forwarders so the owner can be used directly where no handle is
    // needed.

    /// See [`JobExecutorHandle::post`].
    pub fn post(&self, job: Job) -> Option<JobId> {
        self.shared.post(job)
    }

    /// See [`JobExecutorHandle::complete_job`].
    pub fn complete_job(&self, id: JobId, block: bool, help: bool) -> bool {
        self.shared.complete_job(id, block, help)
    }

    /// See [`JobExecutorHandle::complete_jobs`].
    pub fn complete_jobs(&self) -> usize {
        self.shared.complete_jobs()
    }

    /// See [`JobExecutorHandle::wait_for_all`].
    pub fn wait_for_all(&self, help: bool) {
        self.shared.wait_for_all(help)
    }

    /// See [`JobExecutorHandle::try_cancel`].
    pub fn try_cancel(&self, id: JobId) -> bool {
        self.shared.try_cancel(id)
    }

    /// See [`JobExecutorHandle::pending_count`].
    pub fn pending_count(&self) -> usize {
        self.handle().pending_count()
    }

    /// See [`JobExecutorHandle::executing_jobs`].
    pub fn executing_jobs(&self) -> Vec<JobId> {
        self.handle().executing_jobs()
    }

    /// See [`JobExecutorHandle::worker_count`].
    pub fn worker_count(&self) -> usize {
        self.shared.compute_workers
    }
}

impl Drop for JobExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

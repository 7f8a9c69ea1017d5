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

//! The thread-safe max-priority queue of pending jobs.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};

use crate::jobs::{Job, JobId};

/// A job sitting in the pending queue.
///
/// Ordered by priority (max first), then by post sequence (earlier first) so
/// that equal-priority jobs come out in deterministic FIFO order.
pub(crate) struct PendingJob {
    pub(crate) id: JobId,
    pub(crate) seq: u64,
    pub(crate) job: Job,
}

impl PartialEq for PendingJob {
    fn eq(&self, other: &Self) -> bool {
        self.job.priority == other.job.priority && self.seq == other.seq
    }
}

impl Eq for PendingJob {}

impl PartialOrd for PendingJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on priority; reversed sequence gives FIFO among equals.
        self.job
            .priority
            .cmp(&other.job.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState {
    heap: BinaryHeap<PendingJob>,
    quitting: bool,
}

/// A mutex/condvar-protected max-heap of pending jobs.
///
/// Workers block on [`PendingQueue::pop_blocking`] until a job arrives or
/// the queue is told to quit; helping threads use the non-blocking
/// [`PendingQueue::try_pop`].
pub(crate) struct PendingQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                quitting: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueues a job and wakes one waiting worker.
    pub(crate) fn push(&self, pending: PendingJob) {
        let mut state = self.state.lock().expect("pending queue mutex poisoned");
        state.heap.push(pending);
        drop(state);
        self.available.notify_one();
    }

    /// Pops the highest-priority job, blocking until one is available.
    ///
    /// Returns `None` once the queue is quitting and drained; workers treat
    /// that as their exit signal.
    pub(crate) fn pop_blocking(&self) -> Option<PendingJob> {
        let mut state = self.state.lock().expect("pending queue mutex poisoned");
        loop {
            if let Some(pending) = state.heap.pop() {
                return Some(pending);
            }
            if state.quitting {
                return None;
            }
            state = self
                .available
                .wait(state)
                .expect("pending queue mutex poisoned");
        }
    }

    /// Pops the highest-priority job without blocking.
    pub(crate) fn try_pop(&self) -> Option<PendingJob> {
        self.state
            .lock()
            .expect("pending queue mutex poisoned")
            .heap
            .pop()
    }

    /// Removes a specific job from the queue, if it is still pending.
    ///
    /// Cancellation is rare, so the heap is simply rebuilt without the
    /// victim.
    pub(crate) fn remove(&self, id: JobId) -> Option<PendingJob> {
        let mut state = self.state.lock().expect("pending queue mutex poisoned");
        if !state.heap.iter().any(|p| p.id == id) {
            return None;
        }
        let mut removed = None;
        let drained = std::mem::take(&mut state.heap);
        for pending in drained {
            if pending.id == id {
                removed = Some(pending);
            } else {
                state.heap.push(pending);
            }
        }
        removed
    }

    /// Number of jobs currently pending.
    pub(crate) fn len(&self) -> usize {
        self.state
            .lock()
            .expect("pending queue mutex poisoned")
            .heap
            .len()
    }

    /// Tells every blocked worker to give up and exit.
    pub(crate) fn quit(&self) {
        let mut state = self.state.lock().expect("pending queue mutex poisoned");
        state.quitting = true;
        drop(state);
        self.available.notify_all();
    }
}

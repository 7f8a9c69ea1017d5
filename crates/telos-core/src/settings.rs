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

//! Runtime configuration for the parallel execution paths.

use serde::{Deserialize, Serialize};

/// Configuration of the multithreaded system dispatch.
///
/// Both thresholds gate *whether the parallel plan is used at all* for a
/// subgraph on a given tick: below them the dispatcher falls back to strict
/// serial registration order, since the overhead of posting jobs would
/// dominate the work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultithreadingSettings {
    /// Master switch. When `false` every subgraph runs serially.
    pub enabled: bool,
    /// Number of compute workers. `None` selects the hardware default
    /// (available parallelism minus the dedicated loading worker).
    pub worker_count: Option<usize>,
    /// Minimum matched entity count before a subgraph is dispatched through
    /// the job executor instead of run inline.
    pub auto_multithreading_entity_threshold: usize,
    /// Minimum matched entity count before a single splittable system has
    /// its entity range partitioned across workers.
    pub system_splitting_entity_threshold: usize,
}

impl Default for MultithreadingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            worker_count: None,
            auto_multithreading_entity_threshold: 32,
            system_splitting_entity_threshold: 1024,
        }
    }
}

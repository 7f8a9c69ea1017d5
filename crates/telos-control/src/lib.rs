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

//! # Telos Control
//!
//! Execution layer of the Telos runtime: the worker-pool job executor with
//! priority scheduling and at-most-once completion, the dependency-aware
//! system graph that turns declared read/write access into a conflict-free
//! parallel plan, and the frame driver that ties the world, the graph and
//! the executor together once per tick.

#![warn(missing_docs)]

pub mod driver;
pub mod jobs;
pub mod schedule;

pub use driver::{ControlError, Runtime};
pub use jobs::{GraphJob, Job, JobExecutor, JobExecutorHandle, JobId, JobKind};
pub use schedule::{FnSystem, System, SystemContext, SystemGraph, SystemSubgraph};

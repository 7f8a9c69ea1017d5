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

//! Deferred structural commands.
//!
//! Systems may run concurrently and therefore never mutate the world's
//! structure directly: creates, destroys, component adds and removes posted
//! during execution are collected here and applied by the frame driver at
//! step boundaries, where it holds the world exclusively.

use std::sync::Mutex;

use crate::ecs::world::World;

type Command = Box<dyn FnOnce(&mut World) + Send>;

/// A thread-safe queue of deferred structural edits.
///
/// Commands are applied in posting order. Posting from multiple worker
/// threads is allowed; the relative order between commands posted by
/// concurrently running systems is unspecified.
#[derive(Default)]
pub struct CommandQueue {
    commands: Mutex<Vec<Command>>,
}

impl CommandQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts a structural edit to run at the next safe point.
    pub fn push<F>(&self, command: F)
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        self.commands
            .lock()
            .expect("command queue mutex poisoned")
            .push(Box::new(command));
    }

    /// Returns `true` if no command is pending.
    pub fn is_empty(&self) -> bool {
        self.commands
            .lock()
            .expect("command queue mutex poisoned")
            .is_empty()
    }

    /// Applies every pending command against the world, in posting order.
    ///
    /// Returns the number of commands applied. Commands posted *while*
    /// applying (by another thread) are left for the next safe point.
    pub fn apply(&self, world: &mut World) -> usize {
        let drained = {
            let mut queue = self
                .commands
                .lock()
                .expect("command queue mutex poisoned");
            std::mem::take(&mut *queue)
        };
        let count = drained.len();
        for command in drained {
            command(world);
        }
        count
    }
}

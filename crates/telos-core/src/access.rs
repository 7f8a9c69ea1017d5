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

//! Declared data access for scheduling.
//!
//! A system (or a job in a job graph) states *up front* which component types
//! and which external resources it reads and writes. The scheduler never
//! inspects what a system actually touches — the declared [`Access`] is the
//! single source of truth for conflict analysis, and bypassing it is a
//! correctness violation the framework cannot detect at runtime.

use crate::ecs::ComponentMask;

/// A bitmask of opaque dependency tags.
///
/// External collaborators (renderer, input, audio, ...) are represented
/// purely as tags for scheduling purposes; the core never calls into them.
/// The same mask type carries the declared dependency set of a job in a
/// job graph, where two jobs with intersecting masks are never run
/// concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct DependencyMask(pub u64);

impl DependencyMask {
    /// The empty mask.
    pub const EMPTY: DependencyMask = DependencyMask(0);

    /// Returns the mask owning the single tag `index`.
    ///
    /// Tag indices above 63 fold back into the 64-bit mask; callers that
    /// need distinct tags must stay below 64 of them.
    #[inline]
    pub const fn tag(index: u32) -> DependencyMask {
        DependencyMask(1u64 << (index % u64::BITS))
    }

    /// Returns the union of the two masks.
    #[inline]
    pub fn union(self, other: DependencyMask) -> DependencyMask {
        DependencyMask(self.0 | other.0)
    }

    /// Returns `true` if any tag is shared between the two masks.
    #[inline]
    pub fn intersects(self, other: DependencyMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if no tag is set.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// The read/write dependency declaration of a system.
///
/// Fixed at registration time, before the graph is finalized. Conflict
/// analysis implements standard readers–writers exclusion: two systems may
/// run concurrently iff neither one's write set intersects the other's read
/// or write set — read-read overlap is always allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Access {
    /// Component types this system reads.
    pub reads: ComponentMask,
    /// Component types this system writes.
    pub writes: ComponentMask,
    /// External resource tags this system reads.
    pub resource_reads: DependencyMask,
    /// External resource tags this system writes.
    pub resource_writes: DependencyMask,
    /// Catch-all "writes everything" declaration.
    ///
    /// Used by systems (debug overlays, structural passes) that need
    /// exclusivity; an exclusive system conflicts with every other system.
    pub exclusive: bool,
}

impl Access {
    /// An empty declaration: conflicts with nothing except exclusive systems.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds component types to the read set.
    pub fn read(mut self, mask: ComponentMask) -> Self {
        self.reads = self.reads.union(mask);
        self
    }

    /// Adds component types to the write set.
    pub fn write(mut self, mask: ComponentMask) -> Self {
        self.writes = self.writes.union(mask);
        self
    }

    /// Adds resource tags to the read set.
    pub fn read_resources(mut self, mask: DependencyMask) -> Self {
        self.resource_reads = self.resource_reads.union(mask);
        self
    }

    /// Adds resource tags to the write set.
    pub fn write_resources(mut self, mask: DependencyMask) -> Self {
        self.resource_writes = self.resource_writes.union(mask);
        self
    }

    /// Marks this declaration as writing everything.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Readers–writers conflict test between two declarations.
    ///
    /// Returns `true` if the two may NOT run concurrently. The test is
    /// symmetric and is evaluated once, when the graph is finalized — never
    /// per frame.
    pub fn conflicts_with(&self, other: &Access) -> bool {
        if self.exclusive || other.exclusive {
            return true;
        }

        let self_writes_touch = self.writes.intersects(other.reads.union(other.writes))
            || self
                .resource_writes
                .intersects(other.resource_reads.union(other.resource_writes));

        let other_writes_touch = other.writes.intersects(self.reads)
            || other.resource_writes.intersects(self.resource_reads);

        self_writes_touch || other_writes_touch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentTypeId;

    fn bit(i: u16) -> ComponentMask {
        ComponentTypeId(i).mask()
    }

    #[test]
    fn read_read_overlap_is_not_a_conflict() {
        let a = Access::new().read(bit(0));
        let b = Access::new().read(bit(0));
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn write_read_overlap_conflicts_both_ways() {
        let writer = Access::new().write(bit(3));
        let reader = Access::new().read(bit(3));
        assert!(writer.conflicts_with(&reader));
        assert!(reader.conflicts_with(&writer));
    }

    #[test]
    fn disjoint_writes_do_not_conflict() {
        let a = Access::new().write(bit(1)).read(bit(2));
        let b = Access::new().write(bit(3)).read(bit(4));
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn exclusive_conflicts_with_everything() {
        let overlay = Access::new().exclusive();
        let idle = Access::new();
        assert!(overlay.conflicts_with(&idle));
        assert!(idle.conflicts_with(&overlay));
    }

    #[test]
    fn resource_tags_participate_in_the_conflict_test() {
        let render = DependencyMask::tag(0);
        let a = Access::new().write_resources(render);
        let b = Access::new().read_resources(render);
        assert!(a.conflicts_with(&b));

        let audio = DependencyMask::tag(1);
        let c = Access::new().write_resources(audio);
        assert!(!a.conflicts_with(&c));
    }
}

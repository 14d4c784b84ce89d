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

//! Host side of the bindless descriptor space.
//!
//! The GPU sees one descriptor set with four arrays, one per [`DescriptorKind`].
//! This module owns the slot tables that decide which array element a resource
//! occupies. Writing the native descriptor is delegated to a [`DescriptorWriter`]
//! (the graphics device), synchronously, at registration time.
//!
//! Unregistering only returns the slot to the free list. The stale descriptor is
//! left in place; shaders must not read an index after its resource was released.

use crate::renderer::api::{BufferId, ImageId, SamplerId};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::DescriptorWriter;
use std::collections::BTreeSet;
use std::fmt;

/// The four descriptor arrays of the bindless set, in binding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorKind {
    /// A sampled image paired with a sampler, addressed by one index.
    Sampler,
    /// A uniform buffer.
    UniformBuffer,
    /// A read/write storage buffer.
    StorageBuffer,
    /// A storage image.
    StorageImage,
}

impl DescriptorKind {
    /// All kinds, in binding order.
    pub const ALL: [DescriptorKind; 4] = [
        DescriptorKind::Sampler,
        DescriptorKind::UniformBuffer,
        DescriptorKind::StorageBuffer,
        DescriptorKind::StorageImage,
    ];

    /// The binding slot of this kind's array inside the bindless set.
    pub const fn binding(self) -> u32 {
        match self {
            DescriptorKind::Sampler => 0,
            DescriptorKind::UniformBuffer => 1,
            DescriptorKind::StorageBuffer => 2,
            DescriptorKind::StorageImage => 3,
        }
    }

    const fn table(self) -> usize {
        self.binding() as usize
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DescriptorKind::Sampler => "sampler",
            DescriptorKind::UniformBuffer => "uniform buffer",
            DescriptorKind::StorageBuffer => "storage buffer",
            DescriptorKind::StorageImage => "storage image",
        };
        f.write_str(name)
    }
}

/// A shader-visible index into one of the bindless arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindlessIndex {
    /// The array the index belongs to.
    pub kind: DescriptorKind,
    /// The element inside that array.
    pub index: u32,
}

/// A native resource to be written into the bindless set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    /// An image view sampled through `sampler`.
    CombinedImageSampler {
        /// The sampled image.
        image: ImageId,
        /// The sampler used to read it.
        sampler: SamplerId,
    },
    /// A whole buffer bound as a uniform buffer.
    UniformBuffer(BufferId),
    /// A whole buffer bound as a storage buffer.
    StorageBuffer(BufferId),
    /// An image bound as a storage image.
    StorageImage(ImageId),
}

impl DescriptorResource {
    /// The array this resource goes into.
    pub fn kind(&self) -> DescriptorKind {
        match self {
            DescriptorResource::CombinedImageSampler { .. } => DescriptorKind::Sampler,
            DescriptorResource::UniformBuffer(_) => DescriptorKind::UniformBuffer,
            DescriptorResource::StorageBuffer(_) => DescriptorKind::StorageBuffer,
            DescriptorResource::StorageImage(_) => DescriptorKind::StorageImage,
        }
    }
}

/// Array sizes of the bindless set, one per [`DescriptorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindlessCapacities {
    counts: [u32; 4],
}

impl BindlessCapacities {
    /// Uses the same capacity for every kind.
    pub const fn uniform(count: u32) -> Self {
        Self { counts: [count; 4] }
    }

    /// Splits the device's binding-array budget between the kinds.
    ///
    /// `max_elements` is shared by the sampled-image, uniform, storage and
    /// storage-image arrays, `max_samplers` only bounds the sampler array. Every
    /// count is clamped to `cap` and to at least one element.
    pub fn from_limits(max_elements: u32, max_samplers: u32, cap: u32) -> Self {
        let share = (max_elements / 4).clamp(1, cap.max(1));
        let samplers = max_samplers.min(share).max(1);
        Self {
            counts: [samplers, share, share, share],
        }
    }

    /// Array size for `kind`.
    pub fn get(&self, kind: DescriptorKind) -> u32 {
        self.counts[kind.table()]
    }
}

/// Index allocator for one bindless array.
///
/// Freed indices are reused lowest-first; otherwise indices grow monotonically
/// up to the capacity.
#[derive(Debug, Clone)]
pub struct SlotTable {
    capacity: u32,
    next: u32,
    free: BTreeSet<u32>,
    live: Vec<bool>,
}

impl SlotTable {
    /// Creates an empty table with room for `capacity` indices.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next: 0,
            free: BTreeSet::new(),
            live: Vec::new(),
        }
    }

    /// Reserves an index, or returns `None` when the table is full.
    pub fn allocate(&mut self) -> Option<u32> {
        let index = if let Some(index) = self.free.pop_first() {
            index
        } else if self.next < self.capacity {
            let index = self.next;
            self.next += 1;
            self.live.push(false);
            index
        } else {
            return None;
        };
        self.live[index as usize] = true;
        Some(index)
    }

    /// Returns `index` to the free list. Returns `false` if it was not live.
    pub fn release(&mut self, index: u32) -> bool {
        match self.live.get_mut(index as usize) {
            Some(live) if *live => {
                *live = false;
                self.free.insert(index);
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if `index` is currently allocated.
    pub fn is_live(&self, index: u32) -> bool {
        self.live.get(index as usize).copied().unwrap_or(false)
    }

    /// Number of allocated indices.
    pub fn live_count(&self) -> u32 {
        self.next - self.free.len() as u32
    }

    /// Maximum number of indices.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

/// The four slot tables of the bindless set.
#[derive(Debug, Clone)]
pub struct BindlessSpace {
    tables: [SlotTable; 4],
}

impl BindlessSpace {
    /// Creates the tables with the given array sizes.
    pub fn new(capacities: BindlessCapacities) -> Self {
        Self {
            tables: DescriptorKind::ALL.map(|kind| SlotTable::new(capacities.get(kind))),
        }
    }

    /// Allocates an index for `resource` and writes its descriptor through `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::DescriptorSpaceExhausted`] when the kind's array is
    /// full, or the writer's error (the index is released again in that case).
    pub fn register<W: DescriptorWriter + ?Sized>(
        &mut self,
        writer: &W,
        resource: DescriptorResource,
    ) -> Result<BindlessIndex, ResourceError> {
        let kind = resource.kind();
        let table = &mut self.tables[kind.table()];
        let index = table
            .allocate()
            .ok_or(ResourceError::DescriptorSpaceExhausted {
                kind,
                capacity: table.capacity(),
            })?;

        if let Err(err) = writer.write_descriptor(index, &resource) {
            table.release(index);
            return Err(err);
        }

        log::debug!("Bindless: registered {kind} at index {index}");
        Ok(BindlessIndex { kind, index })
    }

    /// Marks the index free and lets `writer` drop its reference to the
    /// resource. The bound descriptor itself is left untouched.
    ///
    /// Returns `false` if the index was not live.
    pub fn unregister<W: DescriptorWriter + ?Sized>(
        &mut self,
        writer: &W,
        index: BindlessIndex,
    ) -> bool {
        let released = self.tables[index.kind.table()].release(index.index);
        if released {
            writer.release_descriptor(index);
            log::debug!("Bindless: released {} index {}", index.kind, index.index);
        } else {
            log::warn!(
                "Bindless: {} index {} released twice or never allocated",
                index.kind,
                index.index
            );
        }
        released
    }

    /// Returns `true` if the index is allocated.
    pub fn is_live(&self, index: BindlessIndex) -> bool {
        self.tables[index.kind.table()].is_live(index.index)
    }

    /// The slot table of one kind.
    pub fn table(&self, kind: DescriptorKind) -> &SlotTable {
        &self.tables[kind.table()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWriter {
        writes: Mutex<Vec<(u32, DescriptorResource)>>,
        releases: Mutex<Vec<BindlessIndex>>,
        fail: bool,
    }

    impl DescriptorWriter for RecordingWriter {
        fn write_descriptor(
            &self,
            index: u32,
            resource: &DescriptorResource,
        ) -> Result<(), ResourceError> {
            if self.fail {
                return Err(ResourceError::BackendError("write failed".into()));
            }
            self.writes.lock().unwrap().push((index, *resource));
            Ok(())
        }

        fn release_descriptor(&self, index: BindlessIndex) {
            self.releases.lock().unwrap().push(index);
        }
    }

    #[test]
    fn slot_table_is_monotonic_then_first_fit() {
        let mut table = SlotTable::new(8);
        let a = table.allocate().unwrap();
        let b = table.allocate().unwrap();
        let c = table.allocate().unwrap();
        assert_eq!((a, b, c), (0, 1, 2));

        assert!(table.release(2));
        assert!(table.release(0));
        // Lowest freed index first.
        assert_eq!(table.allocate(), Some(0));
        assert_eq!(table.allocate(), Some(2));
        assert_eq!(table.allocate(), Some(3));
        assert_eq!(table.live_count(), 4);
    }

    #[test]
    fn slot_table_rejects_double_release_and_overflow() {
        let mut table = SlotTable::new(1);
        let a = table.allocate().unwrap();
        assert!(table.allocate().is_none());
        assert!(table.release(a));
        assert!(!table.release(a));
        assert!(!table.release(42));
        assert!(!table.is_live(a));
    }

    #[test]
    fn register_writes_descriptor_once_and_unregister_does_not() {
        let writer = RecordingWriter::default();
        let mut space = BindlessSpace::new(BindlessCapacities::uniform(4));

        let idx = space
            .register(&writer, DescriptorResource::StorageBuffer(BufferId(3)))
            .unwrap();
        assert_eq!(idx.kind, DescriptorKind::StorageBuffer);
        assert_eq!(idx.index, 0);
        assert!(space.is_live(idx));

        assert!(space.unregister(&writer, idx));
        assert!(!space.is_live(idx));
        assert_eq!(writer.writes.lock().unwrap().len(), 1);
        assert!(!space.unregister(&writer, idx));
        assert_eq!(*writer.releases.lock().unwrap(), vec![idx]);

        let again = space
            .register(&writer, DescriptorResource::StorageBuffer(BufferId(4)))
            .unwrap();
        assert_eq!(again.index, idx.index);
    }

    #[test]
    fn kinds_have_independent_tables() {
        let writer = RecordingWriter::default();
        let mut space = BindlessSpace::new(BindlessCapacities::uniform(4));
        let u = space
            .register(&writer, DescriptorResource::UniformBuffer(BufferId(0)))
            .unwrap();
        let s = space
            .register(&writer, DescriptorResource::StorageImage(ImageId(0)))
            .unwrap();
        assert_eq!(u.index, 0);
        assert_eq!(s.index, 0);
        assert_eq!(space.table(DescriptorKind::Sampler).live_count(), 0);
    }

    #[test]
    fn exhausted_and_failed_writes_leave_table_consistent() {
        let mut space = BindlessSpace::new(BindlessCapacities::uniform(1));
        let failing = RecordingWriter {
            fail: true,
            ..Default::default()
        };
        assert!(space
            .register(&failing, DescriptorResource::UniformBuffer(BufferId(0)))
            .is_err());
        assert_eq!(space.table(DescriptorKind::UniformBuffer).live_count(), 0);

        let writer = RecordingWriter::default();
        space
            .register(&writer, DescriptorResource::UniformBuffer(BufferId(0)))
            .unwrap();
        let err = space
            .register(&writer, DescriptorResource::UniformBuffer(BufferId(1)))
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceError::DescriptorSpaceExhausted {
                kind: DescriptorKind::UniformBuffer,
                capacity: 1
            }
        ));
    }

    #[test]
    fn capacities_split_the_device_budget() {
        let caps = BindlessCapacities::from_limits(500_000, 2_000, 65_536);
        assert_eq!(caps.get(DescriptorKind::StorageBuffer), 65_536);
        assert_eq!(caps.get(DescriptorKind::Sampler), 2_000);

        let small = BindlessCapacities::from_limits(64, 1_000, 65_536);
        assert_eq!(small.get(DescriptorKind::UniformBuffer), 16);
        assert_eq!(small.get(DescriptorKind::Sampler), 16);
    }
}

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

//! Generational handles for GPU resources owned by the resource manager.
//!
//! A [`Handle`] combines a slot index with a generation count. When a resource is
//! destroyed its slot can be recycled, but the generation is incremented, so a
//! handle that outlived its resource no longer resolves instead of silently
//! aliasing whatever now occupies the slot.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker type for buffer handles.
#[derive(Debug)]
pub enum Buffer {}
/// Marker type for image handles.
#[derive(Debug)]
pub enum Image {}
/// Marker type for sampler handles.
#[derive(Debug)]
pub enum Sampler {}
/// Marker type for shader module handles.
#[derive(Debug)]
pub enum Shader {}

/// An opaque, typed reference to a resource in a [`HandlePool`].
pub struct Handle<K> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    /// The slot index inside the owning pool.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation the slot had when this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

// Manual impls: the derives would require `K` itself to implement the traits.
impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = std::any::type_name::<K>()
            .rsplit("::")
            .next()
            .unwrap_or("Resource");
        write!(f, "Handle<{kind}>({}v{})", self.index, self.generation)
    }
}

/// A handle to a buffer.
pub type BufferHandle = Handle<Buffer>;
/// A handle to an image.
pub type ImageHandle = Handle<Image>;
/// A handle to a sampler.
pub type SamplerHandle = Handle<Sampler>;
/// A handle to a shader module.
pub type ShaderHandle = Handle<Shader>;

struct Slot<V> {
    generation: u32,
    value: Option<V>,
}

/// A slot table mapping [`Handle`]s to owned values, recycling freed slots.
pub struct HandlePool<K, V> {
    slots: Vec<Slot<V>>,
    freed: Vec<u32>,
    live: usize,
    _kind: PhantomData<fn() -> K>,
}

impl<K, V> HandlePool<K, V> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            freed: Vec::new(),
            live: 0,
            _kind: PhantomData,
        }
    }

    /// Stores `value` and returns a handle to it.
    ///
    /// A freed slot is reused when available; its generation was already bumped
    /// when the previous occupant was removed.
    pub fn insert(&mut self, value: V) -> Handle<K> {
        self.live += 1;
        if let Some(index) = self.freed.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            Handle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Handle::new(index, 0)
        }
    }

    /// Returns the value if `handle` is still live.
    pub fn get(&self, handle: Handle<K>) -> Option<&V> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Returns the value mutably if `handle` is still live.
    pub fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut V> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Returns `true` if `handle` is still live.
    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.get(handle).is_some()
    }

    /// Removes and returns the value, invalidating every copy of `handle`.
    ///
    /// Returns `None` for a stale or foreign handle, which makes a double removal
    /// observable rather than undefined.
    pub fn remove(&mut self, handle: Handle<K>) -> Option<V> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.freed.push(handle.index);
        self.live -= 1;
        Some(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no value is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterates over live `(handle, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &V)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index as u32, slot.generation), value))
        })
    }

    /// Returns the handles of every live value.
    pub fn handles(&self) -> Vec<Handle<K>> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}

impl<K, V> Default for HandlePool<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V: fmt::Debug> fmt::Debug for HandlePool<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlePool")
            .field("slots", &self.slots.len())
            .field("live", &self.live)
            .field("freed", &self.freed)
            .finish()
    }
}

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

//! Defines data structures related to GPU buffer resources.

use std::borrow::Cow;

/// How a buffer is going to be used. Determines memory placement, upload path,
/// alignment and bindless registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Vertex attributes, device-local.
    Vertex,
    /// Index data, device-local.
    Index,
    /// Shader constants, host-visible and registered as a bindless uniform buffer.
    Uniform,
    /// Shader read/write data, device-local and registered as a bindless storage buffer.
    Storage,
    /// Indirect draw/dispatch arguments, device-local, also writable from compute.
    Indirect,
    /// Host-writable source of copy commands.
    Staging,
}

impl BufferType {
    /// Returns `true` if uploads go straight through a host mapping instead of a
    /// staging copy.
    pub const fn is_host_visible(self) -> bool {
        matches!(self, BufferType::Uniform | BufferType::Staging)
    }

    /// Returns the offset alignment this type must respect for sub-range bindings.
    pub fn offset_alignment(self, limits: &DeviceLimits) -> u64 {
        match self {
            BufferType::Uniform => limits.min_uniform_buffer_offset_alignment,
            BufferType::Storage | BufferType::Indirect => {
                limits.min_storage_buffer_offset_alignment
            }
            _ => limits.copy_buffer_alignment,
        }
        .max(1)
    }
}

/// Rounds `size` up to the next multiple of `alignment`.
///
/// `aligned = ceil(size / alignment) * alignment`. A zero alignment leaves the
/// size unchanged.
///
/// # Examples
///
/// ```
/// use lumen_core::renderer::api::align_up;
/// assert_eq!(align_up(100, 256), 256);
/// assert_eq!(align_up(512, 256), 512);
/// assert_eq!(align_up(0, 256), 0);
/// ```
#[inline]
pub const fn align_up(size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        size
    } else {
        size.div_ceil(alignment) * alignment
    }
}

/// A descriptor used to create a buffer through the resource manager.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The requested size in bytes, before alignment padding.
    pub size: u64,
    /// How the buffer is going to be used.
    pub buffer_type: BufferType,
}

/// The device-level request the resource manager forwards to the backend, with
/// the size already padded.
#[derive(Debug, Clone)]
pub struct NativeBufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The allocation size in bytes.
    pub size: u64,
    /// How the buffer is going to be used.
    pub buffer_type: BufferType,
}

/// An opaque handle to a native GPU buffer inside the graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// Alignment and size limits reported by the device, consumed by the resource
/// manager and the bindless space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Required alignment of uniform buffer binding offsets.
    pub min_uniform_buffer_offset_alignment: u64,
    /// Required alignment of storage buffer binding offsets.
    pub min_storage_buffer_offset_alignment: u64,
    /// Alignment of buffer copy sizes and offsets.
    pub copy_buffer_alignment: u64,
    /// Alignment of `bytes_per_row` in buffer-to-image copies.
    pub copy_bytes_per_row_alignment: u32,
    /// Largest supported width/height of a 2D image.
    pub max_image_dimension_2d: u32,
    /// Largest single buffer allocation.
    pub max_buffer_size: u64,
    /// Binding-array elements available to one shader stage.
    pub max_binding_array_elements: u32,
    /// Sampler binding-array elements available to one shader stage.
    pub max_binding_array_samplers: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            min_uniform_buffer_offset_alignment: 256,
            min_storage_buffer_offset_alignment: 256,
            copy_buffer_alignment: 4,
            copy_bytes_per_row_alignment: 256,
            max_image_dimension_2d: 8192,
            max_buffer_size: 256 << 20,
            max_binding_array_elements: 4096,
            max_binding_array_samplers: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_is_a_multiple_and_never_shrinks() {
        for alignment in [1u64, 4, 64, 256] {
            for size in [1u64, 3, 64, 255, 256, 257, 1000] {
                let aligned = align_up(size, alignment);
                assert_eq!(aligned % alignment, 0);
                assert!(aligned >= size);
                assert!(aligned - size < alignment);
            }
        }
    }

    #[test]
    fn alignment_follows_buffer_type() {
        let limits = DeviceLimits {
            min_uniform_buffer_offset_alignment: 256,
            min_storage_buffer_offset_alignment: 32,
            copy_buffer_alignment: 4,
            ..Default::default()
        };
        assert_eq!(BufferType::Uniform.offset_alignment(&limits), 256);
        assert_eq!(BufferType::Storage.offset_alignment(&limits), 32);
        assert_eq!(BufferType::Indirect.offset_alignment(&limits), 32);
        assert_eq!(BufferType::Vertex.offset_alignment(&limits), 4);
        assert!(BufferType::Uniform.is_host_visible());
        assert!(!BufferType::Storage.is_host_visible());
    }
}

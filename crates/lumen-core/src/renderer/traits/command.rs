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

//! Command recording contracts used by transfer sessions and draw submission.

use crate::renderer::api::{BufferId, CommandBufferId, ImageId, MipRegion};
use crate::renderer::error::ResourceError;
use std::ops::Range;

/// Records copy commands for a transfer session.
pub trait TransferEncoder: Send {
    /// Copies `size` bytes between two buffers.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidHandle`] if either buffer is unknown to
    /// the device; nothing is recorded in that case.
    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError>;

    /// Copies staged mip levels into an image, one region per level.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidHandle`] if the buffer or the image is
    /// unknown to the device.
    fn copy_buffer_to_image(
        &mut self,
        source: BufferId,
        destination: ImageId,
        regions: &[MipRegion],
    ) -> Result<(), ResourceError>;

    /// Finishes recording and hands the command buffer back to the device.
    fn finish(self: Box<Self>) -> CommandBufferId;
}

/// The subset of a render pass the visibility pipeline needs to issue draws.
pub trait DrawRecorder {
    /// Draws indexed primitives.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

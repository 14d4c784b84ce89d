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

//! The swapchain contract driven by the
//! [`FrameOrchestrator`](crate::renderer::frame::FrameOrchestrator).

use crate::math::Extent2D;
use crate::renderer::error::RenderError;
use std::time::Duration;

/// Result of waiting on a frame slot's fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The slot's previous submission has completed (or there was none).
    Signaled,
    /// The timeout elapsed first.
    TimedOut,
}

/// Result of acquiring the next presentable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready for recording.
    Acquired {
        /// Index of the acquired swapchain image.
        image_index: u32,
    },
    /// An image was acquired but the swapchain no longer matches the surface.
    Suboptimal,
    /// The swapchain can no longer be used with the surface.
    OutOfDate,
    /// No image could be acquired this time (timeout, occluded window).
    Unavailable,
}

/// Result of presenting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The image was queued for presentation.
    Presented,
    /// Presented, but the swapchain no longer matches the surface.
    Suboptimal,
    /// The swapchain can no longer be used with the surface.
    OutOfDate,
}

/// Extents of the swapchain and the targets recreated with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetExtents {
    /// Extent of the presentable images.
    pub swapchain: Extent2D,
    /// Extent of the shared color render target.
    pub render_target: Extent2D,
    /// Extent of the shared depth target.
    pub depth_target: Extent2D,
}

/// A swapchain plus per-slot synchronization and command storage.
///
/// Slots are identified by index in `0..slot_count()`. The orchestrator
/// guarantees the call order `wait_slot`, `acquire`, `reset_slot`, recording,
/// `submit`, `present` for one slot at a time.
pub trait FrameBackend {
    /// The per-slot command recording scope handed to the client.
    type Recorder;

    /// Number of frame slots.
    fn slot_count(&self) -> usize;

    /// Waits for the slot's last submission to finish.
    fn wait_slot(&mut self, slot: usize, timeout: Duration) -> Result<FenceStatus, RenderError>;

    /// Acquires the next presentable image for `slot`.
    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome, RenderError>;

    /// Resets the slot's fence and opens its command recording.
    fn reset_slot(&mut self, slot: usize) -> Result<(), RenderError>;

    /// The recording scope of `slot`. Only valid between `reset_slot` and `submit`.
    fn recorder(&mut self, slot: usize) -> &mut Self::Recorder;

    /// Finishes recording and submits the slot's commands, signaling its fence.
    fn submit(&mut self, slot: usize) -> Result<(), RenderError>;

    /// Presents the image acquired for `slot`.
    fn present(&mut self, slot: usize) -> Result<PresentOutcome, RenderError>;

    /// Recreates the swapchain, render target and depth target at `extent`.
    fn recreate(&mut self, extent: Extent2D) -> Result<(), RenderError>;

    /// Current extents of the swapchain and its targets.
    fn extents(&self) -> TargetExtents;
}

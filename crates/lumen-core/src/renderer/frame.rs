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

//! The per-frame state machine: fence wait, acquire, record, submit, present,
//! and the resize transition that absorbs swapchain invalidation.

use crate::math::Extent2D;
use crate::renderer::error::RenderError;
use crate::renderer::traits::{
    AcquireOutcome, FenceStatus, FrameBackend, PresentOutcome, TargetExtents,
};
use std::time::Duration;

/// Proof that a frame is being recorded. Handed out by
/// [`FrameOrchestrator::begin_frame`] and consumed by [`FrameOrchestrator::end_frame`].
///
/// The token is deliberately neither `Clone` nor `Copy`: only one recording scope
/// can exist at a time.
#[derive(Debug)]
pub struct FrameToken {
    slot: usize,
    frame_number: u64,
    image_index: u32,
}

impl FrameToken {
    /// The frame slot being recorded.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Monotonic number of the frame.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Index of the acquired swapchain image.
    pub fn image_index(&self) -> u32 {
        self.image_index
    }
}

/// Why no frame could be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The swapchain was recreated; nothing must be recorded against the old targets.
    Resized,
    /// The surface has zero area.
    Minimized,
    /// The surface did not hand out an image this time.
    SurfaceUnavailable,
}

/// Result of [`FrameOrchestrator::begin_frame`].
#[derive(Debug)]
pub enum FrameStatus {
    /// Recording may start.
    Ready(FrameToken),
    /// This frame produces no image.
    Skipped(SkipReason),
}

/// Result of [`FrameOrchestrator::end_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// The frame was presented with an up to date swapchain.
    Presented,
    /// The frame was presented, then the swapchain was recreated.
    Resized,
}

/// Counters describing the frame loop so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Number of frames submitted.
    pub frame_number: u64,
    /// Number of `begin_frame` calls that did not start a frame.
    pub skipped_frames: u64,
    /// Number of swapchain recreations.
    pub resize_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePhase {
    Idle,
    Recording { slot: usize, frame_number: u64 },
}

/// Drives a [`FrameBackend`] through `begin_frame`/`end_frame` cycles.
///
/// At most `slot_count` frames are in flight: a slot is only reset for
/// recording after the fence of its previous submission signaled.
#[derive(Debug)]
pub struct FrameOrchestrator<B: FrameBackend> {
    backend: B,
    current_slot: usize,
    phase: FramePhase,
    fence_timeout: Duration,
    surface_extent: Extent2D,
    stats: FrameStats,
}

impl<B: FrameBackend> FrameOrchestrator<B> {
    /// Wraps a backend whose swapchain was created at its current extents.
    pub fn new(backend: B, fence_timeout: Duration) -> Self {
        let surface_extent = backend.extents().swapchain;
        log::info!(
            "FrameOrchestrator: {} frame slots, swapchain {surface_extent}",
            backend.slot_count()
        );
        Self {
            backend,
            current_slot: 0,
            phase: FramePhase::Idle,
            fence_timeout,
            surface_extent,
            stats: FrameStats::default(),
        }
    }

    /// Starts a frame for a surface currently `surface_extent` large.
    ///
    /// Waits for the current slot's previous submission, then acquires a
    /// swapchain image. Any swapchain invalidation recreates the targets and
    /// skips the frame; the slot index does not advance for skipped frames.
    ///
    /// # Errors
    ///
    /// * [`RenderError::FrameOutOfOrder`] if a frame is already being recorded.
    /// * [`RenderError::FenceTimeout`] if the slot's fence did not signal in time (fatal).
    pub fn begin_frame(&mut self, surface_extent: Extent2D) -> Result<FrameStatus, RenderError> {
        if let FramePhase::Recording { frame_number, .. } = self.phase {
            return Err(RenderError::FrameOutOfOrder(format!(
                "begin_frame called while frame {frame_number} is still recording"
            )));
        }
        self.surface_extent = surface_extent;

        if surface_extent.is_empty() {
            return Ok(self.skip(SkipReason::Minimized));
        }
        if surface_extent != self.backend.extents().swapchain {
            self.resize(surface_extent)?;
            return Ok(self.skip(SkipReason::Resized));
        }

        let slot = self.current_slot;
        self.wait_slot(slot)?;

        match self.backend.acquire(slot)? {
            AcquireOutcome::Acquired { image_index } => {
                self.backend.reset_slot(slot)?;
                let frame_number = self.stats.frame_number;
                self.phase = FramePhase::Recording { slot, frame_number };
                Ok(FrameStatus::Ready(FrameToken {
                    slot,
                    frame_number,
                    image_index,
                }))
            }
            AcquireOutcome::Suboptimal | AcquireOutcome::OutOfDate => {
                log::warn!("FrameOrchestrator: swapchain out of date at acquire, recreating");
                self.resize(surface_extent)?;
                Ok(self.skip(SkipReason::Resized))
            }
            AcquireOutcome::Unavailable => Ok(self.skip(SkipReason::SurfaceUnavailable)),
        }
    }

    /// The command recording scope of the frame `token` belongs to.
    pub fn recorder(&mut self, token: &FrameToken) -> &mut B::Recorder {
        self.backend.recorder(token.slot)
    }

    /// Submits and presents the frame, then advances to the next slot.
    ///
    /// A swapchain reported out of date or suboptimal by the present (or a
    /// surface resize notified during recording) is recreated before returning.
    ///
    /// # Errors
    ///
    /// * [`RenderError::FrameOutOfOrder`] if `token` is not the frame being recorded.
    /// * [`RenderError::SubmissionFailed`] and other fatal backend errors.
    pub fn end_frame(&mut self, token: FrameToken) -> Result<PresentStatus, RenderError> {
        let expected = FramePhase::Recording {
            slot: token.slot,
            frame_number: token.frame_number,
        };
        if self.phase != expected {
            return Err(RenderError::FrameOutOfOrder(format!(
                "token for frame {} (slot {}) does not match the recording frame",
                token.frame_number, token.slot
            )));
        }
        self.phase = FramePhase::Idle;

        if let Err(err) = self.backend.submit(token.slot) {
            log::error!(
                "FrameOrchestrator: submission of frame {} failed: {err}",
                token.frame_number
            );
            return Err(err);
        }
        self.stats.frame_number += 1;
        let outcome = self.backend.present(token.slot)?;
        self.current_slot = (self.current_slot + 1) % self.backend.slot_count();

        let stale = matches!(outcome, PresentOutcome::Suboptimal | PresentOutcome::OutOfDate)
            || self.surface_extent != self.backend.extents().swapchain;
        if stale && !self.surface_extent.is_empty() {
            self.resize(self.surface_extent)?;
            return Ok(PresentStatus::Resized);
        }
        Ok(PresentStatus::Presented)
    }

    /// Records a new surface extent reported by the window.
    ///
    /// Outside a frame the swapchain is recreated immediately; during recording
    /// the recreation is deferred to `end_frame`.
    pub fn notify_resized(&mut self, surface_extent: Extent2D) -> Result<(), RenderError> {
        self.surface_extent = surface_extent;
        if self.phase == FramePhase::Idle
            && !surface_extent.is_empty()
            && surface_extent != self.backend.extents().swapchain
        {
            self.resize(surface_extent)?;
        }
        Ok(())
    }

    /// Waits for every slot, then recreates the swapchain, render target and depth
    /// target at `extent`. Safe to call repeatedly; zero extents are ignored.
    pub fn resize(&mut self, extent: Extent2D) -> Result<(), RenderError> {
        if extent.is_empty() {
            log::warn!("FrameOrchestrator: ignoring resize to zero size: {extent}");
            return Ok(());
        }
        if let FramePhase::Recording { frame_number, .. } = self.phase {
            return Err(RenderError::FrameOutOfOrder(format!(
                "resize requested while frame {frame_number} is recording"
            )));
        }
        for slot in 0..self.backend.slot_count() {
            self.wait_slot(slot)?;
        }
        self.backend.recreate(extent)?;
        self.stats.resize_count += 1;
        log::info!("FrameOrchestrator: swapchain recreated at {extent}");
        Ok(())
    }

    /// Blocks until every slot's last submission has completed.
    pub fn wait_idle(&mut self) -> Result<(), RenderError> {
        for slot in 0..self.backend.slot_count() {
            self.wait_slot(slot)?;
        }
        Ok(())
    }

    /// Frame counters.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// The slot the next frame will be recorded in.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Returns `true` between a successful `begin_frame` and its `end_frame`.
    pub fn is_recording(&self) -> bool {
        matches!(self.phase, FramePhase::Recording { .. })
    }

    /// Current extents of the swapchain and its targets.
    pub fn extents(&self) -> TargetExtents {
        self.backend.extents()
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The wrapped backend, mutably. Must not be used to submit or present.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn wait_slot(&mut self, slot: usize) -> Result<(), RenderError> {
        match self.backend.wait_slot(slot, self.fence_timeout)? {
            FenceStatus::Signaled => Ok(()),
            FenceStatus::TimedOut => {
                log::error!(
                    "FrameOrchestrator: fence of slot {slot} did not signal within {} ms",
                    self.fence_timeout.as_millis()
                );
                Err(RenderError::FenceTimeout {
                    slot,
                    timeout: self.fence_timeout,
                })
            }
        }
    }

    fn skip(&mut self, reason: SkipReason) -> FrameStatus {
        self.stats.skipped_frames += 1;
        log::debug!("FrameOrchestrator: frame skipped ({reason:?})");
        FrameStatus::Skipped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug)]
    struct ScriptedBackend {
        extent: Extent2D,
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<PresentOutcome>,
        fence: FenceStatus,
        recreated: Vec<Extent2D>,
        submitted: Vec<usize>,
        draws: u32,
    }

    impl ScriptedBackend {
        fn new(width: u32, height: u32) -> Self {
            Self {
                extent: Extent2D::new(width, height),
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                fence: FenceStatus::Signaled,
                recreated: Vec::new(),
                submitted: Vec::new(),
                draws: 0,
            }
        }
    }

    impl FrameBackend for ScriptedBackend {
        type Recorder = u32;

        fn slot_count(&self) -> usize {
            2
        }

        fn wait_slot(
            &mut self,
            _slot: usize,
            _timeout: Duration,
        ) -> Result<FenceStatus, RenderError> {
            Ok(self.fence)
        }

        fn acquire(&mut self, _slot: usize) -> Result<AcquireOutcome, RenderError> {
            Ok(self
                .acquires
                .pop_front()
                .unwrap_or(AcquireOutcome::Acquired { image_index: 0 }))
        }

        fn reset_slot(&mut self, _slot: usize) -> Result<(), RenderError> {
            Ok(())
        }

        fn recorder(&mut self, _slot: usize) -> &mut u32 {
            &mut self.draws
        }

        fn submit(&mut self, slot: usize) -> Result<(), RenderError> {
            self.submitted.push(slot);
            Ok(())
        }

        fn present(&mut self, _slot: usize) -> Result<PresentOutcome, RenderError> {
            Ok(self.presents.pop_front().unwrap_or(PresentOutcome::Presented))
        }

        fn recreate(&mut self, extent: Extent2D) -> Result<(), RenderError> {
            self.extent = extent;
            self.recreated.push(extent);
            Ok(())
        }

        fn extents(&self) -> TargetExtents {
            TargetExtents {
                swapchain: self.extent,
                render_target: self.extent,
                depth_target: self.extent,
            }
        }
    }

    fn orchestrator(backend: ScriptedBackend) -> FrameOrchestrator<ScriptedBackend> {
        FrameOrchestrator::new(backend, Duration::from_millis(100))
    }

    fn ready(status: FrameStatus) -> FrameToken {
        match status {
            FrameStatus::Ready(token) => token,
            FrameStatus::Skipped(reason) => panic!("frame unexpectedly skipped: {reason:?}"),
        }
    }

    #[test]
    fn slots_advance_round_robin() {
        let mut frames = orchestrator(ScriptedBackend::new(640, 480));
        let extent = Extent2D::new(640, 480);
        for expected in [0, 1, 0, 1] {
            let token = ready(frames.begin_frame(extent).unwrap());
            assert_eq!(token.slot(), expected);
            assert_eq!(frames.end_frame(token).unwrap(), PresentStatus::Presented);
        }
        assert_eq!(frames.backend().submitted, vec![0, 1, 0, 1]);
        assert_eq!(frames.stats().frame_number, 4);
    }

    #[test]
    fn out_of_date_acquire_recreates_and_keeps_the_slot() {
        let mut backend = ScriptedBackend::new(640, 480);
        backend.acquires.push_back(AcquireOutcome::OutOfDate);
        let mut frames = orchestrator(backend);
        let extent = Extent2D::new(640, 480);

        assert!(matches!(
            frames.begin_frame(extent).unwrap(),
            FrameStatus::Skipped(SkipReason::Resized)
        ));
        assert_eq!(frames.current_slot(), 0);
        assert_eq!(frames.stats().resize_count, 1);

        let token = ready(frames.begin_frame(extent).unwrap());
        assert_eq!(token.slot(), 0);
        frames.end_frame(token).unwrap();
    }

    #[test]
    fn minimized_surface_skips_without_recreating() {
        let mut frames = orchestrator(ScriptedBackend::new(640, 480));
        assert!(matches!(
            frames.begin_frame(Extent2D::new(0, 480)).unwrap(),
            FrameStatus::Skipped(SkipReason::Minimized)
        ));
        assert!(frames.backend().recreated.is_empty());
        assert_eq!(frames.stats().skipped_frames, 1);
    }

    #[test]
    fn unavailable_surface_skips() {
        let mut backend = ScriptedBackend::new(640, 480);
        backend.acquires.push_back(AcquireOutcome::Unavailable);
        let mut frames = orchestrator(backend);
        assert!(matches!(
            frames.begin_frame(Extent2D::new(640, 480)).unwrap(),
            FrameStatus::Skipped(SkipReason::SurfaceUnavailable)
        ));
        assert!(!frames.is_recording());
    }

    #[test]
    fn fence_timeout_is_fatal() {
        let mut backend = ScriptedBackend::new(640, 480);
        backend.fence = FenceStatus::TimedOut;
        let mut frames = orchestrator(backend);
        let err = frames.begin_frame(Extent2D::new(640, 480)).unwrap_err();
        assert!(matches!(err, RenderError::FenceTimeout { slot: 0, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn suboptimal_present_resizes_after_presenting() {
        let mut backend = ScriptedBackend::new(640, 480);
        backend.presents.push_back(PresentOutcome::Suboptimal);
        let mut frames = orchestrator(backend);
        let token = ready(frames.begin_frame(Extent2D::new(640, 480)).unwrap());
        assert_eq!(frames.end_frame(token).unwrap(), PresentStatus::Resized);
        assert_eq!(frames.current_slot(), 1);
        assert_eq!(frames.backend().recreated, vec![Extent2D::new(640, 480)]);
    }

    #[test]
    fn overlapping_begin_is_rejected() {
        let mut frames = orchestrator(ScriptedBackend::new(640, 480));
        let extent = Extent2D::new(640, 480);
        let token = ready(frames.begin_frame(extent).unwrap());
        assert!(matches!(
            frames.begin_frame(extent),
            Err(RenderError::FrameOutOfOrder(_))
        ));
        frames.end_frame(token).unwrap();
    }

    #[test]
    fn resize_during_recording_is_deferred_to_end_frame() {
        let mut frames = orchestrator(ScriptedBackend::new(640, 480));
        let token = ready(frames.begin_frame(Extent2D::new(640, 480)).unwrap());
        frames.notify_resized(Extent2D::new(800, 600)).unwrap();
        assert!(frames.backend().recreated.is_empty());

        assert_eq!(frames.end_frame(token).unwrap(), PresentStatus::Resized);
        assert_eq!(frames.extents().swapchain, Extent2D::new(800, 600));
    }
}

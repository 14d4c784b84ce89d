//! Mock backends shared by the integration tests.
//!
//! `MockDevice` keeps every buffer's bytes in host memory and replays recorded
//! transfer commands at submission, so tests can check what actually landed.
//! Submissions, descriptor writes and copies can be made to fail on demand.
//! `MockSwapchain` tracks which slots are in flight and counts draws.

#![allow(dead_code)]

use lumen_core::math::Extent2D;
use lumen_core::renderer::api::*;
use lumen_core::renderer::traits::*;
use lumen_core::renderer::{BindlessIndex, DescriptorResource, RenderError, ResourceError};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum MockCommand {
    CopyBuffer {
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    },
    CopyImage {
        source: BufferId,
        destination: ImageId,
        regions: Vec<MipRegion>,
    },
}

#[derive(Debug, Default)]
pub struct MockState {
    next_id: usize,
    next_command_buffer: u64,
    pub buffers: HashMap<usize, (BufferType, Vec<u8>)>,
    pub images: HashMap<usize, (u32, u32, u32)>,
    pub image_uploads: Vec<(ImageId, Vec<MipRegion>)>,
    pub samplers: HashSet<usize>,
    pub shaders: HashSet<usize>,
    pub descriptor_writes: Vec<(u32, DescriptorResource)>,
    pub descriptor_releases: Vec<BindlessIndex>,
    pub pending: HashMap<u64, Vec<MockCommand>>,
    pub submissions: usize,
    pub wait_idle_calls: usize,
    pub direct_writes: usize,
    pub fail_submissions: bool,
    pub fail_descriptor_writes: bool,
    pub fail_copies: bool,
}

impl MockState {
    fn next(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug)]
pub struct MockDevice {
    pub state: Arc<Mutex<MockState>>,
    pub limits: DeviceLimits,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            limits,
        }
    }

    pub fn buffer_bytes(&self, id: BufferId) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .buffers
            .get(&id.0)
            .map(|(_, bytes)| bytes.clone())
    }

    pub fn live_buffers(&self) -> usize {
        self.state.lock().unwrap().buffers.len()
    }

    pub fn live_images(&self) -> usize {
        self.state.lock().unwrap().images.len()
    }

    pub fn submissions(&self) -> usize {
        self.state.lock().unwrap().submissions
    }

    pub fn descriptor_writes(&self) -> usize {
        self.state.lock().unwrap().descriptor_writes.len()
    }

    pub fn set_fail_submissions(&self, fail: bool) {
        self.state.lock().unwrap().fail_submissions = fail;
    }

    pub fn set_fail_descriptor_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_descriptor_writes = fail;
    }

    pub fn set_fail_copies(&self, fail: bool) {
        self.state.lock().unwrap().fail_copies = fail;
    }
}

struct MockEncoder {
    state: Arc<Mutex<MockState>>,
    commands: Vec<MockCommand>,
}

impl TransferEncoder for MockEncoder {
    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError> {
        if self.state.lock().unwrap().fail_copies {
            return Err(ResourceError::InvalidHandle);
        }
        self.commands.push(MockCommand::CopyBuffer {
            source,
            source_offset,
            destination,
            destination_offset,
            size,
        });
        Ok(())
    }

    fn copy_buffer_to_image(
        &mut self,
        source: BufferId,
        destination: ImageId,
        regions: &[MipRegion],
    ) -> Result<(), ResourceError> {
        if self.state.lock().unwrap().fail_copies {
            return Err(ResourceError::InvalidHandle);
        }
        self.commands.push(MockCommand::CopyImage {
            source,
            destination,
            regions: regions.to_vec(),
        });
        Ok(())
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let mut state = self.state.lock().unwrap();
        state.next_command_buffer += 1;
        let id = state.next_command_buffer;
        state.pending.insert(id, self.commands);
        CommandBufferId(id)
    }
}

impl DescriptorWriter for MockDevice {
    fn write_descriptor(
        &self,
        index: u32,
        resource: &DescriptorResource,
    ) -> Result<(), ResourceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_descriptor_writes {
            return Err(ResourceError::BackendError("descriptor write rejected".to_string()));
        }
        state.descriptor_writes.push((index, *resource));
        Ok(())
    }

    fn release_descriptor(&self, index: BindlessIndex) {
        self.state.lock().unwrap().descriptor_releases.push(index);
    }
}

impl GraphicsDevice for MockDevice {
    fn adapter_info(&self) -> RendererAdapterInfo {
        RendererAdapterInfo {
            name: "Mock Device".to_string(),
            backend: "Mock".to_string(),
            device_type: RendererDeviceType::Cpu,
        }
    }

    fn limits(&self) -> DeviceLimits {
        self.limits.clone()
    }

    fn create_buffer(
        &self,
        descriptor: &NativeBufferDescriptor,
    ) -> Result<BufferId, ResourceError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next();
        state
            .buffers
            .insert(id, (descriptor.buffer_type, vec![0; descriptor.size as usize]));
        Ok(BufferId(id))
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &NativeBufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let id = self.create_buffer(descriptor)?;
        let mut state = self.state.lock().unwrap();
        let (_, bytes) = state.buffers.get_mut(&id.0).unwrap();
        bytes[..data.len()].copy_from_slice(data);
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        self.state
            .lock()
            .unwrap()
            .buffers
            .remove(&id.0)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state.lock().unwrap();
        state.direct_writes += 1;
        let (_, bytes) = state.buffers.get_mut(&id.0).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_image(&self, descriptor: &ImageDescriptor) -> Result<ImageId, ResourceError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next();
        state
            .images
            .insert(id, (descriptor.width, descriptor.height, descriptor.mip_levels));
        Ok(ImageId(id))
    }

    fn destroy_image(&self, id: ImageId) -> Result<(), ResourceError> {
        self.state
            .lock()
            .unwrap()
            .images
            .remove(&id.0)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn create_sampler(&self, _descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next();
        state.samplers.insert(id);
        Ok(SamplerId(id))
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        if self.state.lock().unwrap().samplers.remove(&id.0) {
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn create_shader(&self, _descriptor: &ShaderDescriptor) -> Result<ShaderId, ResourceError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next();
        state.shaders.insert(id);
        Ok(ShaderId(id))
    }

    fn destroy_shader(&self, id: ShaderId) -> Result<(), ResourceError> {
        if self.state.lock().unwrap().shaders.remove(&id.0) {
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn create_transfer_encoder(&self, _label: Option<&str>) -> Box<dyn TransferEncoder> {
        Box::new(MockEncoder {
            state: Arc::clone(&self.state),
            commands: Vec::new(),
        })
    }

    fn submit_transfer_and_wait(&self, command_buffer: CommandBufferId) -> Result<(), RenderError> {
        let mut state = self.state.lock().unwrap();
        let commands = state
            .pending
            .remove(&command_buffer.0)
            .ok_or_else(|| RenderError::SubmissionFailed("unknown command buffer".to_string()))?;
        if state.fail_submissions {
            return Err(RenderError::SubmissionFailed("queue rejected the batch".to_string()));
        }
        state.submissions += 1;

        for command in commands {
            match command {
                MockCommand::CopyBuffer {
                    source,
                    source_offset,
                    destination,
                    destination_offset,
                    size,
                } => {
                    let src = source_offset as usize;
                    let chunk = state.buffers[&source.0].1[src..src + size as usize].to_vec();
                    let dst = destination_offset as usize;
                    let (_, bytes) = state.buffers.get_mut(&destination.0).unwrap();
                    bytes[dst..dst + size as usize].copy_from_slice(&chunk);
                }
                MockCommand::CopyImage {
                    destination,
                    regions,
                    ..
                } => state.image_uploads.push((destination, regions)),
            }
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        self.state.lock().unwrap().wait_idle_calls += 1;
        Ok(())
    }
}

/// Counts draws recorded into a frame slot.
#[derive(Debug, Default)]
pub struct MockRecorder {
    pub draws: Vec<(Range<u32>, i32, Range<u32>)>,
}

impl DrawRecorder for MockRecorder {
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.draws.push((indices, base_vertex, instances));
    }
}

/// A swapchain whose surface size can be changed by the test, like a window
/// being resized by the user.
#[derive(Debug)]
pub struct MockSwapchain {
    pub surface: Extent2D,
    extent: Extent2D,
    in_flight: Vec<bool>,
    recording: Vec<bool>,
    recorders: Vec<MockRecorder>,
    pub draws_per_frame: Vec<usize>,
    pub recreations: usize,
    pub hung_slot: Option<usize>,
    pub fence_waits: usize,
}

impl MockSwapchain {
    pub fn new(slots: usize, extent: Extent2D) -> Self {
        Self {
            surface: extent,
            extent,
            in_flight: vec![false; slots],
            recording: vec![false; slots],
            recorders: (0..slots).map(|_| MockRecorder::default()).collect(),
            draws_per_frame: Vec::new(),
            recreations: 0,
            hung_slot: None,
            fence_waits: 0,
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.iter().filter(|f| **f).count()
    }
}

impl FrameBackend for MockSwapchain {
    type Recorder = MockRecorder;

    fn slot_count(&self) -> usize {
        self.in_flight.len()
    }

    fn wait_slot(&mut self, slot: usize, _timeout: Duration) -> Result<FenceStatus, RenderError> {
        self.fence_waits += 1;
        if self.hung_slot == Some(slot) && self.in_flight[slot] {
            return Ok(FenceStatus::TimedOut);
        }
        // The GPU finishes the slot's work once someone waits for it.
        self.in_flight[slot] = false;
        Ok(FenceStatus::Signaled)
    }

    fn acquire(&mut self, _slot: usize) -> Result<AcquireOutcome, RenderError> {
        if self.surface != self.extent {
            return Ok(AcquireOutcome::OutOfDate);
        }
        Ok(AcquireOutcome::Acquired { image_index: 0 })
    }

    fn reset_slot(&mut self, slot: usize) -> Result<(), RenderError> {
        assert!(!self.in_flight[slot], "slot {slot} reset while in flight");
        assert!(!self.recording.iter().any(|r| *r), "two recording scopes open");
        self.recording[slot] = true;
        self.recorders[slot].draws.clear();
        Ok(())
    }

    fn recorder(&mut self, slot: usize) -> &mut MockRecorder {
        &mut self.recorders[slot]
    }

    fn submit(&mut self, slot: usize) -> Result<(), RenderError> {
        assert!(self.recording[slot], "slot {slot} submitted without recording");
        self.recording[slot] = false;
        self.in_flight[slot] = true;
        self.draws_per_frame.push(self.recorders[slot].draws.len());
        Ok(())
    }

    fn present(&mut self, _slot: usize) -> Result<PresentOutcome, RenderError> {
        if self.surface != self.extent {
            return Ok(PresentOutcome::OutOfDate);
        }
        Ok(PresentOutcome::Presented)
    }

    fn recreate(&mut self, extent: Extent2D) -> Result<(), RenderError> {
        assert!(self.in_flight.iter().all(|f| !*f), "recreated with frames in flight");
        self.extent = extent;
        self.recreations += 1;
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

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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lumen_core::renderer::api::{
    BufferId, CommandBufferId, DeviceLimits, ImageDescriptor, ImageFormat, ImageId, ImageUsage,
    NativeBufferDescriptor, RenderSettings, RendererAdapterInfo, SamplerDescriptor, SamplerId,
    ShaderDescriptor, ShaderId,
};
use lumen_core::renderer::traits::{DescriptorWriter, GraphicsDevice, TransferEncoder};
use lumen_core::renderer::{
    BindlessCapacities, BindlessIndex, DescriptorResource, RenderError, ResourceError,
};

use super::bindless::{BindlessEntry, WgpuBindlessSet};
use super::command::WgpuTransferEncoder;
use super::conversions::{from_wgpu_device_type, from_wgpu_limits, IntoWgpu};

#[derive(Debug)]
pub(crate) struct WgpuBufferEntry {
    pub(crate) wgpu_buffer: wgpu::Buffer,
    pub(crate) size: u64,
}

#[derive(Debug)]
pub(crate) struct WgpuImageEntry {
    pub(crate) wgpu_texture: wgpu::Texture,
    pub(crate) wgpu_view: wgpu::TextureView,
    pub(crate) format: ImageFormat,
    pub(crate) usage: ImageUsage,
}

#[derive(Debug)]
pub(crate) struct WgpuSamplerEntry {
    pub(crate) wgpu_sampler: wgpu::Sampler,
}

#[derive(Debug)]
pub(crate) struct WgpuShaderEntry {
    pub(crate) wgpu_module: wgpu::ShaderModule,
}

/// The internal, non-clonable state of the WgpuDevice.
#[derive(Debug)]
pub struct WgpuDeviceInternal {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: RendererAdapterInfo,
    limits: DeviceLimits,
    bindless: Mutex<WgpuBindlessSet>,

    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,
    images: Mutex<HashMap<ImageId, WgpuImageEntry>>,
    samplers: Mutex<HashMap<SamplerId, WgpuSamplerEntry>>,
    shaders: Mutex<HashMap<ShaderId, WgpuShaderEntry>>,

    next_buffer_id: AtomicUsize,
    next_image_id: AtomicUsize,
    next_sampler_id: AtomicUsize,
    next_shader_id: AtomicUsize,

    /// Command buffers that have been finished but not yet submitted.
    pending_command_buffers: Mutex<HashMap<CommandBufferId, wgpu::CommandBuffer>>,
    /// A thread-safe counter to generate unique command buffer IDs.
    command_buffer_id_counter: AtomicU64,
}

/// A clonable, thread-safe handle to the wgpu device.
///
/// Native resources live in ID-keyed tables; the bindless bind group is owned
/// here and rebuilt on every descriptor write.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    internal: Arc<WgpuDeviceInternal>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

impl WgpuDevice {
    /// Wraps a logical device and its queue.
    ///
    /// ## Arguments
    /// * `device` - The logical device.
    /// * `queue` - The queue every submission goes to.
    /// * `adapter_info` - Information about the adapter the device was created on.
    /// * `settings` - Bindless capacity cap and storage image format.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        adapter_info: &wgpu::AdapterInfo,
        settings: &RenderSettings,
    ) -> Self {
        let limits = from_wgpu_limits(&device.limits());
        let capacities = BindlessCapacities::from_limits(
            limits.max_binding_array_elements,
            limits.max_binding_array_samplers,
            settings.max_bindless_descriptors,
        );
        let bindless =
            WgpuBindlessSet::new(&device, capacities, settings.storage_image_format.into_wgpu());

        Self {
            internal: Arc::new(WgpuDeviceInternal {
                device,
                queue,
                adapter_info: RendererAdapterInfo {
                    name: adapter_info.name.clone(),
                    backend: adapter_info.backend.to_string(),
                    device_type: from_wgpu_device_type(adapter_info.device_type),
                },
                limits,
                bindless: Mutex::new(bindless),
                buffers: Mutex::new(HashMap::new()),
                images: Mutex::new(HashMap::new()),
                samplers: Mutex::new(HashMap::new()),
                shaders: Mutex::new(HashMap::new()),
                next_buffer_id: AtomicUsize::new(0),
                next_image_id: AtomicUsize::new(0),
                next_sampler_id: AtomicUsize::new(0),
                next_shader_id: AtomicUsize::new(0),
                pending_command_buffers: Mutex::new(HashMap::new()),
                command_buffer_id_counter: AtomicU64::new(0),
            }),
        }
    }

    // --- ID Generation Helpers ---

    fn generate_buffer_id(&self) -> BufferId {
        BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_image_id(&self) -> ImageId {
        ImageId(self.internal.next_image_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_sampler_id(&self) -> SamplerId {
        SamplerId(self.internal.next_sampler_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_shader_id(&self) -> ShaderId {
        ShaderId(self.internal.next_shader_id.fetch_add(1, Ordering::Relaxed))
    }

    // --- Native access ---

    /// The underlying `wgpu::Device`.
    pub fn wgpu_device(&self) -> &wgpu::Device {
        &self.internal.device
    }

    /// The queue graphics, compute and transfer work is submitted to.
    pub fn wgpu_queue(&self) -> &wgpu::Queue {
        &self.internal.queue
    }

    /// Retrieves the native buffer behind `id`.
    pub fn get_wgpu_buffer(&self, id: BufferId) -> Option<wgpu::Buffer> {
        let buffers = self.internal.buffers.lock().ok()?;
        buffers.get(&id).map(|entry| entry.wgpu_buffer.clone())
    }

    /// Retrieves the native texture behind `id`.
    pub fn get_wgpu_texture(&self, id: ImageId) -> Option<wgpu::Texture> {
        let images = self.internal.images.lock().ok()?;
        images.get(&id).map(|entry| entry.wgpu_texture.clone())
    }

    /// Retrieves the default view of the image behind `id`.
    pub fn get_wgpu_texture_view(&self, id: ImageId) -> Option<wgpu::TextureView> {
        let images = self.internal.images.lock().ok()?;
        images.get(&id).map(|entry| entry.wgpu_view.clone())
    }

    /// Retrieves the native shader module behind `id`.
    pub fn get_wgpu_shader_module(&self, id: ShaderId) -> Option<wgpu::ShaderModule> {
        let shaders = self.internal.shaders.lock().ok()?;
        shaders.get(&id).map(|entry| entry.wgpu_module.clone())
    }

    /// The layout of bind group 0, shared by every pipeline that reads bindless resources.
    pub fn bindless_layout(&self) -> Result<wgpu::BindGroupLayout, RenderError> {
        let set = lock(&self.internal.bindless, "bindless")?;
        Ok(set.layout().clone())
    }

    /// The current bindless bind group.
    ///
    /// The group is rebuilt on each registration; a frame that already bound
    /// the previous group keeps it alive until it completes.
    pub fn bindless_bind_group(&self) -> Result<wgpu::BindGroup, RenderError> {
        let set = lock(&self.internal.bindless, "bindless")?;
        Ok(set.bind_group().clone())
    }

    /// Number of bound elements of each bindless array, in binding order.
    pub fn bindless_bound_lengths(&self) -> Result<[usize; 4], RenderError> {
        use lumen_core::renderer::DescriptorKind;
        let set = lock(&self.internal.bindless, "bindless")?;
        Ok(DescriptorKind::ALL.map(|kind| set.bound_len(kind)))
    }

    /// (crate-internal) Registers a finished wgpu::CommandBuffer, storing it
    /// in a map and returning an abstract ID for it.
    pub(crate) fn register_command_buffer(&self, buffer: wgpu::CommandBuffer) -> CommandBufferId {
        let new_id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        if let Ok(mut guard) = self.internal.pending_command_buffers.lock() {
            guard.insert(new_id, buffer);
        } else {
            log::error!("WgpuDevice: command buffer table poisoned, dropping {new_id:?}");
        }
        new_id
    }

    /// Submits a registered command buffer and returns its submission index.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SubmissionFailed`] if the ID is unknown.
    pub fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferId,
    ) -> Result<wgpu::SubmissionIndex, RenderError> {
        let buffer = lock(&self.internal.pending_command_buffers, "command buffers")?
            .remove(&command_buffer)
            .ok_or_else(|| {
                RenderError::SubmissionFailed(format!(
                    "command buffer {command_buffer:?} does not exist"
                ))
            })?;
        Ok(self.internal.queue.submit(std::iter::once(buffer)))
    }

    /// Blocks until `submission` completed or `timeout` elapsed.
    ///
    /// ## Returns
    /// `Ok(true)` once the submission finished, `Ok(false)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SubmissionFailed`] for any other poll failure.
    pub fn wait_for_submission(
        &self,
        submission: wgpu::SubmissionIndex,
        timeout: Option<Duration>,
    ) -> Result<bool, RenderError> {
        match self.internal.device.poll(wgpu::PollType::Wait {
            submission_index: Some(submission),
            timeout,
        }) {
            Ok(_) => Ok(true),
            Err(wgpu::PollError::Timeout) => Ok(false),
            Err(e) => Err(RenderError::SubmissionFailed(e.to_string())),
        }
    }

    /// Processes pending callbacks (buffer mappings) without blocking.
    pub fn poll_device_non_blocking(&self) {
        if let Err(e) = self.internal.device.poll(wgpu::PollType::Poll) {
            log::warn!("Failed to poll device (non-blocking): {e:?}");
        }
    }

    fn native_image_view(
        &self,
        id: ImageId,
    ) -> Result<(wgpu::TextureView, ImageFormat), ResourceError> {
        let images = lock(&self.internal.images, "images")?;
        let entry = images.get(&id).ok_or(ResourceError::NotFound)?;
        Ok((entry.wgpu_view.clone(), entry.format))
    }
}

impl DescriptorWriter for WgpuDevice {
    fn write_descriptor(
        &self,
        index: u32,
        resource: &DescriptorResource,
    ) -> Result<(), ResourceError> {
        let mut set = lock(&self.internal.bindless, "bindless")?;

        let entry = match *resource {
            DescriptorResource::CombinedImageSampler { image, sampler } => {
                let (view, format) = self.native_image_view(image)?;
                if format.is_depth() {
                    return Err(ResourceError::Unsupported(
                        "depth images cannot be sampled through the bindless array".to_string(),
                    ));
                }
                let sampler = lock(&self.internal.samplers, "samplers")?
                    .get(&sampler)
                    .map(|entry| entry.wgpu_sampler.clone())
                    .ok_or(ResourceError::NotFound)?;
                BindlessEntry::CombinedImageSampler(view, sampler)
            }
            DescriptorResource::UniformBuffer(id) => BindlessEntry::UniformBuffer(
                self.get_wgpu_buffer(id).ok_or(ResourceError::NotFound)?,
            ),
            DescriptorResource::StorageBuffer(id) => BindlessEntry::StorageBuffer(
                self.get_wgpu_buffer(id).ok_or(ResourceError::NotFound)?,
            ),
            DescriptorResource::StorageImage(id) => {
                let (view, format) = self.native_image_view(id)?;
                let native: wgpu::TextureFormat = format.into_wgpu();
                if native != set.storage_format() {
                    return Err(ResourceError::Unsupported(format!(
                        "storage images must use {:?}, got {format:?}",
                        set.storage_format()
                    )));
                }
                BindlessEntry::StorageImage(view)
            }
        };

        set.write(&self.internal.device, index, entry)?;
        log::debug!("WgpuDevice: Wrote {} descriptor at index {index}", resource.kind());
        Ok(())
    }

    fn release_descriptor(&self, index: BindlessIndex) {
        match lock(&self.internal.bindless, "bindless") {
            Ok(mut set) => set.release(index.kind, index.index),
            Err(err) => log::warn!("WgpuDevice: could not release {index:?}: {err}"),
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    fn adapter_info(&self) -> RendererAdapterInfo {
        self.internal.adapter_info.clone()
    }

    fn limits(&self) -> DeviceLimits {
        self.internal.limits.clone()
    }

    // --- Buffer Operations ---

    fn create_buffer(
        &self,
        descriptor: &NativeBufferDescriptor,
    ) -> Result<BufferId, ResourceError> {
        let wgpu_buffer = self.internal.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size,
            usage: descriptor.buffer_type.into_wgpu(),
            mapped_at_creation: false,
        });

        let id = self.generate_buffer_id();
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer,
                size: descriptor.size,
            },
        );
        log::debug!(
            "WgpuDevice: Created {:?} buffer {:?} ({} bytes, label {:?})",
            descriptor.buffer_type,
            id,
            descriptor.size,
            descriptor.label
        );
        Ok(id)
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &NativeBufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let size = lumen_core::renderer::align_up(
            descriptor.size.max(data.len() as u64).max(1),
            wgpu::COPY_BUFFER_ALIGNMENT,
        );
        let wgpu_buffer = self.internal.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size,
            usage: descriptor.buffer_type.into_wgpu(),
            mapped_at_creation: true,
        });
        if !data.is_empty() {
            wgpu_buffer
                .get_mapped_range_mut(..)
                .slice(..data.len())
                .copy_from_slice(data);
        }
        wgpu_buffer.unmap();

        let id = self.generate_buffer_id();
        lock(&self.internal.buffers, "buffers")?.insert(id, WgpuBufferEntry { wgpu_buffer, size });
        log::debug!("WgpuDevice: Created initialized buffer {id:?} ({size} bytes)");
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        match lock(&self.internal.buffers, "buffers")?.remove(&id) {
            Some(_) => {
                log::debug!("WgpuDevice: Destroyed buffer {id:?}");
                Ok(())
            }
            None => Err(ResourceError::NotFound),
        }
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let buffers = lock(&self.internal.buffers, "buffers")?;
        let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
        if offset + data.len() as u64 > entry.size {
            return Err(ResourceError::OutOfBounds {
                offset,
                size: data.len() as u64,
                capacity: entry.size,
            });
        }
        self.internal.queue.write_buffer(&entry.wgpu_buffer, offset, data);
        Ok(())
    }

    // --- Image Operations ---

    fn create_image(&self, descriptor: &ImageDescriptor) -> Result<ImageId, ResourceError> {
        let wgpu_texture = self.internal.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.width,
                height: descriptor.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: descriptor.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: descriptor.format.into_wgpu(),
            usage: descriptor.usage.into_wgpu(),
            view_formats: &[],
        });
        let wgpu_view = wgpu_texture.create_view(&wgpu::TextureViewDescriptor {
            label: descriptor.label.as_deref(),
            ..Default::default()
        });

        let id = self.generate_image_id();
        lock(&self.internal.images, "images")?.insert(
            id,
            WgpuImageEntry {
                wgpu_texture,
                wgpu_view,
                format: descriptor.format,
                usage: descriptor.usage,
            },
        );
        log::debug!(
            "WgpuDevice: Created image {:?} {}x{} ({:?}, {} mips)",
            id,
            descriptor.width,
            descriptor.height,
            descriptor.format,
            descriptor.mip_levels
        );
        Ok(id)
    }

    fn destroy_image(&self, id: ImageId) -> Result<(), ResourceError> {
        match lock(&self.internal.images, "images")?.remove(&id) {
            Some(entry) => {
                log::debug!(
                    "WgpuDevice: Destroyed image {id:?} (usage bits {:#x})",
                    entry.usage.bits()
                );
                Ok(())
            }
            None => Err(ResourceError::NotFound),
        }
    }

    // --- Sampler Operations ---

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let address_mode: wgpu::AddressMode = descriptor.address_mode.into_wgpu();
        let filter: wgpu::FilterMode = descriptor.filter.into_wgpu();
        let wgpu_sampler = self.internal.device.create_sampler(&wgpu::SamplerDescriptor {
            label: descriptor.label.as_deref(),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: descriptor.mipmap_filter.into_wgpu(),
            ..Default::default()
        });

        let id = self.generate_sampler_id();
        lock(&self.internal.samplers, "samplers")?.insert(id, WgpuSamplerEntry { wgpu_sampler });
        log::debug!("WgpuDevice: Created sampler {id:?}");
        Ok(id)
    }

    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError> {
        match lock(&self.internal.samplers, "samplers")?.remove(&id) {
            Some(_) => Ok(()),
            None => Err(ResourceError::NotFound),
        }
    }

    // --- Shader Operations ---

    fn create_shader(&self, descriptor: &ShaderDescriptor) -> Result<ShaderId, ResourceError> {
        let wgpu_module = self
            .internal
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: descriptor.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(descriptor.source.clone()),
            });

        let id = self.generate_shader_id();
        lock(&self.internal.shaders, "shaders")?.insert(id, WgpuShaderEntry { wgpu_module });
        log::info!(
            "WgpuDevice: Created shader module {:?} with ID: {:?}",
            descriptor.label.as_deref().unwrap_or_default(),
            id
        );
        Ok(id)
    }

    fn destroy_shader(&self, id: ShaderId) -> Result<(), ResourceError> {
        match lock(&self.internal.shaders, "shaders")?.remove(&id) {
            Some(_) => {
                log::debug!("WgpuDevice: Destroyed shader module with ID: {id:?}");
                Ok(())
            }
            None => Err(ResourceError::NotFound),
        }
    }

    // --- Transfers ---

    fn create_transfer_encoder(&self, label: Option<&str>) -> Box<dyn TransferEncoder> {
        let encoder = self
            .internal
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label });
        Box::new(WgpuTransferEncoder {
            encoder: Some(encoder),
            device: self.clone(),
        })
    }

    fn submit_transfer_and_wait(&self, command_buffer: CommandBufferId) -> Result<(), RenderError> {
        let submission = self.submit_command_buffer(command_buffer)?;
        if self.wait_for_submission(submission, None)? {
            Ok(())
        } else {
            Err(RenderError::SubmissionFailed(
                "transfer submission did not complete".to_string(),
            ))
        }
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        self.internal
            .device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| RenderError::SubmissionFailed(e.to_string()))
    }
}

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

//! Creation, upload and destruction of buffers, images, samplers and shaders.
//!
//! The [`ResourceManager`] owns every [`ResourceRecord`](BufferRecord) and hands
//! out generational handles. Resources that shaders address through the bindless
//! set are registered on creation and unregistered on destruction.
//!
//! Uploads to host-visible buffers are direct writes. Everything else goes
//! through staging buffers whose copies are recorded into a transfer session:
//! either one opened explicitly with [`ResourceManager::begin_transfer`], or a
//! one-shot session wrapped around the single upload. Resources destroyed while
//! a session is recording keep their native allocation until the session ends,
//! since copies already recorded may target them.

use crate::renderer::api::*;
use crate::renderer::bindless::{
    BindlessCapacities, BindlessIndex, BindlessSpace, DescriptorResource,
};
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::handle::{
    Buffer, BufferHandle, HandlePool, Image, ImageHandle, Sampler, SamplerHandle, Shader,
    ShaderHandle,
};
use crate::renderer::traits::{GraphicsDevice, TransferEncoder};
use std::borrow::Cow;
use std::sync::Arc;

/// Everything the manager knows about a live buffer.
#[derive(Debug, Clone)]
pub struct BufferRecord {
    /// The native buffer.
    pub id: BufferId,
    /// The size the client asked for.
    pub requested_size: u64,
    /// The allocated size after alignment padding.
    pub size: u64,
    /// How the buffer is used.
    pub buffer_type: BufferType,
    /// Bindless slot, for uniform and storage buffers.
    pub bindless: Option<BindlessIndex>,
}

/// Everything the manager knows about a live image.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    /// The native image.
    pub id: ImageId,
    /// Width of mip level 0.
    pub width: u32,
    /// Height of mip level 0.
    pub height: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Texel format.
    pub format: ImageFormat,
    /// Declared usages.
    pub usage: ImageUsage,
    /// Combined image-sampler slots; the first uses the default sampler.
    pub sampled: Vec<BindlessIndex>,
    /// Storage image slot.
    pub storage: Option<BindlessIndex>,
}

/// Everything the manager knows about a live sampler.
#[derive(Debug, Clone, Copy)]
pub struct SamplerRecord {
    /// The native sampler.
    pub id: SamplerId,
}

/// Everything the manager knows about a live shader module.
#[derive(Debug, Clone, Copy)]
pub struct ShaderRecord {
    /// The native shader module.
    pub id: ShaderId,
}

/// Counters reported when a transfer session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Number of uploads recorded in the session.
    pub uploads: usize,
    /// Bytes copied into staging buffers.
    pub staged_bytes: u64,
}

struct TransferSession {
    encoder: Box<dyn TransferEncoder>,
    staging: Vec<BufferId>,
    retired_buffers: Vec<BufferId>,
    retired_images: Vec<ImageId>,
    stats: TransferStats,
}

/// Owns GPU resources and their bindless registrations.
pub struct ResourceManager {
    device: Arc<dyn GraphicsDevice>,
    limits: DeviceLimits,
    bindless: BindlessSpace,
    buffers: HandlePool<Buffer, BufferRecord>,
    images: HandlePool<Image, ImageRecord>,
    samplers: HandlePool<Sampler, SamplerRecord>,
    shaders: HandlePool<Shader, ShaderRecord>,
    default_sampler: SamplerId,
    transfer: Option<TransferSession>,
}

impl ResourceManager {
    /// Creates a manager on top of `device`.
    ///
    /// Bindless array sizes are derived from the device limits, clamped to
    /// `settings.max_bindless_descriptors`. A default linear/repeat sampler is
    /// created for sampled images.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if the default sampler cannot be created.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        settings: &RenderSettings,
    ) -> Result<Self, ResourceError> {
        let limits = device.limits();
        let capacities = BindlessCapacities::from_limits(
            limits.max_binding_array_elements,
            limits.max_binding_array_samplers,
            settings.max_bindless_descriptors,
        );
        let default_sampler = device.create_sampler(&SamplerDescriptor {
            label: Some(Cow::Borrowed("Default Sampler")),
            ..Default::default()
        })?;

        log::info!(
            "ResourceManager: ready (uniform align {}, storage align {}, bindless capacities {:?})",
            limits.min_uniform_buffer_offset_alignment,
            limits.min_storage_buffer_offset_alignment,
            capacities
        );

        Ok(Self {
            device,
            limits,
            bindless: BindlessSpace::new(capacities),
            buffers: HandlePool::new(),
            images: HandlePool::new(),
            samplers: HandlePool::new(),
            shaders: HandlePool::new(),
            default_sampler,
            transfer: None,
        })
    }

    /// The device resources are allocated on.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The device limits captured at creation.
    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    /// The bindless slot tables.
    pub fn bindless(&self) -> &BindlessSpace {
        &self.bindless
    }

    // --- Buffers ---

    /// Creates a buffer, padding its size to the type's offset alignment.
    ///
    /// Uniform and storage buffers are registered with the bindless set.
    pub fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferHandle, ResourceError> {
        let alignment = descriptor.buffer_type.offset_alignment(&self.limits);
        let size = align_up(descriptor.size.max(1), alignment);
        if size > self.limits.max_buffer_size {
            return Err(ResourceError::Unsupported(format!(
                "buffer of {size} bytes exceeds the device maximum of {}",
                self.limits.max_buffer_size
            )));
        }

        let id = self.device.create_buffer(&NativeBufferDescriptor {
            label: descriptor.label.clone(),
            size,
            buffer_type: descriptor.buffer_type,
        })?;

        let bindless = match descriptor.buffer_type {
            BufferType::Uniform => Some(DescriptorResource::UniformBuffer(id)),
            BufferType::Storage => Some(DescriptorResource::StorageBuffer(id)),
            _ => None,
        }
        .map(|resource| self.bindless.register(&*self.device, resource))
        .transpose();

        let bindless = match bindless {
            Ok(index) => index,
            Err(err) => {
                if let Err(cleanup) = self.device.destroy_buffer(id) {
                    log::warn!("ResourceManager: failed to release buffer {id:?}: {cleanup}");
                }
                return Err(err);
            }
        };

        let handle = self.buffers.insert(BufferRecord {
            id,
            requested_size: descriptor.size,
            size,
            buffer_type: descriptor.buffer_type,
            bindless,
        });
        log::debug!(
            "ResourceManager: created {:?} buffer '{}' {handle:?} ({} -> {size} bytes)",
            descriptor.buffer_type,
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.size
        );
        Ok(handle)
    }

    /// Returns the record of a live buffer.
    pub fn buffer(&self, handle: BufferHandle) -> Option<&BufferRecord> {
        self.buffers.get(handle)
    }

    /// Copies `data` into the buffer at `offset`.
    ///
    /// Host-visible buffers are written directly. Device-local buffers receive a
    /// staging copy recorded into the active transfer session, or into a one-shot
    /// session that is submitted and waited on before returning.
    ///
    /// # Errors
    ///
    /// * [`ResourceError::InvalidHandle`] for a destroyed buffer.
    /// * [`ResourceError::OutOfBounds`] if `offset + data.len()` exceeds the padded size.
    pub fn upload_to_buffer(
        &mut self,
        handle: BufferHandle,
        data: &[u8],
        offset: u64,
    ) -> Result<(), RenderError> {
        let record = self
            .buffers
            .get(handle)
            .cloned()
            .ok_or(ResourceError::InvalidHandle)?;

        let size = data.len() as u64;
        if offset.checked_add(size).is_none_or(|end| end > record.size) {
            return Err(ResourceError::OutOfBounds {
                offset,
                size,
                capacity: record.size,
            }
            .into());
        }
        if data.is_empty() {
            return Ok(());
        }

        if record.buffer_type.is_host_visible() {
            self.device.write_buffer(record.id, offset, data)?;
            return Ok(());
        }

        let copy_alignment = self.limits.copy_buffer_alignment.max(1);
        if offset % copy_alignment != 0 {
            return Err(ResourceError::Unsupported(format!(
                "staged upload offset {offset} is not a multiple of {copy_alignment}"
            ))
            .into());
        }
        // Copies must cover a whole number of alignment units; the padded size
        // always fits because allocations are padded the same way.
        let copy_size = align_up(size, copy_alignment).min(record.size - offset);
        let staged: Cow<[u8]> = if copy_size == size {
            Cow::Borrowed(data)
        } else {
            let mut padded = data.to_vec();
            padded.resize(copy_size as usize, 0);
            Cow::Owned(padded)
        };

        let device = Arc::clone(&self.device);
        self.with_transfer(|session| {
            let staging = device.create_buffer_with_data(
                &NativeBufferDescriptor {
                    label: Some(Cow::Borrowed("Staging Buffer")),
                    size: copy_size,
                    buffer_type: BufferType::Staging,
                },
                &staged,
            )?;
            session.staging.push(staging);
            session
                .encoder
                .copy_buffer_to_buffer(staging, 0, record.id, offset, copy_size)?;
            session.stats.uploads += 1;
            session.stats.staged_bytes += copy_size;
            Ok(())
        })
    }

    /// Destroys a buffer and releases its bindless slot.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidHandle`] if the buffer was already destroyed.
    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<(), ResourceError> {
        let record = self
            .buffers
            .remove(handle)
            .ok_or(ResourceError::InvalidHandle)?;
        if let Some(index) = record.bindless {
            self.bindless.unregister(&*self.device, index);
        }
        log::debug!("ResourceManager: destroyed buffer {handle:?}");
        match self.transfer.as_mut() {
            Some(session) => {
                session.retired_buffers.push(record.id);
                Ok(())
            }
            None => self.device.destroy_buffer(record.id),
        }
    }

    // --- Images ---

    /// Creates an image. Sampled images get a combined image-sampler slot with the
    /// default sampler, storage images a storage image slot.
    pub fn create_image(
        &mut self,
        descriptor: &ImageDescriptor,
    ) -> Result<ImageHandle, ResourceError> {
        let max_dim = self.limits.max_image_dimension_2d;
        if descriptor.width == 0
            || descriptor.height == 0
            || descriptor.width > max_dim
            || descriptor.height > max_dim
        {
            return Err(ResourceError::Unsupported(format!(
                "image extent {}x{} outside 1..={max_dim}",
                descriptor.width, descriptor.height
            )));
        }
        let full_chain = full_mip_count(descriptor.width, descriptor.height);
        let mip_levels = descriptor.mip_levels.clamp(1, full_chain);

        let native = ImageDescriptor {
            label: descriptor.label.clone(),
            mip_levels,
            usage: descriptor.usage | ImageUsage::COPY_DST,
            ..descriptor.clone()
        };
        let id = self.device.create_image(&native)?;

        let mut record = ImageRecord {
            id,
            width: descriptor.width,
            height: descriptor.height,
            mip_levels,
            format: descriptor.format,
            usage: native.usage,
            sampled: Vec::new(),
            storage: None,
        };

        let registered = self.register_image_views(&mut record);
        if let Err(err) = registered {
            self.release_image_slots(&record);
            if let Err(cleanup) = self.device.destroy_image(id) {
                log::warn!("ResourceManager: failed to release image {id:?}: {cleanup}");
            }
            return Err(err);
        }

        let handle = self.images.insert(record);
        log::debug!(
            "ResourceManager: created image '{}' {handle:?} {}x{} ({} mips)",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.width,
            descriptor.height,
            mip_levels
        );
        Ok(handle)
    }

    fn register_image_views(&mut self, record: &mut ImageRecord) -> Result<(), ResourceError> {
        if record.usage.contains(ImageUsage::SAMPLED) {
            let index = self.bindless.register(
                &*self.device,
                DescriptorResource::CombinedImageSampler {
                    image: record.id,
                    sampler: self.default_sampler,
                },
            )?;
            record.sampled.push(index);
        }
        if record.usage.contains(ImageUsage::STORAGE) {
            let index = self
                .bindless
                .register(&*self.device, DescriptorResource::StorageImage(record.id))?;
            record.storage = Some(index);
        }
        Ok(())
    }

    fn release_image_slots(&mut self, record: &ImageRecord) {
        for index in record.sampled.iter().chain(record.storage.iter()) {
            self.bindless.unregister(&*self.device, *index);
        }
    }

    /// Returns the record of a live image.
    pub fn image(&self, handle: ImageHandle) -> Option<&ImageRecord> {
        self.images.get(handle)
    }

    /// Registers an additional combined image-sampler slot pairing `image` with `sampler`.
    pub fn bind_sampled_image(
        &mut self,
        image: ImageHandle,
        sampler: SamplerHandle,
    ) -> Result<BindlessIndex, ResourceError> {
        let sampler_id = self
            .samplers
            .get(sampler)
            .ok_or(ResourceError::InvalidHandle)?
            .id;
        let record = self.images.get_mut(image).ok_or(ResourceError::InvalidHandle)?;
        if !record.usage.contains(ImageUsage::SAMPLED) {
            return Err(ResourceError::Unsupported(
                "image was not created with sampled usage".to_string(),
            ));
        }
        let index = self.bindless.register(
            &*self.device,
            DescriptorResource::CombinedImageSampler {
                image: record.id,
                sampler: sampler_id,
            },
        )?;
        record.sampled.push(index);
        Ok(index)
    }

    /// Uploads texel data to an image through a staging buffer.
    ///
    /// `data` holds tightly packed levels back to back, either the whole mip chain
    /// the image was created with or level 0 only. Levels are staged at 16-byte
    /// aligned offsets and copied with one region per level.
    ///
    /// # Errors
    ///
    /// * [`ResourceError::InvalidHandle`] for a destroyed image.
    /// * [`ResourceError::OutOfBounds`] if `data` matches neither layout.
    pub fn upload_to_image(&mut self, handle: ImageHandle, data: &[u8]) -> Result<(), RenderError> {
        let record = self
            .images
            .get(handle)
            .cloned()
            .ok_or(ResourceError::InvalidHandle)?;

        let row_alignment = self.limits.copy_bytes_per_row_alignment;
        let full = StagingLayout::new(
            record.width,
            record.height,
            record.format,
            record.mip_levels,
            row_alignment,
        );
        let layout = if data.len() as u64 == full.packed_size() {
            full
        } else {
            let base =
                StagingLayout::new(record.width, record.height, record.format, 1, row_alignment);
            if data.len() as u64 != base.packed_size() {
                return Err(ResourceError::OutOfBounds {
                    offset: 0,
                    size: data.len() as u64,
                    capacity: full.packed_size(),
                }
                .into());
            }
            base
        };

        let mut staging_bytes = vec![0u8; layout.total_size as usize];
        layout.fill(data, &mut staging_bytes);

        let device = Arc::clone(&self.device);
        self.with_transfer(|session| {
            let staging = device.create_buffer_with_data(
                &NativeBufferDescriptor {
                    label: Some(Cow::Borrowed("Image Staging Buffer")),
                    size: layout.total_size,
                    buffer_type: BufferType::Staging,
                },
                &staging_bytes,
            )?;
            session.staging.push(staging);
            session
                .encoder
                .copy_buffer_to_image(staging, record.id, &layout.regions)?;
            session.stats.uploads += 1;
            session.stats.staged_bytes += layout.total_size;
            Ok(())
        })
    }

    /// Destroys an image and releases all of its bindless slots.
    pub fn destroy_image(&mut self, handle: ImageHandle) -> Result<(), ResourceError> {
        let record = self
            .images
            .remove(handle)
            .ok_or(ResourceError::InvalidHandle)?;
        self.release_image_slots(&record);
        log::debug!("ResourceManager: destroyed image {handle:?}");
        match self.transfer.as_mut() {
            Some(session) => {
                session.retired_images.push(record.id);
                Ok(())
            }
            None => self.device.destroy_image(record.id),
        }
    }

    // --- Samplers and shaders ---

    /// Creates a sampler that can be paired with images via [`Self::bind_sampled_image`].
    pub fn create_sampler(
        &mut self,
        descriptor: &SamplerDescriptor,
    ) -> Result<SamplerHandle, ResourceError> {
        let id = self.device.create_sampler(descriptor)?;
        Ok(self.samplers.insert(SamplerRecord { id }))
    }

    /// Destroys a sampler. Slots pairing it with images stay live until those
    /// images are destroyed.
    pub fn destroy_sampler(&mut self, handle: SamplerHandle) -> Result<(), ResourceError> {
        let record = self
            .samplers
            .remove(handle)
            .ok_or(ResourceError::InvalidHandle)?;
        self.device.destroy_sampler(record.id)
    }

    /// Creates a shader module from WGSL source.
    pub fn create_shader(
        &mut self,
        descriptor: &ShaderDescriptor,
    ) -> Result<ShaderHandle, ResourceError> {
        let id = self.device.create_shader(descriptor)?;
        Ok(self.shaders.insert(ShaderRecord { id }))
    }

    /// Returns the record of a live shader module.
    pub fn shader(&self, handle: ShaderHandle) -> Option<&ShaderRecord> {
        self.shaders.get(handle)
    }

    /// Destroys a shader module.
    pub fn destroy_shader(&mut self, handle: ShaderHandle) -> Result<(), ResourceError> {
        let record = self
            .shaders
            .remove(handle)
            .ok_or(ResourceError::InvalidHandle)?;
        self.device.destroy_shader(record.id)
    }

    // --- Transfer sessions ---

    /// Opens a transfer session. Every staged upload until [`Self::end_transfer`]
    /// is recorded into one command buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::TransferAlreadyActive`] if a session is open.
    pub fn begin_transfer(&mut self) -> Result<(), ResourceError> {
        if self.transfer.is_some() {
            return Err(ResourceError::TransferAlreadyActive);
        }
        log::debug!("ResourceManager: transfer session opened");
        self.transfer = Some(TransferSession {
            encoder: self.device.create_transfer_encoder(Some("Transfer Session")),
            staging: Vec::new(),
            retired_buffers: Vec::new(),
            retired_images: Vec::new(),
            stats: TransferStats::default(),
        });
        Ok(())
    }

    /// Submits the session once and blocks until the GPU has executed it, then
    /// frees its staging buffers. All uploads recorded in the session are visible
    /// to later GPU work when this returns.
    ///
    /// The session is closed and its staging buffers are released even when the
    /// submission fails.
    pub fn end_transfer(&mut self) -> Result<TransferStats, RenderError> {
        let session = self.transfer.take().ok_or(ResourceError::NoActiveTransfer)?;
        let stats = session.stats;
        let command_buffer = session.encoder.finish();

        let submitted = self.device.submit_transfer_and_wait(command_buffer);
        self.release_native(
            session.staging.into_iter().chain(session.retired_buffers),
            session.retired_images,
        );
        if let Err(err) = submitted {
            log::error!("ResourceManager: transfer submission failed: {err}");
            return Err(err);
        }

        log::info!(
            "ResourceManager: transfer session complete ({} uploads, {} staged bytes)",
            stats.uploads,
            stats.staged_bytes
        );
        Ok(stats)
    }

    /// Closes the session without submitting it. Every copy recorded so far is
    /// discarded and the staging buffers are released.
    pub(crate) fn abort_transfer(&mut self) {
        let Some(session) = self.transfer.take() else {
            return;
        };
        log::warn!(
            "ResourceManager: transfer session dropped ({} uploads discarded)",
            session.stats.uploads
        );
        drop(session.encoder);
        self.release_native(
            session.staging.into_iter().chain(session.retired_buffers),
            session.retired_images,
        );
    }

    /// Returns `true` while a transfer session is recording.
    pub fn is_transfer_active(&self) -> bool {
        self.transfer.is_some()
    }

    fn release_native(
        &self,
        buffers: impl IntoIterator<Item = BufferId>,
        images: impl IntoIterator<Item = ImageId>,
    ) {
        for id in buffers {
            if let Err(err) = self.device.destroy_buffer(id) {
                log::warn!("ResourceManager: failed to release buffer {id:?}: {err}");
            }
        }
        for id in images {
            if let Err(err) = self.device.destroy_image(id) {
                log::warn!("ResourceManager: failed to release image {id:?}: {err}");
            }
        }
    }

    fn with_transfer<F>(&mut self, record: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut TransferSession) -> Result<(), ResourceError>,
    {
        if let Some(session) = self.transfer.as_mut() {
            return record(session).map_err(RenderError::from);
        }
        self.begin_transfer()?;
        let recorded = match self.transfer.as_mut() {
            Some(session) => record(session),
            None => Err(ResourceError::NoActiveTransfer),
        };
        match recorded {
            Ok(()) => self.end_transfer().map(|_| ()),
            Err(err) => {
                self.abort_transfer();
                Err(err.into())
            }
        }
    }

    // --- Shutdown ---

    /// Number of live buffers, images, samplers and shaders.
    pub fn live_counts(&self) -> (usize, usize, usize, usize) {
        (
            self.buffers.len(),
            self.images.len(),
            self.samplers.len(),
            self.shaders.len(),
        )
    }

    /// Waits for the device to go idle, then destroys every live resource.
    pub fn destroy_all(&mut self) -> Result<(), RenderError> {
        if self.transfer.is_some() {
            log::warn!("ResourceManager: flushing an open transfer session at shutdown");
            self.end_transfer()?;
        }
        self.device.wait_idle()?;

        for handle in self.buffers.handles() {
            self.destroy_buffer(handle)?;
        }
        for handle in self.images.handles() {
            self.destroy_image(handle)?;
        }
        for handle in self.samplers.handles() {
            self.destroy_sampler(handle)?;
        }
        for handle in self.shaders.handles() {
            self.destroy_shader(handle)?;
        }
        self.device.destroy_sampler(self.default_sampler)?;
        log::info!("ResourceManager: all resources released");
        Ok(())
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("buffers", &self.buffers.len())
            .field("images", &self.images.len())
            .field("samplers", &self.samplers.len())
            .field("shaders", &self.shaders.len())
            .field("transfer_active", &self.transfer.is_some())
            .finish()
    }
}

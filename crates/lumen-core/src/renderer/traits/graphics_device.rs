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

//! The device contract implemented by graphics backends.

use crate::renderer::api::*;
use crate::renderer::bindless::{BindlessIndex, DescriptorResource};
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::TransferEncoder;
use std::fmt::Debug;

/// Writes native descriptors into the bindless descriptor set.
pub trait DescriptorWriter {
    /// Writes `resource` at element `index` of the array matching its kind.
    /// ## Arguments
    /// * `index` - The element to overwrite, already reserved by the slot table.
    /// * `resource` - The native resource to reference.
    /// ## Errors
    /// * `ResourceError` - If the resource id is unknown to the device.
    fn write_descriptor(&self, index: u32, resource: &DescriptorResource)
        -> Result<(), ResourceError>;

    /// Drops the writer's own reference to whatever sits at `index`.
    ///
    /// The descriptor already bound on the GPU is not rewritten; the slot picks
    /// up a placeholder the next time the set is rebuilt.
    fn release_descriptor(&self, _index: BindlessIndex) {}
}

/// The device half of the rendering context: allocation of native resources,
/// bindless descriptor writes and transfer submission.
///
/// Resources are referenced through plain ids; lifetime tracking with
/// generational handles is the job of the
/// [`ResourceManager`](crate::renderer::resources::ResourceManager).
pub trait GraphicsDevice: DescriptorWriter + Send + Sync + Debug + 'static {
    /// Returns information about the adapter backing this device.
    fn adapter_info(&self) -> RendererAdapterInfo;

    /// Returns the alignment and size limits of this device.
    fn limits(&self) -> DeviceLimits;

    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - Size (already padded) and type of the buffer.
    /// ## Returns
    /// The ID of the created buffer.
    fn create_buffer(&self, descriptor: &NativeBufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Creates a new GPU buffer and initializes it with the provided data.
    /// Used for staging buffers, which are filled through a mapping at creation.
    fn create_buffer_with_data(
        &self,
        descriptor: &NativeBufferDescriptor,
        data: &[u8],
    ) -> Result<BufferId, ResourceError>;

    /// Destroys a GPU buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes data into a host-visible buffer.
    /// ## Arguments
    /// * `id` - The buffer to write to.
    /// * `offset` - Byte offset of the write.
    /// * `data` - The bytes to copy.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Creates a new 2D image.
    fn create_image(&self, descriptor: &ImageDescriptor) -> Result<ImageId, ResourceError>;

    /// Destroys an image.
    fn destroy_image(&self, id: ImageId) -> Result<(), ResourceError>;

    /// Creates a sampler.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError>;

    /// Destroys a sampler.
    fn destroy_sampler(&self, id: SamplerId) -> Result<(), ResourceError>;

    /// Creates a shader module from WGSL source.
    fn create_shader(&self, descriptor: &ShaderDescriptor) -> Result<ShaderId, ResourceError>;

    /// Destroys a shader module.
    fn destroy_shader(&self, id: ShaderId) -> Result<(), ResourceError>;

    /// Starts recording copy commands for the transfer queue.
    fn create_transfer_encoder(&self, label: Option<&str>) -> Box<dyn TransferEncoder>;

    /// Submits a finished transfer command buffer and blocks until the GPU has
    /// executed it.
    /// ## Errors
    /// * `RenderError::SubmissionFailed` - If the submission or the wait failed.
    fn submit_transfer_and_wait(&self, command_buffer: CommandBufferId) -> Result<(), RenderError>;

    /// Blocks until all submitted work has completed.
    fn wait_idle(&self) -> Result<(), RenderError>;
}

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

//! Plain data types shared by the resource manager, the frame loop and backends.

pub mod adapter;
pub mod buffer;
pub mod image;
pub mod settings;
pub mod shader;

pub use self::adapter::{RendererAdapterInfo, RendererDeviceType};
pub use self::buffer::{
    align_up, BufferDescriptor, BufferId, BufferType, DeviceLimits, NativeBufferDescriptor,
};
pub use self::image::{
    full_mip_count, mip_extent, AddressMode, FilterMode, ImageDescriptor, ImageFormat, ImageId,
    ImageUsage, MipRegion, SamplerDescriptor, SamplerId, StagingLayout,
};
pub use self::settings::{BackendPreference, PresentMode, RenderSettings};
pub use self::shader::{ShaderDescriptor, ShaderId};

/// An opaque handle to a finished, not yet submitted command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u64);

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

//! The `wgpu` backend: context bootstrap, device, bindless bind group,
//! swapchain frame backend and the GPU culling pass.

mod bindless;
mod command;
mod context;
mod conversions;
mod culling;
mod device;
mod render_context;
mod swapchain;

pub use self::bindless::{BINDLESS_SHADER_PRELUDE, SAMPLER_ARRAY_BINDING};
pub use self::command::{WgpuDrawPass, WgpuTransferEncoder};
pub use self::context::{required_features, WgpuGraphicsContext};
pub use self::culling::GpuCuller;
pub use self::device::WgpuDevice;
pub use self::render_context::WgpuRenderContext;
pub use self::swapchain::{WgpuFrameRecorder, WgpuSwapchain, DEPTH_FORMAT};

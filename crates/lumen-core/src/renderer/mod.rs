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

//! Backend-agnostic rendering contracts and host-side algorithms.
//!
//! This module owns the "what" of rendering: resource descriptors, the bindless
//! slot tables, the resource manager, the frame state machine, adapter scoring
//! and visibility. The "how" lives in a backend crate (e.g. the wgpu backend in
//! `lumen-infra`) implementing [`GraphicsDevice`] and [`FrameBackend`].

pub mod api;
pub mod bindless;
pub mod device_select;
pub mod error;
pub mod frame;
pub mod handle;
pub mod resources;
pub mod traits;
pub mod visibility;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::bindless::{
    BindlessCapacities, BindlessIndex, BindlessSpace, DescriptorKind, DescriptorResource,
};
pub use self::device_select::{
    assign_queue_families, score_candidate, select_adapter, AdapterCandidate, QueueAssignment,
    QueueFamilyInfo,
};
pub use self::error::{RenderError, ResourceError};
pub use self::frame::{
    FrameOrchestrator, FrameStats, FrameStatus, FrameToken, PresentStatus, SkipReason,
};
pub use self::handle::{BufferHandle, Handle, ImageHandle, SamplerHandle, ShaderHandle};
pub use self::resources::{ResourceManager, TransferStats};
pub use self::traits::{
    DescriptorWriter, DrawRecorder, FrameBackend, GraphicsDevice, TransferEncoder,
};

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

//! Bounding volumes, frustum extraction and the CPU culling path.
//!
//! The GPU culling pass lives in the backend and consumes the `Gpu*` layouts
//! defined here.

pub mod bounds;
pub mod culling;
pub mod frustum;

pub use self::bounds::{BoundingSphere, MeshBounds};
pub use self::culling::{
    build_indirect_commands, cull_instances, dispatch_size, is_instance_visible,
    record_visible_draws, CullInstance, CullStats, GpuCullObject, GpuCullUniforms,
    IndirectDrawCommand, MeshDraw,
};
pub use self::frustum::{CameraFrame, Frustum, GpuFrustum, Plane};

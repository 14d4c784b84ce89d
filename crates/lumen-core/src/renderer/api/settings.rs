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

//! Global settings for the rendering core.

use super::image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Presentation pacing preference. The backend falls back to [`PresentMode::Fifo`]
/// when the preferred mode is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresentMode {
    /// V-synced queue; always supported.
    Fifo,
    /// Low-latency triple buffering when supported.
    Mailbox,
    /// No synchronization with the display.
    Immediate,
}

/// Which native graphics APIs the backend may pick adapters from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendPreference {
    /// The first-class API of the platform (Vulkan, Metal or DX12).
    Primary,
    /// Vulkan only.
    Vulkan,
    /// Metal only.
    Metal,
    /// DirectX 12 only.
    Dx12,
    /// Every API the backend was built with.
    All,
}

/// A collection of settings that shape context creation and the frame loop.
///
/// Constructed with named fields (usually `..Default::default()`), never mutated
/// behind the renderer's back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Number of frame slots (frames the CPU may record ahead of the GPU).
    pub frames_in_flight: usize,
    /// How long `begin_frame` waits on a slot's fence before giving up fatally.
    pub fence_timeout_ms: u64,
    /// Preferred presentation mode.
    pub present_mode: PresentMode,
    /// Upper bound on the element count of each bindless array.
    pub max_bindless_descriptors: u32,
    /// Workgroup size of the GPU culling compute pass.
    pub cull_workgroup_size: u32,
    /// Whether a dedicated offscreen render target is created alongside the swapchain.
    pub offscreen_render_target: bool,
    /// Texel format every storage image shares (the bindless storage array has one format).
    pub storage_image_format: ImageFormat,
    /// APIs adapters are enumerated from.
    pub backends: BackendPreference,
}

impl RenderSettings {
    /// The fence timeout as a [`Duration`].
    pub fn fence_timeout(&self) -> Duration {
        Duration::from_millis(self.fence_timeout_ms)
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            fence_timeout_ms: 10_000,
            present_mode: PresentMode::Mailbox,
            max_bindless_descriptors: 16_384,
            cull_workgroup_size: 64,
            offscreen_render_target: true,
            storage_image_format: ImageFormat::Rgba16Float,
            backends: BackendPreference::Primary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = RenderSettings::default();
        assert!(settings.frames_in_flight >= 2);
        assert_eq!(settings.fence_timeout(), Duration::from_secs(10));
        assert_eq!(settings.cull_workgroup_size, 64);
    }

    #[test]
    fn named_field_override_keeps_the_rest() {
        let settings = RenderSettings {
            frames_in_flight: 3,
            ..Default::default()
        };
        assert_eq!(settings.frames_in_flight, 3);
        assert_eq!(settings.present_mode, PresentMode::Mailbox);
    }
}

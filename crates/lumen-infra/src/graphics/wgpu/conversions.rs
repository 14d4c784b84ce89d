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

use lumen_core::math::Extent2D;
use lumen_core::renderer::api::{
    AddressMode, BackendPreference, BufferType, DeviceLimits, FilterMode, ImageFormat, ImageUsage,
    PresentMode, RendererDeviceType,
};

/// A local extension trait to convert Lumen types into wgpu types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a wgpu-compatible type.
    fn into_wgpu(self) -> T;
}

// --- Dimensions ---

impl IntoWgpu<wgpu::Extent3d> for Extent2D {
    fn into_wgpu(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

// --- Buffers ---

impl IntoWgpu<wgpu::BufferUsages> for BufferType {
    fn into_wgpu(self) -> wgpu::BufferUsages {
        use wgpu::BufferUsages as U;
        match self {
            BufferType::Vertex => U::VERTEX | U::COPY_DST,
            BufferType::Index => U::INDEX | U::COPY_DST,
            // The bindless uniform array is a read-only storage array on wgpu.
            BufferType::Uniform => U::UNIFORM | U::STORAGE | U::COPY_DST,
            BufferType::Storage => U::STORAGE | U::COPY_DST | U::COPY_SRC,
            BufferType::Indirect => U::INDIRECT | U::STORAGE | U::COPY_DST | U::COPY_SRC,
            BufferType::Staging => U::MAP_WRITE | U::COPY_SRC,
        }
    }
}

// --- Images ---

impl IntoWgpu<wgpu::TextureFormat> for ImageFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            ImageFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
            ImageFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            ImageFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ImageFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            ImageFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            ImageFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            ImageFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }
}

/// Maps a wgpu texture format back to an [`ImageFormat`], if Lumen knows it.
pub fn from_wgpu_texture_format(format: wgpu::TextureFormat) -> Option<ImageFormat> {
    match format {
        wgpu::TextureFormat::R8Unorm => Some(ImageFormat::R8Unorm),
        wgpu::TextureFormat::Rgba8Unorm => Some(ImageFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(ImageFormat::Rgba8UnormSrgb),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(ImageFormat::Bgra8UnormSrgb),
        wgpu::TextureFormat::Rgba16Float => Some(ImageFormat::Rgba16Float),
        wgpu::TextureFormat::Rgba32Float => Some(ImageFormat::Rgba32Float),
        wgpu::TextureFormat::Depth32Float => Some(ImageFormat::Depth32Float),
        _ => None,
    }
}

impl IntoWgpu<wgpu::TextureUsages> for ImageUsage {
    fn into_wgpu(self) -> wgpu::TextureUsages {
        let mut usages = wgpu::TextureUsages::empty();
        if self.contains(ImageUsage::SAMPLED) {
            usages |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if self.contains(ImageUsage::STORAGE) {
            usages |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        if self.contains(ImageUsage::RENDER_TARGET) || self.contains(ImageUsage::DEPTH_TARGET) {
            usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if self.contains(ImageUsage::COPY_DST) {
            usages |= wgpu::TextureUsages::COPY_DST;
        }
        if self.contains(ImageUsage::COPY_SRC) {
            usages |= wgpu::TextureUsages::COPY_SRC;
        }
        usages
    }
}

// --- Samplers ---

impl IntoWgpu<wgpu::FilterMode> for FilterMode {
    fn into_wgpu(self) -> wgpu::FilterMode {
        match self {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }
}

impl IntoWgpu<wgpu::MipmapFilterMode> for FilterMode {
    fn into_wgpu(self) -> wgpu::MipmapFilterMode {
        match self {
            FilterMode::Nearest => wgpu::MipmapFilterMode::Nearest,
            FilterMode::Linear => wgpu::MipmapFilterMode::Linear,
        }
    }
}

impl IntoWgpu<wgpu::AddressMode> for AddressMode {
    fn into_wgpu(self) -> wgpu::AddressMode {
        match self {
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

// --- Context ---

impl IntoWgpu<wgpu::PresentMode> for PresentMode {
    fn into_wgpu(self) -> wgpu::PresentMode {
        match self {
            PresentMode::Fifo => wgpu::PresentMode::Fifo,
            PresentMode::Mailbox => wgpu::PresentMode::Mailbox,
            PresentMode::Immediate => wgpu::PresentMode::Immediate,
        }
    }
}

impl IntoWgpu<wgpu::Backends> for BackendPreference {
    fn into_wgpu(self) -> wgpu::Backends {
        match self {
            BackendPreference::Primary => wgpu::Backends::PRIMARY,
            BackendPreference::Vulkan => wgpu::Backends::VULKAN,
            BackendPreference::Metal => wgpu::Backends::METAL,
            BackendPreference::Dx12 => wgpu::Backends::DX12,
            BackendPreference::All => wgpu::Backends::all(),
        }
    }
}

/// Maps the wgpu device type onto the renderer's classification.
pub fn from_wgpu_device_type(device_type: wgpu::DeviceType) -> RendererDeviceType {
    match device_type {
        wgpu::DeviceType::IntegratedGpu => RendererDeviceType::IntegratedGpu,
        wgpu::DeviceType::DiscreteGpu => RendererDeviceType::DiscreteGpu,
        wgpu::DeviceType::VirtualGpu => RendererDeviceType::VirtualGpu,
        wgpu::DeviceType::Cpu => RendererDeviceType::Cpu,
        wgpu::DeviceType::Other => RendererDeviceType::Unknown,
    }
}

/// Extracts the alignment and size limits the resource manager works with.
pub fn from_wgpu_limits(limits: &wgpu::Limits) -> DeviceLimits {
    DeviceLimits {
        min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment as u64,
        min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment as u64,
        copy_buffer_alignment: wgpu::COPY_BUFFER_ALIGNMENT,
        copy_bytes_per_row_alignment: wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        max_image_dimension_2d: limits.max_texture_dimension_2d,
        max_buffer_size: limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size),
        max_binding_array_elements: limits.max_binding_array_elements_per_shader_stage,
        max_binding_array_samplers: limits.max_binding_array_sampler_elements_per_shader_stage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_formats_round_trip_through_wgpu() {
        for format in [
            ImageFormat::R8Unorm,
            ImageFormat::Rgba8UnormSrgb,
            ImageFormat::Bgra8UnormSrgb,
            ImageFormat::Rgba16Float,
            ImageFormat::Depth32Float,
        ] {
            let wgpu_format: wgpu::TextureFormat = format.into_wgpu();
            assert_eq!(from_wgpu_texture_format(wgpu_format), Some(format));
        }
        assert_eq!(from_wgpu_texture_format(wgpu::TextureFormat::Rg11b10Ufloat), None);
    }

    #[test]
    fn staging_buffers_are_mappable_copy_sources() {
        let usages: wgpu::BufferUsages = BufferType::Staging.into_wgpu();
        assert_eq!(usages, wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC);
        let usages: wgpu::BufferUsages = BufferType::Indirect.into_wgpu();
        assert!(usages.contains(wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::STORAGE));
    }

    #[test]
    fn image_usage_maps_attachments() {
        let usages: wgpu::TextureUsages =
            (ImageUsage::DEPTH_TARGET | ImageUsage::SAMPLED).into_wgpu();
        assert!(usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(usages.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(!usages.contains(wgpu::TextureUsages::STORAGE_BINDING));
    }
}

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

use std::ops::Range;

use lumen_core::renderer::api::{BufferId, CommandBufferId, ImageId, MipRegion};
use lumen_core::renderer::traits::{DrawRecorder, TransferEncoder};
use lumen_core::renderer::ResourceError;

use super::device::WgpuDevice;

/// Records staging copies for a transfer session.
pub struct WgpuTransferEncoder {
    pub(crate) encoder: Option<wgpu::CommandEncoder>,
    pub(crate) device: WgpuDevice,
}

impl TransferEncoder for WgpuTransferEncoder {
    fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    ) -> Result<(), ResourceError> {
        let (Some(encoder), Some(source_buffer), Some(destination_buffer)) = (
            self.encoder.as_mut(),
            self.device.get_wgpu_buffer(source),
            self.device.get_wgpu_buffer(destination),
        ) else {
            log::error!(
                "WgpuTransferEncoder: buffer copy {source:?} -> {destination:?} has no target"
            );
            return Err(ResourceError::InvalidHandle);
        };
        encoder.copy_buffer_to_buffer(
            &source_buffer,
            source_offset,
            &destination_buffer,
            destination_offset,
            size,
        );
        Ok(())
    }

    fn copy_buffer_to_image(
        &mut self,
        source: BufferId,
        destination: ImageId,
        regions: &[MipRegion],
    ) -> Result<(), ResourceError> {
        let (Some(encoder), Some(source_buffer), Some(texture)) = (
            self.encoder.as_mut(),
            self.device.get_wgpu_buffer(source),
            self.device.get_wgpu_texture(destination),
        ) else {
            log::error!(
                "WgpuTransferEncoder: image copy {source:?} -> {destination:?} has no target"
            );
            return Err(ResourceError::InvalidHandle);
        };

        for region in regions {
            encoder.copy_buffer_to_texture(
                wgpu::TexelCopyBufferInfo {
                    buffer: &source_buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: region.offset,
                        bytes_per_row: Some(region.bytes_per_row),
                        rows_per_image: Some(region.height),
                    },
                },
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: region.level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::Extent3d {
                    width: region.width,
                    height: region.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> CommandBufferId {
        let command_buffer = match self.encoder.take() {
            Some(encoder) => encoder.finish(),
            None => self
                .device
                .wgpu_device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor::default())
                .finish(),
        };
        self.device.register_command_buffer(command_buffer)
    }
}

/// A render pass over the frame's color and depth targets.
///
/// Bind group 0 is the bindless group; vertex/index buffers and pipelines are
/// set by the caller.
pub struct WgpuDrawPass<'a> {
    pub(crate) pass: wgpu::RenderPass<'a>,
    pub(crate) device: &'a WgpuDevice,
}

impl<'a> WgpuDrawPass<'a> {
    /// Sets the active pipeline.
    pub fn set_pipeline(&mut self, pipeline: &wgpu::RenderPipeline) {
        self.pass.set_pipeline(pipeline);
    }

    /// Binds the vertex buffer behind `buffer` at `slot`.
    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId) {
        if let Some(buffer) = self.device.get_wgpu_buffer(buffer) {
            self.pass.set_vertex_buffer(slot, buffer.slice(..));
        } else {
            log::warn!("WgpuDrawPass: Vertex BufferId {buffer:?} not found.");
        }
    }

    /// Binds the 32-bit index buffer behind `buffer`.
    pub fn set_index_buffer(&mut self, buffer: BufferId) {
        if let Some(buffer) = self.device.get_wgpu_buffer(buffer) {
            self.pass
                .set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
        } else {
            log::warn!("WgpuDrawPass: Index BufferId {buffer:?} not found.");
        }
    }

    /// Issues `count` indexed draws whose arguments live in `indirect`.
    pub fn multi_draw_indexed_indirect(&mut self, indirect: &wgpu::Buffer, count: u32) {
        if count > 0 {
            self.pass.multi_draw_indexed_indirect(indirect, 0, count);
        }
    }

    /// The wrapped wgpu pass, for state this wrapper does not cover.
    pub fn raw(&mut self) -> &mut wgpu::RenderPass<'a> {
        &mut self.pass
    }
}

impl DrawRecorder for WgpuDrawPass<'_> {
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.pass.draw_indexed(indices, base_vertex, instances);
    }
}

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

//! GPU frustum culling into an indexed indirect command buffer.
//!
//! The compute pass evaluates the same sphere-versus-plane test as
//! [`build_indirect_commands`](lumen_core::renderer::visibility::build_indirect_commands)
//! and writes one [`IndirectDrawCommand`] per uploaded instance, so the command
//! buffer can be drawn with a single `multi_draw_indexed_indirect`.

use std::borrow::Cow;
use std::sync::mpsc;

use lumen_core::renderer::visibility::{
    dispatch_size, CullInstance, Frustum, GpuCullObject, GpuCullUniforms, IndirectDrawCommand,
};
use lumen_core::renderer::RenderError;

use super::command::WgpuDrawPass;
use super::device::WgpuDevice;

const CULL_SHADER: &str = include_str!("shaders/cull.wgsl");

const INITIAL_CAPACITY: u32 = 64;

/// Instance buffers sized for `capacity` objects.
#[derive(Debug)]
struct CullBuffers {
    objects: wgpu::Buffer,
    commands: wgpu::Buffer,
    readback: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: u32,
}

/// Compute pipeline and buffers of the culling pass.
#[derive(Debug)]
pub struct GpuCuller {
    device: WgpuDevice,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    buffers: CullBuffers,
    object_count: u32,
    workgroup_size: u32,
}

impl GpuCuller {
    /// Builds the culling pipeline.
    ///
    /// ## Arguments
    /// * `device` - The device the pass runs on.
    /// * `workgroup_size` - Invocations per workgroup, baked into the shader.
    pub fn new(device: &WgpuDevice, workgroup_size: u32) -> Self {
        let workgroup_size = workgroup_size.max(1);
        let wgpu_device = device.wgpu_device();

        let source = format!("const WORKGROUP_SIZE: u32 = {workgroup_size}u;\n{CULL_SHADER}");
        let module = wgpu_device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lumen Cull Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        });

        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = wgpu_device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lumen Cull Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<GpuCullUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, false),
            ],
        });

        let pipeline_layout = wgpu_device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lumen Cull Pipeline Layout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });
        let pipeline = wgpu_device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Lumen Cull Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("cs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let uniforms = wgpu_device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lumen Cull Uniforms"),
            size: std::mem::size_of::<GpuCullUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let buffers = Self::create_buffers(wgpu_device, &layout, &uniforms, INITIAL_CAPACITY);

        log::debug!("GpuCuller: Created cull pipeline with workgroup size {workgroup_size}");

        Self {
            device: device.clone(),
            pipeline,
            layout,
            uniforms,
            buffers,
            object_count: 0,
            workgroup_size,
        }
    }

    fn create_buffers(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniforms: &wgpu::Buffer,
        capacity: u32,
    ) -> CullBuffers {
        let object_bytes = u64::from(capacity) * std::mem::size_of::<GpuCullObject>() as u64;
        let command_bytes = u64::from(capacity) * IndirectDrawCommand::SIZE;

        let objects = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lumen Cull Objects"),
            size: object_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let commands = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lumen Indirect Commands"),
            size: command_bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lumen Indirect Readback"),
            size: command_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lumen Cull Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: objects.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: commands.as_entire_binding(),
                },
            ],
        });

        CullBuffers {
            objects,
            commands,
            readback,
            bind_group,
            capacity,
        }
    }

    /// Replaces the uploaded instance list, growing the buffers if needed.
    pub fn upload(&mut self, instances: &[CullInstance]) {
        let count = instances.len() as u32;
        if count > self.buffers.capacity {
            let capacity = count.next_power_of_two();
            log::debug!(
                "GpuCuller: Growing cull buffers from {} to {capacity} objects",
                self.buffers.capacity
            );
            self.buffers = Self::create_buffers(
                self.device.wgpu_device(),
                &self.layout,
                &self.uniforms,
                capacity,
            );
        }

        let objects: Vec<GpuCullObject> = instances.iter().map(GpuCullObject::from).collect();
        if !objects.is_empty() {
            self.device.wgpu_queue().write_buffer(
                &self.buffers.objects,
                0,
                bytemuck::cast_slice(&objects),
            );
        }
        self.object_count = count;
    }

    /// Records the culling pass for `frustum` into `encoder`.
    ///
    /// The frustum is written through the queue, so only the last dispatch
    /// recorded before a submit sees its own frustum.
    pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder, frustum: &Frustum) {
        let uniforms = GpuCullUniforms::new(frustum, self.object_count);
        self.device
            .wgpu_queue()
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));

        if self.object_count == 0 {
            return;
        }

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Lumen Cull Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.buffers.bind_group, &[]);
        pass.dispatch_workgroups(dispatch_size(self.object_count, self.workgroup_size), 1, 1);
    }

    /// Draws every uploaded instance through the culled command buffer.
    pub fn draw_indirect(&self, pass: &mut WgpuDrawPass<'_>) {
        pass.multi_draw_indexed_indirect(&self.buffers.commands, self.object_count);
    }

    /// Culls on the GPU and blocks until the commands are back on the host.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SubmissionFailed`] if the readback could not be mapped.
    pub fn cull_blocking(
        &self,
        frustum: &Frustum,
    ) -> Result<Vec<IndirectDrawCommand>, RenderError> {
        let mut encoder =
            self.device
                .wgpu_device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Lumen Cull Encoder"),
                });
        self.dispatch(&mut encoder, frustum);
        self.read_back(encoder)
    }

    /// Copies the current command buffer back to the host.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SubmissionFailed`] if the readback could not be mapped.
    pub fn read_back_commands(&self) -> Result<Vec<IndirectDrawCommand>, RenderError> {
        let encoder =
            self.device
                .wgpu_device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Lumen Cull Readback Encoder"),
                });
        self.read_back(encoder)
    }

    fn read_back(
        &self,
        mut encoder: wgpu::CommandEncoder,
    ) -> Result<Vec<IndirectDrawCommand>, RenderError> {
        if self.object_count == 0 {
            self.device.wgpu_queue().submit(std::iter::once(encoder.finish()));
            return Ok(Vec::new());
        }

        let bytes = u64::from(self.object_count) * IndirectDrawCommand::SIZE;
        encoder.copy_buffer_to_buffer(&self.buffers.commands, 0, &self.buffers.readback, 0, bytes);
        let submission = self
            .device
            .wgpu_queue()
            .submit(std::iter::once(encoder.finish()));

        let slice = self.buffers.readback.slice(..bytes);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver only disappears if the caller already bailed out.
            let _ = sender.send(result);
        });
        self.device.wait_for_submission(submission, None)?;

        match receiver.try_recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(RenderError::SubmissionFailed(format!(
                    "indirect command readback failed: {e}"
                )))
            }
            Err(_) => {
                return Err(RenderError::SubmissionFailed(
                    "indirect command readback was not mapped".to_string(),
                ))
            }
        }

        let commands = {
            let view = slice.get_mapped_range();
            view.chunks_exact(IndirectDrawCommand::SIZE as usize)
                .map(bytemuck::pod_read_unaligned::<IndirectDrawCommand>)
                .collect()
        };
        self.buffers.readback.unmap();
        Ok(commands)
    }

    /// The indirect command buffer written by [`dispatch`](Self::dispatch).
    pub fn indirect_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.commands
    }

    /// Number of uploaded instances, which is also the number of commands.
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Number of instances the buffers hold without growing.
    pub fn capacity(&self) -> u32 {
        self.buffers.capacity
    }

    /// Invocations per workgroup of the compute pass.
    pub fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }
}

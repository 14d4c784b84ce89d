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

//! The bindless bind group: one layout, five binding arrays, rebuilt on every
//! descriptor write.
//!
//! The four descriptor kinds map onto bindings as follows:
//!
//! | binding | kind                           | WGSL type                                   |
//! |---------|--------------------------------|---------------------------------------------|
//! | 0       | combined image-sampler (image) | `binding_array<texture_2d<f32>>`            |
//! | 1       | uniform buffer                 | `binding_array<BindlessBuffer>` (`read`)    |
//! | 2       | storage buffer                 | `binding_array<BindlessBuffer>` (`read_write`) |
//! | 3       | storage image                  | `binding_array<texture_storage_2d<F, write>>` |
//! | 4       | combined image-sampler (sampler) | `binding_array<sampler>`                  |
//!
//! wgpu has no uniform-buffer binding arrays, so uniform buffers are bound
//! through a read-only storage array. Slots past the high-water mark are left
//! unbound (partially bound arrays); holes below it hold a placeholder. A
//! released slot gets its placeholder back in the mirror right away and in the
//! bind group at the next rebuild.

use std::num::NonZeroU32;

use lumen_core::renderer::{BindlessCapacities, DescriptorKind, ResourceError};

/// Binding of the sampler half of the combined image-sampler kind.
pub const SAMPLER_ARRAY_BINDING: u32 = 4;

/// WGSL declarations of the bindless arrays for client shaders (bind group 0).
pub const BINDLESS_SHADER_PRELUDE: &str = include_str!("shaders/bindless.wgsl");

/// A native resource referenced by one bindless slot.
#[derive(Debug, Clone)]
pub(crate) enum BindlessEntry {
    CombinedImageSampler(wgpu::TextureView, wgpu::Sampler),
    UniformBuffer(wgpu::Buffer),
    StorageBuffer(wgpu::Buffer),
    StorageImage(wgpu::TextureView),
}

#[derive(Debug)]
struct Placeholders {
    texture: wgpu::TextureView,
    sampler: wgpu::Sampler,
    buffer: wgpu::Buffer,
    storage_image: wgpu::TextureView,
}

/// Host mirror of the bindless arrays plus the bind group built from it.
#[derive(Debug)]
pub(crate) struct WgpuBindlessSet {
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    capacities: BindlessCapacities,
    placeholders: Placeholders,
    textures: Vec<wgpu::TextureView>,
    samplers: Vec<wgpu::Sampler>,
    uniform_buffers: Vec<wgpu::Buffer>,
    storage_buffers: Vec<wgpu::Buffer>,
    storage_images: Vec<wgpu::TextureView>,
    storage_format: wgpu::TextureFormat,
}

fn array_count(count: u32) -> Option<NonZeroU32> {
    NonZeroU32::new(count.max(1))
}

fn buffer_array_entry(binding: u32, count: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    let visibility = if read_only {
        wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE
    } else {
        wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: array_count(count),
    }
}

impl WgpuBindlessSet {
    /// Creates the layout, the placeholder resources and an initial bind group.
    pub(crate) fn new(
        device: &wgpu::Device,
        capacities: BindlessCapacities,
        storage_format: wgpu::TextureFormat,
    ) -> Self {
        let all_stages =
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE;
        let sampled = capacities.get(DescriptorKind::Sampler);

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lumen Bindless Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: DescriptorKind::Sampler.binding(),
                    visibility: all_stages,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: array_count(sampled),
                },
                buffer_array_entry(
                    DescriptorKind::UniformBuffer.binding(),
                    capacities.get(DescriptorKind::UniformBuffer),
                    true,
                ),
                buffer_array_entry(
                    DescriptorKind::StorageBuffer.binding(),
                    capacities.get(DescriptorKind::StorageBuffer),
                    false,
                ),
                wgpu::BindGroupLayoutEntry {
                    binding: DescriptorKind::StorageImage.binding(),
                    visibility: wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: storage_format,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: array_count(capacities.get(DescriptorKind::StorageImage)),
                },
                wgpu::BindGroupLayoutEntry {
                    binding: SAMPLER_ARRAY_BINDING,
                    visibility: all_stages,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: array_count(sampled),
                },
            ],
        });

        let placeholders = Placeholders::new(device, storage_format);
        let textures = vec![placeholders.texture.clone()];
        let samplers = vec![placeholders.sampler.clone()];
        let uniform_buffers = vec![placeholders.buffer.clone()];
        let storage_buffers = vec![placeholders.buffer.clone()];
        let storage_images = vec![placeholders.storage_image.clone()];

        let bind_group = Self::build(
            device,
            &layout,
            &textures,
            &samplers,
            &uniform_buffers,
            &storage_buffers,
            &storage_images,
        );

        log::info!("Bindless bind group created with capacities {capacities:?}");

        Self {
            layout,
            bind_group,
            capacities,
            placeholders,
            textures,
            samplers,
            uniform_buffers,
            storage_buffers,
            storage_images,
            storage_format,
        }
    }

    pub(crate) fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub(crate) fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub(crate) fn storage_format(&self) -> wgpu::TextureFormat {
        self.storage_format
    }

    /// Number of elements currently bound in the array of `kind`.
    pub(crate) fn bound_len(&self, kind: DescriptorKind) -> usize {
        match kind {
            DescriptorKind::Sampler => self.textures.len(),
            DescriptorKind::UniformBuffer => self.uniform_buffers.len(),
            DescriptorKind::StorageBuffer => self.storage_buffers.len(),
            DescriptorKind::StorageImage => self.storage_images.len(),
        }
    }

    /// Writes `entry` at `index` and rebuilds the bind group.
    ///
    /// Holes below `index` are filled with placeholders.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::DescriptorSpaceExhausted`] if `index` lies
    /// outside the array's capacity.
    pub(crate) fn write(
        &mut self,
        device: &wgpu::Device,
        index: u32,
        entry: BindlessEntry,
    ) -> Result<(), ResourceError> {
        let kind = match &entry {
            BindlessEntry::CombinedImageSampler(..) => DescriptorKind::Sampler,
            BindlessEntry::UniformBuffer(_) => DescriptorKind::UniformBuffer,
            BindlessEntry::StorageBuffer(_) => DescriptorKind::StorageBuffer,
            BindlessEntry::StorageImage(_) => DescriptorKind::StorageImage,
        };
        let capacity = self.capacities.get(kind);
        if index >= capacity {
            return Err(ResourceError::DescriptorSpaceExhausted { kind, capacity });
        }

        let slot = index as usize;
        match entry {
            BindlessEntry::CombinedImageSampler(view, sampler) => {
                place(&mut self.textures, slot, view, &self.placeholders.texture);
                place(&mut self.samplers, slot, sampler, &self.placeholders.sampler);
            }
            BindlessEntry::UniformBuffer(buffer) => {
                place(&mut self.uniform_buffers, slot, buffer, &self.placeholders.buffer);
            }
            BindlessEntry::StorageBuffer(buffer) => {
                place(&mut self.storage_buffers, slot, buffer, &self.placeholders.buffer);
            }
            BindlessEntry::StorageImage(view) => {
                place(
                    &mut self.storage_images,
                    slot,
                    view,
                    &self.placeholders.storage_image,
                );
            }
        }

        self.bind_group = Self::build(
            device,
            &self.layout,
            &self.textures,
            &self.samplers,
            &self.uniform_buffers,
            &self.storage_buffers,
            &self.storage_images,
        );
        Ok(())
    }

    /// Puts the placeholder back at `index` so the mirror stops holding the
    /// released resource.
    ///
    /// The current bind group is not rebuilt: it keeps referencing the old
    /// resource until the next write replaces it.
    pub(crate) fn release(&mut self, kind: DescriptorKind, index: u32) {
        let slot = index as usize;
        match kind {
            DescriptorKind::Sampler => {
                reset(&mut self.textures, slot, &self.placeholders.texture);
                reset(&mut self.samplers, slot, &self.placeholders.sampler);
            }
            DescriptorKind::UniformBuffer => {
                reset(&mut self.uniform_buffers, slot, &self.placeholders.buffer);
            }
            DescriptorKind::StorageBuffer => {
                reset(&mut self.storage_buffers, slot, &self.placeholders.buffer);
            }
            DescriptorKind::StorageImage => {
                reset(&mut self.storage_images, slot, &self.placeholders.storage_image);
            }
        }
    }

    fn build(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        textures: &[wgpu::TextureView],
        samplers: &[wgpu::Sampler],
        uniform_buffers: &[wgpu::Buffer],
        storage_buffers: &[wgpu::Buffer],
        storage_images: &[wgpu::TextureView],
    ) -> wgpu::BindGroup {
        let texture_refs: Vec<&wgpu::TextureView> = textures.iter().collect();
        let sampler_refs: Vec<&wgpu::Sampler> = samplers.iter().collect();
        let storage_image_refs: Vec<&wgpu::TextureView> = storage_images.iter().collect();
        let uniform_bindings: Vec<wgpu::BufferBinding> = uniform_buffers
            .iter()
            .map(wgpu::Buffer::as_entire_buffer_binding)
            .collect();
        let storage_bindings: Vec<wgpu::BufferBinding> = storage_buffers
            .iter()
            .map(wgpu::Buffer::as_entire_buffer_binding)
            .collect();

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lumen Bindless Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: DescriptorKind::Sampler.binding(),
                    resource: wgpu::BindingResource::TextureViewArray(&texture_refs),
                },
                wgpu::BindGroupEntry {
                    binding: DescriptorKind::UniformBuffer.binding(),
                    resource: wgpu::BindingResource::BufferArray(&uniform_bindings),
                },
                wgpu::BindGroupEntry {
                    binding: DescriptorKind::StorageBuffer.binding(),
                    resource: wgpu::BindingResource::BufferArray(&storage_bindings),
                },
                wgpu::BindGroupEntry {
                    binding: DescriptorKind::StorageImage.binding(),
                    resource: wgpu::BindingResource::TextureViewArray(&storage_image_refs),
                },
                wgpu::BindGroupEntry {
                    binding: SAMPLER_ARRAY_BINDING,
                    resource: wgpu::BindingResource::SamplerArray(&sampler_refs),
                },
            ],
        })
    }
}

/// Stores `value` at `slot`, padding the array with `filler` up to it.
fn place<T: Clone>(array: &mut Vec<T>, slot: usize, value: T, filler: &T) {
    if array.len() <= slot {
        array.resize(slot + 1, filler.clone());
    }
    array[slot] = value;
}

/// Overwrites `slot` with `filler` if the array reaches that far.
fn reset<T: Clone>(array: &mut [T], slot: usize, filler: &T) {
    if let Some(element) = array.get_mut(slot) {
        *element = filler.clone();
    }
}

impl Placeholders {
    fn new(device: &wgpu::Device, storage_format: wgpu::TextureFormat) -> Self {
        let texture = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Bindless Placeholder Texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        let storage_image = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Bindless Placeholder Storage Image"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: storage_format,
                usage: wgpu::TextureUsages::STORAGE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Bindless Placeholder Sampler"),
            ..Default::default()
        });

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bindless Placeholder Buffer"),
            size: 256,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });

        Self {
            texture,
            sampler,
            buffer,
            storage_image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_pads_with_filler() {
        let mut array = vec![0u32];
        place(&mut array, 3, 7, &9);
        assert_eq!(array, vec![0, 9, 9, 7]);
        place(&mut array, 1, 5, &9);
        assert_eq!(array, vec![0, 5, 9, 7]);
    }

    #[test]
    fn reset_restores_filler_within_bounds_only() {
        let mut array = vec![1u32, 2, 3];
        reset(&mut array, 1, &0);
        assert_eq!(array, vec![1, 0, 3]);
        reset(&mut array, 8, &0);
        assert_eq!(array, vec![1, 0, 3]);
    }
}

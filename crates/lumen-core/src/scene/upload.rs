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

//! Uploading a [`SceneDescription`] into GPU buffers in one transfer session.

use super::description::{SceneDescription, SceneError, Vertex};
use super::hierarchy::{flatten_hierarchy, SceneInstance};
use crate::renderer::api::{
    BufferDescriptor, BufferType, ImageDescriptor, ImageFormat, ImageUsage,
};
use crate::renderer::error::RenderError;
use crate::renderer::handle::{BufferHandle, ImageHandle};
use crate::renderer::resources::{ResourceManager, TransferStats};
use crate::renderer::visibility::{BoundingSphere, CullInstance, MeshBounds, MeshDraw};
use bytemuck::{Pod, Zeroable};
use std::borrow::Cow;

/// Texture slot value meaning "no texture".
pub const NO_TEXTURE: u32 = u32::MAX;

/// Per-material record stored in the scene's material buffer.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuMaterial {
    /// Linear RGBA base color factor.
    pub base_color: [f32; 4],
    /// Bindless combined image-sampler index, or [`NO_TEXTURE`].
    pub base_color_texture: u32,
    /// Pads the record to 16 bytes.
    pub _padding: [u32; 3],
}

/// A scene resident on the GPU.
#[derive(Debug, Clone)]
pub struct GpuScene {
    /// Merged vertices of every mesh.
    pub vertex_buffer: BufferHandle,
    /// Merged indices of every mesh.
    pub index_buffer: BufferHandle,
    /// One [`GpuMaterial`] per material.
    pub material_buffer: BufferHandle,
    /// One image per decoded image source; `None` for sources without pixels.
    pub images: Vec<Option<ImageHandle>>,
    /// Index range of each mesh inside the merged buffers.
    pub draws: Vec<MeshDraw>,
    /// Local-space bounds of each mesh.
    pub bounds: Vec<MeshBounds>,
    /// Mesh instances in hierarchy pre-order.
    pub instances: Vec<SceneInstance>,
    /// Counters of the upload session.
    pub upload: TransferStats,
}

impl GpuScene {
    /// The culling inputs of every instance, in instance order.
    pub fn cull_instances(&self) -> Vec<CullInstance> {
        self.instances
            .iter()
            .map(|instance| CullInstance {
                draw: self.draws[instance.mesh],
                bounds: self.bounds[instance.mesh].sphere,
                transform: instance.world_transform,
            })
            .collect()
    }

    /// Destroys every resource of the scene.
    pub fn destroy(self, resources: &mut ResourceManager) -> Result<(), RenderError> {
        resources.destroy_buffer(self.vertex_buffer)?;
        resources.destroy_buffer(self.index_buffer)?;
        resources.destroy_buffer(self.material_buffer)?;
        for image in self.images.into_iter().flatten() {
            resources.destroy_image(image)?;
        }
        Ok(())
    }
}

struct MergedGeometry {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    draws: Vec<MeshDraw>,
    bounds: Vec<MeshBounds>,
}

fn merge_meshes(scene: &SceneDescription) -> Result<MergedGeometry, SceneError> {
    let vertex_total = scene.meshes.iter().map(|m| m.vertices.len()).sum();
    let index_total = scene.meshes.iter().map(|m| m.indices.len()).sum();
    let mut merged = MergedGeometry {
        vertices: Vec::with_capacity(vertex_total),
        indices: Vec::with_capacity(index_total),
        draws: Vec::with_capacity(scene.meshes.len()),
        bounds: Vec::with_capacity(scene.meshes.len()),
    };

    for (mesh_index, mesh) in scene.meshes.iter().enumerate() {
        if let Some(&index) = mesh.indices.iter().find(|&&i| i as usize >= mesh.vertices.len()) {
            return Err(SceneError::IndexOutOfRange {
                mesh: mesh_index,
                index,
            });
        }
        let positions: Vec<_> = mesh.vertices.iter().map(Vertex::position).collect();
        let bounds = MeshBounds::from_positions(&positions).unwrap_or(MeshBounds {
            aabb: crate::math::Aabb::INVALID,
            sphere: BoundingSphere::default(),
        });

        merged.draws.push(MeshDraw {
            index_count: mesh.indices.len() as u32,
            first_index: merged.indices.len() as u32,
            base_vertex: merged.vertices.len() as i32,
        });
        merged.bounds.push(bounds);
        merged.vertices.extend_from_slice(&mesh.vertices);
        merged.indices.extend_from_slice(&mesh.indices);
    }
    Ok(merged)
}

/// Handles created so far by one [`upload_scene`] call, released if it fails.
#[derive(Default)]
struct CreatedResources {
    buffers: Vec<BufferHandle>,
    images: Vec<ImageHandle>,
}

impl CreatedResources {
    fn buffer(
        &mut self,
        resources: &mut ResourceManager,
        label: &'static str,
        buffer_type: BufferType,
        bytes: &[u8],
    ) -> Result<BufferHandle, RenderError> {
        let handle = resources.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed(label)),
            size: bytes.len() as u64,
            buffer_type,
        })?;
        self.buffers.push(handle);
        resources.upload_to_buffer(handle, bytes, 0)?;
        Ok(handle)
    }

    fn release(self, resources: &mut ResourceManager) {
        for handle in self.buffers {
            if let Err(err) = resources.destroy_buffer(handle) {
                log::warn!("Scene upload: failed to release buffer {handle:?}: {err}");
            }
        }
        for handle in self.images {
            if let Err(err) = resources.destroy_image(handle) {
                log::warn!("Scene upload: failed to release image {handle:?}: {err}");
            }
        }
    }
}

struct SceneBuffers {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    material_buffer: BufferHandle,
    images: Vec<Option<ImageHandle>>,
}

fn record_uploads(
    resources: &mut ResourceManager,
    scene: &SceneDescription,
    merged: &MergedGeometry,
    created: &mut CreatedResources,
) -> Result<SceneBuffers, RenderError> {
    let vertex_buffer = created.buffer(
        resources,
        "Scene Vertices",
        BufferType::Vertex,
        bytemuck::cast_slice(&merged.vertices),
    )?;
    let index_buffer = created.buffer(
        resources,
        "Scene Indices",
        BufferType::Index,
        bytemuck::cast_slice(&merged.indices),
    )?;

    let mut images = Vec::with_capacity(scene.images.len());
    for source in &scene.images {
        let Some(pixels) = &source.pixels else {
            log::warn!("Scene image '{}' has no decoded pixels, skipping", source.uri);
            images.push(None);
            continue;
        };
        let image = resources.create_image(&ImageDescriptor {
            label: Some(Cow::Borrowed(source.uri.as_str())),
            width: pixels.width,
            height: pixels.height,
            mip_levels: 1,
            format: ImageFormat::Rgba8UnormSrgb,
            usage: ImageUsage::SAMPLED,
        })?;
        created.images.push(image);
        resources.upload_to_image(image, &pixels.rgba8)?;
        images.push(Some(image));
    }

    let materials: Vec<GpuMaterial> = scene
        .materials
        .iter()
        .map(|material| {
            let texture = material
                .base_color_texture
                .and_then(|i| images.get(i).copied().flatten())
                .and_then(|image| resources.image(image))
                .and_then(|record| record.sampled.first())
                .map_or(NO_TEXTURE, |slot| slot.index);
            GpuMaterial {
                base_color: material.base_color,
                base_color_texture: texture,
                _padding: [0; 3],
            }
        })
        .collect();
    let material_buffer = created.buffer(
        resources,
        "Scene Materials",
        BufferType::Storage,
        bytemuck::cast_slice(&materials),
    )?;

    Ok(SceneBuffers {
        vertex_buffer,
        index_buffer,
        material_buffer,
        images,
    })
}

/// Uploads the scene's geometry, decoded images and materials.
///
/// All uploads share one transfer session, which is submitted and waited on
/// before returning. If the caller already opened a session, the uploads join it
/// and the caller remains responsible for ending it.
///
/// On failure every resource created by the call is destroyed again. A session
/// opened here is dropped without being submitted; a joined session stays open
/// and keeps the caller's own uploads.
///
/// # Errors
///
/// Malformed descriptions are reported as [`RenderError::Internal`] carrying the
/// [`SceneError`]; resource failures propagate unchanged.
pub fn upload_scene(
    resources: &mut ResourceManager,
    scene: &SceneDescription,
) -> Result<GpuScene, RenderError> {
    let scene_error = |err: SceneError| RenderError::Internal(format!("invalid scene: {err}"));
    let instances = flatten_hierarchy(scene).map_err(scene_error)?;
    let merged = merge_meshes(scene).map_err(scene_error)?;

    let owns_session = !resources.is_transfer_active();
    if owns_session {
        resources.begin_transfer()?;
    }

    let mut created = CreatedResources::default();
    let uploaded = record_uploads(resources, scene, &merged, &mut created).and_then(|buffers| {
        let stats = if owns_session {
            resources.end_transfer()?
        } else {
            TransferStats::default()
        };
        Ok((buffers, stats))
    });

    let (buffers, upload) = match uploaded {
        Ok(uploaded) => uploaded,
        Err(err) => {
            log::error!("Scene upload failed: {err}");
            if owns_session {
                resources.abort_transfer();
            }
            created.release(resources);
            return Err(err);
        }
    };

    log::info!(
        "Uploaded scene: {} meshes, {} instances, {} vertices, {} indices",
        merged.draws.len(),
        instances.len(),
        merged.vertices.len(),
        merged.indices.len()
    );

    Ok(GpuScene {
        vertex_buffer: buffers.vertex_buffer,
        index_buffer: buffers.index_buffer,
        material_buffer: buffers.material_buffer,
        images: buffers.images,
        draws: merged.draws,
        bounds: merged.bounds,
        instances,
        upload,
    })
}

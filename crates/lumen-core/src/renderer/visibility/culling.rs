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

//! Host-side culling and the indirect draw layouts shared with the GPU path.
//!
//! Both paths evaluate [`Frustum::is_sphere_visible`] per instance and emit one
//! [`IndirectDrawCommand`] per instance, with an instance count of zero when the
//! instance is culled. Given the same inputs the two command arrays are equal.

use super::bounds::BoundingSphere;
use super::frustum::{Frustum, GpuFrustum};
use crate::math::Mat4;
use crate::renderer::traits::DrawRecorder;
use bytemuck::{Pod, Zeroable};

/// The index range of one mesh inside the shared vertex and index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshDraw {
    /// Number of indices.
    pub index_count: u32,
    /// First index inside the index buffer.
    pub first_index: u32,
    /// Value added to each index before fetching the vertex.
    pub base_vertex: i32,
}

/// Arguments of one indexed indirect draw, laid out as the GPU reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct IndirectDrawCommand {
    /// Number of indices to draw.
    pub index_count: u32,
    /// Number of instances; zero for a culled instance.
    pub instance_count: u32,
    /// First index inside the index buffer.
    pub first_index: u32,
    /// Value added to each index.
    pub base_vertex: i32,
    /// Instance id of the first instance, used to look up per-instance data.
    pub first_instance: u32,
}

impl IndirectDrawCommand {
    /// Size of one command in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Builds the command for instance `instance` of `draw`.
    pub fn new(draw: &MeshDraw, instance: u32, visible: bool) -> Self {
        Self {
            index_count: draw.index_count,
            instance_count: u32::from(visible),
            first_index: draw.first_index,
            base_vertex: draw.base_vertex,
            first_instance: instance,
        }
    }

    /// Returns `true` if the command draws anything.
    pub fn is_visible(&self) -> bool {
        self.instance_count > 0
    }
}

/// One placed mesh to be culled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullInstance {
    /// The mesh's index range.
    pub draw: MeshDraw,
    /// Local-space bounding sphere of the mesh.
    pub bounds: BoundingSphere,
    /// Local-to-world transform.
    pub transform: Mat4,
}

/// One [`CullInstance`] as read by the culling compute shader.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuCullObject {
    /// Column-major local-to-world transform.
    pub transform: [[f32; 4]; 4],
    /// Local-space sphere as `[x, y, z, radius]`.
    pub sphere: [f32; 4],
    /// See [`MeshDraw::index_count`].
    pub index_count: u32,
    /// See [`MeshDraw::first_index`].
    pub first_index: u32,
    /// See [`MeshDraw::base_vertex`].
    pub base_vertex: i32,
    /// Keeps the struct a multiple of 16 bytes.
    pub _padding: u32,
}

impl From<&CullInstance> for GpuCullObject {
    fn from(instance: &CullInstance) -> Self {
        Self {
            transform: instance.transform.to_cols_array_2d(),
            sphere: instance.bounds.to_array(),
            index_count: instance.draw.index_count,
            first_index: instance.draw.first_index,
            base_vertex: instance.draw.base_vertex,
            _padding: 0,
        }
    }
}

/// Uniform block of the culling compute pass.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuCullUniforms {
    /// The frustum planes.
    pub frustum: GpuFrustum,
    /// Number of valid entries in the object array.
    pub object_count: u32,
    /// Pads the block to 16 bytes.
    pub _padding: [u32; 3],
}

impl GpuCullUniforms {
    /// Packs a frustum and object count.
    pub fn new(frustum: &Frustum, object_count: u32) -> Self {
        Self {
            frustum: frustum.to_gpu(),
            object_count,
            _padding: [0; 3],
        }
    }
}

/// Visible/total counters of a culling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Number of instances tested.
    pub total: usize,
    /// Number of instances that passed.
    pub visible: usize,
}

impl CullStats {
    /// Counts the visible commands of a command array.
    pub fn from_commands(commands: &[IndirectDrawCommand]) -> Self {
        Self {
            total: commands.len(),
            visible: commands.iter().filter(|c| c.is_visible()).count(),
        }
    }
}

/// Tests one instance against the frustum.
#[inline]
pub fn is_instance_visible(frustum: &Frustum, instance: &CullInstance) -> bool {
    frustum.is_sphere_visible(&instance.bounds, &instance.transform)
}

/// Returns one visibility flag per instance.
pub fn cull_instances(frustum: &Frustum, instances: &[CullInstance]) -> Vec<bool> {
    instances
        .iter()
        .map(|instance| is_instance_visible(frustum, instance))
        .collect()
}

/// Builds the indirect command array the GPU culling pass would write.
pub fn build_indirect_commands(
    frustum: &Frustum,
    instances: &[CullInstance],
) -> Vec<IndirectDrawCommand> {
    instances
        .iter()
        .enumerate()
        .map(|(i, instance)| {
            let visible = is_instance_visible(frustum, instance);
            IndirectDrawCommand::new(&instance.draw, i as u32, visible)
        })
        .collect()
}

/// Records a direct draw for every visible instance and skips the rest.
///
/// Returns the culling counters.
pub fn record_visible_draws<R: DrawRecorder + ?Sized>(
    recorder: &mut R,
    frustum: &Frustum,
    instances: &[CullInstance],
) -> CullStats {
    let mut stats = CullStats {
        total: instances.len(),
        visible: 0,
    };
    for (i, instance) in instances.iter().enumerate() {
        if !is_instance_visible(frustum, instance) {
            continue;
        }
        let draw = &instance.draw;
        let instance_id = i as u32;
        recorder.draw_indexed(
            draw.first_index..draw.first_index + draw.index_count,
            draw.base_vertex,
            instance_id..instance_id + 1,
        );
        stats.visible += 1;
    }
    stats
}

/// Number of workgroups needed to cover `count` items.
#[inline]
pub const fn dispatch_size(count: u32, workgroup_size: u32) -> u32 {
    count.div_ceil(workgroup_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{degrees_to_radians, Vec3};
    use crate::renderer::visibility::CameraFrame;
    use std::ops::Range;

    #[derive(Default)]
    struct CountingRecorder {
        calls: Vec<(Range<u32>, i32, Range<u32>)>,
    }

    impl DrawRecorder for CountingRecorder {
        fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
            self.calls.push((indices, base_vertex, instances));
        }
    }

    fn frustum() -> Frustum {
        Frustum::from_camera(&CameraFrame {
            position: Vec3::ZERO,
            forward: Vec3::new(0.0, 0.0, -1.0),
            right: Vec3::X,
            up: Vec3::Y,
            fov_y: degrees_to_radians(60.0),
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        })
    }

    fn instance_at(z: f32, first_index: u32) -> CullInstance {
        CullInstance {
            draw: MeshDraw {
                index_count: 3,
                first_index,
                base_vertex: 0,
            },
            bounds: BoundingSphere::new(Vec3::ZERO, 1.0),
            transform: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
        }
    }

    #[test]
    fn culled_instances_get_zero_instance_count() {
        let instances = [instance_at(-10.0, 0), instance_at(10.0, 3), instance_at(-20.0, 6)];
        let commands = build_indirect_commands(&frustum(), &instances);
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].instance_count, 1);
        assert_eq!(commands[1].instance_count, 0);
        assert_eq!(commands[1].first_index, 3);
        assert_eq!(commands[2].first_instance, 2);
        assert_eq!(CullStats::from_commands(&commands), CullStats { total: 3, visible: 2 });
    }

    #[test]
    fn direct_recording_matches_command_array() {
        let instances = [instance_at(-10.0, 0), instance_at(10.0, 3), instance_at(-20.0, 6)];
        let mut recorder = CountingRecorder::default();
        let stats = record_visible_draws(&mut recorder, &frustum(), &instances);
        assert_eq!(stats.visible, 2);
        assert_eq!(recorder.calls[0], (0..3, 0, 0..1));
        assert_eq!(recorder.calls[1], (6..9, 0, 2..3));
        assert_eq!(cull_instances(&frustum(), &instances), vec![true, false, true]);
    }

    #[test]
    fn dispatch_rounds_up_to_whole_workgroups() {
        assert_eq!(dispatch_size(0, 64), 0);
        assert_eq!(dispatch_size(1, 64), 1);
        assert_eq!(dispatch_size(64, 64), 1);
        assert_eq!(dispatch_size(65, 64), 2);
    }

    #[test]
    fn gpu_layouts_match_wgsl_sizes() {
        assert_eq!(IndirectDrawCommand::SIZE, 20);
        assert_eq!(std::mem::size_of::<GpuCullObject>(), 96);
        assert_eq!(std::mem::size_of::<GpuCullUniforms>(), 112);
    }

    #[test]
    fn scaled_transform_grows_the_tested_sphere() {
        // Centered 3 units outside the right plane at z = -10 (half-width ~5.77).
        let mut instance = instance_at(-10.0, 0);
        instance.transform = Mat4::from_translation(Vec3::new(9.0, 0.0, -10.0));
        assert!(!is_instance_visible(&frustum(), &instance));
        instance.transform = instance.transform * Mat4::from_scale(Vec3::splat(4.0));
        assert!(is_instance_visible(&frustum(), &instance));
    }
}

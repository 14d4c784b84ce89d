//! GPU tests. Each one returns early when no adapter with the bindless
//! feature set is available, so they pass on machines without a GPU.

use std::borrow::Cow;
use std::sync::Arc;

use lumen_core::math::{degrees_to_radians, Mat4, Vec3};
use lumen_core::renderer::api::{
    BufferDescriptor, BufferType, ImageDescriptor, ImageFormat, ImageUsage, RenderSettings,
};
use lumen_core::renderer::visibility::{
    build_indirect_commands, BoundingSphere, CameraFrame, CullInstance, Frustum, MeshDraw,
};
use lumen_core::renderer::{DescriptorKind, GraphicsDevice, ResourceManager};
use lumen_infra::{GpuCuller, WgpuGraphicsContext};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn headless_context() -> Option<WgpuGraphicsContext> {
    init_logger();
    match pollster::block_on(WgpuGraphicsContext::headless(
        "lumen-infra tests",
        &RenderSettings::default(),
    )) {
        Ok(context) => Some(context),
        Err(e) => {
            log::warn!("Skipping GPU test: {e:#}");
            None
        }
    }
}

fn frustum() -> Frustum {
    Frustum::from_camera(&CameraFrame {
        position: Vec3::ZERO,
        forward: Vec3::new(0.0, 0.0, -1.0),
        right: Vec3::X,
        up: Vec3::Y,
        fov_y: degrees_to_radians(60.0),
        aspect: 16.0 / 9.0,
        near: 0.1,
        far: 100.0,
    })
}

// A grid around the camera, so instances land on both sides of every side plane.
fn scattered_instances(n: usize) -> Vec<CullInstance> {
    (0..n)
        .map(|i| {
            let x = (i % 11) as f32 * 6.0 - 30.0;
            let z = -(((i / 11) % 9) as f32) * 12.0 + 20.0;
            let scale = 1.0 + (i % 3) as f32 * 0.5;
            CullInstance {
                draw: MeshDraw {
                    index_count: 3 + (i as u32 % 4) * 3,
                    first_index: i as u32 * 3,
                    base_vertex: (i % 5) as i32,
                },
                bounds: BoundingSphere::new(Vec3::new(0.0, 0.25, 0.0), 0.75),
                transform: Mat4::from_translation(Vec3::new(x, 0.0, z))
                    * Mat4::from_scale(Vec3::splat(scale)),
            }
        })
        .collect()
}

#[test]
fn gpu_culling_matches_cpu_culling() {
    let Some(context) = headless_context() else {
        return;
    };
    let mut culler = GpuCuller::new(&context.device, 64);
    let frustum = frustum();

    for n in [0usize, 1, 63, 64, 65, 250] {
        let instances = scattered_instances(n);
        culler.upload(&instances);
        assert_eq!(culler.object_count(), n as u32);

        let gpu = culler.cull_blocking(&frustum).unwrap();
        let cpu = build_indirect_commands(&frustum, &instances);
        assert_eq!(gpu, cpu, "command arrays differ for {n} instances");
    }
    assert!(culler.capacity() >= 250);
}

#[test]
fn culled_commands_survive_a_second_read_back() {
    let Some(context) = headless_context() else {
        return;
    };
    let mut culler = GpuCuller::new(&context.device, 32);
    let instances = scattered_instances(40);
    culler.upload(&instances);

    let first = culler.cull_blocking(&frustum()).unwrap();
    let again = culler.read_back_commands().unwrap();
    assert_eq!(first, again);
    assert!(first.iter().any(|c| c.instance_count == 1));
    assert!(first.iter().any(|c| c.instance_count == 0));
}

#[test]
fn resource_manager_registers_bindless_slots_on_a_real_device() {
    let Some(context) = headless_context() else {
        return;
    };
    let device = context.device.clone();
    let shared: Arc<dyn GraphicsDevice> = Arc::new(device.clone());
    let mut resources = ResourceManager::new(shared, &RenderSettings::default()).unwrap();

    let uniform = resources
        .create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("camera")),
            size: 80,
            buffer_type: BufferType::Uniform,
        })
        .unwrap();
    resources.upload_to_buffer(uniform, &[1u8; 80], 0).unwrap();

    let vertices = resources
        .create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("vertices")),
            size: 36,
            buffer_type: BufferType::Vertex,
        })
        .unwrap();
    resources.upload_to_buffer(vertices, &[2u8; 36], 0).unwrap();

    let image = resources
        .create_image(&ImageDescriptor {
            label: Some(Cow::Borrowed("checker")),
            width: 4,
            height: 4,
            mip_levels: 3,
            format: ImageFormat::Rgba8Unorm,
            usage: ImageUsage::SAMPLED | ImageUsage::COPY_DST,
        })
        .unwrap();
    // 4x4 + 2x2 + 1x1 texels of RGBA8.
    resources.upload_to_image(image, &[255u8; 84]).unwrap();

    let uniform_slot = resources.buffer(uniform).unwrap().bindless.unwrap();
    let sampled_slot = resources.image(image).unwrap().sampled[0];
    assert_eq!(uniform_slot.kind, DescriptorKind::UniformBuffer);
    assert_eq!(sampled_slot.kind, DescriptorKind::Sampler);

    let lengths = device.bindless_bound_lengths().unwrap();
    assert!(lengths[1] > uniform_slot.index as usize);
    assert!(lengths[0] > sampled_slot.index as usize);

    resources.destroy_all().unwrap();
    assert_eq!(resources.live_counts(), (0, 0, 0, 0));
}

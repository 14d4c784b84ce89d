mod common;

use common::MockDevice;
use lumen_core::math::{Mat4, Vec3};
use lumen_core::renderer::api::{BufferDescriptor, BufferType};
use lumen_core::renderer::{
    DescriptorKind, RenderError, RenderSettings, ResourceError, ResourceManager,
};
use lumen_core::scene::*;
use std::sync::Arc;

fn triangle(offset: f32) -> MeshData {
    MeshData {
        name: "triangle".to_string(),
        vertices: vec![
            Vertex::new([offset - 0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([offset + 0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([offset, 0.5, 0.0], [0.0, 0.0, 1.0], [0.5, 1.0]),
        ],
        indices: vec![0, 1, 2],
        material: Some(0),
    }
}

fn two_mesh_scene() -> SceneDescription {
    SceneDescription {
        meshes: vec![triangle(0.0), triangle(2.0)],
        materials: vec![MaterialData {
            name: "checker".to_string(),
            base_color: [1.0, 0.5, 0.25, 1.0],
            base_color_texture: Some(0),
        }],
        images: vec![
            ImageSource {
                uri: "checker.png".to_string(),
                pixels: Some(ImagePixels {
                    width: 2,
                    height: 2,
                    rgba8: vec![255; 16],
                }),
            },
            ImageSource {
                uri: "missing.png".to_string(),
                pixels: None,
            },
        ],
        nodes: vec![
            SceneNode {
                name: "root".to_string(),
                local_transform: Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
                mesh: Some(0),
                children: vec![1],
            },
            SceneNode {
                name: "child".to_string(),
                mesh: Some(1),
                ..Default::default()
            },
        ],
        roots: vec![0],
    }
}

#[test]
fn scene_uploads_in_a_single_submission() {
    let device = Arc::new(MockDevice::new());
    let mut resources = ResourceManager::new(device.clone(), &RenderSettings::default()).unwrap();
    let scene = upload_scene(&mut resources, &two_mesh_scene()).unwrap();

    assert_eq!(device.submissions(), 1);
    assert!(!resources.is_transfer_active());
    // Vertices, indices, one image and the material buffer.
    assert_eq!(scene.upload.uploads, 4);

    assert_eq!(scene.draws[1].first_index, 3);
    assert_eq!(scene.draws[1].base_vertex, 3);
    assert_eq!(scene.images.len(), 2);
    assert!(scene.images[1].is_none());

    let vertex_id = resources.buffer(scene.vertex_buffer).unwrap().id;
    let vertex_bytes = device.buffer_bytes(vertex_id).unwrap();
    let stride = std::mem::size_of::<Vertex>();
    let fourth: Vertex = bytemuck::pod_read_unaligned(&vertex_bytes[3 * stride..4 * stride]);
    assert_eq!(fourth.position, [1.5, -0.5, 0.0]);

    let material_id = resources.buffer(scene.material_buffer).unwrap().id;
    let material_bytes = device.buffer_bytes(material_id).unwrap();
    let material: GpuMaterial =
        bytemuck::pod_read_unaligned(&material_bytes[..std::mem::size_of::<GpuMaterial>()]);
    let texture = resources.image(scene.images[0].unwrap()).unwrap().sampled[0];
    assert_eq!(material.base_color_texture, texture.index);

    let cull = scene.cull_instances();
    assert_eq!(cull.len(), 2);
    assert_eq!(cull[1].transform.transform_point(Vec3::ZERO), Vec3::new(0.0, 0.0, -5.0));

    scene.destroy(&mut resources).unwrap();
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn scene_joins_an_open_transfer_session() {
    let device = Arc::new(MockDevice::new());
    let mut resources = ResourceManager::new(device.clone(), &RenderSettings::default()).unwrap();
    resources.begin_transfer().unwrap();
    let scene = upload_scene(&mut resources, &two_mesh_scene()).unwrap();
    assert!(resources.is_transfer_active());
    assert_eq!(device.submissions(), 0);
    let stats = resources.end_transfer().unwrap();
    assert_eq!(stats.uploads, 4);
    assert_eq!(scene.instances.len(), 2);
}

#[test]
fn malformed_scene_is_rejected_before_any_upload() {
    let device = Arc::new(MockDevice::new());
    let mut resources = ResourceManager::new(device.clone(), &RenderSettings::default()).unwrap();
    let mut scene = two_mesh_scene();
    scene.meshes[0].indices = vec![0, 1, 9];
    let err = upload_scene(&mut resources, &scene).unwrap_err();
    assert!(err.to_string().contains("Mesh 0 references missing vertex 9."));
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn failed_upload_releases_everything_and_closes_its_session() {
    let device = Arc::new(MockDevice::new());
    let mut resources = ResourceManager::new(device.clone(), &RenderSettings::default()).unwrap();
    let mut broken = two_mesh_scene();
    if let Some(pixels) = broken.images[0].pixels.as_mut() {
        pixels.rgba8 = vec![255; 3];
    }

    let err = upload_scene(&mut resources, &broken).unwrap_err();
    assert!(matches!(
        err,
        RenderError::ResourceError(ResourceError::OutOfBounds { size: 3, .. })
    ));
    assert!(!resources.is_transfer_active());
    assert_eq!(device.submissions(), 0);
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_images(), 0);
    assert_eq!(resources.live_counts(), (0, 0, 0, 0));
    assert_eq!(resources.bindless().table(DescriptorKind::Sampler).live_count(), 0);

    // The next upload opens and submits its own session.
    let scene = upload_scene(&mut resources, &two_mesh_scene()).unwrap();
    assert_eq!(scene.upload.uploads, 4);
    assert_eq!(device.submissions(), 1);
    assert!(!resources.is_transfer_active());
}

#[test]
fn failed_upload_in_a_joined_session_keeps_the_callers_work() {
    let device = Arc::new(MockDevice::new());
    let mut resources = ResourceManager::new(device.clone(), &RenderSettings::default()).unwrap();
    let own = resources
        .create_buffer(&BufferDescriptor {
            label: None,
            size: 8,
            buffer_type: BufferType::Vertex,
        })
        .unwrap();

    resources.begin_transfer().unwrap();
    resources.upload_to_buffer(own, &[6u8; 8], 0).unwrap();

    let mut broken = two_mesh_scene();
    if let Some(pixels) = broken.images[0].pixels.as_mut() {
        pixels.rgba8 = vec![255; 3];
    }
    assert!(upload_scene(&mut resources, &broken).is_err());
    assert!(resources.is_transfer_active());
    assert_eq!(resources.live_counts(), (1, 0, 0, 0));

    let stats = resources.end_transfer().unwrap();
    assert_eq!(device.submissions(), 1);
    // The caller's upload plus the scene's vertices and indices were recorded.
    assert_eq!(stats.uploads, 3);
    let id = resources.buffer(own).unwrap().id;
    assert_eq!(device.buffer_bytes(id).unwrap(), vec![6u8; 8]);
    // Only the caller's buffer survives the session.
    assert_eq!(device.live_buffers(), 1);
    assert_eq!(device.live_images(), 0);
}

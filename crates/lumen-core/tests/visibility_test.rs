use approx::assert_relative_eq;
use lumen_core::math::{degrees_to_radians, Mat4, Vec3};
use lumen_core::renderer::visibility::*;

fn camera_at_origin() -> CameraFrame {
    let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y).unwrap();
    CameraFrame::from_view_matrix(&view, degrees_to_radians(60.0), 1.0, 0.1, 100.0)
}

#[test]
fn unit_triangle_bounding_sphere() {
    let triangle = [
        Vec3::new(-0.5, -0.5, 0.0),
        Vec3::new(0.5, -0.5, 0.0),
        Vec3::new(-0.5, 0.5, 0.0),
    ];
    let bounds = MeshBounds::from_positions(&triangle).unwrap();
    assert_eq!(bounds.sphere.center, Vec3::ZERO);
    let corner_distance = Vec3::new(-0.5, -0.5, 0.0).distance(Vec3::new(0.5, 0.5, 0.0));
    assert_relative_eq!(bounds.sphere.radius, corner_distance);
}

#[test]
fn spheres_in_front_and_behind_the_camera() {
    let frustum = Frustum::from_camera(&camera_at_origin());
    let unit = BoundingSphere::new(Vec3::ZERO, 1.0);
    let ahead = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0));
    let behind = Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0));
    assert!(frustum.is_sphere_visible(&unit, &ahead));
    assert!(!frustum.is_sphere_visible(&unit, &behind));
    // Same inputs, same answer.
    assert_eq!(
        frustum.is_sphere_visible(&unit, &ahead),
        frustum.is_sphere_visible(&unit, &ahead)
    );
}

#[test]
fn command_array_and_direct_draws_agree_for_any_instance_count() {
    let frustum = Frustum::from_camera(&camera_at_origin());
    for n in [0usize, 1, 7, 64, 65, 200] {
        let instances: Vec<CullInstance> = (0..n)
            .map(|i| {
                // Spread instances on a ring around the camera so roughly a
                // sixth of them land inside the view volume.
                let angle = i as f32 * 0.37;
                let position =
                    Vec3::new(angle.sin() * 20.0, (i % 5) as f32 - 2.0, angle.cos() * 20.0);
                CullInstance {
                    draw: MeshDraw {
                        index_count: 36,
                        first_index: 0,
                        base_vertex: 0,
                    },
                    bounds: BoundingSphere::new(Vec3::ZERO, 0.5 + (i % 3) as f32),
                    transform: Mat4::from_translation(position),
                }
            })
            .collect();

        let commands = build_indirect_commands(&frustum, &instances);
        let flags = cull_instances(&frustum, &instances);
        assert_eq!(commands.len(), n);
        for (command, visible) in commands.iter().zip(&flags) {
            assert_eq!(command.is_visible(), *visible);
        }
        let stats = CullStats::from_commands(&commands);
        assert_eq!(stats.visible, flags.iter().filter(|v| **v).count());
        assert!(dispatch_size(n as u32, 64) * 64 >= n as u32);
    }
}

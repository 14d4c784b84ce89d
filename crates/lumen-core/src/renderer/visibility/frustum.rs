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

//! View frustum extraction and the sphere-vs-frustum test.
//!
//! The frustum is built from camera parameters rather than from a
//! view-projection matrix, so the same six planes can be uploaded to the GPU
//! culling pass and evaluated on the host with the identical formula.

use super::bounds::BoundingSphere;
use crate::math::{Mat4, Vec3};
use bytemuck::{Pod, Zeroable};

/// A plane stored as a unit normal and its signed distance from the origin.
/// Points with `dot(normal, p) > distance` are on the positive (inner) side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane {
    /// Unit normal pointing into the frustum.
    pub normal: Vec3,
    /// `dot(normal, point_on_plane)`.
    pub distance: f32,
}

impl Plane {
    /// Builds a plane through `point` facing `normal` (normalized here).
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            distance: normal.dot(point),
        }
    }

    /// Signed distance of `point` from the plane.
    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.distance
    }
}

/// Camera parameters a frustum is extracted from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    /// Eye position in world space.
    pub position: Vec3,
    /// Unit view direction.
    pub forward: Vec3,
    /// Unit right vector.
    pub right: Vec3,
    /// Unit up vector.
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width / height.
    pub aspect: f32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

impl CameraFrame {
    /// Derives position and basis vectors from a right-handed view matrix such as
    /// the one produced by [`Mat4::look_at_rh`].
    ///
    /// The rows of the upper 3x3 block are right, up and -forward; the eye is
    /// recovered by rotating the negated translation back into world space.
    pub fn from_view_matrix(view: &Mat4, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let right = view.get_row(0).truncate();
        let up = view.get_row(1).truncate();
        let forward = -view.get_row(2).truncate();
        let t = view.cols[3].truncate();
        let position = -(right * t.x + up * t.y + (-forward) * t.z);
        Self {
            position,
            forward,
            right,
            up,
            fov_y,
            aspect,
            near,
            far,
        }
    }
}

/// The six inward-facing planes of a perspective view volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Planes in the order near, far, left, right, top, bottom.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Index of the near plane.
    pub const NEAR: usize = 0;
    /// Index of the far plane.
    pub const FAR: usize = 1;
    /// Index of the left plane.
    pub const LEFT: usize = 2;
    /// Index of the right plane.
    pub const RIGHT: usize = 3;
    /// Index of the top plane.
    pub const TOP: usize = 4;
    /// Index of the bottom plane.
    pub const BOTTOM: usize = 5;

    /// Extracts the frustum of `camera`.
    ///
    /// The side planes all pass through the eye; their normals come from the
    /// edges of the far plane rectangle crossed with the camera's up or right axis.
    pub fn from_camera(camera: &CameraFrame) -> Self {
        let CameraFrame {
            position,
            forward,
            right,
            up,
            ..
        } = *camera;
        let half_v = camera.far * (camera.fov_y * 0.5).tan();
        let half_h = half_v * camera.aspect;
        let far_center = forward * camera.far;

        let near = Plane::from_normal_and_point(forward, position + forward * camera.near);
        let far = Plane::from_normal_and_point(-forward, position + far_center);
        let left = Plane::from_normal_and_point((far_center - right * half_h).cross(up), position);
        let right_plane =
            Plane::from_normal_and_point(up.cross(far_center + right * half_h), position);
        let top = Plane::from_normal_and_point((far_center + up * half_v).cross(right), position);
        let bottom = Plane::from_normal_and_point(right.cross(far_center - up * half_v), position);

        Self {
            planes: [near, far, left, right_plane, top, bottom],
        }
    }

    /// Tests a world-space sphere: visible iff `dot(n, c) - d > -r` for every plane.
    #[inline]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(center) > -radius)
    }

    /// Tests a local-space bounding sphere placed by `world`.
    #[inline]
    pub fn is_sphere_visible(&self, sphere: &BoundingSphere, world: &Mat4) -> bool {
        let world_sphere = sphere.transformed(world);
        self.intersects_sphere(world_sphere.center, world_sphere.radius)
    }

    /// The GPU layout of the frustum.
    pub fn to_gpu(&self) -> GpuFrustum {
        let mut planes = [[0.0; 4]; 6];
        for (dst, plane) in planes.iter_mut().zip(self.planes.iter()) {
            *dst = [plane.normal.x, plane.normal.y, plane.normal.z, plane.distance];
        }
        GpuFrustum { planes }
    }
}

/// The frustum as six `vec4<f32>` (normal.xyz, distance).
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuFrustum {
    /// Planes in the order near, far, left, right, top, bottom.
    pub planes: [[f32; 4]; 6],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{degrees_to_radians, Mat4};
    use approx::assert_relative_eq;

    fn origin_camera() -> CameraFrame {
        CameraFrame {
            position: Vec3::ZERO,
            forward: Vec3::new(0.0, 0.0, -1.0),
            right: Vec3::X,
            up: Vec3::Y,
            fov_y: degrees_to_radians(60.0),
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }

    #[test]
    fn sphere_in_front_is_visible_and_behind_is_not() {
        let frustum = Frustum::from_camera(&origin_camera());
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -10.0), 1.0));
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn test_is_idempotent() {
        let frustum = Frustum::from_camera(&origin_camera());
        let center = Vec3::new(3.0, -2.0, -20.0);
        let first = frustum.intersects_sphere(center, 0.5);
        assert_eq!(first, frustum.intersects_sphere(center, 0.5));
    }

    #[test]
    fn planes_are_unit_and_face_inward() {
        let frustum = Frustum::from_camera(&origin_camera());
        let inside = Vec3::new(0.0, 0.0, -50.0);
        for plane in &frustum.planes {
            assert_relative_eq!(plane.normal.length(), 1.0, epsilon = 1e-5);
            assert!(plane.signed_distance(inside) > 0.0);
        }
        assert_relative_eq!(frustum.planes[Frustum::NEAR].distance, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn spheres_outside_each_side_are_culled() {
        let frustum = Frustum::from_camera(&origin_camera());
        // At z = -10 the half-width of the view volume is 10 * tan(30 deg) ~= 5.77.
        assert!(!frustum.intersects_sphere(Vec3::new(8.0, 0.0, -10.0), 1.0));
        assert!(!frustum.intersects_sphere(Vec3::new(-8.0, 0.0, -10.0), 1.0));
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 8.0, -10.0), 1.0));
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, -8.0, -10.0), 1.0));
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, -150.0), 1.0));
        // Straddling the right plane still counts as visible.
        assert!(frustum.intersects_sphere(Vec3::new(6.0, 0.0, -10.0), 1.0));
    }

    #[test]
    fn camera_frame_round_trips_look_at() {
        let eye = Vec3::new(2.0, 3.0, 4.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y).unwrap();
        let camera = CameraFrame::from_view_matrix(&view, 1.0, 1.5, 0.1, 100.0);
        assert_relative_eq!(camera.position.x, eye.x, epsilon = 1e-4);
        assert_relative_eq!(camera.position.y, eye.y, epsilon = 1e-4);
        assert_relative_eq!(camera.position.z, eye.z, epsilon = 1e-4);
        let expected_forward = (Vec3::ZERO - eye).normalize();
        assert_relative_eq!(camera.forward.dot(expected_forward), 1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.right.dot(camera.up), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn gpu_layout_carries_every_plane() {
        let frustum = Frustum::from_camera(&origin_camera());
        let gpu = frustum.to_gpu();
        assert_eq!(std::mem::size_of::<GpuFrustum>(), 96);
        assert_eq!(gpu.planes[Frustum::NEAR], [0.0, 0.0, -1.0, frustum.planes[0].distance]);
    }
}

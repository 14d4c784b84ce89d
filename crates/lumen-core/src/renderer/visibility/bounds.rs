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

//! Per-mesh bounding volumes.

use crate::math::{Aabb, Mat4, Vec3};

/// A sphere enclosing a mesh, in the mesh's local space.
///
/// Built from the mesh's axis-aligned extents: the center is the box midpoint
/// and the radius is the full min-to-max diagonal. This is twice the tightest
/// radius for the box; culling only needs the bound to be conservative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    /// Center of the sphere.
    pub center: Vec3,
    /// Radius of the sphere.
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a sphere from its center and radius.
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Derives the sphere from an axis-aligned box.
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.center(),
            radius: aabb.diagonal_length(),
        }
    }

    /// Derives the sphere from vertex positions. Returns `None` for an empty slice.
    pub fn from_positions(positions: &[Vec3]) -> Option<Self> {
        Aabb::from_points(positions).map(|aabb| Self::from_aabb(&aabb))
    }

    /// Moves the sphere into world space: the center is transformed and the
    /// radius scaled by the largest axis scale of `transform`.
    pub fn transformed(&self, transform: &Mat4) -> Self {
        Self {
            center: transform.transform_point(self.center),
            radius: self.radius * transform.max_axis_scale(),
        }
    }

    /// Packs center and radius as `[x, y, z, radius]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.center.x, self.center.y, self.center.z, self.radius]
    }
}

/// Both bounding volumes of a mesh, computed once when its geometry is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshBounds {
    /// Axis-aligned extents of the vertex positions.
    pub aabb: Aabb,
    /// Sphere derived from `aabb`.
    pub sphere: BoundingSphere,
}

impl MeshBounds {
    /// Computes the bounds of a set of vertex positions.
    pub fn from_positions(positions: &[Vec3]) -> Option<Self> {
        let aabb = Aabb::from_points(positions)?;
        Some(Self {
            aabb,
            sphere: BoundingSphere::from_aabb(&aabb),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unit_triangle_sphere_uses_corner_distance() {
        let positions = [
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(0.0, 0.5, 0.0),
        ];
        let sphere = BoundingSphere::from_positions(&positions).unwrap();
        assert_eq!(sphere.center, Vec3::ZERO);
        // Corner distance from (-0.5, -0.5, 0) to (0.5, 0.5, 0).
        assert_relative_eq!(sphere.radius, std::f32::consts::SQRT_2, epsilon = 1e-6);
    }

    #[test]
    fn empty_geometry_has_no_bounds() {
        assert!(BoundingSphere::from_positions(&[]).is_none());
        assert!(MeshBounds::from_positions(&[]).is_none());
    }

    #[test]
    fn transform_moves_center_and_scales_radius() {
        let sphere = BoundingSphere::new(Vec3::new(1.0, 0.0, 0.0), 2.0);
        let transform =
            Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0))
                * Mat4::from_scale(Vec3::new(1.0, 3.0, 2.0));
        let world = sphere.transformed(&transform);
        assert_relative_eq!(world.center.x, 1.0);
        assert_relative_eq!(world.center.y, 5.0);
        assert_relative_eq!(world.radius, 6.0);
    }
}

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

//! Flattening of the node hierarchy into world-space mesh instances.

use super::description::{SceneDescription, SceneError};
use crate::math::Mat4;

/// A mesh placed in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneInstance {
    /// The node the instance comes from.
    pub node: usize,
    /// Index into [`SceneDescription::meshes`].
    pub mesh: usize,
    /// Accumulated parent-to-child transform.
    pub world_transform: Mat4,
}

/// Walks the hierarchy in pre-order and returns one instance per mesh-bearing node.
///
/// Uses an explicit worklist of (node, parent transform) pairs, so arbitrarily
/// deep hierarchies cannot overflow the stack. Children are pushed in reverse so
/// they pop in declaration order; instance `i` is therefore the `i`-th mesh node
/// a recursive pre-order walk would visit.
///
/// # Errors
///
/// Returns a [`SceneError`] for dangling node or mesh indices and for nodes
/// reachable through more than one path.
pub fn flatten_hierarchy(scene: &SceneDescription) -> Result<Vec<SceneInstance>, SceneError> {
    let mut instances = Vec::new();
    let mut visited = vec![false; scene.nodes.len()];
    let mut worklist: Vec<(usize, Mat4)> = scene
        .roots
        .iter()
        .rev()
        .map(|&root| (root, Mat4::IDENTITY))
        .collect();

    while let Some((index, parent)) = worklist.pop() {
        let node = scene.nodes.get(index).ok_or(SceneError::InvalidNode(index))?;
        if std::mem::replace(&mut visited[index], true) {
            return Err(SceneError::NodeVisitedTwice(index));
        }

        let world_transform = parent * node.local_transform;
        if let Some(mesh) = node.mesh {
            if mesh >= scene.meshes.len() {
                return Err(SceneError::InvalidMesh { node: index, mesh });
            }
            instances.push(SceneInstance {
                node: index,
                mesh,
                world_transform,
            });
        }
        worklist.extend(node.children.iter().rev().map(|&child| (child, world_transform)));
    }

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use crate::scene::{MeshData, SceneNode};

    fn node(name: &str, translation: Vec3, mesh: Option<usize>, children: Vec<usize>) -> SceneNode {
        SceneNode {
            name: name.to_string(),
            local_transform: Mat4::from_translation(translation),
            mesh,
            children,
        }
    }

    fn scene(nodes: Vec<SceneNode>, roots: Vec<usize>) -> SceneDescription {
        SceneDescription {
            meshes: vec![MeshData::default(); 4],
            nodes,
            roots,
            ..Default::default()
        }
    }

    #[test]
    fn preorder_with_accumulated_transforms() {
        // root(0) -> [a(1) -> [c(3)], b(2)]
        let scene = scene(
            vec![
                node("root", Vec3::new(1.0, 0.0, 0.0), Some(0), vec![1, 2]),
                node("a", Vec3::new(0.0, 1.0, 0.0), Some(1), vec![3]),
                node("b", Vec3::new(0.0, 0.0, 1.0), Some(2), vec![]),
                node("c", Vec3::new(0.0, 1.0, 0.0), Some(3), vec![]),
            ],
            vec![0],
        );
        let instances = flatten_hierarchy(&scene).unwrap();
        let order: Vec<usize> = instances.iter().map(|i| i.node).collect();
        assert_eq!(order, vec![0, 1, 3, 2]);

        let c = instances[2].world_transform.transform_point(Vec3::ZERO);
        assert_eq!(c, Vec3::new(1.0, 2.0, 0.0));
        let b = instances[3].world_transform.transform_point(Vec3::ZERO);
        assert_eq!(b, Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn nodes_without_mesh_only_carry_transforms() {
        let scene = scene(
            vec![
                node("group", Vec3::new(5.0, 0.0, 0.0), None, vec![1]),
                node("leaf", Vec3::ZERO, Some(0), vec![]),
            ],
            vec![0],
        );
        let instances = flatten_hierarchy(&scene).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(
            instances[0].world_transform.transform_point(Vec3::ZERO),
            Vec3::new(5.0, 0.0, 0.0)
        );
    }

    #[test]
    fn deep_chain_does_not_recurse() {
        let depth = 10_000;
        let nodes = (0..depth)
            .map(|i| {
                let children = if i + 1 < depth { vec![i + 1] } else { vec![] };
                node("n", Vec3::ZERO, Some(0), children)
            })
            .collect();
        let instances = flatten_hierarchy(&scene(nodes, vec![0])).unwrap();
        assert_eq!(instances.len(), depth);
    }

    #[test]
    fn malformed_hierarchies_are_reported() {
        let cyclic = scene(
            vec![
                node("a", Vec3::ZERO, None, vec![1]),
                node("b", Vec3::ZERO, None, vec![0]),
            ],
            vec![0],
        );
        assert_eq!(flatten_hierarchy(&cyclic), Err(SceneError::NodeVisitedTwice(0)));

        let dangling = scene(vec![node("a", Vec3::ZERO, None, vec![7])], vec![0]);
        assert_eq!(flatten_hierarchy(&dangling), Err(SceneError::InvalidNode(7)));

        let missing_mesh = scene(vec![node("a", Vec3::ZERO, Some(9), vec![])], vec![0]);
        assert_eq!(
            flatten_hierarchy(&missing_mesh),
            Err(SceneError::InvalidMesh { node: 0, mesh: 9 })
        );
    }
}

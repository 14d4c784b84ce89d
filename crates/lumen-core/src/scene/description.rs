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

//! The flat scene description produced by the asset-parsing collaborator.

use crate::math::{Mat4, Vec3};
use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Interleaved vertex layout shared by every uploaded mesh.
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

impl Vertex {
    /// Creates a vertex.
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// The position as a [`Vec3`].
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// Geometry of one mesh.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Debug name.
    pub name: String,
    /// Vertices.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`.
    pub indices: Vec<u32>,
    /// Index into [`SceneDescription::materials`].
    pub material: Option<usize>,
}

/// A material record with an optional texture reference.
#[derive(Debug, Clone)]
pub struct MaterialData {
    /// Debug name.
    pub name: String,
    /// Linear RGBA base color factor.
    pub base_color: [f32; 4],
    /// Index into [`SceneDescription::images`].
    pub base_color_texture: Option<usize>,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: [1.0; 4],
            base_color_texture: None,
        }
    }
}

/// Decoded RGBA8 texels of an image.
#[derive(Debug, Clone)]
pub struct ImagePixels {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Tightly packed sRGB RGBA8 rows, `width * height * 4` bytes.
    pub rgba8: Vec<u8>,
}

/// An image referenced by the scene.
#[derive(Debug, Clone, Default)]
pub struct ImageSource {
    /// The URI the image was referenced by.
    pub uri: String,
    /// Texels, if the collaborator decoded the image.
    pub pixels: Option<ImagePixels>,
}

/// A node of the scene hierarchy.
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Debug name.
    pub name: String,
    /// Transform relative to the parent node.
    pub local_transform: Mat4,
    /// Index into [`SceneDescription::meshes`].
    pub mesh: Option<usize>,
    /// Indices into [`SceneDescription::nodes`], in declaration order.
    pub children: Vec<usize>,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self {
            name: String::new(),
            local_transform: Mat4::IDENTITY,
            mesh: None,
            children: Vec::new(),
        }
    }
}

/// Everything the asset collaborator extracted from one file.
#[derive(Debug, Clone, Default)]
pub struct SceneDescription {
    /// Mesh geometry.
    pub meshes: Vec<MeshData>,
    /// Material records.
    pub materials: Vec<MaterialData>,
    /// Referenced images.
    pub images: Vec<ImageSource>,
    /// All nodes, referenced by index.
    pub nodes: Vec<SceneNode>,
    /// Root nodes, in declaration order.
    pub roots: Vec<usize>,
}

/// A malformed scene description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// A root or child index points past the node list.
    InvalidNode(usize),
    /// A node references a mesh that does not exist.
    InvalidMesh {
        /// The referencing node.
        node: usize,
        /// The missing mesh index.
        mesh: usize,
    },
    /// A node is reachable twice (shared child or cycle).
    NodeVisitedTwice(usize),
    /// A mesh index references a vertex that does not exist.
    IndexOutOfRange {
        /// The mesh.
        mesh: usize,
        /// The offending index value.
        index: u32,
    },
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::InvalidNode(node) => write!(f, "Scene references missing node {node}."),
            SceneError::InvalidMesh { node, mesh } => {
                write!(f, "Node {node} references missing mesh {mesh}.")
            }
            SceneError::NodeVisitedTwice(node) => {
                write!(f, "Node {node} is reachable more than once.")
            }
            SceneError::IndexOutOfRange { mesh, index } => {
                write!(f, "Mesh {mesh} references missing vertex {index}.")
            }
        }
    }
}

impl std::error::Error for SceneError {}

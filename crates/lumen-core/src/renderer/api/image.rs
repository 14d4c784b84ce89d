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

//! Defines data structures related to GPU image and sampler resources, and the
//! staging layout used to upload mip chains.

use super::buffer::align_up;
use crate::lumen_bitflags;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Offsets between mip levels inside a staging buffer are aligned to this many bytes.
pub const STAGING_LEVEL_ALIGNMENT: u64 = 16;

/// Texel formats supported for uploaded images and render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    /// One 8-bit unsigned normalized channel.
    R8Unorm,
    /// Four 8-bit unsigned normalized channels.
    Rgba8Unorm,
    /// Four 8-bit unsigned normalized channels, sRGB encoded.
    Rgba8UnormSrgb,
    /// Four 8-bit channels in BGRA order, sRGB encoded (typical swapchain format).
    Bgra8UnormSrgb,
    /// Four 16-bit float channels.
    Rgba16Float,
    /// Four 32-bit float channels.
    Rgba32Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl ImageFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            ImageFormat::R8Unorm => 1,
            ImageFormat::Rgba8Unorm
            | ImageFormat::Rgba8UnormSrgb
            | ImageFormat::Bgra8UnormSrgb
            | ImageFormat::Depth32Float => 4,
            ImageFormat::Rgba16Float => 8,
            ImageFormat::Rgba32Float => 16,
        }
    }

    /// Returns `true` for depth formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, ImageFormat::Depth32Float)
    }
}

lumen_bitflags! {
    /// Flags describing how an image is going to be used.
    pub struct ImageUsage: u32 {
        /// Sampled from shaders (registered as a combined image-sampler).
        const SAMPLED = 1 << 0;
        /// Read/written as a storage image (registered as a storage image).
        const STORAGE = 1 << 1;
        /// Used as a color attachment.
        const RENDER_TARGET = 1 << 2;
        /// Used as a depth attachment.
        const DEPTH_TARGET = 1 << 3;
        /// Destination of uploads.
        const COPY_DST = 1 << 4;
        /// Source of copies.
        const COPY_SRC = 1 << 5;
    }
}

/// A descriptor used to create a 2D image.
#[derive(Debug, Clone)]
pub struct ImageDescriptor<'a> {
    /// An optional debug label for the image.
    pub label: Option<Cow<'a, str>>,
    /// Width of mip level 0 in texels.
    pub width: u32,
    /// Height of mip level 0 in texels.
    pub height: u32,
    /// Number of mip levels (at least one).
    pub mip_levels: u32,
    /// Texel format.
    pub format: ImageFormat,
    /// Intended usages.
    pub usage: ImageUsage,
}

/// An opaque handle to a native GPU image inside the graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(pub usize);

/// Returns the extent of mip `level` for a base extent of `width` x `height`.
#[inline]
pub fn mip_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

/// Number of levels in a full mip chain down to 1x1.
#[inline]
pub fn full_mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Where one mip level lives inside a staging buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipRegion {
    /// The mip level this region fills.
    pub level: u32,
    /// Byte offset of the level inside the staging buffer.
    pub offset: u64,
    /// Level width in texels.
    pub width: u32,
    /// Level height in texels.
    pub height: u32,
    /// Tightly packed row size in the source data.
    pub unpadded_bytes_per_row: u32,
    /// Row pitch inside the staging buffer.
    pub bytes_per_row: u32,
}

impl MipRegion {
    /// Bytes occupied in the staging buffer.
    pub fn staged_size(&self) -> u64 {
        self.bytes_per_row as u64 * self.height as u64
    }

    /// Bytes occupied in the tightly packed source data.
    pub fn packed_size(&self) -> u64 {
        self.unpadded_bytes_per_row as u64 * self.height as u64
    }
}

/// The layout of a staging buffer holding `levels` mips of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    /// One region per mip level, in level order.
    pub regions: Vec<MipRegion>,
    /// Total staging buffer size in bytes.
    pub total_size: u64,
}

impl StagingLayout {
    /// Lays out `levels` mips of a `width` x `height` image.
    ///
    /// Rows are padded to `row_alignment` bytes (the backend's copy pitch
    /// requirement) and each level starts at a [`STAGING_LEVEL_ALIGNMENT`]-aligned offset.
    pub fn new(
        width: u32,
        height: u32,
        format: ImageFormat,
        levels: u32,
        row_alignment: u32,
    ) -> Self {
        let bpp = format.bytes_per_pixel();
        let mut regions = Vec::with_capacity(levels as usize);
        let mut offset = 0u64;

        for level in 0..levels.max(1) {
            let (w, h) = mip_extent(width, height, level);
            let unpadded = w * bpp;
            let padded = align_up(unpadded as u64, row_alignment.max(1) as u64) as u32;
            offset = align_up(offset, STAGING_LEVEL_ALIGNMENT);
            let region = MipRegion {
                level,
                offset,
                width: w,
                height: h,
                unpadded_bytes_per_row: unpadded,
                bytes_per_row: padded,
            };
            offset += region.staged_size();
            regions.push(region);
        }

        Self {
            regions,
            total_size: align_up(offset, STAGING_LEVEL_ALIGNMENT),
        }
    }

    /// Size of the tightly packed source data this layout expects.
    pub fn packed_size(&self) -> u64 {
        self.regions.iter().map(MipRegion::packed_size).sum()
    }

    /// Copies tightly packed level data into a staging buffer of `total_size` bytes.
    ///
    /// `packed` holds the levels back to back without row padding.
    pub fn fill(&self, packed: &[u8], staging: &mut [u8]) {
        let mut src = 0usize;
        for region in &self.regions {
            let row = region.unpadded_bytes_per_row as usize;
            for y in 0..region.height as usize {
                let dst = region.offset as usize + y * region.bytes_per_row as usize;
                staging[dst..dst + row].copy_from_slice(&packed[src..src + row]);
                src += row;
            }
        }
    }
}

/// Defines the filtering mode for texture sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Point sampling. Returns the value of the nearest texel.
    Nearest,
    /// Linear interpolation.
    Linear,
}

/// Defines how texture coordinates are handled when sampling outside the `[0, 1]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Coordinates wrap around.
    Repeat,
    /// Coordinates are clamped to the edge.
    ClampToEdge,
    /// Coordinates wrap around, mirroring at each integer boundary.
    MirrorRepeat,
}

/// A descriptor used to create a sampler.
#[derive(Debug, Clone)]
pub struct SamplerDescriptor<'a> {
    /// An optional debug label for the sampler.
    pub label: Option<Cow<'a, str>>,
    /// Magnification and minification filter.
    pub filter: FilterMode,
    /// Filter between mip levels.
    pub mipmap_filter: FilterMode,
    /// Addressing on all three axes.
    pub address_mode: AddressMode,
}

impl Default for SamplerDescriptor<'_> {
    fn default() -> Self {
        Self {
            label: None,
            filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode: AddressMode::Repeat,
        }
    }
}

/// An opaque handle to a native sampler inside the graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_extents_clamp_to_one() {
        assert_eq!(mip_extent(256, 64, 0), (256, 64));
        assert_eq!(mip_extent(256, 64, 3), (32, 8));
        assert_eq!(mip_extent(256, 64, 7), (2, 1));
        assert_eq!(full_mip_count(256, 64), 9);
        assert_eq!(full_mip_count(1, 1), 1);
    }

    #[test]
    fn staging_levels_start_on_sixteen_byte_boundaries() {
        // 5x3 R8: rows of 5 bytes, no row padding requested.
        let layout = StagingLayout::new(5, 3, ImageFormat::R8Unorm, 3, 1);
        assert_eq!(layout.regions.len(), 3);
        assert_eq!(layout.regions[0].offset, 0);
        assert_eq!(layout.regions[0].staged_size(), 15);
        assert_eq!(layout.regions[1].offset, 16);
        assert_eq!((layout.regions[1].width, layout.regions[1].height), (2, 1));
        assert_eq!(layout.regions[2].offset, 32);
        for region in &layout.regions {
            assert_eq!(region.offset % STAGING_LEVEL_ALIGNMENT, 0);
        }
        assert_eq!(layout.packed_size(), 15 + 2 + 1);
        assert_eq!(layout.total_size, 48);
    }

    #[test]
    fn staging_rows_are_padded_to_copy_pitch() {
        let layout = StagingLayout::new(100, 2, ImageFormat::Rgba8Unorm, 1, 256);
        let region = layout.regions[0];
        assert_eq!(region.unpadded_bytes_per_row, 400);
        assert_eq!(region.bytes_per_row, 512);
        assert_eq!(layout.total_size, 1024);
    }

    #[test]
    fn fill_places_rows_at_pitch() {
        let layout = StagingLayout::new(2, 2, ImageFormat::R8Unorm, 2, 4);
        let packed = [1u8, 2, 3, 4, 9];
        let mut staging = vec![0u8; layout.total_size as usize];
        layout.fill(&packed, &mut staging);
        assert_eq!(&staging[0..2], &[1, 2]);
        assert_eq!(&staging[4..6], &[3, 4]);
        assert_eq!(staging[layout.regions[1].offset as usize], 9);
    }

    #[test]
    fn usage_flags_combine() {
        let usage = ImageUsage::SAMPLED | ImageUsage::COPY_DST;
        assert!(usage.contains(ImageUsage::SAMPLED));
        assert!(!usage.contains(ImageUsage::STORAGE));
        assert!(usage.intersects(ImageUsage::SAMPLED | ImageUsage::STORAGE));
        assert_eq!(
            format!("{:?}", usage),
            "ImageUsage { SAMPLED | COPY_DST }"
        );
        assert_eq!(format!("{:?}", ImageUsage::EMPTY), "ImageUsage { EMPTY }");
    }
}

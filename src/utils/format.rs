//! Pixel formats and their memory footprint.
//!
//! [`Format`] mirrors the core `VkFormat` values one to one, so conversion to and
//! from [`vk::Format`] is a plain cast. Sizes are exposed two ways:
//!
//! - [`Format::pixel_byte_size`] for formats that store one texel per element.
//!   Block-compressed formats have no such size and report
//!   [`FormatError::BlockCompressed`].
//! - [`Format::block`] for every defined format. Uncompressed formats are 1x1 blocks.

use ash::vk;
use glam::{UVec2, UVec3};
use serde::{Deserialize, Serialize};

/// Errors returned by format size queries.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("{0:?} is block compressed and has no per-pixel byte size")]
    BlockCompressed(Format),
    #[error("format is undefined")]
    Undefined,
}

/// The size of one compressed block, or of a single texel for uncompressed formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Number of texels covered by one block.
    pub extent: UVec2,
    /// Number of bytes per block.
    pub size: u32,
}

#[allow(non_camel_case_types)]
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
pub enum Format {
    #[default]
    UNDEFINED,

    R4G4_UNORM_PACK8,
    R4G4B4A4_UNORM_PACK16,
    B4G4R4A4_UNORM_PACK16,
    R5G6B5_UNORM_PACK16,
    B5G6R5_UNORM_PACK16,
    R5G5B5A1_UNORM_PACK16,
    B5G5R5A1_UNORM_PACK16,
    A1R5G5B5_UNORM_PACK16,

    R8_UNORM,
    R8_SNORM,
    R8_USCALED,
    R8_SSCALED,
    R8_UINT,
    R8_SINT,
    R8_SRGB,

    R8G8_UNORM,
    R8G8_SNORM,
    R8G8_USCALED,
    R8G8_SSCALED,
    R8G8_UINT,
    R8G8_SINT,
    R8G8_SRGB,

    R8G8B8_UNORM,
    R8G8B8_SNORM,
    R8G8B8_USCALED,
    R8G8B8_SSCALED,
    R8G8B8_UINT,
    R8G8B8_SINT,
    R8G8B8_SRGB,

    B8G8R8_UNORM,
    B8G8R8_SNORM,
    B8G8R8_USCALED,
    B8G8R8_SSCALED,
    B8G8R8_UINT,
    B8G8R8_SINT,
    B8G8R8_SRGB,

    R8G8B8A8_UNORM,
    R8G8B8A8_SNORM,
    R8G8B8A8_USCALED,
    R8G8B8A8_SSCALED,
    R8G8B8A8_UINT,
    R8G8B8A8_SINT,
    R8G8B8A8_SRGB,

    B8G8R8A8_UNORM,
    B8G8R8A8_SNORM,
    B8G8R8A8_USCALED,
    B8G8R8A8_SSCALED,
    B8G8R8A8_UINT,
    B8G8R8A8_SINT,
    B8G8R8A8_SRGB,

    A8B8G8R8_UNORM_PACK32,
    A8B8G8R8_SNORM_PACK32,
    A8B8G8R8_USCALED_PACK32,
    A8B8G8R8_SSCALED_PACK32,
    A8B8G8R8_UINT_PACK32,
    A8B8G8R8_SINT_PACK32,
    A8B8G8R8_SRGB_PACK32,

    A2R10G10B10_UNORM_PACK32,
    A2R10G10B10_SNORM_PACK32,
    A2R10G10B10_USCALED_PACK32,
    A2R10G10B10_SSCALED_PACK32,
    A2R10G10B10_UINT_PACK32,
    A2R10G10B10_SINT_PACK32,

    A2B10G10R10_UNORM_PACK32,
    A2B10G10R10_SNORM_PACK32,
    A2B10G10R10_USCALED_PACK32,
    A2B10G10R10_SSCALED_PACK32,
    A2B10G10R10_UINT_PACK32,
    A2B10G10R10_SINT_PACK32,

    R16_UNORM,
    R16_SNORM,
    R16_USCALED,
    R16_SSCALED,
    R16_UINT,
    R16_SINT,
    R16_SFLOAT,

    R16G16_UNORM,
    R16G16_SNORM,
    R16G16_USCALED,
    R16G16_SSCALED,
    R16G16_UINT,
    R16G16_SINT,
    R16G16_SFLOAT,

    R16G16B16_UNORM,
    R16G16B16_SNORM,
    R16G16B16_USCALED,
    R16G16B16_SSCALED,
    R16G16B16_UINT,
    R16G16B16_SINT,
    R16G16B16_SFLOAT,

    R16G16B16A16_UNORM,
    R16G16B16A16_SNORM,
    R16G16B16A16_USCALED,
    R16G16B16A16_SSCALED,
    R16G16B16A16_UINT,
    R16G16B16A16_SINT,
    R16G16B16A16_SFLOAT,

    R32_UINT,
    R32_SINT,
    R32_SFLOAT,

    R32G32_UINT,
    R32G32_SINT,
    R32G32_SFLOAT,

    R32G32B32_UINT,
    R32G32B32_SINT,
    R32G32B32_SFLOAT,

    R32G32B32A32_UINT,
    R32G32B32A32_SINT,
    R32G32B32A32_SFLOAT,

    R64_UINT,
    R64_SINT,
    R64_SFLOAT,
    R64G64_UINT,
    R64G64_SINT,
    R64G64_SFLOAT,
    R64G64B64_UINT,
    R64G64B64_SINT,
    R64G64B64_SFLOAT,
    R64G64B64A64_UINT,
    R64G64B64A64_SINT,
    R64G64B64A64_SFLOAT,

    B10G11R11_UFLOAT_PACK32,
    E5B9G9R9_UFLOAT_PACK32,

    D16_UNORM,

    X8_D24_UNORM_PACK32,

    D32_SFLOAT,
    S8_UINT,
    D16_UNORM_S8_UINT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,

    BC1_RGB_UNORM_BLOCK,
    BC1_RGB_SRGB_BLOCK,
    BC1_RGBA_UNORM_BLOCK,
    BC1_RGBA_SRGB_BLOCK,
    BC2_UNORM_BLOCK,
    BC2_SRGB_BLOCK,
    BC3_UNORM_BLOCK,
    BC3_SRGB_BLOCK,
    BC4_UNORM_BLOCK,
    BC4_SNORM_BLOCK,
    BC5_UNORM_BLOCK,
    BC5_SNORM_BLOCK,
    BC6H_UFLOAT_BLOCK,
    BC6H_SFLOAT_BLOCK,
    BC7_UNORM_BLOCK,
    BC7_SRGB_BLOCK,

    ETC2_R8G8B8_UNORM_BLOCK,
    ETC2_R8G8B8_SRGB_BLOCK,
    ETC2_R8G8B8A1_UNORM_BLOCK,
    ETC2_R8G8B8A1_SRGB_BLOCK,
    ETC2_R8G8B8A8_UNORM_BLOCK,
    ETC2_R8G8B8A8_SRGB_BLOCK,

    EAC_R11_UNORM_BLOCK,
    EAC_R11_SNORM_BLOCK,
    EAC_R11G11_UNORM_BLOCK,
    EAC_R11G11_SNORM_BLOCK,

    ASTC_4x4_UNORM_BLOCK,
    ASTC_4x4_SRGB_BLOCK,
    ASTC_5x4_UNORM_BLOCK,
    ASTC_5x4_SRGB_BLOCK,
    ASTC_5x5_UNORM_BLOCK,
    ASTC_5x5_SRGB_BLOCK,
    ASTC_6x5_UNORM_BLOCK,
    ASTC_6x5_SRGB_BLOCK,
    ASTC_6x6_UNORM_BLOCK,
    ASTC_6x6_SRGB_BLOCK,
    ASTC_8x5_UNORM_BLOCK,
    ASTC_8x5_SRGB_BLOCK,
    ASTC_8x6_UNORM_BLOCK,
    ASTC_8x6_SRGB_BLOCK,
    ASTC_8x8_UNORM_BLOCK,
    ASTC_8x8_SRGB_BLOCK,
    ASTC_10x5_UNORM_BLOCK,
    ASTC_10x5_SRGB_BLOCK,
    ASTC_10x6_UNORM_BLOCK,
    ASTC_10x6_SRGB_BLOCK,
    ASTC_10x8_UNORM_BLOCK,
    ASTC_10x8_SRGB_BLOCK,
    ASTC_10x10_UNORM_BLOCK,
    ASTC_10x10_SRGB_BLOCK,
    ASTC_12x10_UNORM_BLOCK,
    ASTC_12x10_SRGB_BLOCK,
    ASTC_12x12_UNORM_BLOCK,
    ASTC_12x12_SRGB_BLOCK,
}

impl Format {
    /// The last core format. Discriminants are contiguous from [`Format::UNDEFINED`] up to here.
    const LAST: Format = Format::ASTC_12x12_SRGB_BLOCK;

    /// Returns true for BC, ETC2, EAC and ASTC formats.
    pub fn is_block_compressed(&self) -> bool {
        (Format::BC1_RGB_UNORM_BLOCK as i32..=Format::LAST as i32).contains(&(*self as i32))
    }

    /// Returns the size in bytes of a single pixel.
    ///
    /// Block-compressed formats store texels in blocks and fail with
    /// [`FormatError::BlockCompressed`]; use [`Format::block`] for those.
    #[rustfmt::skip]
    pub fn pixel_byte_size(&self) -> Result<u32, FormatError> {
        use Format::*;
        if self.is_block_compressed() {
            return Err(FormatError::BlockCompressed(*self));
        }
        let size = match self {
            UNDEFINED => return Err(FormatError::Undefined),

            R4G4_UNORM_PACK8 => 1,
            R4G4B4A4_UNORM_PACK16 | B4G4R4A4_UNORM_PACK16 | R5G6B5_UNORM_PACK16
            | B5G6R5_UNORM_PACK16 | R5G5B5A1_UNORM_PACK16 | B5G5R5A1_UNORM_PACK16
            | A1R5G5B5_UNORM_PACK16 => 2,

            R8_UNORM | R8_SNORM | R8_USCALED | R8_SSCALED | R8_UINT | R8_SINT | R8_SRGB => 1,
            R8G8_UNORM | R8G8_SNORM | R8G8_USCALED | R8G8_SSCALED | R8G8_UINT | R8G8_SINT
            | R8G8_SRGB => 2,
            R8G8B8_UNORM | R8G8B8_SNORM | R8G8B8_USCALED | R8G8B8_SSCALED | R8G8B8_UINT
            | R8G8B8_SINT | R8G8B8_SRGB | B8G8R8_UNORM | B8G8R8_SNORM | B8G8R8_USCALED
            | B8G8R8_SSCALED | B8G8R8_UINT | B8G8R8_SINT | B8G8R8_SRGB => 3,
            R8G8B8A8_UNORM | R8G8B8A8_SNORM | R8G8B8A8_USCALED | R8G8B8A8_SSCALED
            | R8G8B8A8_UINT | R8G8B8A8_SINT | R8G8B8A8_SRGB | B8G8R8A8_UNORM | B8G8R8A8_SNORM
            | B8G8R8A8_USCALED | B8G8R8A8_SSCALED | B8G8R8A8_UINT | B8G8R8A8_SINT
            | B8G8R8A8_SRGB => 4,
            A8B8G8R8_UNORM_PACK32 | A8B8G8R8_SNORM_PACK32 | A8B8G8R8_USCALED_PACK32
            | A8B8G8R8_SSCALED_PACK32 | A8B8G8R8_UINT_PACK32 | A8B8G8R8_SINT_PACK32
            | A8B8G8R8_SRGB_PACK32 => 4,
            A2R10G10B10_UNORM_PACK32 | A2R10G10B10_SNORM_PACK32 | A2R10G10B10_USCALED_PACK32
            | A2R10G10B10_SSCALED_PACK32 | A2R10G10B10_UINT_PACK32 | A2R10G10B10_SINT_PACK32
            | A2B10G10R10_UNORM_PACK32 | A2B10G10R10_SNORM_PACK32 | A2B10G10R10_USCALED_PACK32
            | A2B10G10R10_SSCALED_PACK32 | A2B10G10R10_UINT_PACK32
            | A2B10G10R10_SINT_PACK32 => 4,

            R16_UNORM | R16_SNORM | R16_USCALED | R16_SSCALED | R16_UINT | R16_SINT
            | R16_SFLOAT => 2,
            R16G16_UNORM | R16G16_SNORM | R16G16_USCALED | R16G16_SSCALED | R16G16_UINT
            | R16G16_SINT | R16G16_SFLOAT => 4,
            R16G16B16_UNORM | R16G16B16_SNORM | R16G16B16_USCALED | R16G16B16_SSCALED
            | R16G16B16_UINT | R16G16B16_SINT | R16G16B16_SFLOAT => 6,
            R16G16B16A16_UNORM | R16G16B16A16_SNORM | R16G16B16A16_USCALED
            | R16G16B16A16_SSCALED | R16G16B16A16_UINT | R16G16B16A16_SINT
            | R16G16B16A16_SFLOAT => 8,

            R32_UINT | R32_SINT | R32_SFLOAT => 4,
            R32G32_UINT | R32G32_SINT | R32G32_SFLOAT => 8,
            R32G32B32_UINT | R32G32B32_SINT | R32G32B32_SFLOAT => 12,
            R32G32B32A32_UINT | R32G32B32A32_SINT | R32G32B32A32_SFLOAT => 16,

            R64_UINT | R64_SINT | R64_SFLOAT => 8,
            R64G64_UINT | R64G64_SINT | R64G64_SFLOAT => 16,
            R64G64B64_UINT | R64G64B64_SINT | R64G64B64_SFLOAT => 24,
            R64G64B64A64_UINT | R64G64B64A64_SINT | R64G64B64A64_SFLOAT => 32,

            B10G11R11_UFLOAT_PACK32 | E5B9G9R9_UFLOAT_PACK32 => 4,

            D16_UNORM => 2,
            X8_D24_UNORM_PACK32 | D32_SFLOAT => 4,
            S8_UINT => 1,
            D16_UNORM_S8_UINT => 3,
            D24_UNORM_S8_UINT => 4,
            D32_SFLOAT_S8_UINT => 5,

            // Compressed formats returned above.
            _ => unreachable!(),
        };
        Ok(size)
    }

    /// Returns the block footprint of the format.
    #[rustfmt::skip]
    pub fn block(&self) -> Result<BlockInfo, FormatError> {
        use Format::*;
        if !self.is_block_compressed() {
            return self.pixel_byte_size().map(|size| BlockInfo {
                extent: UVec2::ONE,
                size,
            });
        }
        let (x, y, size) = match self {
            BC1_RGB_UNORM_BLOCK | BC1_RGB_SRGB_BLOCK | BC1_RGBA_UNORM_BLOCK
            | BC1_RGBA_SRGB_BLOCK | BC4_UNORM_BLOCK | BC4_SNORM_BLOCK => (4, 4, 8),
            BC2_UNORM_BLOCK | BC2_SRGB_BLOCK | BC3_UNORM_BLOCK | BC3_SRGB_BLOCK
            | BC5_UNORM_BLOCK | BC5_SNORM_BLOCK | BC6H_UFLOAT_BLOCK | BC6H_SFLOAT_BLOCK
            | BC7_UNORM_BLOCK | BC7_SRGB_BLOCK => (4, 4, 16),

            ETC2_R8G8B8_UNORM_BLOCK | ETC2_R8G8B8_SRGB_BLOCK | ETC2_R8G8B8A1_UNORM_BLOCK
            | ETC2_R8G8B8A1_SRGB_BLOCK | EAC_R11_UNORM_BLOCK | EAC_R11_SNORM_BLOCK => (4, 4, 8),
            ETC2_R8G8B8A8_UNORM_BLOCK | ETC2_R8G8B8A8_SRGB_BLOCK | EAC_R11G11_UNORM_BLOCK
            | EAC_R11G11_SNORM_BLOCK => (4, 4, 16),

            ASTC_4x4_UNORM_BLOCK | ASTC_4x4_SRGB_BLOCK => (4, 4, 16),
            ASTC_5x4_UNORM_BLOCK | ASTC_5x4_SRGB_BLOCK => (5, 4, 16),
            ASTC_5x5_UNORM_BLOCK | ASTC_5x5_SRGB_BLOCK => (5, 5, 16),
            ASTC_6x5_UNORM_BLOCK | ASTC_6x5_SRGB_BLOCK => (6, 5, 16),
            ASTC_6x6_UNORM_BLOCK | ASTC_6x6_SRGB_BLOCK => (6, 6, 16),
            ASTC_8x5_UNORM_BLOCK | ASTC_8x5_SRGB_BLOCK => (8, 5, 16),
            ASTC_8x6_UNORM_BLOCK | ASTC_8x6_SRGB_BLOCK => (8, 6, 16),
            ASTC_8x8_UNORM_BLOCK | ASTC_8x8_SRGB_BLOCK => (8, 8, 16),
            ASTC_10x5_UNORM_BLOCK | ASTC_10x5_SRGB_BLOCK => (10, 5, 16),
            ASTC_10x6_UNORM_BLOCK | ASTC_10x6_SRGB_BLOCK => (10, 6, 16),
            ASTC_10x8_UNORM_BLOCK | ASTC_10x8_SRGB_BLOCK => (10, 8, 16),
            ASTC_10x10_UNORM_BLOCK | ASTC_10x10_SRGB_BLOCK => (10, 10, 16),
            ASTC_12x10_UNORM_BLOCK | ASTC_12x10_SRGB_BLOCK => (12, 10, 16),
            ASTC_12x12_UNORM_BLOCK | ASTC_12x12_SRGB_BLOCK => (12, 12, 16),
            _ => unreachable!(),
        };
        Ok(BlockInfo {
            extent: UVec2::new(x, y),
            size,
        })
    }

    /// Number of bytes needed to store one mip level of the given extent.
    ///
    /// Partial blocks at the edges round up to whole blocks.
    pub fn bytes_for_extent(&self, extent: UVec3) -> Result<u64, FormatError> {
        let block = self.block()?;
        let blocks_x = extent.x.max(1).div_ceil(block.extent.x) as u64;
        let blocks_y = extent.y.max(1).div_ceil(block.extent.y) as u64;
        Ok(blocks_x * blocks_y * extent.z.max(1) as u64 * block.size as u64)
    }

    /// Number of bytes needed to store the first `mip_levels` levels starting at `base_extent`.
    pub fn bytes_for_mip_chain(&self, base_extent: UVec3, mip_levels: u32) -> Result<u64, FormatError> {
        (0..mip_levels)
            .map(|level| self.bytes_for_extent(mip_extent(base_extent, level)))
            .sum()
    }

    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Format::D16_UNORM
                | Format::X8_D24_UNORM_PACK32
                | Format::D32_SFLOAT
                | Format::D16_UNORM_S8_UINT
                | Format::D24_UNORM_S8_UINT
                | Format::D32_SFLOAT_S8_UINT
        )
    }

    pub fn has_stencil(&self) -> bool {
        matches!(
            self,
            Format::S8_UINT
                | Format::D16_UNORM_S8_UINT
                | Format::D24_UNORM_S8_UINT
                | Format::D32_SFLOAT_S8_UINT
        )
    }

    /// Image aspects addressed by a full view of this format.
    pub fn aspects(&self) -> vk::ImageAspectFlags {
        let mut aspects = vk::ImageAspectFlags::empty();
        if self.is_depth() {
            aspects |= vk::ImageAspectFlags::DEPTH;
        }
        if self.has_stencil() {
            aspects |= vk::ImageAspectFlags::STENCIL;
        }
        if aspects.is_empty() {
            aspects = vk::ImageAspectFlags::COLOR;
        }
        aspects
    }

    pub fn is_srgb(&self) -> bool {
        matches!(
            self,
            Format::R8_SRGB
                | Format::R8G8_SRGB
                | Format::R8G8B8_SRGB
                | Format::B8G8R8_SRGB
                | Format::R8G8B8A8_SRGB
                | Format::B8G8R8A8_SRGB
                | Format::A8B8G8R8_SRGB_PACK32
                | Format::BC1_RGB_SRGB_BLOCK
                | Format::BC1_RGBA_SRGB_BLOCK
                | Format::BC2_SRGB_BLOCK
                | Format::BC3_SRGB_BLOCK
                | Format::BC7_SRGB_BLOCK
                | Format::ETC2_R8G8B8_SRGB_BLOCK
                | Format::ETC2_R8G8B8A1_SRGB_BLOCK
                | Format::ETC2_R8G8B8A8_SRGB_BLOCK
        ) || (self.is_astc() && (*self as i32 - Format::ASTC_4x4_UNORM_BLOCK as i32) % 2 == 1)
    }

    fn is_astc(&self) -> bool {
        (Format::ASTC_4x4_UNORM_BLOCK as i32..=Format::LAST as i32).contains(&(*self as i32))
    }
}

/// Extent of mip `level` for a texture whose level 0 is `base`, halving each axis and
/// flooring at one texel.
pub fn mip_extent(base: UVec3, level: u32) -> UVec3 {
    UVec3::new(
        base.x.checked_shr(level).unwrap_or(0).max(1),
        base.y.checked_shr(level).unwrap_or(0).max(1),
        base.z.checked_shr(level).unwrap_or(0).max(1),
    )
}

impl From<Format> for vk::Format {
    fn from(value: Format) -> Self {
        vk::Format::from_raw(value as i32)
    }
}

impl From<vk::Format> for Format {
    /// Formats outside the core range map to [`Format::UNDEFINED`].
    fn from(value: vk::Format) -> Self {
        let raw = value.as_raw();
        if (0..=Format::LAST as i32).contains(&raw) {
            // Safety: `Format` is `repr(i32)` with contiguous discriminants from 0 to `LAST`.
            unsafe { std::mem::transmute::<i32, Format>(raw) }
        } else {
            Format::UNDEFINED
        }
    }
}

//! Textures: GPU images with a full view.
//!
//! A [`Texture`] is created from a [`TextureInfo`] and owns three things: the
//! image, its VMA allocation, and a view covering every mip level and array layer.
//! Cubemaps are 2D images created with `CUBE_COMPATIBLE`, six layers per cube.

use ash::vk;
use bitflags::bitflags;
use glam::UVec3;
use serde::{Deserialize, Serialize};
use vk_mem::Alloc;

use crate::{
    Allocator, HasDevice,
    utils::{AsVkHandle, format::Format},
};

/// Mip count meaning "the full chain down to 1x1".
pub const ALL_MIPS: u32 = 0;

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureType {
    #[default]
    Texture2D,
    Texture3D,
    TextureCube,
}

impl TextureType {
    pub fn image_type(self) -> vk::ImageType {
        match self {
            TextureType::Texture2D | TextureType::TextureCube => vk::ImageType::TYPE_2D,
            TextureType::Texture3D => vk::ImageType::TYPE_3D,
        }
    }

    /// View type of a view covering all `layers` of a texture of this type.
    pub fn view_type(self, layers: u32) -> vk::ImageViewType {
        match self {
            TextureType::Texture2D if layers > 1 => vk::ImageViewType::TYPE_2D_ARRAY,
            TextureType::Texture2D => vk::ImageViewType::TYPE_2D,
            TextureType::Texture3D => vk::ImageViewType::TYPE_3D,
            TextureType::TextureCube if layers > 6 => vk::ImageViewType::CUBE_ARRAY,
            TextureType::TextureCube => vk::ImageViewType::CUBE,
        }
    }
}

/// Number of samples per texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleCount {
    #[default]
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
}

impl From<SampleCount> for vk::SampleCountFlags {
    fn from(samples: SampleCount) -> Self {
        match samples {
            SampleCount::X1 => vk::SampleCountFlags::TYPE_1,
            SampleCount::X2 => vk::SampleCountFlags::TYPE_2,
            SampleCount::X4 => vk::SampleCountFlags::TYPE_4,
            SampleCount::X8 => vk::SampleCountFlags::TYPE_8,
            SampleCount::X16 => vk::SampleCountFlags::TYPE_16,
            SampleCount::X32 => vk::SampleCountFlags::TYPE_32,
            SampleCount::X64 => vk::SampleCountFlags::TYPE_64,
        }
    }
}

bitflags! {
    /// How a texture is going to be used by the GPU.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TextureFlags: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

impl From<TextureFlags> for vk::ImageUsageFlags {
    fn from(flags: TextureFlags) -> Self {
        const TABLE: [(TextureFlags, vk::ImageUsageFlags); 6] = [
            (TextureFlags::COPY_SRC, vk::ImageUsageFlags::TRANSFER_SRC),
            (TextureFlags::COPY_DST, vk::ImageUsageFlags::TRANSFER_DST),
            (TextureFlags::SAMPLED, vk::ImageUsageFlags::SAMPLED),
            (TextureFlags::STORAGE, vk::ImageUsageFlags::STORAGE),
            (TextureFlags::COLOR_ATTACHMENT, vk::ImageUsageFlags::COLOR_ATTACHMENT),
            (
                TextureFlags::DEPTH_STENCIL_ATTACHMENT,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ),
        ];
        TABLE
            .iter()
            .filter(|(flag, _)| flags.contains(*flag))
            .fold(vk::ImageUsageFlags::empty(), |acc, (_, usage)| acc | *usage)
    }
}

/// Invalid combinations in a [`TextureInfo`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextureInfoError {
    #[error("texture `{0}` has a zero extent")]
    ZeroExtent(String),
    #[error("texture `{0}` has an undefined format")]
    UndefinedFormat(String),
    #[error("cube texture `{name}` needs depth 1 and a multiple of 6 layers, got depth {depth} and {layers} layers")]
    InvalidCube { name: String, depth: u32, layers: u32 },
    #[error("3D texture `{name}` cannot have {layers} layers")]
    LayeredVolume { name: String, layers: u32 },
    #[error("texture `{name}` requests {requested} mips but its extent allows at most {max}")]
    TooManyMips { name: String, requested: u32, max: u32 },
}

/// Creation parameters of a [`Texture`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureInfo {
    pub name: String,
    pub ty: TextureType,
    pub format: Format,
    pub samples: SampleCount,
    pub flags: TextureFlags,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Array layers. Cubes count six layers per cube.
    pub layers: u32,
    /// Mip levels, or [`ALL_MIPS`] for the full chain.
    pub mips: u32,
}

impl Default for TextureInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            ty: TextureType::Texture2D,
            format: Format::R8G8B8A8_UNORM,
            samples: SampleCount::X1,
            flags: TextureFlags::SAMPLED | TextureFlags::COPY_DST,
            width: 1,
            height: 1,
            depth: 1,
            layers: 1,
            mips: 1,
        }
    }
}

/// Length of the full mip chain of an extent: `floor(log2(max(w, h, d))) + 1`.
pub fn full_mip_chain_length(extent: UVec3) -> u32 {
    let largest = extent.max_element().max(1);
    u32::BITS - largest.leading_zeros()
}

impl TextureInfo {
    pub fn extent(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
    }

    /// Resolves [`ALL_MIPS`] into a concrete mip count.
    pub fn mip_level_count(&self) -> u32 {
        if self.mips == ALL_MIPS {
            full_mip_chain_length(self.extent())
        } else {
            self.mips
        }
    }

    pub fn validate(&self) -> Result<(), TextureInfoError> {
        if self.width == 0 || self.height == 0 || self.depth == 0 || self.layers == 0 {
            return Err(TextureInfoError::ZeroExtent(self.name.clone()));
        }
        if self.format == Format::UNDEFINED {
            return Err(TextureInfoError::UndefinedFormat(self.name.clone()));
        }
        match self.ty {
            TextureType::TextureCube if self.depth != 1 || self.layers % 6 != 0 => {
                return Err(TextureInfoError::InvalidCube {
                    name: self.name.clone(),
                    depth: self.depth,
                    layers: self.layers,
                });
            }
            TextureType::Texture3D if self.layers != 1 => {
                return Err(TextureInfoError::LayeredVolume {
                    name: self.name.clone(),
                    layers: self.layers,
                });
            }
            _ => {}
        }
        let max = full_mip_chain_length(self.extent());
        if self.mip_level_count() > max {
            return Err(TextureInfoError::TooManyMips {
                name: self.name.clone(),
                requested: self.mips,
                max,
            });
        }
        Ok(())
    }

    pub fn image_create_flags(&self) -> vk::ImageCreateFlags {
        // 2D arrays need no flag; TYPE_2D_ARRAY_COMPATIBLE is only valid on 3D images.
        if self.ty == TextureType::TextureCube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        }
    }

    pub fn to_image_create_info(&self) -> vk::ImageCreateInfo<'static> {
        vk::ImageCreateInfo::default()
            .flags(self.image_create_flags())
            .image_type(self.ty.image_type())
            .format(self.format.into())
            .extent(vk::Extent3D {
                width: self.width,
                height: self.height,
                depth: self.depth,
            })
            .mip_levels(self.mip_level_count())
            .array_layers(self.layers)
            .samples(self.samples.into())
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.flags.into())
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }

    pub fn full_subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.format.aspects(),
            base_mip_level: 0,
            level_count: self.mip_level_count(),
            base_array_layer: 0,
            layer_count: self.layers,
        }
    }
}

/// Errors from [`Texture::new`].
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error(transparent)]
    InvalidInfo(#[from] TextureInfoError),
    #[error(transparent)]
    Vulkan(#[from] vk::Result),
}

/// A GPU-only image with a view covering the whole resource.
pub struct Texture {
    allocator: Allocator,
    handle: vk::Image,
    view: vk::ImageView,
    allocation: vk_mem::Allocation,
    info: TextureInfo,
}
unsafe impl Send for Texture {}
unsafe impl Sync for Texture {}
impl Drop for Texture {
    fn drop(&mut self) {
        tracing::debug!(component = "texture", "texture `{}` destroyed", self.info.name);
        unsafe {
            self.allocator.device().destroy_image_view(self.view, None);
            self.allocator
                .destroy_image(self.handle, &mut self.allocation);
        }
    }
}
impl HasDevice for Texture {
    fn device(&self) -> &crate::Device {
        self.allocator.device()
    }
}
impl AsVkHandle for Texture {
    type Handle = vk::Image;
    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}
impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Texture {
    /// Creates a device-local texture with optimal tiling and its full view.
    pub fn new(allocator: Allocator, info: &TextureInfo) -> Result<Self, TextureError> {
        info.validate()?;
        let mut info = info.clone();
        info.mips = info.mip_level_count();
        let (image, mut allocation) = unsafe {
            allocator.create_image(
                &info.to_image_create_info(),
                &vk_mem::AllocationCreateInfo {
                    usage: vk_mem::MemoryUsage::AutoPreferDevice,
                    ..Default::default()
                },
            )?
        };
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(info.ty.view_type(info.layers))
            .format(info.format.into())
            .subresource_range(info.full_subresource_range());
        let view = match unsafe { allocator.device().create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(err) => {
                unsafe { allocator.destroy_image(image, &mut allocation) };
                return Err(err.into());
            }
        };
        let device = allocator.device();
        device.set_debug_name(image, &info.name);
        device.set_debug_name(view, &info.name);
        tracing::info!(
            component = "texture",
            width = info.width,
            height = info.height,
            depth = info.depth,
            layers = info.layers,
            mips = info.mips,
            format = ?info.format,
            "texture `{}` created",
            info.name
        );
        Ok(Self {
            allocator,
            handle: image,
            view,
            allocation,
            info,
        })
    }

    /// The creation parameters, with the mip count resolved.
    pub fn info(&self) -> &TextureInfo {
        &self.info
    }
    pub fn name(&self) -> &str {
        &self.info.name
    }
    pub fn extent(&self) -> UVec3 {
        self.info.extent()
    }
    pub fn format(&self) -> Format {
        self.info.format
    }
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        let info = TextureInfo {
            width: 1024,
            height: 512,
            mips: ALL_MIPS,
            ..Default::default()
        };
        assert_eq!(info.mip_level_count(), 11, "1024 -> 1 is eleven levels");

        let info = TextureInfo {
            width: 300,
            height: 7,
            depth: 1,
            mips: ALL_MIPS,
            ..Default::default()
        };
        assert_eq!(info.mip_level_count(), 9, "floor(log2(300)) + 1");

        let info = TextureInfo {
            ty: TextureType::Texture3D,
            width: 4,
            height: 4,
            depth: 64,
            mips: ALL_MIPS,
            ..Default::default()
        };
        assert_eq!(info.mip_level_count(), 7, "depth counts for 3D textures");

        assert_eq!(full_mip_chain_length(UVec3::ONE), 1);
        assert_eq!(
            TextureInfo {
                mips: 3,
                width: 64,
                height: 64,
                ..Default::default()
            }
            .mip_level_count(),
            3,
            "explicit mip counts are kept"
        );
    }

    #[test]
    fn test_image_create_flags() {
        let cube = TextureInfo {
            ty: TextureType::TextureCube,
            layers: 6,
            ..Default::default()
        };
        let info = cube.to_image_create_info();
        assert_eq!(info.image_type, vk::ImageType::TYPE_2D, "cubes are 2D images");
        assert!(info.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE));
        assert_eq!(info.array_layers, 6);
        assert_eq!(info.tiling, vk::ImageTiling::OPTIMAL);

        let array = TextureInfo {
            layers: 4,
            ..Default::default()
        };
        assert_eq!(array.image_create_flags(), vk::ImageCreateFlags::empty());
        assert_eq!(array.ty.view_type(array.layers), vk::ImageViewType::TYPE_2D_ARRAY);
        assert_eq!(TextureInfo::default().image_create_flags(), vk::ImageCreateFlags::empty());
        assert_eq!(
            TextureType::TextureCube.view_type(12),
            vk::ImageViewType::CUBE_ARRAY
        );
    }

    #[test]
    fn test_validate() {
        let bad_cube = TextureInfo {
            name: "sky".into(),
            ty: TextureType::TextureCube,
            layers: 4,
            ..Default::default()
        };
        assert!(matches!(
            bad_cube.validate(),
            Err(TextureInfoError::InvalidCube { layers: 4, .. })
        ));
        let layered_volume = TextureInfo {
            ty: TextureType::Texture3D,
            layers: 2,
            ..Default::default()
        };
        assert!(matches!(
            layered_volume.validate(),
            Err(TextureInfoError::LayeredVolume { layers: 2, .. })
        ));
        let too_many_mips = TextureInfo {
            width: 8,
            height: 8,
            mips: 5,
            ..Default::default()
        };
        assert!(matches!(
            too_many_mips.validate(),
            Err(TextureInfoError::TooManyMips { max: 4, .. })
        ));
        assert!(TextureInfo::default().validate().is_ok());
    }

    #[test]
    fn test_usage_and_aspects() {
        let depth = TextureInfo {
            format: Format::D24_UNORM_S8_UINT,
            flags: TextureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        };
        assert_eq!(
            depth.to_image_create_info().usage,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        );
        assert_eq!(
            depth.full_subresource_range().aspect_mask,
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            vk::SampleCountFlags::from(SampleCount::X8),
            vk::SampleCountFlags::TYPE_8
        );
    }
}

//! Vulkan sampler management.
//!
//! Samplers define how textures are sampled, including filtering modes,
//! address wrapping, and mipmap selection. They are immutable after creation.

use crate::{Device, HasDevice, utils::AsVkHandle};
use ash::{prelude::VkResult, vk};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
    MirrorClampToEdge,
}

/// Depth comparison. [`CompareOp::Never`] disables comparison entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompareOp {
    #[default]
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BorderColor {
    FloatTransparentBlack,
    IntTransparentBlack,
    #[default]
    FloatOpaqueBlack,
    IntOpaqueBlack,
    FloatOpaqueWhite,
    IntOpaqueWhite,
}

impl From<Filter> for vk::Filter {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => vk::Filter::NEAREST,
            Filter::Linear => vk::Filter::LINEAR,
        }
    }
}

impl From<Filter> for vk::SamplerMipmapMode {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
            Filter::Linear => vk::SamplerMipmapMode::LINEAR,
        }
    }
}

impl From<AddressMode> for vk::SamplerAddressMode {
    fn from(mode: AddressMode) -> Self {
        match mode {
            AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
            AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
            AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
            AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
            AddressMode::MirrorClampToEdge => vk::SamplerAddressMode::MIRROR_CLAMP_TO_EDGE,
        }
    }
}

impl From<CompareOp> for vk::CompareOp {
    fn from(op: CompareOp) -> Self {
        match op {
            CompareOp::Never => vk::CompareOp::NEVER,
            CompareOp::Less => vk::CompareOp::LESS,
            CompareOp::Equal => vk::CompareOp::EQUAL,
            CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareOp::Greater => vk::CompareOp::GREATER,
            CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
            CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
            CompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

impl From<BorderColor> for vk::BorderColor {
    fn from(color: BorderColor) -> Self {
        match color {
            BorderColor::FloatTransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
            BorderColor::IntTransparentBlack => vk::BorderColor::INT_TRANSPARENT_BLACK,
            BorderColor::FloatOpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
            BorderColor::IntOpaqueBlack => vk::BorderColor::INT_OPAQUE_BLACK,
            BorderColor::FloatOpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
            BorderColor::IntOpaqueWhite => vk::BorderColor::INT_OPAQUE_WHITE,
        }
    }
}

/// Creation parameters of a [`Sampler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerInfo {
    pub name: String,
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: Filter,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mip_lod_bias: f32,
    pub anisotropy_enable: bool,
    pub max_anisotropy: f32,
    pub compare_op: CompareOp,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: BorderColor,
}

impl Default for SamplerInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            mag_filter: Filter::Nearest,
            min_filter: Filter::Nearest,
            mipmap_mode: Filter::Nearest,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mip_lod_bias: 0.0,
            anisotropy_enable: true,
            max_anisotropy: 1.0,
            compare_op: CompareOp::Never,
            min_lod: 0.0,
            max_lod: f32::MAX,
            border_color: BorderColor::FloatOpaqueBlack,
        }
    }
}

impl SamplerInfo {
    pub fn to_vk(&self) -> vk::SamplerCreateInfo<'static> {
        vk::SamplerCreateInfo::default()
            .mag_filter(self.mag_filter.into())
            .min_filter(self.min_filter.into())
            .mipmap_mode(self.mipmap_mode.into())
            .address_mode_u(self.address_mode_u.into())
            .address_mode_v(self.address_mode_v.into())
            .address_mode_w(self.address_mode_w.into())
            .mip_lod_bias(self.mip_lod_bias)
            .anisotropy_enable(self.anisotropy_enable)
            .max_anisotropy(self.max_anisotropy)
            .compare_enable(self.compare_op != CompareOp::Never)
            .compare_op(self.compare_op.into())
            .min_lod(self.min_lod)
            .max_lod(self.max_lod)
            .border_color(self.border_color.into())
            .unnormalized_coordinates(false)
    }
}

/// A Vulkan sampler for texture filtering.
pub struct Sampler {
    device: Device,
    handle: vk::Sampler,
    name: String,
}
impl Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}
impl HasDevice for Sampler {
    fn device(&self) -> &Device {
        &self.device
    }
}

impl Sampler {
    /// Creates a new sampler.
    ///
    /// Anisotropy is silently disabled when the device does not support
    /// `samplerAnisotropy`.
    pub fn new(device: Device, info: &SamplerInfo) -> VkResult<Self> {
        let mut create_info = info.to_vk();
        let features = unsafe {
            device
                .instance()
                .get_physical_device_features(device.physical_device().vk_handle())
        };
        if features.sampler_anisotropy == vk::FALSE {
            create_info.anisotropy_enable = vk::FALSE;
        }
        let handle = unsafe { device.create_sampler(&create_info, None) }?;
        device.set_debug_name(handle, &info.name);
        tracing::info!(component = "sampler", "sampler `{}` created", info.name);
        Ok(Self {
            device,
            handle,
            name: info.name.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl AsVkHandle for Sampler {
    type Handle = vk::Sampler;

    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}
impl Drop for Sampler {
    fn drop(&mut self) {
        tracing::debug!(component = "sampler", "sampler `{}` destroyed", self.name);
        unsafe { self.device.destroy_sampler(self.handle, None) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sampler() {
        let info = SamplerInfo::default().to_vk();
        assert_eq!(info.mag_filter, vk::Filter::NEAREST);
        assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::NEAREST);
        assert_eq!(info.address_mode_w, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.anisotropy_enable, vk::TRUE);
        assert_eq!(info.max_anisotropy, 1.0);
        assert_eq!(info.compare_enable, vk::FALSE, "NEVER disables comparison");
        assert_eq!(info.max_lod, f32::MAX);
        assert_eq!(info.border_color, vk::BorderColor::FLOAT_OPAQUE_BLACK);
        assert_eq!(info.unnormalized_coordinates, vk::FALSE);
    }

    #[test]
    fn test_shadow_sampler() {
        let info = SamplerInfo {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            address_mode_u: AddressMode::ClampToBorder,
            compare_op: CompareOp::LessOrEqual,
            border_color: BorderColor::FloatOpaqueWhite,
            ..Default::default()
        }
        .to_vk();
        assert_eq!(info.compare_enable, vk::TRUE);
        assert_eq!(info.compare_op, vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(info.min_filter, vk::Filter::LINEAR);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_BORDER);
        assert_eq!(info.address_mode_v, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.border_color, vk::BorderColor::FLOAT_OPAQUE_WHITE);
    }
}

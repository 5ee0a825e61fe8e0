//! Swapchain creation and recreation.
//!
//! The selection rules are plain functions over the surface queries so they
//! can be checked without a display:
//!
//! - [`select_present_mode`]: MAILBOX, then IMMEDIATE, then FIFO.
//! - [`select_image_count`]: as many images as the surface allows.
//! - [`select_surface_format`]: RGBA8 or BGRA8 UNORM when offered.
//! - [`select_extent`]: the requested size limited by the surface.

use ash::{prelude::VkResult, vk};
use smallvec::SmallVec;
use std::fmt::Debug;

use crate::{Device, HasDevice, surface::Surface, utils::AsVkHandle};

/// Image count used when the surface reports no upper bound.
pub const UNBOUNDED_IMAGE_COUNT: u32 = 4;

/// Sentinel extent meaning the surface size is decided by the swapchain.
const UNDEFINED_EXTENT: u32 = 0xFFFF_FFFF;

pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = if capabilities.max_image_count > 0 {
        capabilities.max_image_count
    } else {
        UNBOUNDED_IMAGE_COUNT
    };
    count.max(capabilities.min_image_count)
}

/// Returns `None` only when the surface reports no formats at all.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|f| matches!(f.format, vk::Format::R8G8B8A8_UNORM | vk::Format::B8G8R8A8_UNORM))
        .or_else(|| available.first())
        .copied()
}

pub fn select_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    let max = capabilities.max_image_extent;
    let mut extent = vk::Extent2D { width, height };
    if max.width != UNDEFINED_EXTENT && max.height != UNDEFINED_EXTENT {
        extent.width = extent.width.min(max.width);
        extent.height = extent.height.min(max.height);
    }
    vk::Extent2D {
        width: extent.width.max(1),
        height: extent.height.max(1),
    }
}

pub struct Swapchain {
    device: Device,
    surface: Surface,
    handle: vk::SwapchainKHR,
    images: SmallVec<[vk::Image; 4]>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    name: String,
}

impl Swapchain {
    /// Creates a swapchain covering `width x height` of the surface.
    ///
    /// Fails with `ERROR_EXTENSION_NOT_PRESENT` when the device was created
    /// without `VK_KHR_swapchain`.
    pub fn new(
        device: Device,
        surface: Surface,
        name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> VkResult<Self> {
        let mut swapchain = Self {
            device,
            surface,
            handle: vk::SwapchainKHR::null(),
            images: SmallVec::new(),
            format: vk::SurfaceFormatKHR::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D::default(),
            name: name.into(),
        };
        swapchain.recreate(width, height)?;
        Ok(swapchain)
    }

    /// Rebuilds the image chain, typically after a resize.
    ///
    /// The previous swapchain is handed to the driver and destroyed only once
    /// the new one exists. On failure the previous swapchain is kept.
    pub fn recreate(&mut self, width: u32, height: u32) -> VkResult<()> {
        let loader = self
            .device
            .swapchain_loader()
            .ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)?;
        let pdevice = self.device.physical_device();
        let present_modes = self.surface.present_modes(pdevice)?;
        let capabilities = self.surface.capabilities(pdevice)?;
        let formats = self.surface.formats(pdevice)?;

        let present_mode = select_present_mode(&present_modes);
        let image_count = select_image_count(&capabilities);
        let format = select_surface_format(&formats).ok_or(vk::Result::ERROR_FORMAT_NOT_SUPPORTED)?;
        let extent = select_extent(&capabilities, width, height);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface.vk_handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(self.handle);
        let handle = unsafe { loader.create_swapchain(&create_info, None)? };
        let old = std::mem::replace(&mut self.handle, handle);
        if old != vk::SwapchainKHR::null() {
            unsafe { loader.destroy_swapchain(old, None) };
        }
        self.images = unsafe { loader.get_swapchain_images(handle)? }.into();
        self.format = format;
        self.present_mode = present_mode;
        self.extent = extent;
        self.device.set_debug_name(handle, &self.name);

        tracing::info!(
            component = "swapchain",
            width = extent.width,
            height = extent.height,
            format = ?format.format,
            present_mode = ?present_mode,
            images = self.images.len(),
            "swapchain `{}` created",
            self.name
        );
        Ok(())
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }
}

impl Debug for Swapchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swapchain")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("extent", &self.extent)
            .field("format", &self.format.format)
            .field("present_mode", &self.present_mode)
            .finish()
    }
}

impl HasDevice for Swapchain {
    fn device(&self) -> &Device {
        &self.device
    }
}

impl AsVkHandle for Swapchain {
    type Handle = vk::SwapchainKHR;

    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        if let Some(loader) = self.device.swapchain_loader() {
            unsafe { loader.destroy_swapchain(self.handle, None) };
        }
        tracing::info!(component = "swapchain", "swapchain `{}` destroyed", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min: u32, max: u32, max_extent: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            max_image_extent: vk::Extent2D {
                width: max_extent.0,
                height: max_extent.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_present_mode_preference() {
        use vk::PresentModeKHR as P;
        assert_eq!(select_present_mode(&[P::FIFO, P::IMMEDIATE, P::MAILBOX]), P::MAILBOX);
        assert_eq!(select_present_mode(&[P::FIFO, P::IMMEDIATE]), P::IMMEDIATE);
        assert_eq!(select_present_mode(&[P::FIFO_RELAXED, P::FIFO]), P::FIFO);
        assert_eq!(select_present_mode(&[]), P::FIFO, "FIFO is always supported");
    }

    #[test]
    fn test_image_count() {
        assert_eq!(select_image_count(&capabilities(2, 3, (0, 0))), 3);
        assert_eq!(
            select_image_count(&capabilities(2, 0, (0, 0))),
            UNBOUNDED_IMAGE_COUNT,
            "zero means no upper bound"
        );
        assert_eq!(select_image_count(&capabilities(5, 0, (0, 0))), 5, "never below the minimum");
    }

    #[test]
    fn test_surface_format() {
        let format = |format| vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(
            select_surface_format(&[
                format(vk::Format::A2B10G10R10_UNORM_PACK32),
                format(vk::Format::B8G8R8A8_UNORM),
            ])
            .map(|f| f.format),
            Some(vk::Format::B8G8R8A8_UNORM)
        );
        assert_eq!(
            select_surface_format(&[
                format(vk::Format::B8G8R8A8_SRGB),
                format(vk::Format::A2B10G10R10_UNORM_PACK32),
            ])
            .map(|f| f.format),
            Some(vk::Format::B8G8R8A8_SRGB),
            "falls back to the first format"
        );
        assert!(select_surface_format(&[]).is_none());
    }

    #[test]
    fn test_extent_sentinel_floors_at_one() {
        let caps = capabilities(1, 0, (UNDEFINED_EXTENT, UNDEFINED_EXTENT));
        let extent = select_extent(&caps, 0, 0);
        assert_eq!((extent.width, extent.height), (1, 1));

        let extent = select_extent(&caps, 5000, 3000);
        assert_eq!((extent.width, extent.height), (5000, 3000));
    }

    #[test]
    fn test_extent_clamped_to_max() {
        let caps = capabilities(1, 0, (800, 600));
        let extent = select_extent(&caps, 1920, 1080);
        assert_eq!((extent.width, extent.height), (800, 600));

        let extent = select_extent(&caps, 640, 480);
        assert_eq!((extent.width, extent.height), (640, 480));
    }
}

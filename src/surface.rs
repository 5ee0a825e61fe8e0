//! Presentation surfaces created from raw window handles.

use crate::{Instance, physical_device::PhysicalDevice, utils::AsVkHandle};
use ash::{prelude::VkResult, khr, vk};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle,
    RawWindowHandle, WindowHandle,
};
use std::{fmt::Debug, sync::Arc};

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("window handle unavailable: {0}")]
    Handle(#[from] HandleError),
    #[error("unsupported windowing platform")]
    UnsupportedPlatform,
    #[error("vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

#[derive(Clone)]
pub struct Surface(Arc<SurfaceInner>);
struct SurfaceInner {
    loader: khr::surface::Instance,
    handle: vk::SurfaceKHR,
    // Destroyed before the instance it was created from.
    _instance: Instance,
}
impl Drop for SurfaceInner {
    fn drop(&mut self) {
        tracing::debug!(component = "surface", "surface destroyed");
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
    }
}
impl Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Surface").field(&self.0.handle).finish()
    }
}
impl Surface {
    /// Creates a surface for the window. The instance must have been created with
    /// `VK_KHR_surface` and the platform surface extension enabled.
    pub fn create(
        instance: Instance,
        window: &(impl HasWindowHandle + HasDisplayHandle),
    ) -> Result<Surface, SurfaceError> {
        let loader = instance
            .surface_loader()
            .cloned()
            .ok_or(vk::Result::ERROR_EXTENSION_NOT_PRESENT)?;
        let handle =
            unsafe { create_surface(&instance, window.display_handle()?, window.window_handle()?)? };
        tracing::debug!(component = "surface", "surface created");
        Ok(Surface(Arc::new(SurfaceInner {
            loader,
            handle,
            _instance: instance,
        })))
    }

    pub fn capabilities(&self, pdevice: &PhysicalDevice) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.0
                .loader
                .get_physical_device_surface_capabilities(pdevice.vk_handle(), self.0.handle)
        }
    }

    pub fn formats(&self, pdevice: &PhysicalDevice) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.0
                .loader
                .get_physical_device_surface_formats(pdevice.vk_handle(), self.0.handle)
        }
    }

    pub fn present_modes(&self, pdevice: &PhysicalDevice) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.0
                .loader
                .get_physical_device_surface_present_modes(pdevice.vk_handle(), self.0.handle)
        }
    }

    pub fn supports_queue_family(
        &self,
        pdevice: &PhysicalDevice,
        queue_family_index: u32,
    ) -> VkResult<bool> {
        unsafe {
            self.0.loader.get_physical_device_surface_support(
                pdevice.vk_handle(),
                queue_family_index,
                self.0.handle,
            )
        }
    }

    /// Current size of the surface as reported by the driver.
    ///
    /// Some platforms report `0xFFFFFFFF` on both axes, meaning the size is
    /// decided by the swapchain.
    pub fn current_extent(&self, pdevice: &PhysicalDevice) -> VkResult<vk::Extent2D> {
        self.capabilities(pdevice).map(|caps| caps.current_extent)
    }
}
impl AsVkHandle for Surface {
    type Handle = vk::SurfaceKHR;
    fn vk_handle(&self) -> Self::Handle {
        self.0.handle
    }
}

unsafe fn create_surface(
    instance: &Instance,
    display_handle: DisplayHandle,
    window_handle: WindowHandle,
) -> Result<vk::SurfaceKHR, SurfaceError> {
    let entry = instance.entry();
    let raw: &ash::Instance = instance;
    let surface = match (display_handle.as_raw(), window_handle.as_raw()) {
        (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(window)) => {
            let info = vk::Win32SurfaceCreateInfoKHR::default()
                .hinstance(window.hinstance.map_or(0, |h| h.get()) as vk::HINSTANCE)
                .hwnd(window.hwnd.get() as vk::HWND);
            unsafe { khr::win32_surface::Instance::new(entry, raw).create_win32_surface(&info, None) }
        }

        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(window)) => {
            let info = vk::WaylandSurfaceCreateInfoKHR::default()
                .display(display.display.as_ptr().cast())
                .surface(window.surface.as_ptr().cast());
            unsafe {
                khr::wayland_surface::Instance::new(entry, raw).create_wayland_surface(&info, None)
            }
        }

        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(window)) => {
            let dpy = display.display.ok_or(SurfaceError::UnsupportedPlatform)?;
            let info = vk::XlibSurfaceCreateInfoKHR::default()
                .dpy(dpy.as_ptr().cast())
                .window(window.window);
            unsafe { khr::xlib_surface::Instance::new(entry, raw).create_xlib_surface(&info, None) }
        }

        (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(window)) => {
            let connection = display.connection.ok_or(SurfaceError::UnsupportedPlatform)?;
            let info = vk::XcbSurfaceCreateInfoKHR::default()
                .connection(connection.as_ptr().cast())
                .window(window.window.get());
            unsafe { khr::xcb_surface::Instance::new(entry, raw).create_xcb_surface(&info, None) }
        }

        (RawDisplayHandle::Android(_), RawWindowHandle::AndroidNdk(window)) => {
            let info =
                vk::AndroidSurfaceCreateInfoKHR::default().window(window.a_native_window.as_ptr().cast());
            unsafe {
                khr::android_surface::Instance::new(entry, raw).create_android_surface(&info, None)
            }
        }

        _ => return Err(SurfaceError::UnsupportedPlatform),
    };
    Ok(surface?)
}

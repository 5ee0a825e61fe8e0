//! Logical device creation and management.
//!
//! This module provides the core [`Device`] type and [`DeviceBuilder`] for creating
//! and configuring Vulkan logical devices.
//!
//! - [`Device`]: The main device handle, reference-counted for cheap sharing
//! - [`DeviceBuilder`]: Builder for configuring extensions, features and queues
//! - [`HasDevice`]: Trait for types associated with a device
//!
//! Most applications never touch the builder directly: [`Context::new`](crate::Context::new)
//! drives it with the queue partition and the feature set the facade needs.

use crate::{
    Instance, MissingExtensionError,
    physical_device::{PhysicalDevice, SupportedFeatures},
    queue::{DeviceQueues, Queue, QueueLocation},
    utils::{AsVkHandle, Version},
};
use ash::{prelude::VkResult, ext, khr, vk};

use std::{
    collections::BTreeSet,
    ffi::{CStr, CString},
    fmt::Debug,
    ops::Deref,
    sync::Arc,
};

/// A trait for types created from a Vulkan device.
pub trait HasDevice {
    /// Returns a reference to the Vulkan device.
    fn device(&self) -> &Device;

    /// Returns a reference to the Vulkan [`PhysicalDevice`].
    ///
    /// This is a convenience method that delegates to `self.device().physical_device()`.
    fn physical_device(&self) -> &PhysicalDevice {
        self.device().physical_device()
    }

    /// Returns a reference to the Vulkan [`Instance`].
    ///
    /// This is a convenience method that delegates to `self.device().physical_device().instance()`.
    fn instance(&self) -> &Instance {
        self.device().physical_device().instance()
    }
}

/// A Vulkan logical device wrapper.
///
/// Reference-counted using [`Arc`]. Every resource keeps a clone, so the device
/// is destroyed only after the last resource created from it.
#[derive(Clone)]
pub struct Device(Arc<DeviceInner>);
impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Device {}
impl Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Device")
            .field(&self.0.device.handle())
            .finish()
    }
}

struct DeviceInner {
    physical_device: PhysicalDevice,
    device: ash::Device,
    extensions: BTreeSet<CString>,
    features: SupportedFeatures,
    swapchain: Option<khr::swapchain::Device>,
    debug_utils: Option<ext::debug_utils::Device>,
}

impl Device {
    /// Returns a reference to the Vulkan [`Instance`].
    pub fn instance(&self) -> &Instance {
        self.0.physical_device.instance()
    }

    /// Returns a reference to the [`PhysicalDevice`]
    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.0.physical_device
    }

    /// Creates a new device builder for the given physical device.
    pub fn builder(pdevice: PhysicalDevice) -> VkResult<DeviceBuilder> {
        DeviceBuilder::new(pdevice)
    }

    /// Checks if a device extension was enabled by name.
    ///
    /// Extensions satisfied by core promotion are not listed.
    pub fn has_extension(&self, name: &CStr) -> bool {
        self.0.extensions.contains(name)
    }

    /// The optional features that were enabled on this device.
    pub fn enabled_features(&self) -> SupportedFeatures {
        self.0.features
    }

    /// Returns the `VK_KHR_swapchain` function table, if the extension was enabled.
    pub fn swapchain_loader(&self) -> Option<&khr::swapchain::Device> {
        self.0.swapchain.as_ref()
    }

    /// Returns the `VK_EXT_debug_utils` function table, if the instance enabled it.
    pub fn debug_utils_loader(&self) -> Option<&ext::debug_utils::Device> {
        self.0.debug_utils.as_ref()
    }

    /// Labels a Vulkan object for debugging tools and validation messages.
    ///
    /// Does nothing when debug utils are not enabled. Naming failures are logged and ignored.
    pub fn set_debug_name<T: vk::Handle>(&self, handle: T, name: &str) {
        let Some(debug_utils) = self.0.debug_utils.as_ref() else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(handle)
            .object_name(&name);
        if let Err(err) = unsafe { debug_utils.set_debug_utils_object_name(&info) } {
            tracing::debug!(component = "context", "failed to name object {name:?}: {err}");
        }
    }

    /// Retrieves a queue the device was created with.
    pub fn get_queue(&self, location: QueueLocation) -> Queue {
        let caps = self
            .physical_device()
            .queue_family_properties()
            .get(location.family_index as usize)
            .map(|family| family.queue_flags)
            .unwrap_or_default();
        Queue::retrieve(self.clone(), location, caps)
    }
}

impl Deref for Device {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.0.device
    }
}
impl AsVkHandle for Device {
    type Handle = vk::Device;

    fn vk_handle(&self) -> Self::Handle {
        self.0.device.handle()
    }
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        tracing::info!(component = "context", device = ?self.device.handle(), "drop device");
        // Safety: Host synchronization rule for vkDestroyDevice:
        // - Host access to device must be externally synchronized.
        // - Host access to all VkQueue objects created from device must be externally synchronized
        // We have &mut self and therefore exclusive control on device.
        // VkQueue objects may not exist at this point, because Queue retains an Arc to Device.
        // If there still exist a Queue, the Device wouldn't be dropped.
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

/// A builder for creating Vulkan logical devices.
pub struct DeviceBuilder {
    pdevice: PhysicalDevice,
    available_extensions: BTreeSet<CString>,
    enabled_extensions: BTreeSet<CString>,
    features: SupportedFeatures,
    queues: Option<DeviceQueues>,
}

impl DeviceBuilder {
    /// Creates a new device builder for the given physical device.
    pub fn new(pdevice: PhysicalDevice) -> VkResult<Self> {
        let available_extensions = pdevice.supported_extensions()?.into_iter().collect();
        Ok(Self {
            pdevice,
            available_extensions,
            enabled_extensions: BTreeSet::new(),
            features: SupportedFeatures::default(),
            queues: None,
        })
    }

    /// Enables a device extension by name.
    pub fn enable_extension(&mut self, name: &CStr) -> Result<(), MissingExtensionError> {
        if self.available_extensions.contains(name) {
            self.enabled_extensions.insert(name.to_owned());
            Ok(())
        } else {
            Err(MissingExtensionError(name.to_owned()))
        }
    }

    /// Enables a device extension unless the instance API version already includes it.
    pub fn enable_extension_or_core(
        &mut self,
        name: &CStr,
        promoted_in: Version,
    ) -> Result<(), MissingExtensionError> {
        if self.pdevice.instance().api_version() >= promoted_in {
            return Ok(());
        }
        self.enable_extension(name)
    }

    /// Enables the requested optional features that the device supports.
    ///
    /// Returns the subset that was actually enabled.
    pub fn enable_features(&mut self, requested: SupportedFeatures) -> SupportedFeatures {
        let supported = self.pdevice.supported_features();
        let enabled = SupportedFeatures {
            multiview: requested.multiview && supported.multiview,
            descriptor_binding_partially_bound: requested.descriptor_binding_partially_bound
                && supported.descriptor_binding_partially_bound,
            runtime_descriptor_array: requested.runtime_descriptor_array
                && supported.runtime_descriptor_array,
            non_uniform_indexing: requested.non_uniform_indexing
                && supported.non_uniform_indexing,
        };
        if enabled != requested {
            tracing::warn!(
                component = "context",
                "some requested device features are unsupported: {requested:?} requested, {enabled:?} enabled"
            );
        }
        self.features = enabled;
        enabled
    }

    /// Sets the queues to create with the device.
    pub fn queues(&mut self, queues: DeviceQueues) -> &mut Self {
        self.queues = Some(queues);
        self
    }

    /// Builds the logical device with the current configuration.
    pub fn build(self) -> VkResult<Device> {
        let queues = self.queues.ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let priorities = queues.priorities();
        let queue_create_infos = queues.queue_create_infos(&priorities);

        let extension_names = self
            .enabled_extensions
            .iter()
            .map(|k| k.as_ptr())
            .collect::<Vec<_>>();

        let bool32 = |b: bool| if b { vk::TRUE } else { vk::FALSE };
        let mut multiview =
            vk::PhysicalDeviceMultiviewFeatures::default().multiview(self.features.multiview);
        let mut descriptor_indexing = vk::PhysicalDeviceDescriptorIndexingFeatures {
            descriptor_binding_partially_bound: bool32(
                self.features.descriptor_binding_partially_bound,
            ),
            runtime_descriptor_array: bool32(self.features.runtime_descriptor_array),
            shader_sampled_image_array_non_uniform_indexing: bool32(
                self.features.non_uniform_indexing,
            ),
            shader_storage_image_array_non_uniform_indexing: bool32(
                self.features.non_uniform_indexing,
            ),
            shader_storage_buffer_array_non_uniform_indexing: bool32(
                self.features.non_uniform_indexing,
            ),
            shader_uniform_buffer_array_non_uniform_indexing: bool32(
                self.features.non_uniform_indexing,
            ),
            ..Default::default()
        };
        let mut features = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut multiview)
            .push_next(&mut descriptor_indexing);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut features);
        let instance = self.pdevice.instance().clone();
        let device = unsafe {
            instance.create_device(self.pdevice.vk_handle(), &create_info, None)
        }?;

        let swapchain = self
            .enabled_extensions
            .contains(khr::swapchain::NAME)
            .then(|| khr::swapchain::Device::new(&instance, &device));
        let debug_utils = instance
            .has_extension(ext::debug_utils::NAME)
            .then(|| ext::debug_utils::Device::new(&instance, &device));

        Ok(Device(Arc::new(DeviceInner {
            physical_device: self.pdevice,
            device,
            extensions: self.enabled_extensions,
            features: self.features,
            swapchain,
            debug_utils,
        })))
    }
}

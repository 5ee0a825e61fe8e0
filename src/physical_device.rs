//! Physical device enumeration, properties and selection.
//!
//! A physical device represents a GPU in the system. Before creating a logical
//! device, the context:
//!
//! 1. Enumerates available physical devices
//! 2. Filters them by minimum API version and preferred [`DeviceType`]
//! 3. Picks the first one passing both filters
//!
//! The filter is exposed as [`select_physical_device`], a pure function over
//! [`PhysicalDeviceSummary`] records, so the selection rules can be exercised
//! without a driver.
use crate::{Instance, utils::{AsVkHandle, Version}};

use ash::{prelude::VkResult, vk};
use serde::{Deserialize, Serialize};
use std::{
    ffi::{CStr, CString},
    ops::Deref,
    sync::Arc,
};

/// A handle to a physical GPU device.
///
/// Physical devices are enumerated from an [`Instance`] and used to query
/// device capabilities before creating a logical [`Device`](crate::Device).
///
/// This type is reference-counted and cheap to clone.
#[derive(Clone)]
pub struct PhysicalDevice(Arc<PhysicalDeviceInner>);
impl PartialEq for PhysicalDevice {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for PhysicalDevice {}

struct PhysicalDeviceInner {
    instance: Instance,
    physical_device: vk::PhysicalDevice,
    properties: PhysicalDeviceProperties,
    queue_families: Vec<vk::QueueFamilyProperties>,
}

impl Instance {
    /// Enumerates all physical devices (GPUs) available on the system.
    pub fn enumerate_physical_devices(&self) -> VkResult<Vec<PhysicalDevice>> {
        let pdevices = unsafe { self.deref().enumerate_physical_devices()? };
        Ok(pdevices
            .into_iter()
            .map(|pdevice| {
                let properties = unsafe { self.get_physical_device_properties(pdevice) };
                let queue_families =
                    unsafe { self.get_physical_device_queue_family_properties(pdevice) };
                PhysicalDevice(Arc::new(PhysicalDeviceInner {
                    instance: self.clone(),
                    physical_device: pdevice,
                    properties: PhysicalDeviceProperties { inner: properties },
                    queue_families,
                }))
            })
            .collect())
    }
}
impl AsVkHandle for PhysicalDevice {
    type Handle = vk::PhysicalDevice;

    fn vk_handle(&self) -> Self::Handle {
        self.0.physical_device
    }
}
impl std::fmt::Debug for PhysicalDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDevice")
            .field("name", &self.properties().device_name())
            .field("api_version", &self.properties().api_version())
            .finish()
    }
}
impl PhysicalDevice {
    /// Returns the instance this physical device was enumerated from.
    pub fn instance(&self) -> &Instance {
        &self.0.instance
    }

    /// Returns the physical device properties.
    pub fn properties(&self) -> &PhysicalDeviceProperties {
        &self.0.properties
    }

    /// Returns the queue families exposed by this device, indexed by family index.
    pub fn queue_family_properties(&self) -> &[vk::QueueFamilyProperties] {
        &self.0.queue_families
    }

    /// Returns the device category of this GPU.
    pub fn device_type(&self) -> DeviceType {
        DeviceType::from(self.0.properties.device_type)
    }

    /// Returns the names of all device extensions supported by this GPU.
    pub fn supported_extensions(&self) -> VkResult<Vec<CString>> {
        let properties = unsafe {
            self.instance()
                .enumerate_device_extension_properties(self.0.physical_device)?
        };
        Ok(properties
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(CStr::to_owned)
            .collect())
    }

    /// Queries the descriptor indexing and multiview features of this GPU.
    pub fn supported_features(&self) -> SupportedFeatures {
        let mut multiview = vk::PhysicalDeviceMultiviewFeatures::default();
        let mut descriptor_indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
        let mut features = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut multiview)
            .push_next(&mut descriptor_indexing);
        unsafe {
            self.instance()
                .get_physical_device_features2(self.0.physical_device, &mut features);
        }
        SupportedFeatures {
            multiview: multiview.multiview == vk::TRUE,
            descriptor_binding_partially_bound: descriptor_indexing
                .descriptor_binding_partially_bound
                == vk::TRUE,
            runtime_descriptor_array: descriptor_indexing.runtime_descriptor_array == vk::TRUE,
            non_uniform_indexing: descriptor_indexing
                .shader_sampled_image_array_non_uniform_indexing
                == vk::TRUE
                && descriptor_indexing.shader_storage_buffer_array_non_uniform_indexing
                    == vk::TRUE
                && descriptor_indexing.shader_storage_image_array_non_uniform_indexing
                    == vk::TRUE
                && descriptor_indexing.shader_uniform_buffer_array_non_uniform_indexing
                    == vk::TRUE,
        }
    }

    pub(crate) fn summary(&self) -> PhysicalDeviceSummary {
        PhysicalDeviceSummary {
            api_version: self.properties().api_version(),
            device_type: self.device_type(),
        }
    }
}

/// Optional features the context turns on when the GPU supports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportedFeatures {
    pub multiview: bool,
    pub descriptor_binding_partially_bound: bool,
    pub runtime_descriptor_array: bool,
    /// Non-uniform indexing of sampled image, storage image, uniform and storage buffer arrays.
    pub non_uniform_indexing: bool,
}

/// Cached properties of a physical device.
pub struct PhysicalDeviceProperties {
    inner: vk::PhysicalDeviceProperties,
}
impl PhysicalDeviceProperties {
    /// Returns the device name, or an empty string if the driver reported garbage.
    pub fn device_name(&self) -> &str {
        self.inner
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or_default()
    }

    /// Returns the maximum supported API version for this physical device.
    pub fn api_version(&self) -> Version {
        Version(self.inner.api_version)
    }

    /// Returns the driver version.
    pub fn driver_version(&self) -> Version {
        Version(self.inner.driver_version)
    }
}
impl Deref for PhysicalDeviceProperties {
    type Target = vk::PhysicalDeviceProperties;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Device category used to filter GPUs during selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Cpu,
    #[default]
    DiscreteGpu,
    IntegratedGpu,
    VirtualGpu,
    /// A device the driver reports as `OTHER`, or a category this crate does not know.
    Other,
    /// Matches every device. Only meaningful as a filter.
    Any,
}

impl From<vk::PhysicalDeviceType> for DeviceType {
    fn from(value: vk::PhysicalDeviceType) -> Self {
        match value {
            vk::PhysicalDeviceType::CPU => Self::Cpu,
            vk::PhysicalDeviceType::DISCRETE_GPU => Self::DiscreteGpu,
            vk::PhysicalDeviceType::INTEGRATED_GPU => Self::IntegratedGpu,
            vk::PhysicalDeviceType::VIRTUAL_GPU => Self::VirtualGpu,
            _ => Self::Other,
        }
    }
}

impl DeviceType {
    /// Returns true if a device of category `actual` passes this filter.
    pub fn matches(self, actual: DeviceType) -> bool {
        self == DeviceType::Any || self == actual
    }
}

/// The properties [`select_physical_device`] filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalDeviceSummary {
    pub api_version: Version,
    pub device_type: DeviceType,
}

/// Returns the index of the first candidate whose API version is at least
/// `api_version` and whose category matches `device_type`.
///
/// The patch number of the reported version is ignored, so a 1.2.189 driver
/// satisfies a 1.2 request.
pub fn select_physical_device(
    candidates: &[PhysicalDeviceSummary],
    api_version: Version,
    device_type: DeviceType,
) -> Option<usize> {
    candidates.iter().position(|candidate| {
        if candidate.api_version.without_patch() < api_version.without_patch() {
            tracing::info!(
                component = "context",
                "skipping device with api version {} (requested {})",
                candidate.api_version,
                api_version
            );
            return false;
        }
        device_type.matches(candidate.device_type)
    })
}

//! Instance creation and management.
//!
//! This module provides the [`Instance`] type and [`InstanceBuilder`] for creating
//! and configuring Vulkan instances.
//!
//! A Vulkan instance is the connection between the application and the Vulkan
//! loader. It is the first object created during context bootstrap and is used to:
//!
//! - Enumerate physical devices (GPUs)
//! - Enable instance-level extensions and layers
//! - Set application metadata
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use std::borrow::Cow;
//! # use basalt::{Instance, utils::Version};
//! let entry = Arc::new(unsafe { ash::Entry::load().unwrap() });
//! let mut builder = Instance::builder(entry).unwrap();
//!
//! builder.info.api_version = Version::V1_3;
//! builder.info.application_name = Cow::Borrowed(c"My Application");
//! builder.enable_surface_extensions();
//! builder.enable_extension(ash::ext::debug_utils::NAME).ok();
//! builder.enable_layer(c"VK_LAYER_KHRONOS_validation");
//!
//! let instance = builder.build().unwrap();
//! ```

use crate::{MissingExtensionError, utils::Version};
use ash::{prelude::VkResult, ext, khr, vk};
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
    ffi::{CStr, CString},
    ops::Deref,
    sync::Arc,
};

/// A Vulkan instance wrapper.
///
/// Reference-counted using [`Arc`] for cheap shared access. The instance is
/// destroyed when the last reference is dropped, which cannot happen before
/// every [`PhysicalDevice`](crate::physical_device::PhysicalDevice),
/// [`Device`](crate::Device) and [`Surface`](crate::Surface) created from it is gone.
#[derive(Clone)]
pub struct Instance(Arc<InstanceInner>);
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Instance {}

struct InstanceInner {
    entry: Arc<ash::Entry>,
    instance: ash::Instance,
    extensions: BTreeSet<CString>,
    api_version: Version,
    surface: Option<khr::surface::Instance>,
    debug_utils: Option<ext::debug_utils::Instance>,
}

/// Configuration for instance creation.
pub struct InstanceCreateInfo {
    /// Instance creation flags.
    pub flags: vk::InstanceCreateFlags,
    /// The application name (shown in debugging tools).
    pub application_name: Cow<'static, CStr>,
    /// The application version.
    pub application_version: Version,
    /// The engine name.
    pub engine_name: Cow<'static, CStr>,
    /// The engine version.
    pub engine_version: Version,
    /// The Vulkan API version to use.
    pub api_version: Version,
}

impl Default for InstanceCreateInfo {
    fn default() -> Self {
        Self {
            flags: vk::InstanceCreateFlags::empty(),
            application_name: Cow::Borrowed(c"Basalt"),
            application_version: Version::new(0, 1, 0, 0),
            engine_name: Cow::Borrowed(c"Basalt"),
            engine_version: Version::new(0, 1, 0, 0),
            api_version: Version::V1_2,
        }
    }
}

impl Instance {
    /// Creates a new instance builder.
    pub fn builder(entry: Arc<ash::Entry>) -> VkResult<InstanceBuilder> {
        InstanceBuilder::new(entry)
    }

    /// Returns the Vulkan entry point.
    pub fn entry(&self) -> &Arc<ash::Entry> {
        &self.0.entry
    }

    /// Returns true if the named extension was enabled on this instance.
    pub fn has_extension(&self, name: &CStr) -> bool {
        self.0.extensions.contains(name)
    }

    /// Returns the `VK_KHR_surface` function table, if the extension was enabled.
    pub fn surface_loader(&self) -> Option<&khr::surface::Instance> {
        self.0.surface.as_ref()
    }

    /// Returns the `VK_EXT_debug_utils` function table, if the extension was enabled.
    pub fn debug_utils_loader(&self) -> Option<&ext::debug_utils::Instance> {
        self.0.debug_utils.as_ref()
    }

    /// Returns the version of the Vulkan API used when creating the instance.
    pub fn api_version(&self) -> Version {
        self.0.api_version
    }
}

impl Deref for Instance {
    type Target = ash::Instance;

    fn deref(&self) -> &Self::Target {
        &self.0.instance
    }
}

impl Drop for InstanceInner {
    fn drop(&mut self) {
        tracing::info!(component = "context", instance = ?self.instance.handle(), "drop instance");
        // Safety: Host synchronization rule for vkDestroyInstance:
        // - Host access to instance must be externally synchronized.
        // - Host access to all VkPhysicalDevice objects enumerated from instance must be externally synchronized.
        // We have &mut self and therefore exclusive control on instance.
        // PhysicalDevice, Device and Surface all retain an Arc to Instance,
        // so none of them can outlive this point.
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

/// Properties of a Vulkan layer.
///
/// Returned by [`InstanceBuilder::enable_layer`] when a layer is successfully enabled.
#[derive(Clone, Debug)]
pub struct LayerProperties {
    /// The Vulkan spec version the layer was written against.
    pub spec_version: Version,
    /// The layer's implementation version.
    pub implementation_version: Version,
    /// A human-readable description of the layer.
    pub description: String,
}

/// Surface extensions for the platforms [`Surface`](crate::Surface) can present to.
const PLATFORM_SURFACE_EXTENSIONS: [&CStr; 5] = [
    khr::win32_surface::NAME,
    khr::xlib_surface::NAME,
    khr::xcb_surface::NAME,
    khr::wayland_surface::NAME,
    khr::android_surface::NAME,
];

/// A builder for creating Vulkan instances.
///
/// Enumerates the loader's extensions and layers up front so enabling an
/// unavailable one fails early instead of at `vkCreateInstance`.
pub struct InstanceBuilder {
    entry: Arc<ash::Entry>,
    available_extensions: BTreeMap<CString, Version>,
    enabled_extensions: BTreeSet<CString>,

    available_layers: BTreeMap<CString, LayerProperties>,
    enabled_layers: Vec<CString>,

    /// Instance creation configuration. Modify this to set application metadata.
    pub info: InstanceCreateInfo,
}

fn extension_map(properties: Vec<vk::ExtensionProperties>) -> BTreeMap<CString, Version> {
    properties
        .iter()
        .filter_map(|ext| {
            let name = ext.extension_name_as_c_str().ok()?;
            Some((name.to_owned(), Version(ext.spec_version)))
        })
        .collect()
}

impl InstanceBuilder {
    /// Creates a new instance builder with the given entry point.
    ///
    /// Enumerates available extensions and layers from the Vulkan loader.
    pub fn new(entry: Arc<ash::Entry>) -> VkResult<Self> {
        let available_extensions =
            extension_map(unsafe { entry.enumerate_instance_extension_properties(None)? });
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? }
            .iter()
            .filter_map(|layer| {
                let name = layer.layer_name_as_c_str().ok()?;
                let description = layer
                    .description_as_c_str()
                    .map(|d| d.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Some((
                    name.to_owned(),
                    LayerProperties {
                        implementation_version: Version(layer.implementation_version),
                        spec_version: Version(layer.spec_version),
                        description,
                    },
                ))
            })
            .collect();
        Ok(Self {
            entry,
            available_extensions,
            enabled_extensions: BTreeSet::new(),
            available_layers,
            enabled_layers: Vec::new(),
            info: InstanceCreateInfo::default(),
        })
    }

    /// Enables an instance extension by name.
    pub fn enable_extension(&mut self, name: &CStr) -> Result<(), MissingExtensionError> {
        if self.available_extensions.contains_key(name) {
            self.enabled_extensions.insert(name.to_owned());
            Ok(())
        } else {
            Err(MissingExtensionError(name.to_owned()))
        }
    }

    /// Enables `VK_KHR_surface` and every platform surface extension the loader offers.
    ///
    /// Returns the number of platform surface extensions enabled.
    pub fn enable_surface_extensions(&mut self) -> usize {
        if self.enable_extension(khr::surface::NAME).is_err() {
            tracing::warn!(component = "context", "VK_KHR_surface is not available");
            return 0;
        }
        PLATFORM_SURFACE_EXTENSIONS
            .iter()
            .filter(|name| self.enable_extension(name).is_ok())
            .count()
    }

    /// Enables a Vulkan layer.
    ///
    /// When a layer is enabled, any additional extensions it provides become
    /// available for enabling.
    ///
    /// # Returns
    ///
    /// `Some(LayerProperties)` if the layer is available, `None` otherwise.
    pub fn enable_layer(&mut self, layer: &CStr) -> Option<LayerProperties> {
        let properties = self.available_layers.get(layer)?.clone();
        self.enabled_layers.push(layer.to_owned());

        match unsafe { self.entry.enumerate_instance_extension_properties(Some(layer)) } {
            Ok(additional) => self.available_extensions.extend(extension_map(additional)),
            Err(err) => tracing::warn!(
                component = "context",
                "failed to enumerate extensions of layer {layer:?}: {err}"
            ),
        }
        Some(properties)
    }

    /// Builds the Vulkan instance with the current configuration.
    pub fn build(self) -> VkResult<Instance> {
        let application_info = vk::ApplicationInfo::default()
            .application_name(&self.info.application_name)
            .application_version(self.info.application_version.as_raw())
            .engine_name(&self.info.engine_name)
            .engine_version(self.info.engine_version.as_raw())
            .api_version(self.info.api_version.as_raw());

        let extension_names = self
            .enabled_extensions
            .iter()
            .map(|name| name.as_ptr())
            .collect::<Vec<_>>();
        let layer_names = self
            .enabled_layers
            .iter()
            .map(|name| name.as_ptr())
            .collect::<Vec<_>>();
        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&application_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names)
            .flags(self.info.flags);
        // Safety: No Host synchronization rules for vkCreateInstance.
        let instance = unsafe { self.entry.create_instance(&create_info, None)? };

        let surface = self
            .enabled_extensions
            .contains(khr::surface::NAME)
            .then(|| khr::surface::Instance::new(&self.entry, &instance));
        let debug_utils = self
            .enabled_extensions
            .contains(ext::debug_utils::NAME)
            .then(|| ext::debug_utils::Instance::new(&self.entry, &instance));
        Ok(Instance(Arc::new(InstanceInner {
            entry: self.entry,
            instance,
            extensions: self.enabled_extensions,
            api_version: self.info.api_version,
            surface,
            debug_utils,
        })))
    }
}

//! The entry point of the facade: device bootstrap and resource factories.
//!
//! [`Context::new`] walks through the bootstrap stages in order, and the first
//! failure aborts construction with a [`ContextError`]:
//!
//! 1. instance (surface extensions, validation layer, extra extensions)
//! 2. physical device selection by API version and [`DeviceType`]
//! 3. queue family partitioning
//! 4. logical device
//! 5. queue retrieval
//! 6. debug messenger (only with validation)
//! 7. memory allocator
//! 8. shader compiler
//!
//! Teardown runs the other way around. The field order of [`Context`] drops the
//! compiler first and the device last, and every resource created through the
//! context keeps the allocator or device it depends on alive.
//!
//! ```no_run
//! use basalt::context::{Context, ContextCreateInfo};
//! use basalt::buffer::{BufferFlags, BufferInfo, BufferMemory};
//!
//! let context = Context::new(&ContextCreateInfo::default()).unwrap();
//! let buffer = context
//!     .create_buffer(&BufferInfo {
//!         name: "vertices".into(),
//!         flags: BufferFlags::VERTEX | BufferFlags::COPY_DST,
//!         memory: BufferMemory::GpuOnly,
//!         size: 1024,
//!     })
//!     .unwrap();
//! ```

use std::{
    borrow::Cow,
    ffi::CString,
    sync::Arc,
};

use ash::{prelude::VkResult, ext, khr, vk};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    Allocator, Device, Instance, MissingExtensionError, Queue,
    buffer::{Buffer, BufferInfo},
    debug::DebugUtilsMessenger,
    image::{Texture, TextureError, TextureInfo},
    physical_device::{DeviceType, SupportedFeatures, select_physical_device},
    queue::partition_queue_families,
    sampler::{Sampler, SamplerInfo},
    shader::{Shader, ShaderError, ShaderInfo},
    shader_loader::ShaderLoader,
    surface::{Surface, SurfaceError},
    swapchain::Swapchain,
    utils::Version,
};

const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

/// Settings for [`Context::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextCreateInfo {
    /// Minimum Vulkan version as `(major, minor)`. Devices below it are skipped.
    pub api_version: (u32, u32),
    pub use_validation_layer: bool,
    pub application_name: String,
    pub engine_name: String,
    pub preferred_device_type: DeviceType,
    /// Additional instance extensions, by name.
    pub extensions: Vec<String>,
}

impl Default for ContextCreateInfo {
    fn default() -> Self {
        Self {
            api_version: (1, 2),
            use_validation_layer: true,
            application_name: "Basalt".into(),
            engine_name: "Basalt".into(),
            preferred_device_type: DeviceType::DiscreteGpu,
            extensions: Vec::new(),
        }
    }
}

impl ContextCreateInfo {
    pub fn version(&self) -> Version {
        Version::new(0, self.api_version.0, self.api_version.1, 0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),
    #[error("vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
    #[error("no {device_type:?} device supports Vulkan {api_version}")]
    NoSuitablePhysicalDevice {
        api_version: Version,
        device_type: DeviceType,
    },
    #[error("no queue family supports both graphics and compute")]
    NoMainQueueFamily,
    #[error("extension {0:?} is not available")]
    MissingExtension(CString),
    #[error("extension name {0:?} contains a nul byte")]
    InvalidExtensionName(String),
    #[error("application or engine name {0:?} contains a nul byte")]
    InvalidName(String),
    #[error("shader compiler initialization failed: {0}")]
    ShaderCompiler(String),
    #[error("queue family #{queue_family_index} cannot present to the surface")]
    PresentationNotSupported { queue_family_index: u32 },
    #[error("surface creation failed: {0}")]
    Surface(#[from] SurfaceError),
}

impl From<MissingExtensionError> for ContextError {
    fn from(err: MissingExtensionError) -> Self {
        Self::MissingExtension(err.0)
    }
}

/// Bootstrap progress, in the order the stages are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapStage {
    Uninitialized,
    InstanceCreated,
    PhysicalDeviceSelected,
    QueuesPartitioned,
    DeviceCreated,
    QueuesRetrieved,
    DebugMessengerAttached,
    AllocatorCreated,
    CompilerInitialized,
    Ready,
}

struct Bootstrap {
    stage: BootstrapStage,
}

impl Bootstrap {
    fn advance(&mut self, stage: BootstrapStage) {
        debug_assert!(stage > self.stage);
        tracing::debug!(component = "context", "bootstrap: {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }
}

fn c_name(name: &str) -> Result<CString, ContextError> {
    CString::new(name).map_err(|_| ContextError::InvalidName(name.to_owned()))
}

/// Owns the device, its queues, the allocator and the shader compiler.
pub struct Context {
    // Drop order is declaration order.
    shader_loader: ShaderLoader,
    allocator: Allocator,
    debug_messenger: Option<DebugUtilsMessenger>,
    main_queue: Queue,
    compute_queue: Option<Queue>,
    transfer_queues: SmallVec<[Queue; 4]>,
    device: Device,
    info: ContextCreateInfo,
}

impl Context {
    /// Runs the whole bootstrap sequence.
    pub fn new(info: &ContextCreateInfo) -> Result<Self, ContextError> {
        let _span = tracing::info_span!("context_bootstrap").entered();
        let mut bootstrap = Bootstrap {
            stage: BootstrapStage::Uninitialized,
        };
        Self::bootstrap(info, &mut bootstrap).inspect_err(|err| {
            tracing::error!(
                component = "context",
                "context creation failed after {:?}: {err}",
                bootstrap.stage
            )
        })
    }

    fn bootstrap(info: &ContextCreateInfo, bootstrap: &mut Bootstrap) -> Result<Self, ContextError> {
        let api_version = info.version();

        let entry = Arc::new(unsafe { ash::Entry::load()? });
        let instance = Self::create_instance(entry, info)?;
        bootstrap.advance(BootstrapStage::InstanceCreated);

        let pdevices = instance.enumerate_physical_devices()?;
        let summaries = pdevices.iter().map(|p| p.summary()).collect::<Vec<_>>();
        let pdevice = select_physical_device(&summaries, api_version, info.preferred_device_type)
            .and_then(|index| pdevices.into_iter().nth(index))
            .ok_or(ContextError::NoSuitablePhysicalDevice {
                api_version,
                device_type: info.preferred_device_type,
            })?;
        tracing::info!(
            component = "context",
            "selected device `{}`",
            pdevice.properties().device_name()
        );
        bootstrap.advance(BootstrapStage::PhysicalDeviceSelected);

        let queues = partition_queue_families(pdevice.queue_family_properties())
            .ok_or(ContextError::NoMainQueueFamily)?;
        bootstrap.advance(BootstrapStage::QueuesPartitioned);

        let mut builder = Device::builder(pdevice)?;
        builder.enable_extension(khr::swapchain::NAME)?;
        builder.enable_extension_or_core(ext::descriptor_indexing::NAME, Version::V1_2)?;
        builder.enable_extension_or_core(khr::multiview::NAME, Version::V1_1)?;
        builder.enable_features(SupportedFeatures {
            multiview: true,
            descriptor_binding_partially_bound: true,
            runtime_descriptor_array: true,
            non_uniform_indexing: true,
        });
        builder.queues(queues);
        let device = builder.build()?;
        bootstrap.advance(BootstrapStage::DeviceCreated);

        let main_queue = device.get_queue(queues.main_queue());
        let compute_queue = queues.compute_queue().map(|location| device.get_queue(location));
        let transfer_queues = queues
            .transfer_queues()
            .into_iter()
            .map(|location| device.get_queue(location))
            .collect::<SmallVec<[Queue; 4]>>();
        tracing::debug!(
            component = "context",
            "retrieved 1 main, {} compute and {} transfer queues",
            compute_queue.iter().len(),
            transfer_queues.len()
        );
        bootstrap.advance(BootstrapStage::QueuesRetrieved);

        let debug_messenger = if info.use_validation_layer {
            let messenger = DebugUtilsMessenger::new(device.instance().clone())?;
            bootstrap.advance(BootstrapStage::DebugMessengerAttached);
            Some(messenger)
        } else {
            None
        };

        let allocator = Allocator::new(device.clone())?;
        bootstrap.advance(BootstrapStage::AllocatorCreated);

        let shader_loader =
            ShaderLoader::new(api_version).map_err(|err| ContextError::ShaderCompiler(err.to_string()))?;
        bootstrap.advance(BootstrapStage::CompilerInitialized);

        bootstrap.advance(BootstrapStage::Ready);
        Ok(Self {
            shader_loader,
            allocator,
            debug_messenger,
            main_queue,
            compute_queue,
            transfer_queues,
            device,
            info: info.clone(),
        })
    }

    fn create_instance(entry: Arc<ash::Entry>, info: &ContextCreateInfo) -> Result<Instance, ContextError> {
        let mut builder = Instance::builder(entry)?;
        builder.info.api_version = info.version();
        builder.info.application_name = Cow::Owned(c_name(&info.application_name)?);
        builder.info.engine_name = Cow::Owned(c_name(&info.engine_name)?);

        let surface_extensions = builder.enable_surface_extensions();
        tracing::debug!(component = "context", "enabled {surface_extensions} platform surface extensions");

        if info.use_validation_layer {
            if builder.enable_layer(VALIDATION_LAYER).is_none() {
                tracing::warn!(component = "context", "validation layer {VALIDATION_LAYER:?} is not available");
            }
            builder.enable_extension(ext::debug_utils::NAME)?;
        }
        for name in &info.extensions {
            let name = CString::new(name.as_str())
                .map_err(|_| ContextError::InvalidExtensionName(name.clone()))?;
            builder.enable_extension(&name)?;
        }
        Ok(builder.build()?)
    }

    pub fn info(&self) -> &ContextCreateInfo {
        &self.info
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn instance(&self) -> &Instance {
        self.device.instance()
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    pub fn shader_loader(&self) -> &ShaderLoader {
        &self.shader_loader
    }

    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }

    pub fn main_queue(&self) -> &Queue {
        &self.main_queue
    }

    /// `None` when the device has neither a compute family nor a spare main queue.
    pub fn compute_queue(&self) -> Option<&Queue> {
        self.compute_queue.as_ref()
    }

    pub fn transfer_queues(&self) -> &[Queue] {
        &self.transfer_queues
    }

    pub fn create_buffer(&self, info: &BufferInfo) -> VkResult<Buffer> {
        Buffer::new(self.allocator.clone(), info)
    }

    pub fn create_texture(&self, info: &TextureInfo) -> Result<Texture, TextureError> {
        Texture::new(self.allocator.clone(), info)
    }

    pub fn create_sampler(&self, info: &SamplerInfo) -> VkResult<Sampler> {
        Sampler::new(self.device.clone(), info)
    }

    pub fn create_shader(&self, info: &ShaderInfo) -> Result<Shader, ShaderError> {
        Shader::new(self.device.clone(), info)
    }

    /// Creates a surface for the window and checks that the main queue can present to it.
    pub fn create_surface(
        &self,
        window: &(impl HasWindowHandle + HasDisplayHandle),
    ) -> Result<Surface, ContextError> {
        let surface = Surface::create(self.instance().clone(), window)?;
        let queue_family_index = self.main_queue.family_index();
        if !surface.supports_queue_family(self.device.physical_device(), queue_family_index)? {
            return Err(ContextError::PresentationNotSupported { queue_family_index });
        }
        Ok(surface)
    }

    pub fn create_swapchain(
        &self,
        surface: Surface,
        name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> VkResult<Swapchain> {
        Swapchain::new(self.device.clone(), surface, name, width, height)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Err(err) = unsafe { self.device.device_wait_idle() } {
            tracing::warn!(component = "context", "device_wait_idle failed during teardown: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_create_info() {
        let info = ContextCreateInfo::default();
        assert_eq!(info.version(), Version::V1_2);
        assert!(info.use_validation_layer, "validation is on by default");
        assert_eq!(info.preferred_device_type, DeviceType::DiscreteGpu);
        assert!(info.extensions.is_empty());
    }

    #[test]
    fn test_names_with_nul_are_rejected() {
        assert_eq!(c_name("Basalt").ok().as_deref(), Some(c"Basalt"));
        assert!(
            matches!(c_name("bad\0name"), Err(ContextError::InvalidName(ref name)) if name == "bad\0name"),
            "interior nul must not be silently dropped"
        );
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(BootstrapStage::Uninitialized < BootstrapStage::InstanceCreated);
        assert!(BootstrapStage::QueuesRetrieved < BootstrapStage::DebugMessengerAttached);
        assert!(BootstrapStage::CompilerInitialized < BootstrapStage::Ready);
    }

    #[test]
    fn test_missing_extension_maps_to_context_error() {
        let err: ContextError = MissingExtensionError(c"VK_KHR_missing".to_owned()).into();
        assert!(
            matches!(err, ContextError::MissingExtension(ref name) if name.as_c_str() == c"VK_KHR_missing"),
            "unexpected error {err:?}"
        );
    }
}

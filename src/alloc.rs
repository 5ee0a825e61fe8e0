//! GPU memory allocation.
//!
//! This module provides the [`Allocator`] type, a wrapper around the Vulkan Memory
//! Allocator (VMA) library.
//!
//! The context creates one allocator right after the logical device. Buffers and
//! textures keep a clone of it, so the allocator outlives every allocation made
//! from it, and the device outlives the allocator.

use std::{ops::Deref, sync::Arc};

use ash::prelude::VkResult;

use crate::{Device, HasDevice, utils::AsVkHandle};

/// A GPU memory allocator using the Vulkan Memory Allocator (VMA) library.
///
/// The allocator is thread-safe and can be cloned cheaply.
#[derive(Clone)]
pub struct Allocator(Arc<AllocatorInner>);
struct AllocatorInner {
    inner: vk_mem::Allocator,
    // Declared after `inner` so VMA is torn down before the device it allocates from.
    device: Device,
}

impl HasDevice for Allocator {
    fn device(&self) -> &Device {
        &self.0.device
    }
}

impl Allocator {
    /// Creates a new allocator for the given device.
    pub fn new(device: Device) -> VkResult<Self> {
        let mut info = vk_mem::AllocatorCreateInfo::new(
            device.instance(),
            &device,
            device.physical_device().vk_handle(),
        );
        info.vulkan_api_version = device.instance().api_version().as_raw();
        let alloc = unsafe { vk_mem::Allocator::new(info)? };
        tracing::debug!(component = "context", "allocator created");
        Ok(Self(Arc::new(AllocatorInner {
            inner: alloc,
            device,
        })))
    }

    /// Returns the memory property flags of the memory type backing `allocation`
    /// (equivalent of `vmaGetAllocationMemoryProperties`, which vk-mem 0.4 does not expose).
    pub(crate) fn get_allocation_memory_properties(
        &self,
        allocation: &vk_mem::Allocation,
    ) -> ash::vk::MemoryPropertyFlags {
        let memory_type = self.0.inner.get_allocation_info(allocation).memory_type;
        let props = unsafe { self.0.inner.get_memory_properties() };
        props.memory_types[memory_type as usize].property_flags
    }
}

impl Deref for Allocator {
    type Target = vk_mem::Allocator;

    fn deref(&self) -> &Self::Target {
        &self.0.inner
    }
}

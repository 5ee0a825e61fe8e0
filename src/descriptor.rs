//! Vulkan descriptor set layouts.
//!
//! Layouts are normally synthesized by [`Shader`](crate::shader::Shader) from the
//! reflected bindings of its stages, one layout per set index.

use std::fmt::Debug;

use ash::{prelude::VkResult, vk};

use crate::{Device, HasDevice, utils::AsVkHandle};

/// A descriptor set layout.
pub struct DescriptorSetLayout {
    device: Device,
    handle: vk::DescriptorSetLayout,
    bindings: Vec<vk::DescriptorSetLayoutBinding<'static>>,
}
impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.handle, None);
        }
    }
}
impl Debug for DescriptorSetLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSetLayout")
            .field("handle", &self.handle)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}
impl DescriptorSetLayout {
    /// Creates a descriptor set layout from a list of bindings.
    ///
    /// An empty slice produces an empty layout, which is still a valid entry
    /// in a pipeline layout's set array.
    pub fn new(device: Device, bindings: &[vk::DescriptorSetLayoutBinding<'static>]) -> VkResult<Self> {
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let handle = unsafe { device.create_descriptor_set_layout(&info, None) }?;
        Ok(Self {
            device,
            handle,
            bindings: bindings.to_vec(),
        })
    }

    /// The bindings this layout was created with, in creation order.
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding<'static>] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
impl AsVkHandle for DescriptorSetLayout {
    type Handle = vk::DescriptorSetLayout;

    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}
impl HasDevice for DescriptorSetLayout {
    fn device(&self) -> &Device {
        &self.device
    }
}

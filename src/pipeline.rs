//! Shader modules and pipeline layouts.
//!
//! - [`ShaderModule`]: A compiled SPIR-V shader module.
//! - [`PipelineLayout`]: Defines the interface between shaders and descriptor sets.
//!
//! Both are created by [`Shader`](crate::shader::Shader); pipelines themselves
//! are built by the application from the handles exposed here.

use std::{fmt::Debug, io::Cursor, sync::Arc};

use ash::{prelude::VkResult, vk};

use crate::{Device, HasDevice, descriptor::DescriptorSetLayout, utils::AsVkHandle};

/// Entry point used for every stage.
pub const SHADER_ENTRY_POINT: &std::ffi::CStr = c"main";

/// Reinterprets SPIR-V bytes as 32-bit words.
///
/// Returns `None` when the length is not a multiple of 4 or the magic number is wrong.
pub fn spirv_words(code: &[u8]) -> Option<Vec<u32>> {
    if code.is_empty() || !code.len().is_multiple_of(4) {
        return None;
    }
    ash::util::read_spv(&mut Cursor::new(code)).ok()
}

/// Represents SPIR-V shader source.
///
/// Shader modules contain SPIR-V shader source that can be used to create
/// PSOs.
pub struct ShaderModule {
    device: Device,
    handle: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
}
impl ShaderModule {
    /// Creates a shader module from SPIR-V bytecode.
    ///
    /// # Errors
    ///
    /// Returns `ERROR_INVALID_SHADER_NV` if the bytes are not a SPIR-V word stream.
    pub fn new(device: Device, stage: vk::ShaderStageFlags, code: &[u8]) -> VkResult<Self> {
        let words = spirv_words(code).ok_or(vk::Result::ERROR_INVALID_SHADER_NV)?;
        let info = vk::ShaderModuleCreateInfo::default().code(&words);
        let handle = unsafe { device.create_shader_module(&info, None)? };
        Ok(Self {
            device,
            handle,
            stage,
        })
    }

    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    /// Stage create info for this module with the `main` entry point.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'static> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage)
            .module(self.handle)
            .name(SHADER_ENTRY_POINT)
    }
}
impl Debug for ShaderModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderModule")
            .field("handle", &self.handle)
            .field("stage", &self.stage)
            .finish()
    }
}
impl AsVkHandle for ShaderModule {
    type Handle = vk::ShaderModule;
    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}
impl HasDevice for ShaderModule {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.handle, None);
        }
    }
}

/// A pipeline layout defining the shader interface.
///
/// Pipeline layouts specify the descriptor set layouts and push constant ranges
/// that shaders in the pipeline will use.
pub struct PipelineLayout {
    device: Device,
    handle: vk::PipelineLayout,
    /// Keep descriptor set layouts alive
    set_layouts: Vec<Arc<DescriptorSetLayout>>,
    push_constant_range: Option<vk::PushConstantRange>,
}

impl PipelineLayout {
    /// Creates a new pipeline layout.
    ///
    /// # Parameters
    ///
    /// - `set_layouts`: The descriptor set layouts for each set index.
    /// - `push_constant_range`: The single push constant range, if any stage declares one.
    pub fn new(
        device: Device,
        set_layouts: Vec<Arc<DescriptorSetLayout>>,
        push_constant_range: Option<vk::PushConstantRange>,
    ) -> VkResult<Self> {
        let raw_set_layouts: Vec<_> = set_layouts.iter().map(|a| a.vk_handle()).collect();
        let ranges: &[vk::PushConstantRange] = match &push_constant_range {
            Some(range) => std::slice::from_ref(range),
            None => &[],
        };
        let info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&raw_set_layouts)
            .push_constant_ranges(ranges);

        let layout = unsafe { device.create_pipeline_layout(&info, None)? };
        Ok(Self {
            device,
            handle: layout,
            set_layouts,
            push_constant_range,
        })
    }

    pub fn set_layouts(&self) -> &[Arc<DescriptorSetLayout>] {
        &self.set_layouts
    }

    pub fn push_constant_range(&self) -> Option<vk::PushConstantRange> {
        self.push_constant_range
    }
}
impl Debug for PipelineLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLayout")
            .field("handle", &self.handle)
            .field("sets", &self.set_layouts.len())
            .field("push_constant_range", &self.push_constant_range)
            .finish()
    }
}
impl AsVkHandle for PipelineLayout {
    type Handle = vk::PipelineLayout;

    fn vk_handle(&self) -> Self::Handle {
        self.handle
    }
}
impl HasDevice for PipelineLayout {
    fn device(&self) -> &Device {
        &self.device
    }
}
impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.handle, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spirv_words() {
        let mut bytes = 0x0723_0203u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0500u32.to_le_bytes());
        let words = spirv_words(&bytes).expect("valid header");
        assert_eq!(words, vec![0x0723_0203, 0x0001_0500]);

        assert!(spirv_words(&bytes[..7]).is_none(), "length must be a multiple of 4");
        assert!(spirv_words(&[]).is_none(), "empty bytecode is rejected");
        assert!(spirv_words(&[0u8; 8]).is_none(), "bad magic number");
    }
}

//! # Basalt
//!
//! A thin, strongly typed facade over Vulkan.
//!
//! Basalt bootstraps a device, hands out GPU resources and turns shader
//! bytecode into ready-to-use pipeline layouts. Every wrapper owns its native
//! handle and keeps the objects it depends on alive, so resources are always
//! destroyed before the allocator and device they were created from.
//!
//! ## Quick Start
//!
//! ```no_run
//! use basalt::prelude::*;
//!
//! let context = Context::new(&ContextCreateInfo::default()).unwrap();
//! let buffer = context
//!     .create_buffer(&BufferInfo {
//!         name: "uniforms".into(),
//!         flags: BufferFlags::UNIFORM,
//!         memory: BufferMemory::CpuToGpu,
//!         size: 256,
//!     })
//!     .unwrap();
//! ```
//!
//! ## Overview
//!
//! ### Context
//!
//! [`Context`] runs the bootstrap sequence: instance, physical device
//! selection, queue family partitioning, logical device, debug messenger,
//! allocator and shader compiler. Its factories create [`Buffer`](buffer::Buffer)s,
//! [`Texture`](image::Texture)s, [`Sampler`]s, [`Shader`](shader::Shader)s,
//! [`Surface`]s and [`Swapchain`](swapchain::Swapchain)s.
//!
//! The lower-level pieces ([`Instance`], [`Device`], [`Allocator`]) stay public
//! for applications that need a different bootstrap.
//!
//! ### Shaders
//!
//! [`ShaderLoader`](shader_loader::ShaderLoader) compiles GLSL or HLSL to SPIR-V.
//! [`Shader::new`](shader::Shader::new) reflects every stage, merges the
//! descriptor bindings and push constants, and builds the set layouts and the
//! pipeline layout.
//!
//! ### Textures
//!
//! [`load_texture_from_file`](texture_loader::load_texture_from_file) decodes
//! DDS files, zlib-compressed DDS files and common image formats into
//! [`TextureData`](texture_loader::TextureData). Cross-shaped atlases can be
//! turned into cubemaps with
//! [`convert_2d_texture_to_cubemap`](texture_loader::convert_2d_texture_to_cubemap).
//!
//! ### Logging
//!
//! Diagnostics are emitted through [`tracing`](https://docs.rs/tracing) with a
//! `component` field. Install any subscriber to see them; validation layer
//! messages arrive with `component = "validation"`.

use std::ffi::CString;

mod alloc;
pub mod buffer;
pub mod context;
pub mod debug;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod queue;
pub mod sampler;
pub mod shader;
pub mod shader_loader;
pub mod surface;
pub mod swapchain;
pub mod texture_loader;
pub mod utils;

pub use alloc::Allocator;
pub use context::{Context, ContextCreateInfo, ContextError};
pub use device::{Device, HasDevice};
pub use instance::Instance;
pub use queue::Queue;
pub use sampler::Sampler;
pub use surface::Surface;

pub use ash;

/// An instance or device extension that the driver does not offer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("extension {0:?} is not available")]
pub struct MissingExtensionError(pub CString);

pub mod prelude {
    pub use crate::{
        Allocator, Context, ContextCreateInfo, Device, HasDevice, Queue, Sampler, Surface, ash,
        ash::vk,
        buffer::{Buffer, BufferFlags, BufferInfo, BufferMemory},
        debug::DebugObject,
        image::{Texture, TextureFlags, TextureInfo, TextureType},
        sampler::SamplerInfo,
        shader::{Shader, ShaderInfo, ShaderStage, ShaderStageInfo},
        shader_loader::{ShaderLanguage, ShaderLoader},
        swapchain::Swapchain,
        texture_loader::{TextureData, load_texture_from_file},
        utils::{AsVkHandle, format::Format},
    };
}

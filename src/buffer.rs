//! Vulkan buffers with automatic memory management.
//!
//! A [`Buffer`] is described by a [`BufferInfo`]: a name, the [`BufferFlags`]
//! describing how the GPU will use it, a [`BufferMemory`] residency kind and a
//! size. The residency kind picks the VMA allocation strategy:
//!
//! | Memory        | Placement                                   | Mapped |
//! |---------------|---------------------------------------------|--------|
//! | `GpuOnly`     | device local                                | no     |
//! | `CpuOnly`     | system RAM, write-combined                  | yes    |
//! | `CpuToGpu`    | whatever VMA finds best for sequential writes | yes  |
//! | `GpuToCpu`    | host cached, for readback                   | yes    |
//! | `CpuAsBackup` | device local if host visible, else system RAM | yes  |
//!
//! Host-visible buffers stay persistently mapped for their whole lifetime.

use std::{fmt::Debug, ops::RangeBounds};

use ash::{prelude::VkResult, vk};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use vk_mem::Alloc;

use crate::{Allocator, HasDevice, utils::AsVkHandle};

bitflags! {
    /// How a buffer is going to be used by the GPU.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct BufferFlags: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const INDEX = 1 << 4;
        const VERTEX = 1 << 5;
        const INDIRECT = 1 << 6;
    }
}

impl From<BufferFlags> for vk::BufferUsageFlags {
    fn from(flags: BufferFlags) -> Self {
        const TABLE: [(BufferFlags, vk::BufferUsageFlags); 7] = [
            (BufferFlags::COPY_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
            (BufferFlags::COPY_DST, vk::BufferUsageFlags::TRANSFER_DST),
            (BufferFlags::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
            (BufferFlags::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
            (BufferFlags::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
            (BufferFlags::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
            (BufferFlags::INDIRECT, vk::BufferUsageFlags::INDIRECT_BUFFER),
        ];
        TABLE
            .iter()
            .filter(|(flag, _)| flags.contains(*flag))
            .fold(vk::BufferUsageFlags::empty(), |acc, (_, usage)| acc | *usage)
    }
}

/// Where the memory backing a buffer should live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BufferMemory {
    /// Staging memory in system RAM.
    CpuOnly,
    /// GPU-exclusive memory. Not mappable.
    #[default]
    GpuOnly,
    /// Data written by the CPU every frame and read by the GPU.
    CpuToGpu,
    /// Data written by the GPU and read back on the CPU.
    GpuToCpu,
    /// Device local when the device exposes host-visible VRAM, system RAM otherwise.
    CpuAsBackup,
}

impl BufferMemory {
    /// Returns true if buffers of this kind are persistently mapped.
    pub fn is_host_visible(self) -> bool {
        self != BufferMemory::GpuOnly
    }

    /// The VMA allocation parameters for this residency kind.
    pub fn allocation_create_info(self) -> vk_mem::AllocationCreateInfo {
        use vk_mem::{AllocationCreateFlags as F, MemoryUsage};
        let (usage, flags) = match self {
            BufferMemory::CpuOnly => (
                MemoryUsage::AutoPreferHost,
                F::MAPPED | F::HOST_ACCESS_SEQUENTIAL_WRITE,
            ),
            BufferMemory::GpuOnly => (MemoryUsage::AutoPreferDevice, F::empty()),
            BufferMemory::CpuToGpu => (
                MemoryUsage::Auto,
                F::MAPPED | F::HOST_ACCESS_SEQUENTIAL_WRITE,
            ),
            BufferMemory::GpuToCpu => (MemoryUsage::Auto, F::MAPPED | F::HOST_ACCESS_RANDOM),
            BufferMemory::CpuAsBackup => (
                MemoryUsage::AutoPreferDevice,
                F::MAPPED | F::HOST_ACCESS_SEQUENTIAL_WRITE,
            ),
        };
        vk_mem::AllocationCreateInfo {
            usage,
            flags,
            ..Default::default()
        }
    }
}

/// Creation parameters of a [`Buffer`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferInfo {
    pub name: String,
    pub flags: BufferFlags,
    pub memory: BufferMemory,
    /// Size in bytes. Must not be zero.
    pub size: vk::DeviceSize,
}

impl BufferInfo {
    pub fn to_buffer_create_info(&self) -> vk::BufferCreateInfo<'static> {
        vk::BufferCreateInfo::default()
            .size(self.size)
            .usage(self.flags.into())
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
    }
}

/// Errors from CPU access to a buffer's mapped memory.
#[derive(Debug, thiserror::Error)]
pub enum BufferAccessError {
    #[error("buffer `{0}` is not host visible")]
    NotHostVisible(String),
    #[error("write of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfBounds {
        offset: vk::DeviceSize,
        len: vk::DeviceSize,
        size: vk::DeviceSize,
    },
    #[error(transparent)]
    Vulkan(#[from] vk::Result),
}

/// A buffer fully bound to a memory allocation.
pub struct Buffer {
    allocator: Allocator,
    allocation: vk_mem::Allocation,
    buffer: vk::Buffer,
    info: BufferInfo,
    memory_properties: vk::MemoryPropertyFlags,
}
impl HasDevice for Buffer {
    fn device(&self) -> &crate::Device {
        self.allocator.device()
    }
}
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}
impl Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("name", &self.info.name)
            .field("size", &self.info.size)
            .field("memory_properties", &self.memory_properties)
            .finish_non_exhaustive()
    }
}
impl AsVkHandle for Buffer {
    type Handle = vk::Buffer;
    fn vk_handle(&self) -> Self::Handle {
        self.buffer
    }
}
impl Drop for Buffer {
    fn drop(&mut self) {
        tracing::debug!(component = "buffer", "buffer `{}` destroyed", self.info.name);
        unsafe {
            self.allocator
                .destroy_buffer(self.buffer, &mut self.allocation);
        }
    }
}

impl Buffer {
    /// Creates a buffer and binds it to a fresh allocation.
    pub fn new(allocator: Allocator, info: &BufferInfo) -> VkResult<Self> {
        let (buffer, allocation) = unsafe {
            allocator.create_buffer(
                &info.to_buffer_create_info(),
                &info.memory.allocation_create_info(),
            )?
        };
        let memory_properties = allocator.get_allocation_memory_properties(&allocation);
        allocator.device().set_debug_name(buffer, &info.name);
        tracing::info!(
            component = "buffer",
            size = info.size,
            memory = ?info.memory,
            "buffer `{}` created",
            info.name
        );
        Ok(Self {
            allocator,
            allocation,
            buffer,
            info: info.clone(),
            memory_properties,
        })
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }
    pub fn info(&self) -> &BufferInfo {
        &self.info
    }
    pub fn name(&self) -> &str {
        &self.info.name
    }
    pub fn size(&self) -> vk::DeviceSize {
        self.info.size
    }
    /// Memory property flags of the memory type VMA picked.
    pub fn memory_properties(&self) -> vk::MemoryPropertyFlags {
        self.memory_properties
    }

    fn mapped_ptr(&self) -> *mut u8 {
        self.allocator
            .get_allocation_info(&self.allocation)
            .mapped_data as *mut u8
    }

    /// Returns the buffer's mapped memory, if host-visible.
    pub fn as_slice(&self) -> Option<&[u8]> {
        let ptr = self.mapped_ptr();
        if ptr.is_null() {
            return None;
        }
        if !self
            .memory_properties
            .contains(vk::MemoryPropertyFlags::HOST_CACHED)
        {
            tracing::warn!(
                component = "buffer",
                "reading from buffer `{}` that isn't HOST_CACHED",
                self.info.name
            );
        }
        Some(unsafe { std::slice::from_raw_parts(ptr, self.info.size as usize) })
    }

    /// Returns the buffer's mapped memory for writing, if host-visible.
    pub fn as_slice_mut(&mut self) -> Option<&mut [u8]> {
        let ptr = self.mapped_ptr();
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { std::slice::from_raw_parts_mut(ptr, self.info.size as usize) })
        }
    }

    /// Copies `data` into the mapped memory at `offset` and flushes the written range.
    pub fn write(&mut self, offset: vk::DeviceSize, data: &[u8]) -> Result<(), BufferAccessError> {
        let size = self.info.size;
        let len = data.len() as vk::DeviceSize;
        if offset.checked_add(len).is_none_or(|end| end > size) {
            return Err(BufferAccessError::OutOfBounds { offset, len, size });
        }
        let name = self.info.name.clone();
        let slice = self
            .as_slice_mut()
            .ok_or(BufferAccessError::NotHostVisible(name))?;
        slice[offset as usize..(offset + len) as usize].copy_from_slice(data);
        self.flush(offset..offset + len)?;
        Ok(())
    }

    /// Flushes the specified range to make CPU writes visible to the GPU.
    ///
    /// This is a no-op for `HOST_COHERENT` memory.
    pub fn flush(&mut self, range: impl RangeBounds<vk::DeviceSize>) -> VkResult<()> {
        if self
            .memory_properties
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        {
            return Ok(());
        }
        let (offset, size) = resolve_range(range, self.info.size);
        self.allocator
            .flush_allocation(&self.allocation, offset, size)
    }

    /// Invalidates the specified range to make GPU writes visible to the CPU.
    ///
    /// This is a no-op for `HOST_COHERENT` memory.
    pub fn invalidate(&mut self, range: impl RangeBounds<vk::DeviceSize>) -> VkResult<()> {
        if self
            .memory_properties
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        {
            return Ok(());
        }
        let (offset, size) = resolve_range(range, self.info.size);
        self.allocator
            .invalidate_allocation(&self.allocation, offset, size)
    }
}

/// Converts a range over a buffer of `len` bytes into `(offset, size)`.
fn resolve_range(
    range: impl RangeBounds<vk::DeviceSize>,
    len: vk::DeviceSize,
) -> (vk::DeviceSize, vk::DeviceSize) {
    let offset = match range.start_bound() {
        std::ops::Bound::Included(start) => *start,
        std::ops::Bound::Excluded(start) => start + 1,
        std::ops::Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        std::ops::Bound::Included(end) => end + 1,
        std::ops::Bound::Excluded(end) => *end,
        std::ops::Bound::Unbounded => len,
    };
    (offset, end.saturating_sub(offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_flags_to_usage() {
        let usage: vk::BufferUsageFlags = (BufferFlags::VERTEX | BufferFlags::COPY_DST).into();
        assert_eq!(
            usage,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
        );
        let usage: vk::BufferUsageFlags = BufferFlags::all().into();
        assert!(usage.contains(
            vk::BufferUsageFlags::INDIRECT_BUFFER
                | vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::UNIFORM_BUFFER
                | vk::BufferUsageFlags::INDEX_BUFFER
                | vk::BufferUsageFlags::TRANSFER_SRC
        ));
        assert_eq!(
            vk::BufferUsageFlags::from(BufferFlags::empty()),
            vk::BufferUsageFlags::empty()
        );
    }

    #[test]
    fn test_memory_kinds() {
        let gpu = BufferMemory::GpuOnly.allocation_create_info();
        assert!(
            !gpu.flags.contains(vk_mem::AllocationCreateFlags::MAPPED),
            "gpu-only buffers must not be mapped"
        );
        assert!(!BufferMemory::GpuOnly.is_host_visible());

        for memory in [
            BufferMemory::CpuOnly,
            BufferMemory::CpuToGpu,
            BufferMemory::GpuToCpu,
            BufferMemory::CpuAsBackup,
        ] {
            assert!(memory.is_host_visible());
            assert!(
                memory
                    .allocation_create_info()
                    .flags
                    .contains(vk_mem::AllocationCreateFlags::MAPPED),
                "{memory:?} should be persistently mapped"
            );
        }
        assert!(
            BufferMemory::GpuToCpu
                .allocation_create_info()
                .flags
                .contains(vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM),
            "readback needs cached memory"
        );
    }

    #[test]
    fn test_buffer_info_defaults() {
        let info = BufferInfo::default();
        assert_eq!(info.memory, BufferMemory::GpuOnly);
        let create_info = BufferInfo {
            size: 256,
            flags: BufferFlags::UNIFORM,
            ..Default::default()
        }
        .to_buffer_create_info();
        assert_eq!(create_info.size, 256);
        assert_eq!(create_info.sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert_eq!(create_info.usage, vk::BufferUsageFlags::UNIFORM_BUFFER);
    }

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(.., 64), (0, 64));
        assert_eq!(resolve_range(16..32, 64), (16, 16));
        assert_eq!(resolve_range(8..=15, 64), (8, 8));
        assert_eq!(resolve_range(60.., 64), (60, 4));
    }
}

/// VulkanBuffer - a vk::Buffer with its gpu-allocator allocation

use ash::vk;
use ember_gpu::ember::{BufferDesc, BufferUsage, MemoryClass, Result};
use ember_gpu::{engine_bail, engine_err, engine_warn};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use crate::vulkan_context::GpuContext;
use crate::vulkan_error::{allocation_error, vk_error};

/// Vulkan usage flags for engine buffer usage
pub(crate) fn usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    flags
}

/// gpu-allocator placement for a memory class
pub(crate) fn memory_location(class: MemoryClass) -> MemoryLocation {
    match class {
        MemoryClass::HostVisible => MemoryLocation::CpuToGpu,
        MemoryClass::DeviceLocal => MemoryLocation::GpuOnly,
        MemoryClass::HostReadback => MemoryLocation::GpuToCpu,
    }
}

/// Vulkan buffer and its backing memory
pub(crate) struct VulkanBuffer {
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation (None once destroyed)
    allocation: Option<Allocation>,
    /// Allocation identifier handed out to the core
    pub(crate) allocation_id: u64,
    /// Requested size in bytes
    pub(crate) size: u64,
}

impl VulkanBuffer {
    /// Create a buffer and bind freshly allocated memory
    pub(crate) fn create(ctx: &mut GpuContext, desc: &BufferDesc, allocation_id: u64) -> Result<Self> {
        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&buffer_create_info, None)
                .map_err(|e| vk_error(e, &format!("Failed to create buffer '{}' of {} bytes", desc.name, desc.size)))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocated = ctx.allocator_mut().and_then(|allocator| {
                allocator
                    .allocate(&AllocationCreateDesc {
                        name: desc.name,
                        requirements,
                        location: memory_location(desc.memory_class),
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| allocation_error(e, &format!(
                        "Out of GPU memory for '{}' (required: {:.2} MB)",
                        desc.name, requirements.size as f64 / (1024.0 * 1024.0)
                    )))
            });
            let allocation = match allocated {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                if let Ok(allocator) = ctx.allocator_mut() {
                    allocator.free(allocation).ok();
                }
                ctx.device.destroy_buffer(buffer, None);
                return Err(vk_error(e, "Failed to bind buffer memory"));
            }

            Ok(Self {
                buffer,
                allocation: Some(allocation),
                allocation_id,
                size: desc.size,
            })
        }
    }

    /// Host view of `size` bytes at `offset` (host-visible memory only)
    pub(crate) fn mapped_slice_mut(&mut self, offset: u64, size: u64) -> Result<&mut [u8]> {
        let range = self.range(offset, size)?;
        let mapped = self
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| engine_err!("ember::vulkan", "Buffer is not CPU-accessible"))?;
        Ok(&mut mapped[range])
    }

    /// Read-only host view of `size` bytes at `offset`
    pub(crate) fn mapped_slice(&self, offset: u64, size: u64) -> Result<&[u8]> {
        let range = self.range(offset, size)?;
        let mapped = self
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_slice())
            .ok_or_else(|| engine_err!("ember::vulkan", "Buffer is not CPU-accessible"))?;
        Ok(&mapped[range])
    }

    /// Free the memory and destroy the buffer
    pub(crate) fn destroy(mut self, ctx: &mut GpuContext) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                match ctx.allocator_mut() {
                    Ok(allocator) => {
                        if let Err(e) = allocator.free(allocation) {
                            engine_warn!("ember::vulkan", "Failed to free buffer memory: {}", e);
                        }
                    }
                    Err(_) => engine_warn!("ember::vulkan", "Buffer outlived the GPU allocator"),
                }
            }
            ctx.device.destroy_buffer(self.buffer, None);
        }
    }

    fn range(&self, offset: u64, size: u64) -> Result<std::ops::Range<usize>> {
        match offset.checked_add(size) {
            Some(end) if end <= self.size => Ok(offset as usize..end as usize),
            _ => engine_bail!("ember::vulkan",
                "Mapped range {}+{} exceeds buffer of {} bytes", offset, size, self.size),
        }
    }
}

#[cfg(test)]
#[path = "vulkan_buffer_tests.rs"]
mod tests;

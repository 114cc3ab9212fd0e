/// VulkanGraphicsDevice - GraphicsDevice implementation over ash + gpu-allocator
///
/// Buffers and descriptor pools are keyed by their raw Vulkan handle so the
/// identifiers handed to the core stay meaningful in validation messages.
/// Memory is persistently mapped by gpu-allocator; `write_mapped` and
/// `read_mapped` expose a bounds-checked sub-slice of that mapping for the
/// duration of the callback.

use ash::vk;
use ash::vk::Handle;
use ember_gpu::ember::{
    AllocationId, BufferDesc, DescriptorPoolDesc, DescriptorPoolId, DescriptorSetId,
    DescriptorSetLayoutId, DeviceBufferId, GraphicsDevice, MappedReader, MappedWriter, RawBuffer,
    Result,
};
use ember_gpu::{engine_bail, engine_debug, engine_info, engine_warn};
use rustc_hash::FxHashMap;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_config::VulkanConfig;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_pool;
use crate::vulkan_error::vk_error;
use crate::vulkan_transfer;

struct PoolEntry {
    pool: vk::DescriptorPool,
    allow_individual_free: bool,
}

/// Headless Vulkan device for the Ember memory core
pub struct VulkanGraphicsDevice {
    /// None once `shutdown` has run
    ctx: Option<GpuContext>,
    buffers: FxHashMap<u64, VulkanBuffer>,
    pools: FxHashMap<u64, PoolEntry>,
    next_allocation_id: u64,
}

impl VulkanGraphicsDevice {
    /// Create the Vulkan context described by `config`
    pub fn new(config: VulkanConfig) -> Result<Self> {
        let ctx = GpuContext::new(&config)?;
        engine_info!("ember::vulkan", "Vulkan graphics device ready");
        Ok(Self {
            ctx: Some(ctx),
            buffers: FxHashMap::default(),
            pools: FxHashMap::default(),
            next_allocation_id: 1,
        })
    }

    /// Number of live buffers
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live descriptor pools
    pub fn live_pool_count(&self) -> usize {
        self.pools.len()
    }

    fn ctx(&self) -> Result<&GpuContext> {
        match self.ctx.as_ref() {
            Some(ctx) => Ok(ctx),
            None => engine_bail!(UseAfterFree => "ember::vulkan", "Graphics device used after shutdown"),
        }
    }

    fn ctx_mut(&mut self) -> Result<&mut GpuContext> {
        match self.ctx.as_mut() {
            Some(ctx) => Ok(ctx),
            None => engine_bail!(UseAfterFree => "ember::vulkan", "Graphics device used after shutdown"),
        }
    }

    fn buffer(&self, raw: RawBuffer) -> Result<&VulkanBuffer> {
        match self.buffers.get(&raw.buffer.0) {
            Some(buffer) if buffer.allocation_id == raw.allocation.0 => Ok(buffer),
            _ => engine_bail!("ember::vulkan", "Unknown buffer {:#x}", raw.buffer.0),
        }
    }

    fn buffer_mut(&mut self, raw: RawBuffer) -> Result<&mut VulkanBuffer> {
        match self.buffers.get_mut(&raw.buffer.0) {
            Some(buffer) if buffer.allocation_id == raw.allocation.0 => Ok(buffer),
            _ => engine_bail!("ember::vulkan", "Unknown buffer {:#x}", raw.buffer.0),
        }
    }

    fn pool(&self, pool: DescriptorPoolId) -> Result<&PoolEntry> {
        match self.pools.get(&pool.0) {
            Some(entry) => Ok(entry),
            None => engine_bail!("ember::vulkan", "Unknown descriptor pool {:#x}", pool.0),
        }
    }

    fn release_all(&mut self) {
        let Some(mut ctx) = self.ctx.take() else {
            return;
        };
        unsafe {
            if let Err(e) = ctx.device.device_wait_idle() {
                engine_warn!("ember::vulkan", "device_wait_idle failed during shutdown: {:?}", e);
            }
        }

        if !self.pools.is_empty() {
            engine_warn!("ember::vulkan", "{} descriptor pool(s) still live at shutdown", self.pools.len());
        }
        for (_, entry) in self.pools.drain() {
            unsafe { ctx.device.destroy_descriptor_pool(entry.pool, None) };
        }

        if !self.buffers.is_empty() {
            engine_warn!("ember::vulkan", "{} buffer(s) still live at shutdown", self.buffers.len());
        }
        for (_, buffer) in self.buffers.drain() {
            buffer.destroy(&mut ctx);
        }

        drop(ctx);
        engine_info!("ember::vulkan", "Vulkan graphics device shut down");
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<RawBuffer> {
        if desc.size == 0 {
            engine_bail!(InvalidArgument => "ember::vulkan", "Buffer '{}' has zero size", desc.name);
        }
        let allocation_id = self.next_allocation_id;
        let buffer = VulkanBuffer::create(self.ctx_mut()?, desc, allocation_id)?;
        self.next_allocation_id += 1;

        let raw = RawBuffer {
            buffer: DeviceBufferId(buffer.buffer.as_raw()),
            allocation: AllocationId(allocation_id),
        };
        engine_debug!("ember::vulkan", "Created buffer '{}' {:#x} ({} bytes, {:?})",
            desc.name, raw.buffer.0, desc.size, desc.memory_class);
        self.buffers.insert(raw.buffer.0, buffer);
        Ok(raw)
    }

    fn destroy_buffer(&mut self, buffer: RawBuffer) -> Result<()> {
        self.buffer(buffer)?;
        let ctx = match self.ctx.as_mut() {
            Some(ctx) => ctx,
            None => engine_bail!(UseAfterFree => "ember::vulkan", "Graphics device used after shutdown"),
        };
        if let Some(vulkan_buffer) = self.buffers.remove(&buffer.buffer.0) {
            vulkan_buffer.destroy(ctx);
        }
        Ok(())
    }

    fn write_mapped(
        &mut self,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
        writer: &mut MappedWriter<'_>,
    ) -> Result<()> {
        self.ctx()?;
        let slice = self.buffer_mut(buffer)?.mapped_slice_mut(offset, size)?;
        writer(slice)
    }

    fn read_mapped(
        &mut self,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
        reader: &mut MappedReader<'_>,
    ) -> Result<()> {
        self.ctx()?;
        let slice = self.buffer(buffer)?.mapped_slice(offset, size)?;
        reader(slice)
    }

    fn copy_buffer(&mut self, src: RawBuffer, dst: RawBuffer, size: u64) -> Result<()> {
        let src_buffer = self.buffer(src)?;
        let dst_buffer = self.buffer(dst)?;
        if size > src_buffer.size || size > dst_buffer.size {
            engine_bail!(InvalidArgument => "ember::vulkan",
                "Copy of {} bytes exceeds source ({}) or destination ({})",
                size, src_buffer.size, dst_buffer.size);
        }
        vulkan_transfer::copy_buffer(self.ctx()?, src_buffer.buffer, dst_buffer.buffer, size)
    }

    fn create_descriptor_pool(&mut self, desc: &DescriptorPoolDesc) -> Result<DescriptorPoolId> {
        let pool = vulkan_descriptor_pool::create_pool(&self.ctx()?.device, desc)?;
        let id = pool.as_raw();
        self.pools.insert(id, PoolEntry { pool, allow_individual_free: desc.allow_individual_free });
        engine_debug!("ember::vulkan", "Created descriptor pool {:#x} (max {} sets)", id, desc.max_sets);
        Ok(DescriptorPoolId(id))
    }

    fn allocate_descriptor_sets(
        &mut self,
        pool: DescriptorPoolId,
        layout: DescriptorSetLayoutId,
        count: u32,
    ) -> Result<Vec<DescriptorSetId>> {
        let entry = self.pool(pool)?;
        let sets = vulkan_descriptor_pool::allocate_sets(
            &self.ctx()?.device,
            entry.pool,
            vk::DescriptorSetLayout::from_raw(layout.0),
            count,
        )?;
        Ok(sets.into_iter().map(|set| DescriptorSetId(set.as_raw())).collect())
    }

    fn free_descriptor_sets(&mut self, pool: DescriptorPoolId, sets: &[DescriptorSetId]) -> Result<()> {
        let entry = self.pool(pool)?;
        if !entry.allow_individual_free {
            engine_bail!("ember::vulkan", "Descriptor pool {:#x} does not allow freeing individual sets", pool.0);
        }
        let raw_sets: Vec<vk::DescriptorSet> = sets.iter().map(|set| vk::DescriptorSet::from_raw(set.0)).collect();
        unsafe {
            self.ctx()?
                .device
                .free_descriptor_sets(entry.pool, &raw_sets)
                .map_err(|e| vk_error(e, "Failed to free descriptor sets"))
        }
    }

    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolId) -> Result<()> {
        self.ctx()?;
        let Some(entry) = self.pools.remove(&pool.0) else {
            engine_bail!("ember::vulkan", "Unknown descriptor pool {:#x}", pool.0);
        };
        unsafe { self.ctx()?.device.destroy_descriptor_pool(entry.pool, None) };
        engine_debug!("ember::vulkan", "Destroyed descriptor pool {:#x}", pool.0);
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe {
            self.ctx()?
                .device
                .device_wait_idle()
                .map_err(|e| vk_error(e, "Failed to wait for device idle"))
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.ctx()?;
        self.release_all();
        Ok(())
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Device memory allocator - arena of buffer handles over a GraphicsDevice
///
/// Every live buffer is a slot in a generational table. A `BufferObject`
/// carries the slot key, so a handle whose slot has been released is
/// detected at the API boundary (`UseAfterFree` / `DoubleFree`) instead of
/// reaching the driver.
///
/// The allocator owns the device for its whole lifetime: created once at
/// device setup, torn down once with `shutdown`.

use slotmap::{new_key_type, Key, SlotMap};

use crate::device::{BufferDesc, BufferUsage, GraphicsDevice, MemoryClass, RawBuffer};
use crate::error::Result;
use crate::{engine_bail, engine_debug, engine_err, engine_info, engine_trace, engine_warn};

new_key_type! {
    /// Stable key of a buffer slot in the allocator arena
    pub struct BufferKey;
}

// ===== CONFIG =====

/// Allocator configuration
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Largest single allocation accepted, in bytes
    pub max_buffer_size: u64,
    /// Forward allocation names to the backend (otherwise "buffer")
    pub debug_names: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 1 << 30,
            debug_names: cfg!(debug_assertions),
        }
    }
}

// ===== BUFFER OBJECT =====

/// Handle to a device buffer owned by the allocator arena
///
/// Not `Clone`: exactly one owner holds a buffer until it frees it.
/// The empty buffer (size 0) owns no device storage.
#[derive(Debug, PartialEq, Eq)]
pub struct BufferObject {
    key: BufferKey,
    size: u64,
    usage: BufferUsage,
    memory_class: MemoryClass,
}

impl BufferObject {
    /// Placeholder for an empty payload: no slot, no device storage
    pub fn empty() -> Self {
        Self {
            key: BufferKey::null(),
            size: 0,
            usage: BufferUsage::empty(),
            memory_class: MemoryClass::DeviceLocal,
        }
    }

    /// Whether this is the empty placeholder
    pub fn is_empty(&self) -> bool {
        self.key.is_null()
    }

    pub fn key(&self) -> BufferKey {
        self.key
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn memory_class(&self) -> MemoryClass {
        self.memory_class
    }
}

// ===== STATS =====

/// Allocator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Buffers currently live
    pub live_buffers: u32,
    /// Live bytes in host-visible memory
    pub host_visible_bytes: u64,
    /// Live bytes in device-local memory
    pub device_local_bytes: u64,
    /// Live bytes in read-back memory
    pub host_readback_bytes: u64,
    /// Successful allocations since creation
    pub total_allocations: u64,
    /// Successful frees since creation
    pub total_frees: u64,
}

impl AllocatorStats {
    /// Live bytes for one memory class
    pub fn live_bytes(&self, class: MemoryClass) -> u64 {
        match class {
            MemoryClass::HostVisible => self.host_visible_bytes,
            MemoryClass::DeviceLocal => self.device_local_bytes,
            MemoryClass::HostReadback => self.host_readback_bytes,
        }
    }

    fn live_bytes_mut(&mut self, class: MemoryClass) -> &mut u64 {
        match class {
            MemoryClass::HostVisible => &mut self.host_visible_bytes,
            MemoryClass::DeviceLocal => &mut self.device_local_bytes,
            MemoryClass::HostReadback => &mut self.host_readback_bytes,
        }
    }
}

// ===== ALLOCATOR =====

struct BufferRecord {
    raw: RawBuffer,
    size: u64,
    memory_class: MemoryClass,
    name: &'static str,
}

/// Device memory allocator
pub struct MemoryAllocator {
    device: Box<dyn GraphicsDevice>,
    config: AllocatorConfig,
    buffers: SlotMap<BufferKey, BufferRecord>,
    stats: AllocatorStats,
    shut_down: bool,
}

impl MemoryAllocator {
    /// Take ownership of an initialized device
    pub fn new(device: Box<dyn GraphicsDevice>, config: AllocatorConfig) -> Self {
        engine_info!("ember::allocator",
            "Memory allocator initialized (max buffer size: {} bytes)", config.max_buffer_size);
        Self {
            device,
            config,
            buffers: SlotMap::with_key(),
            stats: AllocatorStats::default(),
            shut_down: false,
        }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn stats(&self) -> AllocatorStats {
        self.stats
    }

    /// Backend device, for descriptor pool operations
    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    /// Allocate a buffer of `size` bytes
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `size` is 0, exceeds `max_buffer_size`, or `usage` is empty
    ///   (the device is not called)
    /// - `OutOfDeviceMemory` / `OutOfHostMemory` from the backend, unchanged
    pub fn allocate(&mut self, size: u64, usage: BufferUsage, memory_class: MemoryClass) -> Result<BufferObject> {
        self.allocate_named(size, usage, memory_class, "buffer")
    }

    /// Allocate a buffer with a debug name
    pub fn allocate_named(
        &mut self,
        size: u64,
        usage: BufferUsage,
        memory_class: MemoryClass,
        name: &'static str,
    ) -> Result<BufferObject> {
        self.ensure_running()?;
        if size == 0 {
            engine_bail!(InvalidArgument => "ember::allocator", "Buffer size must be > 0 ({})", name);
        }
        if size > self.config.max_buffer_size {
            engine_bail!(InvalidArgument => "ember::allocator",
                "Buffer size {} exceeds the {} byte limit ({})", size, self.config.max_buffer_size, name);
        }
        if usage.is_empty() {
            engine_bail!(InvalidArgument => "ember::allocator", "Buffer usage must not be empty ({})", name);
        }

        let desc = BufferDesc {
            size,
            usage,
            memory_class,
            name: if self.config.debug_names { name } else { "buffer" },
        };
        let raw = self.device.create_buffer(&desc)?;

        let key = self.buffers.insert(BufferRecord { raw, size, memory_class, name });
        self.stats.live_buffers += 1;
        self.stats.total_allocations += 1;
        *self.stats.live_bytes_mut(memory_class) += size;

        engine_trace!("ember::allocator",
            "Allocated '{}' ({} bytes, {:?}, {:?})", name, size, memory_class, usage);

        Ok(BufferObject { key, size, usage, memory_class })
    }

    /// Release a buffer and its backing memory
    ///
    /// Freeing the empty buffer is a no-op. The caller guarantees no
    /// in-flight GPU work still references the buffer.
    ///
    /// # Errors
    ///
    /// `DoubleFree` if the buffer was already freed.
    pub fn free(&mut self, buffer: &BufferObject) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        self.ensure_running()?;
        let record = self.buffers.remove(buffer.key).ok_or_else(|| {
            engine_err!(DoubleFree => "ember::allocator",
                "Buffer {:?} ({} bytes) freed twice", buffer.key, buffer.size)
        })?;

        self.stats.live_buffers -= 1;
        self.stats.total_frees += 1;
        *self.stats.live_bytes_mut(record.memory_class) -= record.size;

        engine_trace!("ember::allocator", "Freeing '{}' ({} bytes)", record.name, record.size);
        self.device.destroy_buffer(record.raw)
    }

    /// Whether `buffer` still refers to a live slot
    pub fn is_live(&self, buffer: &BufferObject) -> bool {
        !buffer.is_empty() && self.buffers.contains_key(buffer.key)
    }

    /// Backend identifiers of a live buffer, e.g. to bind it for drawing
    ///
    /// # Errors
    ///
    /// `UseAfterFree` for a freed buffer, `InvalidArgument` for the empty buffer.
    pub fn resolve(&self, buffer: &BufferObject) -> Result<RawBuffer> {
        self.record(buffer).map(|record| record.raw)
    }

    /// Write `data` at `offset` into a host-visible buffer
    pub fn write(&mut self, buffer: &BufferObject, offset: u64, data: &[u8]) -> Result<()> {
        self.require_host_visible(buffer)?;
        let size = data.len() as u64;
        self.check_range(buffer, offset, size)?;
        self.map_write(buffer, offset, size, &mut |mapped: &mut [u8]| {
            mapped.copy_from_slice(data);
            Ok(())
        })
    }

    /// Read `size` bytes at `offset` from a host-mappable buffer
    pub fn read(&mut self, buffer: &BufferObject, offset: u64, size: u64) -> Result<Vec<u8>> {
        let raw = self.resolve(buffer)?;
        if !buffer.memory_class.is_host_mappable() {
            engine_bail!(InvalidArgument => "ember::allocator",
                "Cannot read a {:?} buffer from the host", buffer.memory_class);
        }
        self.check_range(buffer, offset, size)?;

        let mut out = Vec::with_capacity(size as usize);
        self.device.read_mapped(raw, offset, size, &mut |mapped: &[u8]| {
            out.extend_from_slice(mapped);
            Ok(())
        })?;
        Ok(out)
    }

    /// Map a host-visible range, run `writer` once over it, unmap
    pub(crate) fn map_write(
        &mut self,
        buffer: &BufferObject,
        offset: u64,
        size: u64,
        writer: &mut dyn FnMut(&mut [u8]) -> Result<()>,
    ) -> Result<()> {
        let raw = self.resolve(buffer)?;
        self.device.write_mapped(raw, offset, size, writer)
    }

    /// Record a device-side copy of `size` bytes from `src` to `dst`
    ///
    /// # Errors
    ///
    /// - `UseAfterFree` if either buffer was freed
    /// - `InvalidArgument` for missing transfer usage, a zero size, or a size
    ///   larger than either buffer
    pub fn copy(&mut self, src: &BufferObject, dst: &BufferObject, size: u64) -> Result<()> {
        let src_raw = self.resolve(src)?;
        let dst_raw = self.resolve(dst)?;
        if !src.usage.contains(BufferUsage::TRANSFER_SRC) {
            engine_bail!(InvalidArgument => "ember::allocator", "Copy source lacks TRANSFER_SRC usage");
        }
        if !dst.usage.contains(BufferUsage::TRANSFER_DST) {
            engine_bail!(InvalidArgument => "ember::allocator", "Copy destination lacks TRANSFER_DST usage");
        }
        if size == 0 || size > src.size || size > dst.size {
            engine_bail!(InvalidArgument => "ember::allocator",
                "Copy of {} bytes does not fit (source {} bytes, destination {} bytes)",
                size, src.size, dst.size);
        }
        engine_trace!("ember::allocator", "Copying {} bytes", size);
        self.device.copy_buffer(src_raw, dst_raw, size)
    }

    /// Tear down the device context
    ///
    /// Buffers still live are reported and released. No operation is
    /// accepted afterwards.
    pub fn shutdown(mut self) -> Result<()> {
        self.release_all()
    }

    fn release_all(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        self.device.wait_idle()?;
        if !self.buffers.is_empty() {
            engine_warn!("ember::allocator",
                "{} buffer(s) still live at shutdown, releasing", self.buffers.len());
        }
        for (_, record) in self.buffers.drain() {
            engine_debug!("ember::allocator", "Releasing leaked '{}' ({} bytes)", record.name, record.size);
            self.device.destroy_buffer(record.raw)?;
        }
        self.stats.live_buffers = 0;
        self.stats.host_visible_bytes = 0;
        self.stats.device_local_bytes = 0;
        self.stats.host_readback_bytes = 0;

        self.device.shutdown()?;
        engine_info!("ember::allocator", "Memory allocator shut down");
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shut_down {
            engine_bail!(UseAfterFree => "ember::allocator", "Allocator used after shutdown");
        }
        Ok(())
    }

    fn record(&self, buffer: &BufferObject) -> Result<&BufferRecord> {
        if buffer.is_empty() {
            engine_bail!(InvalidArgument => "ember::allocator", "The empty buffer has no device storage");
        }
        self.ensure_running()?;
        self.buffers.get(buffer.key).ok_or_else(|| {
            engine_err!(UseAfterFree => "ember::allocator",
                "Buffer {:?} ({} bytes) used after free", buffer.key, buffer.size)
        })
    }

    fn require_host_visible(&self, buffer: &BufferObject) -> Result<()> {
        self.record(buffer)?;
        if buffer.memory_class != MemoryClass::HostVisible {
            engine_bail!(InvalidArgument => "ember::allocator",
                "Cannot write a {:?} buffer from the host", buffer.memory_class);
        }
        Ok(())
    }

    fn check_range(&self, buffer: &BufferObject, offset: u64, size: u64) -> Result<()> {
        match offset.checked_add(size) {
            Some(end) if end <= buffer.size => Ok(()),
            _ => Err(engine_err!(InvalidArgument => "ember::allocator",
                "Range {}+{} exceeds buffer of {} bytes", offset, size, buffer.size)),
        }
    }
}

impl Drop for MemoryAllocator {
    fn drop(&mut self) {
        if let Err(e) = self.release_all() {
            engine_warn!("ember::allocator", "Allocator teardown failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "allocator_tests.rs"]
mod tests;

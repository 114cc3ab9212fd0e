/// GraphicsDevice trait - the primitives a backend exposes to the memory core

use crate::error::Result;
use crate::device::{
    BufferDesc, RawBuffer, DescriptorPoolDesc, DescriptorPoolId, DescriptorSetId,
    DescriptorSetLayoutId,
};

/// Host write callback over a mapped, bounds-limited range
pub type MappedWriter<'a> = dyn FnMut(&mut [u8]) -> Result<()> + 'a;

/// Host read callback over a mapped, bounds-limited range
pub type MappedReader<'a> = dyn FnMut(&[u8]) -> Result<()> + 'a;

/// Backend device trait
///
/// Implemented by backend-specific devices (e.g. VulkanGraphicsDevice).
/// Every method is synchronous from the caller's point of view. The trait
/// performs no liveness bookkeeping: handle validation lives in
/// `MemoryAllocator` and `DescriptorSets`.
pub trait GraphicsDevice: Send {
    /// Create a buffer and bind freshly allocated memory of the requested class
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<RawBuffer>;

    /// Destroy a buffer and release its memory allocation together
    fn destroy_buffer(&mut self, buffer: RawBuffer) -> Result<()>;

    /// Map `size` bytes at `offset`, run `writer` once over them, then unmap
    ///
    /// The range is unmapped on every exit path, including a failing writer.
    fn write_mapped(
        &mut self,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
        writer: &mut MappedWriter<'_>,
    ) -> Result<()>;

    /// Map `size` bytes at `offset` for reading, run `reader` once, then unmap
    fn read_mapped(
        &mut self,
        buffer: RawBuffer,
        offset: u64,
        size: u64,
        reader: &mut MappedReader<'_>,
    ) -> Result<()>;

    /// Copy `size` bytes from the start of `src` to the start of `dst`
    ///
    /// On return the copy is ordered before any later read of `dst`
    /// recorded by the renderer.
    fn copy_buffer(&mut self, src: RawBuffer, dst: RawBuffer, size: u64) -> Result<()>;

    /// Create a descriptor pool
    fn create_descriptor_pool(&mut self, desc: &DescriptorPoolDesc) -> Result<DescriptorPoolId>;

    /// Allocate `count` descriptor sets sharing one layout
    fn allocate_descriptor_sets(
        &mut self,
        pool: DescriptorPoolId,
        layout: DescriptorSetLayoutId,
        count: u32,
    ) -> Result<Vec<DescriptorSetId>>;

    /// Return individual sets to a live pool
    fn free_descriptor_sets(&mut self, pool: DescriptorPoolId, sets: &[DescriptorSetId]) -> Result<()>;

    /// Destroy a pool, releasing every set it issued in one operation
    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolId) -> Result<()>;

    /// Block until the device has finished all submitted work
    fn wait_idle(&mut self) -> Result<()>;

    /// Tear down device-wide allocator state
    ///
    /// Called once by `MemoryAllocator::shutdown`; no other method may be
    /// called afterwards.
    fn shutdown(&mut self) -> Result<()>;
}

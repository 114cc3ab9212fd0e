/// Global buffer manager - combines many draw payloads into one device buffer
///
/// Payloads are laid out back to back in input order through a single
/// staging upload. A build either returns one buffer holding every payload
/// or fails with nothing left allocated.

use crate::device::{BufferUsage, MemoryClass};
use crate::error::Result;
use crate::memory::allocator::{BufferObject, MemoryAllocator};
use crate::memory::staging::{copy_and_release, discard, upload_via_staging, StagingWriter};
use crate::{engine_bail, engine_debug, engine_err, engine_warn};

// ===== PAYLOAD DESCRIPTOR =====

/// Per-draw data producer consumed by the buffer manager
///
/// The manager reads the stride and count to size the combined buffer, then
/// calls `write_bytes` exactly once. `write_bytes` must produce exactly
/// `element_stride() * element_count()` bytes.
pub trait RenderPayloadDescriptor {
    /// Size of one element in bytes
    fn element_stride(&self) -> u64;

    /// Number of elements
    fn element_count(&self) -> u64;

    /// Append this payload's bytes to `writer`
    fn write_bytes(&self, writer: &mut StagingWriter<'_>) -> Result<()>;

    /// `stride * count`, or `None` on overflow
    fn byte_size(&self) -> Option<u64> {
        self.element_stride().checked_mul(self.element_count())
    }
}

impl<T: RenderPayloadDescriptor + ?Sized> RenderPayloadDescriptor for &T {
    fn element_stride(&self) -> u64 {
        (**self).element_stride()
    }

    fn element_count(&self) -> u64 {
        (**self).element_count()
    }

    fn write_bytes(&self, writer: &mut StagingWriter<'_>) -> Result<()> {
        (**self).write_bytes(writer)
    }
}

impl<T: RenderPayloadDescriptor + ?Sized> RenderPayloadDescriptor for Box<T> {
    fn element_stride(&self) -> u64 {
        (**self).element_stride()
    }

    fn element_count(&self) -> u64 {
        (**self).element_count()
    }

    fn write_bytes(&self, writer: &mut StagingWriter<'_>) -> Result<()> {
        (**self).write_bytes(writer)
    }
}

// ===== LAYOUT =====

/// Placement of each payload inside the combined buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferLayout {
    /// Sum of `stride * count` over every payload
    pub total_size: u64,
    /// Byte offset of each payload, in input order
    pub offsets: Vec<u64>,
}

impl BufferLayout {
    /// Compute the layout of `payloads`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a payload size or the total overflows `u64`.
    pub fn compute<P: RenderPayloadDescriptor>(payloads: &[P]) -> Result<Self> {
        let mut offsets = Vec::with_capacity(payloads.len());
        let mut total_size: u64 = 0;
        for (index, payload) in payloads.iter().enumerate() {
            offsets.push(total_size);
            total_size = payload
                .byte_size()
                .and_then(|size| total_size.checked_add(size))
                .ok_or_else(|| engine_err!(InvalidArgument => "ember::buffer_manager",
                    "Payload {} ({} x {} bytes) overflows the combined buffer size",
                    index, payload.element_count(), payload.element_stride()))?;
        }
        Ok(Self { total_size, offsets })
    }

    /// Byte range of payload `index`
    pub fn range(&self, index: usize) -> Option<std::ops::Range<u64>> {
        let start = *self.offsets.get(index)?;
        let end = self.offsets.get(index + 1).copied().unwrap_or(self.total_size);
        Some(start..end)
    }
}

// ===== MANAGER =====

/// Builds combined vertex and index buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalBufferManager {
    extra_usage: BufferUsage,
}

impl Default for GlobalBufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalBufferManager {
    pub fn new() -> Self {
        Self { extra_usage: BufferUsage::empty() }
    }

    /// Add usage flags to every built buffer (e.g. TRANSFER_SRC for read-back)
    pub fn with_extra_usage(extra_usage: BufferUsage) -> Self {
        Self { extra_usage }
    }

    pub fn extra_usage(&self) -> BufferUsage {
        self.extra_usage
    }

    /// Build one device-local vertex buffer holding every payload in order
    ///
    /// An empty payload sequence (or one whose total size is 0) returns
    /// `BufferObject::empty()` without touching the device.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if a payload writes a byte count other than its
    ///   declared `stride * count`, or sizes overflow
    /// - allocation and copy errors, unchanged
    ///
    /// On error no buffer is left allocated.
    pub fn build_vertex_buffer<P: RenderPayloadDescriptor>(
        &self,
        allocator: &mut MemoryAllocator,
        payloads: &[P],
    ) -> Result<BufferObject> {
        self.build(allocator, payloads, BufferUsage::VERTEX, "global_vertex_buffer")
    }

    /// Build one device-local index buffer; same contract as `build_vertex_buffer`
    pub fn build_index_buffer<P: RenderPayloadDescriptor>(
        &self,
        allocator: &mut MemoryAllocator,
        payloads: &[P],
    ) -> Result<BufferObject> {
        self.build(allocator, payloads, BufferUsage::INDEX, "global_index_buffer")
    }

    fn build<P: RenderPayloadDescriptor>(
        &self,
        allocator: &mut MemoryAllocator,
        payloads: &[P],
        usage: BufferUsage,
        name: &'static str,
    ) -> Result<BufferObject> {
        let layout = BufferLayout::compute(payloads)?;
        if layout.total_size == 0 {
            engine_debug!("ember::buffer_manager", "No payload bytes for '{}', returning empty buffer", name);
            return Ok(BufferObject::empty());
        }

        let staging = upload_via_staging(allocator, layout.total_size, |writer| {
            for (index, payload) in payloads.iter().enumerate() {
                let start = writer.position();
                payload.write_bytes(writer)?;
                let written = (writer.position() - start) as u64;
                let declared = payload.element_stride() * payload.element_count();
                if written != declared {
                    engine_bail!(InvalidArgument => "ember::buffer_manager",
                        "Payload {} wrote {} bytes but declared {}", index, written, declared);
                }
            }
            Ok(())
        })?;

        let destination = match allocator.allocate_named(
            layout.total_size,
            BufferUsage::TRANSFER_DST | usage | self.extra_usage,
            MemoryClass::DeviceLocal,
            name,
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                if let Err(discard_err) = discard(allocator, staging) {
                    engine_warn!("ember::buffer_manager", "Failed to discard staging buffer: {}", discard_err);
                }
                return Err(e);
            }
        };

        if let Err(e) = copy_and_release(allocator, staging, &destination, layout.total_size) {
            if let Err(free_err) = allocator.free(&destination) {
                engine_warn!("ember::buffer_manager", "Failed to free '{}' after copy error: {}", name, free_err);
            }
            return Err(e);
        }

        engine_debug!("ember::buffer_manager",
            "Built '{}' from {} payload(s), {} bytes", name, payloads.len(), layout.total_size);
        Ok(destination)
    }
}

#[cfg(test)]
#[path = "global_buffer_manager_tests.rs"]
mod tests;

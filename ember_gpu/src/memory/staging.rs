/// Staging transfer pipeline
///
/// Host data reaches device-local memory through a transient host-visible
/// buffer: allocate, map, write through a bounds-checked view, unmap, copy
/// on the device, free. A `StagingBuffer` never outlives the upload that
/// created it: `copy_and_release` and `discard` both consume it.

use bytemuck::Pod;

use crate::device::{BufferUsage, MemoryClass};
use crate::error::{Error, Result};
use crate::memory::allocator::{BufferObject, MemoryAllocator};
use crate::{engine_bail, engine_err, engine_trace, engine_warn};

// ===== WRITER =====

/// Bounds-checked, append-only view over a mapped staging range
///
/// Writes past the end are rejected with `InvalidArgument` and leave the
/// view untouched.
pub struct StagingWriter<'a> {
    data: &'a mut [u8],
    position: usize,
}

impl<'a> StagingWriter<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Append raw bytes
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.position + bytes.len();
        if end > self.data.len() {
            engine_bail!(InvalidArgument => "ember::staging",
                "Staging write of {} bytes at offset {} overflows {} byte buffer",
                bytes.len(), self.position, self.data.len());
        }
        self.data[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    /// Append a slice of plain-old-data values
    pub fn write_pod<T: Pod>(&mut self, values: &[T]) -> Result<()> {
        self.write(bytemuck::cast_slice(values))
    }

    /// Bytes written so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total size of the view
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

// ===== STAGING BUFFER =====

/// Transient host-visible buffer holding bytes on their way to the device
#[must_use = "a staging buffer must be passed to copy_and_release or discard"]
#[derive(Debug)]
pub struct StagingBuffer {
    buffer: BufferObject,
    written: u64,
}

impl StagingBuffer {
    pub fn buffer(&self) -> &BufferObject {
        &self.buffer
    }

    /// Declared size in bytes
    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    /// Bytes the writer actually produced (trailing bytes are undefined)
    pub fn written(&self) -> u64 {
        self.written
    }
}

// ===== OPERATIONS =====

/// Allocate a host-visible staging buffer of exactly `size` bytes and fill it
///
/// `writer` is invoked exactly once with a view of `size` bytes. The range is
/// unmapped on every exit path; if `writer` fails the staging buffer is
/// freed before the error is returned.
///
/// # Errors
///
/// - `InvalidArgument` for a zero size or a writer overflowing the view
/// - `OutOfDeviceMemory` / `OutOfHostMemory` from the allocator, unchanged
/// - any error returned by `writer`
pub fn upload_via_staging<F>(allocator: &mut MemoryAllocator, size: u64, writer: F) -> Result<StagingBuffer>
where
    F: FnOnce(&mut StagingWriter<'_>) -> Result<()>,
{
    let buffer = allocator.allocate_named(size, BufferUsage::TRANSFER_SRC, MemoryClass::HostVisible, "staging_buffer")?;

    let mut writer = Some(writer);
    let mut written = 0usize;
    let result = allocator.map_write(&buffer, 0, size, &mut |mapped: &mut [u8]| {
        let writer = writer
            .take()
            .ok_or_else(|| Error::BackendError("staging writer invoked twice".to_string()))?;
        let mut view = StagingWriter::new(mapped);
        writer(&mut view)?;
        written = view.position();
        Ok(())
    });

    if let Err(e) = result {
        if let Err(free_err) = allocator.free(&buffer) {
            engine_warn!("ember::staging", "Failed to free staging buffer after write error: {}", free_err);
        }
        return Err(e);
    }

    engine_trace!("ember::staging", "Staged {} of {} bytes", written, size);
    Ok(StagingBuffer { buffer, written: written as u64 })
}

/// Copy `size` bytes from `staging` into `destination`, then free `staging`
///
/// The staging buffer is freed whether or not the copy succeeds; the copy
/// error, if any, is returned.
///
/// # Errors
///
/// - `InvalidArgument` if `size` exceeds the staging buffer or the destination,
///   or the destination lacks TRANSFER_DST usage
/// - `UseAfterFree` if `destination` was freed
pub fn copy_and_release(
    allocator: &mut MemoryAllocator,
    staging: StagingBuffer,
    destination: &BufferObject,
    size: u64,
) -> Result<()> {
    let copy_result = allocator.copy(&staging.buffer, destination, size);
    let free_result = allocator.free(&staging.buffer);
    copy_result?;
    free_result
}

/// Free a staging buffer without copying it anywhere
pub fn discard(allocator: &mut MemoryAllocator, staging: StagingBuffer) -> Result<()> {
    allocator.free(&staging.buffer)
}

/// Read `size` bytes of a device buffer back to the host
///
/// Copies into a transient read-back buffer, reads it, frees it. The source
/// needs TRANSFER_SRC usage.
pub fn download_via_staging(allocator: &mut MemoryAllocator, source: &BufferObject, size: u64) -> Result<Vec<u8>> {
    if size == 0 || size > source.size() {
        return Err(engine_err!(InvalidArgument => "ember::staging",
            "Cannot read back {} bytes from a {} byte buffer", size, source.size()));
    }
    let readback = allocator.allocate_named(size, BufferUsage::TRANSFER_DST, MemoryClass::HostReadback, "readback_buffer")?;

    let result = allocator
        .copy(source, &readback, size)
        .and_then(|_| allocator.read(&readback, 0, size));
    let free_result = allocator.free(&readback);
    let bytes = result?;
    free_result?;
    Ok(bytes)
}

#[cfg(test)]
#[path = "staging_tests.rs"]
mod tests;

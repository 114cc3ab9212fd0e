/// Buffer usage flags, memory classes and the raw buffer descriptor

use bitflags::bitflags;

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Source of a transfer (copy) command
        const TRANSFER_SRC = 1 << 0;
        /// Destination of a transfer (copy) command
        const TRANSFER_DST = 1 << 1;
        /// Vertex buffer
        const VERTEX = 1 << 2;
        /// Index buffer
        const INDEX = 1 << 3;
        /// Uniform/constant buffer
        const UNIFORM = 1 << 4;
        /// Storage buffer
        const STORAGE = 1 << 5;
    }
}

/// Placement intent for an allocation
///
/// Callers never pick raw memory types, only what the memory is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryClass {
    /// Host-visible, host-coherent memory written by the CPU (staging)
    HostVisible,
    /// GPU-resident memory for steady-state rendering; not host-mappable
    DeviceLocal,
    /// Host-visible memory the GPU writes and the CPU reads back
    HostReadback,
}

impl MemoryClass {
    /// Whether the host can map memory of this class
    pub fn is_host_mappable(&self) -> bool {
        !matches!(self, MemoryClass::DeviceLocal)
    }
}

/// Descriptor for creating a device buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes (never 0 once it reaches a backend)
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Memory placement intent
    pub memory_class: MemoryClass,
    /// Debug name forwarded to the backend allocator
    pub name: &'static str,
}

/// Opaque device-buffer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceBufferId(pub u64);

/// Opaque memory-allocation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationId(pub u64);

/// Backend pair of identifiers for one live buffer
///
/// The device buffer and its backing allocation are created and destroyed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawBuffer {
    pub buffer: DeviceBufferId,
    pub allocation: AllocationId,
}

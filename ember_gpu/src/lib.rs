/*!
# Ember GPU

Platform-agnostic GPU resource lifecycle core.

This crate owns buffer allocation, staged host-to-device uploads, combined
vertex/index buffer builds and descriptor set tracking. Backends (e.g. the
Vulkan backend in `ember_gpu_vulkan`) plug in through the `GraphicsDevice`
trait.

## Architecture

- **GraphicsDevice**: Backend trait (buffers, mapping, copies, descriptor pools)
- **MemoryAllocator**: Arena of buffer handles with use-after-free detection
- **Staging**: `upload_via_staging` / `copy_and_release` / `download_via_staging`
- **GlobalBufferManager**: Combines draw payloads into one device buffer
- **DescriptorSets**: Per-pool descriptor set tracking (`free` vs `clear`)
*/

// Internal modules
mod error;
pub mod log;
pub mod device;
pub mod memory;
pub mod vertex;
pub mod descriptor;

// Main ember namespace module
pub mod ember {
    // Error types
    pub use crate::error::{Error, Result};

    // Backend boundary
    pub use crate::device::{
        GraphicsDevice, MappedReader, MappedWriter, BufferDesc, BufferUsage, MemoryClass,
        RawBuffer, DeviceBufferId, AllocationId, DescriptorPoolDesc, DescriptorPoolId,
        DescriptorSetId, DescriptorSetLayoutId,
    };

    // Logging sub-module (types and functions, NOT macros)
    pub mod log {
        pub use crate::log::{
            Logger, LogEntry, LogSeverity, DefaultLogger,
            set_logger, reset_logger, set_min_severity, min_severity, emit, emit_detailed,
        };
    }

    // Memory sub-module
    pub mod memory {
        pub use crate::memory::*;
    }

    // Vertex sub-module
    pub mod vertex {
        pub use crate::vertex::*;
    }

    // Descriptor sub-module
    pub mod descriptor {
        pub use crate::descriptor::*;
    }
}

// Re-export math library at crate root
pub use glam;

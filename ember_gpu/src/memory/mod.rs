/// Memory module - allocator, staging uploads and combined buffer builds

pub mod allocator;
pub mod staging;
pub mod global_buffer_manager;

pub use allocator::{AllocatorConfig, AllocatorStats, BufferKey, BufferObject, MemoryAllocator};
pub use staging::{
    copy_and_release, discard, download_via_staging, upload_via_staging, StagingBuffer, StagingWriter,
};
pub use global_buffer_manager::{BufferLayout, GlobalBufferManager, RenderPayloadDescriptor};

/*!
# Ember GPU - Vulkan Backend

Headless Vulkan implementation of the `ember_gpu` `GraphicsDevice` trait,
using ash for Vulkan bindings and gpu-allocator for memory sub-allocation.

```no_run
use ember_gpu::ember::memory::{MemoryAllocator, AllocatorConfig};
use ember_gpu_vulkan::ember::{VulkanGraphicsDevice, VulkanConfig};

let device = VulkanGraphicsDevice::new(VulkanConfig::default())?;
let allocator = MemoryAllocator::new(Box::new(device), AllocatorConfig::default());
allocator.shutdown()?;
# Ok::<(), ember_gpu::ember::Error>(())
```
*/

mod vulkan_config;
mod vulkan_error;
mod vulkan_context;
mod vulkan_buffer;
mod vulkan_transfer;
mod vulkan_descriptor_pool;
mod vulkan_graphics_device;

#[cfg(feature = "vulkan-validation")]
mod debug;

/// Public API of the Vulkan backend
pub mod ember {
    pub use crate::vulkan_config::{DebugSeverity, VulkanConfig};
    pub use crate::vulkan_graphics_device::VulkanGraphicsDevice;

    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
}

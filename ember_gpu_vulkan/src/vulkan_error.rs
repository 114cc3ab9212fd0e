/// Mapping of Vulkan and gpu-allocator failures onto the engine error taxonomy

use ash::vk;
use ember_gpu::ember::Error;
use ember_gpu::engine_error;
use gpu_allocator::AllocationError;

/// Error variant for a failed Vulkan call (not logged)
pub(crate) fn classify_vk_result(result: vk::Result, context: &str) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Error::OutOfDeviceMemory,
        vk::Result::ERROR_OUT_OF_HOST_MEMORY => Error::OutOfHostMemory,
        other => Error::BackendError(format!("{}: {:?}", context, other)),
    }
}

/// Log a failed Vulkan call and convert it
pub(crate) fn vk_error(result: vk::Result, context: &str) -> Error {
    engine_error!("ember::vulkan", "{}: {:?}", context, result);
    classify_vk_result(result, context)
}

/// Log a failed gpu-allocator call and convert it
pub(crate) fn allocation_error(error: AllocationError, context: &str) -> Error {
    engine_error!("ember::vulkan", "{}: {}", context, error);
    match error {
        AllocationError::OutOfMemory => Error::OutOfDeviceMemory,
        other => Error::BackendError(format!("{}: {}", context, other)),
    }
}

#[cfg(test)]
#[path = "vulkan_error_tests.rs"]
mod tests;

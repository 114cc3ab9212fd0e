/// Device module - the backend boundary (driver-equivalent layer)

// Module declarations
pub mod graphics_device;
pub mod buffer;
pub mod descriptor;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use buffer::*;
pub use descriptor::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;

/// Vulkan backend configuration

/// Debug message severity filter for the validation messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose
    All,
}

/// Configuration for `VulkanGraphicsDevice::new`
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    /// Enable VK_LAYER_KHRONOS_validation and the debug messenger
    ///
    /// Only honored when the crate is built with the `vulkan-validation` feature.
    pub enable_validation: bool,
    /// Application name reported to the driver
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Pick a discrete GPU when one is available
    pub prefer_discrete_gpu: bool,
    /// Which validation messages reach the engine log
    pub debug_severity: DebugSeverity,
    /// Count validation messages (see `validation_stats`)
    pub enable_validation_stats: bool,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Ember Application".to_string(),
            app_version: (0, 1, 0),
            prefer_discrete_gpu: true,
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            enable_validation_stats: cfg!(debug_assertions),
        }
    }
}

impl VulkanConfig {
    /// Whether validation layers will actually be loaded
    pub fn validation_active(&self) -> bool {
        cfg!(feature = "vulkan-validation") && self.enable_validation
    }
}

#[cfg(test)]
#[path = "vulkan_config_tests.rs"]
mod tests;

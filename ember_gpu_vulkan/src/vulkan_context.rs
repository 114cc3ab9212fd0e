/// GpuContext - headless Vulkan instance, device, queue and memory allocator
///
/// Everything a buffer or descriptor operation needs:
/// - Device for Vulkan API calls
/// - Allocator for memory sub-allocation
/// - Queue + one-shot command pool + fence for synchronous copies

use ash::vk;
use ember_gpu::ember::{Error, Result};
use ember_gpu::{engine_bail, engine_debug, engine_err, engine_info, engine_warn};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use std::ffi::CString;

use crate::vulkan_config::VulkanConfig;

/// Shared GPU context, owned by `VulkanGraphicsDevice`
///
/// Destruction order lives in `Drop`: allocator memory pages are released
/// before the device, the debug messenger before the instance.
pub struct GpuContext {
    /// Vulkan entry (must outlive the instance)
    _entry: ash::Entry,

    /// Vulkan instance
    pub(crate) instance: ash::Instance,

    /// Vulkan logical device
    pub(crate) device: ash::Device,

    /// GPU memory allocator (taken in Drop before the device is destroyed)
    pub(crate) allocator: Option<Allocator>,

    /// Queue used for transfers (graphics-capable family)
    pub(crate) queue: vk::Queue,

    /// Reusable command pool for one-shot copy operations
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub(crate) upload_command_pool: vk::CommandPool,

    /// Fence signaled when a one-shot copy completes
    pub(crate) upload_fence: vk::Fence,

    /// Debug utils loader and messenger (validation only)
    #[cfg(feature = "vulkan-validation")]
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl GpuContext {
    /// Create instance, device, allocator, upload pool and fence
    pub fn new(config: &VulkanConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_failed(format!("Failed to load Vulkan library: {:?}", e)))?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|_| init_failed("Application name contains a NUL byte".to_string()))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Ember")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let validation = config.validation_active();
            let mut extension_names = Vec::new();
            let mut layer_names = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error(e, "Failed to create Vulkan instance"))?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger = if validation {
                match Self::create_debug_messenger(&entry, &instance, config) {
                    Ok(messenger) => Some(messenger),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            let picked = Self::pick_physical_device(&instance, config.prefer_discrete_gpu);
            let (physical_device, queue_family) = match picked {
                Ok(picked) => picked,
                Err(e) => {
                    #[cfg(feature = "vulkan-validation")]
                    if let Some((loader, messenger)) = &debug_messenger {
                        loader.destroy_debug_utils_messenger(*messenger, None);
                    }
                    instance.destroy_instance(None);
                    return Err(e);
                }
            };

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)];
            let device_create_info = vk::DeviceCreateInfo::default().queue_create_infos(&queue_create_infos);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_error(e, "Failed to create logical device"))?;
            let queue = device.get_device_queue(queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_failed(format!("Failed to create GPU allocator: {}", e)))?;

            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = device
                .create_command_pool(&upload_pool_create_info, None)
                .map_err(|e| init_error(e, "Failed to create upload command pool"))?;

            let upload_fence = device
                .create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| init_error(e, "Failed to create upload fence"))?;

            let properties = instance.get_physical_device_properties(physical_device);
            engine_info!("ember::vulkan", "Using GPU '{}' (queue family {})",
                properties.device_name_as_c_str().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
                queue_family);

            Ok(Self {
                _entry: entry,
                instance,
                device,
                allocator: Some(allocator),
                queue,
                upload_command_pool,
                upload_fence,
                #[cfg(feature = "vulkan-validation")]
                debug_messenger,
            })
        }
    }

    /// The memory allocator, for as long as the context is alive
    pub(crate) fn allocator_mut(&mut self) -> Result<&mut Allocator> {
        match self.allocator.as_mut() {
            Some(allocator) => Ok(allocator),
            None => engine_bail!(UseAfterFree => "ember::vulkan", "GPU allocator already released"),
        }
    }

    /// First physical device with a graphics queue, discrete GPUs first when preferred
    unsafe fn pick_physical_device(instance: &ash::Instance, prefer_discrete: bool) -> Result<(vk::PhysicalDevice, u32)> {
        let physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| init_error(e, "Failed to enumerate physical devices"))?;

        let mut candidates: Vec<(vk::PhysicalDevice, u32, bool)> = physical_devices
            .into_iter()
            .filter_map(|pd| {
                let family = instance
                    .get_physical_device_queue_family_properties(pd)
                    .iter()
                    .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))?;
                let discrete = instance.get_physical_device_properties(pd).device_type
                    == vk::PhysicalDeviceType::DISCRETE_GPU;
                Some((pd, family as u32, discrete))
            })
            .collect();

        if prefer_discrete {
            // Stable sort keeps enumeration order within each group
            candidates.sort_by_key(|&(_, _, discrete)| !discrete);
        }

        match candidates.first() {
            Some(&(pd, family, _)) => Ok((pd, family)),
            None => Err(init_failed("No Vulkan GPU with a graphics queue found".to_string())),
        }
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &VulkanConfig,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        crate::debug::init_debug_config(crate::debug::Config {
            severity: config.debug_severity,
            enable_stats: config.enable_validation_stats,
        });

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::debug::severity_flags(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = debug_utils
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| init_error(e, "Failed to create debug messenger"))?;
        engine_debug!("ember::vulkan", "Validation layers enabled");
        Ok((debug_utils, messenger))
    }
}

fn init_error(result: vk::Result, context: &str) -> Error {
    engine_err!(InitializationFailed => "ember::vulkan", "{}: {:?}", context, result)
}

fn init_failed(message: String) -> Error {
    engine_err!(InitializationFailed => "ember::vulkan", "{}", message)
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                engine_warn!("ember::vulkan", "device_wait_idle failed during teardown: {:?}", e);
            }

            // 1. One-shot copy resources
            self.device.destroy_fence(self.upload_fence, None);
            self.device.destroy_command_pool(self.upload_command_pool, None);

            // 2. Allocator: free VkDeviceMemory pages BEFORE destroying the device
            drop(self.allocator.take());

            // 3. Debug messenger BEFORE device and instance
            #[cfg(feature = "vulkan-validation")]
            {
                crate::debug::cleanup_debug_config();
                if let Some((loader, messenger)) = self.debug_messenger.take() {
                    loader.destroy_debug_utils_messenger(messenger, None);
                }
            }

            // 4. Device and instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        engine_debug!("ember::vulkan", "GPU context destroyed");
    }
}

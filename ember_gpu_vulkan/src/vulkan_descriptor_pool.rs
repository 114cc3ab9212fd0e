/// Descriptor pool creation and set allocation

use ash::vk;
use ember_gpu::ember::{DescriptorPoolDesc, Result};
use ember_gpu::engine_bail;

use crate::vulkan_error::vk_error;

/// Pool sizes for a descriptor pool descriptor (zero counts are skipped)
pub(crate) fn pool_sizes(desc: &DescriptorPoolDesc) -> Vec<vk::DescriptorPoolSize> {
    [
        (vk::DescriptorType::UNIFORM_BUFFER, desc.uniform_buffers),
        (vk::DescriptorType::STORAGE_BUFFER, desc.storage_buffers),
        (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, desc.combined_image_samplers),
    ]
    .into_iter()
    .filter(|&(_, count)| count > 0)
    .map(|(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
    .collect()
}

/// Creation flags for a descriptor pool descriptor
pub(crate) fn pool_flags(desc: &DescriptorPoolDesc) -> vk::DescriptorPoolCreateFlags {
    if desc.allow_individual_free {
        vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET
    } else {
        vk::DescriptorPoolCreateFlags::empty()
    }
}

pub(crate) fn create_pool(device: &ash::Device, desc: &DescriptorPoolDesc) -> Result<vk::DescriptorPool> {
    if desc.max_sets == 0 {
        engine_bail!(InvalidArgument => "ember::vulkan", "Descriptor pool needs max_sets > 0");
    }

    let sizes = pool_sizes(desc);
    if sizes.is_empty() {
        engine_bail!(InvalidArgument => "ember::vulkan", "Descriptor pool has no descriptors");
    }

    let info = vk::DescriptorPoolCreateInfo::default()
        .flags(pool_flags(desc))
        .pool_sizes(&sizes)
        .max_sets(desc.max_sets);

    unsafe {
        device
            .create_descriptor_pool(&info, None)
            .map_err(|e| vk_error(e, "Failed to create descriptor pool"))
    }
}

/// Allocate `count` sets of one layout from `pool`
pub(crate) fn allocate_sets(
    device: &ash::Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
    count: u32,
) -> Result<Vec<vk::DescriptorSet>> {
    let layouts = vec![layout; count as usize];
    let allocate_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(&layouts);

    unsafe {
        device
            .allocate_descriptor_sets(&allocate_info)
            .map_err(|e| vk_error(e, &format!("Failed to allocate {} descriptor set(s)", count)))
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_pool_tests.rs"]
mod tests;

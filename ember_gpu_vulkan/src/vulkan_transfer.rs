/// One-shot buffer-to-buffer copies on the transfer queue
///
/// A copy is recorded into a fresh command buffer from the upload pool,
/// followed by a buffer memory barrier that makes the written range
/// visible to every later consumer of `dst`. The call returns only once
/// the upload fence has signaled.

use ash::vk;
use ember_gpu::ember::Result;

use crate::vulkan_context::GpuContext;
use crate::vulkan_error::vk_error;

/// Access mask of the copy destination after the barrier
pub(crate) fn post_copy_access() -> vk::AccessFlags {
    vk::AccessFlags::VERTEX_ATTRIBUTE_READ
        | vk::AccessFlags::INDEX_READ
        | vk::AccessFlags::UNIFORM_READ
        | vk::AccessFlags::SHADER_READ
        | vk::AccessFlags::HOST_READ
}

/// Pipeline stages that wait on the barrier
pub(crate) fn post_copy_stages() -> vk::PipelineStageFlags {
    vk::PipelineStageFlags::VERTEX_INPUT
        | vk::PipelineStageFlags::VERTEX_SHADER
        | vk::PipelineStageFlags::FRAGMENT_SHADER
        | vk::PipelineStageFlags::COMPUTE_SHADER
        | vk::PipelineStageFlags::HOST
}

/// Barrier ordering the copy before any later read of `dst`
pub(crate) fn post_copy_barrier(dst: vk::Buffer, size: u64) -> vk::BufferMemoryBarrier<'static> {
    vk::BufferMemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(post_copy_access())
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(dst)
        .offset(0)
        .size(size)
}

/// Copy `size` bytes from the start of `src` to the start of `dst` and wait
pub(crate) fn copy_buffer(ctx: &GpuContext, src: vk::Buffer, dst: vk::Buffer, size: u64) -> Result<()> {
    unsafe {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(ctx.upload_command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffers = ctx
            .device
            .allocate_command_buffers(&allocate_info)
            .map_err(|e| vk_error(e, "Failed to allocate copy command buffer"))?;

        let result = record_and_submit(ctx, command_buffers[0], src, dst, size);

        ctx.device.free_command_buffers(ctx.upload_command_pool, &command_buffers);
        result
    }
}

unsafe fn record_and_submit(
    ctx: &GpuContext,
    command_buffer: vk::CommandBuffer,
    src: vk::Buffer,
    dst: vk::Buffer,
    size: u64,
) -> Result<()> {
    let device = &ctx.device;

    let begin_info = vk::CommandBufferBeginInfo::default()
        .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    device
        .begin_command_buffer(command_buffer, &begin_info)
        .map_err(|e| vk_error(e, "Failed to begin copy command buffer"))?;

    let region = vk::BufferCopy::default().src_offset(0).dst_offset(0).size(size);
    device.cmd_copy_buffer(command_buffer, src, dst, &[region]);

    device.cmd_pipeline_barrier(
        command_buffer,
        vk::PipelineStageFlags::TRANSFER,
        post_copy_stages(),
        vk::DependencyFlags::empty(),
        &[],
        &[post_copy_barrier(dst, size)],
        &[],
    );

    device
        .end_command_buffer(command_buffer)
        .map_err(|e| vk_error(e, "Failed to end copy command buffer"))?;

    device
        .reset_fences(&[ctx.upload_fence])
        .map_err(|e| vk_error(e, "Failed to reset upload fence"))?;

    let submit_buffers = [command_buffer];
    let submit_info = vk::SubmitInfo::default().command_buffers(&submit_buffers);
    device
        .queue_submit(ctx.queue, &[submit_info], ctx.upload_fence)
        .map_err(|e| vk_error(e, "Failed to submit buffer copy"))?;

    device
        .wait_for_fences(&[ctx.upload_fence], true, u64::MAX)
        .map_err(|e| vk_error(e, "Failed to wait for buffer copy"))?;

    Ok(())
}

#[cfg(test)]
#[path = "vulkan_transfer_tests.rs"]
mod tests;

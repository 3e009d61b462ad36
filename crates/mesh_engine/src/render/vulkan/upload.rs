//! Staging uploads to device-local memory
//!
//! Device-local buffers and images cannot be written by the CPU directly.
//! The uploader copies source bytes into a host-visible staging buffer,
//! records a one-shot transfer command buffer, submits it, and blocks on the
//! frame fence until the copy has landed. Every upload is synchronous; the
//! staging buffer is destroyed as soon as the wait returns.

use ash::{vk, Device, Instance};

use super::buffer::Buffer;
use super::context::{VulkanError, VulkanResult};
use super::sync::FrameFence;

/// Round `row_bytes` up to the next multiple of `alignment`.
///
/// Image rows in a transfer source must be placed at the device's optimal
/// row-pitch alignment; the gap between `row_bytes` and the returned pitch
/// is padding the copy ignores.
pub fn padded_row_pitch(row_bytes: u64, alignment: u64) -> u64 {
    debug_assert!(alignment > 0);
    row_bytes.div_ceil(alignment) * alignment
}

/// Synchronous staging uploader bound to the graphics queue.
///
/// Borrows the frame fence so uploads and frames share one timeline and
/// cannot interleave.
pub struct Uploader<'a> {
    device: Device,
    instance: &'a Instance,
    physical_device: vk::PhysicalDevice,
    queue: vk::Queue,
    command_pool: vk::CommandPool,
    fence: &'a mut FrameFence,
    row_pitch_alignment: u64,
}

impl<'a> Uploader<'a> {
    /// Create an uploader with its own transient command pool.
    pub fn new(
        device: &Device,
        instance: &'a Instance,
        physical_device: vk::PhysicalDevice,
        queue: vk::Queue,
        graphics_family: u32,
        fence: &'a mut FrameFence,
        row_pitch_alignment: u64,
    ) -> VulkanResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(graphics_family);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::from_vk)?
        };

        Ok(Self {
            device: device.clone(),
            instance,
            physical_device,
            queue,
            command_pool,
            fence,
            row_pitch_alignment,
        })
    }

    /// Upload `data` into a new device-local vertex buffer.
    pub fn upload_vertex_buffer(&mut self, data: &[u8]) -> VulkanResult<Buffer> {
        let dst = Buffer::vertex(
            &self.device,
            self.instance,
            self.physical_device,
            data.len() as vk::DeviceSize,
        )?;
        self.copy_to_buffer(data, &dst)?;
        Ok(dst)
    }

    /// Upload `data` into a new device-local index buffer.
    pub fn upload_index_buffer(&mut self, data: &[u8]) -> VulkanResult<Buffer> {
        let dst = Buffer::index(
            &self.device,
            self.instance,
            self.physical_device,
            data.len() as vk::DeviceSize,
        )?;
        self.copy_to_buffer(data, &dst)?;
        Ok(dst)
    }

    /// Upload tightly packed RGBA8 texels into `image`, transitioning it
    /// from UNDEFINED through TRANSFER_DST to SHADER_READ_ONLY.
    ///
    /// Rows are re-laid into the staging buffer at the device's row-pitch
    /// alignment before the copy is recorded.
    pub fn upload_texture(
        &mut self,
        image: vk::Image,
        texels: &[u8],
        width: u32,
        height: u32,
    ) -> VulkanResult<()> {
        const BYTES_PER_TEXEL: u64 = 4;
        let row_bytes = u64::from(width) * BYTES_PER_TEXEL;
        let expected = row_bytes * u64::from(height);
        if texels.len() as u64 != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "texture data is {} bytes, expected {expected} for {width}x{height} RGBA8",
                    texels.len()
                ),
            });
        }

        let pitch = padded_row_pitch(row_bytes, self.row_pitch_alignment);
        let staging_size = pitch * u64::from(height);
        let mut staging = Buffer::staging(
            &self.device,
            self.instance,
            self.physical_device,
            staging_size,
        )?;

        {
            let mut mapping = staging.map_write()?;
            for row in 0..u64::from(height) {
                let src_start = (row * row_bytes) as usize;
                let src_end = src_start + row_bytes as usize;
                mapping.write_at(row * pitch, &texels[src_start..src_end])?;
            }
        }

        let cmd = self.begin_one_shot()?;

        let subresource_range = vk::ImageSubresourceRange::builder()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1)
            .build();

        let to_transfer = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .build();

        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );
        }

        // buffer_row_length is in texels, not bytes.
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length((pitch / BYTES_PER_TEXEL) as u32)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::builder()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(1)
                    .build(),
            )
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .build();

        unsafe {
            self.device.cmd_copy_buffer_to_image(
                cmd,
                staging.handle(),
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }

        let to_shader_read = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(subresource_range)
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .build();

        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader_read],
            );
        }

        self.submit_and_wait(cmd)
    }

    fn copy_to_buffer(&mut self, data: &[u8], dst: &Buffer) -> VulkanResult<()> {
        let mut staging = Buffer::staging(
            &self.device,
            self.instance,
            self.physical_device,
            data.len() as vk::DeviceSize,
        )?;
        staging.write_bytes(data)?;

        let cmd = self.begin_one_shot()?;

        let region = vk::BufferCopy::builder()
            .size(data.len() as vk::DeviceSize)
            .build();
        unsafe {
            self.device
                .cmd_copy_buffer(cmd, staging.handle(), dst.handle(), &[region]);
        }

        self.submit_and_wait(cmd)
    }

    fn begin_one_shot(&self) -> VulkanResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let cmd = unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::from_vk)?[0]
        };

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(VulkanError::from_vk)?;
        }
        Ok(cmd)
    }

    fn submit_and_wait(&mut self, cmd: vk::CommandBuffer) -> VulkanResult<()> {
        unsafe {
            self.device
                .end_command_buffer(cmd)
                .map_err(VulkanError::from_vk)?;
        }

        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .build();
        unsafe {
            self.device
                .queue_submit(self.queue, &[submit_info], vk::Fence::null())
                .map_err(VulkanError::from_vk)?;
        }

        // Drain through the shared timeline so the staging buffer is safe to
        // free on return.
        self.fence.signal_and_wait(self.queue)?;

        unsafe {
            self.device.free_command_buffers(self.command_pool, &[cmd]);
        }
        Ok(())
    }
}

impl Drop for Uploader<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_pitch_rounds_up_to_alignment() {
        assert_eq!(padded_row_pitch(256, 256), 256);
        assert_eq!(padded_row_pitch(257, 256), 512);
        assert_eq!(padded_row_pitch(1, 256), 256);
    }

    #[test]
    fn row_pitch_with_unit_alignment_is_identity() {
        assert_eq!(padded_row_pitch(123, 1), 123);
    }

    #[test]
    fn rgba_row_of_64_texels_fits_one_aligned_row() {
        // 64 texels * 4 bytes = 256 bytes, exactly one aligned row.
        assert_eq!(padded_row_pitch(64 * 4, 256), 256);
    }
}

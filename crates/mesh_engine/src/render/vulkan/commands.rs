//! Command buffer recording
//!
//! One pool, one primary command buffer, re-recorded every frame. Legal
//! ordering is enforced by types instead of runtime flags: commands can only
//! be recorded through a [`CommandRecorder`], which exists from
//! `reset_and_begin` until `finish`, and render-pass-scoped commands only
//! through the [`ActivePass`] it hands out.

use ash::{vk, Device};

use super::context::{VulkanError, VulkanResult};
use super::framebuffer::Framebuffer;
use super::pipeline::GraphicsPipeline;
use super::render_pass::RenderPass;

/// Command pool owning the renderer's single primary command buffer.
pub struct CommandPool {
    device: Device,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
}

impl CommandPool {
    /// Create the pool on the graphics family and allocate its buffer.
    pub fn new(device: &Device, graphics_family: u32) -> VulkanResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(graphics_family);

        let pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::from_vk)?
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffer = match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(VulkanError::from_vk(e));
            }
        };

        Ok(Self {
            device: device.clone(),
            pool,
            buffer,
        })
    }

    /// Reset the buffer and open it for recording.
    ///
    /// Safe only after the previous submission has been waited on; the frame
    /// fence guarantees that in the lockstep loop.
    pub fn reset_and_begin(&mut self) -> VulkanResult<CommandRecorder<'_>> {
        unsafe {
            self.device
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::from_vk)?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            self.device
                .begin_command_buffer(self.buffer, &begin_info)
                .map_err(VulkanError::from_vk)?;
        }

        Ok(CommandRecorder {
            device: &self.device,
            buffer: self.buffer,
        })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// An open command buffer. Dropping without calling [`Self::finish`] leaves
/// the buffer in the recording state; the next `reset_and_begin` recovers it.
pub struct CommandRecorder<'a> {
    device: &'a Device,
    buffer: vk::CommandBuffer,
}

impl<'a> CommandRecorder<'a> {
    /// Begin the render pass against `framebuffer`, clearing color to
    /// `clear_color` and depth to 1.0, and set the full-extent viewport and
    /// scissor.
    pub fn begin_pass(
        self,
        render_pass: &RenderPass,
        framebuffer: &Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> ActivePass<'a> {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.device.cmd_begin_render_pass(
                self.buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
            self.device.cmd_set_viewport(self.buffer, 0, &[viewport]);
            self.device.cmd_set_scissor(self.buffer, 0, &[scissor]);
        }

        ActivePass {
            device: self.device,
            buffer: self.buffer,
        }
    }
}

/// A command buffer inside an open render pass.
pub struct ActivePass<'a> {
    device: &'a Device,
    buffer: vk::CommandBuffer,
}

impl<'a> ActivePass<'a> {
    /// Bind the pipeline, its descriptor set and the fragment tint.
    pub fn bind_pipeline(
        &self,
        pipeline: &GraphicsPipeline,
        descriptor_set: vk::DescriptorSet,
        tint: [f32; 4],
    ) {
        unsafe {
            self.device.cmd_bind_pipeline(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.handle(),
            );
            self.device.cmd_bind_descriptor_sets(
                self.buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout(),
                0,
                &[descriptor_set],
                &[],
            );
            self.device.cmd_push_constants(
                self.buffer,
                pipeline.layout(),
                vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&tint),
            );
        }
    }

    /// Bind vertex and 32-bit index buffers and issue the indexed draw.
    pub fn draw_indexed(
        &self,
        vertex_buffer: vk::Buffer,
        index_buffer: vk::Buffer,
        index_count: u32,
    ) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.buffer, 0, &[vertex_buffer], &[0]);
            self.device.cmd_bind_index_buffer(
                self.buffer,
                index_buffer,
                0,
                vk::IndexType::UINT32,
            );
            self.device.cmd_draw_indexed(self.buffer, index_count, 1, 0, 0, 0);
        }
    }

    /// End the render pass, returning to plain recording.
    pub fn end_pass(self) -> CommandRecorder<'a> {
        unsafe {
            self.device.cmd_end_render_pass(self.buffer);
        }
        CommandRecorder {
            device: self.device,
            buffer: self.buffer,
        }
    }
}

impl CommandRecorder<'_> {
    /// Close the command buffer and return it ready for submission.
    pub fn finish(self) -> VulkanResult<vk::CommandBuffer> {
        unsafe {
            self.device
                .end_command_buffer(self.buffer)
                .map_err(VulkanError::from_vk)?;
        }
        Ok(self.buffer)
    }
}

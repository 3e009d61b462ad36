//! The mesh renderer
//!
//! Owns every GPU object and drives the frame loop in strict CPU/GPU
//! lockstep: record, submit, present, then block on the frame fence until
//! the GPU has finished before touching any per-frame resource again. At
//! most one frame is ever in flight.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Point3, Vector3};

use super::buffer::{Buffer, UniformBuffer};
use super::commands::CommandPool;
use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::framebuffer::PresentTargets;
use super::pipeline::{DescriptorPool, DescriptorSetLayout, GraphicsPipeline, ShaderModule};
use super::render_pass::RenderPass;
use super::swapchain::Swapchain;
use super::sync::{FrameFence, Semaphore};
use super::texture::Texture;
use super::upload::Uploader;
use super::window::Window;
use crate::render::mesh::MeshData;
use crate::render::RendererConfig;

/// Radians per second the mesh spins about the Y axis.
const SPIN_RATE: f32 = 0.8;

/// Vertical field of view in radians.
const FOV_Y: f32 = std::f32::consts::FRAC_PI_4;

/// Where the frame loop currently stands.
///
/// Transitions are linear and checked: `Idle -> Recording -> Submitted ->
/// Presented -> Idle`. Attempting anything out of order is a logic error
/// surfaced as `InvalidOperation`, not undefined GPU behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// No frame in flight; safe to record.
    Idle,
    /// Commands are being recorded.
    Recording,
    /// The frame has been submitted to the queue.
    Submitted,
    /// The frame has been queued for presentation.
    Presented,
}

impl FramePhase {
    /// The phase that legally follows this one.
    pub const fn next(self) -> Self {
        match self {
            Self::Idle => Self::Recording,
            Self::Recording => Self::Submitted,
            Self::Submitted => Self::Presented,
            Self::Presented => Self::Idle,
        }
    }

    /// Step to `target`, failing unless it is the legal successor.
    pub fn advance_to(self, target: Self) -> VulkanResult<Self> {
        if self.next() == target {
            Ok(target)
        } else {
            Err(VulkanError::InvalidOperation {
                reason: format!("illegal frame phase transition {self:?} -> {target:?}"),
            })
        }
    }
}

/// Per-scene uniforms: camera view and projection.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SceneUniforms {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
}

/// Per-instance uniforms: world matrix and its inverse transpose for
/// normal transformation.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct InstanceUniforms {
    world: [[f32; 4]; 4],
    world_inverse_transpose: [[f32; 4]; 4],
}

/// Right-handed look-at view matrix for the fixed orbit camera.
fn view_matrix() -> Matrix4<f32> {
    Matrix4::look_at_rh(
        &Point3::new(0.0, 1.5, 4.0),
        &Point3::origin(),
        &Vector3::y_axis(),
    )
}

/// Perspective projection with the Y axis flipped for Vulkan clip space.
fn projection_matrix(width: u32, height: u32) -> Matrix4<f32> {
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    let mut proj = Matrix4::new_perspective(aspect, FOV_Y, 0.1, 100.0);
    proj[(1, 1)] *= -1.0;
    proj
}

/// World matrix for the spinning mesh at `angle` radians.
fn world_matrix(angle: f32) -> Matrix4<f32> {
    Matrix4::from_axis_angle(&Vector3::y_axis(), angle)
}

/// Inverse transpose of `world`, identity if `world` is singular.
fn inverse_transpose(world: &Matrix4<f32>) -> Matrix4<f32> {
    world
        .try_inverse()
        .map_or_else(Matrix4::identity, |inv| inv.transpose())
}

/// Renders one textured mesh into a window.
///
/// Fields are declared children-first so drop order releases every resource
/// before the context that created it.
pub struct MeshRenderer {
    command_pool: CommandPool,
    image_available: Semaphore,
    render_finished: Semaphore,
    frame_fence: FrameFence,
    descriptor_pool: DescriptorPool,
    pipeline: GraphicsPipeline,
    descriptor_layout: DescriptorSetLayout,
    present_targets: PresentTargets,
    render_pass: RenderPass,
    swapchain: Swapchain,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    texture: Texture,
    scene_uniforms: UniformBuffer,
    instance_uniforms: UniformBuffer,
    clear_color: [f32; 4],
    tint_color: [f32; 4],
    prefer_mailbox: bool,
    rotation_angle: f32,
    phase: FramePhase,
    context: VulkanContext,
}

impl MeshRenderer {
    /// Stand up the full rendering stack against `window` and upload the
    /// mesh and texture. `texels` must be tightly packed RGBA8 of
    /// `texture_size` dimensions; the shader blobs must be SPIR-V.
    ///
    /// Every step is fail-fast; a returned error means nothing leaked, since
    /// partially constructed wrappers clean themselves up on drop.
    #[allow(clippy::too_many_lines)]
    pub fn new(
        window: &mut Window,
        config: &RendererConfig,
        mesh: &MeshData,
        texels: &[u8],
        texture_size: (u32, u32),
        vertex_spirv: &[u8],
        fragment_spirv: &[u8],
    ) -> VulkanResult<Self> {
        let context = VulkanContext::new(window, &config.application_name, config.enable_validation)?;
        let device = context.raw_device();
        let instance = context.instance();
        let physical = context.physical_device.device;

        let (width, height) = window.get_framebuffer_size();
        let swapchain = Swapchain::new(
            &context,
            vk::Extent2D { width, height },
            config.prefer_mailbox,
            None,
        )?;
        let render_pass = RenderPass::new(&device, swapchain.format())?;
        let present_targets = PresentTargets::new(&context, &swapchain, &render_pass)?;

        let scene_uniforms = UniformBuffer::new(
            &device,
            instance,
            physical,
            std::mem::size_of::<SceneUniforms>() as vk::DeviceSize,
        )?;
        let instance_uniforms = UniformBuffer::new(
            &device,
            instance,
            physical,
            std::mem::size_of::<InstanceUniforms>() as vk::DeviceSize,
        )?;

        let texture = Texture::new(&device, instance, physical, texture_size.0, texture_size.1)?;

        let mut frame_fence = FrameFence::new(&device)?;
        let (vertex_buffer, index_buffer) = {
            let mut uploader = Uploader::new(
                &device,
                instance,
                physical,
                context.graphics_queue(),
                context.device.graphics_family,
                &mut frame_fence,
                context.physical_device.copy_row_pitch_alignment(),
            )?;
            let vertex_buffer = uploader.upload_vertex_buffer(mesh.vertex_bytes())?;
            let index_buffer =
                uploader.upload_index_buffer(bytemuck::cast_slice(mesh.indices()))?;
            uploader.upload_texture(texture.image(), texels, texture_size.0, texture_size.1)?;
            (vertex_buffer, index_buffer)
        };

        let descriptor_layout = DescriptorSetLayout::new(&device)?;
        let descriptor_pool = DescriptorPool::new(
            &device,
            &descriptor_layout,
            &texture,
            &scene_uniforms,
            &instance_uniforms,
        )?;

        let vertex_shader = ShaderModule::new(&device, vertex_spirv)?;
        let fragment_shader = ShaderModule::new(&device, fragment_spirv)?;
        let pipeline = GraphicsPipeline::new(
            &device,
            &render_pass,
            &descriptor_layout,
            &mesh.layout(),
            &vertex_shader,
            &fragment_shader,
        )?;
        // Shader modules are no longer needed once the pipeline exists.
        drop(vertex_shader);
        drop(fragment_shader);

        let command_pool = CommandPool::new(&device, context.device.graphics_family)?;
        let image_available = Semaphore::new(&device)?;
        let render_finished = Semaphore::new(&device)?;

        log::info!(
            "renderer ready: {} vertices, {} indices, {}x{} texture",
            mesh.vertex_count(),
            mesh.index_count(),
            texture_size.0,
            texture_size.1
        );

        Ok(Self {
            command_pool,
            image_available,
            render_finished,
            frame_fence,
            descriptor_pool,
            pipeline,
            descriptor_layout,
            present_targets,
            render_pass,
            swapchain,
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
            texture,
            scene_uniforms,
            instance_uniforms,
            clear_color: config.clear_color,
            tint_color: config.tint_color,
            prefer_mailbox: config.prefer_mailbox,
            rotation_angle: 0.0,
            phase: FramePhase::Idle,
            context,
        })
    }

    /// Record, submit and present one frame, then block until the GPU has
    /// finished it. `delta_seconds` advances the spin animation.
    ///
    /// An out-of-date swapchain (reported by acquire or present) rebuilds
    /// the presentation chain and skips or finishes the frame; the caller
    /// just keeps looping.
    pub fn render_frame(&mut self, delta_seconds: f32) -> VulkanResult<()> {
        if self.phase != FramePhase::Idle {
            return Err(VulkanError::InvalidOperation {
                reason: format!("render_frame called in phase {:?}", self.phase),
            });
        }

        self.rotation_angle = (self.rotation_angle + delta_seconds * SPIN_RATE)
            % (2.0 * std::f32::consts::PI);
        self.update_uniforms()?;

        let image_index = match self.swapchain.acquire_next_image(self.image_available.handle())
        {
            Ok((index, _suboptimal)) => index,
            Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR)) => {
                self.recreate_presentation(self.swapchain.extent())?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.phase = self.phase.advance_to(FramePhase::Recording)?;
        let extent = self.swapchain.extent();
        let framebuffer = self.present_targets.framebuffer(image_index as usize)?;

        let recorder = self.command_pool.reset_and_begin()?;
        let pass = recorder.begin_pass(&self.render_pass, framebuffer, extent, self.clear_color);
        pass.bind_pipeline(&self.pipeline, self.descriptor_pool.set(), self.tint_color);
        pass.draw_indexed(
            self.vertex_buffer.handle(),
            self.index_buffer.handle(),
            self.index_count,
        );
        let command_buffer = pass.end_pass().finish()?;

        self.submit(command_buffer)?;
        self.phase = self.phase.advance_to(FramePhase::Submitted)?;

        let present_result = self.swapchain.present(
            self.context.present_queue(),
            image_index,
            self.render_finished.handle(),
        );
        self.phase = self.phase.advance_to(FramePhase::Presented)?;

        // Lockstep: the frame is over only when the GPU says so.
        self.frame_fence.finish_frame()?;
        self.phase = self.phase.advance_to(FramePhase::Idle)?;

        match present_result {
            Ok(_suboptimal) => Ok(()),
            Err(VulkanError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR)) => {
                self.recreate_presentation(self.swapchain.extent())
            }
            Err(e) => Err(e),
        }
    }

    /// React to a framebuffer resize. A zero-sized extent (minimized
    /// window) is a retryable `InvalidOperation`; an unchanged extent is a
    /// no-op.
    pub fn handle_resize(&mut self, width: u32, height: u32) -> VulkanResult<()> {
        if width == 0 || height == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "window is minimized; retry when restored".to_string(),
            });
        }

        let current = self.swapchain.extent();
        if current.width == width && current.height == height {
            return Ok(());
        }

        log::debug!(
            "resizing presentation {}x{} -> {width}x{height}",
            current.width,
            current.height
        );
        self.recreate_presentation(vk::Extent2D { width, height })
    }

    /// Drain the GPU before the host drops the renderer. Idempotent.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::warn!("device wait during shutdown failed: {e}");
        }
    }

    fn update_uniforms(&mut self) -> VulkanResult<()> {
        let extent = self.swapchain.extent();
        let scene = SceneUniforms {
            view: view_matrix().into(),
            proj: projection_matrix(extent.width, extent.height).into(),
        };
        self.scene_uniforms.update(bytemuck::bytes_of(&scene))?;

        let world = world_matrix(self.rotation_angle);
        let instance = InstanceUniforms {
            world: world.into(),
            world_inverse_transpose: inverse_transpose(&world).into(),
        };
        self.instance_uniforms.update(bytemuck::bytes_of(&instance))
    }

    /// Submit the frame: wait for image acquisition at the color output
    /// stage, signal the binary present semaphore and the next frame fence
    /// value in one submission.
    fn submit(&mut self, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        let wait_semaphores = [self.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.render_finished.handle(), self.frame_fence.handle()];
        let command_buffers = [command_buffer];

        // Binary semaphores ignore their timeline values; only the fence
        // slot carries a real one.
        let wait_values = [0];
        let signal_values = [0, self.frame_fence.pending_value()];
        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::builder()
            .wait_semaphore_values(&wait_values)
            .signal_semaphore_values(&signal_values);

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info)
            .build();

        unsafe {
            self.context
                .device
                .device
                .queue_submit(
                    self.context.graphics_queue(),
                    &[submit_info],
                    vk::Fence::null(),
                )
                .map_err(VulkanError::from_vk)
        }
    }

    /// Tear down and rebuild everything sized to the swapchain.
    fn recreate_presentation(&mut self, extent: vk::Extent2D) -> VulkanResult<()> {
        self.context.wait_idle()?;

        let replacement = Swapchain::new(
            &self.context,
            extent,
            self.prefer_mailbox,
            Some(&self.swapchain),
        )?;
        let targets = PresentTargets::new(&self.context, &replacement, &self.render_pass)?;

        self.present_targets = targets;
        self.swapchain = replacement;
        self.phase = FramePhase::Idle;
        Ok(())
    }
}

impl Drop for MeshRenderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn frame_phases_cycle_in_order() {
        let mut phase = FramePhase::Idle;
        for expected in [
            FramePhase::Recording,
            FramePhase::Submitted,
            FramePhase::Presented,
            FramePhase::Idle,
        ] {
            phase = phase.advance_to(expected).unwrap();
        }
        assert_eq!(phase, FramePhase::Idle);
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        assert!(FramePhase::Idle.advance_to(FramePhase::Submitted).is_err());
        assert!(FramePhase::Recording.advance_to(FramePhase::Idle).is_err());
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let proj = projection_matrix(800, 600);
        assert!(proj[(1, 1)] < 0.0);
    }

    #[test]
    fn projection_survives_zero_extent() {
        let proj = projection_matrix(0, 0);
        assert!(proj[(0, 0)].is_finite());
    }

    #[test]
    fn rotation_inverse_transpose_equals_rotation() {
        // Pure rotations are orthonormal.
        let world = world_matrix(1.2);
        let it = inverse_transpose(&world);
        for row in 0..4 {
            for col in 0..4 {
                assert_relative_eq!(world[(row, col)], it[(row, col)], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn view_matrix_moves_origin_away_from_camera() {
        let view = view_matrix();
        let origin = view.transform_point(&Point3::origin());
        // The camera sits 4 units back and 1.5 up; the origin lands in
        // front of it along -Z in view space.
        assert!(origin.z < 0.0);
        assert_relative_eq!(origin.coords.norm(), (4.0f32.powi(2) + 1.5f32.powi(2)).sqrt(), epsilon = 1e-4);
    }
}

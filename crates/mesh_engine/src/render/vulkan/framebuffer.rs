//! Framebuffers and the depth attachment
//!
//! [`PresentTargets`] bundles everything that is sized to the swapchain:
//! one shared depth buffer and one framebuffer per swapchain image. The
//! whole bundle is dropped and rebuilt on resize.

use ash::{vk, Device, Instance};

use super::buffer::find_memory_type;
use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::render_pass::{RenderPass, DEPTH_FORMAT};
use super::swapchain::Swapchain;

/// Device-local depth attachment with RAII cleanup.
pub struct DepthBuffer {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl DepthBuffer {
    /// Create a depth image and view matching `extent`.
    pub fn new(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(VulkanError::from_vk)?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type = match find_memory_type(
            instance,
            physical_device,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(VulkanError::from_vk(e));
            }
        };

        if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe {
                device.free_memory(memory, None);
                device.destroy_image(image, None);
            }
            return Err(VulkanError::from_vk(e));
        }

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .subresource_range(
                vk::ImageSubresourceRange::builder()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1)
                    .build(),
            );

        let view = match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.free_memory(memory, None);
                    device.destroy_image(image, None);
                }
                return Err(VulkanError::from_vk(e));
            }
        };

        Ok(Self {
            device: device.clone(),
            image,
            memory,
            view,
        })
    }

    /// The depth attachment view.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Single framebuffer with RAII cleanup.
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer binding `color_view` and `depth_view` to the
    /// render pass attachments.
    pub fn new(
        device: &Device,
        render_pass: &RenderPass,
        color_view: vk::ImageView,
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let attachments = [color_view, depth_view];
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass.handle())
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&create_info, None)
                .map_err(VulkanError::from_vk)?
        };

        Ok(Self {
            device: device.clone(),
            framebuffer,
        })
    }

    /// The raw framebuffer handle.
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Everything sized to the swapchain: the depth buffer and one framebuffer
/// per swapchain image. Rebuilt as a unit on resize.
pub struct PresentTargets {
    framebuffers: Vec<Framebuffer>,
    depth: DepthBuffer,
    extent: vk::Extent2D,
}

impl PresentTargets {
    /// Build targets for every image of `swapchain`.
    pub fn new(
        context: &VulkanContext,
        swapchain: &Swapchain,
        render_pass: &RenderPass,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let extent = swapchain.extent();

        let depth = DepthBuffer::new(
            &device,
            context.instance(),
            context.physical_device.device,
            extent,
        )?;

        let mut framebuffers = Vec::with_capacity(swapchain.image_count());
        for &color_view in swapchain.image_views() {
            framebuffers.push(Framebuffer::new(
                &device,
                render_pass,
                color_view,
                depth.view(),
                extent,
            )?);
        }

        Ok(Self {
            framebuffers,
            depth,
            extent,
        })
    }

    /// The framebuffer for swapchain image `index`.
    pub fn framebuffer(&self, index: usize) -> VulkanResult<&Framebuffer> {
        self.framebuffers
            .get(index)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!(
                    "framebuffer index {index} out of range ({} targets)",
                    self.framebuffers.len()
                ),
            })
    }

    /// The extent the targets were built for.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// The shared depth buffer.
    pub fn depth(&self) -> &DepthBuffer {
        &self.depth
    }
}

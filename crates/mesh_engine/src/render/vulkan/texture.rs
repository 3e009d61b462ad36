//! Sampled textures
//!
//! A texture bundles the device-local image, its memory, the shader view and
//! a sampler. Texel data arrives separately through the uploader; creation
//! here only carves out GPU storage in the UNDEFINED layout.

use ash::{vk, Device, Instance};

use super::buffer::find_memory_type;
use super::context::{VulkanError, VulkanResult};

/// Generate RGBA8 checkerboard texels: alternating black and white cells.
///
/// `cell` is the edge length of one square in texels. Useful as placeholder
/// content when no image file is supplied.
pub fn checkerboard_texels(width: u32, height: u32, cell: u32) -> Vec<u8> {
    let cell = cell.max(1);
    let mut texels = Vec::with_capacity((width as usize) * (height as usize) * 4);
    for y in 0..height {
        for x in 0..width {
            let on = ((x / cell) + (y / cell)) % 2 == 0;
            let shade = if on { 0xFF } else { 0x00 };
            texels.extend_from_slice(&[shade, shade, shade, 0xFF]);
        }
    }
    texels
}

/// Device-local RGBA8 sampled texture with RAII cleanup.
pub struct Texture {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
    extent: vk::Extent2D,
}

impl Texture {
    /// Create an empty RGBA8 texture in the UNDEFINED layout.
    pub fn new(
        device: &Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        width: u32,
        height: u32,
    ) -> VulkanResult<Self> {
        if width == 0 || height == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: format!("texture extent {width}x{height} must be non-zero"),
            });
        }

        let format = vk::Format::R8G8B8A8_UNORM;
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
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
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::builder()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
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

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = match unsafe { device.create_sampler(&sampler_info, None) } {
            Ok(sampler) => sampler,
            Err(e) => {
                unsafe {
                    device.destroy_image_view(view, None);
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
            sampler,
            extent: vk::Extent2D { width, height },
        })
    }

    /// The raw image handle, for upload barriers and copies.
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// The shader-facing image view.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// The sampler paired with this texture.
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Texture dimensions.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_has_four_bytes_per_texel() {
        let texels = checkerboard_texels(8, 8, 2);
        assert_eq!(texels.len(), 8 * 8 * 4);
    }

    #[test]
    fn checkerboard_alternates_across_cell_boundary() {
        let texels = checkerboard_texels(4, 1, 2);
        // First cell white, second cell black.
        assert_eq!(&texels[0..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&texels[2 * 4..2 * 4 + 4], &[0x00, 0x00, 0x00, 0xFF]);
    }

    #[test]
    fn checkerboard_is_fully_opaque() {
        let texels = checkerboard_texels(5, 3, 1);
        assert!(texels.chunks_exact(4).all(|texel| texel[3] == 0xFF));
    }
}

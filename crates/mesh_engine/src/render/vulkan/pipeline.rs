//! Graphics pipeline and shader resource binding
//!
//! The binding contract is fixed for the whole renderer:
//!   push constant, 16 bytes, fragment stage  - tint color
//!   binding 0, combined image sampler, fragment - mesh texture
//!   binding 1, uniform buffer, vertex           - per-scene view/projection
//!   binding 2, uniform buffer, vertex           - per-instance world matrices
//!
//! Viewport and scissor are dynamic state so a window resize never forces a
//! pipeline rebuild.

use ash::{vk, Device};
use std::ffi::CStr;

use super::buffer::UniformBuffer;
use super::context::{VulkanError, VulkanResult};
use super::render_pass::RenderPass;
use super::texture::Texture;
use crate::render::mesh::VertexLayout;

/// Size of the fragment push-constant block (RGBA tint).
pub const TINT_PUSH_CONSTANT_SIZE: u32 = 16;

/// Compiled shader module with RAII cleanup.
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a module from SPIR-V bytes. The byte count must be a multiple
    /// of four; anything else is a truncated or non-SPIR-V blob.
    pub fn new(device: &Device, spirv: &[u8]) -> VulkanResult<Self> {
        if spirv.is_empty() || spirv.len() % 4 != 0 {
            return Err(VulkanError::InvalidOperation {
                reason: format!("shader blob of {} bytes is not valid SPIR-V", spirv.len()),
            });
        }

        let mut words = Vec::with_capacity(spirv.len() / 4);
        for chunk in spirv.chunks_exact(4) {
            words.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::from_vk)?
        };

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// The raw module handle.
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Descriptor set layout for the fixed binding contract.
pub struct DescriptorSetLayout {
    device: Device,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Create the layout: sampler at 0 (fragment), UBOs at 1 and 2 (vertex).
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)
                .build(),
            vk::DescriptorSetLayoutBinding::builder()
                .binding(1)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX)
                .build(),
            vk::DescriptorSetLayoutBinding::builder()
                .binding(2)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX)
                .build(),
        ];

        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe {
            device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(VulkanError::from_vk)?
        };

        Ok(Self {
            device: device.clone(),
            layout,
        })
    }

    /// The raw layout handle.
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool holding the renderer's single descriptor set.
///
/// One mesh, one texture, two uniform buffers: there is exactly one set,
/// written once at startup and bound every frame.
pub struct DescriptorPool {
    device: Device,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
}

impl DescriptorPool {
    /// Allocate the set and point its bindings at the given resources.
    pub fn new(
        device: &Device,
        layout: &DescriptorSetLayout,
        texture: &Texture,
        scene_uniforms: &UniformBuffer,
        instance_uniforms: &UniformBuffer,
    ) -> VulkanResult<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(2)
                .build(),
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(1);
        let pool = unsafe {
            device
                .create_descriptor_pool(&pool_info, None)
                .map_err(VulkanError::from_vk)?
        };

        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let set = match unsafe { device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets[0],
            Err(e) => {
                unsafe { device.destroy_descriptor_pool(pool, None) };
                return Err(VulkanError::from_vk(e));
            }
        };

        let image_info = [vk::DescriptorImageInfo::builder()
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_view(texture.view())
            .sampler(texture.sampler())
            .build()];
        let scene_info = [vk::DescriptorBufferInfo::builder()
            .buffer(scene_uniforms.handle())
            .offset(0)
            .range(scene_uniforms.size())
            .build()];
        let instance_info = [vk::DescriptorBufferInfo::builder()
            .buffer(instance_uniforms.handle())
            .offset(0)
            .range(instance_uniforms.size())
            .build()];

        let writes = [
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_info)
                .build(),
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&scene_info)
                .build(),
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(2)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&instance_info)
                .build(),
        ];

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }

        Ok(Self {
            device: device.clone(),
            pool,
            set,
        })
    }

    /// The single descriptor set.
    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            // Frees the set too.
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Vertex attribute descriptions derived from a [`VertexLayout`].
fn vertex_attributes(layout: &VertexLayout) -> [vk::VertexInputAttributeDescription; 4] {
    [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: layout.position_offset,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: layout.normal_offset,
        },
        vk::VertexInputAttributeDescription {
            location: 2,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: layout.tangent_offset,
        },
        vk::VertexInputAttributeDescription {
            location: 3,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: layout.uv_offset,
        },
    ]
}

/// Graphics pipeline plus its layout, with RAII cleanup.
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Build the textured-mesh pipeline: back-face culling, depth test and
    /// write enabled, no blending, dynamic viewport and scissor.
    pub fn new(
        device: &Device,
        render_pass: &RenderPass,
        descriptor_layout: &DescriptorSetLayout,
        vertex_layout: &VertexLayout,
        vertex_shader: &ShaderModule,
        fragment_shader: &ShaderModule,
    ) -> VulkanResult<Self> {
        let entry_point = CStr::from_bytes_with_nul(b"main\0").unwrap();
        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader.handle())
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_shader.handle())
                .name(entry_point)
                .build(),
        ];

        let binding_descriptions = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: vertex_layout.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let attribute_descriptions = vertex_attributes(vertex_layout);
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Counts only; actual rects are set per frame as dynamic state.
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: TINT_PUSH_CONSTANT_SIZE,
        }];
        let set_layouts = [descriptor_layout.handle()];
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::from_vk)?
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass.handle())
            .subpass(0)
            .build();

        let pipeline = match unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        } {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::from_vk(e));
            }
        };

        Ok(Self {
            device: device.clone(),
            pipeline,
            layout,
        })
    }

    /// The raw pipeline handle.
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// The pipeline layout, for descriptor and push-constant binds.
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_follow_the_layout_offsets() {
        let attrs = vertex_attributes(&VertexLayout::PACKED);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
        assert_eq!(attrs[3].offset, 36);
        assert_eq!(attrs[3].format, vk::Format::R32G32_SFLOAT);
    }
}

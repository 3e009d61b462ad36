//! Vulkan rendering core
//!
//! Explicit resource-lifecycle wrappers over ash. Every wrapper owns its
//! Vulkan handles and releases them in `Drop`; struct fields are declared
//! children-first so Rust's drop order tears down resources before the
//! device and instance that created them.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod framebuffer;
pub mod pipeline;
pub mod render_pass;
pub mod renderer;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod upload;
pub mod window;

pub use buffer::{Buffer, MappedWrite, UniformBuffer};
pub use commands::{CommandPool, CommandRecorder};
pub use context::{LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanInstance, VulkanResult};
pub use framebuffer::{DepthBuffer, Framebuffer, PresentTargets};
pub use pipeline::{DescriptorPool, DescriptorSetLayout, GraphicsPipeline, ShaderModule};
pub use render_pass::RenderPass;
pub use renderer::{FramePhase, MeshRenderer};
pub use swapchain::Swapchain;
pub use sync::{FenceTimeline, FrameFence, Semaphore};
pub use texture::Texture;
pub use upload::Uploader;
pub use window::{Window, WindowError};

//! # Mesh Engine
//!
//! A small explicit-API renderer that draws a single textured 3D mesh into a
//! live window using Vulkan. The crate's focus is the GPU resource lifecycle
//! and frame-synchronization core: device and swapchain setup, double-buffered
//! presentation, fenced CPU/GPU synchronization, staged uploads into
//! device-local memory, and per-frame command recording and submission.
//!
//! The host application owns the window event loop and calls into the
//! lifecycle surface directly:
//!
//! ```rust,no_run
//! use mesh_engine::render::vulkan::{MeshRenderer, Window};
//! use mesh_engine::render::{MeshData, RendererConfig};
//! use mesh_engine::foundation::ByteBlob;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut window = Window::new("mesh viewer", 800, 600)?;
//!     let mesh = MeshData::cube();
//!     let vs = ByteBlob::from_file("shaders/mesh.vert.spv")?;
//!     let fs = ByteBlob::from_file("shaders/mesh.frag.spv")?;
//!     let texture = vec![255u8; 64 * 64 * 4];
//!     let mut renderer = MeshRenderer::new(
//!         &mut window,
//!         &RendererConfig::default(),
//!         &mesh,
//!         &texture,
//!         (64, 64),
//!         vs.bytes(),
//!         fs.bytes(),
//!     )?;
//!     while !window.should_close() {
//!         window.poll_events();
//!         for (w, h) in window.drain_resize_events() {
//!             let _ = renderer.handle_resize(w, h);
//!         }
//!         renderer.render_frame(1.0 / 60.0)?;
//!     }
//!     renderer.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! Out of scope by design: mesh-file parsing (the host supplies an opaque
//! [`render::MeshData`]), shader compilation (precompiled SPIR-V blobs), and
//! windowing/event dispatch beyond the thin [`render::vulkan::Window`]
//! wrapper the host drives.

pub mod foundation;
pub mod render;

pub use render::vulkan::{VulkanError, VulkanResult};

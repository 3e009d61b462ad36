//! Rendering: mesh input data, renderer configuration, and the Vulkan core.

pub mod mesh;
pub mod vulkan;

pub use mesh::{MeshData, MeshError, VertexLayout};

/// Renderer construction options supplied by the host application.
///
/// This is a plain value struct; the host owns whatever config file or
/// argument parsing produces it.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Application name reported to the Vulkan driver.
    pub application_name: String,
    /// Color the back buffer is cleared to each frame (RGBA).
    pub clear_color: [f32; 4],
    /// Per-draw tint pushed to the fragment stage (RGBA).
    pub tint_color: [f32; 4],
    /// Prefer low-latency MAILBOX presentation when the surface offers it;
    /// FIFO (vsync) otherwise and always as the fallback.
    pub prefer_mailbox: bool,
    /// Enable validation layers in debug builds.
    pub enable_validation: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "mesh_engine".to_string(),
            clear_color: [0.7, 0.7, 0.7, 1.0],
            tint_color: [1.0, 1.0, 1.0, 1.0],
            prefer_mailbox: false,
            enable_validation: cfg!(debug_assertions),
        }
    }
}

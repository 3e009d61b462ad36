//! Windowed host for the mesh renderer
//!
//! Owns the event loop: polls input, forwards resizes, advances the spin
//! animation by wall-clock delta time, and reports frame rate in the window
//! title once per second.

mod config;

use config::ViewerConfig;
use mesh_engine::foundation::ByteBlob;
use mesh_engine::render::vulkan::{texture, MeshRenderer, Window};
use mesh_engine::render::{MeshData, RendererConfig};
use std::path::Path;
use std::time::Instant;

/// Edge length in texels of the generated fallback texture.
const CHECKERBOARD_SIZE: u32 = 256;

fn load_texture(config: &ViewerConfig) -> Result<(Vec<u8>, (u32, u32)), Box<dyn std::error::Error>> {
    match &config.texture_path {
        Some(path) => {
            let image = image::open(path)?.into_rgba8();
            let dims = image.dimensions();
            log::info!("loaded texture {path:?} ({}x{})", dims.0, dims.1);
            Ok((image.into_raw(), dims))
        }
        None => {
            log::info!("no texture configured, using generated checkerboard");
            let texels =
                texture::checkerboard_texels(CHECKERBOARD_SIZE, CHECKERBOARD_SIZE, 32);
            Ok((texels, (CHECKERBOARD_SIZE, CHECKERBOARD_SIZE)))
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ViewerConfig::load(Path::new("viewer.toml"))?;
    log::debug!("config: {config:?}");

    let mut window = Window::new(&config.title, config.width, config.height)?;

    let mesh = MeshData::cube();
    let (texels, texture_size) = load_texture(&config)?;
    let vertex_spirv = ByteBlob::from_file(config.shader_dir.join("mesh.vert.spv"))?;
    let fragment_spirv = ByteBlob::from_file(config.shader_dir.join("mesh.frag.spv"))?;

    let renderer_config = RendererConfig {
        application_name: config.title.clone(),
        clear_color: config.clear_color,
        tint_color: config.tint_color,
        prefer_mailbox: config.prefer_mailbox,
        ..RendererConfig::default()
    };
    let mut renderer = MeshRenderer::new(
        &mut window,
        &renderer_config,
        &mesh,
        &texels,
        texture_size,
        vertex_spirv.bytes(),
        fragment_spirv.bytes(),
    )?;

    let mut last_frame = Instant::now();
    let mut fps_window_start = Instant::now();
    let mut frames_in_window = 0u32;
    let mut minimized = false;

    while !window.should_close() {
        window.poll_events();

        if let Some((width, height)) = window.drain_resize_events() {
            match renderer.handle_resize(width, height) {
                Ok(()) => minimized = false,
                Err(e) => {
                    // Minimized windows report a zero extent; stop rendering
                    // until a restore delivers a real size.
                    log::debug!("resize deferred: {e}");
                    minimized = true;
                }
            }
        }

        let now = Instant::now();
        let delta = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        if minimized {
            std::thread::sleep(std::time::Duration::from_millis(50));
            continue;
        }

        renderer.render_frame(delta)?;
        frames_in_window += 1;

        let elapsed = fps_window_start.elapsed();
        if elapsed.as_secs_f32() >= 1.0 {
            let fps = frames_in_window as f32 / elapsed.as_secs_f32();
            window.set_title(&format!("{} - {fps:.0} fps", config.title));
            fps_window_start = now;
            frames_in_window = 0;
        }
    }

    renderer.shutdown();
    Ok(())
}

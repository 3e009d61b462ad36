//! Viewer configuration
//!
//! Optional `viewer.toml` next to the executable's working directory; every
//! field has a default so the file can be partial or absent.

use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_title() -> String {
    "mesh viewer".to_string()
}
const fn default_width() -> u32 {
    1280
}
const fn default_height() -> u32 {
    720
}
const fn default_clear_color() -> [f32; 4] {
    [0.7, 0.7, 0.7, 1.0]
}
const fn default_tint() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}
fn default_shader_dir() -> PathBuf {
    PathBuf::from("target/shaders")
}

/// Top-level viewer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    /// Window title.
    pub title: String,
    /// Initial window width in pixels.
    pub width: u32,
    /// Initial window height in pixels.
    pub height: u32,
    /// Back buffer clear color (RGBA).
    pub clear_color: [f32; 4],
    /// Fragment tint color (RGBA).
    pub tint_color: [f32; 4],
    /// Prefer MAILBOX presentation over FIFO when available.
    pub prefer_mailbox: bool,
    /// Directory containing the compiled `.spv` shader blobs.
    pub shader_dir: PathBuf,
    /// Optional image file to texture the mesh with; a checkerboard is
    /// generated when absent.
    pub texture_path: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
            clear_color: default_clear_color(),
            tint_color: default_tint(),
            prefer_mailbox: false,
            shader_dir: default_shader_dir(),
            texture_path: None,
        }
    }
}

impl ViewerConfig {
    /// Load from `path`, falling back to defaults when the file is missing.
    /// A present but malformed file is an error; silently ignoring it would
    /// hide typos.
    pub fn load(path: &Path) -> Result<Self, String> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                toml::from_str(&text).map_err(|e| format!("invalid config {path:?}: {e}"))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(format!("failed to read config {path:?}: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ViewerConfig::default();
        assert!(config.width > 0 && config.height > 0);
        assert!(config.texture_path.is_none());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: ViewerConfig = toml::from_str("title = \"demo\"\nwidth = 640\n").unwrap();
        assert_eq!(config.title, "demo");
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 720);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<ViewerConfig>("widht = 640\n").is_err());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = ViewerConfig::load(Path::new("/nonexistent/viewer.toml")).unwrap();
        assert_eq!(config.title, "mesh viewer");
    }
}

// build.rs
// Compiles the GLSL shaders in resources/shaders to SPIR-V with glslc.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../resources/shaders");

    // Allow skipping shader compilation with an env var
    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            println!("cargo:rerun-if-env-changed=VULKAN_SDK");
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            eprintln!("hint: install the Vulkan SDK and set VULKAN_SDK");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{vulkan_sdk}\\Bin\\glslc.exe")
    } else {
        format!("{vulkan_sdk}/bin/glslc")
    };
    if !Path::new(&glslc).exists() {
        eprintln!("warning: glslc not found at {glslc}, shader compilation skipped");
        return;
    }

    let shader_dir = PathBuf::from("../resources/shaders");
    let target_dir = PathBuf::from("../target/shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: failed to create {target_dir:?}: {e}");
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: no shader directory at {shader_dir:?}");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_shader = path
            .extension()
            .is_some_and(|ext| ext == "vert" || ext == "frag");
        if !is_shader {
            continue;
        }

        // mesh.vert -> mesh.vert.spv so stage names never collide.
        let file_name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name,
            None => continue,
        };
        let out_file = target_dir.join(format!("{file_name}.spv"));

        let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: compiled {file_name} -> {out_file:?}");
            }
            Ok(s) => {
                eprintln!("error: glslc failed for {path:?} (exit {})", s.code().unwrap_or(-1));
                panic!("shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: failed to run glslc for {path:?}: {e}");
                panic!("failed to execute shader compiler");
            }
        }
    }
}

//! Owned byte blocks loaded from asset files
//!
//! Shader binaries and other opaque assets are read fully into memory before
//! any GPU object is created; a missing or unreadable file is fatal to
//! startup and reported to the caller, never retried here.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while loading a byte blob from storage.
#[derive(Error, Debug)]
pub enum BlobError {
    /// The named file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Path of the file that failed to open.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The file opened but could not be read to the end.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the file that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// An owned, immutable block of bytes read from a file.
pub struct ByteBlob {
    bytes: Vec<u8>,
}

impl ByteBlob {
    /// Read the named file fully into an owned buffer.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BlobError> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|source| BlobError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|source| BlobError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!("loaded {} bytes from {}", bytes.len(), path.display());
        Ok(Self { bytes })
    }

    /// Wrap an already-owned byte vector.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Borrow the loaded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes loaded.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn round_trips_file_contents() {
        let dir = std::env::temp_dir();
        let path = dir.join("mesh_engine_blob_test.bin");
        let payload: Vec<u8> = (0..=255).collect();

        let mut file = File::create(&path).unwrap();
        file.write_all(&payload).unwrap();
        drop(file);

        let blob = ByteBlob::from_file(&path).unwrap();
        assert_eq!(blob.bytes(), payload.as_slice());
        assert_eq!(blob.len(), 256);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = ByteBlob::from_file("/definitely/not/a/real/file.spv");
        assert!(matches!(result, Err(BlobError::Open { .. })));
    }

    #[test]
    fn empty_file_loads_as_empty_blob() {
        let path = std::env::temp_dir().join("mesh_engine_blob_empty.bin");
        File::create(&path).unwrap();

        let blob = ByteBlob::from_file(&path).unwrap();
        assert!(blob.is_empty());

        std::fs::remove_file(&path).ok();
    }
}

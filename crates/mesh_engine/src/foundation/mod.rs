//! Foundation utilities shared across the engine.

pub mod blob;

pub use blob::{BlobError, ByteBlob};

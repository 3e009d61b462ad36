//! Mesh input data
//!
//! The renderer treats mesh loading as an external concern: whatever parses a
//! model file hands over a [`MeshData`]: a flat vertex byte stream plus an
//! index array and the attribute offsets the pipeline needs to describe the
//! input layout. The bytes are copied verbatim into GPU buffers.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

/// Errors produced while validating mesh input.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MeshError {
    /// The mesh contains no vertices; nothing could be drawn.
    #[error("mesh has zero vertices")]
    NoVertices,

    /// The mesh contains no indices; the draw call would be empty.
    #[error("mesh has zero indices")]
    NoIndices,

    /// The vertex stride is zero, which would make every offset invalid.
    #[error("vertex stride is zero")]
    ZeroStride,

    /// The vertex byte stream is not a whole number of vertices.
    #[error("vertex data length {len} is not a multiple of stride {stride}")]
    TruncatedVertexData {
        /// Length of the vertex byte stream.
        len: usize,
        /// Declared vertex stride in bytes.
        stride: u32,
    },

    /// An index points past the last vertex.
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// The offending index value.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: u32,
    },

    /// An attribute offset points past the end of the vertex.
    #[error("attribute offset {offset} exceeds stride {stride}")]
    OffsetOutOfRange {
        /// The offending byte offset.
        offset: u32,
        /// Declared vertex stride in bytes.
        stride: u32,
    },
}

/// Byte offsets of the per-vertex attributes within one vertex, plus the
/// vertex stride. Part of the contract between mesh data and the pipeline's
/// input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    /// Size of one vertex in bytes.
    pub stride: u32,
    /// Byte offset of the 3-float position.
    pub position_offset: u32,
    /// Byte offset of the 3-float normal.
    pub normal_offset: u32,
    /// Byte offset of the 3-float tangent.
    pub tangent_offset: u32,
    /// Byte offset of the 2-float texture coordinate.
    pub uv_offset: u32,
}

impl VertexLayout {
    /// The layout emitted by [`MeshData::cube`] and expected of any loader
    /// feeding this renderer: position, normal, tangent, uv, tightly packed.
    pub const PACKED: Self = Self {
        stride: std::mem::size_of::<PackedVertex>() as u32,
        position_offset: 0,
        normal_offset: 12,
        tangent_offset: 24,
        uv_offset: 36,
    };
}

/// A packed vertex matching [`VertexLayout::PACKED`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PackedVertex {
    /// Position in model space.
    pub position: [f32; 3],
    /// Surface normal.
    pub normal: [f32; 3],
    /// Surface tangent.
    pub tangent: [f32; 3],
    /// Texture coordinate.
    pub uv: [f32; 2],
}

/// Opaque mesh input: a flat vertex byte stream and a u32 index array.
///
/// The renderer never interprets the vertex bytes beyond the offsets declared
/// in [`VertexLayout`]; they are uploaded verbatim.
pub struct MeshData {
    vertex_bytes: Vec<u8>,
    indices: Vec<u32>,
    layout: VertexLayout,
}

impl MeshData {
    /// Build a mesh from raw parts and validate it.
    pub fn new(vertex_bytes: Vec<u8>, indices: Vec<u32>, layout: VertexLayout) -> Result<Self, MeshError> {
        let mesh = Self {
            vertex_bytes,
            indices,
            layout,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// A unit cube: 8 vertices, 12 triangles, 36 indices.
    ///
    /// Normals and tangents are the averaged corner directions, which is what
    /// a minimal 8-vertex cube can express; faceted shading would need 24
    /// vertices. Texture coordinates wrap each face across the full image.
    pub fn cube() -> Self {
        let corners = [
            [-0.5_f32, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
        ];
        let uvs = [
            [0.0_f32, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
        ];

        let vertices: Vec<PackedVertex> = corners
            .iter()
            .zip(uvs.iter())
            .map(|(&position, &uv)| {
                // Corner normal: the normalized corner direction.
                let len = (position[0] * position[0]
                    + position[1] * position[1]
                    + position[2] * position[2])
                    .sqrt();
                let normal = [position[0] / len, position[1] / len, position[2] / len];
                PackedVertex {
                    position,
                    normal,
                    tangent: [1.0, 0.0, 0.0],
                    uv,
                }
            })
            .collect();

        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            3, 6, 2, 3, 7, 6, // +y
            0, 4, 7, 0, 7, 3, // -x
            1, 2, 6, 1, 6, 5, // +x
        ];

        Self {
            vertex_bytes: bytemuck::cast_slice(&vertices).to_vec(),
            indices,
            layout: VertexLayout::PACKED,
        }
    }

    /// Check structural invariants: non-empty, whole vertices, in-range
    /// indices and attribute offsets. A zero-vertex mesh fails here before
    /// any GPU resource is created or any stride arithmetic happens.
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.layout.stride == 0 {
            return Err(MeshError::ZeroStride);
        }
        if self.vertex_bytes.is_empty() {
            return Err(MeshError::NoVertices);
        }
        if self.vertex_bytes.len() % self.layout.stride as usize != 0 {
            return Err(MeshError::TruncatedVertexData {
                len: self.vertex_bytes.len(),
                stride: self.layout.stride,
            });
        }
        if self.indices.is_empty() {
            return Err(MeshError::NoIndices);
        }

        for &offset in &[
            self.layout.position_offset,
            self.layout.normal_offset,
            self.layout.tangent_offset,
            self.layout.uv_offset,
        ] {
            if offset >= self.layout.stride {
                return Err(MeshError::OffsetOutOfRange {
                    offset,
                    stride: self.layout.stride,
                });
            }
        }

        let vertex_count = self.vertex_count();
        for &index in &self.indices {
            if index >= vertex_count {
                return Err(MeshError::IndexOutOfRange {
                    index,
                    vertex_count,
                });
            }
        }

        Ok(())
    }

    /// Number of whole vertices in the byte stream.
    pub fn vertex_count(&self) -> u32 {
        (self.vertex_bytes.len() / self.layout.stride as usize) as u32
    }

    /// Number of indices (the indexed draw covers all of them).
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// The flat vertex byte stream, copied verbatim into the vertex buffer.
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertex_bytes
    }

    /// The index array.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// The vertex layout the pipeline input state is built from.
    pub fn layout(&self) -> VertexLayout {
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_expected_counts() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.index_count(), 36);
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn packed_layout_matches_struct() {
        assert_eq!(VertexLayout::PACKED.stride, 44);
        assert_eq!(VertexLayout::PACKED.position_offset, 0);
        assert_eq!(VertexLayout::PACKED.normal_offset, 12);
        assert_eq!(VertexLayout::PACKED.tangent_offset, 24);
        assert_eq!(VertexLayout::PACKED.uv_offset, 36);
    }

    #[test]
    fn zero_vertices_is_rejected() {
        let result = MeshData::new(Vec::new(), vec![0, 1, 2], VertexLayout::PACKED);
        assert_eq!(result.err(), Some(MeshError::NoVertices));
    }

    #[test]
    fn zero_stride_is_rejected_before_division() {
        let layout = VertexLayout {
            stride: 0,
            ..VertexLayout::PACKED
        };
        let result = MeshData::new(vec![0u8; 44], vec![0], layout);
        assert_eq!(result.err(), Some(MeshError::ZeroStride));
    }

    #[test]
    fn truncated_vertex_stream_is_rejected() {
        let result = MeshData::new(vec![0u8; 45], vec![0], VertexLayout::PACKED);
        assert_eq!(
            result.err(),
            Some(MeshError::TruncatedVertexData { len: 45, stride: 44 })
        );
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let result = MeshData::new(vec![0u8; 44], vec![1], VertexLayout::PACKED);
        assert_eq!(
            result.err(),
            Some(MeshError::IndexOutOfRange {
                index: 1,
                vertex_count: 1
            })
        );
    }

    #[test]
    fn empty_index_array_is_rejected() {
        let result = MeshData::new(vec![0u8; 44], Vec::new(), VertexLayout::PACKED);
        assert_eq!(result.err(), Some(MeshError::NoIndices));
    }

    #[test]
    fn offset_past_stride_is_rejected() {
        let layout = VertexLayout {
            uv_offset: 44,
            ..VertexLayout::PACKED
        };
        let result = MeshData::new(vec![0u8; 44], vec![0], layout);
        assert_eq!(
            result.err(),
            Some(MeshError::OffsetOutOfRange {
                offset: 44,
                stride: 44
            })
        );
    }
}

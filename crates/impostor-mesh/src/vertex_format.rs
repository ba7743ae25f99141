//! Canonical `wgpu::VertexBufferLayout` for impostor chunk meshes.
//!
//! | Location | Offset | Format    | Field    |
//! |----------|--------|-----------|----------|
//! | 0        | 0      | Float32x3 | position |
//! | 1        | 12     | Float32x3 | normal   |
//! | 2        | 24     | Float32x4 | color    |
//! | 3        | 40     | Float32x4 | uv       |

use std::mem;

use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

use crate::vertex::ImpostorVertex;

/// Vertex attributes for [`ImpostorVertex`].
pub const IMPOSTOR_VERTEX_ATTRIBUTES: [VertexAttribute; 4] = [
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 0,
        shader_location: 0,
    },
    VertexAttribute {
        format: VertexFormat::Float32x3,
        offset: 12,
        shader_location: 1,
    },
    VertexAttribute {
        format: VertexFormat::Float32x4,
        offset: 24,
        shader_location: 2,
    },
    VertexAttribute {
        format: VertexFormat::Float32x4,
        offset: 40,
        shader_location: 3,
    },
];

/// The vertex buffer layout used by every impostor chunk draw.
pub const IMPOSTOR_VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: mem::size_of::<ImpostorVertex>() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &IMPOSTOR_VERTEX_ATTRIBUTES,
};

/// Owned copy of [`IMPOSTOR_VERTEX_LAYOUT`].
pub fn impostor_vertex_buffer_layout() -> VertexBufferLayout<'static> {
    IMPOSTOR_VERTEX_LAYOUT
}

// ---------------------------------------------------------------------------
// Compile-time validation
// ---------------------------------------------------------------------------

const _: () = assert!(
    mem::size_of::<ImpostorVertex>() == 56,
    "ImpostorVertex size changed, update IMPOSTOR_VERTEX_LAYOUT"
);

const _: () = assert!(mem::offset_of!(ImpostorVertex, normal) == 12);
const _: () = assert!(mem::offset_of!(ImpostorVertex, color) == 24);
const _: () = assert!(mem::offset_of!(ImpostorVertex, uv) == 40);

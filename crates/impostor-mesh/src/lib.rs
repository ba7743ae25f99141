//! Impostor quad geometry: the packed vertex format, its GPU layout, and the
//! per-chunk dynamic mesh rebuilt from an atlas slot table.

pub mod chunk_mesh;
pub mod vertex;
pub mod vertex_format;

pub use chunk_mesh::{ChunkMesh, ImpostorQuad, MeshBounds, QuadData, quad_index_pattern};
pub use vertex::{FADE_TIME_RANGE, ImpostorVertex, POSITION_OFFSET, POSITION_RANGE, pack_color};
pub use vertex_format::{
    IMPOSTOR_VERTEX_ATTRIBUTES, IMPOSTOR_VERTEX_LAYOUT, impostor_vertex_buffer_layout,
};

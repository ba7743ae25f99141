//! Dynamic quad mesh for one atlas chunk.
//!
//! The index buffer is fixed at construction for the chunk's full capacity;
//! only the first `quad_count * 6` indices are drawn. The vertex buffer is
//! refilled from the slot table whenever the chunk reports a change.

use glam::{Vec3, Vec4};
use rayon::prelude::*;

use crate::vertex::{ImpostorVertex, pack_color};

/// Index stride pattern for a single quad: two triangles sharing v0 and v2.
const QUAD_PATTERN: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Quads filled per rayon task.
const FILL_BATCH: usize = 64;

/// Raw per-slot data the mesh packs into four vertices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadData {
    /// World position of the impostor.
    pub position: Vec3,
    /// Facing direction, packed as the vertex normal.
    pub direction: Vec3,
    /// Full edge length of the quad.
    pub quad_size: f32,
    /// Offset along the facing direction.
    pub z_offset: f32,
    /// Atlas rectangle `(u_min, v_min, u_max, v_max)`.
    pub uv: Vec4,
    /// Signed fade time: positive while fading in, negative while fading out.
    pub fade_time: f32,
    /// Length of the current fade.
    pub fade_duration: f32,
}

/// A slot table entry that may or may not hold a quad.
pub trait ImpostorQuad {
    /// Returns the quad payload, or `None` for an empty slot.
    fn quad(&self) -> Option<QuadData>;
}

/// Axis-aligned bounds of all quads in a mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshBounds {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl MeshBounds {
    fn around(center: Vec3, extent: f32) -> Self {
        Self {
            min: center - Vec3::splat(extent),
            max: center + Vec3::splat(extent),
        }
    }

    fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Center of the bounds.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Build the static index buffer for `capacity` quads.
pub fn quad_index_pattern(capacity: usize) -> Vec<u32> {
    (0..capacity as u32)
        .flat_map(|quad| QUAD_PATTERN.map(|i| i + quad * 4))
        .collect()
}

/// Vertex and index data for the impostors of one chunk.
#[derive(Debug)]
pub struct ChunkMesh {
    vertices: Vec<ImpostorVertex>,
    indices: Vec<u32>,
    quads: Vec<QuadData>,
    bounds: Option<MeshBounds>,
    capacity: usize,
}

impl ChunkMesh {
    /// Create an empty mesh able to hold `capacity` quads.
    pub fn new(capacity: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(capacity * 4),
            indices: quad_index_pattern(capacity),
            quads: Vec::with_capacity(capacity),
            bounds: None,
            capacity,
        }
    }

    /// Repack the vertex buffer from a slot table, one quad per occupied slot
    /// in slot order, then recompute bounds.
    pub fn rebuild<Q: ImpostorQuad>(&mut self, slots: &[Q]) {
        self.quads.clear();
        self.quads.extend(slots.iter().filter_map(ImpostorQuad::quad));
        debug_assert!(self.quads.len() <= self.capacity);

        self.vertices
            .resize(self.quads.len() * 4, ImpostorVertex::default());
        self.vertices
            .par_chunks_exact_mut(4)
            .zip(self.quads.par_iter())
            .with_min_len(FILL_BATCH)
            .for_each(|(out, quad)| out.copy_from_slice(&quad_vertices(quad)));

        self.bounds = self
            .quads
            .iter()
            .map(|q| MeshBounds::around(q.position, q.quad_size))
            .reduce(MeshBounds::union);
    }

    /// Packed vertices of all current quads.
    pub fn vertices(&self) -> &[ImpostorVertex] {
        &self.vertices
    }

    /// The index range that covers the current quads.
    pub fn indices(&self) -> &[u32] {
        &self.indices[..self.index_count()]
    }

    /// The full static index buffer, sized for capacity.
    pub fn static_indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of quads currently packed.
    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Number of indices to draw.
    pub fn index_count(&self) -> usize {
        self.quad_count() * 6
    }

    /// Maximum number of quads.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if no quads are packed.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Union of `position ± quad_size` over packed quads, `None` when empty.
    pub fn bounds(&self) -> Option<MeshBounds> {
        self.bounds
    }

    /// CPU bytes held by the vertex and index buffers.
    pub fn used_bytes(&self) -> usize {
        self.vertices.capacity() * std::mem::size_of::<ImpostorVertex>()
            + self.indices.capacity() * std::mem::size_of::<u32>()
            + self.quads.capacity() * std::mem::size_of::<QuadData>()
    }
}

fn quad_vertices(quad: &QuadData) -> [ImpostorVertex; 4] {
    let half = quad.quad_size * 0.5;
    let z = quad.z_offset;
    let normal = quad.direction.to_array();
    let color = pack_color(quad.position, quad.fade_time);
    let uv = quad.uv;
    let corner = |x: f32, y: f32, u: f32, v: f32| ImpostorVertex {
        position: [x, y, z],
        normal,
        color,
        uv: [u, v, 0.0, quad.fade_duration],
    };
    [
        corner(-half, -half, uv.x, uv.y),
        corner(-half, half, uv.x, uv.w),
        corner(half, half, uv.z, uv.w),
        corner(half, -half, uv.z, uv.y),
    ]
}

//! Atlas slot allocation for impostor snapshots.
//!
//! A [`Chunk`] is one square atlas texture divided into equal tiles, with a
//! LIFO stack of free tile indices for O(1) allocation. A [`ChunkPool`] groups
//! chunks by tile resolution, creates them on demand, and evicts them once
//! they are empty.

mod chunk;
mod error;
mod fade;
mod ids;
mod pool;
mod resolution;
mod resources;
mod slot;

pub use chunk::Chunk;
pub use error::AtlasError;
pub use fade::{FadePhase, FadeTimer};
pub use ids::{ChunkId, OwnerId, SlotRef};
pub use pool::ChunkPool;
pub use resolution::{
    MAX_ATLAS_RESOLUTION, MAX_TILE_RESOLUTION, MIN_ATLAS_RESOLUTION, MIN_TILE_RESOLUTION,
    chunk_capacity, clamp_pow2, render_queue, slots_per_side,
};
pub use resources::{MaterialPool, POOL_HANDLE_BASE, TexturePool};
pub use slot::{ImpostorSlot, SlotRequest};

//! Atlas error types.

use crate::ids::ChunkId;

/// Errors returned by chunk and pool operations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AtlasError {
    /// A slot was requested from a chunk with no free index.
    #[error("chunk {chunk} is full ({capacity} slots)")]
    CapacityExceeded {
        /// The full chunk.
        chunk: ChunkId,
        /// Its capacity.
        capacity: u32,
    },

    /// Atlas and tile resolutions do not form a power-of-two grid.
    #[error("invalid atlas layout: atlas {atlas}px, tile {tile}px")]
    InvalidResolution {
        /// Atlas edge length in pixels.
        atlas: u32,
        /// Tile edge length in pixels.
        tile: u32,
    },

    /// No live chunk has this id.
    #[error("unknown chunk {0}")]
    UnknownChunk(ChunkId),

    /// The slot index is out of range or not occupied.
    #[error("slot {index} of chunk {chunk} is not occupied")]
    EmptySlot {
        /// Chunk id.
        chunk: ChunkId,
        /// Slot index.
        index: u32,
    },
}

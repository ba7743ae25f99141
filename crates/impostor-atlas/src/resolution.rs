//! Power-of-two resolution arithmetic for atlases and tiles.

use crate::error::AtlasError;

/// Smallest supported tile edge, in pixels.
pub const MIN_TILE_RESOLUTION: u32 = 16;
/// Largest supported tile edge, in pixels.
pub const MAX_TILE_RESOLUTION: u32 = 2048;
/// Smallest supported atlas edge, in pixels.
pub const MIN_ATLAS_RESOLUTION: u32 = 256;
/// Largest supported atlas edge, in pixels.
pub const MAX_ATLAS_RESOLUTION: u32 = 8192;

/// Base draw order for chunk materials. Each doubling of tile resolution
/// draws one step earlier.
const RENDER_QUEUE_BASE: i32 = 2470;

/// Number of tiles along one edge of the atlas.
pub fn slots_per_side(atlas_resolution: u32, tile_resolution: u32) -> Result<u32, AtlasError> {
    let invalid = AtlasError::InvalidResolution {
        atlas: atlas_resolution,
        tile: tile_resolution,
    };
    if !atlas_resolution.is_power_of_two()
        || !tile_resolution.is_power_of_two()
        || tile_resolution > atlas_resolution
    {
        return Err(invalid);
    }
    Ok(atlas_resolution / tile_resolution)
}

/// Number of tiles in the atlas. Always a power of two.
pub fn chunk_capacity(atlas_resolution: u32, tile_resolution: u32) -> Result<u32, AtlasError> {
    let side = slots_per_side(atlas_resolution, tile_resolution)?;
    let capacity = side * side;
    debug_assert!(capacity.is_power_of_two());
    Ok(capacity)
}

/// Draw order for a chunk of the given tile resolution.
pub fn render_queue(tile_resolution: u32) -> i32 {
    RENDER_QUEUE_BASE - tile_resolution.max(1).ilog2() as i32
}

/// Round `value` up to a power of two and clamp it into `[min, max]`.
/// Values with no `u32` power of two above them clamp to `max`.
pub fn clamp_pow2(value: u32, min: u32, max: u32) -> u32 {
    value
        .max(1)
        .checked_next_power_of_two()
        .unwrap_or(max)
        .clamp(min, max)
}

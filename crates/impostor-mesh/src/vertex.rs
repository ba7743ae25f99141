//! The vertex format shared by every impostor chunk mesh.
//!
//! Quads are not billboarded on the CPU. Each vertex carries its corner offset
//! in quad-local space plus the impostor's world position and facing
//! direction, and the shader orients the quad at draw time.

use glam::{Vec3, Vec4};

/// Offset added to world positions before normalization into the color channel.
pub const POSITION_OFFSET: f32 = 50_000.0;

/// Range world positions are normalized into. Positions outside
/// `[-POSITION_OFFSET, POSITION_OFFSET)` do not survive packing into `[0, 1)`.
pub const POSITION_RANGE: f32 = 100_000.0;

/// Divisor applied to the signed fade time stored in `color.w`.
pub const FADE_TIME_RANGE: f32 = 100_000.0;

/// A single impostor vertex, 56 bytes.
///
/// Layout:
///   - `[0..12]`  position `[f32; 3]`: corner offset `(±half, ±half, z_offset)`
///   - `[12..24]` normal `[f32; 3]`: impostor facing direction
///   - `[24..40]` color `[f32; 4]`: packed world position (xyz) and fade time (w)
///   - `[40..56]` uv `[f32; 4]`: atlas uv (xy), unused (z), fade duration (w)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ImpostorVertex {
    /// Corner offset in quad-local space.
    pub position: [f32; 3],
    /// Facing direction of the impostor.
    pub normal: [f32; 3],
    /// World position and fade time, see [`pack_color`].
    pub color: [f32; 4],
    /// Atlas texture coordinate and fade duration.
    pub uv: [f32; 4],
}

static_assertions::assert_eq_size!(ImpostorVertex, [u8; 56]);

impl ImpostorVertex {
    /// Decode the world position packed into the color channel.
    pub fn world_position(&self) -> Vec3 {
        Vec3::new(self.color[0], self.color[1], self.color[2]) * POSITION_RANGE
            - Vec3::splat(POSITION_OFFSET)
    }

    /// Decode the signed fade time packed into the color channel.
    pub fn fade_time(&self) -> f32 {
        self.color[3] * FADE_TIME_RANGE
    }

    /// Fade duration carried in the last texture coordinate component.
    pub fn fade_duration(&self) -> f32 {
        self.uv[3]
    }
}

/// Pack a world position and signed fade time into a vertex color.
pub fn pack_color(position: Vec3, fade_time: f32) -> [f32; 4] {
    let p = (position + Vec3::splat(POSITION_OFFSET)) / POSITION_RANGE;
    Vec4::new(p.x, p.y, p.z, fade_time / FADE_TIME_RANGE).to_array()
}

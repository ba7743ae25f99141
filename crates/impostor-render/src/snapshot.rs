//! Camera framing for impostor snapshots.
//!
//! A snapshot is rendered from the main camera's position, looking at the
//! object, with a field of view just wide enough to fit the impostor quad.

use glam::{Mat4, Vec3, Vec4};

/// Nearest allowed snapshot near plane.
const MIN_NEAR: f32 = 0.3;

/// Depth margin around the quad, in quad sizes.
const DEPTH_MARGIN: f32 = 1.5;

/// View and projection used to render one snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapshotCamera {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix, square aspect.
    pub projection: Mat4,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

impl SnapshotCamera {
    /// Frame an object of `quad_size` at `object_position` from
    /// `camera_position`. The framing distance is shortened by
    /// `z_offset_world` so the quad plane sits in front of the object center.
    pub fn frame(
        camera_position: Vec3,
        object_position: Vec3,
        quad_size: f32,
        z_offset_world: f32,
    ) -> Self {
        let from_cam_to_center = camera_position - object_position;
        let shifted = from_cam_to_center - from_cam_to_center.normalize_or_zero() * z_offset_world;
        let distance = shifted.length().max(f32::EPSILON);

        let fov = 2.0 * (quad_size * 0.5).atan2(distance);
        let far = distance + quad_size * DEPTH_MARGIN;
        let near = (distance - quad_size * DEPTH_MARGIN).max(MIN_NEAR);

        let forward = (-from_cam_to_center).normalize_or_zero();
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_to_rh(camera_position, forward, up);
        let projection = Mat4::perspective_rh(fov, 1.0, near, far);

        Self {
            view,
            projection,
            fov_degrees: fov.to_degrees(),
            near,
            far,
        }
    }

    /// `(-1, near, far, 1/far)` in the layout of the projection-params global.
    pub fn projection_params(&self) -> Vec4 {
        Vec4::new(-1.0, self.near, self.far, 1.0 / self.far)
    }
}

/// Pick the LOD level whose renderers are drawn into a snapshot.
///
/// `transition_heights` are the impostor LODs' screen-relative heights in
/// decreasing order. The chosen level is the first one whose height is below
/// `screen_size`, or the last level if none is. Level 0 is the full-detail
/// threshold and is never expected here; reaching it is logged.
pub fn select_lod_level(transition_heights: &[f32], screen_size: f32) -> Option<usize> {
    if transition_heights.is_empty() {
        log::error!("Snapshot requested for an object with no LOD levels");
        return None;
    }
    let level = transition_heights
        .iter()
        .position(|&h| h < screen_size)
        .unwrap_or(transition_heights.len() - 1);
    if level == 0 {
        log::error!(
            "Snapshot at screen size {screen_size} selected the full-detail LOD level"
        );
    }
    Some(level)
}

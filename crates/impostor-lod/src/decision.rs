//! Visibility and decision stages.
//!
//! Both stages run once per frame over the whole object table in parallel.
//! Each object is read and written only at its own index; the stage
//! returning is the barrier before selection.

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use crate::frustum::{Aabb, Frustum};
use crate::object::{RequiredAction, TrackedObject};

/// Objects handed to one rayon task.
const MIN_OBJECTS_PER_TASK: usize = 256;

/// Below this, `1 - cos(angle)` is treated as no rotation.
const ANGLE_EPSILON: f32 = 1e-4;

/// Camera and scene state the decision stage reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameView {
    /// Main camera position.
    pub camera_position: Vec3,
    /// Main camera view-projection matrix.
    pub view_projection: Mat4,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Global LOD bias. Larger values keep objects at full detail longer.
    pub lod_bias: f32,
    /// Viewport height in pixels.
    pub screen_height: u32,
    /// Main light direction, zero when the scene has none.
    pub light_direction: Vec3,
    /// Current unscaled time.
    pub time: f32,
}

impl FrameView {
    /// Distance-to-screen-size factor: `2·tan(fov/2) / lod_bias`.
    pub fn multiplier(&self) -> f32 {
        2.0 * (self.fov_y * 0.5).tan() / self.lod_bias
    }
}

/// Screen-relative size of an object of `height` at `distance`, in `[0, 1]`.
pub fn screen_size(height: f32, distance: f32, multiplier: f32) -> f32 {
    let size = height / (distance * multiplier);
    if size.is_nan() { 0.0 } else { size.clamp(0.0, 1.0) }
}

/// Angle between two vectors in degrees. Zero if either is zero or they
/// are nearly parallel.
pub fn angle_between_degrees(a: Vec3, b: Vec3) -> f32 {
    let denom = (a.length_squared() * b.length_squared()).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    let cos = a.dot(b) / denom;
    if 1.0 - cos < ANGLE_EPSILON {
        return 0.0;
    }
    cos.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Tile resolution an object of `screen_size` would ideally get.
pub fn ideal_resolution(screen_height: u32, screen_size: f32, min: u32, max: u32) -> u32 {
    let r = (screen_height as f32 * screen_size) as u32;
    if r >= max {
        max
    } else if r <= min {
        min
    } else {
        r.next_power_of_two()
    }
}

/// Mark each object visible if its bounds intersect the frustum. Returns the
/// number of visible objects.
pub fn compute_visibility(objects: &mut [TrackedObject], frustum: &Frustum) -> usize {
    objects
        .par_iter_mut()
        .with_min_len(MIN_OBJECTS_PER_TASK)
        .map(|object| {
            let bounds = Aabb::from_center(object.data.position, object.data.size);
            object.visible = frustum.is_visible(&bounds);
            usize::from(object.visible)
        })
        .sum()
}

/// Run the decision rule on every object. Returns the number of objects
/// that want a texture update.
pub fn compute_decisions(objects: &mut [TrackedObject], view: &FrameView) -> usize {
    let multiplier = view.multiplier();
    objects
        .par_iter_mut()
        .with_min_len(MIN_OBJECTS_PER_TASK)
        .map(|object| {
            let action = decide(object, view, multiplier);
            usize::from(action == RequiredAction::UpdateImpostorTexture)
        })
        .sum()
}

/// Update one object's screen size, distance and direction, and decide its
/// action. Mode transitions take precedence over refreshes.
pub fn decide(object: &mut TrackedObject, view: &FrameView, multiplier: f32) -> RequiredAction {
    let to_camera = view.camera_position - object.data.position;
    let distance = to_camera.length();
    let size = screen_size(object.data.height, distance, multiplier);
    object.screen_size = size;
    object.direction = to_camera;
    object.distance = distance;

    let thresholds = object.thresholds;
    let action = if !object.has_impostor() {
        if size < thresholds.switch && size > thresholds.cull {
            RequiredAction::GoToImpostorMode
        } else {
            RequiredAction::NotSet
        }
    } else if size > thresholds.switch {
        RequiredAction::GoToNormalMode
    } else if size < thresholds.cull {
        RequiredAction::Cull
    } else if needs_refresh(object, view) {
        RequiredAction::UpdateImpostorTexture
    } else {
        RequiredAction::None
    };
    object.action = action;
    action
}

fn needs_refresh(object: &TrackedObject, view: &FrameView) -> bool {
    let settings = &object.settings;
    let last = &object.last_update;

    if angle_between_degrees(last.camera_direction, object.direction) > settings.delta_camera_angle
    {
        return true;
    }
    if settings.use_update_by_time && view.time - last.time > settings.time_interval {
        return true;
    }
    if settings.use_delta_light_angle
        && angle_between_degrees(last.light_direction, view.light_direction)
            > settings.delta_light_angle
    {
        return true;
    }
    let ideal = ideal_resolution(
        view.screen_height,
        object.screen_size,
        settings.min_texture_resolution,
        settings.max_texture_resolution,
    );
    if ideal > last.texture_resolution {
        return true;
    }
    (object.distance - last.distance).abs() / last.distance > settings.delta_distance
}

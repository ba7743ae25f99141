//! State tracked for every object rendered through impostors.

use glam::Vec3;
use impostor_atlas::{OwnerId, SlotRef};
use serde::{Deserialize, Serialize};

/// Spatial snapshot taken at registration (and refreshed by transform
/// updates for non-static objects).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ObjectData {
    /// World position of the bounds center.
    pub position: Vec3,
    /// Bounds size, used as the half-extent of the visibility box.
    pub size: Vec3,
    /// Bounds height, the numerator of the screen-size metric.
    pub height: f32,
    /// Edge length of the impostor quad.
    pub quad_size: f32,
}

/// Screen-relative sizes bounding the impostor band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodThresholds {
    /// Above this the object must be drawn at full detail.
    pub switch: f32,
    /// Below this the object is not drawn at all.
    pub cull: f32,
}

/// Per-object refresh and fade settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImpostorSettings {
    /// Quad plane offset toward the camera, as a fraction of the quad size.
    pub z_offset: f32,
    /// Fade in seconds when entering impostor mode.
    pub fade_in_time: f32,
    /// Fade in seconds when a snapshot replaces another or is released.
    pub fade_transition_time: f32,
    /// Disable to make impostors appear without fading in.
    pub use_fading: bool,
    /// Camera angle change, in degrees, that triggers a refresh.
    pub delta_camera_angle: f32,
    /// Relative distance change that triggers a refresh.
    pub delta_distance: f32,
    /// Refresh on a fixed interval.
    pub use_update_by_time: bool,
    /// Refresh interval in seconds when `use_update_by_time` is set.
    pub time_interval: f32,
    /// Refresh when the main light turns.
    pub use_delta_light_angle: bool,
    /// Light angle change, in degrees, that triggers a refresh.
    pub delta_light_angle: f32,
    /// Smallest tile resolution.
    pub min_texture_resolution: u32,
    /// Largest tile resolution.
    pub max_texture_resolution: u32,
    /// Static objects never move after registration.
    pub is_static: bool,
}

impl Default for ImpostorSettings {
    fn default() -> Self {
        Self {
            z_offset: 0.5,
            fade_in_time: 0.3,
            fade_transition_time: 0.2,
            use_fading: true,
            delta_camera_angle: 1.0,
            delta_distance: 0.1,
            use_update_by_time: false,
            time_interval: 1.0,
            use_delta_light_angle: true,
            delta_light_angle: 3.0,
            min_texture_resolution: 32,
            max_texture_resolution: 512,
            is_static: true,
        }
    }
}

impl ImpostorSettings {
    /// Fade-in used when entering impostor mode.
    pub fn effective_fade_in_time(&self) -> f32 {
        if self.use_fading { self.fade_in_time } else { 0.0 }
    }
}

/// What the dispatcher must do with an object this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RequiredAction {
    /// Not evaluated, or outside the impostor band with no impostor.
    #[default]
    NotSet,
    /// The current snapshot is still good.
    None,
    /// Re-render the snapshot into a new slot.
    UpdateImpostorTexture,
    /// Create the first snapshot.
    GoToImpostorMode,
    /// Drop the impostor and draw full detail.
    GoToNormalMode,
    /// Drop the impostor and draw nothing.
    Cull,
}

impl RequiredAction {
    /// Mode transitions are admitted without budget limits.
    pub fn is_immediate(self) -> bool {
        matches!(self, Self::GoToImpostorMode | Self::GoToNormalMode | Self::Cull)
    }
}

/// Snapshot of the conditions the current impostor was rendered under.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LastUpdate {
    /// Slot holding the impostor, `None` when the object has none.
    pub slot: Option<SlotRef>,
    /// Time of the snapshot.
    pub time: f32,
    /// Direction from the object to the camera.
    pub camera_direction: Vec3,
    /// Main light direction.
    pub light_direction: Vec3,
    /// Camera distance.
    pub distance: f32,
    /// Screen-relative size.
    pub screen_size: f32,
    /// Tile resolution of the slot.
    pub texture_resolution: u32,
}

/// One object in the [`crate::ObjectTable`].
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedObject {
    /// Identity shared with atlas slots.
    pub owner: OwnerId,
    /// Spatial snapshot.
    pub data: ObjectData,
    /// Screen-size band.
    pub thresholds: LodThresholds,
    /// Settings snapshot.
    pub settings: ImpostorSettings,
    /// Inside the camera frustum this frame.
    pub visible: bool,
    /// Screen-relative size this frame.
    pub screen_size: f32,
    /// Camera distance this frame.
    pub distance: f32,
    /// Direction from the object to the camera this frame.
    pub direction: Vec3,
    /// Decision for this frame.
    pub action: RequiredAction,
    /// Conditions of the current snapshot.
    pub last_update: LastUpdate,
}

impl TrackedObject {
    /// Start tracking an object with no impostor yet.
    pub fn new(
        owner: OwnerId,
        data: ObjectData,
        thresholds: LodThresholds,
        settings: ImpostorSettings,
    ) -> Self {
        Self {
            owner,
            data,
            thresholds,
            settings,
            visible: false,
            screen_size: 0.0,
            distance: 0.0,
            direction: Vec3::ZERO,
            action: RequiredAction::NotSet,
            last_update: LastUpdate::default(),
        }
    }

    /// Returns `true` if the object currently owns an atlas slot.
    pub fn has_impostor(&self) -> bool {
        self.last_update.slot.is_some()
    }

    /// Quad plane offset in world units.
    pub fn z_offset_world(&self) -> f32 {
        self.data.quad_size * self.settings.z_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = ImpostorSettings::default();
        assert_eq!(s.z_offset, 0.5);
        assert_eq!(s.fade_transition_time, 0.2);
        assert_eq!(s.min_texture_resolution, 32);
        assert_eq!(s.max_texture_resolution, 512);
        assert!(s.use_delta_light_angle);
        assert!(!s.use_update_by_time);
        assert!(s.is_static);
    }

    #[test]
    fn test_fade_in_disabled() {
        let s = ImpostorSettings {
            use_fading: false,
            ..Default::default()
        };
        assert_eq!(s.effective_fade_in_time(), 0.0);
        assert_eq!(ImpostorSettings::default().effective_fade_in_time(), 0.3);
    }

    #[test]
    fn test_immediate_actions() {
        assert!(RequiredAction::Cull.is_immediate());
        assert!(RequiredAction::GoToImpostorMode.is_immediate());
        assert!(RequiredAction::GoToNormalMode.is_immediate());
        assert!(!RequiredAction::UpdateImpostorTexture.is_immediate());
        assert!(!RequiredAction::None.is_immediate());
        assert!(!RequiredAction::NotSet.is_immediate());
    }

    #[test]
    fn test_settings_partial_ron() {
        let s: ImpostorSettings = ron::from_str("(delta_distance: 0.5)").unwrap();
        assert_eq!(s.delta_distance, 0.5);
        assert_eq!(s.fade_in_time, 0.3);
    }

    #[test]
    fn test_z_offset_world() {
        let obj = TrackedObject::new(
            OwnerId::new(1).unwrap(),
            ObjectData {
                quad_size: 4.0,
                ..Default::default()
            },
            LodThresholds {
                switch: 0.5,
                cull: 0.01,
            },
            ImpostorSettings::default(),
        );
        assert_eq!(obj.z_offset_world(), 2.0);
        assert!(!obj.has_impostor());
    }
}

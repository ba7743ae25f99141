//! The impostor record stored in each atlas slot.

use glam::{Vec3, Vec4};
use impostor_mesh::{ImpostorQuad, QuadData};

use crate::fade::FadeTimer;
use crate::ids::OwnerId;

/// Spatial data written into a slot when it is acquired.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlotRequest {
    /// Object taking the slot.
    pub owner: OwnerId,
    /// World position of the object.
    pub position: Vec3,
    /// Direction from the object toward the camera at snapshot time.
    pub direction: Vec3,
    /// Edge length of the quad.
    pub quad_size: f32,
    /// Offset of the quad plane along `direction`.
    pub z_offset: f32,
    /// Length of the fade-in.
    pub fade_duration: f32,
}

/// One atlas slot. `owner == None` means the slot is free.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImpostorSlot {
    /// Object owning this slot.
    pub owner: Option<OwnerId>,
    /// Cleared when the owner moves on to a newer snapshot or leaves impostor
    /// mode. Irrelevant slots are fading toward release.
    pub relevant: bool,
    /// World position.
    pub position: Vec3,
    /// Facing direction.
    pub direction: Vec3,
    /// Quad edge length.
    pub quad_size: f32,
    /// Quad plane offset.
    pub z_offset: f32,
    /// Duration of the current or next fade.
    pub fade_duration: f32,
    /// Atlas rectangle `(u_min, v_min, u_max, v_max)`.
    pub uv: Vec4,
    /// Fade timer.
    pub fade: FadeTimer,
}

/// Result of advancing one slot's fade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotTransition {
    Unchanged,
    FadeOutStarted,
    Freed,
}

impl ImpostorSlot {
    /// Returns `true` if an object owns this slot.
    pub fn is_occupied(&self) -> bool {
        self.owner.is_some()
    }

    /// Advance an irrelevant slot through fade-in → fade-out → free.
    pub(crate) fn advance(&mut self, now: f32) -> SlotTransition {
        if self.owner.is_none() || self.relevant {
            return SlotTransition::Unchanged;
        }
        match self.fade {
            FadeTimer::FadingIn { until } if until > now => SlotTransition::Unchanged,
            FadeTimer::FadingIn { .. } => {
                self.fade = FadeTimer::FadingOut {
                    until: now + self.fade_duration,
                };
                SlotTransition::FadeOutStarted
            }
            FadeTimer::FadingOut { until } if until < now => {
                self.owner = None;
                SlotTransition::Freed
            }
            FadeTimer::FadingOut { .. } => SlotTransition::Unchanged,
        }
    }

    /// Free the slot immediately if it belongs to one of `owners`.
    pub(crate) fn evict_owners(&mut self, owners: &[OwnerId]) -> SlotTransition {
        match self.owner {
            Some(owner) if owners.contains(&owner) => {
                self.owner = None;
                SlotTransition::Freed
            }
            _ => SlotTransition::Unchanged,
        }
    }
}

impl ImpostorQuad for ImpostorSlot {
    fn quad(&self) -> Option<QuadData> {
        self.owner?;
        Some(QuadData {
            position: self.position,
            direction: self.direction,
            quad_size: self.quad_size,
            z_offset: self.z_offset,
            uv: self.uv,
            fade_time: self.fade.encoded(),
            fade_duration: self.fade_duration,
        })
    }
}

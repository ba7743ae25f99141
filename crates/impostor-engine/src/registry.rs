//! Object registration: validation, normalization and cached render data.
//!
//! Everything derived from an object's renderers is computed once here. The
//! per-frame stages only see the resulting [`ObjectData`] snapshot and the
//! prebuilt instruction cache.

use glam::{Mat4, Vec3};
use impostor_atlas::OwnerId;
use impostor_config::validate_texture_resolutions;
use impostor_lod::{ImpostorSettings, LodThresholds, ObjectData};
use impostor_render::{RendererCache, RendererDesc, RendererId};

use crate::error::RegistrationError;

/// Smallest gap kept between consecutive normalized detail LOD heights.
const DETAIL_HEIGHT_STEP: f32 = 1e-6;

/// One LOD level: the screen-relative height it starts at and the renderers
/// it shows.
#[derive(Clone, Debug, PartialEq)]
pub struct ImpostorLod {
    /// Screen-relative height in (0, 1].
    pub screen_relative_height: f32,
    /// Renderers drawn at this level.
    pub renderers: Vec<RendererId>,
}

/// Description of an object entering the impostor system.
#[derive(Clone, Debug, PartialEq)]
pub struct ImpostorLodGroup {
    /// Name used in diagnostics.
    pub name: String,
    /// Impostor levels, highest first. The first height is where the object
    /// switches to an impostor, the last is where it is culled.
    pub lods: Vec<ImpostorLod>,
    /// The host's own full-detail levels, highest first.
    pub detail_lods: Vec<ImpostorLod>,
    /// Every renderer referenced by `lods`.
    pub renderers: Vec<RendererDesc>,
    /// Per-object settings, or `None` for the configured defaults.
    pub settings: Option<ImpostorSettings>,
}

/// What the host needs to know after a successful registration.
#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    /// Id of the new object.
    pub owner: OwnerId,
    /// Renderers only the impostor LODs reference. No detail LOD controls
    /// their visibility, so the host must disable them.
    pub hidden_renderers: Vec<RendererId>,
    /// Detail LOD heights raised to at least the impostor switch height, so
    /// the detail group hands over to the impostor exactly at the switch.
    pub detail_lod_heights: Vec<f32>,
    /// Renderers excluded from snapshots.
    pub skipped_renderers: Vec<RendererId>,
}

/// Render data kept for every registered object.
#[derive(Debug)]
pub(crate) struct RegisteredGroup {
    pub name: String,
    pub cache: RendererCache,
    pub lod_heights: Vec<f32>,
    pub lod_renderers: Vec<Vec<RendererId>>,
    renderers: Vec<RendererDesc>,
}

impl RegisteredGroup {
    /// Move every renderer by `offset` and rebuild the instruction cache.
    pub fn translate(&mut self, offset: Vec3) {
        let shift = Mat4::from_translation(offset);
        for desc in &mut self.renderers {
            desc.local_to_world = shift * desc.local_to_world;
            desc.bounds_min += offset;
            desc.bounds_max += offset;
        }
        self.cache = RendererCache::build(&self.renderers);
    }

    /// Approximate CPU bytes held.
    pub fn used_bytes(&self) -> usize {
        let instructions: usize = self
            .lod_renderers
            .iter()
            .map(|r| r.len() * std::mem::size_of::<RendererId>())
            .sum();
        std::mem::size_of::<Self>()
            + self.name.len()
            + self.lod_heights.len() * std::mem::size_of::<f32>()
            + instructions
            + self.renderers.len() * std::mem::size_of::<RendererDesc>()
            + self.cache.used_bytes()
    }
}

/// Output of [`prepare`]: everything needed to start tracking an object.
#[derive(Debug)]
pub(crate) struct PreparedGroup {
    pub group: RegisteredGroup,
    pub data: ObjectData,
    pub thresholds: LodThresholds,
    pub hidden_renderers: Vec<RendererId>,
    pub detail_lod_heights: Vec<f32>,
}

/// Validate `desc` and derive its tracking data.
pub(crate) fn prepare(desc: &ImpostorLodGroup) -> Result<PreparedGroup, RegistrationError> {
    let (first, last) = match (desc.lods.first(), desc.lods.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(RegistrationError::NoLods),
    };
    validate_heights(&desc.lods)?;

    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for (lod_index, lod) in desc.lods.iter().enumerate() {
        for &id in &lod.renderers {
            let renderer = desc
                .renderers
                .iter()
                .find(|r| r.id == id)
                .ok_or(RegistrationError::UnknownRenderer {
                    lod: lod_index,
                    renderer: id,
                })?;
            min = min.min(renderer.bounds_min);
            max = max.max(renderer.bounds_max);
        }
    }
    let (center, size) = if min.cmple(max).all() {
        ((min + max) * 0.5, max - min)
    } else {
        (Vec3::ZERO, Vec3::ZERO)
    };

    let data = ObjectData {
        position: center,
        size,
        height: size.y,
        quad_size: size.max_element(),
    };
    let thresholds = LodThresholds {
        switch: first.screen_relative_height,
        cull: last.screen_relative_height,
    };

    let cache = RendererCache::build(&desc.renderers);
    if !cache.skipped().is_empty() {
        log::warn!(
            "'{}': {} renderer(s) excluded from snapshots",
            desc.name,
            cache.skipped().len()
        );
    }

    Ok(PreparedGroup {
        group: RegisteredGroup {
            name: desc.name.clone(),
            cache,
            lod_heights: desc.lods.iter().map(|l| l.screen_relative_height).collect(),
            lod_renderers: desc.lods.iter().map(|l| l.renderers.clone()).collect(),
            renderers: desc.renderers.clone(),
        },
        data,
        thresholds,
        hidden_renderers: hidden_renderers(&desc.lods, &desc.detail_lods),
        detail_lod_heights: normalize_detail_heights(&desc.detail_lods, thresholds.switch),
    })
}

/// Check settings against the atlas the object will be packed into.
pub(crate) fn validate_settings(
    settings: &ImpostorSettings,
    atlas_resolution: u32,
) -> Result<(), RegistrationError> {
    validate_texture_resolutions(settings, atlas_resolution)
        .map_err(|e| RegistrationError::InvalidSettings(e.to_string()))?;
    if settings.fade_in_time < 0.0 || settings.fade_transition_time < 0.0 {
        return Err(RegistrationError::InvalidSettings(format!(
            "fade times must not be negative (in {}, transition {})",
            settings.fade_in_time, settings.fade_transition_time
        )));
    }
    Ok(())
}

fn validate_heights(lods: &[ImpostorLod]) -> Result<(), RegistrationError> {
    let mut previous = f32::INFINITY;
    for (index, lod) in lods.iter().enumerate() {
        let height = lod.screen_relative_height;
        if !(height > 0.0 && height <= 1.0 && height < previous) {
            return Err(RegistrationError::InvalidLodHeights { index, height });
        }
        previous = height;
    }
    Ok(())
}

fn hidden_renderers(lods: &[ImpostorLod], detail_lods: &[ImpostorLod]) -> Vec<RendererId> {
    let mut hidden = Vec::new();
    for &id in lods.iter().flat_map(|l| &l.renderers) {
        let in_detail = detail_lods.iter().any(|l| l.renderers.contains(&id));
        if !in_detail && !hidden.contains(&id) {
            hidden.push(id);
        }
    }
    hidden
}

fn normalize_detail_heights(detail_lods: &[ImpostorLod], switch: f32) -> Vec<f32> {
    let mut heights = vec![0.0; detail_lods.len()];
    let mut floor = switch;
    for (i, lod) in detail_lods.iter().enumerate().rev() {
        heights[i] = lod.screen_relative_height.max(floor).min(1.0);
        floor += DETAIL_HEIGHT_STEP;
    }
    heights
}

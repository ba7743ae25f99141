//! Work-queue execution: slot bookkeeping and snapshot recording.
//!
//! Runs on the calling thread after selection. Every queued object first
//! gets its slot operation applied, then one command buffer is recorded for
//! all texture updates, grouped by destination chunk so each atlas is bound
//! once per frame where possible.

use glam::{Vec3, Vec4};
use impostor_atlas::{AtlasError, ChunkId, ChunkPool, OwnerId, SlotRequest, clamp_pow2};
use impostor_lod::{LastUpdate, RequiredAction, TrackedObject};
use impostor_render::{
    CommandBuffer, DirectionalLight, RenderCommand, RenderPipeline, SnapshotCamera, global,
    select_lod_level,
};
use rustc_hash::FxHashMap;

use crate::registry::RegisteredGroup;

/// Name of the per-frame snapshot command buffer.
pub(crate) const SNAPSHOT_BUFFER_NAME: &str = "Impostor snapshots";

/// Quality and budget values the dispatcher reads from config.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DispatchSettings {
    pub texture_size_scale: f32,
    pub lod_bias: f32,
    pub background_clear_color: Vec4,
    /// Updates are grouped by chunk only below this count.
    pub sort_threshold: usize,
}

/// Per-frame inputs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DispatchFrame<'a> {
    pub camera_position: Vec3,
    pub camera_near: f32,
    pub camera_far: f32,
    pub light: Option<&'a DirectionalLight>,
    pub screen_height: u32,
    pub time: f32,
    pub delta_time: f32,
}

/// Counters from one dispatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DispatchStats {
    /// Queue entries processed.
    pub processed: usize,
    /// Snapshots recorded.
    pub texture_updates: usize,
    /// Slots handed back to the pool.
    pub released: usize,
    /// Entries skipped because a slot operation failed.
    pub failed: usize,
}

/// Result of one dispatch.
#[derive(Debug)]
pub(crate) struct DispatchOutcome {
    pub stats: DispatchStats,
    /// Snapshot commands, `None` when nothing needed a new texture.
    pub commands: Option<CommandBuffer>,
}

#[derive(Debug)]
pub(crate) struct Dispatcher {
    settings: DispatchSettings,
    updated: Vec<usize>,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings) -> Self {
        Self {
            settings,
            updated: Vec::new(),
        }
    }

    /// Execute the work queue. `queue` holds indices into `objects`.
    ///
    /// An entry whose slot operation fails is logged and skipped; the rest
    /// of the queue still runs. A failed acquire leaves the object without
    /// a slot, so it is queued again on a later frame.
    pub fn dispatch<P: RenderPipeline>(
        &mut self,
        queue: &[usize],
        objects: &mut [TrackedObject],
        groups: &FxHashMap<OwnerId, RegisteredGroup>,
        pool: &mut ChunkPool,
        pipeline: &P,
        frame: &DispatchFrame<'_>,
    ) -> DispatchOutcome {
        self.updated.clear();
        let mut stats = DispatchStats::default();

        for &index in queue {
            let Some(object) = objects.get_mut(index) else {
                log::error!("Work queue index {index} is out of range");
                continue;
            };
            stats.processed += 1;
            match object.action {
                RequiredAction::GoToImpostorMode | RequiredAction::UpdateImpostorTexture => {
                    if self.release_previous(object, pool, frame) {
                        stats.released += 1;
                    }
                    match self.acquire(object, pool, frame) {
                        Ok(()) => self.updated.push(index),
                        Err(e) => {
                            log::error!("Failed to acquire a slot for {}: {e}", object.owner);
                            stats.failed += 1;
                        }
                    }
                }
                RequiredAction::Cull | RequiredAction::GoToNormalMode => {
                    if let Some(slot) = object.last_update.slot.take() {
                        match pool.release(
                            slot,
                            object.settings.fade_transition_time,
                            false,
                            frame.time,
                        ) {
                            Ok(()) => stats.released += 1,
                            Err(e) => {
                                log::error!("Failed to release {slot:?} of {}: {e}", object.owner);
                                stats.failed += 1;
                            }
                        }
                    }
                }
                RequiredAction::NotSet | RequiredAction::None => {
                    log::error!(
                        "Object {} queued with action {:?}",
                        object.owner,
                        object.action
                    );
                }
            }
        }

        stats.texture_updates = self.updated.len();
        if self.updated.is_empty() {
            return DispatchOutcome {
                stats,
                commands: None,
            };
        }

        if self.updated.len() < self.settings.sort_threshold {
            self.updated
                .sort_by_key(|&i| objects[i].last_update.slot.map(|s| s.chunk));
        }

        let commands = self.record(objects, groups, pool, pipeline, frame);
        DispatchOutcome {
            stats,
            commands: Some(commands),
        }
    }

    /// Release the object's current slot, if any, keeping its fade-in so
    /// the old snapshot cross-fades with the new one. Returns whether a slot
    /// was released.
    fn release_previous(
        &self,
        object: &mut TrackedObject,
        pool: &mut ChunkPool,
        frame: &DispatchFrame<'_>,
    ) -> bool {
        let Some(old) = object.last_update.slot.take() else {
            return false;
        };
        match pool.release(old, object.settings.fade_transition_time, true, frame.time) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to release {old:?} of {}: {e}", object.owner);
                false
            }
        }
    }

    /// Acquire a slot sized for the object's current screen size.
    fn acquire(
        &self,
        object: &mut TrackedObject,
        pool: &mut ChunkPool,
        frame: &DispatchFrame<'_>,
    ) -> Result<(), AtlasError> {
        let settings = object.settings;
        let scaled = self.settings.texture_size_scale
            * object.screen_size
            * frame.screen_height as f32
            / self.settings.lod_bias;
        let resolution = clamp_pow2(
            scaled as u32,
            settings.min_texture_resolution,
            settings.max_texture_resolution,
        );
        let fade_duration = if object.action == RequiredAction::GoToImpostorMode {
            settings.effective_fade_in_time()
        } else {
            settings.fade_transition_time
        };

        let request = SlotRequest {
            owner: object.owner,
            position: object.data.position,
            direction: object.direction,
            quad_size: object.data.quad_size,
            z_offset: object.z_offset_world(),
            fade_duration,
        };
        let slot = pool.acquire(resolution, &request, frame.time, frame.delta_time)?;

        object.last_update = LastUpdate {
            slot: Some(slot),
            time: frame.time,
            camera_direction: object.direction,
            light_direction: frame.light.map_or(Vec3::ZERO, |l| l.direction),
            distance: object.distance,
            screen_size: object.screen_size,
            texture_resolution: resolution,
        };
        Ok(())
    }

    fn record<P: RenderPipeline>(
        &self,
        objects: &[TrackedObject],
        groups: &FxHashMap<OwnerId, RegisteredGroup>,
        pool: &mut ChunkPool,
        pipeline: &P,
        frame: &DispatchFrame<'_>,
    ) -> CommandBuffer {
        let mut cb = CommandBuffer::new(SNAPSHOT_BUFFER_NAME);
        pipeline.set_fog_enabled(false, &mut cb);
        if let Some(light) = frame.light {
            cb.push(RenderCommand::SetGlobalVector {
                name: global::WORLD_SPACE_LIGHT_POS,
                value: (-light.direction).extend(0.0),
            });
            cb.push(RenderCommand::SetGlobalVector {
                name: global::LIGHT_COLOR,
                value: light.color,
            });
        }

        let mut current: Option<ChunkId> = None;
        for &index in &self.updated {
            let object = &objects[index];
            let Some(slot) = object.last_update.slot else {
                continue;
            };
            let Some(group) = groups.get(&object.owner) else {
                log::error!("Object {} has no render data", object.owner);
                continue;
            };

            if current != Some(slot.chunk) {
                if let Some(previous) = current
                    && let Some(chunk) = pool.get(previous)
                {
                    chunk.end_rendering(&mut cb);
                }
                current = None;
                if let Err(e) = pool.begin_rendering(slot.chunk, &mut cb) {
                    log::error!("Cannot render into {}: {e}", slot.chunk);
                    continue;
                }
                current = Some(slot.chunk);
            }
            let Some(chunk) = pool.get(slot.chunk) else {
                continue;
            };
            chunk.set_slot_viewport(slot.index, &mut cb);
            cb.push(RenderCommand::ClearRenderTarget {
                color: self.settings.background_clear_color,
                clear_depth: true,
            });

            let camera = SnapshotCamera::frame(
                frame.camera_position,
                object.data.position,
                object.data.quad_size,
                object.z_offset_world(),
            );
            cb.push(RenderCommand::SetViewProjection {
                view: camera.view,
                projection: camera.projection,
            });
            cb.push(RenderCommand::SetGlobalVector {
                name: global::WORLD_SPACE_CAMERA_POS,
                value: frame.camera_position.extend(1.0),
            });
            cb.push(RenderCommand::SetGlobalVector {
                name: global::PROJECTION_PARAMS,
                value: camera.projection_params(),
            });

            if let Some(renderers) = select_lod_level(&group.lod_heights, object.screen_size)
                .and_then(|level| group.lod_renderers.get(level))
            {
                group.cache.apply(renderers, &mut cb);
            }
        }

        if let Some(last) = current
            && let Some(chunk) = pool.get(last)
        {
            chunk.end_rendering(&mut cb);
        }
        pipeline.set_fog_enabled(true, &mut cb);
        cb.push(RenderCommand::SetGlobalVector {
            name: global::PROJECTION_PARAMS,
            value: Vec4::new(
                -1.0,
                frame.camera_near,
                frame.camera_far,
                1.0 / frame.camera_far,
            ),
        });
        cb
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;
    use impostor_lod::ImpostorSettings;
    use impostor_render::{
        MaterialHandle, MeshHandle, RecordingPipeline, RendererDesc, RendererId, RendererKind,
        TextureHandle,
    };

    use super::*;
    use crate::registry::{ImpostorLod, ImpostorLodGroup, prepare};

    const LIGHT: DirectionalLight = DirectionalLight {
        direction: Vec3::NEG_Y,
        color: Vec4::ONE,
    };

    fn settings() -> DispatchSettings {
        DispatchSettings {
            texture_size_scale: 2.0,
            lod_bias: 1.0,
            background_clear_color: Vec4::new(0.5, 0.5, 0.5, 0.0),
            sort_threshold: 200,
        }
    }

    fn frame(time: f32) -> DispatchFrame<'static> {
        DispatchFrame {
            camera_position: Vec3::new(0.0, 0.0, 100.0),
            camera_near: 0.1,
            camera_far: 1000.0,
            light: Some(&LIGHT),
            screen_height: 1000,
            time,
            delta_time: 0.0,
        }
    }

    fn group() -> ImpostorLodGroup {
        ImpostorLodGroup {
            name: "crate".to_string(),
            lods: vec![
                ImpostorLod {
                    screen_relative_height: 0.5,
                    renderers: vec![RendererId(1)],
                },
                ImpostorLod {
                    screen_relative_height: 0.01,
                    renderers: vec![RendererId(1)],
                },
            ],
            detail_lods: Vec::new(),
            renderers: vec![RendererDesc {
                id: RendererId(1),
                name: "body".to_string(),
                kind: RendererKind::Mesh(MeshHandle(7)),
                materials: vec![MaterialHandle(3)],
                local_to_world: Mat4::IDENTITY,
                lightmap: None,
                static_batched: false,
                bounds_min: Vec3::splat(-1.0),
                bounds_max: Vec3::splat(1.0),
            }],
            settings: None,
        }
    }

    struct Fixture {
        objects: Vec<TrackedObject>,
        groups: FxHashMap<OwnerId, RegisteredGroup>,
        pool: ChunkPool,
        dispatcher: Dispatcher,
        pipeline: RecordingPipeline,
    }

    /// `count` objects with screen size `screen_size`, each wanting `action`.
    fn fixture(count: u32, screen_size: f32, action: RequiredAction) -> Fixture {
        let mut objects = Vec::new();
        let mut groups = FxHashMap::default();
        for raw in 1..=count {
            let owner = OwnerId::new(raw).unwrap();
            let prepared = prepare(&group()).unwrap();
            let mut object = TrackedObject::new(
                owner,
                prepared.data,
                prepared.thresholds,
                ImpostorSettings::default(),
            );
            object.screen_size = screen_size;
            object.distance = 100.0;
            object.direction = Vec3::new(0.0, 0.0, 100.0);
            object.action = action;
            objects.push(object);
            groups.insert(owner, prepared.group);
        }
        Fixture {
            objects,
            groups,
            pool: ChunkPool::new(1024, false).unwrap(),
            dispatcher: Dispatcher::new(settings()),
            pipeline: RecordingPipeline::new(),
        }
    }

    impl Fixture {
        fn run(&mut self, queue: &[usize], time: f32) -> DispatchOutcome {
            self.dispatcher
                .dispatch(
                    queue,
                    &mut self.objects,
                    &self.groups,
                    &mut self.pool,
                    &self.pipeline,
                    &frame(time),
                )
        }
    }

    #[test]
    fn test_enter_impostor_mode_acquires_slot() {
        let mut f = fixture(1, 0.02, RequiredAction::GoToImpostorMode);
        let outcome = f.run(&[0], 1.0);
        assert_eq!(outcome.stats.texture_updates, 1);
        assert_eq!(outcome.stats.released, 0);

        let last = f.objects[0].last_update;
        assert!(last.slot.is_some());
        // 2 * 0.02 * 1000 = 40 -> 64.
        assert_eq!(last.texture_resolution, 64);
        assert_eq!(last.time, 1.0);
        assert_eq!(last.light_direction, Vec3::NEG_Y);
        assert_eq!(f.pool.occupied_slots(), 1);
        assert_eq!(f.pool.chunks()[0].tile_resolution(), 64);
    }

    #[test]
    fn test_resolution_clamped_to_settings() {
        let mut f = fixture(2, 0.001, RequiredAction::GoToImpostorMode);
        f.objects[1].screen_size = 0.9;
        f.run(&[0, 1], 0.0);
        assert_eq!(f.objects[0].last_update.texture_resolution, 32);
        assert_eq!(f.objects[1].last_update.texture_resolution, 512);
    }

    #[test]
    fn test_update_releases_previous_slot() {
        let mut f = fixture(1, 0.02, RequiredAction::GoToImpostorMode);
        f.run(&[0], 0.0);
        let first = f.objects[0].last_update.slot.unwrap();

        f.objects[0].action = RequiredAction::UpdateImpostorTexture;
        let outcome = f.run(&[0], 1.0);
        assert_eq!(outcome.stats.released, 1);
        let second = f.objects[0].last_update.slot.unwrap();
        assert_ne!(first, second);

        let old = f.pool.get(first.chunk).unwrap().slot(first.index).unwrap();
        assert!(!old.relevant);
        assert_eq!(f.pool.occupied_slots(), 2);
    }

    #[test]
    fn test_cull_releases_slot() {
        let mut f = fixture(1, 0.02, RequiredAction::GoToImpostorMode);
        f.run(&[0], 0.0);
        f.objects[0].action = RequiredAction::Cull;
        let outcome = f.run(&[0], 1.0);
        assert!(f.objects[0].last_update.slot.is_none());
        assert_eq!(outcome.stats.released, 1);
        assert_eq!(outcome.stats.texture_updates, 0);
        assert!(outcome.commands.is_none());
    }

    #[test]
    fn test_not_set_is_skipped() {
        let mut f = fixture(1, 0.02, RequiredAction::NotSet);
        let outcome = f.run(&[0], 0.0);
        assert_eq!(outcome.stats.processed, 1);
        assert!(outcome.commands.is_none());
        assert_eq!(f.pool.occupied_slots(), 0);
    }

    #[test]
    fn test_snapshot_command_order() {
        let mut f = fixture(1, 0.02, RequiredAction::GoToImpostorMode);
        let commands = f.run(&[0], 0.0).commands.unwrap();
        let commands = commands.commands();

        assert_eq!(commands[0], RenderCommand::SetFogEnabled(false));
        assert_eq!(
            commands[1],
            RenderCommand::SetGlobalVector {
                name: global::WORLD_SPACE_LIGHT_POS,
                value: Vec4::new(0.0, 1.0, 0.0, 0.0),
            }
        );
        assert!(matches!(commands[3], RenderCommand::SetRenderTarget { .. }));
        // First use of the chunk clears the whole atlas to transparent.
        assert!(matches!(
            commands[5],
            RenderCommand::ClearRenderTarget { color, .. } if color == Vec4::ZERO
        ));
        assert!(matches!(commands[6], RenderCommand::SetViewport(_)));
        assert_eq!(
            commands[7],
            RenderCommand::ClearRenderTarget {
                color: Vec4::new(0.5, 0.5, 0.5, 0.0),
                clear_depth: true,
            }
        );
        assert!(matches!(commands[8], RenderCommand::SetViewProjection { .. }));
        assert!(
            commands
                .iter()
                .any(|c| matches!(c, RenderCommand::DrawMesh { .. }))
        );

        let n = commands.len();
        assert_eq!(commands[n - 2], RenderCommand::SetFogEnabled(true));
        assert_eq!(
            commands[n - 1],
            RenderCommand::SetGlobalVector {
                name: global::PROJECTION_PARAMS,
                value: Vec4::new(-1.0, 0.1, 1000.0, 1.0 / 1000.0),
            }
        );
    }

    /// Objects landing in two tiers are grouped so each atlas is bound once.
    #[test]
    fn test_updates_grouped_by_chunk() {
        let mut f = fixture(4, 0.02, RequiredAction::GoToImpostorMode);
        f.objects[1].screen_size = 0.1;
        f.objects[3].screen_size = 0.1;
        let commands = f.run(&[0, 1, 2, 3], 0.0).commands.unwrap();
        assert_eq!(commands.render_target_switches(), 2);
    }

    fn render_targets(commands: &CommandBuffer) -> Vec<TextureHandle> {
        commands
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::SetRenderTarget { texture } => Some(*texture),
                _ => None,
            })
            .collect()
    }

    /// Interleaved tiers are regrouped only while the update count stays
    /// below the sort threshold.
    #[test]
    fn test_sort_threshold() {
        let interleaved = |threshold: usize| {
            let mut f = fixture(4, 0.02, RequiredAction::GoToImpostorMode);
            f.dispatcher = Dispatcher::new(DispatchSettings {
                sort_threshold: threshold,
                ..settings()
            });
            f.objects[1].screen_size = 0.1;
            f.objects[3].screen_size = 0.1;
            let commands = f.run(&[0, 1, 2, 3], 0.0).commands.unwrap();
            let small = f.pool.chunks()[0].texture();
            let large = f.pool.chunks()[1].texture();
            assert_eq!(f.pool.chunks()[0].tile_resolution(), 64);
            assert_eq!(f.pool.chunks()[1].tile_resolution(), 256);
            (render_targets(&commands), small, large)
        };

        let (targets, small, large) = interleaved(5);
        assert_eq!(targets, vec![small, large]);

        let (targets, small, large) = interleaved(2);
        assert_eq!(targets, vec![small, large, small, large]);

        let (targets, small, large) = interleaved(4);
        assert_eq!(targets, vec![small, large, small, large]);
    }

    /// A tile larger than the atlas fails for that object only.
    #[test]
    fn test_failed_acquire_skips_entry() {
        let mut f = fixture(2, 0.02, RequiredAction::GoToImpostorMode);
        f.objects[0].settings.max_texture_resolution = 2048;
        f.objects[0].screen_size = 2.0;

        let outcome = f.run(&[0, 1], 0.0);
        assert_eq!(outcome.stats.processed, 2);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.stats.texture_updates, 1);
        assert!(f.objects[0].last_update.slot.is_none());
        assert!(f.objects[1].last_update.slot.is_some());
        assert_eq!(f.pool.occupied_slots(), 1);

        let commands = outcome.commands.unwrap();
        assert_eq!(commands.render_target_switches(), 1);
    }

    #[test]
    fn test_no_light_skips_light_globals() {
        let mut f = fixture(1, 0.02, RequiredAction::GoToImpostorMode);
        let mut no_light = frame(0.0);
        no_light.light = None;
        let outcome = f
            .dispatcher
            .dispatch(&[0], &mut f.objects, &f.groups, &mut f.pool, &f.pipeline, &no_light);
        let commands = outcome.commands.unwrap();
        assert!(!commands.commands().iter().any(|c| matches!(
            c,
            RenderCommand::SetGlobalVector {
                name: global::LIGHT_COLOR,
                ..
            }
        )));
        assert_eq!(f.objects[0].last_update.light_direction, Vec3::ZERO);
    }
}

//! The per-frame orchestrator.
//!
//! One [`ImpostorSystem::tick`] runs the whole frame in a fixed order:
//!
//! 1. advance the clock;
//! 2. frustum visibility and mode decisions, in parallel over all objects;
//! 3. bounded selection of this frame's work queue;
//! 4. chunk ticks, retiring faded-out slots;
//! 5. dispatch of the queue, recording snapshot renders;
//! 6. eviction of empty chunks and mesh rebuilds;
//! 7. submission of snapshot commands and chunk draws to the pipeline.

use glam::{Mat4, Vec3, Vec4};
use impostor_atlas::{ChunkPool, OwnerId};
use impostor_config::Config;
use impostor_lod::{
    ByScreenSizeAndStaleness, FrameView, Frustum, ImpostorSettings, ObjectTable, TrackedObject,
    UpdateBudget, UpdatePrioritizer, compute_decisions, compute_visibility,
};
use impostor_render::{DirectionalLight, ImpostorDrawParams, RenderPipeline};
use rustc_hash::FxHashMap;

use crate::clock::{Clock, UnscaledClock};
use crate::dispatcher::{DispatchFrame, DispatchSettings, Dispatcher};
use crate::draw::draw_chunks;
use crate::error::{EngineError, RegistrationError};
use crate::registry::{
    ImpostorLodGroup, RegisteredGroup, Registration, prepare, validate_settings,
};

/// Main camera state for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    /// World position.
    pub position: Vec3,
    /// View-projection matrix with `[0, 1]` depth.
    pub view_projection: Mat4,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
    /// Viewport height in pixels.
    pub screen_height: u32,
}

/// Counters for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Registered objects.
    pub tracked_objects: usize,
    /// Objects inside the frustum.
    pub visible_objects: usize,
    /// Objects whose snapshot is stale.
    pub needing_update: usize,
    /// Work queue length.
    pub queued: usize,
    /// Snapshots rendered.
    pub texture_updates: usize,
    /// Queue entries skipped because a slot operation failed.
    pub failed_updates: usize,
    /// Slots freed by chunk ticks.
    pub released_slots: usize,
    /// Chunks evicted because they emptied.
    pub evicted_chunks: usize,
    /// Chunks alive after eviction.
    pub live_chunks: usize,
    /// Occupied slots across all chunks.
    pub occupied_slots: u32,
    /// Chunk meshes rebuilt.
    pub meshes_rebuilt: usize,
    /// Chunk draws submitted.
    pub draw_calls: usize,
}

/// Impostor allocation and update scheduling for one scene.
pub struct ImpostorSystem<P: RenderPipeline, C: Clock = UnscaledClock> {
    config: Config,
    pipeline: P,
    clock: C,
    table: ObjectTable,
    groups: FxHashMap<OwnerId, RegisteredGroup>,
    pool: ChunkPool,
    dispatcher: Dispatcher,
    prioritizer: Box<dyn UpdatePrioritizer>,
    queue: Vec<usize>,
    next_owner: u32,
    frame_count: u64,
}

impl<P: RenderPipeline, C: Clock> ImpostorSystem<P, C> {
    /// Create a system with the default prioritizer. Fails if `config` is
    /// invalid.
    pub fn new(config: Config, pipeline: P, clock: C) -> Result<Self, EngineError> {
        config.validate()?;
        let pool = ChunkPool::new(config.atlas.atlas_resolution, config.atlas.use_mip_maps)?;
        let dispatcher = Dispatcher::new(DispatchSettings {
            texture_size_scale: config.quality.texture_size_scale,
            lod_bias: config.quality.lod_bias,
            background_clear_color: Vec4::from_array(config.quality.background_clear_color),
            sort_threshold: config.budget.sort_threshold as usize,
        });
        log::info!(
            "Impostor system ready: {}px atlases, {} updates/frame ({} background)",
            config.atlas.atlas_resolution,
            config.budget.max_updates_per_frame,
            config.budget.max_background_updates_per_frame
        );
        Ok(Self {
            config,
            pipeline,
            clock,
            table: ObjectTable::new(),
            groups: FxHashMap::default(),
            pool,
            dispatcher,
            prioritizer: Box::new(ByScreenSizeAndStaleness),
            queue: Vec::new(),
            next_owner: 1,
            frame_count: 0,
        })
    }

    /// Replace the refresh prioritizer.
    pub fn with_prioritizer(mut self, prioritizer: impl UpdatePrioritizer + 'static) -> Self {
        self.prioritizer = Box::new(prioritizer);
        self
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Start tracking an object under a freshly minted id.
    pub fn register(&mut self, desc: &ImpostorLodGroup) -> Result<Registration, RegistrationError> {
        let owner = self.mint_owner();
        self.register_with_id(owner, desc)
    }

    /// Start tracking an object under a caller-chosen id.
    pub fn register_with_id(
        &mut self,
        owner: OwnerId,
        desc: &ImpostorLodGroup,
    ) -> Result<Registration, RegistrationError> {
        if self.table.contains(owner) {
            return Err(RegistrationError::AlreadyRegistered(owner));
        }
        let settings = desc.settings.unwrap_or(self.config.defaults);
        validate_settings(&settings, self.config.atlas.atlas_resolution)?;
        let prepared = prepare(desc)?;

        let object = TrackedObject::new(owner, prepared.data, prepared.thresholds, settings);
        if !self.table.push(object) {
            return Err(RegistrationError::AlreadyRegistered(owner));
        }
        let skipped_renderers = prepared.group.cache.skipped().to_vec();
        self.groups.insert(owner, prepared.group);
        log::debug!(
            "Registered '{}' as {} (switch {}, cull {})",
            desc.name,
            owner,
            prepared.thresholds.switch,
            prepared.thresholds.cull
        );

        Ok(Registration {
            owner,
            hidden_renderers: prepared.hidden_renderers,
            detail_lod_heights: prepared.detail_lod_heights,
            skipped_renderers,
        })
    }

    /// Stop tracking an object. Its slots are freed at the next tick.
    pub fn unregister(&mut self, owner: OwnerId) -> Result<(), RegistrationError> {
        self.table
            .remove(owner)
            .ok_or(RegistrationError::UnknownObject(owner))?;
        self.pool.queue_owner_removal(owner);
        self.groups.remove(&owner);
        log::debug!("Unregistered {owner}");
        Ok(())
    }

    /// Replace an object's settings.
    pub fn update_settings(
        &mut self,
        owner: OwnerId,
        settings: ImpostorSettings,
    ) -> Result<(), RegistrationError> {
        validate_settings(&settings, self.config.atlas.atlas_resolution)?;
        if self.table.update_settings(owner, settings) {
            Ok(())
        } else {
            Err(RegistrationError::UnknownObject(owner))
        }
    }

    /// Move a non-static object so its bounds are centered on `position`.
    pub fn update_transform(
        &mut self,
        owner: OwnerId,
        position: Vec3,
    ) -> Result<(), RegistrationError> {
        let object = self
            .table
            .get_mut(owner)
            .ok_or(RegistrationError::UnknownObject(owner))?;
        if object.settings.is_static {
            return Err(RegistrationError::StaticObject(owner));
        }
        let offset = position - object.data.position;
        object.data.position = position;
        if let Some(group) = self.groups.get_mut(&owner) {
            group.translate(offset);
        }
        Ok(())
    }

    fn mint_owner(&mut self) -> OwnerId {
        loop {
            let raw = self.next_owner;
            self.next_owner = self.next_owner.wrapping_add(1);
            if let Some(owner) = OwnerId::new(raw)
                && !self.table.contains(owner)
            {
                return owner;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    /// Run one frame.
    pub fn tick(
        &mut self,
        camera: &CameraState,
        light: Option<&DirectionalLight>,
    ) -> Result<FrameStats, EngineError> {
        self.clock.update();
        let now = self.clock.time();
        let delta_time = self.clock.delta_time();

        let objects = self.table.objects_mut();
        let frustum = Frustum::from_view_projection(&camera.view_projection);
        let visible_objects = compute_visibility(objects, &frustum);

        let view = FrameView {
            camera_position: camera.position,
            view_projection: camera.view_projection,
            fov_y: camera.fov_y,
            lod_bias: self.config.quality.lod_bias,
            screen_height: camera.screen_height,
            light_direction: light.map_or(Vec3::ZERO, |l| l.direction),
            time: now,
        };
        let needing_update = compute_decisions(objects, &view);

        let budget = UpdateBudget {
            max_updates: self.config.budget.max_updates_per_frame as usize,
            max_background_updates: self.config.budget.max_background_updates_per_frame
                as usize,
        };
        self.queue.clear();
        self.prioritizer.select(objects, budget, now, &mut self.queue);

        let released_slots = self.pool.tick(now);

        let frame = DispatchFrame {
            camera_position: camera.position,
            camera_near: camera.near,
            camera_far: camera.far,
            light,
            screen_height: camera.screen_height,
            time: now,
            delta_time,
        };
        let outcome = self.dispatcher.dispatch(
            &self.queue,
            objects,
            &self.groups,
            &mut self.pool,
            &self.pipeline,
            &frame,
        );

        let evicted_chunks = self.pool.destroy_empty().len();
        let meshes_rebuilt = self.pool.rebuild_meshes();
        if let Some(commands) = outcome.commands {
            self.pipeline.schedule_command_buffer(commands);
        }

        let base = ImpostorDrawParams {
            camera_position: camera.position,
            time: now,
            delta_time,
            cutout: self.config.quality.cutout,
            mip_map_bias: self.config.atlas.mip_map_bias,
            min_angle_to_stop_look_at: self.config.quality.min_angle_to_stop_look_at,
            debug_color: Vec4::ZERO,
            render_queue: 0,
        };
        let draw_calls = draw_chunks(&self.pool, &mut self.pipeline, base, &self.config.debug);

        let stats = FrameStats {
            tracked_objects: self.table.len(),
            visible_objects,
            needing_update,
            queued: self.queue.len(),
            texture_updates: outcome.stats.texture_updates,
            failed_updates: outcome.stats.failed,
            released_slots,
            evicted_chunks,
            live_chunks: self.pool.len(),
            occupied_slots: self.pool.occupied_slots(),
            meshes_rebuilt,
            draw_calls,
        };
        self.frame_count += 1;
        log::trace!("Frame {}: {:?}", self.frame_count, stats);
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Approximate CPU bytes held by the object table, the chunks and the
    /// cached render data.
    pub fn memory_usage(&self) -> usize {
        let groups: usize = self.groups.values().map(RegisteredGroup::used_bytes).sum();
        self.table.used_bytes()
            + self.pool.used_bytes()
            + groups
            + self.queue.capacity() * std::mem::size_of::<usize>()
    }

    /// The render pipeline.
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Mutable access to the render pipeline.
    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.pipeline
    }

    /// The chunk pool.
    pub fn pool(&self) -> &ChunkPool {
        &self.pool
    }

    /// The tracked objects.
    pub fn objects(&self) -> &ObjectTable {
        &self.table
    }

    /// The clock, for hosts that drive time themselves.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// The queue of the last frame, as indices into [`Self::objects`].
    pub fn last_queue(&self) -> &[usize] {
        &self.queue
    }
}

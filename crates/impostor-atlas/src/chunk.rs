//! One atlas texture and its slot table.
//!
//! Tiles are uniform within a chunk, so placement is pure index arithmetic:
//! slot `i` lives at column `i / side`, row `i % side`. Free indices are kept
//! on a LIFO stack, making acquire and release O(1) with no fragmentation.

use glam::Vec4;
use impostor_mesh::ChunkMesh;
use impostor_render::{
    CommandBuffer, MaterialHandle, PixelRect, RenderCommand, TextureHandle,
};
use rayon::prelude::*;

use crate::error::AtlasError;
use crate::fade::FadeTimer;
use crate::ids::{ChunkId, OwnerId};
use crate::resolution::{render_queue, slots_per_side};
use crate::resources::{MaterialPool, TexturePool};
use crate::slot::{ImpostorSlot, SlotRequest, SlotTransition};

/// Slots advanced per rayon task.
const TICK_BATCH: usize = 64;

/// A fixed-capacity atlas of equally sized impostor tiles.
#[derive(Debug)]
pub struct Chunk {
    id: ChunkId,
    atlas_resolution: u32,
    tile_resolution: u32,
    side: u32,
    slots: Vec<ImpostorSlot>,
    free: Vec<u32>,
    pending_removals: Vec<OwnerId>,
    mesh: ChunkMesh,
    needs_mesh_rebuild: bool,
    needs_clear: bool,
    use_mip_maps: bool,
    texture: TextureHandle,
    material: MaterialHandle,
}

impl Chunk {
    /// Create a chunk and lease its texture and material.
    pub fn new(
        id: ChunkId,
        atlas_resolution: u32,
        tile_resolution: u32,
        textures: &mut TexturePool,
        materials: &mut MaterialPool,
    ) -> Result<Self, AtlasError> {
        let side = slots_per_side(atlas_resolution, tile_resolution)?;
        let capacity = (side * side) as usize;
        Ok(Self {
            id,
            atlas_resolution,
            tile_resolution,
            side,
            slots: vec![ImpostorSlot::default(); capacity],
            // Reversed so that index 0 is handed out first.
            free: (0..capacity as u32).rev().collect(),
            pending_removals: Vec::new(),
            mesh: ChunkMesh::new(capacity),
            needs_mesh_rebuild: false,
            needs_clear: true,
            use_mip_maps: textures.use_mip_maps(),
            texture: textures.lease(atlas_resolution),
            material: materials.lease(),
        })
    }

    /// Return the texture and material to their pools.
    ///
    /// # Panics
    ///
    /// If any slot is still occupied.
    pub fn dispose(self, textures: &mut TexturePool, materials: &mut MaterialPool) {
        assert!(
            self.is_empty(),
            "chunk {} disposed with {} occupied slots",
            self.id,
            self.occupied_count()
        );
        textures.give_back(self.texture);
        materials.give_back(self.material);
    }

    // -----------------------------------------------------------------------
    // Slot lifecycle
    // -----------------------------------------------------------------------

    /// Take a free slot for `request`, starting its fade-in.
    ///
    /// The fade-in deadline is `now + fade_duration - delta_time`.
    pub fn acquire(
        &mut self,
        request: &SlotRequest,
        now: f32,
        delta_time: f32,
    ) -> Result<u32, AtlasError> {
        let index = self.free.pop().ok_or(AtlasError::CapacityExceeded {
            chunk: self.id,
            capacity: self.capacity(),
        })?;
        let uv = self.uv(index);
        let slot = &mut self.slots[index as usize];
        debug_assert!(!slot.is_occupied(), "free stack held occupied slot {index}");
        *slot = ImpostorSlot {
            owner: Some(request.owner),
            relevant: true,
            position: request.position,
            direction: request.direction,
            quad_size: request.quad_size,
            z_offset: request.z_offset,
            fade_duration: request.fade_duration,
            uv,
            fade: FadeTimer::FadingIn {
                until: now + request.fade_duration - delta_time,
            },
        };
        self.needs_mesh_rebuild = true;
        Ok(index)
    }

    /// Mark a slot as superseded and schedule its fade-out.
    ///
    /// With `keep_fade_in` the current fade-in is allowed to finish before
    /// the fade-out starts; otherwise the fade-out starts now.
    pub fn release(
        &mut self,
        index: u32,
        fade_duration: f32,
        keep_fade_in: bool,
        now: f32,
    ) -> Result<(), AtlasError> {
        let chunk = self.id;
        let slot = self
            .slots
            .get_mut(index as usize)
            .filter(|s| s.is_occupied())
            .ok_or(AtlasError::EmptySlot { chunk, index })?;
        slot.relevant = false;
        if !keep_fade_in {
            slot.fade = FadeTimer::FadingOut {
                until: now + fade_duration,
            };
        }
        slot.fade_duration = fade_duration;
        self.needs_mesh_rebuild = true;
        Ok(())
    }

    /// Queue every slot owned by `owner` for removal at the next
    /// [`Self::tick`].
    pub fn queue_owner_removal(&mut self, owner: OwnerId) {
        self.pending_removals.push(owner);
        self.needs_mesh_rebuild = true;
    }

    /// Free every slot owned by one of `owners` immediately, without a fade.
    /// Returns the number of slots freed.
    pub fn bulk_release(&mut self, owners: &[OwnerId]) -> usize {
        if owners.is_empty() {
            return 0;
        }
        self.sweep(|slot| slot.evict_owners(owners))
    }

    /// Process queued owner removals, then advance every irrelevant slot's
    /// fade. Returns the number of slots freed.
    pub fn tick(&mut self, now: f32) -> usize {
        let mut freed = 0;
        if !self.pending_removals.is_empty() {
            let owners = std::mem::take(&mut self.pending_removals);
            freed += self.bulk_release(&owners);
        }
        freed + self.sweep(|slot| slot.advance(now))
    }

    /// Apply `step` to every slot in parallel, then push freed indices in
    /// index order.
    fn sweep<F>(&mut self, step: F) -> usize
    where
        F: Fn(&mut ImpostorSlot) -> SlotTransition + Sync,
    {
        let (dirty, freed) = self
            .slots
            .par_iter_mut()
            .enumerate()
            .with_min_len(TICK_BATCH)
            .fold(
                || (false, Vec::new()),
                |(dirty, mut freed), (index, slot)| match step(slot) {
                    SlotTransition::Unchanged => (dirty, freed),
                    SlotTransition::FadeOutStarted => (true, freed),
                    SlotTransition::Freed => {
                        freed.push(index as u32);
                        (true, freed)
                    }
                },
            )
            .reduce(
                || (false, Vec::new()),
                |(a_dirty, mut a_freed), (b_dirty, b_freed)| {
                    a_freed.extend(b_freed);
                    (a_dirty || b_dirty, a_freed)
                },
            );

        self.free.extend_from_slice(&freed);
        debug_assert!(self.free.len() <= self.slots.len());
        if dirty {
            self.needs_mesh_rebuild = true;
        }
        freed.len()
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Atlas UV rectangle of a slot.
    pub fn uv(&self, index: u32) -> Vec4 {
        let x = (index / self.side) as f32;
        let y = (index % self.side) as f32;
        Vec4::new(x, y, x + 1.0, y + 1.0) / self.side as f32
    }

    /// Pixel rectangle of a slot inside the atlas texture.
    pub fn pixel_rect(&self, index: u32) -> PixelRect {
        PixelRect {
            x: index / self.side * self.tile_resolution,
            y: index % self.side * self.tile_resolution,
            width: self.tile_resolution,
            height: self.tile_resolution,
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot rendering
    // -----------------------------------------------------------------------

    /// Bind the atlas as render target. The first time, the whole atlas is
    /// cleared to transparent.
    pub fn begin_rendering(&mut self, cb: &mut CommandBuffer) {
        cb.push(RenderCommand::SetRenderTarget {
            texture: self.texture,
        });
        if self.needs_clear {
            cb.push(RenderCommand::SetViewport(PixelRect::full(
                self.atlas_resolution,
            )));
            cb.push(RenderCommand::ClearRenderTarget {
                color: Vec4::ZERO,
                clear_depth: true,
            });
            self.needs_clear = false;
        }
    }

    /// Restrict rendering to one slot.
    pub fn set_slot_viewport(&self, index: u32, cb: &mut CommandBuffer) {
        cb.push(RenderCommand::SetViewport(self.pixel_rect(index)));
    }

    /// Finish a batch of snapshots into this atlas.
    pub fn end_rendering(&self, cb: &mut CommandBuffer) {
        if self.use_mip_maps {
            cb.push(RenderCommand::GenerateMips {
                texture: self.texture,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Mesh
    // -----------------------------------------------------------------------

    /// Whether the slot table changed since the last mesh rebuild.
    pub fn needs_mesh_rebuild(&self) -> bool {
        self.needs_mesh_rebuild
    }

    /// Repack the quad mesh from the slot table.
    pub fn rebuild_mesh(&mut self) {
        self.mesh.rebuild(&self.slots);
        self.needs_mesh_rebuild = false;
    }

    /// The quad mesh as of the last rebuild.
    pub fn mesh(&self) -> &ChunkMesh {
        &self.mesh
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Chunk id.
    pub fn id(&self) -> ChunkId {
        self.id
    }

    /// Tile edge length in pixels.
    pub fn tile_resolution(&self) -> u32 {
        self.tile_resolution
    }

    /// Atlas edge length in pixels.
    pub fn atlas_resolution(&self) -> u32 {
        self.atlas_resolution
    }

    /// Number of slots.
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Number of occupied slots.
    pub fn occupied_count(&self) -> u32 {
        self.capacity() - self.free_count()
    }

    /// Number of free slots.
    pub fn free_count(&self) -> u32 {
        self.free.len() as u32
    }

    /// Returns `true` if at least one slot is free.
    pub fn has_free_slot(&self) -> bool {
        !self.free.is_empty()
    }

    /// Returns `true` if every slot is free.
    pub fn is_empty(&self) -> bool {
        self.free.len() == self.slots.len()
    }

    /// The slot table.
    pub fn slots(&self) -> &[ImpostorSlot] {
        &self.slots
    }

    /// A single slot.
    pub fn slot(&self, index: u32) -> Option<&ImpostorSlot> {
        self.slots.get(index as usize)
    }

    /// Atlas texture.
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    /// Impostor material sampling the atlas.
    pub fn material(&self) -> MaterialHandle {
        self.material
    }

    /// Draw order of this chunk's material.
    pub fn render_queue(&self) -> i32 {
        render_queue(self.tile_resolution)
    }

    /// CPU bytes held by the slot table, free stack, and mesh.
    pub fn used_bytes(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<ImpostorSlot>()
            + self.free.capacity() * std::mem::size_of::<u32>()
            + self.pending_removals.capacity() * std::mem::size_of::<OwnerId>()
            + self.mesh.used_bytes()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn owner(raw: u32) -> OwnerId {
        OwnerId::new(raw).unwrap()
    }

    fn request(raw: u32, fade: f32) -> SlotRequest {
        SlotRequest {
            owner: owner(raw),
            position: Vec3::new(raw as f32, 0.0, 0.0),
            direction: Vec3::Z,
            quad_size: 2.0,
            z_offset: 1.0,
            fade_duration: fade,
        }
    }

    fn chunk(atlas: u32, tile: u32) -> Chunk {
        Chunk::new(
            ChunkId::new(1).unwrap(),
            atlas,
            tile,
            &mut TexturePool::new(true),
            &mut MaterialPool::new(),
        )
        .unwrap()
    }

    fn assert_accounting(chunk: &Chunk) {
        let occupied = chunk.slots().iter().filter(|s| s.is_occupied()).count() as u32;
        assert_eq!(occupied + chunk.free_count(), chunk.capacity());
        assert_eq!(occupied, chunk.occupied_count());
        let mut free = chunk.free.clone();
        free.sort_unstable();
        free.dedup();
        assert_eq!(free.len(), chunk.free.len(), "duplicate free index");
        for index in &chunk.free {
            assert!(!chunk.slots()[*index as usize].is_occupied());
        }
    }

    /// A 2048 atlas of 64px tiles holds exactly 1024 impostors.
    #[test]
    fn test_full_chunk_rejects_next_acquire() {
        let mut chunk = chunk(2048, 64);
        assert_eq!(chunk.capacity(), 1024);
        for i in 1..=1024 {
            assert!(chunk.has_free_slot());
            chunk.acquire(&request(i, 0.3), 0.0, 0.016).unwrap();
        }
        assert!(!chunk.has_free_slot());
        assert_eq!(
            chunk.acquire(&request(1025, 0.3), 0.0, 0.016),
            Err(AtlasError::CapacityExceeded {
                chunk: chunk.id(),
                capacity: 1024
            })
        );
        assert_accounting(&chunk);
    }

    #[test]
    fn test_acquire_writes_slot() {
        let mut chunk = chunk(1024, 256);
        let index = chunk.acquire(&request(7, 0.5), 10.0, 0.1).unwrap();
        assert_eq!(index, 0);
        let slot = chunk.slot(index).unwrap();
        assert_eq!(slot.owner, Some(owner(7)));
        assert!(slot.relevant);
        assert_eq!(slot.fade, FadeTimer::FadingIn { until: 10.4 });
        assert_eq!(slot.uv, Vec4::new(0.0, 0.0, 0.25, 0.25));
        assert!(chunk.needs_mesh_rebuild());
    }

    #[test]
    fn test_uv_and_pixel_rect_follow_column_major_grid() {
        let chunk = chunk(1024, 256);
        assert_eq!(chunk.uv(1), Vec4::new(0.0, 0.25, 0.25, 0.5));
        assert_eq!(chunk.uv(4), Vec4::new(0.25, 0.0, 0.5, 0.25));
        assert_eq!(
            chunk.pixel_rect(6),
            PixelRect {
                x: 256,
                y: 512,
                width: 256,
                height: 256
            }
        );
    }

    /// Released without keeping the fade-in, a slot is freed exactly once
    /// after its fade-out window.
    #[test]
    fn test_release_then_tick_frees_once() {
        let mut chunk = chunk(512, 128);
        let index = chunk.acquire(&request(1, 0.3), 0.0, 0.0).unwrap();
        chunk.release(index, 0.5, false, 1.0).unwrap();

        assert_eq!(chunk.tick(1.2), 0);
        assert!(chunk.slot(index).unwrap().is_occupied());
        assert_eq!(chunk.tick(1.6), 1);
        assert_eq!(chunk.tick(2.0), 0);
        assert_eq!(chunk.free.iter().filter(|&&i| i == index).count(), 1);
        assert!(chunk.is_empty());
        assert_accounting(&chunk);
    }

    /// With `keep_fade_in`, the fade-out starts only after the fade-in ends.
    #[test]
    fn test_release_keeps_fade_in() {
        let mut chunk = chunk(512, 128);
        let index = chunk.acquire(&request(1, 1.0), 0.0, 0.0).unwrap();
        chunk.release(index, 0.25, true, 0.125).unwrap();

        chunk.tick(0.5);
        assert_eq!(
            chunk.slot(index).unwrap().fade,
            FadeTimer::FadingIn { until: 1.0 }
        );
        chunk.tick(1.5);
        assert_eq!(
            chunk.slot(index).unwrap().fade,
            FadeTimer::FadingOut { until: 1.75 }
        );
        assert_eq!(chunk.tick(2.0), 1);
    }

    #[test]
    fn test_release_of_empty_slot_fails() {
        let mut chunk = chunk(512, 128);
        assert!(matches!(
            chunk.release(3, 0.2, false, 0.0),
            Err(AtlasError::EmptySlot { index: 3, .. })
        ));
        assert!(chunk.release(999, 0.2, false, 0.0).is_err());
    }

    /// Ticking a chunk whose slots are all relevant changes nothing.
    #[test]
    fn test_tick_is_idempotent_for_relevant_slots() {
        let mut chunk = chunk(512, 64);
        for i in 1..=20 {
            chunk.acquire(&request(i, 0.3), 0.0, 0.0).unwrap();
        }
        chunk.rebuild_mesh();
        let before: Vec<ImpostorSlot> = chunk.slots().to_vec();
        let free_before = chunk.free.clone();

        for t in [0.1, 5.0, 500.0] {
            assert_eq!(chunk.tick(t), 0);
        }
        assert_eq!(chunk.slots(), before.as_slice());
        assert_eq!(chunk.free, free_before);
        assert!(!chunk.needs_mesh_rebuild());
    }

    #[test]
    fn test_bulk_release_frees_only_matching_owners() {
        let mut chunk = chunk(512, 64);
        for i in 1..=10 {
            chunk.acquire(&request(i, 0.3), 0.0, 0.0).unwrap();
        }
        chunk.acquire(&request(3, 0.3), 0.0, 0.0).unwrap();
        let freed = chunk.bulk_release(&[owner(3), owner(8)]);
        assert_eq!(freed, 3);
        assert_eq!(chunk.occupied_count(), 8);
        assert!(
            chunk
                .slots()
                .iter()
                .all(|s| s.owner != Some(owner(3)) && s.owner != Some(owner(8)))
        );
        assert_accounting(&chunk);
    }

    #[test]
    fn test_queued_removal_applies_on_tick() {
        let mut chunk = chunk(512, 128);
        chunk.acquire(&request(4, 0.3), 0.0, 0.0).unwrap();
        chunk.queue_owner_removal(owner(4));
        assert_eq!(chunk.occupied_count(), 1);
        assert_eq!(chunk.tick(0.0), 1);
        assert!(chunk.is_empty());
    }

    /// Pseudo-random acquire/release/tick cycles never break slot accounting.
    #[test]
    fn test_accounting_invariant_under_churn() {
        let mut chunk = chunk(1024, 64);
        let mut state: u32 = 0x9e37_79b9;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };
        let mut now = 0.0;
        for round in 0..2000u32 {
            now += 0.016;
            match next() % 3 {
                0 if chunk.has_free_slot() => {
                    chunk.acquire(&request(round + 1, 0.1), now, 0.016).unwrap();
                }
                1 => {
                    let index = next() % chunk.capacity();
                    if chunk.slot(index).unwrap().relevant {
                        chunk.release(index, 0.1, next() % 2 == 0, now).unwrap();
                    }
                }
                _ => {
                    chunk.tick(now);
                }
            }
            assert_accounting(&chunk);
        }
    }

    #[test]
    fn test_first_batch_clears_atlas_once() {
        let mut chunk = chunk(1024, 128);
        let mut cb = CommandBuffer::new("test");
        chunk.begin_rendering(&mut cb);
        chunk.set_slot_viewport(0, &mut cb);
        chunk.end_rendering(&mut cb);
        chunk.begin_rendering(&mut cb);

        let clears = cb
            .commands()
            .iter()
            .filter(|c| matches!(c, RenderCommand::ClearRenderTarget { .. }))
            .count();
        assert_eq!(clears, 1);
        assert_eq!(cb.render_target_switches(), 2);
        assert!(
            cb.commands()
                .contains(&RenderCommand::GenerateMips { texture: chunk.texture() })
        );
    }

    #[test]
    fn test_rebuild_mesh_tracks_occupancy() {
        let mut chunk = chunk(512, 128);
        let a = chunk.acquire(&request(1, 0.3), 0.0, 0.0).unwrap();
        chunk.acquire(&request(2, 0.3), 0.0, 0.0).unwrap();
        chunk.rebuild_mesh();
        assert_eq!(chunk.mesh().quad_count(), 2);

        chunk.release(a, 0.1, false, 0.0).unwrap();
        chunk.tick(1.0);
        assert!(chunk.needs_mesh_rebuild());
        chunk.rebuild_mesh();
        assert_eq!(chunk.mesh().quad_count(), 1);
    }

    #[test]
    #[should_panic(expected = "occupied slots")]
    fn test_dispose_occupied_chunk_panics() {
        let mut textures = TexturePool::new(false);
        let mut materials = MaterialPool::new();
        let mut chunk = Chunk::new(
            ChunkId::new(1).unwrap(),
            512,
            128,
            &mut textures,
            &mut materials,
        )
        .unwrap();
        chunk.acquire(&request(1, 0.3), 0.0, 0.0).unwrap();
        chunk.dispose(&mut textures, &mut materials);
    }
}

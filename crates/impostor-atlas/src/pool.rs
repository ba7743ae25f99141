//! Chunks grouped by tile resolution.
//!
//! Any chunk of the requested tier with a free slot is eligible for a new
//! impostor; a new chunk is created only when every chunk of the tier is
//! full. Chunks are evicted once they become empty, returning their texture
//! and material to the pools.

use impostor_render::CommandBuffer;
use rayon::prelude::*;

use crate::chunk::Chunk;
use crate::error::AtlasError;
use crate::ids::{ChunkId, OwnerId, SlotRef};
use crate::resolution::slots_per_side;
use crate::resources::{MaterialPool, TexturePool};
use crate::slot::SlotRequest;

/// Owner of every live chunk.
#[derive(Debug)]
pub struct ChunkPool {
    atlas_resolution: u32,
    chunks: Vec<Chunk>,
    next_id: ChunkId,
    textures: TexturePool,
    materials: MaterialPool,
}

impl ChunkPool {
    /// Create an empty pool whose chunks use `atlas_resolution` textures.
    pub fn new(atlas_resolution: u32, use_mip_maps: bool) -> Result<Self, AtlasError> {
        slots_per_side(atlas_resolution, 1)?;
        Ok(Self {
            atlas_resolution,
            chunks: Vec::new(),
            next_id: ChunkId::FIRST,
            textures: TexturePool::new(use_mip_maps),
            materials: MaterialPool::new(),
        })
    }

    /// Find a chunk of `tile_resolution` with a free slot, creating one if
    /// none exists.
    pub fn get_with_place(&mut self, tile_resolution: u32) -> Result<&mut Chunk, AtlasError> {
        let found = self
            .chunks
            .iter()
            .position(|c| c.tile_resolution() == tile_resolution && c.has_free_slot());
        let index = match found {
            Some(index) => index,
            None => {
                let id = self.next_id;
                let chunk = Chunk::new(
                    id,
                    self.atlas_resolution,
                    tile_resolution,
                    &mut self.textures,
                    &mut self.materials,
                )?;
                self.next_id = id.next();
                log::debug!(
                    "Created chunk {} ({}px tiles, {} slots)",
                    id,
                    tile_resolution,
                    chunk.capacity()
                );
                self.chunks.push(chunk);
                self.chunks.len() - 1
            }
        };
        Ok(&mut self.chunks[index])
    }

    /// Place an impostor in a chunk of `tile_resolution`.
    pub fn acquire(
        &mut self,
        tile_resolution: u32,
        request: &SlotRequest,
        now: f32,
        delta_time: f32,
    ) -> Result<SlotRef, AtlasError> {
        let chunk = self.get_with_place(tile_resolution)?;
        debug_assert!(chunk.has_free_slot());
        let index = chunk.acquire(request, now, delta_time)?;
        Ok(SlotRef {
            chunk: chunk.id(),
            index,
        })
    }

    /// Release a previously acquired slot. See [`Chunk::release`].
    pub fn release(
        &mut self,
        slot: SlotRef,
        fade_duration: f32,
        keep_fade_in: bool,
        now: f32,
    ) -> Result<(), AtlasError> {
        self.get_mut(slot.chunk)
            .ok_or(AtlasError::UnknownChunk(slot.chunk))?
            .release(slot.index, fade_duration, keep_fade_in, now)
    }

    /// Queue removal of every slot owned by `owner` in every chunk.
    pub fn queue_owner_removal(&mut self, owner: OwnerId) {
        for chunk in &mut self.chunks {
            chunk.queue_owner_removal(owner);
        }
    }

    /// Advance every chunk's slots in parallel. Returns the number of slots
    /// freed.
    pub fn tick(&mut self, now: f32) -> usize {
        self.chunks.par_iter_mut().map(|c| c.tick(now)).sum()
    }

    /// Rebuild the mesh of every chunk whose slot table changed, in
    /// parallel. Returns the number of meshes rebuilt.
    pub fn rebuild_meshes(&mut self) -> usize {
        self.chunks
            .par_iter_mut()
            .filter(|c| c.needs_mesh_rebuild())
            .map(|c| {
                c.rebuild_mesh();
                1
            })
            .sum()
    }

    /// Dispose every empty chunk. Returns the evicted ids.
    pub fn destroy_empty(&mut self) -> Vec<ChunkId> {
        let mut evicted = Vec::new();
        let mut index = 0;
        while index < self.chunks.len() {
            if self.chunks[index].is_empty() {
                let chunk = self.chunks.remove(index);
                log::debug!(
                    "Evicted empty chunk {} ({}px tiles)",
                    chunk.id(),
                    chunk.tile_resolution()
                );
                evicted.push(chunk.id());
                chunk.dispose(&mut self.textures, &mut self.materials);
            } else {
                index += 1;
            }
        }
        evicted
    }

    /// Bind a chunk for snapshot rendering. See [`Chunk::begin_rendering`].
    pub fn begin_rendering(
        &mut self,
        id: ChunkId,
        cb: &mut CommandBuffer,
    ) -> Result<&Chunk, AtlasError> {
        let chunk = self.get_mut(id).ok_or(AtlasError::UnknownChunk(id))?;
        chunk.begin_rendering(cb);
        Ok(chunk)
    }

    /// Look up a chunk.
    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.id() == id)
    }

    /// Look up a chunk mutably.
    pub fn get_mut(&mut self, id: ChunkId) -> Option<&mut Chunk> {
        self.chunks.iter_mut().find(|c| c.id() == id)
    }

    /// Live chunks in creation order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Live chunks of one tile resolution.
    pub fn tier(&self, tile_resolution: u32) -> impl Iterator<Item = &Chunk> {
        self.chunks
            .iter()
            .filter(move |c| c.tile_resolution() == tile_resolution)
    }

    /// Number of live chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if there are no live chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Atlas edge length in pixels.
    pub fn atlas_resolution(&self) -> u32 {
        self.atlas_resolution
    }

    /// Occupied slots across all chunks.
    pub fn occupied_slots(&self) -> u32 {
        self.chunks.iter().map(Chunk::occupied_count).sum()
    }

    /// Texture pool backing the chunks.
    pub fn textures(&self) -> &TexturePool {
        &self.textures
    }

    /// Material pool backing the chunks.
    pub fn materials(&self) -> &MaterialPool {
        &self.materials
    }

    /// CPU bytes held by all chunks.
    pub fn used_bytes(&self) -> usize {
        self.chunks.iter().map(Chunk::used_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn request(raw: u32) -> SlotRequest {
        SlotRequest {
            owner: OwnerId::new(raw).unwrap(),
            position: Vec3::ZERO,
            direction: Vec3::Z,
            quad_size: 1.0,
            z_offset: 0.5,
            fade_duration: 0.1,
        }
    }

    #[test]
    fn test_invalid_atlas_resolution() {
        assert!(ChunkPool::new(1000, false).is_err());
    }

    /// Once a chunk is full the pool opens a second chunk of the same tier
    /// instead of asking the full one.
    #[test]
    fn test_overflow_creates_new_chunk() {
        let mut pool = ChunkPool::new(256, false).unwrap();
        // 256 / 128 = 2 per side, 4 slots per chunk.
        let refs: Vec<SlotRef> = (1..=5)
            .map(|i| pool.acquire(128, &request(i), 0.0, 0.0).unwrap())
            .collect();
        assert_eq!(pool.len(), 2);
        assert_eq!(refs[0].chunk.get(), 1);
        assert_eq!(refs[3].chunk.get(), 1);
        assert_eq!(refs[4].chunk.get(), 2);
        assert_eq!(refs[4].index, 0);
        assert_eq!(pool.occupied_slots(), 5);
    }

    #[test]
    fn test_tiers_are_separate() {
        let mut pool = ChunkPool::new(512, false).unwrap();
        let a = pool.acquire(64, &request(1), 0.0, 0.0).unwrap();
        let b = pool.acquire(128, &request(2), 0.0, 0.0).unwrap();
        assert_ne!(a.chunk, b.chunk);
        assert_eq!(pool.tier(64).count(), 1);
        assert_eq!(pool.tier(128).count(), 1);
        assert_eq!(pool.tier(256).count(), 0);
    }

    /// A freed slot in an older chunk is reused before the newer chunk.
    #[test]
    fn test_free_slot_in_any_chunk_is_eligible() {
        let mut pool = ChunkPool::new(256, false).unwrap();
        let refs: Vec<SlotRef> = (1..=5)
            .map(|i| pool.acquire(128, &request(i), 0.0, 0.0).unwrap())
            .collect();
        pool.release(refs[1], 0.0, false, 0.0).unwrap();
        pool.tick(1.0);
        let reused = pool.acquire(128, &request(9), 1.0, 0.0).unwrap();
        assert_eq!(reused, refs[1]);
    }

    #[test]
    fn test_destroy_empty_returns_resources() {
        let mut pool = ChunkPool::new(256, false).unwrap();
        let a = pool.acquire(128, &request(1), 0.0, 0.0).unwrap();
        let b = pool.acquire(64, &request(2), 0.0, 0.0).unwrap();
        pool.release(a, 0.1, false, 0.0).unwrap();
        pool.tick(1.0);

        let evicted = pool.destroy_empty();
        assert_eq!(evicted, vec![a.chunk]);
        assert_eq!(pool.len(), 1);
        assert!(pool.get(b.chunk).is_some());
        assert_eq!(pool.textures().leased_count(), 1);
        assert_eq!(pool.textures().pooled_count(), 1);
        assert_eq!(pool.materials().pooled_count(), 1);
    }

    /// Chunk ids keep increasing after eviction.
    #[test]
    fn test_chunk_ids_not_reused() {
        let mut pool = ChunkPool::new(256, false).unwrap();
        let a = pool.acquire(128, &request(1), 0.0, 0.0).unwrap();
        pool.get_mut(a.chunk).unwrap().bulk_release(&[OwnerId::new(1).unwrap()]);
        pool.destroy_empty();
        let b = pool.acquire(128, &request(2), 0.0, 0.0).unwrap();
        assert!(b.chunk > a.chunk);
    }

    #[test]
    fn test_queued_owner_removal_reaches_all_chunks() {
        let mut pool = ChunkPool::new(256, false).unwrap();
        pool.acquire(128, &request(1), 0.0, 0.0).unwrap();
        pool.acquire(64, &request(1), 0.0, 0.0).unwrap();
        pool.acquire(64, &request(2), 0.0, 0.0).unwrap();
        pool.queue_owner_removal(OwnerId::new(1).unwrap());
        assert_eq!(pool.tick(0.0), 2);
        assert_eq!(pool.occupied_slots(), 1);
    }

    #[test]
    fn test_rebuild_meshes_only_dirty() {
        let mut pool = ChunkPool::new(256, false).unwrap();
        pool.acquire(128, &request(1), 0.0, 0.0).unwrap();
        pool.acquire(64, &request(2), 0.0, 0.0).unwrap();
        assert_eq!(pool.rebuild_meshes(), 2);
        assert_eq!(pool.rebuild_meshes(), 0);
    }

    #[test]
    fn test_release_unknown_chunk() {
        let mut pool = ChunkPool::new(256, false).unwrap();
        let missing = SlotRef {
            chunk: ChunkId::new(42).unwrap(),
            index: 0,
        };
        assert_eq!(
            pool.release(missing, 0.1, false, 0.0),
            Err(AtlasError::UnknownChunk(missing.chunk))
        );
    }
}
